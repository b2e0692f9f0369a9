//! Call-site eligibility: which dynamically-bound call sites may be
//! pre-resolved.
//!
//! Strictly whitelist-based. Only two bootstrap-method shapes qualify, and
//! the metafactory shape is additionally gated on the functional interface it
//! produces: pre-resolving a site whose interface has a static initializer
//! anywhere in its hierarchy would run that initializer early, reordering
//! user-visible side effects.

use tracing::debug;

use prelink_model::dictionary::Dictionary;
use prelink_model::slot::{return_type_name, CallSiteSlot};
use prelink_model::universe::{TypeId, TypeUniverse};

use crate::session::BuildSession;

/// String-concatenation factory bootstrap.
pub const CONCAT_HOLDER: &str = "invoke/StringConcatFactory";
pub const CONCAT_NAME: &str = "makeConcatWithConstants";
pub const CONCAT_DESCRIPTOR: &str =
    "(Linvoke/Lookup;Lrt/String;Linvoke/MethodType;Lrt/String;[Lrt/Object;)Linvoke/CallSite;";

/// Lambda metafactory bootstrap, standard and alternate forms.
pub const LAMBDA_HOLDER: &str = "invoke/LambdaMetafactory";
pub const METAFACTORY_NAME: &str = "metafactory";
pub const METAFACTORY_DESCRIPTOR: &str = "(Linvoke/Lookup;Lrt/String;Linvoke/MethodType;\
     Linvoke/MethodType;Linvoke/MethodHandle;Linvoke/MethodType;)Linvoke/CallSite;";
pub const ALT_METAFACTORY_NAME: &str = "altMetafactory";
pub const ALT_METAFACTORY_DESCRIPTOR: &str =
    "(Linvoke/Lookup;Lrt/String;Linvoke/MethodType;[Lrt/Object;)Linvoke/CallSite;";

/// Decide whether the call site may be archived pre-resolved.
pub fn is_eligible(
    session: &BuildSession,
    universe: &TypeUniverse,
    dictionary: &Dictionary,
    holder: TypeId,
    site: &CallSiteSlot,
) -> bool {
    if !session.config.heap_snapshot || !session.config.archive_call_sites {
        return false;
    }
    if !session.is_builtin_type(holder) {
        return false;
    }

    let bsm = &site.bootstrap;
    let is_concat = bsm.holder == CONCAT_HOLDER
        && bsm.name == CONCAT_NAME
        && bsm.descriptor == CONCAT_DESCRIPTOR;
    if is_concat {
        return true;
    }

    let is_metafactory = bsm.holder == LAMBDA_HOLDER
        && ((bsm.name == METAFACTORY_NAME && bsm.descriptor == METAFACTORY_DESCRIPTOR)
            || (bsm.name == ALT_METAFACTORY_NAME && bsm.descriptor == ALT_METAFACTORY_DESCRIPTOR));
    if !is_metafactory {
        return false;
    }

    // The functional interface the site produces is the invoked descriptor's
    // return type. It must already be loaded and initializer-free.
    let iface_name = match return_type_name(&site.invoked_descriptor) {
        Some(n) => n,
        None => return false,
    };
    let holder_tier = universe.get(holder).tier;
    let iface = match dictionary.find_loaded(holder_tier, iface_name) {
        Some(id) => id,
        None => {
            debug!(interface = %iface_name, "call site rejected: interface not loaded");
            return false;
        }
    };
    if !universe.get(iface).is_interface {
        debug!(interface = %iface_name, "call site rejected: not an interface");
        return false;
    }
    if universe.has_initializer_in_hierarchy(iface) {
        debug!(
            interface = %iface_name,
            "call site rejected: static initializer in hierarchy"
        );
        return false;
    }
    true
}
