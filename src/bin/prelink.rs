//! Linkage-cache CLI.
//!
//! **Modes**
//! - `dump <universe.json>`: run a build pass over a JSON universe fixture
//!   and write the snapshot.
//! - `replay <snapshot>`: replay a snapshot tier by tier into a fresh
//!   universe and print counters.
//! - `inspect <snapshot>`: print a snapshot's lists and counts.
//!
//! An identity mismatch during replay terminates the process; every other
//! failure surfaces as an ordinary error.

use std::fs::File;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use prelink::{
    build_snapshot, dictionary_for, read_from, write_to, ArchiveLoader, Dictionary, LoaderTier,
    ReplayEngine, SessionConfig, Snapshot, TypeUniverse,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a snapshot from a JSON universe fixture.
    Dump {
        /// Universe fixture (JSON).
        #[arg(value_name = "UNIVERSE")]
        universe: PathBuf,

        /// Snapshot output path.
        #[arg(short, long, value_name = "PATH", default_value = "linkage.plnk")]
        output: PathBuf,

        /// Baseline snapshot to build an incremental overlay on.
        #[arg(long, value_name = "PATH")]
        base: Option<PathBuf>,

        /// Disable heap snapshotting (string interning, call-site archiving).
        #[arg(long, default_value_t = false)]
        no_heap_snapshot: bool,

        /// Disable dynamically-bound call-site archiving.
        #[arg(long, default_value_t = false)]
        no_call_sites: bool,

        /// Also resolve dynamically-dispatched method references eagerly.
        #[arg(long, default_value_t = false)]
        eager_member_resolution: bool,

        /// Synthetic-glue type to force-resolve in bulk. Repeatable.
        #[arg(long, value_name = "NAME")]
        glue_type: Vec<String>,

        /// Type to initialize at dump time. Repeatable.
        #[arg(long, value_name = "NAME")]
        forced_preinit: Vec<String>,
    },

    /// Replay a snapshot into a fresh universe and print counters.
    Replay {
        /// Snapshot path.
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,
    },

    /// Print a snapshot's lists and counts.
    Inspect {
        /// Snapshot path.
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Also print every list entry.
        #[arg(long, default_value_t = false)]
        lists: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Dump {
            universe,
            output,
            base,
            no_heap_snapshot,
            no_call_sites,
            eager_member_resolution,
            glue_type,
            forced_preinit,
        } => {
            let file = File::open(&universe)
                .with_context(|| format!("opening universe fixture {}", universe.display()))?;
            let mut universe: TypeUniverse =
                serde_json::from_reader(file).context("parsing universe fixture")?;
            let base = match base {
                Some(path) => Some(
                    read_from(&path)
                        .with_context(|| format!("reading base snapshot {}", path.display()))?,
                ),
                None => None,
            };
            let config = SessionConfig {
                heap_snapshot: !no_heap_snapshot,
                archive_call_sites: !no_call_sites,
                eager_member_resolution,
                glue_type_names: glue_type,
                forced_preinit_names: forced_preinit,
            };
            let dictionary = dictionary_for(&universe);
            let snapshot = build_snapshot(&mut universe, &dictionary, config, base.as_ref());
            write_to(&snapshot, &output)
                .with_context(|| format!("writing snapshot {}", output.display()))?;
            println!("{}", snapshot.summary());
        }

        Command::Replay { snapshot } => {
            let snapshot = read_from(&snapshot)
                .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
            let mut engine = ReplayEngine::new(snapshot);
            let mut universe = TypeUniverse::new();
            let dictionary = Dictionary::new();
            let mut loader = ArchiveLoader;
            for tier in LoaderTier::ALL {
                if let Err(e) =
                    engine.replay_tier(&mut universe, &dictionary, &mut loader, tier)
                {
                    if e.is_fatal() {
                        error!(error = %e, "replay aborted");
                        process::exit(1);
                    }
                    return Err(e.into());
                }
            }
            engine.replay_deferred_call_sites(&mut universe)?;
            println!("{}", engine.counters());
        }

        Command::Inspect { snapshot, lists } => {
            let snapshot = read_from(&snapshot)
                .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
            println!("{}", snapshot.summary());
            if lists {
                print_lists(&snapshot);
            }
        }
    }
    Ok(())
}

fn print_lists(snapshot: &Snapshot) {
    for tier in LoaderTier::ALL {
        for b in snapshot.preload_list(tier) {
            println!("{}: {}", tier, snapshot.type_at(*b).name);
        }
        for b in snapshot.initiated(tier) {
            println!("{} (initiated): {}", tier, snapshot.type_at(*b).name);
        }
    }
    for entry in &snapshot.call_site_backlog {
        println!(
            "deferred call site: {} slot {}",
            snapshot.type_at(entry.holder).name,
            entry.slot
        );
    }
    for b in &snapshot.unregistered {
        println!("unregistered: {}", snapshot.type_at(*b).name);
    }
}
