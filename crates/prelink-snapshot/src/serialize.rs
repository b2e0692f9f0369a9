//! On-disk snapshot format: a small header followed by a bincode payload.

use std::error::Error as StdError;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::buffer::{BufferedId, BufferedSlot};
use crate::snapshot::Snapshot;

const MAGIC: [u8; 4] = *b"PLNK";
const VERSION: u32 = 2;

/// Snapshot read/write failures.
#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Codec(bincode::Error),
    BadMagic([u8; 4]),
    VersionMismatch { found: u32, expected: u32 },
    CorruptIndex { list: &'static str, index: u32, len: usize },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "snapshot io error: {e}"),
            SnapshotError::Codec(e) => write!(f, "snapshot codec error: {e}"),
            SnapshotError::BadMagic(m) => write!(f, "not a snapshot file (magic {m:02x?})"),
            SnapshotError::VersionMismatch { found, expected } => {
                write!(f, "snapshot version {found}, expected {expected}")
            }
            SnapshotError::CorruptIndex { list, index, len } => {
                write!(f, "snapshot {list} entry {index} out of range ({len} valid)")
            }
        }
    }
}

impl StdError for SnapshotError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SnapshotError::Io(e) => Some(e),
            SnapshotError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<bincode::Error> for SnapshotError {
    fn from(e: bincode::Error) -> Self {
        SnapshotError::Codec(e)
    }
}

/// Write a snapshot to `path`, replacing any existing file.
pub fn write_to(snapshot: &Snapshot, path: &Path) -> Result<(), SnapshotError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    bincode::serialize_into(&mut w, snapshot)?;
    w.flush()?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

/// Check every buffered id against the type table so a corrupt or truncated
/// payload fails here instead of panicking on a later index.
fn check_indices(snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let len = snapshot.types.len();
    let check = |list: &'static str, id: BufferedId| {
        if id.index() < len {
            Ok(())
        } else {
            Err(SnapshotError::CorruptIndex { list, index: id.0, len })
        }
    };

    let lists: [(&'static str, &[BufferedId]); 7] = [
        ("boot_core", &snapshot.boot_core),
        ("boot_extended", &snapshot.boot_extended),
        ("platform", &snapshot.platform),
        ("application", &snapshot.application),
        ("platform_initiated", &snapshot.platform_initiated),
        ("application_initiated", &snapshot.application_initiated),
        ("unregistered", &snapshot.unregistered),
    ];
    for (list, ids) in lists {
        for id in ids {
            check(list, *id)?;
        }
    }
    for ty in &snapshot.types {
        if let Some(s) = ty.super_type {
            check("super_type", s)?;
        }
        for i in &ty.interfaces {
            check("interfaces", *i)?;
        }
        for slot in &ty.slots {
            if let BufferedSlot::Class {
                resolved: Some(r), ..
            } = slot
            {
                check("class_slot", *r)?;
            }
        }
    }
    for entry in &snapshot.call_site_backlog {
        check("call_site_backlog", entry.holder)?;
        let slots = snapshot.types[entry.holder.index()].slots.len();
        if entry.slot >= slots {
            return Err(SnapshotError::CorruptIndex {
                list: "call_site_backlog",
                index: entry.slot as u32,
                len: slots,
            });
        }
    }
    Ok(())
}

/// Read a snapshot from `path`, validating magic, version, and every
/// recorded index before handing the payload out.
pub fn read_from(path: &Path) -> Result<Snapshot, SnapshotError> {
    let mut r = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SnapshotError::BadMagic(magic));
    }
    let mut version = [0u8; 4];
    r.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: version,
            expected: VERSION,
        });
    }
    let snapshot = bincode::deserialize_from(&mut r)?;
    check_indices(&snapshot)?;
    debug!(path = %path.display(), "snapshot read");
    Ok(snapshot)
}
