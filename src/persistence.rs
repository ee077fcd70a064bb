//! Trained-model snapshots.
//!
//! A snapshot is the JSON form of a [`NeighbourhoodMatrix`] (tagged with the
//! algorithm that produced it) or of the incremental trainer's
//! [`FeatureTables`]. Floats are written with round-trip precision, so a
//! reloaded model answers queries exactly like the one that was saved.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{RecError, RecResult};
use crate::incremental::FeatureTables;
use crate::neighbourhood::NeighbourhoodMatrix;
use crate::recommender::Algorithm;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Snapshot {
    Neighbourhood {
        algorithm: Algorithm,
        matrix: NeighbourhoodMatrix,
    },
    Features {
        tables: FeatureTables,
    },
}

impl Snapshot {
    /// The algorithm whose model this snapshot holds.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Snapshot::Neighbourhood { algorithm, .. } => *algorithm,
            Snapshot::Features { .. } => Algorithm::SvdIncremental,
        }
    }

    pub fn into_neighbourhood(self) -> Option<NeighbourhoodMatrix> {
        match self {
            Snapshot::Neighbourhood { matrix, .. } => Some(matrix),
            Snapshot::Features { .. } => None,
        }
    }

    pub fn into_features(self) -> Option<FeatureTables> {
        match self {
            Snapshot::Features { tables } => Some(tables),
            Snapshot::Neighbourhood { .. } => None,
        }
    }
}

/// Write `snapshot` to `path`, creating parent directories as needed.
///
/// The JSON goes to a temporary file next to `path` that is renamed into place
/// once complete, so a failed write never leaves a truncated snapshot behind.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> RecResult<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    info!("Saved {} snapshot to {:?}", snapshot.algorithm(), path);
    Ok(())
}

/// Read a snapshot; `Ok(None)` when the file does not exist.
pub fn load_snapshot(path: &Path) -> RecResult<Option<Snapshot>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No snapshot at {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
    info!("Loaded {} snapshot from {:?}", snapshot.algorithm(), path);
    Ok(Some(snapshot))
}

/// Load the model for `algorithm` from `path` unless `force` is set or the file
/// is missing; otherwise run `build` and write its result back to `path`.
pub fn load_or_build<T>(
    path: Option<&Path>,
    force: bool,
    algorithm: Algorithm,
    build: impl FnOnce() -> RecResult<T>,
    pack: impl FnOnce(T) -> Snapshot,
    unpack: impl Fn(Snapshot) -> Option<T>,
) -> RecResult<T> {
    let mismatch = |path: &Path, found: Algorithm| RecError::SnapshotMismatch {
        path: path.to_path_buf(),
        expected: algorithm.to_string(),
        found: found.to_string(),
    };

    let Some(path) = path else {
        return build();
    };

    if !force {
        if let Some(snapshot) = load_snapshot(path)? {
            let found = snapshot.algorithm();
            if found != algorithm {
                return Err(mismatch(path, found));
            }
            return unpack(snapshot).ok_or_else(|| mismatch(path, found));
        }
    }

    let snapshot = pack(build()?);
    save_snapshot(path, &snapshot)?;
    unpack(snapshot).ok_or_else(|| mismatch(path, algorithm))
}
