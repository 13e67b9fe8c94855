//! Partition discovery and the per-table [`PartitionIndex`].
//!
//! Grounded in the teacher's `parquet_file::chunk` (per-chunk file metadata: path, size,
//! timestamps) and the reconciliation pattern in `querier::table::state_reconciler` (an index
//! rebuilt from a filesystem/catalog walk, asserting structural invariants as it goes).

use snafu::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

/// A single on-disk data file within a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last-modified timestamp, nanoseconds since the Unix epoch.
    pub mtime_ns: i64,
}

/// One partition: the `(key, value)` chain that names it, its files, and derived stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Partition key/value pairs, in directory-nesting order.
    pub keys: Vec<(String, String)>,
    /// Data files under this partition's leaf directory.
    pub files: Vec<FileDescriptor>,
    /// Sum of `files[*].size`.
    pub size_bytes: u64,
    /// Max of `files[*].mtime_ns`.
    pub max_mtime_ns: i64,
}

impl Partition {
    /// Look up a partition key's string value.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors raised while building or refreshing a [`PartitionIndex`].
#[derive(Debug, Snafu)]
pub enum Error {
    /// Two leaf directories at the same nesting depth used different partition key sequences
    /// (spec.md §3 invariant (ii), §4.2).
    #[snafu(display("partition layout error at '{}': expected key order {expected:?}, found {found:?}", path.display()))]
    PartitionLayout {
        /// The leaf directory path where the mismatch was found.
        path: PathBuf,
        /// The key order established by the first leaf at this depth.
        expected: Vec<String>,
        /// The key order found at `path`.
        found: Vec<String>,
    },

    /// The filesystem walk itself failed (permissions, missing root, ...).
    #[snafu(display("failed to read directory '{}': {source}", path.display()))]
    Io {
        /// The directory that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for partition-index operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The discovered partitions for one table, plus the table-level max mtime (spec.md §4.2).
#[derive(Debug, Clone, Default)]
pub struct PartitionIndex {
    partitions: Vec<Partition>,
    max_mtime_ns: i64,
}

impl PartitionIndex {
    /// Walk `root` and build a fresh index.
    ///
    /// `root/k1=v1/k2=v2/.../*.ext`: any subdirectory whose name contains `=` is treated as a
    /// partition-key level; a directory containing regular files (and no further `k=v`
    /// subdirectories) is a leaf partition.
    pub fn build(root: &Path) -> Result<Self> {
        let mut builder = Builder::default();
        builder.walk(root, &mut Vec::new(), 0)?;
        let max_mtime_ns = builder
            .partitions
            .iter()
            .map(|p| p.max_mtime_ns)
            .max()
            .unwrap_or(0);
        Ok(Self {
            partitions: builder.partitions,
            max_mtime_ns,
        })
    }

    /// All discovered partitions.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Max mtime across every file in every partition.
    pub fn max_mtime_ns(&self) -> i64 {
        self.max_mtime_ns
    }

    /// Whether a fresh walk of `root` would see a newer file than this index knows about
    /// (spec.md §4.2 rebuild trigger).
    pub fn is_stale(&self, root: &Path) -> Result<bool> {
        let mut max_seen = 0i64;
        scan_max_mtime(root, &mut max_seen)?;
        Ok(max_seen > self.max_mtime_ns)
    }
}

/// Recursively find the newest mtime under `dir`, without building full partition structure.
/// Used only for the cheap staleness check (spec.md §4.2: "rebuild is triggered when the walk
/// detects any file whose mtime exceeds the stored max_mtime").
fn scan_max_mtime(dir: &Path, max_seen: &mut i64) -> Result<()> {
    let entries = fs::read_dir(dir).context(IoSnafu {
        path: dir.to_path_buf(),
    })?;
    for entry in entries {
        let entry = entry.context(IoSnafu {
            path: dir.to_path_buf(),
        })?;
        let path = entry.path();
        if path.is_dir() {
            scan_max_mtime(&path, max_seen)?;
        } else if let Ok(mtime_ns) = mtime_ns_of(&path) {
            *max_seen = (*max_seen).max(mtime_ns);
        }
    }
    Ok(())
}

fn mtime_ns_of(path: &Path) -> std::io::Result<i64> {
    let meta = fs::metadata(path)?;
    let mtime = meta.modified()?;
    let dur = mtime.duration_since(UNIX_EPOCH).unwrap_or_default();
    Ok(dur.as_nanos() as i64)
}

/// Split a directory name of the form `key=value` into its parts.
fn parse_key_value(name: &str) -> Option<(String, String)> {
    let (k, v) = name.split_once('=')?;
    Some((k.to_string(), v.to_string()))
}

#[derive(Default)]
struct Builder {
    partitions: Vec<Partition>,
    expected_key_order: Option<Vec<String>>,
}

impl Builder {
    fn walk(&mut self, dir: &Path, keys: &mut Vec<(String, String)>, depth: usize) -> Result<()> {
        let mut sub_dirs = Vec::new();
        let mut files = Vec::new();

        let entries = fs::read_dir(dir).context(IoSnafu {
            path: dir.to_path_buf(),
        })?;
        for entry in entries {
            let entry = entry.context(IoSnafu {
                path: dir.to_path_buf(),
            })?;
            let path = entry.path();
            if path.is_dir() {
                if let Some(kv) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_key_value)
                {
                    sub_dirs.push((path, kv));
                }
                // directories that don't match `key=value` are ignored: not part of the
                // partition layout this index understands.
            } else if path.is_file() {
                let mtime_ns = mtime_ns_of(&path).unwrap_or(0);
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                files.push(FileDescriptor {
                    path,
                    size,
                    mtime_ns,
                });
            }
        }

        if !sub_dirs.is_empty() {
            for (path, (k, v)) in sub_dirs {
                keys.push((k, v));
                self.walk(&path, keys, depth + 1)?;
                keys.pop();
            }
            return Ok(());
        }

        if files.is_empty() {
            // Empty leaf directory: nothing to report (invariant (i) forbids empty partitions).
            return Ok(());
        }

        let key_names: Vec<String> = keys.iter().map(|(k, _)| k.clone()).collect();
        match &self.expected_key_order {
            Some(expected) if expected != &key_names => {
                return PartitionLayoutSnafu {
                    path: dir.to_path_buf(),
                    expected: expected.clone(),
                    found: key_names,
                }
                .fail();
            }
            Some(_) => {}
            None => self.expected_key_order = Some(key_names),
        }

        let size_bytes: u64 = files.iter().map(|f| f.size).sum();
        let max_mtime_ns = files.iter().map(|f| f.mtime_ns).max().unwrap_or(0);
        self.partitions.push(Partition {
            keys: keys.clone(),
            files,
            size_bytes,
            max_mtime_ns,
        });
        Ok(())
    }
}

/// Test-only constructors for other modules' unit tests (e.g. the pruner) that want to exercise
/// partition logic against hand-built [`Partition`] values instead of a real directory walk.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{Partition, PartitionIndex};

    pub(crate) fn new_index(partitions: Vec<Partition>, max_mtime_ns: i64) -> PartitionIndex {
        PartitionIndex {
            partitions,
            max_mtime_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn builds_partitions_from_layout() {
        let dir = tempdir().unwrap();
        for day in 1..=3 {
            touch(&dir.path().join(format!("date=2024-11-0{day}/part.parquet")));
        }
        let index = PartitionIndex::build(dir.path()).unwrap();
        assert_eq!(index.partitions().len(), 3);
        for p in index.partitions() {
            assert_eq!(p.keys.len(), 1);
            assert_eq!(p.keys[0].0, "date");
            assert_eq!(p.files.len(), 1);
        }
    }

    #[test]
    fn mismatched_key_order_is_layout_error() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("date=2024-11-01/part.parquet"));
        touch(&dir.path().join("region=us/part.parquet"));
        let err = PartitionIndex::build(dir.path()).unwrap_err();
        assert_matches!(err, Error::PartitionLayout { .. });
    }

    #[test]
    fn empty_leaf_directories_are_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("date=2024-11-01")).unwrap();
        touch(&dir.path().join("date=2024-11-02/part.parquet"));
        let index = PartitionIndex::build(dir.path()).unwrap();
        assert_eq!(index.partitions().len(), 1);
    }
}
