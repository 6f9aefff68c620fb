//! JSON file I/O with atomic writes
//!
//! Every data file holds a [`RecordFile`]: a schema version plus a flat list
//! of records. Writes go to a sibling temp file that is renamed into place,
//! so a crash leaves either the old file or the new one. Staging and
//! publishing are separate steps so a caller can write several files before
//! replacing any of them.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::LedgerError;

/// Current on-disk schema version for data files
pub const DATA_SCHEMA_VERSION: u32 = 1;

/// On-disk wrapper shared by every repository file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct RecordFile<T> {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub records: Vec<T>,
}

fn default_schema_version() -> u32 {
    DATA_SCHEMA_VERSION
}

impl<T> Default for RecordFile<T> {
    fn default() -> Self {
        Self {
            schema_version: DATA_SCHEMA_VERSION,
            records: Vec::new(),
        }
    }
}

impl<T> RecordFile<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            schema_version: DATA_SCHEMA_VERSION,
            records,
        }
    }
}

/// Load the records stored at `path`; a missing file holds no records
pub fn read_records<T, P>(path: P) -> Result<Vec<T>, LedgerError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| LedgerError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let file: RecordFile<T> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| LedgerError::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;

    if file.schema_version > DATA_SCHEMA_VERSION {
        return Err(LedgerError::Storage(format!(
            "{} was written by a newer version (schema {})",
            path.display(),
            file.schema_version
        )));
    }

    Ok(file.records)
}

/// Replace the records stored at `path`
pub fn write_records<T, P>(path: P, records: Vec<T>) -> Result<(), LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    stage_records(path, records)?.publish()
}

/// Write the records for `path` to its temp file without replacing it
pub fn stage_records<T, P>(path: P, records: Vec<T>) -> Result<StagedFile, LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    stage_json(path, &RecordFile::new(records))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    stage_json(path, data)?.publish()
}

/// A fully written and synced temp file waiting to replace its target
#[derive(Debug)]
#[must_use = "a staged file does nothing until published"]
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target
    pub fn publish(self) -> Result<(), LedgerError> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| {
            let _ = fs::remove_file(&self.temp_path);
            LedgerError::Storage(format!(
                "Failed to replace {}: {}",
                self.target.display(),
                e
            ))
        })
    }

    /// Throw the temp file away, leaving the target untouched
    pub fn discard(self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Serialize `data` into the temp file beside `path`
pub fn stage_json<T, P>(path: P, data: &T) -> Result<StagedFile, LedgerError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            LedgerError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = path.with_extension("json.tmp");

    let written = write_synced(&temp_path, data);
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    Ok(StagedFile {
        temp_path,
        target: path.to_path_buf(),
    })
}

fn write_synced<T: Serialize>(path: &Path, data: &T) -> Result<(), LedgerError> {
    let file = File::create(path)
        .map_err(|e| LedgerError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| LedgerError::Storage(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| LedgerError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| LedgerError::Storage(format!("Failed to sync data: {}", e)))
}

/// Commit counter shared by every handle on one data directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision: u64,
}

impl Revision {
    pub fn next(self) -> Self {
        Self {
            revision: self.revision.wrapping_add(1),
        }
    }
}

/// The stored revision; a missing file is revision zero
pub fn read_revision<P: AsRef<Path>>(path: P) -> Result<Revision, LedgerError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Revision::default());
    }
    let file = File::open(path)
        .map_err(|e| LedgerError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| LedgerError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        value: i32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "rent".into(),
                value: 1200,
            },
            Row {
                name: "salary".into(),
                value: 3000,
            },
        ]
    }

    #[test]
    fn test_missing_file_has_no_records() {
        let temp_dir = TempDir::new().unwrap();
        let loaded: Vec<Row> = read_records(temp_dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("rows.json");

        write_records(&path, rows()).unwrap();

        assert!(path.exists());
        assert!(!temp_dir.path().join("nested").join("rows.json.tmp").exists());
        let loaded: Vec<Row> = read_records(&path).unwrap();
        assert_eq!(loaded, rows());
    }

    #[test]
    fn test_staged_file_leaves_target_until_published() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.json");
        write_records(&path, rows()).unwrap();

        let staged = stage_records(&path, vec![rows()[0].clone()]).unwrap();
        assert_eq!(read_records::<Row, _>(&path).unwrap(), rows());
        staged.discard();
        assert_eq!(read_records::<Row, _>(&path).unwrap(), rows());
        assert!(!temp_dir.path().join("rows.json.tmp").exists());

        stage_records(&path, vec![rows()[1].clone()])
            .unwrap()
            .publish()
            .unwrap();
        assert_eq!(read_records::<Row, _>(&path).unwrap(), vec![rows()[1].clone()]);
    }

    #[test]
    fn test_revision_defaults_to_zero() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("revision.json");
        assert_eq!(read_revision(&path).unwrap(), Revision::default());

        write_json_atomic(&path, &Revision::default().next()).unwrap();
        assert_eq!(read_revision(&path).unwrap().revision, 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.json");
        fs::write(&path, r#"{"schema_version": 99, "records": []}"#).unwrap();

        let result: Result<Vec<Row>, _> = read_records(&path);
        assert!(matches!(result, Err(LedgerError::Storage(_))));
    }

    #[test]
    fn test_corrupt_file_is_a_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.json");
        fs::write(&path, "not json at all").unwrap();

        let result: Result<Vec<Row>, _> = read_records(&path);
        assert!(result.is_err());
    }
}
