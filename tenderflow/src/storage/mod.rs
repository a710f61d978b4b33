//! JSON persistence for scraped tenders and run metadata.
//!
//! Tender batches land in timestamped files under the output directory;
//! each run's metadata is stored next to them under its run id so later
//! runs can be compared or replayed.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use tracing::info;

use crate::errors::StorageError;
use crate::metadata::RunMetadata;
use crate::models::TenderRecord;

const METADATA_PREFIX: &str = "metadata_";

/// Formats the tender store can write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// A pretty-printed JSON array of tender records.
    #[default]
    Json,
}

impl FromStr for OutputFormat {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            _ => Err(StorageError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
        }
    }
}

/// Writes tender batches to the output directory.
#[derive(Debug, Clone)]
pub struct TenderStore {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl TenderStore {
    /// Creates a store rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    /// Saves `records` under a timestamped default filename.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the directory cannot be created,
    /// the records cannot be serialized, or the file cannot be written.
    pub async fn save(&self, records: &[TenderRecord]) -> Result<PathBuf, StorageError> {
        self.save_as(records, None).await
    }

    /// Saves `records`, honoring an explicit filename when given.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the directory cannot be created,
    /// the records cannot be serialized, or the file cannot be written.
    pub async fn save_as(
        &self,
        records: &[TenderRecord],
        filename: Option<&str>,
    ) -> Result<PathBuf, StorageError> {
        match self.format {
            OutputFormat::Json => self.save_json(records, filename).await,
        }
    }

    async fn save_json(
        &self,
        records: &[TenderRecord],
        filename: Option<&str>,
    ) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StorageError::io(&self.output_dir, e))?;

        let filename = filename.map_or_else(default_tender_filename, ToString::to_string);
        let path = self.output_dir.join(filename);
        info!(count = records.len(), path = %path.display(), "saving tenders");

        let body = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        info!(path = %path.display(), "tenders saved");
        Ok(path)
    }
}

/// Persists and retrieves run metadata by run id.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    metadata_dir: PathBuf,
}

impl MetadataStore {
    /// Creates a store rooted at `metadata_dir`.
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
        }
    }

    /// Saves `metadata` under its run id.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the directory cannot be created
    /// or the file cannot be written.
    pub async fn save(&self, metadata: &RunMetadata) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.metadata_dir)
            .await
            .map_err(|e| StorageError::io(&self.metadata_dir, e))?;

        let path = self
            .metadata_dir
            .join(format!("{METADATA_PREFIX}{}.json", metadata.run_id));
        let body = serde_json::to_string_pretty(metadata)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        info!(run_id = %metadata.run_id, path = %path.display(), "run metadata saved");
        Ok(path)
    }

    /// Loads the metadata stored for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingRun`] when no file exists for the
    /// run, and an io or deserialization error otherwise.
    pub async fn load(&self, run_id: &str) -> Result<RunMetadata, StorageError> {
        let path = self
            .metadata_dir
            .join(format!("{METADATA_PREFIX}{run_id}.json"));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::MissingRun {
                    run_id: run_id.to_string(),
                });
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Lists stored run ids in ascending order.
    ///
    /// A missing metadata directory lists as no runs.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the directory cannot be read.
    pub async fn list_runs(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.metadata_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.metadata_dir, e)),
        };

        let mut run_ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.metadata_dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(run_id) = name
                .strip_prefix(METADATA_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
            {
                run_ids.push(run_id.to_string());
            }
        }
        run_ids.sort();
        Ok(run_ids)
    }
}

fn default_tender_filename() -> String {
    format!("tenders_{}.json", Utc::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::metadata::RunTracker;

    #[test]
    fn unknown_formats_are_rejected() {
        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedFormat { ref format } if format == "csv"));

        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }

    #[tokio::test]
    async fn save_writes_a_readable_json_array() {
        let dir = TempDir::new().unwrap();
        let store = TenderStore::new(dir.path(), OutputFormat::Json);

        let records = vec![TenderRecord::new("T-100")];
        let path = store.save(&records).await.unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tenders_") && name.ends_with(".json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let loaded: Vec<TenderRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].tender_id, "T-100");
    }

    #[tokio::test]
    async fn explicit_filenames_are_honored() {
        let dir = TempDir::new().unwrap();
        let store = TenderStore::new(dir.path(), OutputFormat::Json);

        let path = store
            .save_as(&[TenderRecord::new("T-1")], Some("latest.json"))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("latest.json"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn metadata_round_trips_by_run_id() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());

        let mut tracker = RunTracker::new("run_test_1", serde_json::json!({}));
        tracker.record_parsed(4);
        tracker.finalize();
        store.save(tracker.metadata()).await.unwrap();

        let loaded = store.load("run_test_1").await.unwrap();
        assert_eq!(loaded.run_id, "run_test_1");
        assert_eq!(loaded.tenders_parsed, 4);

        let missing = store.load("run_absent").await.unwrap_err();
        assert!(matches!(missing, StorageError::MissingRun { ref run_id } if run_id == "run_absent"));
    }

    #[tokio::test]
    async fn run_ids_list_sorted_and_tolerate_a_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());

        for run_id in ["run_b", "run_a"] {
            let tracker = RunTracker::new(run_id, serde_json::json!({}));
            store.save(tracker.metadata()).await.unwrap();
        }
        assert_eq!(store.list_runs().await.unwrap(), vec!["run_a", "run_b"]);

        let absent = MetadataStore::new(dir.path().join("nowhere"));
        assert!(absent.list_runs().await.unwrap().is_empty());
    }
}
