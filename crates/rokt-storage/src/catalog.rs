//! C5: the encrypted registry mapping plaintext dataset names to
//! metadata, guarded by a single mutex (§9 "Shared mutable catalog").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rokt_crypto::Cipher;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetFile;
use crate::error::StorageError;

const DATAS_MARKER: &str = "datas";
const CONFIG_FILE_NAME: &str = "datasets.config.json";
const SIMPLE_FILE_NAME: &str = "dataset.rokt";
const ROTATE_FILE_NAME: &str = "1.rokt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetType {
    #[serde(rename = "SIMPLE")]
    Simple,
    #[serde(rename = "ROTATE")]
    Rotate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nb_rotation: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    datasets: HashMap<String, CatalogEntry>,
}

/// The encrypted registry. One instance per server process, shared
/// behind an `Arc` across worker threads.
pub struct Catalog {
    root: PathBuf,
    config_path: PathBuf,
    cipher: Arc<Cipher>,
    entries: Mutex<HashMap<String, CatalogEntry>>,
}

impl Catalog {
    /// Computes the encrypted database root, creates it if absent, and
    /// loads (or initialises) the catalog file within it.
    pub fn open(base_dir: impl Into<PathBuf>, cipher: Arc<Cipher>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        let root = base_dir.join("shared").join(cipher.encrypt_name(DATAS_MARKER));
        std::fs::create_dir_all(&root)?;
        let config_path = root.join(cipher.encrypt_name(CONFIG_FILE_NAME));

        let entries = if config_path.exists() {
            let raw = std::fs::read(&config_path)?;
            let plaintext = cipher.decrypt(&raw);
            match String::from_utf8(plaintext).ok().and_then(|s| serde_json::from_str::<CatalogFile>(&s).ok()) {
                Some(catalog_file) => catalog_file.datasets,
                None => {
                    tracing::warn!(path = %config_path.display(), "corrupt catalog, self-healing");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let catalog = Self {
            root,
            config_path,
            cipher,
            entries: Mutex::new(entries),
        };
        catalog.persist()?;
        Ok(catalog)
    }

    fn persist(&self) -> Result<(), StorageError> {
        let entries = self.entries.lock().expect("catalog mutex poisoned");
        let catalog_file = CatalogFile {
            datasets: entries.clone(),
        };
        let text = serde_json::to_string_pretty(&catalog_file).expect("catalog always serialises");
        let ciphertext = self.cipher.encrypt(text.as_bytes());
        std::fs::write(&self.config_path, ciphertext)?;
        Ok(())
    }

    fn dataset_dir(&self, name: &str) -> PathBuf {
        self.root.join(self.cipher.encrypt_name(name))
    }

    /// Creates a new dataset. `args` are the raw string arguments to a
    /// ROTATE declaration (`[size, nb_rotation]`); unused for SIMPLE.
    pub fn create(
        &self,
        name: &str,
        dataset_type: DatasetType,
        args: &[String],
    ) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("catalog mutex poisoned");
        if entries.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        let dir = self.dataset_dir(name);
        std::fs::create_dir_all(&dir).map_err(StorageError::CreateFailed)?;

        let entry = match dataset_type {
            DatasetType::Simple => {
                let file = self.cipher.encrypt_name(SIMPLE_FILE_NAME);
                let cipher = self.cipher.clone();
                let empty = cipher.encrypt(b"[]");
                std::fs::write(dir.join(&file), empty).map_err(StorageError::CreateFailed)?;
                CatalogEntry {
                    dataset_type,
                    file,
                    size: None,
                    nb_rotation: None,
                }
            }
            DatasetType::Rotate => {
                let size = args.first().cloned().unwrap_or_else(|| "3Mo".to_string());
                let nb_rotation = match args.get(1) {
                    Some(raw) => raw.parse::<u32>().map_err(|_| StorageError::InvalidRotationParams)?,
                    None => 2,
                };
                // Resolved as SIMPLE-with-a-different-name; see DESIGN.md / spec §9 ROTATE semantics.
                let file = self.cipher.encrypt_name(ROTATE_FILE_NAME);
                let cipher = self.cipher.clone();
                let empty = cipher.encrypt(b"[]");
                std::fs::write(dir.join(&file), empty).map_err(StorageError::CreateFailed)?;
                CatalogEntry {
                    dataset_type,
                    file,
                    size: Some(size),
                    nb_rotation: Some(nb_rotation),
                }
            }
        };

        entries.insert(name.to_string(), entry);
        drop(entries);
        self.persist()
    }

    /// Best-effort directory removal; catalog is left untouched if the
    /// filesystem removal fails (§4.5, §3 invariants).
    pub fn drop_dataset(&self, name: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("catalog mutex poisoned");
        if !entries.contains_key(name) {
            return Err(StorageError::UnknownDataset(name.to_string()));
        }

        let dir = self.dataset_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(StorageError::DropFailed)?;
        }

        entries.remove(name);
        drop(entries);
        self.persist()
    }

    /// Opens a dataset-file view for reading/writing records.
    pub fn from(&self, name: &str) -> Result<DatasetFile, StorageError> {
        let entries = self.entries.lock().expect("catalog mutex poisoned");
        let entry = entries
            .get(name)
            .ok_or_else(|| StorageError::UnknownDataset(name.to_string()))?;
        let files = vec![entry.file.clone()];
        Ok(DatasetFile::new(self.dataset_dir(name), files, self.cipher.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().expect("catalog mutex poisoned").contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Arc<Cipher> {
        Arc::new(Cipher::new("test-pass", "0123456789abcdef").unwrap())
    }

    #[test]
    fn open_creates_root_and_empty_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        assert!(!catalog.contains("anything"));
    }

    #[test]
    fn create_then_reopen_persists_entry() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
            catalog.create("users", DatasetType::Simple, &[]).unwrap();
        }
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        assert!(catalog.contains("users"));
    }

    #[test]
    fn duplicate_create_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        catalog.create("users", DatasetType::Simple, &[]).unwrap();
        assert!(matches!(
            catalog.create("users", DatasetType::Simple, &[]),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn from_unknown_dataset_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        assert!(matches!(catalog.from("ghost"), Err(StorageError::UnknownDataset(_))));
    }

    #[test]
    fn drop_unknown_dataset_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        assert!(matches!(catalog.drop_dataset("ghost"), Err(StorageError::UnknownDataset(_))));
    }

    #[test]
    fn drop_removes_entry_and_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        catalog.create("users", DatasetType::Simple, &[]).unwrap();
        catalog.drop_dataset("users").unwrap();
        assert!(!catalog.contains("users"));
        assert!(matches!(catalog.from("users"), Err(StorageError::UnknownDataset(_))));
    }

    #[test]
    fn created_dataset_round_trips_records() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        catalog.create("users", DatasetType::Simple, &[]).unwrap();
        let ds = catalog.from("users").unwrap();
        ds.insert(serde_json::json!({"id": 1})).unwrap();
        assert_eq!(catalog.from("users").unwrap().read_all().unwrap(), vec![serde_json::json!({"id": 1})]);
    }

    #[test]
    fn rotate_create_parses_args_or_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        catalog
            .create("logs", DatasetType::Rotate, &["5Mo".to_string(), "4".to_string()])
            .unwrap();
        assert!(catalog.contains("logs"));
    }

    #[test]
    fn rotate_create_rejects_unparseable_rotation_count() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(tmp.path(), cipher()).unwrap();
        assert!(matches!(
            catalog.create("logs", DatasetType::Rotate, &["5Mo".to_string(), "oops".to_string()]),
            Err(StorageError::InvalidRotationParams)
        ));
    }
}
