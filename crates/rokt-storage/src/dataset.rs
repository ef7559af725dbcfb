//! C4: a single dataset's on-disk representation, with read-side
//! self-healing on corruption.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rokt_crypto::Cipher;
use serde_json::Value;

use crate::error::StorageError;

const EMPTY_ARRAY: &str = "[]";

/// A dataset's files on disk. `files` holds the encrypted (hex) file
/// names relative to `dir`; only the first is ever read or written —
/// see DESIGN.md for why ROTATE resolves to a single file.
pub struct DatasetFile {
    dir: PathBuf,
    files: Vec<String>,
    cipher: Arc<Cipher>,
}

impl DatasetFile {
    pub fn new(dir: PathBuf, files: Vec<String>, cipher: Arc<Cipher>) -> Self {
        Self { dir, files, cipher }
    }

    fn primary_path(&self) -> PathBuf {
        self.dir.join(&self.files[0])
    }

    /// Read path: create-if-missing, decrypt-or-heal, parse-or-heal.
    /// Corruption is never surfaced as an error (§4.4, §7).
    pub fn read_all(&self) -> Result<Vec<Value>, StorageError> {
        let path = self.primary_path();
        if !path.exists() {
            self.write_ciphertext(&path, EMPTY_ARRAY)?;
        }

        let raw = std::fs::read(&path)?;
        let plaintext = self.cipher.decrypt(&raw);

        let records: Vec<Value> = match String::from_utf8(plaintext) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(records) => records,
                Err(_) => {
                    tracing::warn!(path = %path.display(), "corrupt dataset file, self-healing");
                    self.write_ciphertext(&path, EMPTY_ARRAY)?;
                    Vec::new()
                }
            },
            Err(_) => {
                tracing::warn!(path = %path.display(), "corrupt dataset file (invalid utf-8), self-healing");
                self.write_ciphertext(&path, EMPTY_ARRAY)?;
                Vec::new()
            }
        };
        Ok(records)
    }

    fn write_ciphertext(&self, path: &Path, text: &str) -> Result<(), StorageError> {
        let ciphertext = self.cipher.encrypt(text.as_bytes());
        std::fs::write(path, ciphertext)?;
        Ok(())
    }

    /// Write path: serialise, encrypt, write in place.
    pub fn overwrite(&self, records: &[Value]) -> Result<(), StorageError> {
        let text = serde_json::to_string(records).expect("Vec<Value> always serialises");
        self.write_ciphertext(&self.primary_path(), &text)
    }

    pub fn insert(&self, record: Value) -> Result<(), StorageError> {
        let mut records = self.read_all()?;
        records.push(record);
        self.overwrite(&records)
    }

    /// Drops rows for which `predicate` holds; returns the number removed.
    pub fn remove_where(
        &self,
        predicate: impl Fn(&Value) -> bool,
    ) -> Result<usize, StorageError> {
        let records = self.read_all()?;
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            records.into_iter().partition(|r| predicate(r));
        self.overwrite(&kept)?;
        Ok(removed.len())
    }

    /// Legacy single-predicate projection (§4.3's `where`/`select`), kept
    /// distinct from the executor-level predicate engine in `rokt-query`
    /// which handles full AND/OR WHERE lists.
    pub fn select(&self, keys: &[String]) -> Result<Vec<Value>, StorageError> {
        let records = self.read_all()?;
        if keys == ["*"] {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .map(|record| {
                let mut projected = serde_json::Map::new();
                if let Value::Object(map) = &record {
                    for key in keys {
                        if let Some(v) = map.get(key) {
                            projected.insert(key.clone(), v.clone());
                        }
                    }
                }
                Value::Object(projected)
            })
            .collect())
    }
}
