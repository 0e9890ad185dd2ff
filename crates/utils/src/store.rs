//! Key-value persistence keyed by table name.
//!
//! Callers talk to [`Store`]; where the bytes end up is decided by the
//! [`StoreBackend`] it wraps (in-memory map, a directory of JSON files, or
//! anything else implementing the trait).

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TABLE_CLIENTS: &str = "clients";
pub const TABLE_PERFORMANCE_DATA: &str = "performance_data";
pub const TABLE_LOOKER_DATA: &str = "looker_data";
pub const TABLE_PROCESSED_HASHES: &str = "processed_files_hashes";
pub const TABLE_IMPORT_HISTORY: &str = "import_history";

/// Raw get/set/delete of JSON documents by table name.
pub trait StoreBackend: Send + Sync {
    fn get_raw(&self, table: &str) -> Result<Option<Value>>;
    fn set_raw(&self, table: &str, value: Value) -> Result<()>;
    fn delete(&self, table: &str) -> Result<()>;
}

/// Typed facade over a backend.
pub struct Store<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn get<T: DeserializeOwned>(&self, table: &str) -> Result<Option<T>> {
        match self.backend.get_raw(table)? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .with_context(|| format!("Table '{}' has an unexpected shape", table))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Like [`Store::get`], falling back to `T::default()` for a missing table.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, table: &str) -> Result<T> {
        Ok(self.get(table)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&self, table: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_value(value)
            .with_context(|| format!("Cannot serialize table '{}'", table))?;
        self.backend.set_raw(table, raw)
    }

    pub fn delete(&self, table: &str) -> Result<()> {
        self.backend.delete(table)
    }
}

/// Backend holding everything in memory; useful for tests and dry runs.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<BTreeMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn get_raw(&self, table: &str) -> Result<Option<Value>> {
        let tables = self.tables.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(tables.get(table).cloned())
    }

    fn set_raw(&self, table: &str, value: Value) -> Result<()> {
        let mut tables = self.tables.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        tables.insert(table.to_string(), value);
        Ok(())
    }

    fn delete(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        tables.remove(table);
        Ok(())
    }
}

/// Backend writing one pretty-printed `<table>.json` per table in a directory.
/// Writes are last-writer-wins.
pub struct JsonDirBackend {
    dir: PathBuf,
}

impl JsonDirBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn table_path(&self, table: &str) -> Result<PathBuf> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(anyhow!("Invalid table name: {:?}", table));
        }
        Ok(self.dir.join(format!("{}.json", table)))
    }
}

impl StoreBackend for JsonDirBackend {
    fn get_raw(&self, table: &str) -> Result<Option<Value>> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(None);
        }

        let mut file =
            File::open(&path).with_context(|| format!("Cannot open table at {:?}", path))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Table at {:?} is not valid JSON", path))?;
        Ok(Some(value))
    }

    fn set_raw(&self, table: &str, value: Value) -> Result<()> {
        let path = self.table_path(table)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create data directory {:?}", self.dir))?;

        let mut file =
            File::create(&path).with_context(|| format!("Cannot create table file at {:?}", path))?;
        let formatted = serde_json::to_string_pretty(&value)?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }

    fn delete(&self, table: &str) -> Result<()> {
        let path = self.table_path(table)?;
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("Cannot delete table at {:?}", path))?;
        }
        Ok(())
    }
}
