use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::FormRecord;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Duplicate(String),
    NotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "metadata file error: {e}"),
            StoreError::Json(e) => write!(f, "metadata file is not valid JSON: {e}"),
            StoreError::Duplicate(id) => write!(f, "form {id} is already recorded"),
            StoreError::NotFound(id) => write!(f, "form {id} not found"),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

/// Form metadata kept as a pretty-printed JSON array in a single file.
///
/// Every mutation is a read-modify-write of the whole file, serialized by an
/// in-process lock and written through a temp file + rename so readers never
/// observe a half-written array.
pub struct FormStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FormStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order; empty when the file does not exist yet.
    pub fn load_all(&self) -> Result<Vec<FormRecord>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    pub fn find(&self, form_id: &str) -> Result<Option<FormRecord>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|f| f.form_id == form_id))
    }

    pub fn append(&self, record: FormRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut forms = self.read()?;
        if forms.iter().any(|f| f.form_id == record.form_id) {
            return Err(StoreError::Duplicate(record.form_id));
        }
        forms.push(record);
        self.write(&forms)
    }

    /// Apply `change` to the record with `form_id` and persist. Returns the updated record.
    pub fn update<F>(&self, form_id: &str, change: F) -> Result<FormRecord, StoreError>
    where
        F: FnOnce(&mut FormRecord),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut forms = self.read()?;
        let target = forms
            .iter_mut()
            .find(|f| f.form_id == form_id)
            .ok_or_else(|| StoreError::NotFound(form_id.to_string()))?;
        change(target);
        let updated = target.clone();
        self.write(&forms)?;
        Ok(updated)
    }

    /// Remove the record with `form_id`. Returns false when nothing matched.
    pub fn remove(&self, form_id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut forms = self.read()?;
        let before = forms.len();
        forms.retain(|f| f.form_id != form_id);
        if forms.len() == before {
            return Ok(false);
        }
        self.write(&forms)?;
        Ok(true)
    }

    fn read(&self) -> Result<Vec<FormRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, forms: &[FormRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(forms)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
