use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::answers::AnswerStore;
use crate::error::{PersistenceError, SchemaLoadError};
use crate::spec::schema::SurveySchema;

/// Supplies the survey schema once per run.
pub trait SchemaSource {
    fn load(&self) -> Result<SurveySchema, SchemaLoadError>;
}

/// Schema read from a JSON file.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SchemaSource for SchemaFile {
    fn load(&self) -> Result<SurveySchema, SchemaLoadError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| SchemaLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        SurveySchema::from_json_str(&contents)
    }
}

/// Schema held as an in-memory JSON document.
#[derive(Debug, Clone)]
pub struct InlineSchema(pub String);

impl SchemaSource for InlineSchema {
    fn load(&self) -> Result<SurveySchema, SchemaLoadError> {
        SurveySchema::from_json_str(&self.0)
    }
}

impl SchemaSource for SurveySchema {
    fn load(&self) -> Result<SurveySchema, SchemaLoadError> {
        Ok(self.clone())
    }
}

/// External key-value collaborator holding the answer map between runs.
pub trait AnswerPersistence {
    /// `Ok(None)` when nothing was stored yet.
    fn load(&self) -> Result<Option<AnswerStore>, PersistenceError>;
    fn save(&self, answers: &AnswerStore) -> Result<(), PersistenceError>;
}

/// Keeps the last saved map in memory.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<AnswerStore>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: AnswerStore) -> Self {
        Self {
            saved: Mutex::new(Some(answers)),
        }
    }

    pub fn saved(&self) -> Option<AnswerStore> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AnswerPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<AnswerStore>, PersistenceError> {
        Ok(self.saved())
    }

    fn save(&self, answers: &AnswerStore) -> Result<(), PersistenceError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(answers.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Cbor,
}

impl FileFormat {
    /// `.cbor` files are binary, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("cbor") => FileFormat::Cbor,
            _ => FileFormat::Json,
        }
    }
}

/// Answers stored in a single file on disk.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
    format: FileFormat,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AnswerPersistence for FilePersistence {
    fn load(&self) -> Result<Option<AnswerStore>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        let store = match self.format {
            FileFormat::Cbor => AnswerStore::from_cbor(&bytes)?,
            FileFormat::Json => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|err| PersistenceError::Decode(err.to_string()))?;
                AnswerStore::restore(&value)?
            }
        };
        Ok(Some(store))
    }

    fn save(&self, answers: &AnswerStore) -> Result<(), PersistenceError> {
        let bytes = match self.format {
            FileFormat::Cbor => answers.to_cbor()?,
            FileFormat::Json => serde_json::to_vec_pretty(&answers.serialize())
                .map_err(|err| PersistenceError::Encode(err.to_string()))?,
        };
        fs::write(&self.path, bytes).map_err(|err| self.io_error(err))
    }
}
