//! Local cache tier
//!
//! A synchronous key/value backend holding two JSON arrays:
//! `pgap.assessments` and `pgap.responses`. A cache without a backend
//! ([`LocalCache::detached`]) reads as empty and refuses writes.

use async_trait::async_trait;
use pgap_common::models::{Assessment, ParticipantResponse, Role};
use pgap_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AssessmentStore, StoreTier};

pub const ASSESSMENTS_KEY: &str = "pgap.assessments";
pub const RESPONSES_KEY: &str = "pgap.responses";
pub const DEMO_DELETED_KEY: &str = "pgap.demo_deleted";

/// Minimal synchronous string store
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Internal("Local cache lock poisoned".to_string()))
}

/// Process-local backend
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Backend persisted as one JSON object (`key -> value`) on disk
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename.
pub struct FileBackend {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileBackend {
    /// Open a file backend, creating the parent directory if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Malformed local cache file, treating as empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CacheBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = lock(&self.guard)?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Local tier over an optional [`CacheBackend`]
#[derive(Clone)]
pub struct LocalCache {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl LocalCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// No cache in this environment
    pub fn detached() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn CacheBackend>> {
        self.backend.as_ref().ok_or(Error::CacheUnavailable)
    }

    /// Read a JSON array stored under `key`
    ///
    /// Missing, unreadable and malformed content all read as empty.
    pub fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        let raw = match backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read local cache");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Malformed local cache entry, treating as empty");
            Vec::new()
        })
    }

    pub fn write_collection<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let backend = self.backend()?;
        backend.set(key, serde_json::to_string(items)?)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.backend
            .as_ref()
            .and_then(|b| b.get(key).ok().flatten())
            .map_or(false, |v| v == "true")
    }

    pub fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        let backend = self.backend()?;
        if value {
            backend.set(key, "true".to_string())
        } else {
            backend.remove(key)
        }
    }

    // Assessments

    pub fn assessments(&self) -> Vec<Assessment> {
        self.read_collection(ASSESSMENTS_KEY)
    }

    pub fn find_assessment(&self, id: &str) -> Option<Assessment> {
        self.assessments().into_iter().find(|a| a.id == id)
    }

    pub fn upsert_assessment(&self, assessment: &Assessment) -> Result<()> {
        let mut all = self.assessments();
        match all.iter_mut().find(|a| a.id == assessment.id) {
            Some(existing) => *existing = assessment.clone(),
            None => all.push(assessment.clone()),
        }
        self.write_collection(ASSESSMENTS_KEY, &all)
    }

    /// Remove an assessment and its responses
    pub fn remove_assessment(&self, id: &str) -> Result<bool> {
        self.backend()?;

        let mut responses = self.all_responses();
        let before = responses.len();
        responses.retain(|r| r.assessment_id != id);
        if responses.len() != before {
            self.write_collection(RESPONSES_KEY, &responses)?;
        }

        let mut all = self.assessments();
        let before = all.len();
        all.retain(|a| a.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write_collection(ASSESSMENTS_KEY, &all)?;
        Ok(true)
    }

    // Responses

    pub fn all_responses(&self) -> Vec<ParticipantResponse> {
        self.read_collection(RESPONSES_KEY)
    }

    pub fn responses(&self, assessment_id: Option<&str>, role: Option<Role>) -> Vec<ParticipantResponse> {
        self.all_responses()
            .into_iter()
            .filter(|r| assessment_id.map_or(true, |id| r.assessment_id == id))
            .filter(|r| role.map_or(true, |role| r.role == role))
            .collect()
    }

    pub fn upsert_response(&self, response: &ParticipantResponse) -> Result<()> {
        let mut all = self.all_responses();
        match all.iter_mut().find(|r| r.key() == response.key()) {
            Some(existing) => *existing = response.clone(),
            None => all.push(response.clone()),
        }
        self.write_collection(RESPONSES_KEY, &all)
    }

    pub fn set_response_department(
        &self,
        assessment_id: &str,
        participant_id: &str,
        department: &str,
    ) -> Result<bool> {
        self.backend()?;
        let mut all = self.all_responses();
        let Some(response) = all
            .iter_mut()
            .find(|r| r.key() == (assessment_id, participant_id))
        else {
            return Ok(false);
        };
        response.department = Some(department.to_string());
        self.write_collection(RESPONSES_KEY, &all)?;
        Ok(true)
    }

    pub fn remove_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool> {
        self.backend()?;
        let mut all = self.all_responses();
        let before = all.len();
        all.retain(|r| r.key() != (assessment_id, participant_id));
        if all.len() == before {
            return Ok(false);
        }
        self.write_collection(RESPONSES_KEY, &all)?;
        Ok(true)
    }

    /// The response collection as untyped JSON, for record-level repair
    pub fn raw_responses(&self) -> Result<Vec<serde_json::Value>> {
        self.backend()?;
        Ok(self.read_collection(RESPONSES_KEY))
    }

    pub fn write_raw_responses(&self, responses: &[serde_json::Value]) -> Result<()> {
        self.write_collection(RESPONSES_KEY, responses)
    }
}

#[async_trait]
impl AssessmentStore for LocalCache {
    fn tier(&self) -> StoreTier {
        StoreTier::Local
    }

    async fn list_assessments(&self) -> Result<Vec<Assessment>> {
        Ok(self.assessments())
    }

    async fn get_assessment(&self, id: &str) -> Result<Option<Assessment>> {
        Ok(self.find_assessment(id))
    }

    async fn save_assessment(&self, assessment: &Assessment) -> Result<()> {
        self.upsert_assessment(assessment)
    }

    async fn delete_assessment(&self, id: &str) -> Result<bool> {
        self.remove_assessment(id)
    }

    async fn list_responses(
        &self,
        assessment_id: Option<&str>,
        role: Option<Role>,
    ) -> Result<Vec<ParticipantResponse>> {
        Ok(self.responses(assessment_id, role))
    }

    async fn add_response(&self, response: &ParticipantResponse) -> Result<()> {
        self.upsert_response(response)
    }

    async fn update_response_department(
        &self,
        assessment_id: &str,
        participant_id: &str,
        department: &str,
    ) -> Result<bool> {
        self.set_response_department(assessment_id, participant_id, department)
    }

    async fn delete_response(&self, assessment_id: &str, participant_id: &str) -> Result<bool> {
        self.remove_response(assessment_id, participant_id)
    }
}
