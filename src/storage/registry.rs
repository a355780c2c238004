//! Model registry: the versioning and staging ledger.
//!
//! The whole registry lives in memory behind one lock and is mirrored to
//! `<models_dir>/model_registry.json`. Every mutation builds the next
//! snapshot, writes it to a temporary file, renames it over the snapshot and
//! only then publishes it in memory, so readers never observe a half-applied
//! change and a failed write changes nothing.

use super::model_ref::{validate_model_name, ModelRef};
use super::Stage;
use crate::error::{Error, Result};
use crate::models::{Architecture, Framework};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const REGISTRY_FILE: &str = "model_registry.json";

/// Upper bound on same-second suffixes tried before giving up.
const MAX_VERSION_SUFFIX: u32 = 999;

/// One trained version of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stage: Stage,
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,
}

/// Everything known about one model name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub description: String,
    pub framework: Framework,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub latest_version: String,
    pub versions: BTreeMap<String, VersionRecord>,
    #[serde(default)]
    pub stage_versions: BTreeMap<Stage, String>,
    #[serde(default)]
    pub supported_operations: BTreeSet<String>,
}

impl ModelEntry {
    /// True when every occupied stage slot names a version in that stage and
    /// `latest_version` exists.
    pub fn is_consistent(&self) -> bool {
        self.versions.contains_key(&self.latest_version)
            && self
                .stage_versions
                .iter()
                .all(|(stage, version)| self.versions.get(version).is_some_and(|r| r.stage == *stage))
    }
}

/// A resolved reference: the owning entry and the selected version.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub entry: ModelEntry,
    pub record: VersionRecord,
}

impl ResolvedModel {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn version(&self) -> &str {
        &self.record.version
    }

    pub fn framework(&self) -> Framework {
        self.entry.framework
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model_name: String,
    pub version: String,
    pub description: String,
    pub framework: Framework,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelSummary {
    fn new(entry: &ModelEntry, record: &VersionRecord) -> Self {
        let description = if record.description.is_empty() {
            entry.description.clone()
        } else {
            record.description.clone()
        };
        Self {
            model_name: entry.name.clone(),
            version: record.version.clone(),
            description,
            framework: entry.framework,
            stage: record.stage,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Outcome of a stage change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChange {
    pub model_name: String,
    pub version: String,
    pub previous_stage: Stage,
    pub new_stage: Stage,
}

/// What a successful training run adds to the registry.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub framework: Framework,
    pub description: String,
    pub initial_stage: Stage,
    pub hyperparameters: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub architecture: Option<Architecture>,
}

type Reservations = Arc<Mutex<HashSet<(String, String)>>>;

/// A version id held for one in-flight training run.
///
/// No other run can obtain the same id for the same model until the
/// reservation is dropped.
#[derive(Debug)]
pub struct VersionReservation {
    name: String,
    version: String,
    reservations: Reservations,
}

impl VersionReservation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Drop for VersionReservation {
    fn drop(&mut self) {
        self.reservations
            .lock()
            .remove(&(self.name.clone(), self.version.clone()));
    }
}

type Snapshot = BTreeMap<String, ModelEntry>;

/// The registry. Share it behind an `Arc`.
#[derive(Debug)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    state: RwLock<Snapshot>,
    reservations: Reservations,
}

impl ModelRegistry {
    /// Load the registry from `models_dir`, starting empty when no snapshot exists yet.
    pub fn open(models_dir: impl Into<PathBuf>) -> Result<Self> {
        let models_dir = models_dir.into();
        fs::create_dir_all(&models_dir)?;
        let path = models_dir.join(REGISTRY_FILE);

        let snapshot: Snapshot = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::internal(format!("Failed to parse model registry {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Loaded {} models from registry {}", snapshot.len(), path.display());

        Ok(Self {
            models_dir,
            state: RwLock::new(snapshot),
            reservations: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.models_dir.join(REGISTRY_FILE)
    }

    pub fn model_count(&self) -> usize {
        self.state.read().len()
    }

    pub fn get(&self, name: &str) -> Option<ModelEntry> {
        self.state.read().get(name).cloned()
    }

    pub fn framework_of(&self, name: &str) -> Option<Framework> {
        self.state.read().get(name).map(|entry| entry.framework)
    }

    /// Resolve a reference to one version. A version selector takes
    /// precedence over a stage selector; with neither, the latest version is used.
    pub fn resolve(&self, model: &ModelRef) -> Result<ResolvedModel> {
        let state = self.state.read();
        let entry = state
            .get(&model.name)
            .ok_or_else(|| Error::not_found(format!("Model '{}' does not exist", model.name)))?;

        let version = match (&model.version, &model.stage) {
            (Some(version), _) => version.clone(),
            (None, Some(stage)) => {
                let stage: Stage = stage.parse()?;
                entry.stage_versions.get(&stage).cloned().ok_or_else(|| {
                    Error::not_found(format!(
                        "No version found for stage '{}' of model '{}'",
                        stage, model.name
                    ))
                })?
            }
            (None, None) => entry.latest_version.clone(),
        };

        let record = entry.versions.get(&version).cloned().ok_or_else(|| {
            Error::not_found(format!(
                "Version '{}' does not exist for model '{}'",
                version, model.name
            ))
        })?;

        Ok(ResolvedModel {
            entry: entry.clone(),
            record,
        })
    }

    /// Summaries ordered by model name, then version.
    ///
    /// Without `include_all_versions` each model contributes at most one row:
    /// the version occupying `stage` when a stage filter is given (models with
    /// that slot empty are skipped), otherwise the latest version.
    pub fn list(&self, framework: Option<Framework>, stage: Option<Stage>, include_all_versions: bool) -> Vec<ModelSummary> {
        let state = self.state.read();
        let mut summaries = Vec::new();
        for entry in state.values() {
            if framework.is_some_and(|f| f != entry.framework) {
                continue;
            }
            if include_all_versions {
                summaries.extend(
                    entry
                        .versions
                        .values()
                        .filter(|record| stage.map_or(true, |s| record.stage == s))
                        .map(|record| ModelSummary::new(entry, record)),
                );
                continue;
            }
            let version = match stage {
                Some(stage) => match entry.stage_versions.get(&stage) {
                    Some(version) => version,
                    None => continue,
                },
                None => &entry.latest_version,
            };
            if let Some(record) = entry.versions.get(version) {
                summaries.push(ModelSummary::new(entry, record));
            }
        }
        summaries
    }

    /// Hold a fresh version id for `name`, derived from `now` with second
    /// resolution. Same-second collisions get a `-NNN` suffix, which keeps ids
    /// unique and lexically ordered by creation.
    pub fn reserve_version(&self, name: &str, now: DateTime<Utc>) -> Result<VersionReservation> {
        let state = self.state.read();
        let existing = state.get(name);
        let mut reservations = self.reservations.lock();

        // Never hand out an id that sorts before the latest one, even if the clock stepped back
        let floor = existing.map(|entry| entry.latest_version.as_str()).unwrap_or("");
        let stamp = now.format("%Y%m%d%H%M%S").to_string();
        let base = match floor.get(..stamp.len()) {
            Some(floor_stamp) if floor_stamp > stamp.as_str() => floor_stamp.to_string(),
            _ => stamp,
        };
        let taken = |candidate: &str| {
            existing.is_some_and(|entry| entry.versions.contains_key(candidate))
                || reservations.contains(&(name.to_string(), candidate.to_string()))
                || candidate <= floor
        };

        let version = std::iter::once(base.clone())
            .chain((1..=MAX_VERSION_SUFFIX).map(|n| format!("{}-{:03}", base, n)))
            .find(|candidate| !taken(candidate))
            .ok_or_else(|| {
                Error::internal(format!(
                    "Could not allocate a version id for model '{}' at {}",
                    name, base
                ))
            })?;

        reservations.insert((name.to_string(), version.clone()));
        debug!("Reserved version {} for model {}", version, name);
        Ok(VersionReservation {
            name: name.to_string(),
            version,
            reservations: Arc::clone(&self.reservations),
        })
    }

    /// Record a successfully trained version and point its initial stage at it.
    ///
    /// Creates the entry on first use. A model's framework is fixed by its
    /// first version; a mismatch is rejected.
    pub fn record_training(&self, reservation: &VersionReservation, new: NewVersion) -> Result<()> {
        let name = reservation.name();
        let version = reservation.version();
        validate_model_name(name)?;
        let now = Utc::now();

        let mut state = self.state.write();
        if let Some(entry) = state.get(name) {
            if entry.framework != new.framework {
                return Err(Error::invalid_argument(format!(
                    "Model '{}' uses framework {}, not {}",
                    name, entry.framework, new.framework
                )));
            }
            if entry.versions.contains_key(version) {
                return Err(Error::internal(format!(
                    "Version '{}' already exists for model '{}'",
                    version, name
                )));
            }
        }

        let mut next = state.clone();
        let entry = next.entry(name.to_string()).or_insert_with(|| ModelEntry {
            name: name.to_string(),
            description: new.description.clone(),
            framework: new.framework,
            created_at: now,
            updated_at: now,
            latest_version: version.to_string(),
            versions: BTreeMap::new(),
            stage_versions: BTreeMap::new(),
            supported_operations: BTreeSet::from(["predict".to_string()]),
        });
        entry.versions.insert(
            version.to_string(),
            VersionRecord {
                version: version.to_string(),
                description: new.description,
                created_at: now,
                updated_at: now,
                stage: new.initial_stage,
                hyperparameters: new.hyperparameters,
                metrics: new.metrics,
                architecture: new.architecture,
            },
        );
        if version > entry.latest_version.as_str() {
            entry.latest_version = version.to_string();
        }
        entry.stage_versions.insert(new.initial_stage, version.to_string());
        entry.updated_at = now;

        self.persist(&next)?;
        *state = next;
        info!(
            "Recorded model {} version {} in stage {}",
            name, version, new.initial_stage
        );
        Ok(())
    }

    /// Move one version to `new_stage`.
    ///
    /// The previous stage slot is cleared only if it still points at this version.
    pub fn change_stage(
        &self,
        name: &str,
        version: &str,
        expected: Option<Stage>,
        new_stage: Stage,
    ) -> Result<StageChange> {
        let mut state = self.state.write();
        let entry = state
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Model '{}' does not exist", name)))?;
        let record = entry.versions.get(version).ok_or_else(|| {
            Error::not_found(format!("Version '{}' does not exist for model '{}'", version, name))
        })?;
        let previous_stage = record.stage;
        if let Some(expected) = expected {
            if expected != previous_stage {
                return Err(Error::FailedPrecondition(format!(
                    "Version '{}' is in stage '{}', not '{}'",
                    version, previous_stage, expected
                )));
            }
        }

        let now = Utc::now();
        let mut next = state.clone();
        if let Some(entry) = next.get_mut(name) {
            if let Some(record) = entry.versions.get_mut(version) {
                record.stage = new_stage;
                record.updated_at = now;
            }
            entry.stage_versions.insert(new_stage, version.to_string());
            if previous_stage != new_stage
                && entry.stage_versions.get(&previous_stage).map(String::as_str) == Some(version)
            {
                entry.stage_versions.remove(&previous_stage);
            }
            entry.updated_at = now;
        }

        self.persist(&next)?;
        *state = next;
        info!(
            "Model {} version {} moved from {} to {}",
            name, version, previous_stage, new_stage
        );
        Ok(StageChange {
            model_name: name.to_string(),
            version: version.to_string(),
            previous_stage,
            new_stage,
        })
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path();
        let tmp = self.models_dir.join(format!("{}.tmp", REGISTRY_FILE));
        let write = || -> std::io::Result<()> {
            let json = serde_json::to_vec_pretty(snapshot)?;
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::internal(format!("Failed to persist model registry {}: {}", path.display(), e))
        })?;
        debug!("Persisted registry snapshot with {} models", snapshot.len());
        Ok(())
    }
}
