//! Request processor: resolves model references, runs inference and
//! orchestrates training against the registry, the artifact store and the
//! instance cache.

use super::model_cache::ModelCache;
use super::streaming::{consume_chunks, error_chunk, produce_chunks, ResultChunks, TrainingChunk};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::{
    Framework, FrameworkAdapter, Hyperparameters, ModelHandle, ModelType, TrainedModel, TrainingData,
};
use crate::storage::artifacts::model_id;
use crate::storage::{
    validate_model_name, ArtifactGuard, ArtifactStore, ModelRef, ModelRegistry, ModelSummary, NewVersion,
    ResolvedModel, Stage, StageChange,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parameter asking for per-feature importances in the response metadata.
pub const INCLUDE_FEATURE_IMPORTANCE: &str = "include_feature_importance";

/// Parameter overriding the configured stream chunk size.
pub const CHUNK_SIZE: &str = "chunk_size";

/// Result of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// JSON-serialized prediction
    pub result: String,
    pub confidence: f64,
    pub metadata: BTreeMap<String, String>,
}

/// A training job, already reassembled when it arrived in chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingRequest {
    pub training_data: String,
    pub model_name: String,
    pub hyperparameters: BTreeMap<String, String>,
    pub validate: bool,
    /// Defaults to scikit-learn
    pub framework: Option<String>,
    /// Defaults to development
    pub initial_stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub model_id: String,
    pub version: String,
    pub stage: Stage,
    pub metrics: BTreeMap<String, f64>,
}

/// Everything known about one resolved model version.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub model_name: String,
    pub version: String,
    pub description: String,
    pub framework: Framework,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub supported_operations: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub available_versions: Vec<String>,
    pub stage_versions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub uptime: Duration,
    pub models: usize,
    pub frameworks: Vec<Framework>,
}

/// Sets its flag when dropped, which tells blocking work spawned by an
/// abandoned request to discard its output.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct RequestProcessor {
    registry: Arc<ModelRegistry>,
    cache: Arc<ModelCache>,
    adapter: FrameworkAdapter,
    artifacts: ArtifactStore,
    chunk_size: usize,
    started_at: Instant,
}

impl RequestProcessor {
    pub fn new(registry: Arc<ModelRegistry>, adapter: FrameworkAdapter, chunk_size: usize) -> Self {
        let artifacts = ArtifactStore::new(registry.models_dir());
        Self {
            registry,
            cache: Arc::new(ModelCache::new()),
            adapter,
            artifacts,
            chunk_size,
            started_at: Instant::now(),
        }
    }

    /// Open the registry under `storage.models_dir` and register the enabled frameworks.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let registry = ModelRegistry::open(&config.storage.models_dir)?;
        let artifacts = ArtifactStore::new(registry.models_dir());
        artifacts.ensure_layout()?;
        let adapter = FrameworkAdapter::new(&config.enabled_frameworks()?);
        info!(
            "Frameworks available: {}",
            join_frameworks(&adapter.available_frameworks())
        );
        Ok(Self::new(Arc::new(registry), adapter, config.streaming.chunk_size))
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn adapter(&self) -> &FrameworkAdapter {
        &self.adapter
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run inference on `input` (a JSON document) with the referenced model.
    pub async fn process(
        &self,
        input: &str,
        model: &ModelRef,
        parameters: &HashMap<String, String>,
    ) -> Result<Processed> {
        let started = Instant::now();
        let resolved = self.registry.resolve(model)?;
        let input: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| Error::invalid_argument(format!("Invalid JSON input data: {}", e)))?;
        let model_type = ModelType::from_hyperparameters(&Hyperparameters::new(
            resolved.record.hyperparameters.clone(),
        ))?;

        let handle = self.instance(&resolved).await?;
        let backend = self.adapter.backend(resolved.framework());
        let predict_handle = Arc::clone(&handle);
        let prediction = tokio::task::spawn_blocking(move || {
            backend.predict(&predict_handle, &input, model_type)
        })
        .await??;

        let mut metadata = BTreeMap::from([
            ("model_type".to_string(), model_type.as_str().to_string()),
            ("framework".to_string(), resolved.framework().to_string()),
            ("version".to_string(), resolved.version().to_string()),
            ("stage".to_string(), resolved.record.stage.to_string()),
        ]);
        let wants_importances = parameters
            .get(INCLUDE_FEATURE_IMPORTANCE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if wants_importances {
            if let Some(importances) = handle.feature_importances() {
                metadata.insert("feature_importances".to_string(), serde_json::to_string(&importances)?);
            }
        }
        metadata.insert(
            "processing_time_ms".to_string(),
            started.elapsed().as_millis().to_string(),
        );

        debug!(
            "Processed request for {} version {} in {:?}",
            resolved.name(),
            resolved.version(),
            started.elapsed()
        );
        Ok(Processed {
            result: serde_json::to_string(&prediction.value)?,
            confidence: prediction.confidence,
            metadata,
        })
    }

    /// Run inference and cut the serialized result into chunks. Failures,
    /// including an invalid `chunk_size` parameter, become a single error chunk.
    pub async fn process_stream(
        &self,
        input: &str,
        model: &ModelRef,
        parameters: &HashMap<String, String>,
    ) -> ResultChunks {
        let chunks = async {
            let chunk_size = match parameters.get(CHUNK_SIZE) {
                Some(value) => value.trim().parse::<usize>().map_err(|_| {
                    Error::invalid_argument(format!("Invalid chunk_size parameter: {}", value))
                })?,
                None => self.chunk_size,
            };
            let processed = self.process(input, model, parameters).await?;
            produce_chunks(processed.result, processed.confidence, processed.metadata, chunk_size)
        }
        .await;

        chunks.unwrap_or_else(|e| {
            warn!("Streaming request for {} failed: {}", model, e);
            error_chunk(e.to_string())
        })
    }

    /// Train a new version and record it in the registry.
    pub async fn train(&self, request: TrainingRequest) -> Result<TrainingOutcome> {
        let framework: Framework = request
            .framework
            .as_deref()
            .unwrap_or(Framework::ScikitLearn.as_str())
            .parse()?;
        let stage: Stage = request
            .initial_stage
            .as_deref()
            .unwrap_or(Stage::Development.as_str())
            .parse()?;
        let name = request.model_name;
        validate_model_name(&name)?;
        if let Some(existing) = self.registry.framework_of(&name) {
            if existing != framework {
                return Err(Error::invalid_argument(format!(
                    "Model '{}' uses framework {}, not {}",
                    name, existing, framework
                )));
            }
        }
        let backend = self.adapter.backend(framework);
        if !backend.is_available() {
            return Err(Error::Unavailable(format!("{} is not available", framework)));
        }

        let reservation = self.registry.reserve_version(&name, Utc::now())?;
        let version = reservation.version().to_string();
        info!("Training {} model {} version {}", framework, name, version);

        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));

        let hyperparameters = Hyperparameters::new(request.hyperparameters.clone());
        let artifacts = self.artifacts.clone();
        let (trained, guard) = {
            let cancelled = Arc::clone(&cancelled);
            let name = name.clone();
            let version = version.clone();
            let training_data = request.training_data;
            let validate = request.validate;
            tokio::task::spawn_blocking(move || -> Result<(TrainedModel, ArtifactGuard)> {
                let data = TrainingData::from_json(&training_data)?;
                let trained = backend.train(&data, &hyperparameters, validate)?;
                if cancelled.load(Ordering::SeqCst) {
                    return Err(Error::internal("Training was cancelled"));
                }
                let mut guard = artifacts.stage(framework, &name, &version)?;
                backend.save(&trained.handle, guard.temp_path())?;
                guard.install()?;
                Ok((trained, guard))
            })
            .await??
        };

        let description = request
            .hyperparameters
            .get("description")
            .cloned()
            .unwrap_or_else(|| format!("Model {}", name));
        let new = NewVersion {
            framework,
            description,
            initial_stage: stage,
            hyperparameters: request.hyperparameters,
            metrics: trained.metrics.clone(),
            architecture: trained.architecture.clone(),
        };

        let registry = Arc::clone(&self.registry);
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || -> Result<()> {
            if cancelled.load(Ordering::SeqCst) {
                return Err(Error::internal("Training was cancelled"));
            }
            registry.record_training(&reservation, new)?;
            guard.keep();
            cache.invalidate_all();
            Ok(())
        })
        .await??;

        info!("Trained model {} version {} in stage {}", name, version, stage);
        Ok(TrainingOutcome {
            model_id: model_id(&name, &version),
            version,
            stage,
            metrics: trained.metrics,
        })
    }

    /// Reassemble a chunked upload, then train.
    pub async fn train_stream<S>(&self, chunks: S) -> Result<TrainingOutcome>
    where
        S: Stream<Item = Result<TrainingChunk>>,
    {
        let request = consume_chunks(chunks).await?;
        self.train(request).await
    }

    pub fn model_info(&self, model: &ModelRef) -> Result<ModelInfo> {
        let resolved = self.registry.resolve(model)?;
        let ResolvedModel { entry, record } = resolved;

        let mut properties = record.hyperparameters.clone();
        for (metric, value) in &record.metrics {
            properties.insert(format!("metric_{}", metric), value.to_string());
        }
        if let Some(architecture) = &record.architecture {
            properties.insert("architecture".to_string(), serde_json::to_string(architecture)?);
        }

        let description = if record.description.is_empty() {
            entry.description.clone()
        } else {
            record.description.clone()
        };

        Ok(ModelInfo {
            model_name: entry.name.clone(),
            version: record.version.clone(),
            description,
            framework: entry.framework,
            stage: record.stage,
            created_at: record.created_at,
            updated_at: record.updated_at,
            supported_operations: entry.supported_operations.iter().cloned().collect(),
            properties,
            available_versions: entry.versions.keys().cloned().collect(),
            stage_versions: entry
                .stage_versions
                .iter()
                .map(|(stage, version)| (stage.to_string(), version.clone()))
                .collect(),
        })
    }

    /// List models; filters are wire strings where `None` means no filter.
    pub fn list(
        &self,
        framework_filter: Option<&str>,
        stage_filter: Option<&str>,
        include_all_versions: bool,
    ) -> Result<Vec<ModelSummary>> {
        let framework = framework_filter.map(str::parse::<Framework>).transpose()?;
        let stage = stage_filter.map(str::parse::<Stage>).transpose()?;
        Ok(self.registry.list(framework, stage, include_all_versions))
    }

    pub async fn change_stage(
        &self,
        model_name: &str,
        version: &str,
        current_stage: Option<&str>,
        new_stage: &str,
    ) -> Result<StageChange> {
        let expected = current_stage.map(str::parse::<Stage>).transpose()?;
        let new_stage: Stage = new_stage.parse()?;

        let registry = Arc::clone(&self.registry);
        let model_name = model_name.to_string();
        let version = version.to_string();
        tokio::task::spawn_blocking(move || registry.change_stage(&model_name, &version, expected, new_stage))
            .await?
    }

    pub fn health(&self) -> Result<HealthReport> {
        let models_dir = self.registry.models_dir();
        if !models_dir.is_dir() {
            return Err(Error::Unavailable(format!(
                "Models directory {} does not exist",
                models_dir.display()
            )));
        }
        Ok(HealthReport {
            uptime: self.started_at.elapsed(),
            models: self.registry.model_count(),
            frameworks: self.adapter.available_frameworks(),
        })
    }

    async fn instance(&self, resolved: &ResolvedModel) -> Result<Arc<ModelHandle>> {
        let backend = self.adapter.backend(resolved.framework());
        if !backend.is_available() {
            return Err(Error::Unavailable(format!("{} is not available", resolved.framework())));
        }
        let path = self
            .artifacts
            .path(resolved.framework(), resolved.name(), resolved.version());
        let architecture = resolved.record.architecture.clone();
        self.cache
            .get_or_load(resolved.name(), resolved.version(), move || {
                if !path.exists() {
                    return Err(Error::not_found(format!(
                        "Model file not found: {}",
                        path.display()
                    )));
                }
                backend.load(&path, architecture.as_ref())
            })
            .await
    }
}

pub fn join_frameworks(frameworks: &[Framework]) -> String {
    frameworks
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    const BINARY: &str = r#"{"features": [[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [1.0, 1.0], [0.9, 1.1], [1.1, 0.9]], "target": [0, 0, 0, 1, 1, 1]}"#;

    fn processor(dir: &TempDir) -> RequestProcessor {
        let registry = ModelRegistry::open(dir.path()).unwrap();
        RequestProcessor::new(Arc::new(registry), FrameworkAdapter::default(), 1024)
    }

    fn request(name: &str, stage: Option<&str>) -> TrainingRequest {
        TrainingRequest {
            training_data: BINARY.to_string(),
            model_name: name.to_string(),
            hyperparameters: BTreeMap::from([
                ("model_type".to_string(), "classification".to_string()),
                ("n_estimators".to_string(), "10".to_string()),
            ]),
            validate: true,
            framework: None,
            initial_stage: stage.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_train_then_process() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let outcome = processor.train(request("m1", None)).await.unwrap();
        assert_eq!(outcome.stage, Stage::Development);
        assert_eq!(outcome.model_id, format!("m1_{}", outcome.version));
        assert!(outcome.metrics.contains_key("accuracy"));
        assert!(dir
            .path()
            .join("scikit-learn")
            .join(format!("m1_{}.bin", outcome.version))
            .exists());

        let params = HashMap::from([(INCLUDE_FEATURE_IMPORTANCE.to_string(), "TRUE".to_string())]);
        let processed = processor
            .process("[[0.05, 0.05], [1.0, 1.0]]", &ModelRef::new("m1"), &params)
            .await
            .unwrap();
        assert_eq!(processed.result, "[0,1]");
        assert!(processed.confidence > 0.5);
        assert_eq!(processed.metadata["framework"], "scikit-learn");
        assert_eq!(processed.metadata["version"], outcome.version);
        assert_eq!(processed.metadata["stage"], "development");
        assert_eq!(processed.metadata["model_type"], "classification");
        assert!(processed.metadata.contains_key("processing_time_ms"));
        let importances: Vec<f64> = serde_json::from_str(&processed.metadata["feature_importances"]).unwrap();
        assert_eq!(importances.len(), 2);
        assert_eq!(processor.cache().stats().cached_models, 1);
    }

    #[tokio::test]
    async fn test_training_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        processor.train(request("m1", None)).await.unwrap();
        processor
            .process("[[0.0, 0.0]]", &ModelRef::new("m1"), &HashMap::new())
            .await
            .unwrap();
        let before = processor.cache().stats();
        assert_eq!(before.cached_models, 1);

        processor.train(request("m2", None)).await.unwrap();
        let after = processor.cache().stats();
        assert_eq!(after.cached_models, 0);
        assert!(after.generation > before.generation);
    }

    #[tokio::test]
    async fn test_invalid_training_requests_touch_nothing() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);

        let mut bad_stage = request("m1", Some("live"));
        assert!(matches!(processor.train(bad_stage.clone()).await, Err(Error::InvalidArgument(_))));
        bad_stage.initial_stage = None;
        bad_stage.framework = Some("caffe".into());
        assert!(matches!(processor.train(bad_stage).await, Err(Error::InvalidArgument(_))));

        let mut tensorflow = request("m1", None);
        tensorflow.framework = Some("tensorflow".into());
        assert!(matches!(processor.train(tensorflow).await, Err(Error::Unavailable(_))));

        let mut bad_data = request("m1", None);
        bad_data.training_data = "{\"features\": [[1.0]]}".into();
        assert!(matches!(processor.train(bad_data).await, Err(Error::InvalidArgument(_))));

        assert!(matches!(
            processor.train(request("../escape", None)).await,
            Err(Error::InvalidArgument(_))
        ));

        assert_eq!(processor.registry().model_count(), 0);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("scikit-learn"))
            .map(|entries| entries.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_framework_is_fixed_by_first_version() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        processor.train(request("m1", None)).await.unwrap();

        let mut retrain = request("m1", None);
        retrain.framework = Some("pytorch".into());
        assert!(matches!(processor.train(retrain).await, Err(Error::InvalidArgument(_))));
        assert_eq!(processor.registry().get("m1").unwrap().versions.len(), 1);
    }

    #[tokio::test]
    async fn test_process_errors() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let params = HashMap::new();
        assert!(matches!(
            processor.process("[[1, 2]]", &ModelRef::new("ghost"), &params).await,
            Err(Error::NotFound(_))
        ));

        processor.train(request("m1", None)).await.unwrap();
        assert!(matches!(
            processor.process("not json", &ModelRef::new("m1"), &params).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            processor
                .process("[[1, 2]]", &ModelRef::new("m1").with_stage("production"), &params)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let outcome = processor.train(request("m1", None)).await.unwrap();
        std::fs::remove_file(
            dir.path()
                .join("scikit-learn")
                .join(format!("m1_{}.bin", outcome.version)),
        )
        .unwrap();
        assert!(matches!(
            processor.process("[[1, 2]]", &ModelRef::new("m1"), &HashMap::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_process_stream_chunks_and_errors() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        processor.train(request("m1", None)).await.unwrap();

        let params = HashMap::from([(CHUNK_SIZE.to_string(), "2".to_string())]);
        let chunks: Vec<_> = processor
            .process_stream("[[0.0, 0.0], [1.0, 1.0], [0.1, 0.1]]", &ModelRef::new("m1"), &params)
            .await
            .collect();
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.iter().copied()).collect();
        assert_eq!(String::from_utf8(joined).unwrap(), "[0,1,0]");
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.success));
        assert!(chunks[3].metadata.contains_key("version"));

        let params = HashMap::from([(CHUNK_SIZE.to_string(), "0".to_string())]);
        let chunks: Vec<_> = processor
            .process_stream("[[0.0, 0.0]]", &ModelRef::new("m1"), &params)
            .await
            .collect();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].success);

        let chunks: Vec<_> = processor
            .process_stream("[[0.0, 0.0]]", &ModelRef::new("ghost"), &HashMap::new())
            .await
            .collect();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].success && chunks[0].is_last_chunk);
        assert!(chunks[0].error_message.contains("ghost"));
    }

    #[tokio::test]
    async fn test_train_stream() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let (head, tail) = BINARY.split_at(40);
        let chunks: Vec<Result<TrainingChunk>> = vec![
            Ok(TrainingChunk {
                data: bytes::Bytes::copy_from_slice(head.as_bytes()),
                is_first_chunk: true,
                model_name: "streamed".into(),
                initial_stage: "staging".into(),
                ..Default::default()
            }),
            Ok(TrainingChunk {
                data: bytes::Bytes::copy_from_slice(tail.as_bytes()),
                is_last_chunk: true,
                ..Default::default()
            }),
        ];
        let outcome = processor.train_stream(stream::iter(chunks)).await.unwrap();
        assert_eq!(outcome.stage, Stage::Staging);
        let entry = processor.registry().get("streamed").unwrap();
        assert_eq!(entry.framework, Framework::ScikitLearn);
        assert_eq!(entry.stage_versions.get(&Stage::Staging), Some(&outcome.version));
    }

    #[tokio::test]
    async fn test_model_info_and_list() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let mut req = request("m1", Some("production"));
        req.hyperparameters.insert("description".into(), "churn classifier".into());
        let outcome = processor.train(req).await.unwrap();

        let info = processor.model_info(&ModelRef::new("m1").with_stage("production")).unwrap();
        assert_eq!(info.version, outcome.version);
        assert_eq!(info.description, "churn classifier");
        assert_eq!(info.stage, Stage::Production);
        assert_eq!(info.available_versions, vec![outcome.version.clone()]);
        assert_eq!(info.stage_versions.get("production"), Some(&outcome.version));
        assert_eq!(info.properties.get("model_type").map(String::as_str), Some("classification"));
        assert!(info.properties.contains_key("metric_accuracy"));
        assert_eq!(info.supported_operations, vec!["predict".to_string()]);

        assert_eq!(processor.list(Some("scikit-learn"), Some("production"), false).unwrap().len(), 1);
        assert!(processor.list(Some("pytorch"), None, true).unwrap().is_empty());
        assert!(matches!(processor.list(Some("caffe"), None, false), Err(Error::InvalidArgument(_))));
        assert!(matches!(processor.list(None, Some("live"), false), Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_change_stage_parses_before_touching_registry() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let outcome = processor.train(request("m1", None)).await.unwrap();

        assert!(matches!(
            processor.change_stage("m1", &outcome.version, None, "live").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.change_stage("m1", &outcome.version, Some("prod"), "production").await,
            Err(Error::InvalidArgument(_))
        ));

        let change = processor
            .change_stage("m1", &outcome.version, Some("development"), "production")
            .await
            .unwrap();
        assert_eq!(change.previous_stage, Stage::Development);
        assert_eq!(change.new_stage, Stage::Production);
        assert_eq!(
            processor.registry().resolve(&ModelRef::new("m1").with_stage("production")).unwrap().version(),
            outcome.version
        );
    }

    #[test]
    fn test_health_report() {
        let dir = TempDir::new().unwrap();
        let processor = processor(&dir);
        let report = processor.health().unwrap();
        assert_eq!(report.models, 0);
        assert_eq!(report.frameworks, vec![Framework::ScikitLearn, Framework::Pytorch]);
        assert_eq!(join_frameworks(&report.frameworks), "scikit-learn, pytorch");

        std::fs::remove_dir_all(dir.path()).unwrap();
        assert!(matches!(processor.health(), Err(Error::Unavailable(_))));
    }
}
