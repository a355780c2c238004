//! Framework adapters.
//!
//! Every supported ML framework is represented by a [`FrameworkBackend`]. The
//! [`FrameworkAdapter`] always holds one backend per [`Framework`]; frameworks
//! without a runtime in this process are registered as [`UnavailableBackend`]
//! so callers never special-case their absence.

pub mod kernel;
pub mod metrics;
pub mod mlp;
pub mod tabular;
pub mod tree;

use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub use mlp::{MlpBackend, MlpModel};
pub use tabular::{TabularBackend, TabularModel};

/// ML runtimes a model can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "scikit-learn")]
    ScikitLearn,
    #[serde(rename = "tensorflow")]
    Tensorflow,
    #[serde(rename = "pytorch")]
    Pytorch,
}

impl Framework {
    pub const ALL: [Framework; 3] = [Framework::ScikitLearn, Framework::Tensorflow, Framework::Pytorch];

    pub fn as_str(self) -> &'static str {
        match self {
            Framework::ScikitLearn => "scikit-learn",
            Framework::Tensorflow => "tensorflow",
            Framework::Pytorch => "pytorch",
        }
    }

    /// File extension of a persisted artifact; tensorflow models are directories.
    pub fn artifact_extension(self) -> Option<&'static str> {
        match self {
            Framework::ScikitLearn => Some("bin"),
            Framework::Tensorflow => None,
            Framework::Pytorch => Some("pt"),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Framework::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Unsupported framework: {}. Supported frameworks: scikit-learn, tensorflow, pytorch",
                    s
                ))
            })
    }
}

/// What a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classification,
    Regression,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Classification => "classification",
            ModelType::Regression => "regression",
        }
    }

    /// Model type recorded in a version's hyperparameters.
    pub fn from_hyperparameters(hyperparameters: &Hyperparameters) -> Result<Self> {
        match hyperparameters.get("model_type").map(str::to_lowercase).as_deref() {
            None | Some("classification") | Some("nlp") | Some("vision") => Ok(ModelType::Classification),
            Some("regression") => Ok(ModelType::Regression),
            Some(other) => Err(Error::invalid_argument(format!("Unsupported model type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            other => Err(Error::invalid_argument(format!("Unsupported activation: {}", other))),
        }
    }
}

/// Shape of a network that must be rebuilt before its weights can be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Architecture {
    Mlp { layers: Vec<usize>, activation: Activation },
}

/// String hyperparameters with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct Hyperparameters {
    values: BTreeMap<String, String>,
}

impl Hyperparameters {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse `key`, falling back to `default` when absent.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::invalid_argument(format!("Invalid value for hyperparameter '{}': {}", key, raw))),
        }
    }

    /// Parse `key` like [`parse_or`](Self::parse_or) and require it to lie in `range`.
    pub fn parse_in<T>(&self, key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
    where
        T: FromStr + PartialOrd + fmt::Display,
    {
        let value = self.parse_or(key, default)?;
        if !range.contains(&value) {
            return Err(Error::invalid_argument(format!(
                "Hyperparameter '{}' must be between {} and {}, got {}",
                key,
                range.start(),
                range.end(),
                value
            )));
        }
        Ok(value)
    }

    /// Parse `key` where both absence and the literal `none` mean no value.
    pub fn parse_optional<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("none") => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| Error::invalid_argument(format!("Invalid value for hyperparameter '{}': {}", key, raw))),
        }
    }
}

impl From<BTreeMap<String, String>> for Hyperparameters {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self::new(values)
    }
}

/// Feature matrix and target vector parsed from a training payload.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub features: Array2<f64>,
    pub target: Vec<f64>,
}

#[derive(Deserialize)]
struct RawTrainingData {
    features: serde_json::Value,
    target: Vec<f64>,
}

impl TrainingData {
    /// Parse `{"features": [[..], ..], "target": [..]}`.
    pub fn from_json(payload: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(|_| Error::invalid_argument("Invalid JSON training data"))?;
        let raw: RawTrainingData = serde_json::from_value(value)
            .map_err(|_| Error::invalid_argument("Training data must contain 'features' and 'target' keys"))?;
        let features = feature_matrix(&raw.features, FlatInput::Column)?;
        if features.nrows() != raw.target.len() {
            return Err(Error::invalid_argument(format!(
                "Training data has {} samples but {} targets",
                features.nrows(),
                raw.target.len()
            )));
        }
        Ok(Self { features, target: raw.target })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }
}

/// How a flat JSON list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatInput {
    /// Each value is one sample with a single feature
    Column,
    /// The list is a single sample
    Row,
}

/// Parse a prediction or training input into a row-major feature matrix.
///
/// Accepts a list of lists, a flat list (interpreted per `flat`), or an
/// object whose values form one sample in key order.
pub fn feature_matrix(value: &serde_json::Value, flat: FlatInput) -> Result<Array2<f64>> {
    use serde_json::Value;

    let rows: Vec<Vec<f64>> = match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_array) => items
            .iter()
            .map(|row| numbers(row.as_array().map(Vec::as_slice).unwrap_or_default()))
            .collect::<Result<_>>()?,
        Value::Array(items) => {
            let values = numbers(items)?;
            match flat {
                FlatInput::Column => values.into_iter().map(|v| vec![v]).collect(),
                FlatInput::Row => vec![values],
            }
        }
        Value::Object(map) => {
            let values: Vec<Value> = map.values().cloned().collect();
            vec![numbers(&values)?]
        }
        _ => return Err(Error::invalid_argument("Input data must be a list or dictionary")),
    };

    if rows.is_empty() {
        return Err(Error::invalid_argument("Input data must contain at least one sample"));
    }
    let width = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != width) {
        return Err(Error::invalid_argument("All samples must have the same number of features"));
    }
    let n_rows = rows.len();
    let flat_values: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, width), flat_values)
        .map_err(|e| Error::invalid_argument(format!("Malformed feature matrix: {}", e)))
}

fn numbers(values: &[serde_json::Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::invalid_argument(format!("Expected a number, found {}", v)))
        })
        .collect()
}

/// JSON representation of a predicted label: integral labels stay integers.
pub fn label_value(label: f64) -> serde_json::Value {
    if label.fract() == 0.0 && label.abs() < 9.0e15 {
        serde_json::Value::from(label as i64)
    } else {
        serde_json::Value::from(label)
    }
}

/// Sorted distinct labels of a target vector.
pub fn distinct_labels(target: &[f64]) -> Vec<f64> {
    let mut labels = target.to_vec();
    labels.sort_by(f64::total_cmp);
    labels.dedup();
    labels
}

/// Row-wise softmax.
pub(crate) fn softmax_rows(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    z
}

/// Mean over samples of the largest class probability.
pub(crate) fn mean_max_probability(proba: &Array2<f64>) -> f64 {
    if proba.nrows() == 0 {
        return 0.0;
    }
    let total: f64 = proba
        .rows()
        .into_iter()
        .map(|row| row.fold(0.0f64, |m, &v| m.max(v)))
        .sum();
    total / proba.nrows() as f64
}

/// A loaded, ready-to-predict model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelHandle {
    Tabular(TabularModel),
    Mlp(MlpModel),
}

impl ModelHandle {
    /// Per-feature importances, when the underlying estimator exposes them.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            ModelHandle::Tabular(model) => model.feature_importances(),
            ModelHandle::Mlp(_) => None,
        }
    }
}

/// Output of a successful training run.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub handle: ModelHandle,
    pub metrics: BTreeMap<String, f64>,
    pub architecture: Option<Architecture>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value: serde_json::Value,
    pub confidence: f64,
}

/// Uniform train/predict/save/load surface of one framework.
pub trait FrameworkBackend: Send + Sync {
    fn framework(&self) -> Framework;

    fn is_available(&self) -> bool {
        true
    }

    fn train(&self, data: &TrainingData, hyperparameters: &Hyperparameters, validate: bool) -> Result<TrainedModel>;

    fn predict(&self, model: &ModelHandle, input: &serde_json::Value, model_type: ModelType) -> Result<Prediction>;

    fn save(&self, model: &ModelHandle, path: &Path) -> Result<()>;

    fn load(&self, path: &Path, architecture: Option<&Architecture>) -> Result<ModelHandle>;
}

/// A framework that is known but has no runtime in this process.
pub struct UnavailableBackend {
    framework: Framework,
}

impl UnavailableBackend {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }

    fn unavailable(&self) -> Error {
        Error::Unavailable(format!("{} is not available", self.framework))
    }
}

impl FrameworkBackend for UnavailableBackend {
    fn framework(&self) -> Framework {
        self.framework
    }

    fn is_available(&self) -> bool {
        false
    }

    fn train(&self, _: &TrainingData, _: &Hyperparameters, _: bool) -> Result<TrainedModel> {
        Err(self.unavailable())
    }

    fn predict(&self, _: &ModelHandle, _: &serde_json::Value, _: ModelType) -> Result<Prediction> {
        Err(self.unavailable())
    }

    fn save(&self, _: &ModelHandle, _: &Path) -> Result<()> {
        Err(self.unavailable())
    }

    fn load(&self, _: &Path, _: Option<&Architecture>) -> Result<ModelHandle> {
        Err(self.unavailable())
    }
}

/// One backend per framework.
#[derive(Clone)]
pub struct FrameworkAdapter {
    backends: HashMap<Framework, Arc<dyn FrameworkBackend>>,
}

impl FrameworkAdapter {
    /// Register native backends for `enabled` frameworks that have one and
    /// unavailable placeholders for everything else.
    pub fn new(enabled: &[Framework]) -> Self {
        let backends = Framework::ALL
            .into_iter()
            .map(|framework| {
                let backend: Arc<dyn FrameworkBackend> = match framework {
                    Framework::ScikitLearn if enabled.contains(&framework) => Arc::new(TabularBackend),
                    Framework::Pytorch if enabled.contains(&framework) => Arc::new(MlpBackend),
                    _ => Arc::new(UnavailableBackend::new(framework)),
                };
                (framework, backend)
            })
            .collect();
        Self { backends }
    }

    pub fn with_backend(mut self, backend: Arc<dyn FrameworkBackend>) -> Self {
        self.backends.insert(backend.framework(), backend);
        self
    }

    pub fn backend(&self, framework: Framework) -> Arc<dyn FrameworkBackend> {
        match self.backends.get(&framework) {
            Some(backend) => Arc::clone(backend),
            None => Arc::new(UnavailableBackend::new(framework)),
        }
    }

    pub fn is_available(&self, framework: Framework) -> bool {
        self.backends.get(&framework).is_some_and(|b| b.is_available())
    }

    pub fn available_frameworks(&self) -> Vec<Framework> {
        Framework::ALL
            .into_iter()
            .filter(|f| self.is_available(*f))
            .collect()
    }
}

impl Default for FrameworkAdapter {
    fn default() -> Self {
        Self::new(&[Framework::ScikitLearn, Framework::Pytorch])
    }
}

pub(crate) fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value)?;
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;
    Ok(())
}

pub(crate) fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(format!("Model file not found: {}", path.display())))
        }
        Err(e) => return Err(e.into()),
    };
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| Error::internal(format!("Failed to load model {}: {}", path.display(), e)))
}
