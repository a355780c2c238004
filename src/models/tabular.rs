//! Native tabular estimators served under the `scikit-learn` framework.
//!
//! Supported algorithms:
//! - classification: `random_forest` (default), `decision_tree`, `logistic_regression`, `svm`
//! - regression: `random_forest` (default), `decision_tree`, `linear_regression`, `svr`

use super::kernel::{KernelChoice, SvmClassifier, SvmRegressor};
use super::metrics;
use super::tree::{DecisionTree, Target, TreeParams};
use super::{
    distinct_labels, feature_matrix, label_value, mean_max_probability, read_artifact, softmax_rows, write_artifact,
    Architecture, FlatInput, Framework, FrameworkBackend, Hyperparameters, ModelHandle, ModelType, Prediction,
    TrainedModel, TrainingData,
};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const LOGISTIC_MAX_ITER: usize = 1000;
const LOGISTIC_LEARNING_RATE: f64 = 0.5;
const MAX_ESTIMATORS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RandomForest,
    DecisionTree,
    LogisticRegression,
    LinearRegression,
    Svm,
    Svr,
}

impl Algorithm {
    fn parse(raw: &str, model_type: ModelType) -> Result<Self> {
        match (raw.to_lowercase().as_str(), model_type) {
            ("random_forest", _) => Ok(Algorithm::RandomForest),
            ("decision_tree", _) => Ok(Algorithm::DecisionTree),
            ("logistic_regression", ModelType::Classification) => Ok(Algorithm::LogisticRegression),
            ("linear_regression", ModelType::Regression) => Ok(Algorithm::LinearRegression),
            ("svm", ModelType::Classification) => Ok(Algorithm::Svm),
            ("svr", ModelType::Regression) => Ok(Algorithm::Svr),
            (other, _) => Err(Error::invalid_argument(format!(
                "Unsupported {} algorithm: {}",
                model_type.as_str(),
                other
            ))),
        }
    }
}

/// Hyperparameters understood by the tabular estimators.
#[derive(Debug, Clone)]
pub struct TabularParams {
    pub algorithm: Algorithm,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub c: f64,
    pub random_state: u64,
    /// Only read by `svm` and `svr`
    pub kernel: KernelChoice,
    pub epsilon: f64,
}

impl TabularParams {
    pub fn from_hyperparameters(hp: &Hyperparameters, model_type: ModelType) -> Result<Self> {
        let algorithm = Algorithm::parse(hp.get_or("algorithm", "random_forest"), model_type)?;
        let kernel = match algorithm {
            Algorithm::Svm | Algorithm::Svr => KernelChoice::from_hyperparameters(hp)?,
            _ => KernelChoice::default(),
        };
        let params = Self {
            algorithm,
            n_estimators: hp.parse_in("n_estimators", 100, 1..=MAX_ESTIMATORS)?,
            max_depth: hp.parse_optional("max_depth")?,
            c: hp.parse_or("C", 1.0)?,
            random_state: hp.parse_or("random_state", 42)?,
            kernel,
            epsilon: hp.parse_or("epsilon", 0.1)?,
        };
        if !params.c.is_finite() || params.c <= 0.0 {
            return Err(Error::invalid_argument("C must be positive"));
        }
        if !params.epsilon.is_finite() || params.epsilon < 0.0 {
            return Err(Error::invalid_argument("epsilon must not be negative"));
        }
        Ok(params)
    }
}

/// Per-column standardisation fitted on the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, m)| {
                let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
                if var > 0.0 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();
        Self { mean, scale }
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Estimator {
    Forest(Vec<DecisionTree>),
    Tree(DecisionTree),
    Logistic {
        scaler: Standardizer,
        /// `n_features x n_classes`
        weights: Array2<f64>,
        bias: Array1<f64>,
    },
    Linear {
        coefficients: Array1<f64>,
        intercept: f64,
    },
    Svc {
        scaler: Standardizer,
        svm: SvmClassifier,
    },
    Svr {
        scaler: Standardizer,
        svr: SvmRegressor,
    },
}

/// A fitted tabular estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularModel {
    model_type: ModelType,
    algorithm: Algorithm,
    n_features: usize,
    /// Sorted class labels; empty for regressors
    classes: Vec<f64>,
    estimator: Estimator,
}

impl TabularModel {
    pub fn fit(data: &TrainingData, params: &TabularParams, model_type: ModelType) -> Result<Self> {
        if data.target.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_argument("Target values must be finite numbers"));
        }
        let x = data.features.view();
        let n_features = x.ncols();
        let n_samples = x.nrows();
        if n_features == 0 {
            return Err(Error::invalid_argument("Training data must have at least one feature"));
        }
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            ..TreeParams::default()
        };

        let (classes, estimator) = match model_type {
            ModelType::Classification => {
                let classes = distinct_labels(&data.target);
                let labels: Vec<usize> = data
                    .target
                    .iter()
                    .map(|t| classes.iter().position(|c| c == t).unwrap_or(0))
                    .collect();
                let target = Target::Classes {
                    labels: &labels,
                    n_classes: classes.len(),
                };
                let estimator = match params.algorithm {
                    Algorithm::RandomForest => {
                        let sqrt = ((n_features as f64).sqrt() as usize).max(1);
                        let forest_params = TreeParams {
                            max_features: Some(sqrt),
                            ..tree_params
                        };
                        Estimator::Forest(fit_forest(x, target, &forest_params, params))
                    }
                    Algorithm::DecisionTree => {
                        let mut rng = StdRng::seed_from_u64(params.random_state);
                        Estimator::Tree(DecisionTree::fit(x, target, (0..n_samples).collect(), &tree_params, &mut rng))
                    }
                    Algorithm::LogisticRegression => fit_logistic(x, &labels, classes.len(), params.c),
                    Algorithm::Svm => {
                        let scaler = Standardizer::fit(x);
                        let xs = scaler.transform(x);
                        let svm = SvmClassifier::fit(
                            xs.view(),
                            &labels,
                            classes.len(),
                            params.kernel,
                            params.c,
                            params.random_state,
                        );
                        Estimator::Svc { scaler, svm }
                    }
                    Algorithm::LinearRegression | Algorithm::Svr => {
                        return Err(Error::invalid_argument("linear_regression and svr are regression algorithms"))
                    }
                };
                (classes, estimator)
            }
            ModelType::Regression => {
                let target = Target::Values(&data.target);
                let estimator = match params.algorithm {
                    Algorithm::RandomForest => Estimator::Forest(fit_forest(x, target, &tree_params, params)),
                    Algorithm::DecisionTree => {
                        let mut rng = StdRng::seed_from_u64(params.random_state);
                        Estimator::Tree(DecisionTree::fit(x, target, (0..n_samples).collect(), &tree_params, &mut rng))
                    }
                    Algorithm::LinearRegression => fit_linear(x, &data.target)?,
                    Algorithm::Svr => {
                        let scaler = Standardizer::fit(x);
                        let xs = scaler.transform(x);
                        let svr = SvmRegressor::fit(
                            xs.view(),
                            &data.target,
                            params.kernel,
                            params.c,
                            params.epsilon,
                            params.random_state,
                        );
                        Estimator::Svr { scaler, svr }
                    }
                    Algorithm::LogisticRegression | Algorithm::Svm => {
                        return Err(Error::invalid_argument("logistic_regression and svm are classification algorithms"))
                    }
                };
                (Vec::new(), estimator)
            }
        };

        Ok(Self {
            model_type,
            algorithm: params.algorithm,
            n_features,
            classes,
            estimator,
        })
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class probabilities, one row per sample; `None` for regressors.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Option<Array2<f64>> {
        if self.model_type != ModelType::Classification {
            return None;
        }
        let n_classes = self.classes.len();
        let proba = match &self.estimator {
            Estimator::Forest(trees) => {
                let mut out = Array2::zeros((x.nrows(), n_classes));
                for (i, sample) in x.rows().into_iter().enumerate() {
                    for tree in trees {
                        for (c, p) in tree.leaf_value(sample).iter().enumerate() {
                            out[[i, c]] += p;
                        }
                    }
                }
                out / trees.len().max(1) as f64
            }
            Estimator::Tree(tree) => {
                let mut out = Array2::zeros((x.nrows(), n_classes));
                for (i, sample) in x.rows().into_iter().enumerate() {
                    for (c, p) in tree.leaf_value(sample).iter().enumerate() {
                        out[[i, c]] = *p;
                    }
                }
                out
            }
            Estimator::Logistic { scaler, weights, bias } => softmax_rows(scaler.transform(x).dot(weights) + bias),
            Estimator::Svc { scaler, svm } => svm.predict_proba(scaler.transform(x).view()),
            Estimator::Linear { .. } | Estimator::Svr { .. } => return None,
        };
        Some(proba)
    }

    /// Predicted labels (classification) or values (regression).
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        if let Some(proba) = self.predict_proba(x) {
            return proba
                .rows()
                .into_iter()
                .map(|row| {
                    let best = row
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
                    self.classes.get(best.0).copied().unwrap_or(0.0)
                })
                .collect();
        }
        match &self.estimator {
            Estimator::Forest(trees) => x
                .rows()
                .into_iter()
                .map(|sample| trees.iter().map(|t| t.leaf_value(sample)[0]).sum::<f64>() / trees.len().max(1) as f64)
                .collect(),
            Estimator::Tree(tree) => x.rows().into_iter().map(|s| tree.leaf_value(s)[0]).collect(),
            Estimator::Linear {
                coefficients,
                intercept,
            } => (x.dot(coefficients) + *intercept).to_vec(),
            Estimator::Svr { scaler, svr } => svr.predict(scaler.transform(x).view()),
            Estimator::Logistic { .. } | Estimator::Svc { .. } => Vec::new(),
        }
    }

    /// Mean decrease in impurity, for tree-based estimators.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match &self.estimator {
            Estimator::Forest(trees) => {
                let mut sum = vec![0.0; self.n_features];
                for tree in trees {
                    for (acc, v) in sum.iter_mut().zip(tree.feature_importances()) {
                        *acc += v;
                    }
                }
                let total: f64 = sum.iter().sum();
                if total > 0.0 {
                    sum.iter_mut().for_each(|v| *v /= total);
                }
                Some(sum)
            }
            Estimator::Tree(tree) => Some(tree.feature_importances()),
            _ => None,
        }
    }
}

fn fit_forest(x: ArrayView2<'_, f64>, target: Target<'_>, tree_params: &TreeParams, params: &TabularParams) -> Vec<DecisionTree> {
    let mut rng = StdRng::seed_from_u64(params.random_state);
    let n = x.nrows();
    (0..params.n_estimators)
        .map(|_| {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            DecisionTree::fit(x, target, bootstrap, tree_params, &mut rng)
        })
        .collect()
}

/// Multinomial logistic regression with an L2 penalty of strength `1 / C`,
/// fitted by full-batch gradient descent on standardised features.
fn fit_logistic(x: ArrayView2<'_, f64>, labels: &[usize], n_classes: usize, c: f64) -> Estimator {
    let scaler = Standardizer::fit(x);
    let xs = scaler.transform(x);
    let n = xs.nrows() as f64;

    let mut onehot = Array2::<f64>::zeros((xs.nrows(), n_classes));
    for (i, &label) in labels.iter().enumerate() {
        onehot[[i, label]] = 1.0;
    }

    let mut weights = Array2::<f64>::zeros((xs.ncols(), n_classes));
    let mut bias = Array1::<f64>::zeros(n_classes);
    for _ in 0..LOGISTIC_MAX_ITER {
        let proba = softmax_rows(xs.dot(&weights) + &bias);
        let residual = proba - &onehot;
        let grad_w = xs.t().dot(&residual) / n + &weights / (c * n);
        let grad_b = residual.sum_axis(Axis(0)) / n;
        weights.scaled_add(-LOGISTIC_LEARNING_RATE, &grad_w);
        bias.scaled_add(-LOGISTIC_LEARNING_RATE, &grad_b);
    }

    Estimator::Logistic { scaler, weights, bias }
}

/// Ordinary least squares on centred data.
fn fit_linear(x: ArrayView2<'_, f64>, y: &[f64]) -> Result<Estimator> {
    let n = x.nrows() as f64;
    let d = x.ncols();
    let x_mean = x.sum_axis(Axis(0)) / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let xc = &x - &x_mean;
    let yc: Array1<f64> = y.iter().map(|v| v - y_mean).collect();

    let mut gram = xc.t().dot(&xc);
    for i in 0..d {
        gram[[i, i]] += 1e-10;
    }
    let rhs = xc.t().dot(&yc);
    let coefficients = solve(gram, rhs).ok_or_else(|| Error::internal("Linear system is singular"))?;
    let intercept = y_mean - x_mean.dot(&coefficients);
    Ok(Estimator::Linear {
        coefficients,
        intercept,
    })
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-300 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut out = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * out[k]).sum();
        out[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(out)
}

/// `scikit-learn` backend.
pub struct TabularBackend;

impl TabularBackend {
    fn model<'a>(&self, handle: &'a ModelHandle) -> Result<&'a TabularModel> {
        match handle {
            ModelHandle::Tabular(model) => Ok(model),
            _ => Err(Error::internal("Model handle does not hold a scikit-learn model")),
        }
    }
}

impl FrameworkBackend for TabularBackend {
    fn framework(&self) -> Framework {
        Framework::ScikitLearn
    }

    fn train(&self, data: &TrainingData, hyperparameters: &Hyperparameters, validate: bool) -> Result<TrainedModel> {
        let model_type = ModelType::from_hyperparameters(hyperparameters)?;
        let params = TabularParams::from_hyperparameters(hyperparameters, model_type)?;
        let model = TabularModel::fit(data, &params, model_type)?;

        let metrics = if validate {
            let predicted = model.predict(data.features.view());
            match model_type {
                ModelType::Classification => metrics::classification_report(&data.target, &predicted),
                ModelType::Regression => metrics::regression_report(&data.target, &predicted),
            }
        } else {
            BTreeMap::new()
        };

        Ok(TrainedModel {
            handle: ModelHandle::Tabular(model),
            metrics,
            architecture: None,
        })
    }

    fn predict(&self, handle: &ModelHandle, input: &serde_json::Value, model_type: ModelType) -> Result<Prediction> {
        let model = self.model(handle)?;
        let x = feature_matrix(input, FlatInput::Column)?;
        if x.ncols() != model.n_features() {
            return Err(Error::invalid_argument(format!(
                "Input has {} features but the model expects {}",
                x.ncols(),
                model.n_features()
            )));
        }

        let predicted = model.predict(x.view());
        let prediction = match model_type {
            ModelType::Classification => Prediction {
                value: predicted.into_iter().map(label_value).collect(),
                confidence: model
                    .predict_proba(x.view())
                    .map_or(1.0, |proba| mean_max_probability(&proba)),
            },
            ModelType::Regression => Prediction {
                value: predicted.into_iter().map(serde_json::Value::from).collect(),
                confidence: 1.0,
            },
        };
        Ok(prediction)
    }

    fn save(&self, handle: &ModelHandle, path: &Path) -> Result<()> {
        write_artifact(path, self.model(handle)?)
    }

    fn load(&self, path: &Path, _architecture: Option<&Architecture>) -> Result<ModelHandle> {
        read_artifact::<TabularModel>(path).map(ModelHandle::Tabular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn hp(pairs: &[(&str, &str)]) -> Hyperparameters {
        Hyperparameters::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn separable() -> TrainingData {
        TrainingData::from_json(r#"{"features": [[1,2],[2,3],[3,4],[4,5]], "target": [0,0,1,1]}"#).unwrap()
    }

    #[test]
    fn test_random_forest_classifier_metrics() {
        let trained = TabularBackend.train(&separable(), &hp(&[("n_estimators", "10")]), true).unwrap();
        let accuracy = trained.metrics["accuracy"];
        assert!((0.0..=1.0).contains(&accuracy));
        for key in ["precision", "recall", "f1_score"] {
            assert!(trained.metrics.contains_key(key));
        }
        assert!(trained.architecture.is_none());
        let importances = trained.handle.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
    }

    #[test]
    fn test_validate_false_yields_no_metrics() {
        let trained = TabularBackend.train(&separable(), &hp(&[("n_estimators", "5")]), false).unwrap();
        assert!(trained.metrics.is_empty());
    }

    #[test]
    fn test_decision_tree_predicts_labels_with_confidence() {
        let trained = TabularBackend
            .train(&separable(), &hp(&[("algorithm", "decision_tree")]), true)
            .unwrap();
        assert_eq!(trained.metrics["accuracy"], 1.0);
        let prediction = TabularBackend
            .predict(&trained.handle, &json!([[1, 2], [4, 5]]), ModelType::Classification)
            .unwrap();
        assert_eq!(prediction.value, json!([0, 1]));
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn test_logistic_regression_separates_classes() {
        let trained = TabularBackend
            .train(&separable(), &hp(&[("algorithm", "logistic_regression"), ("C", "10")]), true)
            .unwrap();
        assert_eq!(trained.metrics["accuracy"], 1.0);
        let prediction = TabularBackend
            .predict(&trained.handle, &json!([[0, 1], [5, 6]]), ModelType::Classification)
            .unwrap();
        assert_eq!(prediction.value, json!([0, 1]));
        assert!(prediction.confidence > 0.5 && prediction.confidence <= 1.0);
        assert!(trained.handle.feature_importances().is_none());
    }

    #[test]
    fn test_linear_regression_recovers_line() {
        let data = TrainingData::from_json(r#"{"features": [[0],[1],[2],[3]], "target": [1,3,5,7]}"#).unwrap();
        let trained = TabularBackend
            .train(
                &data,
                &hp(&[("model_type", "regression"), ("algorithm", "linear_regression")]),
                true,
            )
            .unwrap();
        assert!((trained.metrics["r2_score"] - 1.0).abs() < 1e-9);
        let prediction = TabularBackend
            .predict(&trained.handle, &json!([10]), ModelType::Regression)
            .unwrap();
        let value = prediction.value[0].as_f64().unwrap();
        assert!((value - 21.0).abs() < 1e-6);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn test_svm_classifies_with_probabilities() {
        for kernel in ["rbf", "linear", "poly"] {
            let trained = TabularBackend
                .train(&separable(), &hp(&[("algorithm", "svm"), ("kernel", kernel)]), true)
                .unwrap();
            assert_eq!(trained.metrics["accuracy"], 1.0, "kernel {}", kernel);
            let prediction = TabularBackend
                .predict(&trained.handle, &json!([[1, 2], [4, 5]]), ModelType::Classification)
                .unwrap();
            assert_eq!(prediction.value, json!([0, 1]), "kernel {}", kernel);
            assert!(prediction.confidence > 0.5 && prediction.confidence < 1.0);
            assert!(trained.handle.feature_importances().is_none());
        }
    }

    #[test]
    fn test_svr_fits_linear_target() {
        let data =
            TrainingData::from_json(r#"{"features": [[0],[1],[2],[3],[4],[5]], "target": [1,3,5,7,9,11]}"#).unwrap();
        let trained = TabularBackend
            .train(
                &data,
                &hp(&[
                    ("model_type", "regression"),
                    ("algorithm", "svr"),
                    ("kernel", "linear"),
                    ("C", "100"),
                ]),
                true,
            )
            .unwrap();
        assert!(trained.metrics["r2_score"] > 0.99, "{:?}", trained.metrics);
        let prediction = TabularBackend
            .predict(&trained.handle, &json!([2.5]), ModelType::Regression)
            .unwrap();
        let value = prediction.value[0].as_f64().unwrap();
        assert!((value - 6.0).abs() < 0.3, "{}", value);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn test_svm_and_svr_reject_wrong_task_and_kernel() {
        let err = TabularBackend.train(&separable(), &hp(&[("algorithm", "svr")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = TabularBackend.train(
            &separable(),
            &hp(&[("model_type", "regression"), ("algorithm", "svm")]),
            false,
        );
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = TabularBackend.train(&separable(), &hp(&[("algorithm", "svm"), ("kernel", "precomputed")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(ref msg)) if msg.contains("kernel")));
        // Kernel keys are ignored by algorithms that have no kernel.
        assert!(TabularBackend
            .train(&separable(), &hp(&[("n_estimators", "2"), ("kernel", "precomputed")]), false)
            .is_ok());
    }

    #[test]
    fn test_oversized_n_estimators_is_rejected() {
        for value in ["0", "10000000000000"] {
            let err = TabularBackend.train(&separable(), &hp(&[("n_estimators", value)]), false);
            assert!(
                matches!(err, Err(Error::InvalidArgument(ref msg)) if msg.contains("n_estimators")),
                "n_estimators={}",
                value
            );
        }
    }

    #[test]
    fn test_rejects_unknown_algorithm_and_model_type() {
        let err = TabularBackend.train(&separable(), &hp(&[("algorithm", "svm_rbf")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = TabularBackend.train(&separable(), &hp(&[("model_type", "clustering")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = TabularBackend.train(&separable(), &hp(&[("algorithm", "linear_regression")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_feature_width_mismatch() {
        let trained = TabularBackend
            .train(&separable(), &hp(&[("algorithm", "decision_tree")]), false)
            .unwrap();
        let err = TabularBackend.predict(&trained.handle, &json!([[1, 2, 3]]), ModelType::Classification);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_save_and_load_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m_1.bin");
        let trained = TabularBackend.train(&separable(), &hp(&[("n_estimators", "3")]), false).unwrap();
        TabularBackend.save(&trained.handle, &path).unwrap();

        let loaded = TabularBackend.load(&path, None).unwrap();
        let input = json!([[1, 2], [4, 5]]);
        assert_eq!(
            TabularBackend.predict(&loaded, &input, ModelType::Classification).unwrap(),
            TabularBackend.predict(&trained.handle, &input, ModelType::Classification).unwrap()
        );

        let missing = TabularBackend.load(&dir.path().join("absent.bin"), None);
        assert!(matches!(missing, Err(Error::NotFound(_))));

        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(TabularBackend.load(&path, None), Err(Error::Internal(_))));
    }
}
