//! Multi-layer perceptron served under the `pytorch` framework.
//!
//! Artifacts hold only the learned parameters. The layer layout lives in the
//! version's [`Architecture`] and must be supplied to rebuild the network
//! before the parameters can be loaded.

use super::{
    distinct_labels, feature_matrix, label_value, mean_max_probability, read_artifact, softmax_rows, write_artifact,
    Activation, Architecture, FlatInput, Framework, FrameworkBackend, Hyperparameters, ModelHandle, ModelType,
    Prediction, TrainedModel, TrainingData,
};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// How the output layer is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Head {
    /// One logit, sigmoid probability of `classes[1]`
    Binary,
    /// One logit per class, softmax
    Multiclass,
    /// Raw outputs
    Regression,
}

const MAX_LAYERS: usize = 64;
const MAX_HIDDEN_UNITS: usize = 4096;
const MAX_EPOCHS: usize = 100_000;
const MAX_CLASSES: usize = 10_000;

#[derive(Debug, Clone)]
struct MlpParams {
    num_layers: usize,
    hidden_units: usize,
    activation: Activation,
    learning_rate: f64,
    epochs: usize,
    batch_size: usize,
    num_classes: usize,
    seed: u64,
}

impl MlpParams {
    fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self> {
        let network_type = hp.get_or("network_type", "mlp").to_lowercase();
        if network_type != "mlp" {
            return Err(Error::invalid_argument(format!(
                "Unsupported pytorch network type: {}",
                network_type
            )));
        }
        let params = Self {
            num_layers: hp.parse_in("num_layers", 2, 1..=MAX_LAYERS)?,
            hidden_units: hp.parse_in("hidden_units", 64, 1..=MAX_HIDDEN_UNITS)?,
            activation: hp.get_or("activation", "relu").parse()?,
            learning_rate: hp.parse_or("learning_rate", 0.01)?,
            epochs: hp.parse_in("epochs", 100, 1..=MAX_EPOCHS)?,
            batch_size: hp.parse_in("batch_size", 32, 1..=usize::MAX)?,
            num_classes: hp.parse_in("num_classes", 0, 0..=MAX_CLASSES)?,
            seed: hp.parse_or("seed", 42)?,
        };
        if !params.learning_rate.is_finite() || params.learning_rate <= 0.0 {
            return Err(Error::invalid_argument("learning_rate must be positive"));
        }
        Ok(params)
    }
}

/// Learned parameters; what a `.pt` artifact contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MlpState {
    head: Head,
    classes: Vec<f64>,
    /// `fan_in x fan_out` per layer
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
}

/// A fully-connected network with its architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    layers: Vec<usize>,
    activation: Activation,
    state: MlpState,
}

struct ForwardPass {
    /// Input to every layer; `inputs[0]` is the batch
    inputs: Vec<Array2<f64>>,
    /// Pre-activation output of every layer
    outputs: Vec<Array2<f64>>,
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl Activation {
    fn apply(self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Sigmoid => sigmoid(v),
            Activation::Tanh => v.tanh(),
        }
    }

    fn derivative(self, pre: f64) -> f64 {
        match self {
            Activation::Relu => {
                if pre > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(pre);
                s * (1.0 - s)
            }
            Activation::Tanh => 1.0 - pre.tanh().powi(2),
        }
    }
}

fn validate_layers(layers: &[usize]) -> Result<()> {
    if layers.len() < 2 || layers.contains(&0) {
        return Err(Error::invalid_argument(format!("Invalid MLP layer sizes: {:?}", layers)));
    }
    Ok(())
}

impl MlpModel {
    /// Fresh network with `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` initialisation.
    fn init(layers: Vec<usize>, activation: Activation, head: Head, classes: Vec<f64>, rng: &mut StdRng) -> Result<Self> {
        validate_layers(&layers)?;
        let mut weights = Vec::with_capacity(layers.len() - 1);
        let mut biases = Vec::with_capacity(layers.len() - 1);
        for pair in layers.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = 1.0 / (fan_in as f64).sqrt();
            weights.push(Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound)));
            biases.push(Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)));
        }
        Ok(Self {
            layers,
            activation,
            state: MlpState {
                head,
                classes,
                weights,
                biases,
            },
        })
    }

    /// Rebuild a network from its architecture and stored parameters.
    fn from_parts(architecture: &Architecture, state: MlpState) -> Result<Self> {
        let Architecture::Mlp { layers, activation } = architecture;
        validate_layers(layers)?;
        let expected = layers.len() - 1;
        let shapes_match = state.weights.len() == expected
            && state.biases.len() == expected
            && layers.windows(2).zip(&state.weights).zip(&state.biases).all(|((pair, w), b)| {
                w.dim() == (pair[0], pair[1]) && b.len() == pair[1]
            });
        if !shapes_match {
            return Err(Error::internal(format!(
                "Stored parameters do not match architecture {:?}",
                layers
            )));
        }
        Ok(Self {
            layers: layers.clone(),
            activation: *activation,
            state,
        })
    }

    pub fn architecture(&self) -> Architecture {
        Architecture::Mlp {
            layers: self.layers.clone(),
            activation: self.activation,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0]
    }

    fn forward_pass(&self, x: ArrayView2<'_, f64>) -> ForwardPass {
        let n_layers = self.state.weights.len();
        let mut inputs = vec![x.to_owned()];
        let mut outputs = Vec::with_capacity(n_layers);
        for (i, (w, b)) in self.state.weights.iter().zip(&self.state.biases).enumerate() {
            let z = inputs[i].dot(w) + b;
            if i + 1 < n_layers {
                inputs.push(z.mapv(|v| self.activation.apply(v)));
            }
            outputs.push(z);
        }
        ForwardPass { inputs, outputs }
    }

    /// Raw network outputs (logits for classification).
    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut pass = self.forward_pass(x);
        pass.outputs.pop().unwrap_or_else(|| Array2::zeros((x.nrows(), 0)))
    }

    /// Loss of `logits` against `targets` and its gradient with respect to the logits.
    fn loss_and_grad(&self, logits: &Array2<f64>, targets: &Array2<f64>) -> (f64, Array2<f64>) {
        let n = logits.nrows().max(1) as f64;
        match self.state.head {
            Head::Multiclass => {
                let proba = softmax_rows(logits.clone());
                let loss = -(&proba.mapv(|p| p.max(1e-12).ln()) * targets).sum() / n;
                (loss, (proba - targets) / n)
            }
            Head::Binary => {
                let loss = logits
                    .iter()
                    .zip(targets.iter())
                    .map(|(&z, &y)| z.max(0.0) - z * y + (-z.abs()).exp().ln_1p())
                    .sum::<f64>()
                    / n;
                (loss, (logits.mapv(sigmoid) - targets) / n)
            }
            Head::Regression => {
                let diff = logits - targets;
                let loss = diff.mapv(|d| d * d).sum() / (n * logits.ncols().max(1) as f64);
                (loss, diff * (2.0 / (n * logits.ncols().max(1) as f64)))
            }
        }
    }

    fn gradients(&self, pass: &ForwardPass, mut delta: Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array1<f64>>) {
        let n_layers = self.state.weights.len();
        let mut grad_w: Vec<Array2<f64>> = vec![Array2::zeros((0, 0)); n_layers];
        let mut grad_b: Vec<Array1<f64>> = vec![Array1::zeros(0); n_layers];
        for layer in (0..n_layers).rev() {
            grad_w[layer] = pass.inputs[layer].t().dot(&delta);
            grad_b[layer] = delta.sum_axis(Axis(0));
            if layer > 0 {
                let activation = self.activation;
                let back = delta.dot(&self.state.weights[layer].t());
                delta = back * pass.outputs[layer - 1].mapv(|v| activation.derivative(v));
            }
        }
        (grad_w, grad_b)
    }

    fn encode_targets(&self, target: &[f64]) -> Array2<f64> {
        match self.state.head {
            Head::Multiclass => {
                let width = self.layers[self.layers.len() - 1];
                let mut out = Array2::zeros((target.len(), width));
                for (i, t) in target.iter().enumerate() {
                    if let Some(c) = self.state.classes.iter().position(|c| c == t) {
                        out[[i, c]] = 1.0;
                    }
                }
                out
            }
            Head::Binary => Array2::from_shape_fn((target.len(), 1), |(i, _)| {
                if self.state.classes.len() > 1 && target[i] == self.state.classes[1] {
                    1.0
                } else {
                    0.0
                }
            }),
            Head::Regression => Array2::from_shape_fn((target.len(), 1), |(i, _)| target[i]),
        }
    }

    /// Predicted labels (classification) or values, plus class probabilities when classifying.
    fn predict(&self, x: ArrayView2<'_, f64>) -> (Vec<f64>, Option<Array2<f64>>) {
        let logits = self.forward(x);
        let label = |idx: usize| self.state.classes.get(idx).copied().unwrap_or(idx as f64);
        match self.state.head {
            Head::Multiclass => {
                let proba = softmax_rows(logits);
                let labels = proba
                    .rows()
                    .into_iter()
                    .map(|row| {
                        let best = row
                            .iter()
                            .enumerate()
                            .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
                        label(best.0)
                    })
                    .collect();
                (labels, Some(proba))
            }
            Head::Binary => {
                let positive = logits.column(0).mapv(sigmoid);
                let labels = positive.iter().map(|&p| label(usize::from(p > 0.5))).collect();
                let proba = Array2::from_shape_fn((positive.len(), 2), |(i, j)| {
                    if j == 1 {
                        positive[i]
                    } else {
                        1.0 - positive[i]
                    }
                });
                (labels, Some(proba))
            }
            Head::Regression => (logits.column(0).to_vec(), None),
        }
    }
}

struct Adam {
    learning_rate: f64,
    step: i32,
    m_w: Vec<Array2<f64>>,
    v_w: Vec<Array2<f64>>,
    m_b: Vec<Array1<f64>>,
    v_b: Vec<Array1<f64>>,
}

impl Adam {
    fn new(model: &MlpModel, learning_rate: f64) -> Self {
        let zeros_w: Vec<Array2<f64>> = model.state.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let zeros_b: Vec<Array1<f64>> = model.state.biases.iter().map(|b| Array1::zeros(b.raw_dim())).collect();
        Self {
            learning_rate,
            step: 0,
            m_w: zeros_w.clone(),
            v_w: zeros_w,
            m_b: zeros_b.clone(),
            v_b: zeros_b,
        }
    }

    fn update(&mut self, model: &mut MlpModel, grad_w: &[Array2<f64>], grad_b: &[Array1<f64>]) {
        self.step += 1;
        let bias1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bias2 = 1.0 - ADAM_BETA2.powi(self.step);
        let lr = self.learning_rate;

        for (i, g) in grad_w.iter().enumerate() {
            self.m_w[i] = &self.m_w[i] * ADAM_BETA1 + g * (1.0 - ADAM_BETA1);
            self.v_w[i] = &self.v_w[i] * ADAM_BETA2 + &g.mapv(|v| v * v) * (1.0 - ADAM_BETA2);
            let step = ndarray::Zip::from(&self.m_w[i])
                .and(&self.v_w[i])
                .map_collect(|m, v| lr * (m / bias1) / ((v / bias2).sqrt() + ADAM_EPS));
            model.state.weights[i] -= &step;
        }
        for (i, g) in grad_b.iter().enumerate() {
            self.m_b[i] = &self.m_b[i] * ADAM_BETA1 + g * (1.0 - ADAM_BETA1);
            self.v_b[i] = &self.v_b[i] * ADAM_BETA2 + &g.mapv(|v| v * v) * (1.0 - ADAM_BETA2);
            let step = ndarray::Zip::from(&self.m_b[i])
                .and(&self.v_b[i])
                .map_collect(|m, v| lr * (m / bias1) / ((v / bias2).sqrt() + ADAM_EPS));
            model.state.biases[i] -= &step;
        }
    }
}

/// `pytorch` backend.
pub struct MlpBackend;

impl MlpBackend {
    fn model<'a>(&self, handle: &'a ModelHandle) -> Result<&'a MlpModel> {
        match handle {
            ModelHandle::Mlp(model) => Ok(model),
            _ => Err(Error::internal("Model handle does not hold a pytorch model")),
        }
    }
}

impl FrameworkBackend for MlpBackend {
    fn framework(&self) -> Framework {
        Framework::Pytorch
    }

    fn train(&self, data: &TrainingData, hyperparameters: &Hyperparameters, validate: bool) -> Result<TrainedModel> {
        let model_type = ModelType::from_hyperparameters(hyperparameters)?;
        let params = MlpParams::from_hyperparameters(hyperparameters)?;
        if data.target.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_argument("Target values must be finite numbers"));
        }

        let input_dim = data.features.ncols();
        let (head, classes, output_dim) = match model_type {
            ModelType::Classification => {
                let classes = distinct_labels(&data.target);
                let num_classes = params.num_classes.max(classes.len());
                if num_classes > 2 {
                    (Head::Multiclass, classes, num_classes)
                } else {
                    (Head::Binary, classes, 1)
                }
            }
            ModelType::Regression => (Head::Regression, Vec::new(), 1),
        };

        let mut layers = vec![input_dim];
        layers.extend(std::iter::repeat(params.hidden_units).take(params.num_layers - 1));
        layers.push(output_dim);

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut model = MlpModel::init(layers, params.activation, head, classes, &mut rng)?;
        let targets = model.encode_targets(&data.target);
        let mut optimizer = Adam::new(&model, params.learning_rate);

        let n = data.n_samples();
        let mut order: Vec<usize> = (0..n).collect();
        let mut final_loss = 0.0;
        let mut min_loss = f64::INFINITY;
        for _ in 0..params.epochs {
            let epoch_loss = if n > params.batch_size {
                order.shuffle(&mut rng);
                let mut total = 0.0;
                for batch in order.chunks(params.batch_size) {
                    let x = data.features.select(Axis(0), batch);
                    let y = targets.select(Axis(0), batch);
                    let pass = model.forward_pass(x.view());
                    let (loss, delta) = model.loss_and_grad(&pass.outputs[pass.outputs.len() - 1], &y);
                    let (grad_w, grad_b) = model.gradients(&pass, delta);
                    optimizer.update(&mut model, &grad_w, &grad_b);
                    total += loss * batch.len() as f64;
                }
                total / n as f64
            } else {
                let pass = model.forward_pass(data.features.view());
                let (loss, delta) = model.loss_and_grad(&pass.outputs[pass.outputs.len() - 1], &targets);
                let (grad_w, grad_b) = model.gradients(&pass, delta);
                optimizer.update(&mut model, &grad_w, &grad_b);
                loss
            };
            final_loss = epoch_loss;
            min_loss = min_loss.min(epoch_loss);
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("final_loss".to_string(), final_loss);
        metrics.insert("min_loss".to_string(), min_loss);
        if validate {
            let (predicted, _) = model.predict(data.features.view());
            match model_type {
                ModelType::Classification => {
                    metrics.insert(
                        "accuracy".to_string(),
                        super::metrics::accuracy(&data.target, &predicted),
                    );
                }
                ModelType::Regression => {
                    let mse = super::metrics::mean_squared_error(&data.target, &predicted);
                    metrics.insert("mean_squared_error".to_string(), mse);
                    metrics.insert("root_mean_squared_error".to_string(), mse.sqrt());
                }
            }
        }

        let architecture = model.architecture();
        Ok(TrainedModel {
            handle: ModelHandle::Mlp(model),
            metrics,
            architecture: Some(architecture),
        })
    }

    fn predict(&self, handle: &ModelHandle, input: &serde_json::Value, model_type: ModelType) -> Result<Prediction> {
        let model = self.model(handle)?;
        if input.is_object() {
            return Err(Error::invalid_argument("Dictionary input not supported for pytorch models"));
        }
        let x = feature_matrix(input, FlatInput::Row)?;
        if x.ncols() != model.input_dim() {
            return Err(Error::invalid_argument(format!(
                "Input has {} features but the model expects {}",
                x.ncols(),
                model.input_dim()
            )));
        }

        let (predicted, proba) = model.predict(x.view());
        let prediction = match (model_type, proba) {
            (ModelType::Classification, Some(proba)) => Prediction {
                value: predicted.into_iter().map(label_value).collect(),
                confidence: mean_max_probability(&proba),
            },
            _ => Prediction {
                value: predicted.into_iter().map(serde_json::Value::from).collect(),
                confidence: 1.0,
            },
        };
        Ok(prediction)
    }

    fn save(&self, handle: &ModelHandle, path: &Path) -> Result<()> {
        write_artifact(path, &self.model(handle)?.state)
    }

    fn load(&self, path: &Path, architecture: Option<&Architecture>) -> Result<ModelHandle> {
        let architecture = architecture.ok_or_else(|| {
            Error::internal(format!(
                "Failed to load model {}: no architecture recorded for this version",
                path.display()
            ))
        })?;
        let state: MlpState = read_artifact(path)?;
        MlpModel::from_parts(architecture, state).map(ModelHandle::Mlp)
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

    fn binary() -> TrainingData {
        TrainingData::from_json(r#"{"features": [[1,2],[2,3],[3,4],[4,5]], "target": [0,0,1,1]}"#).unwrap()
    }

    #[test]
    fn test_architecture_follows_hyperparameters() {
        let trained = MlpBackend
            .train(&binary(), &hp(&[("num_layers", "3"), ("hidden_units", "8"), ("epochs", "5")]), false)
            .unwrap();
        assert_eq!(
            trained.architecture,
            Some(Architecture::Mlp {
                layers: vec![2, 8, 8, 1],
                activation: Activation::Relu,
            })
        );
        assert!(trained.metrics.contains_key("final_loss"));
        assert!(trained.metrics["min_loss"] <= trained.metrics["final_loss"]);
        assert!(!trained.metrics.contains_key("accuracy"));
    }

    #[test]
    fn test_multiclass_uses_one_output_per_class() {
        let data =
            TrainingData::from_json(r#"{"features": [[0],[1],[2],[3],[4],[5]], "target": [0,0,1,1,2,2]}"#).unwrap();
        let trained = MlpBackend.train(&data, &hp(&[("epochs", "20")]), true).unwrap();
        let Some(Architecture::Mlp { layers, .. }) = &trained.architecture else {
            panic!("pytorch models record an architecture");
        };
        assert_eq!(layers.last(), Some(&3));
        let accuracy = trained.metrics["accuracy"];
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_more_epochs_lower_the_loss() {
        let short = MlpBackend.train(&binary(), &hp(&[("epochs", "1")]), false).unwrap();
        let long = MlpBackend
            .train(&binary(), &hp(&[("epochs", "300"), ("learning_rate", "0.05")]), true)
            .unwrap();
        assert!(long.metrics["final_loss"] < short.metrics["final_loss"]);
        assert_eq!(long.metrics["accuracy"], 1.0);
    }

    #[test]
    fn test_regression_reports_mse() {
        let data = TrainingData::from_json(r#"{"features": [[0],[1],[2],[3]], "target": [0,2,4,6]}"#).unwrap();
        let trained = MlpBackend
            .train(&data, &hp(&[("model_type", "regression"), ("epochs", "10")]), true)
            .unwrap();
        let mse = trained.metrics["mean_squared_error"];
        assert!((trained.metrics["root_mean_squared_error"] - mse.sqrt()).abs() < 1e-12);
        let prediction = MlpBackend
            .predict(&trained.handle, &json!([[1.5]]), ModelType::Regression)
            .unwrap();
        assert_eq!(prediction.confidence, 1.0);
        assert!(prediction.value[0].is_f64());
    }

    #[test]
    fn test_predict_rejects_dictionaries_and_wrong_width() {
        let trained = MlpBackend.train(&binary(), &hp(&[("epochs", "2")]), false).unwrap();
        let err = MlpBackend.predict(&trained.handle, &json!({"a": 1}), ModelType::Classification);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = MlpBackend.predict(&trained.handle, &json!([1, 2, 3]), ModelType::Classification);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));

        let flat = MlpBackend
            .predict(&trained.handle, &json!([1, 2]), ModelType::Classification)
            .unwrap();
        assert_eq!(flat.value.as_array().map(Vec::len), Some(1));
        assert!(flat.confidence >= 0.5 && flat.confidence <= 1.0);
    }

    #[test]
    fn test_load_requires_matching_architecture() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m_1.pt");
        let trained = MlpBackend
            .train(&binary(), &hp(&[("hidden_units", "4"), ("epochs", "3")]), false)
            .unwrap();
        MlpBackend.save(&trained.handle, &path).unwrap();

        let architecture = trained.architecture.clone().unwrap();
        let loaded = MlpBackend.load(&path, Some(&architecture)).unwrap();
        let input = json!([[1, 2], [4, 5]]);
        assert_eq!(
            MlpBackend.predict(&loaded, &input, ModelType::Classification).unwrap(),
            MlpBackend.predict(&trained.handle, &input, ModelType::Classification).unwrap()
        );

        assert!(matches!(MlpBackend.load(&path, None), Err(Error::Internal(_))));
        let wrong = Architecture::Mlp {
            layers: vec![2, 5, 1],
            activation: Activation::Relu,
        };
        assert!(matches!(MlpBackend.load(&path, Some(&wrong)), Err(Error::Internal(_))));
    }

    #[test]
    fn test_rejects_unknown_network_type() {
        let err = MlpBackend.train(&binary(), &hp(&[("network_type", "cnn")]), false);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_oversized_hyperparameters_are_rejected() {
        for (key, value) in [
            ("epochs", "100000000000000"),
            ("hidden_units", "1000000000"),
            ("num_layers", "100000"),
            ("num_classes", "99999999"),
            ("epochs", "0"),
        ] {
            let result = MlpBackend.train(&binary(), &hp(&[(key, value)]), false);
            assert!(
                matches!(result, Err(Error::InvalidArgument(ref msg)) if msg.contains(key)),
                "{}={} gave {:?}",
                key,
                value,
                result.map(|t| t.metrics)
            );
        }
    }
}
