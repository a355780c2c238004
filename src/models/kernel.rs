//! Kernel support vector machines behind the `svm` and `svr` algorithms.
//!
//! Both are solved in the dual by coordinate descent. The bias is folded into
//! the kernel as a constant `+1` term, so every machine's decision function is
//! `f(x) = sum_j coef_j * (K(sv_j, x) + 1)` over its support vectors. Inputs
//! are expected to be standardised by the caller.

use super::Hyperparameters;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const MAX_PASSES: usize = 500;
const TOLERANCE: f64 = 1e-3;
const PLATT_ITERATIONS: usize = 500;
const PLATT_LEARNING_RATE: f64 = 0.5;

/// How `gamma` is chosen for the rbf and poly kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

impl Gamma {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scale" => Ok(Gamma::Scale),
            "auto" => Ok(Gamma::Auto),
            other => match other.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => Ok(Gamma::Value(v)),
                _ => Err(Error::invalid_argument(format!(
                    "Invalid value for hyperparameter 'gamma': {}",
                    raw
                ))),
            },
        }
    }

    fn resolve(self, x: ArrayView2<'_, f64>) -> f64 {
        let d = x.ncols().max(1) as f64;
        match self {
            Gamma::Value(v) => v,
            Gamma::Auto => 1.0 / d,
            Gamma::Scale => {
                let n = x.len().max(1) as f64;
                let mean = x.sum() / n;
                let var = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                if var > 0.0 {
                    1.0 / (d * var)
                } else {
                    1.0 / d
                }
            }
        }
    }
}

/// Kernel requested by the `kernel`, `gamma`, `degree` and `coef0` hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelChoice {
    Linear,
    Rbf(Gamma),
    Poly { gamma: Gamma, degree: i32, coef0: f64 },
}

impl Default for KernelChoice {
    fn default() -> Self {
        KernelChoice::Rbf(Gamma::Scale)
    }
}

impl KernelChoice {
    pub fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self> {
        let gamma = || Gamma::parse(hp.get_or("gamma", "scale"));
        match hp.get_or("kernel", "rbf").to_lowercase().as_str() {
            "linear" => Ok(KernelChoice::Linear),
            "rbf" => Ok(KernelChoice::Rbf(gamma()?)),
            "poly" => Ok(KernelChoice::Poly {
                gamma: gamma()?,
                degree: hp.parse_in("degree", 3, 1..=10)?,
                coef0: hp.parse_or("coef0", 0.0)?,
            }),
            other => Err(Error::invalid_argument(format!("Unsupported kernel: {}", other))),
        }
    }

    /// Fix data-dependent parameters against the training features.
    pub fn resolve(self, x: ArrayView2<'_, f64>) -> Kernel {
        match self {
            KernelChoice::Linear => Kernel::Linear,
            KernelChoice::Rbf(gamma) => Kernel::Rbf {
                gamma: gamma.resolve(x),
            },
            KernelChoice::Poly { gamma, degree, coef0 } => Kernel::Poly {
                gamma: gamma.resolve(x),
                degree,
                coef0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, degree: i32, coef0: f64 },
}

impl Kernel {
    pub fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match *self {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf { gamma } => {
                let dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
                (-gamma * dist).exp()
            }
            Kernel::Poly { gamma, degree, coef0 } => (gamma * a.dot(&b) + coef0).powi(degree),
        }
    }
}

/// Training rows and the kernel with the bias term folded in.
struct Dual<'x> {
    x: ArrayView2<'x, f64>,
    kernel: Kernel,
    diag: Vec<f64>,
}

impl<'x> Dual<'x> {
    fn new(x: ArrayView2<'x, f64>, kernel: Kernel) -> Self {
        let diag = x.rows().into_iter().map(|r| kernel.eval(r, r) + 1.0).collect();
        Self { x, kernel, diag }
    }

    /// `f += delta * K'(i, .)`
    fn shift(&self, f: &mut [f64], i: usize, delta: f64) {
        let xi = self.x.row(i);
        for (j, fj) in f.iter_mut().enumerate() {
            *fj += delta * (self.kernel.eval(xi, self.x.row(j)) + 1.0);
        }
    }
}

/// Hinge-loss dual with `0 <= alpha <= c`; returns `alpha_i * y_i` for `y` in {-1, +1}.
fn solve_classifier(dual: &Dual<'_>, y: &[f64], c: f64, rng: &mut StdRng) -> Vec<f64> {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    let mut f = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).collect();
    for _ in 0..MAX_PASSES {
        order.shuffle(rng);
        let mut violation = 0.0f64;
        for &i in &order {
            let q = dual.diag[i];
            if q <= 0.0 {
                continue;
            }
            let g = y[i] * f[i] - 1.0;
            let projected = if alpha[i] <= 0.0 {
                g.min(0.0)
            } else if alpha[i] >= c {
                g.max(0.0)
            } else {
                g
            };
            violation = violation.max(projected.abs());
            if projected == 0.0 {
                continue;
            }
            let updated = (alpha[i] - g / q).clamp(0.0, c);
            let delta = updated - alpha[i];
            if delta != 0.0 {
                alpha[i] = updated;
                dual.shift(&mut f, i, delta * y[i]);
            }
        }
        if violation < TOLERANCE {
            break;
        }
    }
    alpha.iter().zip(y).map(|(a, yi)| a * yi).collect()
}

/// Epsilon-insensitive dual with `-c <= beta <= c`.
fn solve_regressor(dual: &Dual<'_>, y: &[f64], c: f64, epsilon: f64, rng: &mut StdRng) -> Vec<f64> {
    let n = y.len();
    let mut beta = vec![0.0; n];
    let mut f = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).collect();
    for _ in 0..MAX_PASSES {
        order.shuffle(rng);
        let mut largest_step = 0.0f64;
        for &i in &order {
            let q = dual.diag[i];
            if q <= 0.0 {
                continue;
            }
            let z = beta[i] - (f[i] - y[i]) / q;
            let updated = (z.signum() * (z.abs() - epsilon / q).max(0.0)).clamp(-c, c);
            let delta = updated - beta[i];
            if delta != 0.0 {
                largest_step = largest_step.max(delta.abs() * q);
                beta[i] = updated;
                dual.shift(&mut f, i, delta);
            }
        }
        if largest_step < TOLERANCE {
            break;
        }
    }
    beta
}

/// Support vectors shared by one or more machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SupportVectors {
    kernel: Kernel,
    vectors: Array2<f64>,
    /// `n_support x n_machines`
    coef: Array2<f64>,
}

impl SupportVectors {
    /// Keep the rows of `x` with a non-zero coefficient in any machine.
    fn collect(x: ArrayView2<'_, f64>, kernel: Kernel, machines: &[Vec<f64>]) -> Self {
        let keep: Vec<usize> = (0..x.nrows())
            .filter(|&i| machines.iter().any(|m| m[i] != 0.0))
            .collect();
        let mut coef = Array2::zeros((keep.len(), machines.len()));
        for (s, &i) in keep.iter().enumerate() {
            for (m, machine) in machines.iter().enumerate() {
                coef[[s, m]] = machine[i];
            }
        }
        Self {
            kernel,
            vectors: x.select(Axis(0), &keep),
            coef,
        }
    }

    /// Decision values, one column per machine.
    fn decision(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), self.coef.ncols()));
        for (i, sample) in x.rows().into_iter().enumerate() {
            let mut row = out.row_mut(i);
            for (sv, coef) in self.vectors.rows().into_iter().zip(self.coef.rows()) {
                row.scaled_add(self.kernel.eval(sv, sample) + 1.0, &coef);
            }
        }
        out
    }

    fn len(&self) -> usize {
        self.vectors.nrows()
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Platt scaling: fit `p = sigmoid(a * f + b)` to the training decisions,
/// with the usual smoothed targets.
fn fit_platt(decision: &[f64], positive: &[bool]) -> (f64, f64) {
    let n_pos = positive.iter().filter(|p| **p).count() as f64;
    let n_neg = positive.len() as f64 - n_pos;
    let hi = (n_pos + 1.0) / (n_pos + 2.0);
    let lo = 1.0 / (n_neg + 2.0);
    let n = decision.len().max(1) as f64;

    let (mut a, mut b) = (1.0, 0.0);
    for _ in 0..PLATT_ITERATIONS {
        let (mut grad_a, mut grad_b) = (0.0, 0.0);
        for (&f, &pos) in decision.iter().zip(positive) {
            let residual = sigmoid(a * f + b) - if pos { hi } else { lo };
            grad_a += residual * f;
            grad_b += residual;
        }
        a = (a - PLATT_LEARNING_RATE * grad_a / n).max(1e-6);
        b -= PLATT_LEARNING_RATE * grad_b / n;
    }
    (a, b)
}

/// Support vector classifier with calibrated probabilities; one-vs-rest above two classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    n_classes: usize,
    support: SupportVectors,
    /// Platt `(a, b)` per machine
    platt: Vec<(f64, f64)>,
}

impl SvmClassifier {
    pub fn fit(x: ArrayView2<'_, f64>, labels: &[usize], n_classes: usize, choice: KernelChoice, c: f64, seed: u64) -> Self {
        let kernel = choice.resolve(x);
        let dual = Dual::new(x, kernel);
        let mut rng = StdRng::seed_from_u64(seed);
        // Binary problems use one machine whose positive class is label 1.
        let positives: Vec<usize> = match n_classes {
            0 | 1 => Vec::new(),
            2 => vec![1],
            n => (0..n).collect(),
        };
        let targets: Vec<Vec<bool>> = positives
            .iter()
            .map(|&k| labels.iter().map(|&l| l == k).collect())
            .collect();
        let machines: Vec<Vec<f64>> = targets
            .iter()
            .map(|positive| {
                let y: Vec<f64> = positive.iter().map(|&p| if p { 1.0 } else { -1.0 }).collect();
                solve_classifier(&dual, &y, c, &mut rng)
            })
            .collect();

        let support = SupportVectors::collect(x, kernel, &machines);
        let decision = support.decision(x);
        let platt = targets
            .iter()
            .zip(decision.columns())
            .map(|(positive, column)| fit_platt(&column.to_vec(), positive))
            .collect();
        Self {
            n_classes,
            support,
            platt,
        }
    }

    /// Class probabilities, `n_samples x n_classes`.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        if self.n_classes < 2 {
            return Array2::ones((x.nrows(), self.n_classes));
        }
        let decision = self.support.decision(x);
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in decision.rows().into_iter().enumerate() {
            if self.n_classes == 2 {
                let (a, b) = self.platt[0];
                let p = sigmoid(a * row[0] + b);
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
                continue;
            }
            let scores: Vec<f64> = row
                .iter()
                .zip(&self.platt)
                .map(|(f, (a, b))| sigmoid(a * f + b))
                .collect();
            let total: f64 = scores.iter().sum();
            for (k, s) in scores.iter().enumerate() {
                proba[[i, k]] = if total > 0.0 { s / total } else { 1.0 / self.n_classes as f64 };
            }
        }
        proba
    }

    pub fn n_support(&self) -> usize {
        self.support.len()
    }
}

/// Epsilon-insensitive support vector regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmRegressor {
    support: SupportVectors,
}

impl SvmRegressor {
    pub fn fit(x: ArrayView2<'_, f64>, y: &[f64], choice: KernelChoice, c: f64, epsilon: f64, seed: u64) -> Self {
        let kernel = choice.resolve(x);
        let dual = Dual::new(x, kernel);
        let mut rng = StdRng::seed_from_u64(seed);
        let beta = solve_regressor(&dual, y, c, epsilon, &mut rng);
        Self {
            support: SupportVectors::collect(x, kernel, &[beta]),
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        self.support.decision(x).column(0).to_vec()
    }

    pub fn n_support(&self) -> usize {
        self.support.len()
    }
}
