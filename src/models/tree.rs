//! CART decision trees shared by the tabular estimators.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a tree is fitted against.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Class indices in `0..n_classes`, split on Gini impurity
    Classes { labels: &'a [usize], n_classes: usize },
    /// Continuous values, split on variance
    Values(&'a [f64]),
}

impl Target<'_> {
    fn impurity(&self, rows: &[usize]) -> f64 {
        match *self {
            Target::Classes { labels, n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &r in rows {
                    counts[labels[r]] += 1.0;
                }
                gini(&counts, rows.len() as f64)
            }
            Target::Values(values) => {
                let n = rows.len() as f64;
                let (sum, sq) = rows
                    .iter()
                    .fold((0.0, 0.0), |(s, q), &r| (s + values[r], q + values[r] * values[r]));
                variance(sum, sq, n)
            }
        }
    }

    fn leaf_value(&self, rows: &[usize]) -> Vec<f64> {
        let n = rows.len().max(1) as f64;
        match *self {
            Target::Classes { labels, n_classes } => {
                let mut dist = vec![0.0; n_classes];
                for &r in rows {
                    dist[labels[r]] += 1.0;
                }
                dist.iter_mut().for_each(|c| *c /= n);
                dist
            }
            Target::Values(values) => vec![rows.iter().map(|&r| values[r]).sum::<f64>() / n],
        }
    }
}

fn gini(counts: &[f64], n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / n) * (c / n)).sum::<f64>()
}

fn variance(sum: f64, sq: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sq / n - mean * mean).max(0.0)
}

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    /// Unnormalised impurity decrease per feature
    importances: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    /// `n_left * impurity_left + n_right * impurity_right`
    child_cost: f64,
}

struct Grower<'x, 'a, 'r, R> {
    x: ArrayView2<'x, f64>,
    target: Target<'a>,
    params: &'a TreeParams,
    rng: &'r mut R,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Fit a tree on the given row subset (rows may repeat, as in a bootstrap sample).
    pub fn fit<R: Rng>(
        x: ArrayView2<'_, f64>,
        target: Target<'_>,
        rows: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.ncols();
        let mut grower = Grower {
            x,
            target,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        grower.grow(rows, 0);
        Self {
            nodes: grower.nodes,
            n_features,
            importances: grower.importances,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class distribution (classification) or `[mean]` (regression) of the
    /// leaf reached by `sample`.
    pub fn leaf_value(&self, sample: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Importances normalised to sum to one (all zeros for a single-leaf tree).
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.importances.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.n_features];
        }
        self.importances.iter().map(|v| v / total).collect()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

impl<R: Rng> Grower<'_, '_, '_, R> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.target.leaf_value(&rows),
        });

        let impurity = self.target.impurity(&rows);
        let depth_left = self.params.max_depth.map_or(true, |max| depth < max);
        if !depth_left || rows.len() < self.params.min_samples_split || impurity <= 1e-12 {
            return idx;
        }
        let Some(split) = self.best_split(&rows) else {
            return idx;
        };

        self.importances[split.feature] += rows.len() as f64 * impurity - split.child_cost;

        let x = self.x;
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, split.feature]] <= split.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<Split> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        let k = self.params.max_features.map_or(n_features, |m| m.clamp(1, n_features));
        if k < n_features {
            features.shuffle(self.rng);
            features.truncate(k);
        }

        let mut best: Option<Split> = None;
        for feature in features {
            let mut order = rows.to_vec();
            let x = self.x;
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            let candidate = match self.target {
                Target::Classes { labels, n_classes } => sweep_classes(x, feature, &order, labels, n_classes),
                Target::Values(values) => sweep_values(x, feature, &order, values),
            };
            if let Some((threshold, child_cost)) = candidate {
                if best.as_ref().map_or(true, |b| child_cost < b.child_cost) {
                    best = Some(Split {
                        feature,
                        threshold,
                        child_cost,
                    });
                }
            }
        }
        best
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    let mid = a + (b - a) / 2.0;
    if mid >= b {
        a
    } else {
        mid
    }
}

fn sweep_classes(
    x: ArrayView2<'_, f64>,
    feature: usize,
    order: &[usize],
    labels: &[usize],
    n_classes: usize,
) -> Option<(f64, f64)> {
    let n = order.len() as f64;
    let mut total = vec![0.0; n_classes];
    for &r in order {
        total[labels[r]] += 1.0;
    }
    let mut left = vec![0.0; n_classes];
    let mut right = vec![0.0; n_classes];
    let mut best: Option<(f64, f64)> = None;
    for i in 0..order.len() - 1 {
        left[labels[order[i]]] += 1.0;
        let (a, b) = (x[[order[i], feature]], x[[order[i + 1], feature]]);
        if b <= a {
            continue;
        }
        let n_left = (i + 1) as f64;
        let n_right = n - n_left;
        for c in 0..n_classes {
            right[c] = total[c] - left[c];
        }
        let cost = n_left * gini(&left, n_left) + n_right * gini(&right, n_right);
        if best.map_or(true, |(_, c)| cost < c) {
            best = Some((midpoint(a, b), cost));
        }
    }
    best
}

fn sweep_values(x: ArrayView2<'_, f64>, feature: usize, order: &[usize], values: &[f64]) -> Option<(f64, f64)> {
    let n = order.len() as f64;
    let (total_sum, total_sq) = order
        .iter()
        .fold((0.0, 0.0), |(s, q), &r| (s + values[r], q + values[r] * values[r]));
    let (mut sum, mut sq) = (0.0, 0.0);
    let mut best: Option<(f64, f64)> = None;
    for i in 0..order.len() - 1 {
        let v = values[order[i]];
        sum += v;
        sq += v * v;
        let (a, b) = (x[[order[i], feature]], x[[order[i + 1], feature]]);
        if b <= a {
            continue;
        }
        let n_left = (i + 1) as f64;
        let n_right = n - n_left;
        let cost = n_left * variance(sum, sq, n_left) + n_right * variance(total_sum - sum, total_sq - sq, n_right);
        if best.map_or(true, |(_, c)| cost < c) {
            best = Some((midpoint(a, b), cost));
        }
    }
    best
}
