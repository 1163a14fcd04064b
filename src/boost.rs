// imports
use crate::config::JsonTrain;
use crate::error::BoostError;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Instant;
use log::{debug, info};
use ndarray::{Array2, ArrayView1, Axis};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};


// initial margin of every class before the first round
const BASE_SCORE: f32 = 0.5;
// splits gaining less than this are not worth a node
const MIN_SPLIT_GAIN: f64 = 1e-6;
const MIN_HESSIAN: f64 = 1e-16;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    Softmax,
    Softprob,
}

impl FromStr for Objective {
    type Err = BoostError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multi:softmax" => Ok(Objective::Softmax),
            "multi:softprob" => Ok(Objective::Softprob),
            other => Err(BoostError::UnknownObjective(other.to_string()))
        }
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMetric {
    MError,
    MLogLoss,
}

impl FromStr for EvalMetric {
    type Err = BoostError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merror" => Ok(EvalMetric::MError),
            "mlogloss" => Ok(EvalMetric::MLogLoss),
            other => Err(BoostError::UnknownMetric(other.to_string()))
        }
    }
}

impl Display for EvalMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalMetric::MError => write!(f, "merror"),
            EvalMetric::MLogLoss => write!(f, "mlogloss"),
        }
    }
}

impl EvalMetric {
    pub fn evaluate(&self, probs: &Array2<f32>, labels: &[usize]) -> f64 {
        match self {
            EvalMetric::MError => merror(probs, labels),
            EvalMetric::MLogLoss => mlogloss(probs, labels),
        }
    }
}


#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Leaf { weight: f32 },
    Split { feature: usize, threshold: f32, left: usize, right: usize },
}


/// A regression tree stored as a flat node list, the root at index 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {

    pub fn predict_row(&self, row: ArrayView1<f32>) -> f32 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { weight } => return weight,
                Node::Split { feature, threshold, left, right } => {
                    i = if row[feature] < threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}


#[derive(Clone, Copy, Debug)]
struct SplitCandidate {
    gain: f64,
    feature: usize,
    threshold: f32,
}

impl SplitCandidate {
    // higher gain wins, the lower feature index on ties so results do not depend on thread order
    fn better_than(&self, other: &Option<SplitCandidate>) -> bool {
        match other {
            None => true,
            Some(o) => self.gain > o.gain || (self.gain == o.gain && self.feature < o.feature)
        }
    }
}


// gradient statistics and split settings for growing the trees of one round
struct TreeGrower<'a> {
    x_mat: &'a Array2<f32>,
    sorted: &'a [Vec<usize>],
    grad: &'a [f64],
    hess: &'a [f64],
    max_depth: usize,
    eta: f64,
    lambda: f64,
    min_child_weight: f64,
}

impl<'a> TreeGrower<'a> {

    fn leaf_weight(&self, g: f64, h: f64) -> f32 {
        (-g / (h + self.lambda) * self.eta) as f32
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.lambda)
    }

    fn scan_feature(&self, feature: usize, position: &[Option<usize>], sums: &[(f64, f64)]) -> Vec<Option<SplitCandidate>> {

        // walks the rows in ascending feature value once, keeping a running left
        // sum per node. A candidate threshold sits between two distinct values.
        let n_nodes = sums.len();
        let mut left: Vec<(f64, f64, Option<f32>)> = vec![(0.0, 0.0, None); n_nodes];
        let mut best: Vec<Option<SplitCandidate>> = vec![None; n_nodes];

        for &r in &self.sorted[feature] {
            let node = match position[r] {
                Some(node) => node,
                None => continue
            };
            let value = self.x_mat[[r, feature]];
            let (gl, hl, last) = left[node];

            if let Some(last) = last {
                if value > last {
                    let (g, h) = sums[node];
                    let (gr, hr) = (g - gl, h - hl);
                    if hl >= self.min_child_weight && hr >= self.min_child_weight {
                        let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - self.score(g, h));
                        let candidate = SplitCandidate { gain, feature, threshold: (last + value) / 2.0 };
                        if gain > MIN_SPLIT_GAIN && candidate.better_than(&best[node]) {
                            best[node] = Some(candidate);
                        }
                    }
                }
            }
            left[node] = (gl + self.grad[r], hl + self.hess[r], Some(value));
        }
        best
    }

    fn grow(&self) -> Tree {

        // grows level by level, `position` maps each row to the open node it falls in
        let n_rows = self.x_mat.nrows();
        let n_features = self.x_mat.ncols();
        let mut nodes: Vec<Node> = vec![Node::Leaf { weight: 0.0 }];
        let mut position: Vec<Option<usize>> = vec![Some(0); n_rows];
        let mut frontier: Vec<usize> = vec![0];

        for depth in 0..=self.max_depth {

            let mut sums: Vec<(f64, f64)> = vec![(0.0, 0.0); nodes.len()];
            for (r, p) in position.iter().enumerate() {
                if let Some(p) = p {
                    sums[*p].0 += self.grad[r];
                    sums[*p].1 += self.hess[r];
                }
            }
            for &node in &frontier {
                let (g, h) = sums[node];
                nodes[node] = Node::Leaf { weight: self.leaf_weight(g, h) };
            }
            if depth == self.max_depth {
                break;
            }

            let best: Vec<Option<SplitCandidate>> = (0..n_features)
            .into_par_iter()
            .map(|feature| self.scan_feature(feature, &position, &sums))
            .reduce(|| vec![None; sums.len()], |mut acc, other| {
                for (a, o) in acc.iter_mut().zip(other) {
                    if let Some(o) = o {
                        if o.better_than(a) {
                            *a = Some(o);
                        }
                    }
                }
                acc
            });

            let mut next_frontier: Vec<usize> = Vec::new();
            for &node in &frontier {
                if let Some(split) = best[node] {
                    let left = nodes.len();
                    nodes.push(Node::Leaf { weight: 0.0 });
                    nodes.push(Node::Leaf { weight: 0.0 });
                    nodes[node] = Node::Split { feature: split.feature, threshold: split.threshold, left, right: left + 1 };
                    next_frontier.push(left);
                    next_frontier.push(left + 1);
                }
            }
            if next_frontier.is_empty() {
                break;
            }

            // rows of split nodes move down, rows of final leaves are done
            for (r, p) in position.iter_mut().enumerate() {
                if let Some(node) = *p {
                    *p = match nodes[node] {
                        Node::Split { feature, threshold, left, right } => {
                            Some(if self.x_mat[[r, feature]] < threshold { left } else { right })
                        },
                        Node::Leaf { .. } => None
                    };
                }
            }
            frontier = next_frontier;
        }

        Tree { nodes }
    }
}


/// Multi-class gradient boosted trees with a softmax loss.
///
/// Every round grows one tree per class on the first and second order
/// gradients of the softmax cross entropy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booster {
    num_class: usize,
    num_features: usize,
    objective: Objective,
    trees: Vec<Vec<Tree>>,
}

impl Booster {

    /// The feature words a model is applied with must be the ones it was trained on.
    pub fn check_vocabulary(&self, word_features: &[String]) -> Result<(), BoostError> {
        if word_features.len() != self.num_features {
            return Err(BoostError::FeatureCount { expected: self.num_features, found: word_features.len() });
        }
        Ok(())
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_rounds(&self) -> usize {
        self.trees.len()
    }

    fn validate(x_mat: &Array2<f32>, labels: &[usize], num_class: usize) -> Result<(), BoostError> {

        if x_mat.nrows() != labels.len() {
            return Err(BoostError::ShapeMismatch { rows: x_mat.nrows(), labels: labels.len() });
        }
        if x_mat.nrows() == 0 {
            return Err(BoostError::Empty);
        }
        if let Some(label) = labels.iter().find(|l| **l >= num_class) {
            return Err(BoostError::LabelOutOfRange { label: *label, num_class });
        }
        Ok(())
    }

    fn argsort_columns(x_mat: &Array2<f32>) -> Vec<Vec<usize>> {
        x_mat
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|col| {
            let mut order: Vec<usize> = (0..col.len()).collect();
            order.sort_by(|i, j| col[*i].total_cmp(&col[*j]));
            order
        })
        .collect()
    }

    fn add_round(margins: &mut Array2<f32>, x_mat: &Array2<f32>, round: &[Tree]) {
        for (mut margin, row) in margins.axis_iter_mut(Axis(0)).zip(x_mat.axis_iter(Axis(0))) {
            for (k, tree) in round.iter().enumerate() {
                margin[k] += tree.predict_row(row);
            }
        }
    }

    pub fn train(x_mat: &Array2<f32>,
        labels: &[usize],
        train_params: &JsonTrain,
        holdout: Option<(&Array2<f32>, &[usize])>) -> Result<Booster, BoostError> {

            let objective: Objective = train_params.objective.parse()?;
            let metric: EvalMetric = train_params.eval_metric.parse()?;
            let num_class = train_params.num_class;
            Booster::validate(x_mat, labels, num_class)?;
            if let Some((h_mat, h_labels)) = holdout {
                Booster::validate(h_mat, h_labels, num_class)?;
                if h_mat.ncols() != x_mat.ncols() {
                    return Err(BoostError::FeatureCount { expected: x_mat.ncols(), found: h_mat.ncols() });
                }
            }

            let n_rows = x_mat.nrows();
            let sorted = Booster::argsort_columns(x_mat);
            let mut margins: Array2<f32> = Array2::from_elem((n_rows, num_class), BASE_SCORE);
            let mut holdout_margins: Option<Array2<f32>> = holdout
            .map(|(h_mat, _)| Array2::from_elem((h_mat.nrows(), num_class), BASE_SCORE));

            let mut booster = Booster {
                num_class,
                num_features: x_mat.ncols(),
                objective,
                trees: Vec::with_capacity(train_params.num_round)
            };

            for round in 0..train_params.num_round {

                let timer = Instant::now();
                let probs = softmax_rows(&margins);

                let mut round_trees: Vec<Tree> = Vec::with_capacity(num_class);
                for k in 0..num_class {

                    let grad: Vec<f64> = (0..n_rows)
                    .map(|r| probs[[r, k]] as f64 - if labels[r] == k { 1.0 } else { 0.0 })
                    .collect();
                    let hess: Vec<f64> = (0..n_rows)
                    .map(|r| {
                        let p = probs[[r, k]] as f64;
                        (2.0 * p * (1.0 - p)).max(MIN_HESSIAN)
                    })
                    .collect();

                    let grower = TreeGrower {
                        x_mat,
                        sorted: &sorted,
                        grad: &grad,
                        hess: &hess,
                        max_depth: train_params.max_depth,
                        eta: train_params.eta as f64,
                        lambda: train_params.lambda as f64,
                        min_child_weight: train_params.min_child_weight as f64,
                    };
                    round_trees.push(grower.grow());
                }

                Booster::add_round(&mut margins, x_mat, &round_trees);
                let mut report = format!("[{}]\ttrain-{}:{:.6}", round, metric, metric.evaluate(&softmax_rows(&margins), labels));
                if let (Some(h_margins), Some((h_mat, h_labels))) = (holdout_margins.as_mut(), holdout) {
                    Booster::add_round(h_margins, h_mat, &round_trees);
                    report.push_str(&format!("\tholdout-{}:{:.6}", metric, metric.evaluate(&softmax_rows(h_margins), h_labels)));
                }
                info!("{}", report);
                debug!("round {} leaves per class {:?}, took {} ms", round, round_trees.iter().map(Tree::n_leaves).collect::<Vec<usize>>(), timer.elapsed().as_millis());

                booster.trees.push(round_trees);
            }

            Ok(booster)
    }

    pub fn predict_margin(&self, x_mat: &Array2<f32>) -> Result<Array2<f32>, BoostError> {

        if x_mat.ncols() != self.num_features {
            return Err(BoostError::FeatureCount { expected: self.num_features, found: x_mat.ncols() });
        }
        let mut margins: Array2<f32> = Array2::from_elem((x_mat.nrows(), self.num_class), BASE_SCORE);
        for round in &self.trees {
            Booster::add_round(&mut margins, x_mat, round);
        }
        Ok(margins)
    }

    pub fn predict_proba(&self, x_mat: &Array2<f32>) -> Result<Array2<f32>, BoostError> {
        Ok(softmax_rows(&self.predict_margin(x_mat)?))
    }

    pub fn predict(&self, x_mat: &Array2<f32>) -> Result<Vec<usize>, BoostError> {
        let margins = self.predict_margin(x_mat)?;
        Ok(argmax_rows(&margins))
    }
}


pub fn softmax_rows(margins: &Array2<f32>) -> Array2<f32> {
    let mut probs = margins.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, v| m.max(*v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    probs
}


pub fn argmax_rows(scores: &Array2<f32>) -> Vec<usize> {
    scores
    .axis_iter(Axis(0))
    .map(|row| row.argmax().unwrap_or(0))
    .collect()
}


/// Fraction of rows whose most probable class is not the label.
pub fn merror(probs: &Array2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let wrong = argmax_rows(probs).iter().zip(labels).filter(|(p, l)| p != l).count();
    wrong as f64 / labels.len() as f64
}


pub fn mlogloss(probs: &Array2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let eps = 1e-15_f64;
    let total: f64 = labels
    .iter()
    .enumerate()
    .map(|(r, l)| -(probs[[r, *l]] as f64).clamp(eps, 1.0 - eps).ln())
    .sum();
    total / labels.len() as f64
}
