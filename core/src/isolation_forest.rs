//! Isolation forest over a single numeric feature.
//!
//! Each tree is grown on a subsample drawn without replacement, splitting
//! at a uniform random threshold between the node's min and max until the
//! node is pure or the depth limit log2(subsample) is hit. A point's
//! anomaly score is 2^(-E[h(x)] / c(psi)), where h is the isolation depth
//! (plus the expected depth of the leaf's remaining points) and c(psi)
//! the average unsuccessful-search path length for psi samples.
//!
//! The decision offset is the `contamination` quantile of the training
//! scores, so on the fitted data roughly that share of rows lands below 0.
//! `outlier_score` is the negated decision value: higher = more anomalous,
//! positive = predicted outlier.

use crate::{
    error::{LedgerError, LedgerResult},
    rng::{RngBank, StreamRng},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Rows scored between two budget checks.
const SCORE_CHECK_ROWS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees:       usize,
    pub max_samples:   usize,
    pub contamination: f64,
    pub seed:          u64,
}

// ── Fit budget ───────────────────────────────────────────────────────────────

/// Shared flag a caller can trip to abandon a running fit.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits on a single fit. Checked between trees and every
/// `SCORE_CHECK_ROWS` rows while scoring the training set.
#[derive(Debug, Clone, Default)]
pub struct FitBudget {
    pub deadline: Option<Instant>,
    pub cancel:   Option<CancelFlag>,
}

impl FitBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check(&self, done: usize, unit: &str) -> LedgerResult<()> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(LedgerError::FitAborted {
                reason: format!("cancelled after {done} {unit}"),
            });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(LedgerError::FitAborted {
                reason: format!("deadline passed after {done} {unit}"),
            });
        }
        Ok(())
    }
}

// ── Trees ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(sample: &mut [f64], rng: &mut StreamRng, max_depth: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(sample, rng, 0, max_depth);
        tree
    }

    fn grow_node(&mut self, sample: &mut [f64], rng: &mut StreamRng, depth: usize, max_depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: sample.len() });

        if depth >= max_depth || sample.len() <= 1 {
            return id;
        }
        let (min, max) = sample
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if max <= min {
            return id;
        }

        let threshold = rng.uniform(min, max);
        let split = partition(sample, threshold);
        if split == 0 || split == sample.len() {
            return id;
        }

        let (lower, upper) = sample.split_at_mut(split);
        let left = self.grow_node(lower, rng, depth + 1, max_depth);
        let right = self.grow_node(upper, rng, depth + 1, max_depth);
        self.nodes[id] = Node::Split { threshold, left, right };
        id
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = 0;
        let mut depth = 0usize;
        loop {
            match self.nodes[node] {
                Node::Leaf { size } => return depth as f64 + average_path_length(size),
                Node::Split { threshold, left, right } => {
                    node = if x <= threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Move values <= threshold to the front. Returns the count moved.
fn partition(sample: &mut [f64], threshold: f64) -> usize {
    let mut boundary = 0;
    for i in 0..sample.len() {
        if sample[i] <= threshold {
            sample.swap(i, boundary);
            boundary += 1;
        }
    }
    boundary
}

/// Expected path length of an unsuccessful BST search over n points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, q in [0, 100].
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

// ── Forest ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees:       Vec<IsolationTree>,
    sample_size: usize,
    offset:      f64,
    /// Raw scores of the rows the forest was fitted on.
    training:    Vec<f64>,
}

/// Per-row output of `fit_score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestScores {
    pub outlier_scores: Vec<f64>,
    pub predictions:    Vec<bool>,
}

impl IsolationForest {
    /// Fit on `values`. Needs at least two finite values.
    pub fn fit(values: &[f64], params: &ForestParams, budget: &FitBudget) -> LedgerResult<Self> {
        if values.len() < 2 {
            return Err(LedgerError::InsufficientData {
                reason: format!("isolation forest needs at least 2 rows, got {}", values.len()),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LedgerError::InsufficientData {
                reason: "isolation forest input contains non-finite values".into(),
            });
        }

        if params.n_trees == 0 {
            return Err(LedgerError::InvalidConfig { reason: "n_trees must be > 0".into() });
        }

        let sample_size = params.max_samples.min(values.len()).max(2);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let bank = RngBank::new(params.seed);

        let mut trees = Vec::with_capacity(params.n_trees);
        for t in 0..params.n_trees {
            budget.check(t, "trees")?;
            let mut rng = bank.for_tree(t);
            let mut sample: Vec<f64> = rng
                .sample_indices(values.len(), sample_size)
                .into_iter()
                .map(|i| values[i])
                .collect();
            trees.push(IsolationTree::grow(&mut sample, &mut rng, max_depth));
        }

        let mut forest = Self { trees, sample_size, offset: 0.0, training: Vec::new() };
        forest.training = forest.score_within(values, budget)?;
        forest.offset = percentile(&forest.training, 100.0 * params.contamination);
        log::debug!(
            "isolation_forest: {} trees, psi={}, depth<={}, offset={:.6}",
            forest.trees.len(),
            sample_size,
            max_depth,
            forest.offset
        );
        Ok(forest)
    }

    /// Raw scores in [-1, 0): lower = more anomalous.
    pub fn score_samples(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&x| self.score_one(x)).collect()
    }

    fn score_one(&self, x: f64) -> f64 {
        let norm = average_path_length(self.sample_size);
        let mean_depth = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean_depth / norm))
    }

    /// `score_samples` under a budget, checked once per chunk of rows.
    fn score_within(&self, values: &[f64], budget: &FitBudget) -> LedgerResult<Vec<f64>> {
        let mut scores = Vec::with_capacity(values.len());
        for chunk in values.chunks(SCORE_CHECK_ROWS) {
            budget.check(scores.len(), "rows scored")?;
            scores.extend(chunk.iter().map(|&x| self.score_one(x)));
        }
        Ok(scores)
    }

    /// Negated decision function: positive = outlier.
    pub fn outlier_scores(&self, values: &[f64]) -> Vec<f64> {
        self.score_samples(values)
            .into_iter()
            .map(|s| self.offset - s)
            .collect()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Fit and score the same values in one call. The training scores
    /// from the fit are reused, so every row is walked through the forest once.
    pub fn fit_score(values: &[f64], params: &ForestParams, budget: &FitBudget) -> LedgerResult<ForestScores> {
        let forest = Self::fit(values, params, budget)?;
        let outlier_scores: Vec<f64> = forest.training.iter().map(|&s| forest.offset - s).collect();
        let predictions = outlier_scores.iter().map(|&s| s > 0.0).collect();
        Ok(ForestScores { outlier_scores, predictions })
    }
}
