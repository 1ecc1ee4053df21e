//! Isolation forest over two-dimensional feature vectors.
//!
//! Standard construction: each tree is grown on a random subsample by
//! picking a random dimension with nonzero spread and a uniform random split
//! value within that dimension's range, down to singleton partitions or the
//! height cap `ceil(log2(subsample))`. Points that isolate in few splits get
//! short average path lengths and therefore scores near 1; inliers sit near
//! 0.5 or below. Scoring a point against a forest fit on the same batch is
//! the intended use: the outlier definition is relative to that batch.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

// ---

/// Fixed fit hyperparameters. The defaults are the job's contract: 100
/// trees, 5 % contamination, subsamples of at most 256 points, seed 42.
#[derive(Debug, Clone)]
pub struct ForestParams {
    // ---
    pub trees: usize,
    pub contamination: f64,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        // ---
        ForestParams {
            trees: 100,
            contamination: 0.05,
            max_samples: 256,
            seed: 42,
        }
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        dim: usize,
        at: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

pub struct IsolationForest {
    // ---
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    /// Fit a forest on the given points.
    ///
    /// The RNG is seeded from `params.seed`, so an identical point set
    /// always yields an identical forest. Requires at least two points with
    /// some spread; callers gate degenerate batches before fitting.
    pub fn fit(points: &[[f64; 2]], params: &ForestParams) -> Self {
        // ---
        let mut rng = StdRng::seed_from_u64(params.seed);
        let subsample = params.max_samples.min(points.len());
        let height_cap = (subsample as f64).log2().ceil() as usize;

        let trees = (0..params.trees)
            .map(|_| {
                let sample: Vec<[f64; 2]> = if subsample == points.len() {
                    points.to_vec()
                } else {
                    index::sample(&mut rng, points.len(), subsample)
                        .iter()
                        .map(|i| points[i])
                        .collect()
                };
                build_tree(&sample, 0, height_cap, &mut rng)
            })
            .collect();

        IsolationForest { trees, subsample }
    }

    /// Anomaly score in `(0, 1]`; higher means easier to isolate.
    pub fn score(&self, point: &[f64; 2]) -> f64 {
        // ---
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, point, 0))
            .sum();
        let avg = total / self.trees.len() as f64;

        let norm = average_path_length(self.subsample);
        if norm <= 0.0 {
            return 0.5;
        }
        2f64.powf(-avg / norm)
    }
}

fn build_tree(points: &[[f64; 2]], depth: usize, cap: usize, rng: &mut StdRng) -> Node {
    // ---
    if depth >= cap || points.len() <= 1 {
        return Node::Leaf { size: points.len() };
    }

    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for p in points {
        for d in 0..2 {
            lo[d] = lo[d].min(p[d]);
            hi[d] = hi[d].max(p[d]);
        }
    }

    // Only dimensions with spread can separate anything.
    let dims: Vec<usize> = (0..2).filter(|&d| hi[d] > lo[d]).collect();
    if dims.is_empty() {
        return Node::Leaf { size: points.len() };
    }

    let dim = dims[rng.gen_range(0..dims.len())];
    let at = rng.gen_range(lo[dim]..hi[dim]);

    let (left, right): (Vec<[f64; 2]>, Vec<[f64; 2]>) =
        points.iter().copied().partition(|p| p[dim] < at);

    Node::Split {
        dim,
        at,
        left: Box::new(build_tree(&left, depth + 1, cap, rng)),
        right: Box::new(build_tree(&right, depth + 1, cap, rng)),
    }
}

fn path_length(node: &Node, point: &[f64; 2], depth: usize) -> f64 {
    // ---
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            dim,
            at,
            left,
            right,
        } => {
            if point[*dim] < *at {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful search in a BST of `n` points,
/// the standard normalizer for isolation scores.
fn average_path_length(n: usize) -> f64 {
    // ---
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
