//! Histogram regression tree
//!
//! One tree is grown per boosting round over the same [`BinnedColumns`].
//! Split search accumulates gradient sums per bin, so a node costs one pass
//! over its rows per column and nothing is re-sorted between rounds.
//!
//! - Ordered columns split on a bin threshold.
//! - Categorical columns order the levels present at the node by mean
//!   gradient and split on a prefix of that order.
//! - Missing bins are tried on both sides and the better side becomes the
//!   node's default direction. With no missing rows at a node they go left.

use super::binning::{BinnedColumns, FeatureBinner, MISSING_BIN};

/// Growth limits of one tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// L2 penalty on leaf values
    pub l2_regularization: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    /// Bins up to and including the threshold go left
    Threshold(u16),
    /// Levels flagged `true` go left
    Levels(Vec<bool>),
}

impl Rule {
    fn goes_left(&self, bin: u16, missing_left: bool) -> bool {
        if bin == MISSING_BIN {
            return missing_left;
        }
        match self {
            Rule::Threshold(threshold) => bin <= *threshold,
            Rule::Levels(left) => left.get(bin as usize).copied().unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        column: usize,
        rule: Rule,
        missing_left: bool,
        left: usize,
        right: usize,
    },
}

/// Regression tree over binned columns
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramTree {
    nodes: Vec<Node>,
}

impl HistogramTree {
    /// Grow a tree fitting `gradients` (one per row of `data`)
    pub fn grow(
        binner: &FeatureBinner,
        data: &BinnedColumns,
        gradients: &[f64],
        params: &TreeParams,
    ) -> Self {
        let mut builder = Builder {
            binner,
            data,
            gradients,
            params,
            nodes: Vec::new(),
        };
        let mut rows: Vec<usize> = (0..data.rows()).collect();
        builder.grow(&mut rows, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Leaf value reached by one row
    pub fn predict_row(&self, data: &BinnedColumns, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    column,
                    rule,
                    missing_left,
                    left,
                    right,
                } => {
                    idx = if rule.goes_left(data.bin(row, *column), *missing_left) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct Candidate {
    gain: f64,
    column: usize,
    rule: Rule,
    missing_left: bool,
}

struct Builder<'a> {
    binner: &'a FeatureBinner,
    data: &'a BinnedColumns,
    gradients: &'a [f64],
    params: &'a TreeParams,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let sum: f64 = rows.iter().map(|&r| self.gradients[r]).sum();
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(
            sum / (rows.len() as f64 + self.params.l2_regularization),
        ));

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split {
            return idx;
        }
        let Some(best) = self.best_split(rows, sum) else {
            return idx;
        };

        let data = self.data;
        let column = data.column(best.column);
        let (mut left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| best.rule.goes_left(column[r], best.missing_left));
        let n_left = left.len();
        left.extend(right);
        rows.copy_from_slice(&left);

        let (left_rows, right_rows) = rows.split_at_mut(n_left);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);

        self.nodes[idx] = Node::Split {
            column: best.column,
            rule: best.rule,
            missing_left: best.missing_left,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], sum: f64) -> Option<Candidate> {
        let lambda = self.params.l2_regularization;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = rows.len();
        let parent_score = sum * sum / (n as f64 + lambda);
        let mut best: Option<Candidate> = None;

        for column in 0..self.binner.n_columns() {
            let n_bins = self.binner.n_bins(column);
            if n_bins == 0 {
                continue;
            }

            let bins = self.data.column(column);
            let mut hist = vec![(0.0_f64, 0_usize); n_bins];
            let mut missing = (0.0_f64, 0_usize);
            for &r in rows {
                let slot = match bins[r] {
                    MISSING_BIN => &mut missing,
                    bin => &mut hist[bin as usize],
                };
                slot.0 += self.gradients[r];
                slot.1 += 1;
            }

            // Bins in scan order; a split sends a prefix of it left
            let order: Vec<usize> = if self.binner.is_categorical(column) {
                let mut present: Vec<usize> = (0..n_bins).filter(|&b| hist[b].1 > 0).collect();
                present.sort_by(|&a, &b| {
                    let mean_a = hist[a].0 / hist[a].1 as f64;
                    let mean_b = hist[b].0 / hist[b].1 as f64;
                    mean_a.total_cmp(&mean_b).then(a.cmp(&b))
                });
                present
            } else {
                (0..n_bins).collect()
            };

            let sides: &[bool] = if missing.1 > 0 { &[true, false] } else { &[true] };
            let mut prefix = (0.0_f64, 0_usize);
            for (k, &bin) in order.iter().enumerate() {
                prefix.0 += hist[bin].0;
                prefix.1 += hist[bin].1;

                for &missing_left in sides {
                    let (left_sum, left_n) = if missing_left {
                        (prefix.0 + missing.0, prefix.1 + missing.1)
                    } else {
                        prefix
                    };
                    let right_n = n - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }
                    let right_sum = sum - left_sum;
                    let gain = left_sum * left_sum / (left_n as f64 + lambda)
                        + right_sum * right_sum / (right_n as f64 + lambda)
                        - parent_score;

                    if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                        let rule = if self.binner.is_categorical(column) {
                            let mut left = vec![false; n_bins];
                            for &level in &order[..=k] {
                                left[level] = true;
                            }
                            Rule::Levels(left)
                        } else {
                            Rule::Threshold(bin as u16)
                        };
                        best = Some(Candidate {
                            gain,
                            column,
                            rule,
                            missing_left,
                        });
                    }
                }
            }
        }

        best
    }
}
