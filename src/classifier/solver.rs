//! Branch-and-bound search behind [`OptimalTree`](super::OptimalTree)
//!
//! Every sample is mapped once to its rank among a feature's candidate
//! thresholds, so `x[f] <= thresholds[f][k]` becomes `rank[f][i] <= k`. A
//! node keeps its samples once per feature, each copy in rank order, and a
//! split is a stable partition of those copies rather than a re-sort.
//!
//! Depth-two subtrees are solved directly: for every root cut, the best
//! child split on each side is read off per-bucket class histograms that
//! are updated incrementally as the root cut sweeps. Deeper nodes try root
//! cuts in bisection order and drop ranges of cuts that cannot beat the
//! incumbent:
//!
//! - moving a cut by `k` samples changes the optimal cost of either side
//!   by at most `k`, so a cut costing `c >= ub` rules out every cut within
//!   `c - ub` samples of it
//! - a side only gains samples as the cut moves away from it, so a left
//!   side that alone reaches the bound rules out every cut to its right,
//!   and a right side every cut to its left
//!
//! Results of depth >= 2 subproblems, exact costs or lower bounds, are
//! cached by sample set.

use super::tree::{class_counts, majority, Encoded, Node};
use std::collections::HashMap;
use tracing::{debug, info};

/// Sample indices the subproblem cache may hold in total
const CACHE_CAPACITY: usize = 1 << 22;

#[derive(Debug, Clone)]
enum Subtree {
    Leaf {
        class: usize,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        n_samples: usize,
        left: Box<Subtree>,
        right: Box<Subtree>,
    },
}

/// Optimal tree and its training misclassifications
pub(super) struct Solution {
    pub(super) cost: usize,
    tree: Subtree,
}

impl Solution {
    /// Arena nodes, root first
    pub(super) fn into_nodes(self) -> Vec<Node> {
        let mut arena = Vec::new();
        flatten(self.tree, &mut arena);
        arena
    }
}

/// Result of a bounded solve: with a tree, `cost` is the exact optimum and
/// below the bound; without one, `cost` is a lower bound at or above it.
struct Outcome {
    cost: usize,
    tree: Option<Subtree>,
}

impl Outcome {
    const fn bound(cost: usize) -> Self {
        Self { cost, tree: None }
    }

    fn within(cost: usize, tree: Subtree, ub: usize) -> Self {
        if cost < ub {
            Self {
                cost,
                tree: Some(tree),
            }
        } else {
            Self::bound(cost)
        }
    }
}

enum Cached {
    Exact(usize, Subtree),
    AtLeast(usize),
}

/// Samples of one node, once per feature in ascending rank order
struct View {
    sorted: Vec<Vec<usize>>,
}

impl View {
    fn len(&self) -> usize {
        self.sorted[0].len()
    }

    /// Canonical sample order, also the cache key
    fn samples(&self) -> &[usize] {
        &self.sorted[0]
    }

    fn split(&self, rank: &[usize], k: usize) -> (Self, Self) {
        let (left, right) = self
            .sorted
            .iter()
            .map(|order| order.iter().copied().partition::<Vec<usize>, _>(|&i| rank[i] <= k))
            .unzip();
        (Self { sorted: left }, Self { sorted: right })
    }
}

/// Best child split found so far for one side of a root cut
#[derive(Debug, Clone, Copy)]
struct Side {
    errors: usize,
    /// `(feature, threshold rank)`, or a leaf
    split: Option<(usize, usize)>,
}

/// Class histograms per local bucket of one child feature
struct Histograms {
    classes: usize,
    /// Global threshold rank of each bucket
    ranks: Vec<usize>,
    /// Node samples
    total: Vec<usize>,
    /// Samples left of the current root cut
    left: Vec<usize>,
    below_left: Vec<usize>,
    below_right: Vec<usize>,
}

impl Histograms {
    fn buckets(&self) -> usize {
        self.ranks.len()
    }

    /// Cheapest child split on either side of the root cut, as
    /// `(errors, last bucket sent left)` for the left then the right side.
    fn best_cuts(
        &mut self,
        left_side: &[usize],
        right_side: &[usize],
    ) -> ((usize, usize), (usize, usize)) {
        let c = self.classes;
        let n_left: usize = left_side.iter().sum();
        let n_right: usize = right_side.iter().sum();
        self.below_left.fill(0);
        self.below_right.fill(0);
        let (mut seen_left, mut seen_right) = (0, 0);
        let mut best_left = (usize::MAX, 0);
        let mut best_right = (usize::MAX, 0);

        for b in 0..self.buckets() - 1 {
            for k in 0..c {
                let l = self.left[b * c + k];
                let r = self.total[b * c + k] - l;
                self.below_left[k] += l;
                self.below_right[k] += r;
                seen_left += l;
                seen_right += r;
            }
            let errors = split_errors(&self.below_left, seen_left, left_side, n_left);
            if errors < best_left.0 {
                best_left = (errors, b);
            }
            let errors = split_errors(&self.below_right, seen_right, right_side, n_right);
            if errors < best_right.0 {
                best_right = (errors, b);
            }
        }
        (best_left, best_right)
    }
}

/// Errors of two majority leaves holding `below` and `side - below`
fn split_errors(below: &[usize], n_below: usize, side: &[usize], n_side: usize) -> usize {
    let max_below = below.iter().copied().max().unwrap_or(0);
    let max_above = side
        .iter()
        .zip(below)
        .map(|(s, b)| s - b)
        .max()
        .unwrap_or(0);
    (n_below - max_below) + (n_side - n_below - max_above)
}

fn leaf_errors(counts: &[usize], n: usize) -> usize {
    n - counts.iter().copied().max().unwrap_or(0)
}

pub(super) struct Search<'a> {
    targets: &'a [usize],
    n_classes: usize,
    thresholds: Vec<Vec<f64>>,
    /// `ranks[f][i]`: candidate thresholds of `f` strictly below `x[f]` of sample `i`
    ranks: Vec<Vec<usize>>,
    max_depth: usize,
    verbose: bool,
    cache: Vec<HashMap<Vec<usize>, Cached>>,
    cached: usize,
    /// Per-feature bucket of each sample within the current depth-two node
    local: Vec<Vec<usize>>,
}

impl<'a> Search<'a> {
    /// `thresholds[f]` must be strictly increasing.
    pub(super) fn new(
        data: &'a Encoded,
        thresholds: Vec<Vec<f64>>,
        max_depth: usize,
        verbose: bool,
    ) -> Self {
        let ranks = data
            .columns
            .iter()
            .zip(&thresholds)
            .map(|(column, cuts)| {
                column
                    .iter()
                    .map(|&x| cuts.partition_point(|&t| t < x))
                    .collect()
            })
            .collect();
        Self {
            targets: &data.targets,
            n_classes: data.n_classes(),
            thresholds,
            ranks,
            max_depth,
            verbose,
            cache: (0..=max_depth).map(|_| HashMap::new()).collect(),
            cached: 0,
            local: vec![vec![0; data.n_samples()]; data.n_features()],
        }
    }

    pub(super) fn run(&mut self) -> Solution {
        let n = self.targets.len();
        let root = View {
            sorted: self
                .ranks
                .iter()
                .map(|rank| {
                    let mut order: Vec<usize> = (0..n).collect();
                    order.sort_by_key(|&i| rank[i]);
                    order
                })
                .collect(),
        };
        // no tree makes n + 1 errors, so the root always comes back solved
        let outcome = self.solve(&root, self.max_depth, n + 1);
        debug!(
            cached_subproblems = self.cache.iter().map(HashMap::len).sum::<usize>(),
            cached_samples = self.cached,
            "search finished"
        );
        match outcome.tree {
            Some(tree) => Solution {
                cost: outcome.cost,
                tree,
            },
            None => {
                let (cost, tree) = self.leaf(root.samples());
                Solution { cost, tree }
            }
        }
    }

    fn leaf(&self, samples: &[usize]) -> (usize, Subtree) {
        let counts = class_counts(self.targets, samples, self.n_classes);
        let class = majority(&counts);
        let tree = Subtree::Leaf {
            class,
            n_samples: samples.len(),
        };
        (samples.len() - counts[class], tree)
    }

    /// Split `samples` at `rank[feature] <= k` into two majority leaves.
    fn split_leaves(&self, samples: &[usize], feature: usize, k: usize) -> Subtree {
        let rank = &self.ranks[feature];
        let (left, right): (Vec<usize>, Vec<usize>) =
            samples.iter().copied().partition(|&i| rank[i] <= k);
        Subtree::Split {
            feature,
            threshold: self.thresholds[feature][k],
            n_samples: samples.len(),
            left: Box::new(self.leaf(&left).1),
            right: Box::new(self.leaf(&right).1),
        }
    }

    /// Cheapest tree of depth at most `depth` over `view`, if one costs
    /// less than `ub`.
    fn solve(&mut self, view: &View, depth: usize, ub: usize) -> Outcome {
        let (leaf_cost, leaf) = self.leaf(view.samples());
        if leaf_cost == 0 || depth == 0 {
            return Outcome::within(leaf_cost, leaf, ub);
        }
        if ub == 0 {
            return Outcome::bound(0);
        }
        if depth == 1 {
            let (cost, tree) = self.best_stump(view, leaf_cost, leaf);
            return Outcome::within(cost, tree, ub);
        }
        if let Some(hit) = self.lookup(view, depth, ub) {
            return hit;
        }

        if depth == 2 {
            let (cost, tree) = self.depth_two(view, leaf_cost, leaf);
            self.store(view, depth, Cached::Exact(cost, tree.clone()));
            Outcome::within(cost, tree, ub)
        } else {
            let outcome = self.branch(view, depth, ub, leaf_cost, leaf);
            let entry = match &outcome.tree {
                Some(tree) => Cached::Exact(outcome.cost, tree.clone()),
                None => Cached::AtLeast(outcome.cost),
            };
            self.store(view, depth, entry);
            outcome
        }
    }

    fn lookup(&self, view: &View, depth: usize, ub: usize) -> Option<Outcome> {
        match self.cache[depth].get(view.samples())? {
            Cached::Exact(cost, tree) => Some(Outcome::within(*cost, tree.clone(), ub)),
            Cached::AtLeast(bound) if *bound >= ub => Some(Outcome::bound(*bound)),
            Cached::AtLeast(_) => None,
        }
    }

    fn store(&mut self, view: &View, depth: usize, entry: Cached) {
        let key = view.samples();
        if let Some(slot) = self.cache[depth].get_mut(key) {
            *slot = entry;
            return;
        }
        if self.cached + key.len() > CACHE_CAPACITY {
            return;
        }
        self.cached += key.len();
        self.cache[depth].insert(key.to_vec(), entry);
    }

    /// Root cuts of depth >= 3 nodes, bisected and pruned against `ub`.
    fn branch(
        &mut self,
        view: &View,
        depth: usize,
        ub: usize,
        leaf_cost: usize,
        leaf: Subtree,
    ) -> Outcome {
        let n = view.len();
        let mut best = (leaf_cost < ub).then_some(leaf);
        let mut ub = ub.min(leaf_cost);

        for feature in 0..view.sorted.len() {
            let cuts = self.cuts(view, feature);
            let mut pending = vec![(0, cuts.len())];

            while let Some((lo, hi)) = pending.pop() {
                if lo >= hi || ub == 0 {
                    continue;
                }
                let mid = lo + (hi - lo) / 2;
                let (pos, k) = cuts[mid];
                let (left_view, right_view) = view.split(&self.ranks[feature], k);

                let left = self.solve(&left_view, depth - 1, ub);
                let Some(left_tree) = left.tree else {
                    // cuts to the right only add samples to the left side
                    let gap = left.cost - ub;
                    let keep = lo + cuts[lo..mid].partition_point(|&(p, _)| p + gap < pos);
                    pending.push((lo, keep));
                    continue;
                };

                let right = self.solve(&right_view, depth - 1, ub - left.cost);
                let total = left.cost + right.cost;
                if let Some(right_tree) = right.tree {
                    best = Some(Subtree::Split {
                        feature,
                        threshold: self.thresholds[feature][k],
                        n_samples: n,
                        left: Box::new(left_tree),
                        right: Box::new(right_tree),
                    });
                    ub = total;
                }

                let gap = total - ub;
                if right.cost < ub {
                    let keep = lo + cuts[lo..mid].partition_point(|&(p, _)| p + gap < pos);
                    pending.push((lo, keep));
                }
                let resume =
                    mid + 1 + cuts[mid + 1..hi].partition_point(|&(p, _)| p <= pos + gap);
                pending.push((resume, hi));
            }

            if depth == self.max_depth {
                if self.verbose {
                    info!(feature, best_errors = ub, "feature searched");
                } else {
                    debug!(feature, best_errors = ub, "feature searched");
                }
            }
        }

        match best {
            Some(tree) => Outcome {
                cost: ub,
                tree: Some(tree),
            },
            None => Outcome::bound(ub),
        }
    }

    /// `(left size, threshold rank)` of every cut of `view` on `feature`
    /// that leaves both sides non-empty.
    fn cuts(&self, view: &View, feature: usize) -> Vec<(usize, usize)> {
        let rank = &self.ranks[feature];
        let order = &view.sorted[feature];
        (1..order.len())
            .filter(|&p| rank[order[p - 1]] != rank[order[p]])
            .map(|p| (p, rank[order[p - 1]]))
            .collect()
    }

    /// Best single split by one scan per feature with incremental class
    /// counts.
    fn best_stump(&self, view: &View, leaf_cost: usize, leaf: Subtree) -> (usize, Subtree) {
        let n = view.len();
        let total = class_counts(self.targets, view.samples(), self.n_classes);
        let mut best: Option<(usize, usize)> = None;
        let mut best_cost = leaf_cost;

        for (feature, order) in view.sorted.iter().enumerate() {
            let rank = &self.ranks[feature];
            let mut left = vec![0; self.n_classes];
            for p in 1..n {
                left[self.targets[order[p - 1]]] += 1;
                if rank[order[p - 1]] == rank[order[p]] {
                    continue;
                }
                let cost = split_errors(&left, p, &total, n);
                if cost < best_cost {
                    best_cost = cost;
                    best = Some((feature, rank[order[p - 1]]));
                }
            }
        }

        match best {
            Some((feature, k)) => (best_cost, self.split_leaves(view.samples(), feature, k)),
            None => (leaf_cost, leaf),
        }
    }

    /// Exact depth-two optimum without recursion, `O(F^2 * n * B * C)` for
    /// `B` distinct ranks per feature.
    fn depth_two(&mut self, view: &View, leaf_cost: usize, leaf: Subtree) -> (usize, Subtree) {
        let n = view.len();
        let c = self.n_classes;

        let mut histograms: Vec<Histograms> = Vec::with_capacity(view.sorted.len());
        for (feature, order) in view.sorted.iter().enumerate() {
            let rank = &self.ranks[feature];
            let local = &mut self.local[feature];
            let mut ranks: Vec<usize> = Vec::new();
            for &i in order {
                if ranks.last() != Some(&rank[i]) {
                    ranks.push(rank[i]);
                }
                local[i] = ranks.len() - 1;
            }
            let mut total = vec![0; ranks.len() * c];
            for &i in order {
                total[local[i] * c + self.targets[i]] += 1;
            }
            histograms.push(Histograms {
                classes: c,
                left: vec![0; total.len()],
                total,
                ranks,
                below_left: vec![0; c],
                below_right: vec![0; c],
            });
        }

        let node_counts = class_counts(self.targets, view.samples(), c);
        let mut best_cost = leaf_cost;
        let mut best: Option<(usize, usize, Side, Side)> = None;

        for (feature, order) in view.sorted.iter().enumerate() {
            let cuts = self.cuts(view, feature);
            if cuts.is_empty() {
                continue;
            }

            // leaves on both sides, improved child feature by child feature
            let mut sides: Vec<(Side, Side)> = Vec::with_capacity(cuts.len());
            let mut left_counts = vec![0; c];
            let mut next = 0;
            for (p, &i) in order.iter().enumerate() {
                left_counts[self.targets[i]] += 1;
                if next < cuts.len() && cuts[next].0 == p + 1 {
                    let right_counts: Vec<usize> = node_counts
                        .iter()
                        .zip(&left_counts)
                        .map(|(t, l)| t - l)
                        .collect();
                    sides.push((
                        Side {
                            errors: leaf_errors(&left_counts, p + 1),
                            split: None,
                        },
                        Side {
                            errors: leaf_errors(&right_counts, n - p - 1),
                            split: None,
                        },
                    ));
                    next += 1;
                }
            }

            for (child, hist) in histograms.iter_mut().enumerate() {
                if hist.buckets() < 2 {
                    continue;
                }
                let local = &self.local[child];
                hist.left.fill(0);
                left_counts.fill(0);
                let mut right_counts = node_counts.clone();
                let mut next = 0;
                for (p, &i) in order.iter().enumerate() {
                    let target = self.targets[i];
                    hist.left[local[i] * c + target] += 1;
                    left_counts[target] += 1;
                    right_counts[target] -= 1;
                    if next < cuts.len() && cuts[next].0 == p + 1 {
                        let ((l_errors, l_bucket), (r_errors, r_bucket)) =
                            hist.best_cuts(&left_counts, &right_counts);
                        let (left_side, right_side) = &mut sides[next];
                        if l_errors < left_side.errors {
                            *left_side = Side {
                                errors: l_errors,
                                split: Some((child, hist.ranks[l_bucket])),
                            };
                        }
                        if r_errors < right_side.errors {
                            *right_side = Side {
                                errors: r_errors,
                                split: Some((child, hist.ranks[r_bucket])),
                            };
                        }
                        next += 1;
                    }
                }
            }

            for (&(_, k), &(left_side, right_side)) in cuts.iter().zip(&sides) {
                let cost = left_side.errors + right_side.errors;
                if cost < best_cost {
                    best_cost = cost;
                    best = Some((feature, k, left_side, right_side));
                }
            }
            if best_cost == 0 {
                break;
            }
        }

        let Some((feature, k, left_side, right_side)) = best else {
            return (leaf_cost, leaf);
        };
        let rank = &self.ranks[feature];
        let (left, right): (Vec<usize>, Vec<usize>) =
            view.samples().iter().copied().partition(|&i| rank[i] <= k);
        let child = |samples: &[usize], side: Side| match side.split {
            Some((feature, k)) => self.split_leaves(samples, feature, k),
            None => self.leaf(samples).1,
        };
        let tree = Subtree::Split {
            feature,
            threshold: self.thresholds[feature][k],
            n_samples: n,
            left: Box::new(child(&left, left_side)),
            right: Box::new(child(&right, right_side)),
        };
        (best_cost, tree)
    }
}

fn flatten(tree: Subtree, arena: &mut Vec<Node>) -> usize {
    let idx = arena.len();
    match tree {
        Subtree::Leaf { class, n_samples } => {
            arena.push(Node::Leaf { class, n_samples });
        }
        Subtree::Split {
            feature,
            threshold,
            n_samples,
            left,
            right,
        } => {
            arena.push(Node::Leaf {
                class: 0,
                n_samples,
            });
            let left = flatten(*left, arena);
            let right = flatten(*right, arena);
            arena[idx] = Node::Split {
                feature,
                threshold,
                left,
                right,
                n_samples,
            };
        }
    }
    idx
}
