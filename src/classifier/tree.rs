//! Fitted axis-aligned decision trees, shared by every builder.
//!
//! Nodes live in an arena (`Vec<Node>`) addressed by index; the root is
//! always node 0. A sample goes left when `x[feature] <= threshold`.

use crate::dataset::Label;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One arena node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node predicting `classes[class]`
    Leaf {
        /// Index into the tree's class table
        class: usize,
        /// Training samples that reached this leaf
        n_samples: usize,
    },
    /// Internal threshold test
    Split {
        /// Feature column tested
        feature: usize,
        /// Go left when the value is `<= threshold`
        threshold: f64,
        /// Arena index of the left child
        left: usize,
        /// Arena index of the right child
        right: usize,
        /// Training samples that reached this node
        n_samples: usize,
    },
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    classes: Vec<Label>,
}

impl DecisionTree {
    pub(crate) fn new(nodes: Vec<Node>, n_features: usize, classes: Vec<Label>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self {
            nodes,
            n_features,
            classes,
        }
    }

    /// Arena nodes, root first
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of features seen during training
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Distinct training labels, ascending
    #[must_use]
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    /// Number of decision levels (a single leaf has depth 0)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    /// Number of leaves
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Predict a single row
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> Label {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class, .. } => return self.classes[*class],
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Predict every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a row's width differs from the
    /// training width.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>> {
        features
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() == self.n_features {
                    Ok(self.predict_row(row))
                } else {
                    Err(Error::InvalidInput(format!(
                        "row {i} has {} features, tree was trained on {}",
                        row.len(),
                        self.n_features
                    )))
                }
            })
            .collect()
    }

    /// Render the tree in Graphviz DOT format.
    ///
    /// `class_names[i]` labels the i-th class in ascending label order;
    /// missing names fall back to the numeric label.
    #[must_use]
    pub fn export_dot(&self, class_names: Option<&[String]>) -> String {
        self.dot(class_names).to_string()
    }

    /// DOT rendering that can be written straight to any formatter
    #[must_use]
    pub const fn dot<'a>(&'a self, class_names: Option<&'a [String]>) -> Dot<'a> {
        Dot {
            tree: self,
            class_names,
        }
    }

    fn class_name(&self, class: usize, class_names: Option<&[String]>) -> String {
        class_names
            .and_then(|names| names.get(class))
            .cloned()
            .unwrap_or_else(|| self.classes[class].to_string())
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, idx: usize, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match &self.nodes[idx] {
            Node::Leaf { class, n_samples } => {
                writeln!(f, "{pad}leaf: {} (n={n_samples})", self.classes[*class])
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                writeln!(f, "{pad}x[{feature}] <= {threshold:.4}")?;
                self.fmt_node(f, *left, indent + 1)?;
                self.fmt_node(f, *right, indent + 1)
            }
        }
    }
}

impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, 0, 0)
    }
}

/// Graphviz view of a [`DecisionTree`], see [`DecisionTree::dot`]
#[derive(Debug, Clone, Copy)]
pub struct Dot<'a> {
    tree: &'a DecisionTree,
    class_names: Option<&'a [String]>,
}

impl fmt::Display for Dot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph Tree {{")?;
        writeln!(f, "node [shape=box, fontname=\"helvetica\"] ;")?;
        for (idx, node) in self.tree.nodes.iter().enumerate() {
            match node {
                Node::Leaf { class, n_samples } => {
                    let name = self.tree.class_name(*class, self.class_names);
                    writeln!(f, "{idx} [label=\"class = {name}\\nsamples = {n_samples}\"] ;")?;
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    n_samples,
                } => {
                    writeln!(
                        f,
                        "{idx} [label=\"x[{feature}] <= {threshold:.4}\\nsamples = {n_samples}\"] ;"
                    )?;
                    writeln!(f, "{idx} -> {left} [headlabel=\"True\"] ;")?;
                    writeln!(f, "{idx} -> {right} [headlabel=\"False\"] ;")?;
                }
            }
        }
        writeln!(f, "}}")
    }
}

/// Threshold separating two adjacent distinct values `lo < hi`.
///
/// The midpoint, unless it rounds up to `hi`; then `lo` itself.
pub(crate) fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}

/// Training data validated and encoded for tree builders
pub(crate) struct Encoded {
    /// Column-major features: `columns[feature][sample]`
    pub(crate) columns: Vec<Vec<f64>>,
    /// Class index per sample
    pub(crate) targets: Vec<usize>,
    /// Distinct labels, ascending
    pub(crate) classes: Vec<Label>,
}

impl Encoded {
    pub(crate) fn n_samples(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Validate a fit call and convert it to column-major, class-indexed form.
pub(crate) fn encode_training(
    method: &str,
    max_depth: usize,
    features: &[Vec<f64>],
    labels: &[Label],
) -> Result<Encoded> {
    let fit_err = |reason: String| Error::FitFailed {
        method: method.to_string(),
        reason,
    };

    if max_depth == 0 {
        return Err(Error::InvalidDepth(max_depth));
    }
    if features.len() != labels.len() {
        return Err(fit_err(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if features.is_empty() {
        return Err(fit_err("training set is empty".to_string()));
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(fit_err("training set has no feature columns".to_string()));
    }
    for (i, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(fit_err(format!(
                "row {i} has {} features, expected {n_features}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(fit_err(format!("row {i} contains a non-finite value")));
        }
    }

    let index: BTreeMap<Label, usize> = labels
        .iter()
        .copied()
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, label)| (label, i))
        .collect();
    let classes = index.keys().copied().collect();
    let targets = labels.iter().map(|l| index[l]).collect();
    let columns = (0..n_features)
        .map(|f| features.iter().map(|row| row[f]).collect())
        .collect();

    Ok(Encoded {
        columns,
        targets,
        classes,
    })
}

/// Majority class of a count vector; ties go to the lowest class index.
pub(crate) fn majority(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (class, &count)| {
            if count > best.1 {
                (class, count)
            } else {
                best
            }
        })
        .0
}

/// Class histogram of the samples at `indices`
pub(crate) fn class_counts(targets: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &i in indices {
        counts[targets[i]] += 1;
    }
    counts
}
