//! Absorbed fixed effects
//!
//! Grouping variables are never expanded into dummy columns. Instead every
//! numeric variable is demeaned within groups ([`Demeaner`]), and the level
//! effects are recovered afterwards from the residual of the slope fit
//! ([`recover_group_effects`]) when a caller needs them for prediction.

use std::collections::{BTreeMap, HashSet};

use ndarray::ArrayView1;
use pd_core::data::DataFrame;

use crate::base::Result;

pub mod demean;
pub mod recover;


pub use demean::{DemeanConfig, Demeaned, Demeaner};
pub use recover::{GroupEffects, LevelMeans, TrainingMeans, recover_group_effects};

/// Row-to-level map of one grouping variable
///
/// Levels are kept in sorted label order so that codes, effect maps and
/// summaries are deterministic across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupIndex {
    variable: String,
    levels: Vec<String>,
    codes: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl GroupIndex {
    /// Build from per-row level labels
    pub fn from_labels(variable: &str, labels: &[String]) -> Self {
        let mut lookup: BTreeMap<&str, usize> = BTreeMap::new();
        for label in labels {
            lookup.entry(label.as_str()).or_insert(0);
        }
        for (code, slot) in lookup.values_mut().enumerate() {
            *slot = code;
        }

        let levels: Vec<String> = lookup.keys().map(|s| s.to_string()).collect();
        let mut members = vec![Vec::new(); levels.len()];
        let codes: Vec<usize> = labels
            .iter()
            .enumerate()
            .map(|(row, label)| {
                let code = lookup[label.as_str()];
                members[code].push(row);
                code
            })
            .collect();

        Self {
            variable: variable.to_string(),
            levels,
            codes,
            members,
        }
    }

    /// Build from a key column of `df`
    pub fn from_frame(df: &DataFrame, variable: &str) -> Result<Self> {
        let labels = df.column(variable)?.level_labels()?;
        Ok(Self::from_labels(variable, &labels))
    }

    /// Grouping variable name
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Level labels, sorted
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn n_obs(&self) -> usize {
        self.codes.len()
    }

    /// Level code of every row
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Rows belonging to each level
    pub fn members(&self) -> &[Vec<usize>] {
        &self.members
    }

    /// Level label of `row`
    pub fn level_of(&self, row: usize) -> &str {
        &self.levels[self.codes[row]]
    }

    /// Mean of `values` within each level
    pub fn group_means(&self, values: ArrayView1<f64>) -> Vec<f64> {
        self.members
            .iter()
            .map(|rows| {
                let sum: f64 = rows.iter().map(|&i| values[i]).sum();
                sum / rows.len() as f64
            })
            .collect()
    }
}

/// Degrees of freedom consumed by the absorbed effects, grand mean included
///
/// - no grouping: 1 (the grand mean)
/// - one-way: number of levels
/// - two-way: levels₁ + levels₂ − connected components of the bipartite
///   level graph
/// - k-way, k > 2: Σ levels − (k − 1), assuming a single component
pub fn absorbed_df(groups: &[GroupIndex]) -> usize {
    match groups {
        [] => 1,
        [one] => one.n_levels(),
        [a, b] => (a.n_levels() + b.n_levels()).saturating_sub(connected_components(a, b)),
        many => {
            let total: usize = many.iter().map(|g| g.n_levels()).sum();
            total.saturating_sub(many.len() - 1)
        }
    }
}

/// Rows that survive iterative removal of singleton groups
///
/// Dropping a singleton in one dimension can create a new singleton in
/// another, so passes repeat until nothing changes.
pub fn non_singleton_mask(groups: &[GroupIndex]) -> Vec<bool> {
    let n = groups.first().map_or(0, |g| g.n_obs());
    let mut keep = vec![true; n];

    loop {
        let mut changed = false;
        for group in groups {
            let mut counts = vec![0usize; group.n_levels()];
            for (row, &code) in group.codes().iter().enumerate() {
                if keep[row] {
                    counts[code] += 1;
                }
            }
            for (row, &code) in group.codes().iter().enumerate() {
                if keep[row] && counts[code] == 1 {
                    keep[row] = false;
                    changed = true;
                }
            }
        }
        if !changed {
            return keep;
        }
    }
}

fn connected_components(a: &GroupIndex, b: &GroupIndex) -> usize {
    let offset = a.n_levels();
    let total = offset + b.n_levels();
    let mut parent: Vec<usize> = (0..total).collect();
    let mut rank = vec![0u8; total];

    for (&ca, &cb) in a.codes().iter().zip(b.codes()) {
        union(&mut parent, &mut rank, ca, offset + cb);
    }

    // Every level has at least one row, so every node is in use.
    let mut roots = HashSet::new();
    for node in 0..total {
        roots.insert(find(&mut parent, node));
    }
    roots.len()
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn union(parent: &mut [usize], rank: &mut [u8], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra == rb {
        return;
    }
    match rank[ra].cmp(&rank[rb]) {
        std::cmp::Ordering::Less => parent[ra] = rb,
        std::cmp::Ordering::Greater => parent[rb] = ra,
        std::cmp::Ordering::Equal => {
            parent[rb] = ra;
            rank[ra] += 1;
        }
    }
}
