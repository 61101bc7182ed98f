//! Top-N selection of ranked symbols into an equal-weight target allocation.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::factor::FactorScore;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetWeight {
    pub symbol: String,
    pub weight: f64,
}

/// Ordered basket chosen on a rebalance date. Weights sum to at most 1.0;
/// empty when nothing qualified (the scheduler then holds cash).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetAllocation {
    pub entries: Vec<TargetWeight>,
}

impl TargetAllocation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.iter().any(|e| e.symbol == symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }
}

/// Sort by composite score descending, ties broken by symbol ascending so
/// repeated runs over identical scores always pick the same basket. Takes at
/// most `n` symbols at equal weight.
pub fn select_top_n(scores: &BTreeMap<String, FactorScore>, n: usize) -> TargetAllocation {
    if n == 0 || scores.is_empty() {
        return TargetAllocation::empty();
    }

    let mut ranked: Vec<&FactorScore> = scores.values().collect();
    ranked.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    ranked.truncate(n);

    let weight = 1.0 / ranked.len() as f64;
    TargetAllocation {
        entries: ranked
            .into_iter()
            .map(|score| TargetWeight {
                symbol: score.symbol.clone(),
                weight,
            })
            .collect(),
    }
}
