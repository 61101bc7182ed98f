//! Factor engine: momentum and volatility signals combined into one
//! cross-sectional composite score.
//!
//! All computation runs over the panel truncated at `as_of`; bars dated after
//! `as_of` are unreachable from here, which is what keeps the model free of
//! look-ahead bias.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::panel::PricePanel;

#[derive(Debug, Clone, PartialEq)]
pub struct FactorParams {
    pub momentum_lookback: usize,
    pub volatility_lookback: usize,
    pub momentum_weight: f64,
    pub volatility_weight: f64,
}

impl Default for FactorParams {
    fn default() -> Self {
        FactorParams {
            momentum_lookback: 20,
            volatility_lookback: 20,
            momentum_weight: 0.5,
            volatility_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorScore {
    pub symbol: String,
    /// Date of the last bar the score was computed from.
    pub date: NaiveDate,
    pub momentum: f64,
    pub volatility: f64,
    pub composite: f64,
}

/// Trailing close-over-close momentum: close[t] / close[t-n] - 1.
/// None without n+1 bars or with a non-positive reference close.
fn momentum(closes: &[f64], lookback: usize) -> Option<f64> {
    if closes.len() < lookback + 1 {
        return None;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - lookback];
    if base <= 0.0 {
        return None;
    }
    Some(last / base - 1.0)
}

/// Sample standard deviation of the trailing n daily log returns.
/// None without n+1 bars; n must be at least 2 for a defined deviation.
fn log_return_volatility(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback < 2 || closes.len() < lookback + 1 {
        return None;
    }
    let window = &closes[closes.len() - 1 - lookback..];
    let mut returns = Vec::with_capacity(lookback);
    for pair in window.windows(2) {
        if pair[0] <= 0.0 || pair[1] <= 0.0 {
            return None;
        }
        returns.push((pair[1] / pair[0]).ln());
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (returns.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Cross-sectional rank normalization into [0,1], ascending, with tied
/// values receiving their averaged rank. Fewer than 2 entries degrades to a
/// constant 0.5 for everything rather than dividing by zero.
fn rank_normalize(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let n = values.len();
    if n < 2 {
        return values.keys().map(|s| (s.clone(), 0.5)).collect();
    }

    let mut sorted: Vec<(&String, f64)> = values.iter().map(|(s, v)| (s, *v)).collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut ranks = BTreeMap::new();
    let denom = (n - 1) as f64;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && sorted[j + 1].1 == sorted[i].1 {
            j += 1;
        }
        let averaged = (i + j) as f64 / 2.0 / denom;
        for entry in &sorted[i..=j] {
            ranks.insert(entry.0.clone(), averaged);
        }
        i = j + 1;
    }
    ranks
}

/// Compute per-symbol factor scores as of a date.
///
/// Symbols with insufficient history (or non-finite raw signals) are excluded
/// from the output entirely. Composite = w_m * momentum_rank
/// + w_v * (1 - volatility_rank): high momentum and low volatility both pull
/// the score toward 1.
pub fn compute_scores(
    panel: &PricePanel,
    as_of: NaiveDate,
    params: &FactorParams,
) -> BTreeMap<String, FactorScore> {
    let mut momentum_raw = BTreeMap::new();
    let mut volatility_raw = BTreeMap::new();
    let mut score_dates = BTreeMap::new();

    let symbols: Vec<String> = panel.symbols().map(str::to_string).collect();
    for symbol in &symbols {
        let bars = panel.bars_up_to(symbol, as_of);
        if bars.is_empty() {
            continue;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let (Some(m), Some(v)) = (
            momentum(&closes, params.momentum_lookback),
            log_return_volatility(&closes, params.volatility_lookback),
        ) else {
            continue;
        };
        if !m.is_finite() || !v.is_finite() {
            continue;
        }
        momentum_raw.insert(symbol.clone(), m);
        volatility_raw.insert(symbol.clone(), v);
        score_dates.insert(symbol.clone(), bars[bars.len() - 1].date);
    }

    let momentum_ranks = rank_normalize(&momentum_raw);
    let volatility_ranks = rank_normalize(&volatility_raw);

    momentum_raw
        .iter()
        .map(|(symbol, &m)| {
            let v = volatility_raw[symbol];
            let composite = params.momentum_weight * momentum_ranks[symbol]
                + params.volatility_weight * (1.0 - volatility_ranks[symbol]);
            (
                symbol.clone(),
                FactorScore {
                    symbol: symbol.clone(),
                    date: score_dates[symbol],
                    momentum: m,
                    volatility: v,
                    composite,
                },
            )
        })
        .collect()
}
