//! Performance statistics over a finished equity curve.
//!
//! Pure post-processing: nothing here feeds back into the simulation.

use super::equity::EquityCurve;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    /// Longest stretch, in calendar days, spent below a prior NAV peak.
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
}

impl Metrics {
    pub fn compute(curve: &EquityCurve, initial_cash: f64, risk_free_rate: f64) -> Self {
        let final_nav = curve.final_nav().unwrap_or(initial_cash);

        let total_return = if initial_cash > 0.0 {
            (final_nav - initial_cash) / initial_cash
        } else {
            0.0
        };

        let trading_days = curve.len() as f64;
        let years = trading_days / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(curve);
        let sharpe_ratio = compute_sharpe(curve, risk_free_rate / TRADING_DAYS_PER_YEAR);

        Metrics {
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
        }
    }
}

fn compute_drawdown(curve: &EquityCurve) -> (f64, i64) {
    let points = curve.points();
    if points.is_empty() {
        return (0.0, 0);
    }

    let mut peak = points[0].nav;
    let mut peak_date = points[0].date;
    let mut max_drawdown = 0.0_f64;
    let mut max_duration = 0_i64;

    for point in points {
        if point.nav >= peak {
            peak = point.nav;
            peak_date = point.date;
        } else if peak > 0.0 {
            let drawdown = (peak - point.nav) / peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
            let duration = (point.date - peak_date).num_days();
            if duration > max_duration {
                max_duration = duration;
            }
        }
    }

    (max_drawdown, max_duration)
}

fn compute_sharpe(curve: &EquityCurve, daily_risk_free: f64) -> f64 {
    let points = curve.points();
    if points.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = points
        .windows(2)
        .map(|pair| {
            if pair[0].nav > 0.0 {
                pair[1].nav / pair[0].nav - 1.0
            } else {
                0.0
            }
        })
        .collect();

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / returns.len() as f64;
    let stddev = variance.sqrt();

    if stddev == 0.0 {
        0.0
    } else {
        (mean - daily_risk_free) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn curve_from_navs(navs: &[f64]) -> EquityCurve {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut curve = EquityCurve::new();
        for (i, &nav) in navs.iter().enumerate() {
            curve.record(
                start + chrono::Days::new(i as u64),
                nav,
                nav,
                BTreeMap::new(),
            );
        }
        curve
    }

    #[test]
    fn total_return_basic() {
        let curve = curve_from_navs(&[100_000.0, 105_000.0, 110_000.0]);
        let metrics = Metrics::compute(&curve, 100_000.0, 0.0);
        assert_relative_eq!(metrics.total_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn empty_curve_is_flat() {
        let metrics = Metrics::compute(&EquityCurve::new(), 100_000.0, 0.05);
        assert_relative_eq!(metrics.total_return, 0.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.max_drawdown, 0.0, epsilon = 1e-12);
        assert_eq!(metrics.max_drawdown_duration, 0);
    }

    #[test]
    fn drawdown_from_peak() {
        let curve = curve_from_navs(&[100.0, 120.0, 90.0, 110.0]);
        let metrics = Metrics::compute(&curve, 100.0, 0.0);
        assert_relative_eq!(metrics.max_drawdown, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn drawdown_duration_counts_days_below_peak() {
        // peak on day 2, below peak through day 5
        let curve = curve_from_navs(&[100.0, 120.0, 90.0, 95.0, 100.0]);
        let metrics = Metrics::compute(&curve, 100.0, 0.0);
        assert_eq!(metrics.max_drawdown_duration, 3);
    }

    #[test]
    fn monotone_curve_has_zero_drawdown() {
        let curve = curve_from_navs(&[100.0, 101.0, 102.0, 103.0]);
        let metrics = Metrics::compute(&curve, 100.0, 0.0);
        assert_relative_eq!(metrics.max_drawdown, 0.0, epsilon = 1e-12);
        assert_eq!(metrics.max_drawdown_duration, 0);
    }

    #[test]
    fn flat_curve_has_zero_sharpe() {
        let curve = curve_from_navs(&[100.0, 100.0, 100.0]);
        let metrics = Metrics::compute(&curve, 100.0, 0.0);
        assert_relative_eq!(metrics.sharpe_ratio, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn steady_gain_has_positive_sharpe_and_annualized() {
        let navs: Vec<f64> = (0..100).map(|i| 100_000.0 * 1.001_f64.powi(i)).collect();
        let curve = curve_from_navs(&navs);
        let metrics = Metrics::compute(&curve, 100_000.0, 0.0);
        assert!(metrics.sharpe_ratio > 0.0);
        assert!(metrics.annualized_return > 0.0);
    }
}
