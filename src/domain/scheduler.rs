//! Rebalance scheduler: the simulation loop.
//!
//! Drives one pass over the panel's trading days in order. Day 0 and every
//! `rebalance_interval` trading days thereafter are rebalance days; factor
//! scores for a rebalance are computed as of the last panel date strictly
//! before the execution date, so decisions never see same-day data. Every
//! day, rebalance or not, the portfolio is marked to market and appended to
//! the equity curve.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::equity::EquityCurve;
use super::error::QuantfolioError;
use super::factor::{compute_scores, FactorParams};
use super::ledger::{PortfolioState, RebalanceOutcome};
use super::panel::{PriceBasis, PricePanel};
use super::selector::{select_top_n, TargetAllocation};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    pub commission_rate: f64,
    /// Trading days between rebalances; 20 is roughly monthly.
    pub rebalance_interval: usize,
    pub top_n: usize,
    pub factors: FactorParams,
    pub price_basis: PriceBasis,
    pub whole_shares: bool,
}

impl SimulationConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        SimulationConfig {
            start_date,
            end_date,
            initial_cash: 1_000_000.0,
            commission_rate: 0.001,
            rebalance_interval: 20,
            top_n: 5,
            factors: FactorParams::default(),
            price_basis: PriceBasis::Close,
            whole_shares: false,
        }
    }

    pub fn validate(&self) -> Result<(), QuantfolioError> {
        let invalid = |key: &str, reason: String| QuantfolioError::ConfigInvalid {
            section: "backtest".to_string(),
            key: key.to_string(),
            reason,
        };

        if self.start_date > self.end_date {
            return Err(invalid(
                "start_date",
                "start_date must not be after end_date".to_string(),
            ));
        }
        if self.initial_cash <= 0.0 {
            return Err(invalid(
                "initial_cash",
                "initial_cash must be positive".to_string(),
            ));
        }
        if !(0.0..=0.05).contains(&self.commission_rate) {
            return Err(invalid(
                "commission_rate",
                "commission_rate must be between 0 and 0.05".to_string(),
            ));
        }
        if self.rebalance_interval == 0 {
            return Err(invalid(
                "rebalance_interval",
                "rebalance_interval must be at least 1".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(invalid("top_n", "top_n must be at least 1".to_string()));
        }

        let factor_invalid = |key: &str, reason: String| QuantfolioError::ConfigInvalid {
            section: "factors".to_string(),
            key: key.to_string(),
            reason,
        };
        if self.factors.momentum_lookback < 2 {
            return Err(factor_invalid(
                "momentum_lookback",
                "momentum_lookback must be at least 2".to_string(),
            ));
        }
        if self.factors.volatility_lookback < 2 {
            return Err(factor_invalid(
                "volatility_lookback",
                "volatility_lookback must be at least 2".to_string(),
            ));
        }
        if self.factors.momentum_weight < 0.0 || self.factors.volatility_weight < 0.0 {
            return Err(factor_invalid(
                "momentum_weight",
                "factor weights must be non-negative".to_string(),
            ));
        }
        let weight_sum = self.factors.momentum_weight + self.factors.volatility_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(factor_invalid(
                "momentum_weight",
                format!("factor weights must sum to 1.0, got {weight_sum}"),
            ));
        }
        Ok(())
    }
}

/// Recoverable conditions observed during a run. These never abort the
/// simulation; callers decide whether and how to surface them.
#[derive(Debug, Clone, PartialEq)]
pub enum DataGapWarning {
    /// A held symbol had no same-day close; its last quote carried forward.
    StalePrice {
        date: NaiveDate,
        symbol: String,
        quote_date: NaiveDate,
    },
    /// A symbol could not trade on a rebalance day.
    UntradeableSymbol {
        date: NaiveDate,
        symbol: String,
        held: bool,
    },
    /// A held symbol had no quote history at all on a valuation day.
    UnpricedHolding { date: NaiveDate, symbol: String },
    /// A scheduled rebalance day had no usable execution prices.
    DeferredRebalance { date: NaiveDate },
}

impl std::fmt::Display for DataGapWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataGapWarning::StalePrice {
                date,
                symbol,
                quote_date,
            } => write!(f, "{date}: {symbol} valued at stale close from {quote_date}"),
            DataGapWarning::UntradeableSymbol { date, symbol, held } => {
                if *held {
                    write!(f, "{date}: could not sell {symbol}, no execution price")
                } else {
                    write!(f, "{date}: skipped buying {symbol}, no execution price")
                }
            }
            DataGapWarning::UnpricedHolding { date, symbol } => {
                write!(f, "{date}: held {symbol} has no price history")
            }
            DataGapWarning::DeferredRebalance { date } => {
                write!(f, "{date}: rebalance deferred, no execution prices")
            }
        }
    }
}

/// Audit record for one executed rebalance.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceRecord {
    pub date: NaiveDate,
    /// As-of date the factor scores were computed at; None when the panel
    /// holds no history before the execution date.
    pub decision_date: Option<NaiveDate>,
    pub prior_holdings: BTreeMap<String, f64>,
    pub target: TargetAllocation,
    pub outcome: RebalanceOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub equity_curve: EquityCurve,
    pub rebalances: Vec<RebalanceRecord>,
    pub warnings: Vec<DataGapWarning>,
    pub final_state: PortfolioState,
    pub initial_cash: f64,
    pub total_return: f64,
}

/// A fatal mid-run error together with everything recorded up to the last
/// good day. The partial curve is a valid prefix of the run.
#[derive(Debug, thiserror::Error)]
#[error("simulation aborted on {date}: {cause}")]
pub struct SimulationFailure {
    pub date: NaiveDate,
    #[source]
    pub cause: QuantfolioError,
    pub partial_curve: EquityCurve,
    pub partial_rebalances: Vec<RebalanceRecord>,
}

/// Run the full simulation over the panel's trading days in
/// [start_date, end_date].
///
/// The panel may (and for factor warm-up should) contain history before
/// `start_date`; those bars feed decisions but are never traded or recorded.
pub fn run_simulation(
    panel: &PricePanel,
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationFailure> {
    let preflight_failure = |cause: QuantfolioError| SimulationFailure {
        date: config.start_date,
        cause,
        partial_curve: EquityCurve::new(),
        partial_rebalances: Vec::new(),
    };

    config.validate().map_err(preflight_failure)?;

    let days = panel.trading_days(config.start_date, config.end_date);
    if days.is_empty() {
        return Err(preflight_failure(QuantfolioError::EmptyPanel {
            start: config.start_date,
            end: config.end_date,
        }));
    }

    let mut state = PortfolioState::new(config.initial_cash);
    let mut curve = EquityCurve::new();
    let mut rebalances: Vec<RebalanceRecord> = Vec::new();
    let mut warnings: Vec<DataGapWarning> = Vec::new();
    let mut rebalance_pending = false;

    for (i, &day) in days.iter().enumerate() {
        if i % config.rebalance_interval == 0 {
            rebalance_pending = true;
        }

        if rebalance_pending {
            let exec_prices = panel.day_prices(day, config.price_basis);
            if exec_prices.is_empty() {
                warnings.push(DataGapWarning::DeferredRebalance { date: day });
            } else {
                let decision_date = panel.last_date_before(day);
                let scores = decision_date
                    .map(|as_of| compute_scores(panel, as_of, &config.factors))
                    .unwrap_or_default();
                let target = select_top_n(&scores, config.top_n);
                let prior_holdings = state.holdings_snapshot();

                let outcome = state
                    .rebalance_to(
                        &target,
                        panel,
                        day,
                        config.price_basis,
                        config.commission_rate,
                        config.whole_shares,
                    )
                    .map_err(|e| SimulationFailure {
                        date: day,
                        cause: e.into(),
                        partial_curve: curve.clone(),
                        partial_rebalances: rebalances.clone(),
                    })?;

                for skip in &outcome.skipped {
                    warnings.push(DataGapWarning::UntradeableSymbol {
                        date: day,
                        symbol: skip.symbol.clone(),
                        held: skip.held,
                    });
                }
                rebalances.push(RebalanceRecord {
                    date: day,
                    decision_date,
                    prior_holdings,
                    target,
                    outcome,
                });
                rebalance_pending = false;
            }
        }

        // Daily mark-to-market, always at the close.
        let valuation = state.value(panel, day, PriceBasis::Close);
        for stale in &valuation.stale {
            warnings.push(DataGapWarning::StalePrice {
                date: day,
                symbol: stale.symbol.clone(),
                quote_date: stale.quote_date,
            });
        }
        for symbol in &valuation.unpriced {
            warnings.push(DataGapWarning::UnpricedHolding {
                date: day,
                symbol: symbol.clone(),
            });
        }
        curve.record(day, valuation.nav, state.cash(), state.holdings_snapshot());
    }

    let final_nav = curve.final_nav().unwrap_or(config.initial_cash);
    Ok(SimulationResult {
        equity_curve: curve,
        rebalances,
        warnings,
        final_state: state,
        initial_cash: config.initial_cash,
        total_return: final_nav / config.initial_cash - 1.0,
    })
}
