//! Portfolio ledger: cash plus per-symbol share counts, with valuation and
//! rebalancing that enforce the accounting invariants on every mutation.
//!
//! Invariants: cash never goes negative (buys are scaled down, never
//! overdrawn), and across a rebalance NAV changes only by the commission
//! paid. A breach of either is an engine bug and surfaces as
//! [`LedgerError::AccountingViolation`] rather than being carried forward.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::panel::{DayPrices, PriceBasis, PricePanel, StaleQuote};
use super::selector::TargetAllocation;

/// Relative tolerance for the NAV-conservation check.
const CONSERVATION_TOLERANCE: f64 = 1e-6;

/// Share quantities below this are treated as a closed position.
const SHARE_DUST: f64 = 1e-9;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("accounting violation on {date}: {detail}")]
    AccountingViolation { date: NaiveDate, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTrade {
    pub symbol: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
}

impl ExecutedTrade {
    pub fn notional(&self) -> f64 {
        self.shares * self.price
    }
}

/// A symbol that could not trade on the execution date. Recoverable: its
/// weight's cash simply stays uninvested (or the position stays held).
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub held: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub trades: Vec<ExecutedTrade>,
    pub skipped: Vec<SkippedSymbol>,
    pub commission_paid: f64,
    pub nav_before: f64,
    pub nav_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub nav: f64,
    /// Held symbols valued off a carried-forward quote.
    pub stale: Vec<StaleQuote>,
    /// Held symbols with no quote at all (contribute nothing to NAV).
    pub unpriced: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    cash: f64,
    holdings: BTreeMap<String, f64>,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        PortfolioState {
            cash: initial_cash,
            holdings: BTreeMap::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn shares(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.holdings
    }

    pub fn holdings_snapshot(&self) -> BTreeMap<String, f64> {
        self.holdings.clone()
    }

    pub fn position_count(&self) -> usize {
        self.holdings.len()
    }

    /// Mark-to-market at `date`. Symbols quoted that day use the same-day
    /// price at `basis`; everything else carries the last known close
    /// forward and is reported stale. Never fails: valuation is read-only.
    pub fn value(&self, panel: &PricePanel, date: NaiveDate, basis: PriceBasis) -> Valuation {
        let quotes = panel.day_prices(date, basis);
        self.value_at(panel, &quotes)
    }

    fn value_at(&self, panel: &PricePanel, quotes: &DayPrices) -> Valuation {
        let mut nav = self.cash;
        let mut stale = Vec::new();
        let mut unpriced = Vec::new();

        for (symbol, &shares) in &self.holdings {
            if let Some(price) = quotes.quote(symbol) {
                nav += shares * price;
            } else if let Some((quote_date, price)) =
                panel.last_close_on_or_before(symbol, quotes.date)
            {
                nav += shares * price;
                stale.push(StaleQuote {
                    symbol: symbol.clone(),
                    quote_date,
                    price,
                });
            } else {
                unpriced.push(symbol.clone());
            }
        }

        Valuation {
            nav,
            stale,
            unpriced,
        }
    }

    /// Rebalance holdings toward `target` at `date`'s execution prices.
    ///
    /// Liquidates everything outside the target first, then sizes each
    /// target position off its weight of the post-liquidation NAV. Buys are
    /// capped so commission-inclusive cost never exceeds available cash.
    /// Trades whose notional falls inside the commission drift band are
    /// suppressed, so re-targeting an unchanged allocation at unchanged
    /// prices trades nothing.
    pub fn rebalance_to(
        &mut self,
        target: &TargetAllocation,
        panel: &PricePanel,
        date: NaiveDate,
        basis: PriceBasis,
        commission_rate: f64,
        whole_shares: bool,
    ) -> Result<RebalanceOutcome, LedgerError> {
        let quotes = panel.day_prices(date, basis);
        let nav_before = self.value_at(panel, &quotes).nav;

        let mut trades = Vec::new();
        let mut skipped = Vec::new();
        let mut commission_paid = 0.0;

        // Liquidate holdings that fell out of the target.
        let held: Vec<String> = self.holdings.keys().cloned().collect();
        for symbol in held {
            if target.contains(&symbol) {
                continue;
            }
            let Some(price) = quotes.quote(&symbol) else {
                // Untradeable today; keep the position and report the gap.
                skipped.push(SkippedSymbol {
                    symbol,
                    held: true,
                });
                continue;
            };
            let shares = self.holdings.remove(&symbol).unwrap_or(0.0);
            let gross = shares * price;
            let fee = gross * commission_rate;
            self.cash += gross - fee;
            commission_paid += fee;
            trades.push(ExecutedTrade {
                symbol,
                side: TradeSide::Sell,
                shares,
                price,
                commission: fee,
            });
        }

        // Target values come off the post-liquidation NAV.
        let nav_base = self.value_at(panel, &quotes).nav;
        let deadband = nav_base * commission_rate + nav_base.abs().max(1.0) * 1e-9;

        for entry in &target.entries {
            let Some(price) = quotes.quote(&entry.symbol) else {
                skipped.push(SkippedSymbol {
                    symbol: entry.symbol.clone(),
                    held: self.holdings.contains_key(&entry.symbol),
                });
                continue;
            };

            let current = self.shares(&entry.symbol);
            let delta_value = entry.weight * nav_base - current * price;
            if delta_value.abs() <= deadband {
                continue;
            }

            if delta_value > 0.0 {
                let affordable = self.cash / (price * (1.0 + commission_rate));
                let mut buy_shares = (delta_value / price).min(affordable);
                if whole_shares {
                    buy_shares = buy_shares.floor();
                }
                if buy_shares <= SHARE_DUST {
                    continue;
                }
                let gross = buy_shares * price;
                let fee = gross * commission_rate;
                self.cash -= gross + fee;
                *self.holdings.entry(entry.symbol.clone()).or_insert(0.0) += buy_shares;
                commission_paid += fee;
                trades.push(ExecutedTrade {
                    symbol: entry.symbol.clone(),
                    side: TradeSide::Buy,
                    shares: buy_shares,
                    price,
                    commission: fee,
                });
            } else {
                let mut sell_shares = (-delta_value / price).min(current);
                if whole_shares {
                    sell_shares = sell_shares.floor();
                }
                if sell_shares <= SHARE_DUST {
                    continue;
                }
                let gross = sell_shares * price;
                let fee = gross * commission_rate;
                self.cash += gross - fee;
                commission_paid += fee;
                let remaining = current - sell_shares;
                if remaining <= SHARE_DUST {
                    self.holdings.remove(&entry.symbol);
                } else {
                    self.holdings.insert(entry.symbol.clone(), remaining);
                }
                trades.push(ExecutedTrade {
                    symbol: entry.symbol.clone(),
                    side: TradeSide::Sell,
                    shares: sell_shares,
                    price,
                    commission: fee,
                });
            }
        }

        // Float residue from capped buys can leave cash a hair under zero.
        let cash_floor = -CONSERVATION_TOLERANCE * nav_before.abs().max(1.0);
        if self.cash < cash_floor {
            return Err(LedgerError::AccountingViolation {
                date,
                detail: format!("negative cash balance {:.6} after rebalance", self.cash),
            });
        }
        if self.cash < 0.0 {
            self.cash = 0.0;
        }

        let nav_after = self.value_at(panel, &quotes).nav;
        let leakage = nav_before - commission_paid - nav_after;
        if leakage.abs() > CONSERVATION_TOLERANCE * nav_before.abs().max(1.0) {
            return Err(LedgerError::AccountingViolation {
                date,
                detail: format!(
                    "NAV leakage {:.6} beyond commission {:.6}",
                    leakage, commission_paid
                ),
            });
        }

        Ok(RebalanceOutcome {
            trades,
            skipped,
            commission_paid,
            nav_before,
            nav_after,
        })
    }
}
