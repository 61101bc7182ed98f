//! PricePanel: aligned per-symbol daily bar series.
//!
//! The panel is materialized once per run by a data adapter and is immutable
//! afterwards; the simulation core performs no I/O against it. Per-symbol
//! dates are strictly increasing (duplicates are rejected at construction).

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::bar::Bar;

/// Which bar price trades execute at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    Open,
    Close,
}

impl PriceBasis {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "open" => Some(PriceBasis::Open),
            "close" => Some(PriceBasis::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PanelError {
    #[error("duplicate bar for {symbol} on {date}")]
    DuplicateDate { symbol: String, date: NaiveDate },

    #[error("bar symbol {actual} does not match series symbol {expected}")]
    SymbolMismatch { expected: String, actual: String },
}

/// A quote carried forward from an earlier session for valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleQuote {
    pub symbol: String,
    pub quote_date: NaiveDate,
    pub price: f64,
}

/// Per-symbol prices observable on a single day.
///
/// `quoted` holds symbols that actually traded that day at the requested
/// basis. Carry-forward lookups go back to the panel via [`PricePanel`].
#[derive(Debug, Clone)]
pub struct DayPrices {
    pub date: NaiveDate,
    quoted: BTreeMap<String, f64>,
}

impl DayPrices {
    pub fn quote(&self, symbol: &str) -> Option<f64> {
        self.quoted.get(symbol).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.quoted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quoted.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PricePanel {
    series: BTreeMap<String, Vec<Bar>>,
}

impl PricePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a panel from unordered bars. Sorts each symbol's series by date
    /// and rejects duplicate dates within a symbol.
    pub fn from_bars(bars: Vec<Bar>) -> Result<Self, PanelError> {
        let mut series: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            series.entry(bar.symbol.clone()).or_default().push(bar);
        }
        for (symbol, bars) in series.iter_mut() {
            bars.sort_by_key(|b| b.date);
            for pair in bars.windows(2) {
                if pair[0].date == pair[1].date {
                    return Err(PanelError::DuplicateDate {
                        symbol: symbol.clone(),
                        date: pair[0].date,
                    });
                }
            }
        }
        Ok(Self { series })
    }

    /// Insert one symbol's already-ordered series.
    pub fn insert_series(&mut self, symbol: String, bars: Vec<Bar>) -> Result<(), PanelError> {
        for bar in &bars {
            if bar.symbol != symbol {
                return Err(PanelError::SymbolMismatch {
                    expected: symbol,
                    actual: bar.symbol.clone(),
                });
            }
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(PanelError::DuplicateDate {
                    symbol,
                    date: pair[1].date,
                });
            }
        }
        self.series.insert(symbol, bars);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(|bars| bars.is_empty())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    pub fn bars(&self, symbol: &str) -> Option<&[Bar]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    /// Bars for `symbol` with date <= `as_of`. The factor engine only ever
    /// sees the panel through this truncation.
    pub fn bars_up_to(&self, symbol: &str, as_of: NaiveDate) -> &[Bar] {
        match self.series.get(symbol) {
            Some(bars) => {
                let end = bars.partition_point(|b| b.date <= as_of);
                &bars[..end]
            }
            None => &[],
        }
    }

    /// Union calendar of all symbols' bar dates within [start, end].
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let unique: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .filter(|d| *d >= start && *d <= end)
            .collect();
        unique.into_iter().collect()
    }

    /// Latest date across the whole panel strictly before `date`, if any.
    pub fn last_date_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|bars| {
                let end = bars.partition_point(|b| b.date < date);
                bars[..end].last().map(|b| b.date)
            })
            .max()
    }

    /// Exact same-day prices at the given basis for every symbol that traded
    /// on `date`.
    pub fn day_prices(&self, date: NaiveDate, basis: PriceBasis) -> DayPrices {
        let mut quoted = BTreeMap::new();
        for (symbol, bars) in &self.series {
            let idx = bars.partition_point(|b| b.date < date);
            if let Some(bar) = bars.get(idx) {
                if bar.date == date {
                    let price = match basis {
                        PriceBasis::Open => bar.open,
                        PriceBasis::Close => bar.close,
                    };
                    if price > 0.0 {
                        quoted.insert(symbol.clone(), price);
                    }
                }
            }
        }
        DayPrices { date, quoted }
    }

    /// Last close at or before `date`, with the date it was quoted.
    pub fn last_close_on_or_before(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Option<(NaiveDate, f64)> {
        let bars = self.series.get(symbol)?;
        let end = bars.partition_point(|b| b.date <= date);
        bars[..end].last().map(|b| (b.date, b.close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_bar(symbol: &str, day: u32, close: f64) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            date: date(2024, 1, day),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn from_bars_sorts_by_date() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 3, 102.0),
            make_bar("600519", 1, 100.0),
            make_bar("600519", 2, 101.0),
        ])
        .unwrap();

        let bars = panel.bars("600519").unwrap();
        assert_eq!(bars[0].date, date(2024, 1, 1));
        assert_eq!(bars[2].date, date(2024, 1, 3));
    }

    #[test]
    fn from_bars_rejects_duplicate_dates() {
        let result = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("600519", 1, 101.0),
        ]);
        assert!(matches!(result, Err(PanelError::DuplicateDate { .. })));
    }

    #[test]
    fn insert_series_rejects_symbol_mismatch() {
        let mut panel = PricePanel::new();
        let result = panel.insert_series("000001".into(), vec![make_bar("600519", 1, 100.0)]);
        assert!(matches!(result, Err(PanelError::SymbolMismatch { .. })));
    }

    #[test]
    fn trading_days_is_union_of_symbol_dates() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("600519", 3, 102.0),
            make_bar("000001", 2, 50.0),
            make_bar("000001", 3, 51.0),
        ])
        .unwrap();

        let days = panel.trading_days(date(2024, 1, 1), date(2024, 1, 31));
        assert_eq!(
            days,
            vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]
        );
    }

    #[test]
    fn trading_days_respects_range() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("600519", 2, 101.0),
            make_bar("600519", 3, 102.0),
        ])
        .unwrap();

        let days = panel.trading_days(date(2024, 1, 2), date(2024, 1, 2));
        assert_eq!(days, vec![date(2024, 1, 2)]);
    }

    #[test]
    fn bars_up_to_truncates() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("600519", 2, 101.0),
            make_bar("600519", 3, 102.0),
        ])
        .unwrap();

        let bars = panel.bars_up_to("600519", date(2024, 1, 2));
        assert_eq!(bars.len(), 2);
        assert_eq!(bars.last().unwrap().date, date(2024, 1, 2));
    }

    #[test]
    fn bars_up_to_unknown_symbol_is_empty() {
        let panel = PricePanel::new();
        assert!(panel.bars_up_to("600519", date(2024, 1, 2)).is_empty());
    }

    #[test]
    fn day_prices_close_basis() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 2, 101.0),
            make_bar("000001", 2, 50.0),
            make_bar("000002", 3, 10.0),
        ])
        .unwrap();

        let prices = panel.day_prices(date(2024, 1, 2), PriceBasis::Close);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.quote("600519"), Some(101.0));
        assert_eq!(prices.quote("000001"), Some(50.0));
        assert_eq!(prices.quote("000002"), None);
    }

    #[test]
    fn day_prices_open_basis() {
        let panel = PricePanel::from_bars(vec![make_bar("600519", 2, 101.0)]).unwrap();
        let prices = panel.day_prices(date(2024, 1, 2), PriceBasis::Open);
        assert_eq!(prices.quote("600519"), Some(100.0));
    }

    #[test]
    fn last_close_on_or_before_carries_forward() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("600519", 5, 104.0),
        ])
        .unwrap();

        assert_eq!(
            panel.last_close_on_or_before("600519", date(2024, 1, 3)),
            Some((date(2024, 1, 1), 100.0))
        );
        assert_eq!(
            panel.last_close_on_or_before("600519", date(2024, 1, 5)),
            Some((date(2024, 1, 5), 104.0))
        );
        assert_eq!(panel.last_close_on_or_before("000001", date(2024, 1, 5)), None);
    }

    #[test]
    fn last_date_before() {
        let panel = PricePanel::from_bars(vec![
            make_bar("600519", 1, 100.0),
            make_bar("000001", 4, 50.0),
        ])
        .unwrap();

        assert_eq!(panel.last_date_before(date(2024, 1, 5)), Some(date(2024, 1, 4)));
        assert_eq!(panel.last_date_before(date(2024, 1, 2)), Some(date(2024, 1, 1)));
        assert_eq!(panel.last_date_before(date(2024, 1, 1)), None);
    }

    #[test]
    fn price_basis_parse() {
        assert_eq!(PriceBasis::parse("close"), Some(PriceBasis::Close));
        assert_eq!(PriceBasis::parse("OPEN"), Some(PriceBasis::Open));
        assert_eq!(PriceBasis::parse("vwap"), None);
    }
}
