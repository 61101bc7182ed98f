//! Panel data access port.

use crate::domain::error::QuantfolioError;
use crate::domain::panel::PricePanel;
use chrono::NaiveDate;

/// Supplies a fully-materialized, date-ordered price panel. Implementations
/// may fetch however they like (pooled connections, files); the simulation
/// core only ever sees the finished panel.
pub trait PanelPort {
    /// Bars for the given symbols within [start_date, end_date], sorted
    /// ascending per symbol, with gaps for non-trading days (no synthetic
    /// fill). Symbols with no data in range are simply absent.
    fn get_panel(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PricePanel, QuantfolioError>;

    fn list_symbols(&self) -> Result<Vec<String>, QuantfolioError>;

    /// (first date, last date, bar count) for a symbol, None if unknown.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantfolioError>;
}
