//! Writes simulation results as CSV files into an output directory.

use std::fs;
use std::path::Path;

use crate::domain::error::QuantfolioError;
use crate::domain::ledger::TradeSide;
use crate::domain::scheduler::SimulationResult;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

fn csv_error(e: csv::Error) -> QuantfolioError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => QuantfolioError::Io(io),
        other => QuantfolioError::Io(std::io::Error::other(format!("csv write: {other:?}"))),
    }
}

impl CsvReportAdapter {
    fn write_equity_curve(
        &self,
        result: &SimulationResult,
        path: &Path,
    ) -> Result<(), QuantfolioError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(["date", "nav", "cash", "positions"])
            .map_err(csv_error)?;

        for point in result.equity_curve.iter() {
            writer
                .write_record([
                    point.date.format("%Y-%m-%d").to_string(),
                    format!("{:.2}", point.nav),
                    format!("{:.2}", point.cash),
                    point.holdings.len().to_string(),
                ])
                .map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_trades(&self, result: &SimulationResult, path: &Path) -> Result<(), QuantfolioError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record(["date", "symbol", "side", "shares", "price", "commission"])
            .map_err(csv_error)?;

        for record in &result.rebalances {
            for trade in &record.outcome.trades {
                let side = match trade.side {
                    TradeSide::Buy => "buy",
                    TradeSide::Sell => "sell",
                };
                writer
                    .write_record([
                        record.date.format("%Y-%m-%d").to_string(),
                        trade.symbol.clone(),
                        side.to_string(),
                        format!("{:.6}", trade.shares),
                        format!("{:.4}", trade.price),
                        format!("{:.4}", trade.commission),
                    ])
                    .map_err(csv_error)?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &SimulationResult, output_dir: &Path) -> Result<(), QuantfolioError> {
        fs::create_dir_all(output_dir)?;
        self.write_equity_curve(result, &output_dir.join("equity_curve.csv"))?;
        self.write_trades(result, &output_dir.join("trades.csv"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equity::EquityCurve;
    use crate::domain::ledger::{ExecutedTrade, PortfolioState, RebalanceOutcome};
    use crate::domain::scheduler::RebalanceRecord;
    use crate::domain::selector::TargetAllocation;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample_result() -> SimulationResult {
        let mut curve = EquityCurve::new();
        curve.record(
            date(2),
            100_000.0,
            50_000.0,
            BTreeMap::from([("600519".to_string(), 500.0)]),
        );

        let outcome = RebalanceOutcome {
            trades: vec![ExecutedTrade {
                symbol: "600519".to_string(),
                side: TradeSide::Buy,
                shares: 500.0,
                price: 100.0,
                commission: 50.0,
            }],
            skipped: Vec::new(),
            commission_paid: 50.0,
            nav_before: 100_050.0,
            nav_after: 100_000.0,
        };

        SimulationResult {
            equity_curve: curve,
            rebalances: vec![RebalanceRecord {
                date: date(2),
                decision_date: Some(date(1)),
                prior_holdings: BTreeMap::new(),
                target: TargetAllocation::empty(),
                outcome,
            }],
            warnings: Vec::new(),
            final_state: PortfolioState::new(50_000.0),
            initial_cash: 100_050.0,
            total_return: -0.0005,
        }
    }

    #[test]
    fn writes_both_files_with_expected_rows() {
        let dir = tempfile::tempdir().unwrap();
        CsvReportAdapter
            .write(&sample_result(), dir.path())
            .unwrap();

        let equity = fs::read_to_string(dir.path().join("equity_curve.csv")).unwrap();
        assert!(equity.starts_with("date,nav,cash,positions"));
        assert!(equity.contains("2024-01-02,100000.00,50000.00,1"));

        let trades = fs::read_to_string(dir.path().join("trades.csv")).unwrap();
        assert!(trades.contains("2024-01-02,600519,buy,500.000000,100.0000,50.0000"));
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("run1");
        CsvReportAdapter.write(&sample_result(), &nested).unwrap();
        assert!(nested.join("equity_curve.csv").exists());
        assert!(nested.join("trades.csv").exists());
    }
}
