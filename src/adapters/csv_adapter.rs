//! CSV file data adapter: one `<symbol>.csv` per symbol with
//! `date,open,high,low,close,volume` rows.

use crate::domain::bar::Bar;
use crate::domain::error::QuantfolioError;
use crate::domain::panel::PricePanel;
use crate::ports::data_port::PanelPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<&'a str, QuantfolioError> {
    record.get(index).ok_or_else(|| QuantfolioError::Database {
        reason: format!("missing {name} column"),
    })
}

/// Parse one symbol's bars from a CSV file, sorted by date.
pub fn read_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, QuantfolioError> {
    let content = fs::read_to_string(path).map_err(|e| QuantfolioError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| QuantfolioError::Database {
            reason: format!("CSV parse error in {}: {}", path.display(), e),
        })?;

        let date = NaiveDate::parse_from_str(field(&record, 0, "date")?, "%Y-%m-%d").map_err(
            |e| QuantfolioError::Database {
                reason: format!("invalid date in {}: {}", path.display(), e),
            },
        )?;

        let numeric = |index: usize, name: &str| -> Result<f64, QuantfolioError> {
            field(&record, index, name)?
                .parse()
                .map_err(|e| QuantfolioError::Database {
                    reason: format!("invalid {name} value in {}: {}", path.display(), e),
                })
        };

        let open = numeric(1, "open")?;
        let high = numeric(2, "high")?;
        let low = numeric(3, "low")?;
        let close = numeric(4, "close")?;
        let volume: i64 =
            field(&record, 5, "volume")?
                .parse()
                .map_err(|e| QuantfolioError::Database {
                    reason: format!("invalid volume value in {}: {}", path.display(), e),
                })?;

        bars.push(Bar {
            symbol: symbol.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl PanelPort for CsvAdapter {
    fn get_panel(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PricePanel, QuantfolioError> {
        let mut panel = PricePanel::new();
        for symbol in symbols {
            let path = self.csv_path(symbol);
            if !path.exists() {
                return Err(QuantfolioError::NoData {
                    symbol: symbol.clone(),
                });
            }
            // read_bars sorts by date; duplicate dates in a file then sit
            // adjacent and are rejected by the series insert.
            let bars: Vec<Bar> = read_bars(&path, symbol)?
                .into_iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .collect();
            if !bars.is_empty() {
                panel.insert_series(symbol.clone(), bars)?;
            }
        }
        Ok(panel)
    }

    fn list_symbols(&self) -> Result<Vec<String>, QuantfolioError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantfolioError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuantfolioError::Database {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                symbols.push(stem.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantfolioError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let bars = read_bars(&path, symbol)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";
        fs::write(path.join("600519.csv"), csv_content).unwrap();
        fs::write(
            path.join("000001.csv"),
            "date,open,high,low,close,volume\n2024-01-15,50.0,51.0,49.0,50.5,30000\n",
        )
        .unwrap();

        (dir, path)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn get_panel_loads_and_sorts() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let panel = adapter
            .get_panel(
                &["600519".to_string(), "000001".to_string()],
                date(1),
                date(31),
            )
            .unwrap();

        let bars = panel.bars("600519").unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(15));
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[2].date, date(17));
        assert_eq!(panel.bars("000001").unwrap().len(), 1);
    }

    #[test]
    fn get_panel_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let panel = adapter
            .get_panel(&["600519".to_string()], date(16), date(16))
            .unwrap();
        assert_eq!(panel.bars("600519").unwrap().len(), 1);
    }

    #[test]
    fn get_panel_missing_symbol_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.get_panel(&["999999".to_string()], date(1), date(31));
        assert!(matches!(result, Err(QuantfolioError::NoData { symbol }) if symbol == "999999"));
    }

    #[test]
    fn list_symbols_sorted() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["000001", "600519"]);
    }

    #[test]
    fn data_range_reports_span_and_count() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let range = adapter.get_data_range("600519").unwrap();
        assert_eq!(range, Some((date(15), date(17), 3)));
        assert_eq!(adapter.get_data_range("999999").unwrap(), None);
    }

    #[test]
    fn duplicate_dates_in_a_file_are_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("600519.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             2024-01-15,101.0,111.0,91.0,106.0,51000\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let result = adapter.get_panel(&["600519".to_string()], date(1), date(31));
        assert!(matches!(result, Err(QuantfolioError::Panel(_))));
    }

    #[test]
    fn malformed_row_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("600519.csv"),
            "date,open,high,low,close,volume\nnot-a-date,1,2,3,4,5\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter
            .get_panel(&["600519".to_string()], date(1), date(31))
            .is_err());
    }
}
