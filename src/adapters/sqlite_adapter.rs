//! SQLite data adapter over the `stock_daily` table.

use crate::domain::bar::Bar;
use crate::domain::error::QuantfolioError;
use crate::domain::panel::PricePanel;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PanelPort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> QuantfolioError {
    QuantfolioError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> QuantfolioError {
    QuantfolioError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantfolioError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| QuantfolioError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, QuantfolioError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), QuantfolioError> {
        let conn = self.pool.get().map_err(pool_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stock_daily (
                symbol TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, trade_date)
            );
            CREATE INDEX IF NOT EXISTS idx_stock_daily_symbol ON stock_daily(symbol);
            CREATE INDEX IF NOT EXISTS idx_stock_daily_date ON stock_daily(trade_date);",
        )
        .map_err(query_error)?;
        Ok(())
    }

    /// Upsert bars: re-imports overwrite rather than duplicate.
    pub fn insert_bars(&self, bars: &[Bar]) -> Result<(), QuantfolioError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO stock_daily
                     (symbol, trade_date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }
}

fn parse_row_date(raw: &str) -> Result<NaiveDate, QuantfolioError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| QuantfolioError::DatabaseQuery {
        reason: format!("invalid trade_date {raw}: {e}"),
    })
}

impl PanelPort for SqliteAdapter {
    fn get_panel(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PricePanel, QuantfolioError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT trade_date, open, high, low, close, volume
                 FROM stock_daily
                 WHERE symbol = ?1 AND trade_date >= ?2 AND trade_date <= ?3
                 ORDER BY trade_date ASC",
            )
            .map_err(query_error)?;

        let start_str = start_date.format(DATE_FORMAT).to_string();
        let end_str = end_date.format(DATE_FORMAT).to_string();

        // Rows arrive date-ordered per symbol, so each series can be
        // inserted directly without a re-sort.
        let mut panel = PricePanel::new();
        for symbol in symbols {
            let rows = stmt
                .query_map(params![symbol, start_str, end_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })
                .map_err(query_error)?;

            let mut bars = Vec::new();
            for row in rows {
                let (date_str, open, high, low, close, volume) = row.map_err(query_error)?;
                bars.push(Bar {
                    symbol: symbol.clone(),
                    date: parse_row_date(&date_str)?,
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
            }
            if !bars.is_empty() {
                panel.insert_series(symbol.clone(), bars)?;
            }
        }

        Ok(panel)
    }

    fn list_symbols(&self) -> Result<Vec<String>, QuantfolioError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM stock_daily ORDER BY symbol ASC")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, QuantfolioError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT MIN(trade_date), MAX(trade_date), COUNT(*)
                 FROM stock_daily WHERE symbol = ?1",
            )
            .map_err(query_error)?;

        let row = stmt
            .query_row(params![symbol], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(query_error)?;

        match row {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((
                parse_row_date(&min)?,
                parse_row_date(&max)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}
