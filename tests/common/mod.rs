#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use quantfolio::domain::bar::Bar;
use quantfolio::domain::panel::PricePanel;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One bar per close, on consecutive calendar days from `start`.
pub fn series(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: symbol.to_string(),
            date: start + Days::new(i as u64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000,
        })
        .collect()
}

pub fn panel_of(series_list: Vec<Vec<Bar>>) -> PricePanel {
    PricePanel::from_bars(series_list.into_iter().flatten().collect()).unwrap()
}

/// Linearly interpolated closes from `first` to `last` over `n` days.
pub fn linear_closes(first: f64, last: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            if n <= 1 {
                first
            } else {
                first + (last - first) * i as f64 / (n - 1) as f64
            }
        })
        .collect()
}

/// Writes a `<symbol>.csv` data file into `dir` in the import layout.
pub fn write_symbol_csv(dir: &std::path::Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.date.format("%Y-%m-%d"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}
