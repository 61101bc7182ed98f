//! Quantfolio is a local quantitative research toolkit: it stores daily
//! OHLCV bars, scores symbols with a momentum and volatility factor model,
//! and backtests periodically rebalanced top-N portfolios against them.
//!
//! The crate is split hexagonally. `domain` holds the pure simulation and
//! factor logic, `ports` the trait seams, and `adapters` the SQLite, CSV,
//! and INI implementations behind them.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
