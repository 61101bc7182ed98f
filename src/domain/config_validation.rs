//! Builds and validates a [`SimulationConfig`] from configuration.
//!
//! Every field is checked before a run starts; any violation is a fatal
//! `ConfigInvalid`/`ConfigMissing` carrying the section and key.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::error::QuantfolioError;
use crate::domain::panel::PriceBasis;
use crate::domain::scheduler::SimulationConfig;
use crate::ports::config_port::ConfigPort;

/// Parse a comma-separated symbol list: trimmed, deduplicated, order kept.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, QuantfolioError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let symbol = token.trim().to_string();
        if symbol.is_empty() {
            return Err(QuantfolioError::ConfigInvalid {
                section: "data".to_string(),
                key: "symbols".to_string(),
                reason: "empty token in symbol list".to_string(),
            });
        }
        if !seen.insert(symbol.clone()) {
            return Err(QuantfolioError::ConfigInvalid {
                section: "data".to_string(),
                key: "symbols".to_string(),
                reason: format!("duplicate symbol: {symbol}"),
            });
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Symbols the run should load, from `[data] symbols`.
pub fn symbols_from(config: &dyn ConfigPort) -> Result<Vec<String>, QuantfolioError> {
    let raw = config
        .get_string("data", "symbols")
        .ok_or_else(|| QuantfolioError::ConfigMissing {
            section: "data".to_string(),
            key: "symbols".to_string(),
        })?;
    parse_symbols(&raw)
}

/// Read an integer key and bound it below before the usize conversion, so a
/// negative INI value can never wrap into a huge positive count.
fn bounded_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    minimum: i64,
) -> Result<usize, QuantfolioError> {
    let raw = config.get_int(section, key, default as i64);
    if raw < minimum {
        return Err(QuantfolioError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("must be at least {minimum}, got {raw}"),
        });
    }
    usize::try_from(raw).map_err(|_| QuantfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("out of range: {raw}"),
    })
}

fn parse_date(value: Option<&str>, key: &str) -> Result<NaiveDate, QuantfolioError> {
    let raw = value.ok_or_else(|| QuantfolioError::ConfigMissing {
        section: "backtest".to_string(),
        key: key.to_string(),
    })?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| QuantfolioError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: format!("expected YYYY-MM-DD: {e}"),
    })
}

/// Assemble the full simulation configuration and validate it.
pub fn simulation_config_from(config: &dyn ConfigPort) -> Result<SimulationConfig, QuantfolioError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");
    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    let mut sim = SimulationConfig::new(start_date, end_date);
    sim.initial_cash = config.get_double("backtest", "initial_cash", sim.initial_cash);
    sim.commission_rate = config.get_double("backtest", "commission_rate", sim.commission_rate);
    sim.rebalance_interval = bounded_usize(
        config,
        "backtest",
        "rebalance_interval",
        sim.rebalance_interval,
        1,
    )?;
    sim.top_n = bounded_usize(config, "backtest", "top_n", sim.top_n, 1)?;
    sim.whole_shares = config.get_bool("backtest", "whole_shares", sim.whole_shares);

    if let Some(basis) = config.get_string("backtest", "price_basis") {
        sim.price_basis =
            PriceBasis::parse(&basis).ok_or_else(|| QuantfolioError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "price_basis".to_string(),
                reason: format!("expected open or close, got {basis}"),
            })?;
    }

    sim.factors.momentum_lookback = bounded_usize(
        config,
        "factors",
        "momentum_lookback",
        sim.factors.momentum_lookback,
        2,
    )?;
    sim.factors.volatility_lookback = bounded_usize(
        config,
        "factors",
        "volatility_lookback",
        sim.factors.volatility_lookback,
        2,
    )?;
    sim.factors.momentum_weight =
        config.get_double("factors", "momentum_weight", sim.factors.momentum_weight);
    sim.factors.volatility_weight = config.get_double(
        "factors",
        "volatility_weight",
        sim.factors.volatility_weight,
    );

    sim.validate()?;
    Ok(sim)
}

/// `[backtest] risk_free_rate`, validated into [0, 1).
pub fn risk_free_rate_from(config: &dyn ConfigPort) -> Result<f64, QuantfolioError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(QuantfolioError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::panel::PriceBasis;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const MINIMAL: &str = "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n";

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("600519, 000001,000858").unwrap();
        assert_eq!(result, vec!["600519", "000001", "000858"]);
    }

    #[test]
    fn parse_symbols_rejects_empty_token() {
        assert!(parse_symbols("600519,,000001").is_err());
    }

    #[test]
    fn parse_symbols_rejects_duplicate() {
        let err = parse_symbols("600519,000001,600519").unwrap_err();
        assert!(err.to_string().contains("600519"));
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let sim = simulation_config_from(&adapter(MINIMAL)).unwrap();
        assert_eq!(sim.rebalance_interval, 20);
        assert_eq!(sim.top_n, 5);
        assert_eq!(sim.price_basis, PriceBasis::Close);
        assert!(!sim.whole_shares);
        assert!((sim.initial_cash - 1_000_000.0).abs() < f64::EPSILON);
        assert!((sim.factors.momentum_weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_dates_are_fatal() {
        let result = simulation_config_from(&adapter("[backtest]\n"));
        assert!(matches!(
            result,
            Err(QuantfolioError::ConfigMissing { key, .. }) if key == "start_date"
        ));
    }

    #[test]
    fn malformed_date_is_fatal() {
        let content = "[backtest]\nstart_date = 01/02/2023\nend_date = 2023-12-31\n";
        let result = simulation_config_from(&adapter(content));
        assert!(matches!(
            result,
            Err(QuantfolioError::ConfigInvalid { key, .. }) if key == "start_date"
        ));
    }

    #[test]
    fn overrides_applied() {
        let content = "[backtest]\n\
            start_date = 2023-01-01\n\
            end_date = 2023-12-31\n\
            initial_cash = 500000\n\
            commission_rate = 0.002\n\
            rebalance_interval = 10\n\
            top_n = 3\n\
            price_basis = open\n\
            whole_shares = yes\n\
            [factors]\n\
            momentum_lookback = 30\n\
            volatility_lookback = 15\n\
            momentum_weight = 0.7\n\
            volatility_weight = 0.3\n";
        let sim = simulation_config_from(&adapter(content)).unwrap();

        assert!((sim.initial_cash - 500_000.0).abs() < f64::EPSILON);
        assert!((sim.commission_rate - 0.002).abs() < f64::EPSILON);
        assert_eq!(sim.rebalance_interval, 10);
        assert_eq!(sim.top_n, 3);
        assert_eq!(sim.price_basis, PriceBasis::Open);
        assert!(sim.whole_shares);
        assert_eq!(sim.factors.momentum_lookback, 30);
        assert_eq!(sim.factors.volatility_lookback, 15);
        assert!((sim.factors.momentum_weight - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_top_n_is_rejected() {
        let content = format!("{MINIMAL}top_n = -3\n");
        assert!(matches!(
            simulation_config_from(&adapter(&content)),
            Err(QuantfolioError::ConfigInvalid { key, .. }) if key == "top_n"
        ));
    }

    #[test]
    fn negative_rebalance_interval_is_rejected() {
        let content = format!("{MINIMAL}rebalance_interval = -5\n");
        assert!(matches!(
            simulation_config_from(&adapter(&content)),
            Err(QuantfolioError::ConfigInvalid { key, .. }) if key == "rebalance_interval"
        ));
    }

    #[test]
    fn negative_lookbacks_are_rejected() {
        for key in ["momentum_lookback", "volatility_lookback"] {
            let content = format!("{MINIMAL}[factors]\n{key} = -20\n");
            assert!(matches!(
                simulation_config_from(&adapter(&content)),
                Err(QuantfolioError::ConfigInvalid { section, key: k, .. })
                    if section == "factors" && k == key
            ));
        }
    }

    #[test]
    fn lookback_below_two_is_rejected_before_the_run() {
        let content = format!("{MINIMAL}[factors]\nmomentum_lookback = 1\n");
        assert!(matches!(
            simulation_config_from(&adapter(&content)),
            Err(QuantfolioError::ConfigInvalid { key, .. }) if key == "momentum_lookback"
        ));
    }

    #[test]
    fn bad_price_basis_is_fatal() {
        let content = "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\nprice_basis = vwap\n";
        assert!(matches!(
            simulation_config_from(&adapter(content)),
            Err(QuantfolioError::ConfigInvalid { key, .. }) if key == "price_basis"
        ));
    }

    #[test]
    fn invalid_weights_rejected_by_validation() {
        let content = "[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n\
            [factors]\nmomentum_weight = 0.9\nvolatility_weight = 0.9\n";
        assert!(simulation_config_from(&adapter(content)).is_err());
    }

    #[test]
    fn symbols_from_config() {
        let content = "[data]\nsymbols = 600519,000001\n";
        let symbols = symbols_from(&adapter(content)).unwrap();
        assert_eq!(symbols, vec!["600519", "000001"]);
    }

    #[test]
    fn symbols_missing_is_fatal() {
        assert!(matches!(
            symbols_from(&adapter("[data]\n")),
            Err(QuantfolioError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn risk_free_rate_default_and_bounds() {
        assert!((risk_free_rate_from(&adapter(MINIMAL)).unwrap() - 0.0).abs() < f64::EPSILON);
        let bad = "[backtest]\nrisk_free_rate = 1.5\n";
        assert!(risk_free_rate_from(&adapter(bad)).is_err());
    }
}
