//! Append-only equity curve: one record per simulated trading day.

use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub nav: f64,
    pub cash: f64,
    /// Shares held per symbol at the close of this day.
    pub holdings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        date: NaiveDate,
        nav: f64,
        cash: f64,
        holdings: BTreeMap<String, f64>,
    ) {
        self.points.push(EquityPoint {
            date,
            nav,
            cash,
            holdings,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn final_nav(&self) -> Option<f64> {
        self.points.last().map(|p| p.nav)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EquityPoint> {
        self.points.iter()
    }
}
