//! Core simulation domain: pure in-memory computation over a materialized
//! price panel.

pub mod bar;
pub mod panel;
pub mod factor;
pub mod selector;
pub mod ledger;
pub mod scheduler;
pub mod equity;
pub mod metrics;
pub mod config_validation;
pub mod error;
