//! Simulation report emission port.

use crate::domain::error::QuantfolioError;
use crate::domain::scheduler::SimulationResult;
use std::path::Path;

/// Port for persisting a finished simulation (equity curve + trade audit).
pub trait ReportPort {
    fn write(&self, result: &SimulationResult, output_dir: &Path) -> Result<(), QuantfolioError>;
}
