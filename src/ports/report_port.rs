//! Result table export port trait.

use crate::domain::error::SimulatorError;
use crate::domain::simulation::SimulationResult;

/// Port for writing the day-by-day ledger of a run.
pub trait ReportPort {
    fn write(&self, result: &SimulationResult, output_path: &str) -> Result<(), SimulatorError>;

    /// Default implementation: one file per result, named
    /// `<output_dir>/<strategy_id>.csv`.
    fn write_all(
        &self,
        results: &[SimulationResult],
        output_dir: &str,
    ) -> Result<(), SimulatorError> {
        for result in results {
            let path = std::path::Path::new(output_dir).join(format!("{}.csv", result.strategy_id));
            self.write(result, &path.to_string_lossy())?;
        }
        Ok(())
    }
}
