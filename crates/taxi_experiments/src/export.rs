//! Writing sweep results to disk and picking the best run.

use std::path::Path;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/ranking.rs"]
mod ranking;
#[path = "export/writer_utils.rs"]
mod writer_utils;

/// Writes `results` as a pretty-printed JSON array.
pub fn export_to_json(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = writer_utils::create_output_file(path)?;
    json::export_to_json_impl(results, file)
}

/// Writes one CSV row per run: the swept parameters followed by every metric.
///
/// `results[i]` must belong to `parameter_sets[i]`.
///
/// # Errors
///
/// Fails on empty input, mismatched lengths, or any I/O error.
pub fn export_to_csv(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    writer_utils::ensure_not_empty(results)?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_to_csv_impl(results, parameter_sets, file)
}

/// Index of the run with the highest completion rate, ties going to the
/// shorter mean time to pickup. `None` for empty input.
pub fn find_best_result_index(results: &[SimulationResult]) -> Option<usize> {
    ranking::find_best_index(results)
}
