use std::io::{BufWriter, Write};

use crate::metrics::SimulationResult;

pub(crate) fn export_to_json_impl(
    results: &[SimulationResult],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}
