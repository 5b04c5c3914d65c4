//! CSV export of a project's current metadata snapshot.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, bail};
use csv::QuoteStyle;
use log::{info, warn};

use crate::{state::ProjectMetadataState, table::row_cells};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub columns: usize,
    pub empty_columns: Vec<String>,
}

/// Writes the loaded columns of the snapshot to `path`, or stdout for `None`
/// or `-`. Refuses when no view has been loaded yet.
pub fn export_snapshot(
    state: &ProjectMetadataState,
    path: Option<&Path>,
    delimiter: u8,
) -> Result<ExportSummary> {
    let writer: Box<dyn Write> = match path {
        Some(p) if p != Path::new("-") => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    write_snapshot(state, writer, delimiter)
}

pub fn write_snapshot<W: Write>(
    state: &ProjectMetadataState,
    writer: W,
    delimiter: u8,
) -> Result<ExportSummary> {
    let loading_state = state.loading_state();
    let Some(rows) = state.metadata().filter(|_| loading_state.has_data()) else {
        bail!(
            "Project '{}' has no data to export (state {loading_state})",
            state.project_abbrev()
        );
    };
    if !state.empty_columns().is_empty() {
        warn!(
            "Exporting '{}' with {} empty column(s): {}",
            state.project_abbrev(),
            state.empty_columns().len(),
            state.empty_columns().join(", ")
        );
    }

    let columns = state
        .loaded_columns()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);
    csv_writer
        .write_record(&columns)
        .context("Writing CSV header")?;
    for (idx, row) in rows.iter().enumerate() {
        csv_writer
            .write_record(row_cells(row, &columns))
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    csv_writer.flush().context("Flushing CSV output")?;
    info!(
        "Exported {} row(s) across {} column(s) for '{}'",
        rows.len(),
        columns.len(),
        state.project_abbrev()
    );
    Ok(ExportSummary {
        rows: rows.len(),
        columns: columns.len(),
        empty_columns: state.empty_columns().to_vec(),
    })
}
