// 📂 Dataset Loader
// Finds every staged CSV for a dataset + run date and stacks them into one table

use crate::config::RunDate;
use crate::table::Table;
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

// ============================================================================
// DATASETS
// ============================================================================

/// The logical datasets a SOS extract contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Filings,
    Agents,
    Principals,
}

impl Dataset {
    /// File name label, as produced by the unpacker
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Filings => "Filings",
            Dataset::Agents => "Agents",
            Dataset::Principals => "Principals",
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// All CSVs in `raw_dir` named `{label}_{date}*.csv`, sorted by name
pub fn dataset_files(raw_dir: &Path, dataset: Dataset, date: RunDate) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}_{}", dataset.label(), date);

    let entries = fs::read_dir(raw_dir)
        .with_context(|| format!("Failed to list staging directory: {}", raw_dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(".csv") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Read one CSV with every column as text.
///
/// Short rows are padded with empty cells; a row longer than the header
/// fails the whole file. Invalid UTF-8 is replaced rather than rejected.
pub fn read_csv_table(path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .byte_headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut table = Table::new(headers);

    for (line_num, result) in reader.byte_records().enumerate() {
        let record = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, path.display())
        })?;

        if record.len() > table.width() {
            bail!(
                "Line {} in {} has {} fields, header has {}",
                line_num + 2,
                path.display(),
                record.len(),
                table.width()
            );
        }

        table.push_row(
            record
                .iter()
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect(),
        );
    }

    Ok(table)
}

/// Load one dataset for a run date.
///
/// Every matching file is concatenated, then column names are standardized
/// and cells trimmed. A file that fails to parse is logged and dropped; the
/// rest still load. No files (or none readable) gives an empty table.
pub fn load_dataset(raw_dir: &Path, dataset: Dataset, date: RunDate) -> Table {
    let files = match dataset_files(raw_dir, dataset, date) {
        Ok(files) => files,
        Err(e) => {
            warn!("{:#}", e);
            Vec::new()
        }
    };

    if files.is_empty() {
        warn!(dataset = dataset.label(), %date, "No CSVs found");
        println!("⚠️ No {} CSVs found for {}.", dataset.label(), date);
        return Table::default();
    }

    let mut combined = Table::default();
    for file in &files {
        match read_csv_table(file) {
            Ok(table) => {
                debug!(file = %file.display(), rows = table.len(), "Loaded CSV");
                combined.append(table);
            }
            Err(e) => {
                error!(file = %file.display(), "Dropping unreadable CSV: {:#}", e);
                println!("❌ Error reading {}: {:#}", file.display(), e);
            }
        }
    }

    combined.standardize()
}
