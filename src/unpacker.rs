// 📦 Archive Unpacker
// raw_zips/*.zip → raw/{Label}_{date}[_N].csv, processed archives → archive/raw_zips/
//
// Every outcome goes into an in-memory ExtractLog that is written to
// logs/extract_log_{date}.log once all archives are done.

use crate::config::{PipelineConfig, RunDate};
use crate::error::PipelineError;
use crate::normalize::slugify;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Marker separating the event lines from the summary in the run log
pub const SUMMARY_MARKER: &str = "--- SUMMARY ---";

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedFile {
    /// Archive the CSV came from
    pub archive: String,
    /// Base name inside the archive
    pub original: String,
    /// Final name in the staging directory
    pub renamed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Could not be opened or extracted; left in raw_zips/
    Corrupt,
    /// Extracted fine but held no CSV; still archived
    NoCsv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedArchive {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub renamed: Vec<RenamedFile>,
    pub skipped_archives: Vec<SkippedArchive>,
    /// Archive names moved into the archive directory
    pub archived: Vec<String>,
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// RUN LOG
// ============================================================================

/// Line-oriented log buffer, persisted once at the end of a run
#[derive(Debug, Clone, Default)]
pub struct ExtractLog {
    lines: Vec<String>,
}

impl ExtractLog {
    pub fn new() -> Self {
        ExtractLog::default()
    }

    pub fn zip(&mut self, message: impl AsRef<str>) {
        self.push("ZIP", message);
    }

    pub fn renamed(&mut self, message: impl AsRef<str>) {
        self.push("RENAMED", message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.push("WARN", message);
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.push("ERROR", message);
    }

    fn push(&mut self, tag: &str, message: impl AsRef<str>) {
        self.lines.push(format!("[{}] {}", tag, message.as_ref()));
    }

    /// Append the summary section
    pub fn summarize(&mut self, report: &ExtractReport) {
        self.lines.push(String::new());
        self.lines.push(SUMMARY_MARKER.to_string());
        self.lines.push(format!("Total renamed: {}", report.renamed.len()));
        self.lines.push(format!("Skipped ZIPs: {}", report.skipped_archives.len()));
        for skipped in &report.skipped_archives {
            self.lines.push(format!(" - {}", skipped.name));
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Write to `{log_dir}/extract_log_{date}.log`, replacing an earlier run's log
    pub fn persist(&self, log_dir: &Path, date: RunDate) -> Result<PathBuf> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        let path = log_dir.join(format!("extract_log_{}.log", date));
        fs::write(&path, self.render())
            .with_context(|| format!("Failed to write log file: {}", path.display()))?;
        Ok(path)
    }
}

// ============================================================================
// NAMING
// ============================================================================

/// Staging name for a CSV found in an archive.
///
/// Known names (exact, case-sensitive) keep their stem; anything else is
/// slugified. Both get the run date appended.
pub fn canonical_name(file_name: &str, known_files: &[String], date: RunDate) -> String {
    if known_files.iter().any(|k| k == file_name) {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        format!("{}_{}.csv", stem, date)
    } else {
        format!("{}_{}.csv", slugify(file_name), date)
    }
}

/// A path in `dir` for `file_name` that does not exist yet.
///
/// `name.ext` → `name_1.ext`, `name_2.ext`, … until free.
pub fn safe_target_path(dir: &Path, file_name: &str) -> PathBuf {
    let target = dir.join(file_name);
    if !target.exists() {
        return target;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let extension = as_path.extension().and_then(|e| e.to_str());

    let mut i = 1;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{}_{}.{}", stem, i, ext),
            None => format!("{}_{}", stem, i),
        };
        let target = dir.join(candidate);
        if !target.exists() {
            return target;
        }
        i += 1;
    }
}

/// Move a file, falling back to copy + delete across filesystems
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} → {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))?;
    Ok(())
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract the whole archive into `dest`.
///
/// Entries with unsafe paths are never written outside `dest`.
pub fn extract_archive(zip_path: &Path, dest: &Path) -> Result<(), PipelineError> {
    let name = zip_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.zip")
        .to_string();
    let corrupt = |source: zip::result::ZipError| PipelineError::CorruptArchive {
        name: name.clone(),
        source,
    };

    let file = File::open(zip_path).map_err(|e| corrupt(e.into()))?;
    let mut archive = ZipArchive::new(file).map_err(&corrupt)?;
    archive.extract(dest).map_err(&corrupt)?;
    Ok(())
}

/// Every `.csv` (any case) under `dir`, at any depth, sorted by path
pub fn find_csvs(dir: &Path) -> Vec<PathBuf> {
    let mut csvs: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    csvs.sort();
    csvs
}

fn list_archives(raw_zips_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(raw_zips_dir)
        .with_context(|| format!("Failed to list {}", raw_zips_dir.display()))?;

    let mut zips = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "zip");
        if path.is_file() && is_zip {
            zips.push(path);
        }
    }
    zips.sort();
    Ok(zips)
}

/// Unpack one archive into the staging dir, recording outcomes
fn process_archive(
    zip_path: &Path,
    config: &PipelineConfig,
    date: RunDate,
    report: &mut ExtractReport,
    log: &mut ExtractLog,
) {
    let zip_name = zip_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.zip")
        .to_string();
    let zip_stem = zip_path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    println!("📦 Extracting: {}", zip_name);
    log.zip(format!("Extracting: {}", zip_name));

    let raw_dir = config.raw_path();
    let scratch = raw_dir.join(format!("tmp_{}", zip_stem));

    // Leftovers from an interrupted run must not be staged as this archive's
    if scratch.exists() {
        if let Err(e) = fs::remove_dir_all(&scratch) {
            error!(archive = %zip_name, "Failed to clear stale scratch directory: {}", e);
            log.error(format!("Cannot clear scratch directory for {}: {}", zip_name, e));
            return;
        }
    }

    if let Err(e) = fs::create_dir_all(&scratch) {
        error!(archive = %zip_name, "Failed to create scratch directory: {}", e);
        log.error(format!("Cannot create scratch directory for {}: {}", zip_name, e));
        return;
    }

    if let Err(e) = extract_archive(zip_path, &scratch) {
        error!(archive = %zip_name, "{}", e);
        println!("❌ Corrupted ZIP: {}", zip_name);
        log.error(format!("Corrupted ZIP: {}", zip_name));
        report.skipped_archives.push(SkippedArchive {
            name: zip_name,
            reason: SkipReason::Corrupt,
        });
        let _ = fs::remove_dir_all(&scratch);
        return;
    }

    let csv_files = find_csvs(&scratch);

    if csv_files.is_empty() {
        warn!(archive = %zip_name, "No .csv files found");
        println!("⚠️ No .csv files found in {}", zip_name);
        log.warn(format!("No .csv files found in {}", zip_name));
        report.skipped_archives.push(SkippedArchive {
            name: zip_name.clone(),
            reason: SkipReason::NoCsv,
        });
    } else {
        for file in csv_files {
            let original = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown.csv")
                .to_string();
            let new_name = canonical_name(&original, &config.known_files, date);
            let target = safe_target_path(&raw_dir, &new_name);
            let target_name = target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&new_name)
                .to_string();

            match move_file(&file, &target) {
                Ok(()) => {
                    info!(archive = %zip_name, from = %original, to = %target_name, "Renamed CSV");
                    println!("✅ {} → {}", original, target_name);
                    log.renamed(format!("{} → {}", original, target_name));
                    report.renamed.push(RenamedFile {
                        archive: zip_name.clone(),
                        original,
                        renamed: target_name,
                    });
                }
                Err(e) => {
                    error!(archive = %zip_name, file = %original, "{:#}", e);
                    log.error(format!("Failed to move {}: {:#}", original, e));
                }
            }
        }
    }

    let archive_dir = config.archive_path();
    let archived = fs::create_dir_all(&archive_dir)
        .with_context(|| format!("Failed to create archive directory: {}", archive_dir.display()))
        .and_then(|_| move_file(zip_path, &safe_target_path(&archive_dir, &zip_name)));

    match archived {
        Ok(()) => report.archived.push(zip_name),
        Err(e) => {
            error!(archive = %zip_name, "Failed to archive: {:#}", e);
            log.error(format!("Failed to archive {}: {:#}", zip_name, e));
        }
    }

    let _ = fs::remove_dir_all(&scratch);
}

/// Unpack every archive in the input queue.
///
/// A corrupt archive is logged and left in place; the run moves on. An
/// archive without CSVs is logged and still archived. The run log is
/// written at the end; failing to write it is logged, not fatal.
pub fn extract_and_rename(config: &PipelineConfig, date: RunDate) -> Result<ExtractReport> {
    let raw_dir = config.raw_path();
    fs::create_dir_all(&raw_dir)
        .with_context(|| format!("Failed to create staging directory: {}", raw_dir.display()))?;

    let mut report = ExtractReport::default();
    let mut log = ExtractLog::new();

    let archives = match list_archives(&config.raw_zips_path()) {
        Ok(archives) => archives,
        Err(e) => {
            warn!("{:#}", e);
            Vec::new()
        }
    };

    if archives.is_empty() {
        info!(dir = %config.raw_zips_path().display(), "No archives to extract");
    }

    for zip_path in &archives {
        process_archive(zip_path, config, date, &mut report, &mut log);
    }

    println!("\n🧾 Extraction Summary:");
    println!("✔️ Renamed files: {}", report.renamed.len());
    for file in &report.renamed {
        println!("   {}", file.renamed);
    }
    println!("🚫 Skipped ZIPs: {}", report.skipped_archives.len());

    log.summarize(&report);
    match log.persist(&config.log_path(), date) {
        Ok(path) => {
            println!("📝 Log saved to: {}", path.display());
            report.log_file = Some(path);
        }
        Err(e) => error!("{:#}", e),
    }

    Ok(report)
}
