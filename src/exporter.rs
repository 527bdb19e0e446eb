// 📤 Exporter - one CSV per lead tier + run summary

use crate::config::RunDate;
use crate::enrichment::{EnrichedTable, LeadTier};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierCount {
    pub tier: LeadTier,
    pub rows: usize,
    /// None when the tier was empty (no file) or the write failed
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub run_date: RunDate,
    pub total: usize,
    /// Always A, B, C in that order
    pub tiers: Vec<TierCount>,
    pub output_dir: PathBuf,
}

impl ExportSummary {
    pub fn count(&self, tier: LeadTier) -> usize {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)
            .map(|t| t.rows)
            .unwrap_or(0)
    }

    /// Files actually written
    pub fn files(&self) -> Vec<&Path> {
        self.tiers.iter().filter_map(|t| t.file.as_deref()).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Leads for {}: {} total (A: {}, B: {}, C: {}) → {}",
            self.run_date,
            self.total,
            self.count(LeadTier::A),
            self.count(LeadTier::B),
            self.count(LeadTier::C),
            self.output_dir.display()
        )
    }

    /// Human-readable report on stdout
    pub fn print(&self) {
        println!("\n📊 Enrichment Summary:");
        println!("Total leads processed: {}", self.total);
        for tier in &self.tiers {
            println!(" - Tier {}: {}", tier.tier, tier.rows);
        }
        println!("Enriched files saved to: {}", self.output_dir.display());
    }
}

// ============================================================================
// EXPORT
// ============================================================================

/// `{Tier}_leads_{YYYY-MM-DD}.csv`
pub fn tier_file_name(tier: LeadTier, date: RunDate) -> String {
    format!("{}_leads_{}.csv", tier, date)
}

/// Write the records of one tier with all joined + derived columns
pub fn write_tier(enriched: &EnrichedTable, tier: LeadTier, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;

    writer.write_record(enriched.output_headers())?;

    let mut written = 0;
    for record in enriched.tier(tier) {
        writer.write_record(record.to_output_row())?;
        written += 1;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(written)
}

/// Partition by tier and write one file per non-empty tier.
///
/// Empty tiers produce no file. A failed write is logged and its tier
/// reported without a file; the other tiers are still written.
pub fn export_tiers(
    enriched: &EnrichedTable,
    output_dir: &Path,
    date: RunDate,
) -> Result<ExportSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let mut tiers = Vec::with_capacity(LeadTier::ALL.len());

    for tier in LeadTier::ALL {
        let rows = enriched.tier_count(tier);
        let mut file = None;

        if rows > 0 {
            let path = output_dir.join(tier_file_name(tier, date));
            match write_tier(enriched, tier, &path) {
                Ok(written) => {
                    info!(%tier, rows = written, file = %path.display(), "Wrote tier file");
                    file = Some(path);
                }
                Err(e) => {
                    error!(%tier, file = %path.display(), "Failed to write tier file: {:#}", e);
                    println!("❌ Error writing {}: {:#}", path.display(), e);
                }
            }
        }

        tiers.push(TierCount { tier, rows, file });
    }

    let output_dir = fs::canonicalize(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());

    Ok(ExportSummary {
        run_date: date,
        total: enriched.len(),
        tiers,
        output_dir,
    })
}
