// SOS Lead Pipeline - Core Library
// Exposes all stages for use in the CLI runner and tests

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;      // Shared normalization helpers
pub mod table;          // In-memory string table + column standardization
pub mod unpacker;       // Stage 1: ZIP → renamed CSVs in raw/
pub mod loader;         // Stage 2: raw/ CSVs → one table per dataset
pub mod enrichment;     // Stage 3: join + lead flags + tiering
pub mod exporter;       // Stage 4: tiered CSVs in outputs/
pub mod pipeline;       // Orchestrator

// Re-export commonly used types
pub use config::{PipelineConfig, RunDate};
pub use error::PipelineError;
pub use table::Table;
pub use unpacker::{
    extract_and_rename, safe_target_path, ExtractLog, ExtractReport,
    RenamedFile, SkipReason, SkippedArchive,
};
pub use loader::{load_dataset, Dataset};
pub use enrichment::{
    left_join, resolve_join_key, ColumnRoles, EnrichedRecord, EnrichedTable,
    EnrichmentEngine, JoinKey, LeadFlags, LeadTier,
};
pub use exporter::{export_tiers, ExportSummary, TierCount};
pub use pipeline::{enrich_and_export, run, EnrichmentOutcome, RunReport, Stages};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
