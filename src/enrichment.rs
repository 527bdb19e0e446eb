// 🎯 Join & Enrichment Engine
// Filings ⟕ Agents on the best available key, then address/email heuristics
// and a deterministic A/B/C lead tier per joined row

use crate::config::PipelineConfig;
use crate::normalize::{normalize_address, unique_column_names};
use crate::table::Table;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Prefix applied to every agent column before joining
pub const AGENT_PREFIX: &str = "agent_";

/// Suffix for an agent column whose prefixed name is already a filing column
pub const AGENT_COLLISION_SUFFIX: &str = "_agent";

/// Known (filing, agent) key pairs, tried in order
pub const JOIN_KEY_CANDIDATES: [(&str, &str); 3] = [
    ("entity_number", "agent_entity_number"),
    ("file_number", "agent_file_number"),
    ("entity_id", "agent_entity_id"),
];

/// Apartment / suite / PO box markers, matched as whole tokens
const RESIDENTIAL_PATTERN: &str = r"(?i)\b(apt|apartment|unit|suite|#|po box|p\.o\. box)\b";

/// Columns appended to every enriched row, in output order
pub const DERIVED_COLUMNS: [&str; 6] = [
    "business_full_address",
    "agent_full_address",
    "agent_differs_from_business_address",
    "likely_residential_address",
    "has_personal_email",
    "lead_tier",
];

// ============================================================================
// LEAD TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LeadTier {
    A,
    B,
    C,
}

impl LeadTier {
    pub const ALL: [LeadTier; 3] = [LeadTier::A, LeadTier::B, LeadTier::C];

    /// Tier from the two address flags (email plays no part)
    ///
    /// both → A, exactly one → B, neither → C
    pub fn classify(agent_differs: bool, likely_residential: bool) -> Self {
        match (agent_differs, likely_residential) {
            (true, true) => LeadTier::A,
            (true, false) | (false, true) => LeadTier::B,
            (false, false) => LeadTier::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTier::A => "A",
            LeadTier::B => "B",
            LeadTier::C => "C",
        }
    }
}

impl fmt::Display for LeadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// JOIN KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKey {
    pub filing_column: String,
    pub agent_column: String,
    /// True when no known pair matched and the first columns were paired
    pub degraded: bool,
}

/// Pick the join key for a filings table and an already-prefixed agents table.
///
/// The first known pair present on both sides wins. Otherwise the first
/// column of each side is used, marked `degraded`; there is no guarantee
/// such a join means anything. `None` only when a side has no columns.
pub fn resolve_join_key(filings: &Table, agents: &Table) -> Option<JoinKey> {
    for (filing_key, agent_key) in JOIN_KEY_CANDIDATES {
        if filings.has_column(filing_key) && agents.has_column(agent_key) {
            return Some(JoinKey {
                filing_column: filing_key.to_string(),
                agent_column: agent_key.to_string(),
                degraded: false,
            });
        }
    }

    Some(JoinKey {
        filing_column: filings.headers.first()?.clone(),
        agent_column: agents.headers.first()?.clone(),
        degraded: true,
    })
}

/// Left outer join of filings with (prefixed) agents.
///
/// Every filing row survives. No match → agent cells empty; n matches → n
/// rows. Blank keys never match. Agent columns whose name is already taken
/// by a filing column get the `_agent` suffix.
pub fn left_join(filings: &Table, agents: &Table, key: &JoinKey) -> Result<Table> {
    let filing_idx = filings
        .column_index(&key.filing_column)
        .with_context(|| format!("Filings have no column '{}'", key.filing_column))?;
    let agent_idx = agents
        .column_index(&key.agent_column)
        .with_context(|| format!("Agents have no column '{}'", key.agent_column))?;

    let agent_headers = agents.headers.iter().map(|h| {
        if filings.has_column(h) {
            format!("{}{}", h, AGENT_COLLISION_SUFFIX)
        } else {
            h.clone()
        }
    });
    let headers = unique_column_names(filings.headers.iter().cloned().chain(agent_headers));

    // key value → agent row indices, in file order
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in agents.rows.iter().enumerate() {
        let value = row.get(agent_idx).map(String::as_str).unwrap_or("");
        if !value.is_empty() {
            index.entry(value).or_default().push(i);
        }
    }

    let mut joined = Table::new(headers);
    let blank_agent = vec![String::new(); agents.width()];

    for row in &filings.rows {
        let value = row.get(filing_idx).map(String::as_str).unwrap_or("");
        let matches = if value.is_empty() { None } else { index.get(value) };

        match matches {
            Some(agent_rows) => {
                for &a in agent_rows {
                    let mut out = row.clone();
                    out.extend(agents.rows[a].iter().cloned());
                    joined.push_row(out);
                }
            }
            None => {
                let mut out = row.clone();
                out.extend(blank_agent.iter().cloned());
                joined.push_row(out);
            }
        }
    }

    Ok(joined)
}

// ============================================================================
// COLUMN ROLES
// ============================================================================

/// Which joined columns feed each heuristic, resolved once per schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Contains "address", not agent-prefixed
    pub business_address: Vec<usize>,
    /// Agent-prefixed and contains "address"
    pub agent_address: Vec<usize>,
    /// Contains "email"
    pub email: Vec<usize>,
}

impl ColumnRoles {
    /// Column order follows the joined schema, which follows whatever order
    /// the source files used. The concatenated addresses inherit it.
    pub fn detect(headers: &[String]) -> Self {
        let mut roles = ColumnRoles::default();

        for (i, name) in headers.iter().enumerate() {
            let is_agent = name.starts_with(AGENT_PREFIX);
            if name.contains("address") {
                if is_agent {
                    roles.agent_address.push(i);
                } else {
                    roles.business_address.push(i);
                }
            }
            if name.contains("email") {
                roles.email.push(i);
            }
        }

        roles
    }
}

fn join_cells(row: &[String], columns: &[usize]) -> String {
    columns
        .iter()
        .map(|&i| row.get(i).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// ENRICHED RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeadFlags {
    pub agent_differs_from_business_address: bool,
    pub likely_residential_address: bool,
    pub has_personal_email: bool,
    pub lead_tier: LeadTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    /// Joined cells, aligned with `EnrichedTable::headers`
    pub cells: Vec<String>,
    /// Raw space-joined business address columns
    pub business_full_address: String,
    /// Raw space-joined agent address columns
    pub agent_full_address: String,
    pub flags: LeadFlags,
}

impl EnrichedRecord {
    /// Joined cells followed by the derived columns, ready for CSV
    pub fn to_output_row(&self) -> Vec<String> {
        let mut row = self.cells.clone();
        row.push(self.business_full_address.clone());
        row.push(self.agent_full_address.clone());
        row.push(render_bool(self.flags.agent_differs_from_business_address).to_string());
        row.push(render_bool(self.flags.likely_residential_address).to_string());
        row.push(render_bool(self.flags.has_personal_email).to_string());
        row.push(self.flags.lead_tier.as_str().to_string());
        row
    }
}

/// Booleans are written the way the downstream CRM import expects them
pub fn render_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichedTable {
    /// Joined column names (derived columns not included)
    pub headers: Vec<String>,
    pub records: Vec<EnrichedRecord>,
}

impl EnrichedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Joined headers followed by the derived columns
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        headers.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));
        headers
    }

    pub fn tier(&self, tier: LeadTier) -> impl Iterator<Item = &EnrichedRecord> {
        self.records.iter().filter(move |r| r.flags.lead_tier == tier)
    }

    pub fn tier_count(&self, tier: LeadTier) -> usize {
        self.tier(tier).count()
    }
}

// ============================================================================
// ENRICHMENT ENGINE
// ============================================================================

pub struct EnrichmentEngine {
    residential_pattern: Regex,
    /// Lower-cased consumer email domains
    consumer_domains: Vec<String>,
}

impl EnrichmentEngine {
    pub fn new<S: AsRef<str>>(consumer_domains: &[S]) -> Result<Self> {
        let residential_pattern =
            Regex::new(RESIDENTIAL_PATTERN).context("Failed to compile residential pattern")?;

        Ok(EnrichmentEngine {
            residential_pattern,
            consumer_domains: consumer_domains
                .iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        EnrichmentEngine::new(&config.consumer_domains[..])
    }

    /// True when either raw address carries an apartment/suite/PO box marker
    pub fn is_likely_residential(&self, business_address: &str, agent_address: &str) -> bool {
        self.residential_pattern.is_match(business_address)
            || self.residential_pattern.is_match(agent_address)
    }

    /// True when the text after the last `@` ends with a consumer domain
    pub fn is_personal_email(&self, value: &str) -> bool {
        let Some((_, domain)) = value.rsplit_once('@') else {
            return false;
        };
        let domain = domain.trim().to_lowercase();
        self.consumer_domains.iter().any(|d| domain.ends_with(d.as_str()))
    }

    /// Flags and full addresses for one joined row
    pub fn enrich_row(&self, row: Vec<String>, roles: &ColumnRoles) -> EnrichedRecord {
        let business_full_address = join_cells(&row, &roles.business_address);
        let agent_full_address = join_cells(&row, &roles.agent_address);

        let agent_differs = normalize_address(&agent_full_address)
            != normalize_address(&business_full_address);
        let likely_residential =
            self.is_likely_residential(&business_full_address, &agent_full_address);
        let has_personal_email = roles
            .email
            .iter()
            .any(|&i| row.get(i).is_some_and(|v| self.is_personal_email(v)));

        EnrichedRecord {
            cells: row,
            business_full_address,
            agent_full_address,
            flags: LeadFlags {
                agent_differs_from_business_address: agent_differs,
                likely_residential_address: likely_residential,
                has_personal_email,
                lead_tier: LeadTier::classify(agent_differs, likely_residential),
            },
        }
    }

    /// Compute flags for every row of an already-joined table.
    ///
    /// Input columns named like a derived column are replaced, not kept
    /// alongside, so every output header stays unique.
    pub fn apply_flags(&self, joined: Table) -> EnrichedTable {
        let width = joined.width();
        let joined = joined.without_columns(&DERIVED_COLUMNS);
        if joined.width() < width {
            warn!(
                dropped = width - joined.width(),
                "Input columns clash with derived columns; recomputing them"
            );
        }

        let roles = ColumnRoles::detect(&joined.headers);

        if roles.email.is_empty() {
            info!("No email columns in joined schema; has_personal_email is false for all rows");
        }

        let records = joined
            .rows
            .into_iter()
            .map(|row| self.enrich_row(row, &roles))
            .collect();

        EnrichedTable {
            headers: joined.headers,
            records,
        }
    }

    /// Join standardized filings and agents, then enrich.
    ///
    /// `agents` is taken unprefixed; the `agent_` prefix is applied here.
    pub fn enrich(&self, filings: &Table, agents: Table) -> Result<EnrichedTable> {
        let agents = agents.prefixed(AGENT_PREFIX);

        let Some(key) = resolve_join_key(filings, &agents) else {
            bail!("Cannot join: filings or agents have no columns");
        };

        if key.degraded {
            warn!(
                filing_key = %key.filing_column,
                agent_key = %key.agent_column,
                "No known join key; falling back to first columns"
            );
            println!(
                "⚠️ Using fallback join keys: {} ↔ {}",
                key.filing_column, key.agent_column
            );
        } else {
            info!(
                filing_key = %key.filing_column,
                agent_key = %key.agent_column,
                "Join key resolved"
            );
        }

        let joined = left_join(filings, &agents, &key)?;
        Ok(self.apply_flags(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> EnrichmentEngine {
        EnrichmentEngine::from_config(&PipelineConfig::default()).unwrap()
    }

    fn column<'a>(table: &'a EnrichedTable, record: &'a EnrichedRecord, name: &str) -> &'a str {
        let idx = table.headers.iter().position(|h| h == name).unwrap();
        &record.cells[idx]
    }

    // ------------------------------------------------------------------------
    // Tiering
    // ------------------------------------------------------------------------

    #[test]
    fn test_tier_truth_table() {
        assert_eq!(LeadTier::classify(true, true), LeadTier::A);
        assert_eq!(LeadTier::classify(true, false), LeadTier::B);
        assert_eq!(LeadTier::classify(false, true), LeadTier::B);
        assert_eq!(LeadTier::classify(false, false), LeadTier::C);
    }

    // ------------------------------------------------------------------------
    // Heuristics
    // ------------------------------------------------------------------------

    #[test]
    fn test_residential_markers() {
        let engine = engine();

        assert!(engine.is_likely_residential("123 Main St Apt 4", ""));
        assert!(engine.is_likely_residential("", "PO Box 12"));
        assert!(engine.is_likely_residential("1 Market St SUITE 200", ""));
        assert!(engine.is_likely_residential("P.O. Box 5", ""));
        assert!(engine.is_likely_residential("9 Elm Unit B", ""));
        assert!(!engine.is_likely_residential("500 Oak Ave", "500 Oak Ave"));
        // Whole tokens only
        assert!(!engine.is_likely_residential("77 Community Blvd", "12 Aptos Way"));
    }

    #[test]
    fn test_personal_email() {
        let engine = engine();

        assert!(engine.is_personal_email("jane@gmail.com"));
        assert!(engine.is_personal_email("JANE@Yahoo.COM"));
        assert!(engine.is_personal_email("odd@name@aol.com"));
        assert!(!engine.is_personal_email("jane@acmecorp.com"));
        assert!(!engine.is_personal_email("gmail.com"));
        assert!(!engine.is_personal_email(""));
    }

    #[test]
    fn test_column_roles() {
        let headers: Vec<String> = [
            "entity_number",
            "business_address",
            "mailing_address",
            "agent_entity_number",
            "agent_address",
            "agent_email",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let roles = ColumnRoles::detect(&headers);

        assert_eq!(roles.business_address, vec![1, 2]);
        assert_eq!(roles.agent_address, vec![4]);
        assert_eq!(roles.email, vec![5]);
    }

    // ------------------------------------------------------------------------
    // Join
    // ------------------------------------------------------------------------

    #[test]
    fn test_join_key_prefers_known_pairs_in_order() {
        let filings = Table::from_rows(&["file_number", "entity_number"], &[]);
        let agents =
            Table::from_rows(&["file_number", "entity_number"], &[]).prefixed(AGENT_PREFIX);

        let key = resolve_join_key(&filings, &agents).unwrap();

        assert_eq!(key.filing_column, "entity_number");
        assert_eq!(key.agent_column, "agent_entity_number");
        assert!(!key.degraded);
    }

    #[test]
    fn test_join_key_degraded_fallback() {
        let filings = Table::from_rows(&["corp_no", "address"], &[&["7", "1 A St"]]);
        let agents =
            Table::from_rows(&["corp_no", "address"], &[&["7", "1 A St"]]).prefixed(AGENT_PREFIX);

        let key = resolve_join_key(&filings, &agents).unwrap();

        // Degraded mode: first columns paired, correctness not guaranteed
        assert!(key.degraded);
        assert_eq!(key.filing_column, "corp_no");
        assert_eq!(key.agent_column, "agent_corp_no");

        let joined = left_join(&filings, &agents, &key).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows[0], vec!["7", "1 A St", "7", "1 A St"]);
    }

    #[test]
    fn test_join_key_none_without_columns() {
        let filings = Table::default();
        let agents = Table::from_rows(&["agent_x"], &[]);
        assert!(resolve_join_key(&filings, &agents).is_none());
    }

    #[test]
    fn test_left_join_without_matches_keeps_every_filing() {
        let engine = engine();
        let filings = Table::from_rows(
            &["entity_number", "address"],
            &[&["1", "10 First St"], &["2", "20 Second St"]],
        );
        let agents = Table::from_rows(&["entity_number", "address"], &[&["99", "Elsewhere"]]);

        let enriched = engine.enrich(&filings, agents).unwrap();

        assert_eq!(enriched.len(), 2);
        for record in &enriched.records {
            assert_eq!(column(&enriched, record, "agent_entity_number"), "");
            assert_eq!(column(&enriched, record, "agent_address"), "");
            assert_eq!(record.agent_full_address, "");
            // Empty agent address differs from any non-empty business address
            assert!(record.flags.agent_differs_from_business_address);
            assert!(!record.flags.likely_residential_address);
            assert_eq!(record.flags.lead_tier, LeadTier::B);
        }
    }

    #[test]
    fn test_left_join_duplicates_on_multiple_matches() {
        let filings = Table::from_rows(
            &["entity_number", "name"],
            &[&["1", "Acme"], &["2", "Beta"]],
        );
        let agents = Table::from_rows(
            &["entity_number", "name"],
            &[&["1", "Agent One"], &["1", "Agent Two"], &["2", "Agent Three"]],
        )
        .prefixed(AGENT_PREFIX);
        let key = resolve_join_key(&filings, &agents).unwrap();

        let joined = left_join(&filings, &agents, &key).unwrap();

        assert_eq!(joined.len(), 3);
        let acme_rows: Vec<_> = joined.rows.iter().filter(|r| r[0] == "1").collect();
        assert_eq!(acme_rows.len(), 2);
        assert_eq!(acme_rows[0][3], "Agent One");
        assert_eq!(acme_rows[1][3], "Agent Two");
    }

    #[test]
    fn test_blank_keys_never_match() {
        let filings = Table::from_rows(&["entity_number"], &[&[""]]);
        let agents = Table::from_rows(&["entity_number"], &[&[""], &[""]]).prefixed(AGENT_PREFIX);
        let key = resolve_join_key(&filings, &agents).unwrap();

        let joined = left_join(&filings, &agents, &key).unwrap();

        assert_eq!(joined.len(), 1);
    }

    #[test]
    fn test_prefixed_name_collision_gets_suffix() {
        let filings = Table::from_rows(&["entity_number", "agent_name"], &[&["1", "From filing"]]);
        let agents = Table::from_rows(&["entity_number", "name"], &[&["1", "From agents"]])
            .prefixed(AGENT_PREFIX);
        let key = resolve_join_key(&filings, &agents).unwrap();

        let joined = left_join(&filings, &agents, &key).unwrap();

        assert_eq!(
            joined.headers,
            vec!["entity_number", "agent_name", "agent_entity_number", "agent_name_agent"]
        );
    }

    // ------------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------------

    #[test]
    fn test_scenario_apartment_agent_is_tier_a() {
        let filings = Table::from_rows(&["entity_number", "address"], &[&["1001", "123 Main St"]]);
        let agents =
            Table::from_rows(&["entity_number", "address"], &[&["1001", "123 Main St Apt 4"]]);

        let enriched = engine().enrich(&filings, agents).unwrap();
        let record = &enriched.records[0];

        assert!(record.flags.agent_differs_from_business_address);
        assert!(record.flags.likely_residential_address);
        assert_eq!(record.flags.lead_tier, LeadTier::A);
    }

    #[test]
    fn test_scenario_identical_address_is_tier_c() {
        let filings = Table::from_rows(&["entity_number", "address"], &[&["1002", "500 Oak Ave"]]);
        let agents = Table::from_rows(&["entity_number", "address"], &[&["1002", "500 Oak Ave"]]);

        let enriched = engine().enrich(&filings, agents).unwrap();
        let record = &enriched.records[0];

        assert!(!record.flags.agent_differs_from_business_address);
        assert!(!record.flags.likely_residential_address);
        assert_eq!(record.flags.lead_tier, LeadTier::C);
    }

    #[test]
    fn test_scenario_formatting_only_difference_is_same_address() {
        let filings =
            Table::from_rows(&["entity_number", "address"], &[&["1", "500 Oak Ave., Fresno"]]);
        let agents =
            Table::from_rows(&["entity_number", "address"], &[&["1", "500  oak ave fresno"]]);

        let enriched = engine().enrich(&filings, agents).unwrap();

        assert!(!enriched.records[0].flags.agent_differs_from_business_address);
    }

    #[test]
    fn test_scenario_email_flag() {
        let filings = Table::from_rows(
            &["entity_number", "address"],
            &[&["1", "1 A St"], &["2", "2 B St"]],
        );
        let agents = Table::from_rows(
            &["entity_number", "address", "email"],
            &[&["1", "1 A St", "jane@gmail.com"], &["2", "2 B St", "jane@acmecorp.com"]],
        );

        let enriched = engine().enrich(&filings, agents).unwrap();

        assert!(enriched.headers.contains(&"agent_email".to_string()));
        assert!(enriched.records[0].flags.has_personal_email);
        assert!(!enriched.records[1].flags.has_personal_email);
        // Email never moves the tier
        assert_eq!(enriched.records[0].flags.lead_tier, LeadTier::C);
    }

    #[test]
    fn test_no_email_columns_means_false() {
        let filings = Table::from_rows(&["entity_number"], &[&["1"]]);
        let agents = Table::from_rows(&["entity_number"], &[&["1"]]);

        let enriched = engine().enrich(&filings, agents).unwrap();

        assert!(!enriched.records[0].flags.has_personal_email);
    }

    #[test]
    fn test_derived_columns_replace_input_columns() {
        let filings = Table::from_rows(
            &["entity_number", "address", "lead_tier"],
            &[&["1", "1 A St", "Z"]],
        );
        let agents = Table::from_rows(
            &["entity_number", "address", "full_address"],
            &[&["1", "1 A St", "stale"]],
        );

        let enriched = engine().enrich(&filings, agents).unwrap();
        let headers = enriched.output_headers();
        let row = enriched.records[0].to_output_row();

        assert_eq!(
            headers,
            vec![
                "entity_number",
                "address",
                "agent_entity_number",
                "agent_address",
                "business_full_address",
                "agent_full_address",
                "agent_differs_from_business_address",
                "likely_residential_address",
                "has_personal_email",
                "lead_tier",
            ]
        );
        assert_eq!(headers.len(), row.len());
        assert_eq!(enriched.records[0].agent_full_address, "1 A St");
        assert_eq!(row.last().map(String::as_str), Some("C"));
    }

    #[test]
    fn test_output_row_layout() {
        let filings = Table::from_rows(&["entity_number", "address"], &[&["1001", "123 Main St"]]);
        let agents =
            Table::from_rows(&["entity_number", "address"], &[&["1001", "123 Main St Apt 4"]]);

        let enriched = engine().enrich(&filings, agents).unwrap();
        let headers = enriched.output_headers();
        let row = enriched.records[0].to_output_row();

        assert_eq!(headers.len(), row.len());
        assert_eq!(&headers[headers.len() - 6..], &DERIVED_COLUMNS.map(String::from)[..]);
        assert_eq!(
            &row[row.len() - 6..],
            &["123 Main St", "123 Main St Apt 4", "True", "True", "False", "A"]
        );
    }
}
