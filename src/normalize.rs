// 🧹 Normalization helpers shared by every stage

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Standardize a single column name: trim, lower-case, spaces/hyphens → `_`
pub fn standardize_column_name(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Make column names unique in order of appearance.
///
/// The first occurrence keeps its name, later ones get `_1`, `_2`, …
/// A suffix that would itself collide with an existing name is skipped.
pub fn unique_column_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let names: Vec<String> = names.into_iter().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(names.len());

    for name in names {
        let candidate = if used.contains(&name) {
            let counter = counters.entry(name.clone()).or_insert(0);
            loop {
                *counter += 1;
                let suffixed = format!("{}_{}", name, counter);
                if !used.contains(&suffixed) {
                    break suffixed;
                }
            }
        } else {
            name
        };
        used.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

/// Normalize an address for comparison.
///
/// Runs of whitespace, commas and periods become one space, the result is
/// lower-cased and trimmed. Idempotent.
pub fn normalize_address(address: &str) -> String {
    let lowered = address.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for c in lowered.chars() {
        if c.is_whitespace() || c == ',' || c == '.' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

/// Filesystem-safe slug of a file name: extension dropped, spaces/hyphens → `_`
pub fn slugify(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    stem.replace([' ', '-'], "_")
}
