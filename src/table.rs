// 📋 Table - untyped, in-memory string table
// Every CSV cell is kept as text; a missing cell is the empty string

use crate::normalize::{standardize_column_name, unique_column_names};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, in file order
    pub headers: Vec<String>,
    /// One Vec per row, always `headers.len()` wide
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals (handy for tests and fixtures)
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        table
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Push a row, padding or truncating it to the table width
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.width(), String::new());
        self.rows.push(row);
    }

    /// Append another table below this one.
    ///
    /// Columns are matched by name and occurrence (the second "address" of
    /// `other` lines up with the second "address" here). Columns only `other`
    /// has are added at the end; cells a side lacks are left empty.
    pub fn append(&mut self, other: Table) {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        let mapping = self.merge_headers(&other.headers);
        let width = self.width();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }

        for row in other.rows {
            let mut out = vec![String::new(); width];
            for (src, cell) in row.into_iter().enumerate() {
                if let Some(&dst) = mapping.get(src) {
                    out[dst] = cell;
                }
            }
            self.rows.push(out);
        }
    }

    fn merge_headers(&mut self, incoming: &[String]) -> Vec<usize> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut mapping = Vec::with_capacity(incoming.len());

        for name in incoming {
            let nth = occurrences.entry(name.as_str()).or_insert(0);
            let existing = self
                .headers
                .iter()
                .enumerate()
                .filter(|(_, h)| *h == name)
                .nth(*nth)
                .map(|(i, _)| i);
            *nth += 1;

            let idx = match existing {
                Some(i) => i,
                None => {
                    self.headers.push(name.clone());
                    self.headers.len() - 1
                }
            };
            mapping.push(idx);
        }

        mapping
    }

    /// Standardize column names and trim every cell.
    ///
    /// Names are lower-cased, trimmed, spaces/hyphens become `_`, and
    /// duplicates are suffixed `_1`, `_2`, … in order of appearance.
    pub fn standardize(mut self) -> Table {
        self.headers = unique_column_names(self.headers.iter().map(|h| standardize_column_name(h)));

        for row in &mut self.rows {
            for cell in row.iter_mut() {
                let trimmed = cell.trim();
                if trimmed.len() != cell.len() {
                    *cell = trimmed.to_string();
                }
            }
        }

        self
    }

    /// Drop every column whose name is in `names`
    pub fn without_columns(mut self, names: &[&str]) -> Table {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| !names.contains(&h.as_str()))
            .collect();
        if keep.iter().all(|&k| k) {
            return self;
        }

        let retain = |cells: &mut Vec<String>| {
            let mut flags = keep.iter();
            cells.retain(|_| flags.next().copied().unwrap_or(true));
        };
        retain(&mut self.headers);
        for row in &mut self.rows {
            retain(row);
        }
        self
    }

    /// Prefix every column name (e.g. `agent_`)
    pub fn prefixed(mut self, prefix: &str) -> Table {
        for header in &mut self.headers {
            header.insert_str(0, prefix);
        }
        self
    }
}
