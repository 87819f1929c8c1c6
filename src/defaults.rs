//! Default-value extraction
//!
//! Harvests the `=${param}` placeholder markers the structural rewriter
//! inserts and builds the companion default-value table. Every parameter is
//! seeded with an inert `1`; real defaults are supplied by the caller before
//! the compiled template is instantiated.

use crate::types::{DefaultValueTable, ExpressionRecord};

/// Seed value for every extracted parameter.
pub const DEFAULT_SEED_VALUE: f64 = 1.0;

pub struct DefaultExtractor;

impl DefaultExtractor {
    /// Scan the rewritten records in order and collect parameter names in
    /// first-occurrence order, so repeated compilations emit byte-identical
    /// tables.
    pub fn extract(records: &[ExpressionRecord]) -> DefaultValueTable {
        let mut table = DefaultValueTable::new();
        Self::extract_into(records, &mut table);
        log::debug!("extracted {} default parameter(s)", table.len());
        table
    }

    fn extract_into(records: &[ExpressionRecord], table: &mut DefaultValueTable) {
        for record in records {
            if let Some(latex) = record.latex.as_deref() {
                Self::scan_markers(latex, table);
            }
            if let Some(columns) = record.columns.as_deref() {
                Self::extract_into(columns, table);
            }
        }
    }

    /// Find every `=${...}` marker in a formula. Parameter names contain
    /// subscript braces, so the span is brace-balanced rather than matched
    /// up to the first closing brace.
    fn scan_markers(text: &str, table: &mut DefaultValueTable) {
        let mut search = 0;
        while let Some(found) = text[search..].find("=${") {
            let start = search + found + 3;
            match balanced_span(&text[start..]) {
                Some(len) => {
                    let name = &text[start..start + len];
                    if !name.is_empty() {
                        table.insert_if_absent(name, DEFAULT_SEED_VALUE);
                    }
                    search = start + len + 1;
                }
                None => break,
            }
        }
    }
}

/// Length of the content before the `}` matching an already-consumed `{`,
/// honoring nested braces. `None` when the text never balances.
fn balanced_span(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
