//! Join-key extraction for both source tables.

use recon_core::error::Result;
use recon_core::models::{CellValue, ColumnRoleMap, KeyFallback, RawTable, TableKind};
use regex::Regex;
use tracing::debug;

/// Derives join keys from free-text identifier cells.
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    pattern: Regex,
    fallback: KeyFallback,
}

impl KeyExtractor {
    /// Compile `pattern`; the first capture group is the key when the pattern
    /// has one, otherwise the whole match.
    pub fn new(pattern: &str, fallback: KeyFallback) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            fallback,
        })
    }

    /// Key for a spend-table name such as `"Summer_bn042_v2"` → `"bn042"`.
    ///
    /// When the pattern does not match, [`KeyFallback::Drop`] yields `None`
    /// and [`KeyFallback::RawText`] yields the trimmed text.
    pub fn spend_key(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let extracted = self.pattern.captures(trimmed).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
        });
        match (extracted, self.fallback) {
            (Some(key), _) if !key.is_empty() => Some(key),
            (_, KeyFallback::RawText) => Some(trimmed.to_string()),
            (_, KeyFallback::Drop) => None,
        }
    }

    /// Key for a lead-table identifier: the trimmed text, no extraction.
    pub fn lead_key(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn key_for(&self, kind: TableKind, cell: &CellValue) -> Option<String> {
        if cell.is_blank() {
            return None;
        }
        let text = cell.as_text();
        match kind {
            TableKind::Spend => self.spend_key(&text),
            TableKind::Leads => self.lead_key(&text),
        }
    }

    /// Pair each of `rows` (indices into `table`) with its join key, dropping
    /// rows without one.  Row order is preserved and the table is untouched.
    ///
    /// The key-source column must already be resolved; rows read as keyless
    /// otherwise.
    pub fn key_rows(
        &self,
        table: &RawTable,
        roles: &ColumnRoleMap,
        rows: &[usize],
    ) -> KeyedRows {
        let kind = roles.kind();
        let Some(col) = roles.index(kind.key_source_role()) else {
            return KeyedRows {
                keyed: Vec::new(),
                dropped: rows.len(),
            };
        };

        let mut keyed = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;
        for &row in rows {
            match self.key_for(kind, table.rows[row].get(col)) {
                Some(key) => keyed.push((row, key)),
                None => dropped += 1,
            }
        }

        debug!(
            "{} table: {} rows keyed, {} without a key",
            kind,
            keyed.len(),
            dropped
        );
        KeyedRows { keyed, dropped }
    }
}

/// Row indices paired with their join keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedRows {
    pub keyed: Vec<(usize, String)>,
    /// Rows excluded because no key could be derived.
    pub dropped: usize,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{resolve, ResolverRules};
    use recon_core::models::RawRecord;
    use recon_core::settings::DEFAULT_KEY_PATTERN;

    fn extractor(fallback: KeyFallback) -> KeyExtractor {
        KeyExtractor::new(DEFAULT_KEY_PATTERN, fallback).unwrap()
    }

    #[test]
    fn test_spend_key_extracts_banner_id() {
        let ex = extractor(KeyFallback::Drop);
        assert_eq!(ex.spend_key("Summer_bn042_v2"), Some("bn042".to_string()));
        assert_eq!(ex.spend_key("ad_bn007_x"), Some("bn007".to_string()));
        assert_eq!(ex.spend_key("bn1"), Some("bn1".to_string()));
    }

    #[test]
    fn test_spend_key_finds_id_glued_to_word() {
        let ex = extractor(KeyFallback::Drop);
        assert_eq!(ex.spend_key("Summerbn042"), Some("bn042".to_string()));
        assert_eq!(ex.spend_key("urbn123_bn9"), Some("bn123".to_string()));
    }

    #[test]
    fn test_spend_key_no_match_drop_policy() {
        let ex = extractor(KeyFallback::Drop);
        assert_eq!(ex.spend_key("Brand awareness video"), None);
    }

    #[test]
    fn test_spend_key_no_match_raw_text_policy() {
        let ex = extractor(KeyFallback::RawText);
        assert_eq!(
            ex.spend_key("  Brand awareness video "),
            Some("Brand awareness video".to_string())
        );
        assert_eq!(ex.spend_key("   "), None);
    }

    #[test]
    fn test_pattern_without_group_uses_whole_match() {
        let ex = KeyExtractor::new(r"cr\d{3}", KeyFallback::Drop).unwrap();
        assert_eq!(ex.spend_key("spring-cr120-b"), Some("cr120".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(KeyExtractor::new("(bn", KeyFallback::Drop).is_err());
    }

    #[test]
    fn test_lead_key_is_trimmed_text() {
        let ex = extractor(KeyFallback::Drop);
        assert_eq!(ex.lead_key("  bn007 "), Some("bn007".to_string()));
        assert_eq!(ex.lead_key("Summer_bn042_v2"), Some("Summer_bn042_v2".to_string()));
        assert_eq!(ex.lead_key(""), None);
    }

    #[test]
    fn test_key_rows_skips_blank_and_keeps_order() {
        let table = RawTable::new(
            "leads",
            vec!["UTM Content".to_string()],
            vec![
                RawRecord::new(vec![CellValue::Text("bn002".to_string())]),
                RawRecord::new(vec![CellValue::Empty]),
                RawRecord::new(vec![CellValue::Text("nan".to_string())]),
                RawRecord::new(vec![CellValue::Text("bn001".to_string())]),
            ],
        );
        let roles = resolve(&table.columns, TableKind::Leads, &ResolverRules::default());
        let keyed = extractor(KeyFallback::Drop).key_rows(&table, &roles, &[0, 1, 2, 3]);

        assert_eq!(
            keyed.keyed,
            vec![(0, "bn002".to_string()), (3, "bn001".to_string())]
        );
        assert_eq!(keyed.dropped, 2);
    }

    #[test]
    fn test_key_rows_numeric_cell_reads_as_text() {
        let table = RawTable::new(
            "leads",
            vec!["utm_content".to_string()],
            vec![RawRecord::new(vec![CellValue::Number(42.0)])],
        );
        let roles = resolve(&table.columns, TableKind::Leads, &ResolverRules::default());
        let keyed = extractor(KeyFallback::Drop).key_rows(&table, &roles, &[0]);
        assert_eq!(keyed.keyed, vec![(0, "42".to_string())]);
    }
}
