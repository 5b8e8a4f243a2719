//! Optional reporting-period restriction applied before key extraction.

use recon_core::models::{ColumnRole, ColumnRoleMap, RawTable};
use recon_core::time_utils::{parse_cell_datetime, DateRange};
use tracing::{debug, warn};

/// Indices of the rows of `table` that fall inside `range`, in table order.
///
/// With no range, or no resolved date column, every row is kept.  Rows whose
/// date cell cannot be parsed are excluded.
pub fn filter_rows(table: &RawTable, roles: &ColumnRoleMap, range: Option<&DateRange>) -> Vec<usize> {
    let all = || (0..table.rows.len()).collect::<Vec<_>>();

    let Some(range) = range else {
        return all();
    };
    let Some(col) = roles.index(ColumnRole::Date) else {
        warn!(
            "{} table has no date column; period filter not applied",
            roles.kind()
        );
        return all();
    };

    let mut unparseable = 0usize;
    let kept: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| match parse_cell_datetime(row.get(col)) {
            Some(dt) => range.contains(dt).then_some(idx),
            None => {
                unparseable += 1;
                None
            }
        })
        .collect();

    debug!(
        "{} table: {} of {} rows within {}..={} ({} unparseable dates)",
        roles.kind(),
        kept.len(),
        table.rows.len(),
        range.start(),
        range.end(),
        unparseable
    );
    kept
}

// ── Tests ─────────────────────────────────────────────────────────────────────
