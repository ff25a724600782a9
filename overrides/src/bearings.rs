use ids::BearingLookup;

use crate::table::{OverrideTable, Row, ID, ROTATION};

const ROTATION_OVERRIDE: &str = "rotation_override";

/// Fills in the rotation of stops from a bearing lookup. By default only rotations that are
/// missing or zero get replaced. Stops with a manual rotation override are never touched. Returns
/// the number of rows changed.
pub fn apply_bearings(table: &mut OverrideTable, lookup: &BearingLookup, overwrite: bool) -> usize {
    let columns = table.columns().clone();
    let mut changed = 0;
    for row in &mut table.rows {
        let row = match row {
            Row::Stop(row) => row,
            Row::Malformed(_) => continue,
        };
        let bearing = match lookup.get(row.get(&columns, ID).unwrap_or("")) {
            Some(x) => x.to_string(),
            None => continue,
        };
        if row
            .get(&columns, ROTATION_OVERRIDE)
            .map(|x| !x.trim().is_empty())
            .unwrap_or(false)
        {
            continue;
        }

        let current = row.get(&columns, ROTATION).unwrap_or("").trim();
        let unset = current.is_empty() || current.parse::<f64>().map(|x| x == 0.0).unwrap_or(false);
        if (overwrite || unset) && current != bearing {
            row.set(&columns, ROTATION, bearing);
            changed += 1;
        }
    }
    if changed > 0 {
        info!("Updated the rotation of {changed} stops");
    }
    changed
}
