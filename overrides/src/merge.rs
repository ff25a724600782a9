use std::collections::{BTreeMap, BTreeSet};

use ids::{numeric_suffix, to_internal_id, BearingLookup, Source, Sources, UpstreamStop};

use crate::table::{Columns, OverrideTable, Row, StopRow, ID, ROTATION};

pub struct MergeOutcome {
    pub table: OverrideTable,
    pub stats: MergeStats,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeStats {
    /// Rows of other sources, kept in place
    pub passthrough: usize,
    pub malformed: usize,
    /// Stops with only one row
    pub kept: usize,
    /// Stops with rows under several historical namespaces, reduced to one
    pub collapsed: usize,
    /// Rows folded into another row of the same stop
    pub absorbed: usize,
    /// New stops from upstream
    pub appended: usize,
    /// Upstream stops whose IDs don't belong to the source
    pub skipped_upstream: usize,
}

/// Reconciles the existing table with a fresh upstream stop list for one source. Rows of other
/// sources pass through in their original order, followed by this source's rows, one per stop,
/// sorted by number. Running this again on the output with the same input changes nothing.
pub fn merge(
    existing: OverrideTable,
    upstream: &[UpstreamStop],
    bearings: &BearingLookup,
    source: &Source,
    sources: &Sources,
) -> MergeOutcome {
    let mut stats = MergeStats::default();
    let belongs = |id: &str| {
        !id.is_empty()
            && (source.is_legacy_id(id)
                || sources.owner_of(id).map(|s| s.id == source.id).unwrap_or(false))
    };

    let mut table = existing;
    let mut others = Vec::new();
    // Keyed by the canonical internal ID, so rows for the same stop under different namespaces
    // land together
    let mut groups: BTreeMap<String, Vec<StopRow>> = BTreeMap::new();
    for row in std::mem::take(&mut table.rows) {
        match row {
            Row::Malformed(_) => {
                stats.malformed += 1;
                others.push(row);
            }
            Row::Stop(stop) => {
                let id = table.id_of(&stop);
                if belongs(id) {
                    groups
                        .entry(to_internal_id(id, source))
                        .or_insert_with(Vec::new)
                        .push(stop);
                } else {
                    stats.passthrough += 1;
                    others.push(Row::Stop(stop));
                }
            }
        }
    }

    let columns = table.columns().clone();
    let mut merged = Vec::new();
    for (canonical, rows) in &mut groups {
        if rows.len() == 1 {
            stats.kept += 1;
        } else {
            stats.collapsed += 1;
            stats.absorbed += rows.len() - 1;
            if rows.len() > 2 {
                warn!("{} rows describe stop {canonical}; keeping one", rows.len());
            }
        }
        merged.push(reconcile(canonical, std::mem::take(rows), &columns, source));
    }

    let mut seen: BTreeSet<String> = groups.into_keys().collect();
    for stop in upstream {
        let canonical = to_internal_id(&stop.id, source);
        if !belongs(&canonical) {
            debug!("Upstream stop {} doesn't belong to {}", stop.id, source.id);
            stats.skipped_upstream += 1;
            continue;
        }
        if !seen.insert(canonical.clone()) {
            continue;
        }
        merged.push(new_row(&canonical, stop, bearings, &columns));
        stats.appended += 1;
    }

    // Ties (non-numeric IDs) fall back to the ID itself, so the order doesn't depend on whether
    // a row was appended or already present
    merged.sort_by_cached_key(|row| {
        let id = row.get(&columns, ID).unwrap_or("").to_string();
        (numeric_suffix(&id, source), id)
    });

    table.rows = others;
    table.rows.extend(merged.into_iter().map(Row::Stop));
    MergeOutcome { table, stats }
}

/// Picks one row to represent a stop. A row still tagged with a secondary namespace is assumed to
/// carry fresher names and coordinates, so it wins, but it only takes the rotation from the other
/// rows, and only when it has none.
fn reconcile(
    canonical: &str,
    mut rows: Vec<StopRow>,
    columns: &Columns,
    source: &Source,
) -> StopRow {
    let idx = rows
        .iter()
        .position(|row| source.is_legacy_id(row.get(columns, ID).unwrap_or("")))
        .unwrap_or(0);
    let mut survivor = rows.remove(idx);

    if is_blank(survivor.get(columns, ROTATION)) {
        if let Some(rotation) = rows
            .iter()
            .filter_map(|row| row.get(columns, ROTATION))
            .find(|x| !x.trim().is_empty())
        {
            survivor.set(columns, ROTATION, rotation.to_string());
        }
    }
    survivor.set(columns, ID, canonical.to_string());
    survivor
}

fn new_row(
    canonical: &str,
    stop: &UpstreamStop,
    bearings: &BearingLookup,
    columns: &Columns,
) -> StopRow {
    let mut row = StopRow::empty(columns);
    row.set(columns, ID, canonical.to_string());
    row.set(
        columns,
        ROTATION,
        bearings.get(canonical).unwrap_or(0).to_string(),
    );
    for name in columns.names() {
        let value = match name.as_str() {
            "lat" => stop.lat.map(|x| x.to_string()),
            "lon" => stop.lon.map(|x| x.to_string()),
            "name" => stop.name.clone(),
            x if x.ends_with("_override") => None,
            x => x
                .strip_prefix("name_")
                .and_then(|locale| stop.name_for(locale))
                .map(|x| x.to_string()),
        };
        if let Some(value) = value {
            row.set(columns, name, value);
        }
    }
    row
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|x| x.trim().is_empty()).unwrap_or(true)
}
