#[macro_use]
extern crate log;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use serde::Serialize;
use structopt::StructOpt;

use ids::{BearingLookup, Source, Sources};
use overrides::OverrideTable;

#[derive(StructOpt)]
#[structopt(
    name = "transit_tools",
    about = "Maintains the static stop and route data behind the transit map"
)]
pub enum Command {
    /// Reconcile the override table with a freshly fetched stop list for one source
    Merge {
        /// The override table CSV, rewritten in place
        #[structopt(long)]
        table: String,
        /// A JSON array of stops, as returned by the transit API
        #[structopt(long)]
        stops: String,
        /// A JSON object from internal stop ID to bearing, used for new stops
        #[structopt(long)]
        bearings: Option<String>,
        #[structopt(flatten)]
        source: SourceArgs,
        /// Report what would change without writing anything
        #[structopt(long)]
        dry_run: bool,
    },
    /// Fill in stop rotations from a bearing lookup
    UpdateBearings {
        #[structopt(long)]
        table: String,
        #[structopt(long)]
        bearings: String,
        /// Replace rotations that are already set. Manual overrides are still kept.
        #[structopt(long)]
        overwrite: bool,
    },
    /// Calculate stop bearings from route patterns
    ComputeBearings {
        /// A JSON array of patterns, each with stops in travel order
        #[structopt(long)]
        patterns: String,
        #[structopt(flatten)]
        source: SourceArgs,
        #[structopt(long)]
        output: String,
    },
    /// Rewrite the IDs in a route snapshot into the internal namespace
    NormalizeRoutes {
        #[structopt(long)]
        input: String,
        #[structopt(long)]
        output: String,
        #[structopt(flatten)]
        source: SourceArgs,
        /// Go the other way, back to API IDs
        #[structopt(long)]
        restore: bool,
    },
    /// Print the internal ID for an API ID
    ToInternal {
        id: String,
        #[structopt(flatten)]
        source: SourceArgs,
    },
    /// Print the API ID for an internal ID
    ToApi {
        id: String,
        #[structopt(flatten)]
        source: SourceArgs,
    },
    /// Write the resolved stops in the override table as JSON
    ExportStops {
        #[structopt(long)]
        table: String,
        #[structopt(long)]
        output: String,
    },
}

#[derive(StructOpt)]
pub struct SourceArgs {
    /// The source ID, like tbilisi or rustavi
    #[structopt(long)]
    source: String,
    /// A JSON file configuring sources. The built-in ones are used otherwise.
    #[structopt(long)]
    sources: Option<String>,
}

impl SourceArgs {
    fn load(&self) -> Result<(Sources, Source)> {
        let sources = match self.sources {
            Some(ref path) => Sources::load_path(path)?,
            None => Sources::builtin(),
        };
        let source = sources.get(&self.source)?.clone();
        Ok((sources, source))
    }
}

impl Command {
    pub fn run(self, timer: &mut Timer) -> Result<()> {
        match self {
            Command::Merge {
                table,
                stops,
                bearings,
                source,
                dry_run,
            } => {
                let (sources, source) = source.load()?;

                timer.start("load inputs");
                let existing = OverrideTable::load_path(&table)?;
                let upstream =
                    ids::load_stops(std::io::BufReader::new(fs_err::File::open(&stops)?))?;
                let bearings = match bearings {
                    Some(path) => BearingLookup::load_path(&path)?,
                    None => BearingLookup::new(),
                };
                timer.stop("load inputs");
                info!(
                    "Merging {} upstream stops into {} rows",
                    prettyprint_usize(upstream.len()),
                    prettyprint_usize(existing.rows.len())
                );

                timer.start("merge");
                let outcome = overrides::merge(existing, &upstream, &bearings, &source, &sources);
                timer.stop("merge");
                info!("{:?}", outcome.stats);

                if dry_run {
                    info!("Dry run, not writing {table}");
                    return Ok(());
                }
                let rows = outcome.table.save(&table)?;
                info!("Wrote {} rows to {table}", prettyprint_usize(rows));
            }
            Command::UpdateBearings {
                table,
                bearings,
                overwrite,
            } => {
                let mut existing = OverrideTable::load_path(&table)?;
                let lookup = BearingLookup::load_path(&bearings)?;
                let changed = overrides::apply_bearings(&mut existing, &lookup, overwrite);
                if changed == 0 {
                    info!("No rotations changed, leaving {table} alone");
                    return Ok(());
                }
                let rows = existing.save(&table)?;
                info!("Wrote {} rows to {table}", prettyprint_usize(rows));
            }
            Command::ComputeBearings {
                patterns,
                source,
                output,
            } => {
                let (_, source) = source.load()?;
                let patterns =
                    ids::load_patterns(std::io::BufReader::new(fs_err::File::open(&patterns)?))?;
                let lookup = BearingLookup::from_patterns(&patterns, &source);
                info!(
                    "Calculated bearings for {} stops from {} patterns",
                    prettyprint_usize(lookup.len()),
                    prettyprint_usize(patterns.len())
                );
                write_json(&output, &lookup)?;
            }
            Command::NormalizeRoutes {
                input,
                output,
                source,
                restore,
            } => {
                let (_, source) = source.load()?;
                let snapshot: ids::RouteSnapshot =
                    serde_json::from_reader(std::io::BufReader::new(fs_err::File::open(&input)?))?;
                let result = if restore {
                    ids::restore_snapshot(snapshot, &source)
                } else {
                    ids::normalize_snapshot(snapshot, &source)
                };
                if !result.dropped_keys.is_empty() {
                    warn!(
                        "Dropped {} schedule/polyline keys",
                        prettyprint_usize(result.dropped_keys.len())
                    );
                }
                let snapshot = result.snapshot;
                info!(
                    "{} routes, {} schedules, {} polylines",
                    prettyprint_usize(snapshot.routes.len()),
                    prettyprint_usize(snapshot.schedules.len()),
                    prettyprint_usize(snapshot.polylines.len())
                );
                write_json(&output, &snapshot)?;
            }
            Command::ToInternal { id, source } => {
                let (_, source) = source.load()?;
                println!("{}", ids::to_internal_id(&id, &source));
            }
            Command::ToApi { id, source } => {
                let (_, source) = source.load()?;
                println!("{}", ids::to_api_id(&id, &source));
            }
            Command::ExportStops { table, output } => {
                let table = OverrideTable::load_path(&table)?;
                let stops = overrides::export_stops(&table);
                info!("Exporting {} stops", prettyprint_usize(stops.len()));
                write_json(&output, &stops)?;
            }
        }
        Ok(())
    }
}

/// Writes next to the destination first, so readers never see a partial file.
fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let tmp_path = format!("{path}.tmp");
    fs_err::write(&tmp_path, serde_json::to_string_pretty(value)?)?;
    fs_err::rename(&tmp_path, path)?;
    Ok(())
}

pub fn run() -> Result<()> {
    abstutil::logger::setup();
    let command = Command::from_iter(abstutil::cli_args());
    let mut timer = Timer::new("transit_tools");
    command.run(&mut timer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("transit_tools-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name).to_string_lossy().into_owned()
    }

    fn parse(args: &[&str]) -> Command {
        Command::from_iter_safe(std::iter::once("transit_tools").chain(args.iter().cloned()))
            .unwrap()
    }

    #[test]
    fn merge_twice_writes_the_same_table() {
        let table = temp_path("stops.csv");
        let stops = temp_path("stops.json");
        std::fs::write(
            &table,
            "id,name_en,lat,lon,rotation,rotation_override\n\
             811,Station Square,41.72,44.79,90,\n\
             r123,Old,41.5,45.0,45,\n\
             2:123,Fresh,41.51,45.01,,\n",
        )
        .unwrap();
        std::fs::write(
            &stops,
            r#"[
                {"id": "2:123", "name": "Fresh"},
                {"id": "1:4", "name": "Four", "lat": 41.4, "lon": 45.2}
            ]"#,
        )
        .unwrap();

        let args = [
            "merge",
            "--table",
            table.as_str(),
            "--stops",
            stops.as_str(),
            "--source",
            "rustavi",
        ];
        parse(&args).run(&mut Timer::new("test")).unwrap();
        let first = std::fs::read_to_string(&table).unwrap();
        assert_eq!(
            first,
            "id,name_en,lat,lon,rotation,rotation_override\n\
             811,Station Square,41.72,44.79,90,\n\
             r4,Four,41.4,45.2,0,\n\
             r123,Fresh,41.51,45.01,45,\n"
        );

        parse(&args).run(&mut Timer::new("test")).unwrap();
        assert_eq!(std::fs::read_to_string(&table).unwrap(), first);
    }

    #[test]
    fn missing_rotation_column_leaves_table_alone() {
        let table = temp_path("no_rotation.csv");
        let stops = temp_path("no_rotation.json");
        let contents = "id,name_en\n811,Station Square\n";
        std::fs::write(&table, contents).unwrap();
        std::fs::write(&stops, "[]").unwrap();

        let result = parse(&[
            "merge",
            "--table",
            table.as_str(),
            "--stops",
            stops.as_str(),
            "--source",
            "tbilisi",
        ])
        .run(&mut Timer::new("test"));
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&table).unwrap(), contents);
    }

    #[test]
    fn unknown_source() {
        let result = parse(&["to-api", "r1", "--source", "batumi"]).run(&mut Timer::new("test"));
        assert!(result.is_err());
    }
}
