#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod bearing;
mod normalize;
mod routes;
mod schedule_key;
mod source;
mod upstream;

pub use bearing::{compass_degrees, initial_bearing, BearingLookup, LatLon};
pub use normalize::{numeric_suffix, to_api_id, to_internal_id};
pub use routes::{normalize_snapshot, restore_snapshot, RewrittenSnapshot, RouteSnapshot};
pub use schedule_key::{safe_pattern_suffix, RouteScheduleKey, ScheduleKeys};
pub use source::{Source, SourceID, Sources};
pub use upstream::{load_patterns, load_stops, UpstreamPattern, UpstreamRoute, UpstreamStop};
