#[macro_use]
extern crate log;

mod bearings;
mod merge;
mod record;
mod table;

pub use bearings::apply_bearings;
pub use merge::{merge, MergeOutcome, MergeStats};
pub use record::{export_stops, StopRecord};
pub use table::{Columns, OverrideTable, Row, StopRow, TableError, ID, ROTATION};
