use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Identifies the schedule and polyline of one pattern of one route, like `rR826_1_9-2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteScheduleKey {
    pub route: String,
    pub pattern_suffix: String,
}

impl RouteScheduleKey {
    /// The raw pattern suffix comes from upstream and may contain characters that don't work in
    /// map keys.
    pub fn new(internal_route_id: &str, raw_pattern_suffix: &str) -> Self {
        Self {
            route: internal_route_id.to_string(),
            pattern_suffix: safe_pattern_suffix(raw_pattern_suffix),
        }
    }

    pub fn parse(key: &str) -> Result<Self> {
        match key.split_once('_') {
            Some((route, suffix)) if !route.is_empty() && !suffix.is_empty() => Ok(Self {
                route: route.to_string(),
                pattern_suffix: suffix.to_string(),
            }),
            _ => bail!("{key} isn't a route schedule key"),
        }
    }
}

impl std::fmt::Display for RouteScheduleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}_{}", self.route, self.pattern_suffix)
    }
}

pub fn safe_pattern_suffix(raw: &str) -> String {
    raw.replace(':', "_").replace(',', "-")
}

/// The keys produced during one fetch pass. Each route and pattern must only appear once.
#[derive(Default)]
pub struct ScheduleKeys {
    seen: BTreeSet<RouteScheduleKey>,
}

impl ScheduleKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_new(&mut self, key: RouteScheduleKey) -> Result<()> {
        if self.seen.contains(&key) {
            bail!("ScheduleKeys::insert_new has duplicate input for {key}");
        }
        self.seen.insert(key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
