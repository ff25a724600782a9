use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{to_internal_id, Source, UpstreamPattern};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// The initial great-circle compass bearing from one point towards another, in [0, 360).
pub fn initial_bearing(from: LatLon, to: LatLon) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let dlon = (to.lon - from.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Rounds to a whole degree in 0..=359, the way stop icons are rotated.
pub fn compass_degrees(bearing: f64) -> u16 {
    if !bearing.is_finite() {
        return 0;
    }
    (bearing.round().rem_euclid(360.0)) as u16
}

/// Internal stop ID to bearing in degrees.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BearingLookup(pub BTreeMap<String, f64>);

impl BearingLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load_path(path: &str) -> Result<Self> {
        Self::load(std::io::BufReader::new(fs_err::File::open(path)?))
    }

    pub fn get(&self, internal_id: &str) -> Option<u16> {
        self.0.get(internal_id).map(|x| compass_degrees(*x))
    }

    pub fn insert(&mut self, internal_id: String, bearing: f64) {
        self.0.insert(internal_id, bearing);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Each stop faces the next stop along the pattern. The last stop keeps the direction it was
    /// approached from. When a stop appears in several patterns, the first one wins.
    pub fn from_patterns(patterns: &[UpstreamPattern], source: &Source) -> Self {
        let mut lookup = Self::new();
        for pattern in patterns {
            let located: Vec<(String, LatLon)> = pattern
                .stops
                .iter()
                .filter_map(|s| match (s.lat, s.lon) {
                    (Some(lat), Some(lon)) => {
                Some((to_internal_id(&s.id, source), LatLon::new(lat, lon)))
            }
                    _ => None,
                })
                .collect();
            if located.len() < 2 {
                continue;
            }

            for (idx, (id, pos)) in located.iter().enumerate() {
                if lookup.0.contains_key(id) {
                    continue;
                }
                let bearing = if let Some((_, next)) = located.get(idx + 1) {
                    initial_bearing(*pos, *next)
                } else {
                    initial_bearing(located[idx - 1].1, *pos)
                };
                lookup.insert(id.clone(), bearing);
            }
        }
        lookup
    }
}
