use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A stop as the transit API returns it, still in the API's own ID namespace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamStop {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Locale to name, for feeds fetched in more than one language
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl UpstreamStop {
    pub fn name_for(&self, locale: &str) -> Option<&str> {
        self.names
            .get(locale)
            .map(|x| x.as_str())
            .or(self.name.as_deref())
    }
}

/// Only the ID is interpreted; everything else passes through.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRoute {
    pub id: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One route pattern's stops in travel order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamPattern {
    #[serde(default)]
    pub route_id: Option<String>,
    pub stops: Vec<UpstreamStop>,
}

pub fn load_stops<R: std::io::Read>(reader: R) -> Result<Vec<UpstreamStop>> {
    let stops: Vec<UpstreamStop> = serde_json::from_reader(reader)?;
    let missing = stops
        .iter()
        .filter(|s| {
            (s.name.is_none() && s.names.is_empty()) || s.lat.is_none() || s.lon.is_none()
        })
        .count();
    if missing > 0 {
        warn!("{missing} upstream stops are missing a name or coordinates");
    }
    Ok(stops)
}

pub fn load_patterns<R: std::io::Read>(reader: R) -> Result<Vec<UpstreamPattern>> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_fine() {
        let json = r#"[
            {"id": "1:5", "name": "Freedom Square", "lat": 41.69, "lon": 44.80},
            {"id": "2:6"}
        ]"#;
        let stops = load_stops(json.as_bytes()).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[1].name, None);
        assert_eq!(stops[1].lat, None);
    }

    #[test]
    fn locale_names_fall_back() {
        let json = r#"{
            "id": "1:5",
            "name": "Freedom Square",
            "names": {"ka": "თავისუფლების მოედანი"}
        }"#;
        let stop: UpstreamStop = serde_json::from_str(json).unwrap();
        assert_eq!(stop.name_for("ka"), Some("თავისუფლების მოედანი"));
        assert_eq!(stop.name_for("en"), Some("Freedom Square"));
    }

    #[test]
    fn route_fields_pass_through() {
        let json = r#"[{"id": "1:R826", "shortName": "826", "color": "00B38B"}]"#;
        let routes: Vec<UpstreamRoute> = serde_json::from_str(json).unwrap();
        assert_eq!(routes[0].extra["shortName"], "826");
        let back = serde_json::to_value(&routes[0]).unwrap();
        assert_eq!(back["color"], "00B38B");
    }
}
