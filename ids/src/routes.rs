use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{to_api_id, to_internal_id, RouteScheduleKey, ScheduleKeys, Source, UpstreamRoute};

/// The static fallback file for routes: the route list plus schedules and polylines keyed by
/// route schedule key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub routes: Vec<UpstreamRoute>,
    #[serde(default)]
    pub schedules: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub polylines: BTreeMap<String, serde_json::Value>,
}

/// The result of rewriting a snapshot. Keys that weren't valid route schedule keys, or that
/// collided with an earlier key once rewritten, are dropped and listed here.
pub struct RewrittenSnapshot {
    pub snapshot: RouteSnapshot,
    pub dropped_keys: Vec<String>,
}

/// Rewrites every route ID and schedule/polyline key into the internal namespace.
pub fn normalize_snapshot(snapshot: RouteSnapshot, source: &Source) -> RewrittenSnapshot {
    rewrite(snapshot, |id| to_internal_id(id, source))
}

/// Rewrites everything back into the source's primary API namespace.
pub fn restore_snapshot(snapshot: RouteSnapshot, source: &Source) -> RewrittenSnapshot {
    rewrite(snapshot, |id| to_api_id(id, source))
}

fn rewrite<F: Fn(&str) -> String>(snapshot: RouteSnapshot, f: F) -> RewrittenSnapshot {
    let routes = snapshot
        .routes
        .into_iter()
        .map(|mut route| {
            route.id = f(&route.id);
            route
        })
        .collect();
    let mut dropped_keys = Vec::new();
    let schedules = rewrite_keys(snapshot.schedules, &f, "schedules", &mut dropped_keys);
    let polylines = rewrite_keys(snapshot.polylines, &f, "polylines", &mut dropped_keys);
    RewrittenSnapshot {
        snapshot: RouteSnapshot {
            routes,
            schedules,
            polylines,
        },
        dropped_keys,
    }
}

fn rewrite_keys<F: Fn(&str) -> String>(
    input: BTreeMap<String, serde_json::Value>,
    f: &F,
    what: &str,
    dropped_keys: &mut Vec<String>,
) -> BTreeMap<String, serde_json::Value> {
    let mut keys = ScheduleKeys::new();
    let mut output = BTreeMap::new();
    for (raw_key, value) in input {
        let key = match RouteScheduleKey::parse(&raw_key) {
            Ok(parsed) => RouteScheduleKey::new(&f(&parsed.route), &parsed.pattern_suffix),
            Err(err) => {
                warn!("{what}: dropping {raw_key}: {err}");
                dropped_keys.push(raw_key);
                continue;
            }
        };
        if let Err(err) = keys.insert_new(key.clone()) {
            warn!("{what}: dropping {raw_key}, keeping the first value: {err}");
            dropped_keys.push(raw_key);
            continue;
        }
        output.insert(key.to_string(), value);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sources;

    fn snapshot() -> RouteSnapshot {
        serde_json::from_str(
            r#"{
                "routes": [{"id": "1:R826", "shortName": "826"}, {"id": "2:R14"}],
                "schedules": {"1:R826_1_9-2": [1, 2], "2:R14_0_1": []},
                "polylines": {"1:R826_1_9-2": "abc"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn normalize() {
        let sources = Sources::builtin();
        let rustavi = sources.get("rustavi").unwrap();
        let result = normalize_snapshot(snapshot(), rustavi);
        assert!(result.dropped_keys.is_empty());
        let out = result.snapshot;
        assert_eq!(out.routes[0].id, "rR826");
        assert_eq!(out.routes[0].extra["shortName"], "826");
        assert_eq!(out.routes[1].id, "rR14");
        assert!(out.schedules.contains_key("rR826_1_9-2"));
        assert!(out.schedules.contains_key("rR14_0_1"));
        assert_eq!(out.polylines["rR826_1_9-2"], "abc");

        // Doing it again changes nothing
        assert_eq!(normalize_snapshot(out.clone(), rustavi).snapshot, out);
    }

    #[test]
    fn restore() {
        let sources = Sources::builtin();
        let rustavi = sources.get("rustavi").unwrap();
        let normalized = normalize_snapshot(snapshot(), rustavi).snapshot;
        let out = restore_snapshot(normalized, rustavi).snapshot;
        assert_eq!(out.routes[1].id, "1:R14");
        assert!(out.schedules.contains_key("1:R14_0_1"));
    }

    #[test]
    fn colliding_keys_keep_first() {
        let sources = Sources::builtin();
        let rustavi = sources.get("rustavi").unwrap();
        let mut input = snapshot();
        input
            .schedules
            .insert("2:R826_1_9-2".to_string(), serde_json::json!([3]));
        let result = normalize_snapshot(input, rustavi);
        // BTreeMap order puts 1:R826 first
        assert_eq!(result.dropped_keys, vec!["2:R826_1_9-2".to_string()]);
        let out = result.snapshot;
        assert_eq!(out.schedules["rR826_1_9-2"], serde_json::json!([1, 2]));
        assert_eq!(out.schedules.len(), 2);
    }

    #[test]
    fn raw_suffixes_made_safe() {
        let sources = Sources::builtin();
        let rustavi = sources.get("rustavi").unwrap();
        let mut input = snapshot();
        input.polylines.clear();
        input
            .polylines
            .insert("1:R14_0:1,2".to_string(), serde_json::json!("xyz"));
        // Sanitized, this lands on the same key as the one above
        input
            .polylines
            .insert("2:R14_0_1-2".to_string(), serde_json::json!("dup"));
        input
            .polylines
            .insert("nounderscore".to_string(), serde_json::json!("bad"));
        let result = normalize_snapshot(input, rustavi);
        assert_eq!(result.snapshot.polylines.len(), 1);
        assert_eq!(result.snapshot.polylines["rR14_0_1-2"], "xyz");
        assert_eq!(
            result.dropped_keys,
            vec!["2:R14_0_1-2".to_string(), "nounderscore".to_string()]
        );
    }
}
