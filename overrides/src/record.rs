use std::collections::BTreeMap;

use serde::Serialize;

use ids::compass_degrees;

use crate::table::{Columns, OverrideTable, StopRow, ID, ROTATION};

/// A stop as the web client sees it, with manual overrides applied.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub id: String,
    /// Locale to name. A plain `name` column is stored under "default".
    pub names: BTreeMap<String, String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub bearing: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_target: Option<String>,
}

impl StopRecord {
    pub fn from_row(row: &StopRow, columns: &Columns) -> Self {
        let mut names = BTreeMap::new();
        for column in columns.names() {
            if column.ends_with("_override") {
                continue;
            }
            let locale = if column == "name" {
                "default"
            } else if let Some(locale) = column.strip_prefix("name_") {
                locale
            } else {
                continue;
            };
            if let Some(name) = resolve(row, columns, column) {
                names.insert(locale.to_string(), name.to_string());
            }
        }

        let number = |field: &str| resolve(row, columns, field).and_then(|x| x.parse::<f64>().ok());
        let text = |field: &str| resolve(row, columns, field).map(|x| x.to_string());
        Self {
            // The ID itself can't be overridden
            id: row.get(columns, ID).unwrap_or("").to_string(),
            names,
            lat: number("lat"),
            lon: number("lon"),
            bearing: number(ROTATION).map(compass_degrees).unwrap_or(0),
            merge_parent: text("mergeParent"),
            hub_target: text("hubTarget"),
        }
    }
}

/// `<field>_override` wins when it's filled out.
fn resolve<'a>(row: &'a StopRow, columns: &Columns, field: &str) -> Option<&'a str> {
    let filled = |x: &&str| !x.trim().is_empty();
    row.get(columns, &format!("{field}_override"))
        .filter(filled)
        .or_else(|| row.get(columns, field).filter(filled))
}

/// Every well-formed row, resolved.
pub fn export_stops(table: &OverrideTable) -> Vec<StopRecord> {
    table
        .stop_rows()
        .map(|row| StopRecord::from_row(row, table.columns()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_when_filled() {
        let table = OverrideTable::load(
            "id,name_en,name_en_override,name_ka,lat,lat_override,lon,\
             rotation,rotation_override,mergeParent,hubTarget\n\
             r1,Bus station,Central Bus Station,ავტოსადგური,41.5,,45.1,90,271.8,,r9\n\
             r2,Market,  ,,x,41.6,45.2,,,r1,\n\
             broken\n"
                .as_bytes(),
        )
        .unwrap();
        let stops = export_stops(&table);
        assert_eq!(stops.len(), 2);

        assert_eq!(stops[0].names["en"], "Central Bus Station");
        assert_eq!(stops[0].names["ka"], "ავტოსადგური");
        assert_eq!(stops[0].lat, Some(41.5));
        assert_eq!(stops[0].bearing, 272);
        assert_eq!(stops[0].merge_parent, None);
        assert_eq!(stops[0].hub_target.as_deref(), Some("r9"));

        assert_eq!(stops[1].names["en"], "Market");
        assert!(!stops[1].names.contains_key("ka"));
        assert_eq!(stops[1].lat, Some(41.6));
        assert_eq!(stops[1].bearing, 0);
        assert_eq!(stops[1].merge_parent.as_deref(), Some("r1"));
    }

    #[test]
    fn serializes_camel_case() {
        let input = "id,name,rotation,mergeParent\n7,Seven,5,3\n";
        let table = OverrideTable::load(input.as_bytes()).unwrap();
        let json = serde_json::to_value(export_stops(&table)).unwrap();
        assert_eq!(json[0]["names"]["default"], "Seven");
        assert_eq!(json[0]["mergeParent"], "3");
        assert!(json[0].get("hubTarget").is_none());
    }
}
