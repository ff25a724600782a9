use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

pub const ID: &str = "id";
pub const ROTATION: &str = "rotation";

/// Structural problems that make a table unusable. Anything wrong with a single row is logged and
/// worked around instead.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("the override table has no header row")]
    MissingHeader,
    #[error("the override table has no {0:?} column")]
    MissingColumn(String),
}

/// Resolves column names to positions. Column sets vary by deployment, so nothing is hardcoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Columns {
    names: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl Columns {
    pub fn new(names: Vec<String>) -> Self {
        let mut index = BTreeMap::new();
        for (idx, name) in names.iter().enumerate() {
            // If a name is repeated, the first one is used
            index.entry(name.clone()).or_insert(idx);
        }
        Self { names, index }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<usize, TableError> {
        self.get(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row with exactly one value per column.
#[derive(Clone, Debug, PartialEq)]
pub struct StopRow {
    fields: Vec<String>,
}

impl StopRow {
    pub fn empty(columns: &Columns) -> Self {
        Self {
            fields: vec![String::new(); columns.len()],
        }
    }

    pub fn get<'a>(&'a self, columns: &Columns, name: &str) -> Option<&'a str> {
        columns.get(name).map(|idx| self.fields[idx].as_str())
    }

    /// Returns false if there's no such column.
    pub fn set(&mut self, columns: &Columns, name: &str, value: String) -> bool {
        match columns.get(name) {
            Some(idx) => {
                self.fields[idx] = value;
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Row {
    Stop(StopRow),
    /// The field count didn't match the header. Kept exactly as read.
    Malformed(Vec<String>),
}

impl Row {
    pub fn fields(&self) -> &[String] {
        match self {
            Row::Stop(row) => row.fields(),
            Row::Malformed(fields) => fields,
        }
    }
}

/// The persisted table of stops and their manual overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct OverrideTable {
    columns: Columns,
    pub rows: Vec<Row>,
}

impl OverrideTable {
    /// Fails if the mandatory `id` or `rotation` columns are missing.
    pub fn new(headers: Vec<String>) -> Result<Self> {
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(TableError::MissingHeader.into());
        }
        let columns = Columns::new(headers);
        columns.require(ID)?;
        columns.require(ROTATION)?;
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Wraps raw fields as a row, classifying it by field count.
    pub fn make_row(&self, fields: Vec<String>) -> Row {
        if fields.len() == self.columns.len() {
            Row::Stop(StopRow { fields })
        } else {
            Row::Malformed(fields)
        }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn id_of<'a>(&self, row: &'a StopRow) -> &'a str {
        // The column's existence is checked in new
        row.get(&self.columns, ID).unwrap_or("")
    }

    pub fn stop_rows(&self) -> impl Iterator<Item = &StopRow> {
        self.rows.iter().filter_map(|row| match row {
            Row::Stop(row) => Some(row),
            Row::Malformed(_) => None,
        })
    }

    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(|x| x.to_string()).collect();
        let mut table = Self::new(headers)?;

        let mut record = StringRecord::new();
        while reader.read_record(&mut record)? {
            let fields: Vec<String> = record.iter().map(|x| x.to_string()).collect();
            let row = table.make_row(fields);
            if let Row::Malformed(ref fields) = row {
                warn!(
                    "Line {}: expected {} fields, found {}. Keeping the row untouched.",
                    record.position().map(|p| p.line()).unwrap_or(0),
                    table.columns.len(),
                    fields.len()
                );
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn load_path(path: &str) -> Result<Self> {
        Self::load(std::io::BufReader::new(fs_err::File::open(path)?))
    }

    pub fn write<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);
        writer.write_record(self.columns.names())?;
        for row in &self.rows {
            writer.write_record(row.fields())?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(String::from_utf8(out)?)
    }

    /// Replaces the file at `path` with this table, returning the number of data rows. The table
    /// is written to a temporary file next to the destination first, so a failure leaves the old
    /// file intact.
    pub fn save(&self, path: &str) -> Result<usize> {
        let tmp_path = format!("{path}.tmp");
        let result = (|| -> Result<()> {
            let mut file = std::io::BufWriter::new(fs_err::File::create(&tmp_path)?);
            self.write(&mut file)?;
            file.flush()?;
            file.get_ref().sync_all()?;
            Ok(())
        })();
        if let Err(err) = result {
            let _ = fs_err::remove_file(&tmp_path);
            return Err(err);
        }
        fs_err::rename(&tmp_path, path)?;
        Ok(self.rows.len())
    }
}

#[cfg(test)]
pub(crate) fn temp_path(name: &str) -> String {
    let dir = std::env::temp_dir().join(format!("overrides-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "id,name_en,lat,lon,rotation,rotation_override\n\
                         811,Station Square,41.72,44.79,90,\n\
                         812,broken row\n\
                         r5,\"Rustavi, Center\",41.54,45.0,,180\n";

    #[test]
    fn columns_resolved_by_name() {
        let table = OverrideTable::load(INPUT.as_bytes()).unwrap();
        assert_eq!(table.columns().get("rotation"), Some(4));
        assert_eq!(table.columns().get("hubTarget"), None);

        let rows: Vec<&StopRow> = table.stop_rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get(table.columns(), "name_en"), Some("Rustavi, Center"));
        assert_eq!(rows[1].get(table.columns(), "rotation_override"), Some("180"));
    }

    #[test]
    fn short_rows_kept_verbatim() {
        let table = OverrideTable::load(INPUT.as_bytes()).unwrap();
        assert_eq!(
            table.rows[1],
            Row::Malformed(vec!["812".to_string(), "broken row".to_string()])
        );
        assert_eq!(table.to_csv_string().unwrap(), INPUT);
    }

    #[test]
    fn mandatory_columns() {
        let err = OverrideTable::load("id,name_en\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::MissingColumn(col)) if col == "rotation"
        ));

        let err = OverrideTable::load("name,rotation\nx,1\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::MissingColumn(col)) if col == "id"
        ));

        let err = OverrideTable::load("".as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::MissingHeader)
        ));
    }

    #[test]
    fn save_replaces_file() {
        let path = temp_path("save_replaces_file.csv");
        std::fs::write(&path, "old contents\n").unwrap();

        let table = OverrideTable::load(INPUT.as_bytes()).unwrap();
        assert_eq!(table.save(&path).unwrap(), 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), INPUT);
        assert!(!std::path::Path::new(&format!("{path}.tmp")).exists());
    }
}
