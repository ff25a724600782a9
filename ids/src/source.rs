use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceID(pub String);

impl std::fmt::Display for SourceID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One upstream transit data provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceID,
    /// Prepended to produce internal IDs. Empty for the default source.
    pub internal_prefix: String,
    /// Upstream namespace prefixes this source may emit, like "1:". The first one is canonical.
    /// Rules are evaluated in this order; the first match wins.
    pub namespaces: Vec<String>,
}

impl Source {
    pub fn new(id: &str, internal_prefix: &str, namespaces: &[&str]) -> Self {
        Self {
            id: SourceID(id.to_string()),
            internal_prefix: internal_prefix.to_string(),
            namespaces: namespaces.iter().map(|x| x.to_string()).collect(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.internal_prefix.is_empty()
    }

    pub fn primary_namespace(&self) -> &str {
        // Sources::new rejects sources without any namespace
        &self.namespaces[0]
    }

    /// Finds the first namespace rule matching this ID, returning the remainder. A prefix
    /// leaving nothing behind doesn't count.
    pub fn strip_namespace<'a>(&self, id: &'a str) -> Option<&'a str> {
        self.namespaces
            .iter()
            .filter_map(|ns| id.strip_prefix(ns.as_str()))
            .find(|rest| !rest.is_empty())
    }

    /// True if the ID is still tagged with one of the secondary namespaces. Old table rows were
    /// sometimes written this way.
    pub fn is_legacy_id(&self, id: &str) -> bool {
        self.namespaces
            .iter()
            .skip(1)
            .any(|ns| id.len() > ns.len() && id.starts_with(ns.as_str()))
    }

    fn validate(&self) -> Result<()> {
        if self.id.0.is_empty() {
            bail!("A source has an empty id");
        }
        if self.namespaces.is_empty() {
            bail!("Source {} has no namespace prefixes", self.id);
        }
        for ns in &self.namespaces {
            if !ns.ends_with(':') || ns.len() < 2 {
                bail!("Source {} has bad namespace prefix {:?}", self.id, ns);
            }
        }
        if self.internal_prefix.contains(':') || self.internal_prefix.contains('_') {
            bail!(
                "Source {} has internal prefix {:?}, which can't contain : or _",
                self.id,
                self.internal_prefix
            );
        }
        Ok(())
    }
}

/// Every configured source. Immutable once built, and passed explicitly to whatever needs it.
#[derive(Clone, Debug)]
pub struct Sources {
    sources: Vec<Source>,
}

impl Sources {
    pub fn new(sources: Vec<Source>) -> Result<Self> {
        let mut ids = BTreeSet::new();
        let mut prefixes = BTreeSet::new();
        let mut defaults = 0;
        for source in &sources {
            source.validate()?;
            if !ids.insert(source.id.clone()) {
                bail!("Duplicate source {}", source.id);
            }
            if source.is_default() {
                defaults += 1;
            } else if !prefixes.insert(source.internal_prefix.clone()) {
                bail!(
                    "Internal prefix {:?} is used by more than one source",
                    source.internal_prefix
                );
            }
        }
        if defaults != 1 {
            bail!("Exactly one source needs an empty internal prefix, but {defaults} do");
        }
        Ok(Self { sources })
    }

    /// The two providers currently deployed.
    pub fn builtin() -> Self {
        Self {
            sources: vec![
                Source::new("tbilisi", "", &["1:"]),
                Source::new("rustavi", "r", &["1:", "2:"]),
            ],
        }
    }

    /// Reads a JSON array of sources.
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        let sources: Vec<Source> = serde_json::from_reader(reader)?;
        Self::new(sources)
    }

    pub fn load_path(path: &str) -> Result<Self> {
        Self::load(std::io::BufReader::new(fs_err::File::open(path)?))
    }

    pub fn get(&self, id: &str) -> Result<&Source> {
        match self.sources.iter().find(|s| s.id.0 == id) {
            Some(x) => Ok(x),
            None => bail!("Unknown source {id}"),
        }
    }

    pub fn default_source(&self) -> &Source {
        self.sources
            .iter()
            .find(|s| s.is_default())
            .expect("Sources always has a default")
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    /// Which source does an internal ID belong to? IDs still carrying any upstream namespace
    /// aren't internal, so nobody owns them.
    pub fn owner_of(&self, internal_id: &str) -> Option<&Source> {
        if self
            .sources
            .iter()
            .any(|s| s.strip_namespace(internal_id).is_some())
        {
            return None;
        }
        self.sources
            .iter()
            .filter(|s| {
                !s.is_default()
                    && internal_id.len() > s.internal_prefix.len()
                    && internal_id.starts_with(s.internal_prefix.as_str())
            })
            .max_by_key(|s| s.internal_prefix.len())
            .or_else(|| Some(self.default_source()))
    }
}
