use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::normalize::CellNormalizer;
use super::{CountryCode, CountryName, Destination};

/// Read-only view of the country reference table.
pub trait AliasLookup {
    fn codes(&self) -> Vec<CountryCode>;
    fn aliases_for(&self, code: &CountryCode) -> BTreeSet<String>;
}

/// Alias table as stored on disk: code -> known display names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<CountryCode, BTreeSet<String>>,
}

impl AliasTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    #[cfg(test)]
    pub fn insert<I, S>(&mut self, code: CountryCode, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(code)
            .or_default()
            .extend(aliases.into_iter().map(Into::into));
    }

    pub fn code_count(&self) -> usize {
        self.entries.len()
    }

    pub fn alias_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

impl AliasLookup for AliasTable {
    fn codes(&self) -> Vec<CountryCode> {
        self.entries.keys().cloned().collect()
    }

    fn aliases_for(&self, code: &CountryCode) -> BTreeSet<String> {
        self.entries.get(code).cloned().unwrap_or_default()
    }
}

/// Reverse index from normalised alias to code, built once per lookup table.
pub struct CountryResolver {
    index: HashMap<String, CountryCode>,
    normalizer: CellNormalizer,
}

impl CountryResolver {
    pub fn new(lookup: &dyn AliasLookup) -> Result<Self> {
        let normalizer = CellNormalizer::new()?;
        let mut codes = lookup.codes();
        codes.sort();

        let mut index = HashMap::new();
        for code in codes {
            for alias in lookup.aliases_for(&code) {
                let key = alias_key(&normalizer, &alias);
                if key.is_empty() {
                    continue;
                }
                index.entry(key).or_insert_with(|| code.clone());
            }
        }

        Ok(Self { index, normalizer })
    }

    /// Never fails: names without an alias match come back as `Unmapped`
    /// carrying the cleaned display name.
    pub fn resolve(&self, name: &CountryName) -> Destination {
        match self.index.get(&alias_key(&self.normalizer, name.as_str())) {
            Some(code) => Destination::Resolved(code.clone()),
            None => Destination::Unmapped(CountryName::new(
                self.normalizer.strip_artifacts(name.as_str()),
            )),
        }
    }

    pub fn alias_count(&self) -> usize {
        self.index.len()
    }
}

fn alias_key(normalizer: &CellNormalizer, alias: &str) -> String {
    normalizer.strip_artifacts(alias).to_lowercase()
}
