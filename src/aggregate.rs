//! Collects per-address results and the union of all field names seen in them.
//!
//! Different addresses may come back with different fields, so the report schema is only known
//! once every batch has been folded in.

use std::collections::{BTreeSet, HashMap};

use log::trace;
use serde_json::{Map, Value};

use crate::address::Address;

/// Field name to value, as returned by the API for a single address. May be empty.
pub type ResultRecord = Map<String, Value>;

/// Every field name observed across all records
pub type FieldUniverse = BTreeSet<String>;

/// Records keyed by address, in the order their addresses were first seen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(Address, ResultRecord)>,
    index: HashMap<Address, usize>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<&ResultRecord> {
        self.index.get(address).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &ResultRecord)> {
        self.entries.iter().map(|(a, r)| (a, r))
    }

    // A repeated address replaces its record but keeps its position
    fn upsert(&mut self, address: Address, record: ResultRecord) {
        match self.index.get(&address) {
            Some(&i) => self.entries[i].1 = record,
            None => {
                self.index.insert(address.clone(), self.entries.len());
                self.entries.push((address, record));
            }
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = (Address, ResultRecord);
    type IntoIter = std::vec::IntoIter<(Address, ResultRecord)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Incrementally builds a [`ResultSet`] and its [`FieldUniverse`]
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    results: ResultSet,
    fields: FieldUniverse,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the record for one address and fold its field names into the universe
    pub fn insert(&mut self, address: Address, record: ResultRecord) {
        for key in record.keys() {
            if !self.fields.contains(key) {
                trace!("New field {} seen for {}", key, address);
                self.fields.insert(key.to_owned());
            }
        }
        self.results.upsert(address, record);
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn fields(&self) -> &FieldUniverse {
        &self.fields
    }

    pub fn finish(self) -> (ResultSet, FieldUniverse) {
        (self.results, self.fields)
    }
}
