//! Result container for aggregating and deduplicating asset records

use super::types::Record;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Aggregates records from every source of a run.
///
/// Assets are deduplicated by IP and `port/transport`, regardless of source.
/// Error records are kept apart and never deduplicated.
#[derive(Debug, Default)]
pub struct ResultContainer {
    /// Hashes of every `ip_port/transport` already stored
    seen: HashSet<String>,
    /// Distinct service records per IP
    services: BTreeMap<String, Vec<Record>>,
    /// Hostnames seen per IP
    hosts: BTreeMap<String, BTreeSet<String>>,
    /// Provider failures
    errors: Vec<Record>,
    duplicates: usize,
}

impl ResultContainer {
    /// Create a new empty result container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, returning whether it was a new asset.
    ///
    /// Hostnames of duplicate records are still merged into their IP.
    pub fn add(&mut self, record: Record) -> bool {
        if record.is_error() {
            self.errors.push(record);
            return false;
        }
        if record.ip.is_empty() {
            return false;
        }

        let hosts = self.hosts.entry(record.ip.clone()).or_default();
        hosts.extend(record.hosts.iter().filter(|h| !h.is_empty()).cloned());

        if !self.seen.insert(Self::asset_hash(&record)) {
            self.duplicates += 1;
            return false;
        }
        self.services
            .entry(record.ip.clone())
            .or_default()
            .push(record);
        true
    }

    /// Distinct service records grouped by IP
    pub fn services(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.services
    }

    /// Every (IP, hostname) pair, ordered by IP then hostname
    pub fn domains(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.hosts
            .iter()
            .flat_map(|(ip, hosts)| hosts.iter().map(move |host| (ip.as_str(), host.as_str())))
    }

    /// Error records in arrival order
    pub fn errors(&self) -> &[Record] {
        &self.errors
    }

    /// Number of distinct (IP, port/transport) assets
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of distinct IPs
    pub fn ip_count(&self) -> usize {
        self.services.len()
    }

    /// Number of records dropped as duplicates
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// md5 of `ip_port/transport`, the deduplication key
    fn asset_hash(record: &Record) -> String {
        let key = format!("{}_{}", record.ip, record.port);
        format!("{:x}", md5::compute(key))
    }
}
