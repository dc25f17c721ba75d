//! Local record store.
//!
//! Maps domain patterns to the addresses served for them. A pattern is
//! either an exact name (`example.com`) or a wildcard (`*.example.com`)
//! that covers the suffix itself and every name below it.

use hickory_proto::rr::RecordType;
use log::debug;
use std::collections::HashMap;
use std::net::IpAddr;

/// Prefix marking a wildcard pattern.
const WILDCARD_PREFIX: &str = "*.";

/// A single pattern and its addresses, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pattern: String,
    addrs: Vec<IpAddr>,
}

impl RecordEntry {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Addresses of the family served for `qtype`.
    ///
    /// Only A and AAAA carry addresses; every other type yields nothing.
    pub fn addrs_for(&self, qtype: RecordType) -> Vec<IpAddr> {
        self.addrs
            .iter()
            .copied()
            .filter(|ip| match qtype {
                RecordType::A => ip.is_ipv4(),
                RecordType::AAAA => ip.is_ipv6(),
                _ => false,
            })
            .collect()
    }

    fn wildcard_suffix(&self) -> Option<&str> {
        self.pattern.strip_prefix(WILDCARD_PREFIX)
    }
}

/// Ordered mapping from domain pattern to addresses.
///
/// Wildcards are tried in insertion order, so callers that load
/// overlapping wildcards must insert the preferred one first.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    entries: Vec<RecordEntry>,
    index: HashMap<String, usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add addresses for a pattern.
    ///
    /// A trailing dot on the pattern is dropped. Inserting a known pattern
    /// again appends the new addresses and keeps its original position.
    pub fn insert<I>(&mut self, pattern: &str, addrs: I)
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let pattern = pattern.trim_end_matches('.');
        let slot = match self.index.get(pattern) {
            Some(&slot) => slot,
            None => {
                self.entries.push(RecordEntry {
                    pattern: pattern.to_string(),
                    addrs: Vec::new(),
                });
                self.index.insert(pattern.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[slot];
        for ip in addrs {
            if !entry.addrs.contains(&ip) {
                entry.addrs.push(ip);
            }
        }
    }

    /// Find the pattern covering `name`: the exact entry first, then the
    /// first wildcard whose suffix is `name` or a dot-aligned suffix of it.
    pub fn find(&self, name: &str) -> Option<&RecordEntry> {
        if let Some(&slot) = self.index.get(name) {
            return Some(&self.entries[slot]);
        }

        self.entries.iter().find(|entry| {
            entry
                .wildcard_suffix()
                .is_some_and(|suffix| covers(suffix, name))
        })
    }

    /// Addresses answering `name` for `qtype`.
    ///
    /// Returns `None` both when no pattern covers the name and when the
    /// covering pattern holds no address of the requested family.
    pub fn lookup(&self, name: &str, qtype: RecordType) -> Option<Vec<IpAddr>> {
        let entry = self.find(name)?;
        let addrs = entry.addrs_for(qtype);
        if addrs.is_empty() {
            debug!(
                "Pattern {} covers {} but has no {} address",
                entry.pattern, name, qtype
            );
            return None;
        }
        Some(addrs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries.iter()
    }
}

fn covers(suffix: &str, name: &str) -> bool {
    name == suffix
        || name
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'))
}
