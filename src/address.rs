//! Validation and batching of address candidates.

use std::{fmt::Display, net::IpAddr, num::NonZeroUsize, str::FromStr};

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

/// A syntactically valid IPv4 or IPv6 address.
///
/// The text is kept exactly as it was read, so requests and reports use the operator's spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address {
    raw: String,
    #[serde(skip)]
    ip: IpAddr,
}

impl Address {
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ip = IpAddr::from_str(s)?;
        Ok(Address {
            raw: s.to_owned(),
            ip,
        })
    }
}

/// Outcome of [`validate()`]. Every input string ends up in exactly one of the two lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validation {
    pub valid: Vec<Address>,
    pub invalid: Vec<String>,
}

/// Split raw strings into valid addresses and invalid leftovers.
/// Input order is preserved on both sides, duplicates are kept.
pub fn validate(raw: Vec<String>) -> Validation {
    let mut validation = Validation::default();
    for s in raw {
        match Address::from_str(&s) {
            Ok(addr) => validation.valid.push(addr),
            Err(_) => validation.invalid.push(s),
        }
    }

    if !validation.invalid.is_empty() {
        warn!(
            "Invalid IP addresses found and will be excluded: {}",
            validation.invalid.iter().join(", ")
        );
    }
    debug!(
        "{} valid and {} invalid addresses",
        validation.valid.len(),
        validation.invalid.len()
    );
    validation
}

/// Split `addresses` into consecutive batches of at most `size` entries.
/// Only the last batch may be shorter.
pub fn batches(addresses: &[Address], size: NonZeroUsize) -> Vec<&[Address]> {
    addresses.chunks(size.get()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    fn addrs(n: usize) -> Vec<Address> {
        (0..n)
            .map(|i| format!("10.0.{}.{}", i / 256, i % 256).parse().unwrap())
            .collect()
    }

    #[test]
    fn should_split_valid_and_invalid() {
        let v = validate(strings(&["8.8.8.8", "not-an-ip", "2001:db8::1"]));
        assert_eq!(
            v.valid.iter().map(Address::as_str).collect::<Vec<_>>(),
            vec!["8.8.8.8", "2001:db8::1"]
        );
        assert_eq!(v.invalid, vec!["not-an-ip"]);
    }

    #[test]
    fn should_reject_partial_and_hostname_forms() {
        let v = validate(strings(&[
            "10.0.0",
            "example.com",
            "10.0.0.0/8",
            "256.1.1.1",
            "",
            "::1",
        ]));
        assert_eq!(v.valid.iter().map(Address::as_str).collect::<Vec<_>>(), vec!["::1"]);
        assert_eq!(v.invalid.len(), 5);
    }

    #[test]
    fn should_reject_zone_scoped_ipv6() {
        // The zone only means something on the host that wrote the list
        let v = validate(strings(&["fe80::1%eth0", "fe80::1"]));
        assert_eq!(v.valid.iter().map(Address::as_str).collect::<Vec<_>>(), vec!["fe80::1"]);
        assert_eq!(v.invalid, vec!["fe80::1%eth0"]);
    }

    #[test]
    fn should_partition_without_overlap_or_omission() {
        let input = strings(&["1.1.1.1", "x", "1.1.1.1", "::", "y", "x", "127.0.0.1"]);
        let v = validate(input.clone());

        assert_eq!(v.valid.len() + v.invalid.len(), input.len());
        for s in &input {
            let is_valid = v.valid.iter().any(|a| a.as_str() == s);
            let is_invalid = v.invalid.contains(s);
            assert!(is_valid ^ is_invalid, "{} classified twice or not at all", s);
        }
        // duplicates survive
        assert_eq!(v.valid.iter().filter(|a| a.as_str() == "1.1.1.1").count(), 2);
    }

    #[test]
    fn should_keep_original_spelling() {
        let a: Address = "2001:0db8:0000::1".parse().unwrap();
        assert_eq!(a.as_str(), "2001:0db8:0000::1");
        assert_eq!(a.ip(), "2001:db8::1".parse::<IpAddr>().unwrap());
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"2001:0db8:0000::1\"");
    }

    #[test]
    fn should_batch_in_order() {
        let size = NonZeroUsize::new(70).unwrap();
        for n in [0, 1, 69, 70, 71, 140, 141, 500] {
            let list = addrs(n);
            let b = batches(&list, size);
            assert_eq!(b.len(), n.div_ceil(70), "batch count for {}", n);
            assert!(b.iter().all(|batch| !batch.is_empty() && batch.len() <= 70));
            assert_eq!(b.concat(), list);
        }
    }

    #[test]
    fn should_leave_short_last_batch() {
        let list = addrs(75);
        let b = batches(&list, NonZeroUsize::new(70).unwrap());
        assert_eq!(b[0].len(), 70);
        assert_eq!(b[1].len(), 5);
    }
}
