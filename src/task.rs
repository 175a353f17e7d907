//! Zone transfer targets.
//!
//! A [`Task`] names one attempt to transfer a zone from one nameserver.
//! Both halves are kept in canonical fully-qualified form so that two tasks
//! for the same target always produce the same [composite key].
//!
//! [composite key]: Task::key

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

//------------ Task ----------------------------------------------------------

/// An attempt to transfer `domain` from `nameserver`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Task {
    /// The zone to transfer.
    domain: String,

    /// The nameserver to transfer it from.
    nameserver: String,
}

impl Task {
    /// Creates a new task, normalizing both names.
    pub fn new(domain: impl AsRef<str>, nameserver: impl AsRef<str>) -> Self {
        Task {
            domain: fqdn(domain.as_ref()),
            nameserver: normalize_nameserver(nameserver.as_ref()),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn nameserver(&self) -> &str {
        &self.nameserver
    }

    /// Returns the composite key identifying this target.
    ///
    /// The key has the form `domain@nameserver`.
    pub fn key(&self) -> String {
        format!("{}@{}", self.domain, self.nameserver)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} @ {}", self.domain, self.nameserver)
    }
}

//------------ Name normalization --------------------------------------------

/// Returns `name` as a fully qualified, lower-case domain name.
///
/// The root name and the empty string both become `"."`.
pub fn fqdn(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() || name == "." {
        return ".".into();
    }
    let mut res = name.to_ascii_lowercase();
    if !res.ends_with('.') {
        res.push('.');
    }
    res
}

/// Normalizes a nameserver given either as an address or a host name.
///
/// IP literals are kept as they are, everything else is treated as a host
/// name and made fully qualified.
pub fn normalize_nameserver(nameserver: &str) -> String {
    let nameserver = nameserver.trim();
    match nameserver.parse::<IpAddr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => fqdn(nameserver),
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fqdn_appends_root_label() {
        assert_eq!(fqdn("example.com"), "example.com.");
        assert_eq!(fqdn("example.com."), "example.com.");
        assert_eq!(fqdn("WWW.Example.COM"), "www.example.com.");
        assert_eq!(fqdn(""), ".");
        assert_eq!(fqdn("."), ".");
    }

    #[test]
    fn address_nameservers_stay_literal() {
        assert_eq!(normalize_nameserver("8.8.8.8"), "8.8.8.8");
        assert_eq!(normalize_nameserver("2001:db8::1"), "2001:db8::1");
        assert_eq!(
            normalize_nameserver("nsztm1.digi.ninja"),
            "nsztm1.digi.ninja."
        );
    }

    #[test]
    fn equal_targets_share_a_key() {
        let a = Task::new("zonetransfer.me", "NSZTM1.digi.ninja.");
        let b = Task::new("zonetransfer.me.", "nsztm1.digi.ninja");
        assert_eq!(a, b);
        assert_eq!(a.key(), "zonetransfer.me.@nsztm1.digi.ninja.");
        assert_eq!(a.to_string(), "zonetransfer.me. @ nsztm1.digi.ninja.");
    }
}
