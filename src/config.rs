//! Configuration values and run options.

use std::cmp;
use std::fmt;

use domain::base::iana::Rtype;

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a config variable.
#[derive(Clone, Copy)]
pub struct DefMinMax<T> {
    /// The default value,
    def: T,

    /// The minimum value,
    min: T,

    /// The maximum value,
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    pub const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    pub fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    pub fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Configuration Constants ---------------------------------------

/// The nameserver used when none is given.
pub const DEFAULT_NAMESERVER: &str = "8.8.8.8";

/// The record type selection used when none is given.
pub const DEFAULT_TYPES: &str = "ANY";

/// Limits for the number of plain prober workers.
pub const THREADS: DefMinMax<usize> = DefMinMax::new(10, 1, 256);

//------------ Options -------------------------------------------------------

/// Everything one enumeration run needs to know.
#[derive(Clone, Debug)]
pub struct Options {
    /// The domain to enumerate.
    pub domain: String,

    /// The nameserver to send the plain queries to.
    pub nameserver: String,

    /// The record type selection, a comma separated list or `ANY`.
    pub types: String,

    /// The number of plain prober workers.
    pub threads: usize,

    /// Transport settings.
    pub net: crate::net::Config,

    /// Zone transfer crawler settings.
    pub crawl: crate::crawl::Config,
}

impl Options {
    /// Creates options for `domain` with default values everywhere else.
    pub fn new(domain: impl Into<String>) -> Self {
        Options {
            domain: domain.into(),
            nameserver: DEFAULT_NAMESERVER.into(),
            types: DEFAULT_TYPES.into(),
            threads: THREADS.default(),
            net: Default::default(),
            crawl: Default::default(),
        }
    }

    /// Sets the number of plain prober workers.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_threads(&mut self, value: usize) {
        self.threads = THREADS.limit(value)
    }

    /// Expands the record type selection.
    ///
    /// `ANY` anywhere in the list selects every type in canonical order.
    /// Duplicates are removed while keeping the first occurrence.
    pub fn record_types(&self) -> Result<Vec<Rtype>, UnknownType> {
        parse_types(&self.types)
    }
}

/// Parses a comma separated list of record type mnemonics.
pub fn parse_types(list: &str) -> Result<Vec<Rtype>, UnknownType> {
    let mut res = Vec::new();
    for item in list.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let rtype: Rtype = item
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| UnknownType(item.into()))?;
        if rtype == Rtype::ANY {
            return Ok(crate::record::CANONICAL_TYPES.to_vec());
        }
        if !res.contains(&rtype) {
            res.push(rtype);
        }
    }
    if res.is_empty() {
        return Err(UnknownType(list.into()));
    }
    Ok(res)
}

//------------ UnknownType ---------------------------------------------------

/// A record type mnemonic could not be recognized.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownType(pub String);

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown record type '{}'", self.0)
    }
}

impl std::error::Error for UnknownType {}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::CANONICAL_TYPES;

    #[test]
    fn any_expands_to_canonical_list() {
        assert_eq!(parse_types("ANY").unwrap(), CANONICAL_TYPES.to_vec());
        assert_eq!(parse_types("a, any").unwrap(), CANONICAL_TYPES.to_vec());
    }

    #[test]
    fn explicit_lists_keep_their_order() {
        assert_eq!(
            parse_types("mx, A,AXFR,a").unwrap(),
            [Rtype::MX, Rtype::A, Rtype::AXFR]
        );
        assert!(parse_types("A,NOPE").is_err());
        assert!(parse_types(" , ").is_err());
    }

    #[test]
    fn threads_are_capped() {
        let mut options = Options::new("example.com");
        assert_eq!(options.threads, 10);
        options.set_threads(0);
        assert_eq!(options.threads, 1);
        options.set_threads(100_000);
        assert_eq!(options.threads, 256);
    }
}
