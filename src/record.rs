//! Resource records and the per-target record store.
//!
//! Records decoded from the wire are converted into [`ResourceRecord`]s, an
//! owned presentation-level copy that no longer borrows from the message it
//! came from. Records observed for one target are collected in a
//! [`RecordStore`].

use std::collections::HashMap;
use std::fmt;

use domain::base::iana::{Class, Rtype};
use domain::base::rdata::RecordData;
use domain::base::Record;
use domain::rdata::AllRecordData;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::task::fqdn;

//------------ Canonical Order -----------------------------------------------

/// The order in which record types are reported.
///
/// This is only used to make output deterministic and easy to scan. It is
/// also the list of types probed when all types are requested.
pub const CANONICAL_TYPES: [Rtype; 77] = [
    Rtype::SOA,
    Rtype::NS,
    Rtype::A,
    Rtype::AAAA,
    Rtype::SRV,
    Rtype::MX,
    Rtype::CNAME,
    Rtype::TXT,
    Rtype::MD,
    Rtype::MF,
    Rtype::MB,
    Rtype::MG,
    Rtype::MR,
    Rtype::NULL,
    Rtype::PTR,
    Rtype::HINFO,
    Rtype::MINFO,
    Rtype::RP,
    Rtype::AFSDB,
    Rtype::X25,
    Rtype::ISDN,
    Rtype::RT,
    Rtype::NSAPPTR,
    Rtype::SIG,
    Rtype::KEY,
    Rtype::PX,
    Rtype::GPOS,
    Rtype::LOC,
    Rtype::NXT,
    Rtype::EID,
    Rtype::NIMLOC,
    Rtype::ATMA,
    Rtype::NAPTR,
    Rtype::KX,
    Rtype::CERT,
    Rtype::DNAME,
    Rtype::OPT,
    Rtype::APL,
    Rtype::DS,
    Rtype::SSHFP,
    Rtype::IPSECKEY,
    Rtype::RRSIG,
    Rtype::NSEC,
    Rtype::DNSKEY,
    Rtype::DHCID,
    Rtype::NSEC3,
    Rtype::NSEC3PARAM,
    Rtype::TLSA,
    Rtype::SMIMEA,
    Rtype::HIP,
    Rtype::NINFO,
    Rtype::RKEY,
    Rtype::TALINK,
    Rtype::CDS,
    Rtype::CDNSKEY,
    Rtype::OPENPGPKEY,
    Rtype::CSYNC,
    Rtype::ZONEMD,
    Rtype::SVCB,
    Rtype::HTTPS,
    Rtype::SPF,
    Rtype::UINFO,
    Rtype::UID,
    Rtype::GID,
    Rtype::UNSPEC,
    Rtype::NID,
    Rtype::L32,
    Rtype::L64,
    Rtype::LP,
    Rtype::EUI48,
    Rtype::EUI64,
    NXNAME,
    Rtype::URI,
    Rtype::CAA,
    Rtype::AVC,
    AMTRELAY,
    Rtype::AXFR,
];

/// NXNAME (RFC 9824), not yet known by name to `domain`.
const NXNAME: Rtype = Rtype::from_int(128);

/// AMTRELAY (RFC 8777), not yet known by name to `domain`.
const AMTRELAY: Rtype = Rtype::from_int(260);

/// The types whose records define or delegate zones.
pub const DOMAIN_TYPES: [Rtype; 3] = [Rtype::NS, Rtype::SOA, Rtype::CNAME];

/// Returns whether `rtype` is a query-only type that is never stored.
pub fn is_meta_type(rtype: Rtype) -> bool {
    matches!(
        rtype,
        Rtype::AXFR
            | Rtype::IXFR
            | Rtype::ANY
            | Rtype::MAILA
            | Rtype::MAILB
            | Rtype::OPT
            | Rtype::TKEY
            | Rtype::TSIG
    )
}

//------------ ResourceRecord ------------------------------------------------

/// An owned copy of a single resource record.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceRecord {
    /// The fully qualified owner name.
    owner: String,

    /// The record type.
    #[serde(rename = "type", serialize_with = "display")]
    rtype: Rtype,

    /// The record class.
    #[serde(serialize_with = "display")]
    class: Class,

    /// The time-to-live in seconds.
    ttl: u32,

    /// The record data in presentation format.
    data: String,

    /// The name an NS or CNAME record points to.
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

impl ResourceRecord {
    /// Creates a record of class IN from its parts.
    pub fn new(
        owner: impl AsRef<str>,
        rtype: Rtype,
        ttl: u32,
        data: impl Into<String>,
    ) -> Self {
        ResourceRecord {
            owner: fqdn(owner.as_ref()),
            rtype,
            class: Class::IN,
            ttl,
            data: data.into(),
            target: None,
        }
    }

    /// Creates an NS record delegating `owner` to `nsdname`.
    pub fn ns(owner: impl AsRef<str>, nsdname: impl AsRef<str>) -> Self {
        let target = fqdn(nsdname.as_ref());
        let mut res = Self::new(owner, Rtype::NS, 3600, target.clone());
        res.target = Some(target);
        res
    }

    /// Converts a decoded record.
    pub fn from_record<Octs, N>(
        record: &Record<N, AllRecordData<Octs, N>>,
    ) -> Self
    where
        N: fmt::Display,
        AllRecordData<Octs, N>: RecordData + fmt::Display,
    {
        let target = match record.data() {
            AllRecordData::Ns(ns) => Some(fqdn(&ns.nsdname().to_string())),
            AllRecordData::Cname(cname) => {
                Some(fqdn(&cname.cname().to_string()))
            }
            _ => None,
        };
        ResourceRecord {
            owner: fqdn(&record.owner().to_string()),
            rtype: record.rtype(),
            class: record.class(),
            ttl: record.ttl().as_secs(),
            data: record.data().to_string(),
            target,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Returns the name an NS or CNAME record points to.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.owner, self.ttl, self.class, self.rtype, self.data
        )
    }
}

/// Serializes a value through its `Display` impl.
pub(crate) fn display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

//------------ RecordStore ---------------------------------------------------

/// The records observed for one target, grouped by record type.
///
/// All access goes through an internal lock, so a store can be shared
/// between tasks writing into it concurrently.
#[derive(Debug, Default)]
pub struct RecordStore {
    data: Mutex<HashMap<Rtype, Vec<ResourceRecord>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `rr` to the records kept for `rtype`.
    pub fn record(&self, rtype: Rtype, rr: ResourceRecord) {
        self.data.lock().entry(rtype).or_default().push(rr);
    }

    /// Appends each record under its own type.
    pub fn extend(&self, records: impl IntoIterator<Item = ResourceRecord>) {
        let mut data = self.data.lock();
        for rr in records {
            data.entry(rr.rtype()).or_default().push(rr);
        }
    }

    /// Returns a copy of the records kept for `rtype`.
    pub fn get(&self, rtype: Rtype) -> Vec<ResourceRecord> {
        self.data.lock().get(&rtype).cloned().unwrap_or_default()
    }

    /// Returns the total number of records.
    pub fn len(&self) -> usize {
        self.data.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all non-empty types in canonical order.
    ///
    /// Types that are not part of [`CANONICAL_TYPES`] follow in numeric
    /// order. Records keep the order in which they were recorded. Each
    /// call reflects the state of the store at the time of the call.
    pub fn non_empty_types(&self) -> Vec<(Rtype, Vec<ResourceRecord>)> {
        let data = self.data.lock();
        let mut res: Vec<_> = CANONICAL_TYPES
            .iter()
            .filter_map(|rtype| {
                data.get(rtype)
                    .filter(|records| !records.is_empty())
                    .map(|records| (*rtype, records.clone()))
            })
            .collect();
        let mut others: Vec<_> = data
            .iter()
            .filter(|(rtype, records)| {
                !records.is_empty() && !CANONICAL_TYPES.contains(rtype)
            })
            .map(|(rtype, records)| (*rtype, records.clone()))
            .collect();
        others.sort_by_key(|(rtype, _)| *rtype);
        res.extend(others);
        res
    }

    /// Returns a snapshot of all non-empty types as record sets.
    pub fn record_sets(&self) -> Vec<RecordSet> {
        self.non_empty_types()
            .into_iter()
            .map(|(rtype, records)| RecordSet { rtype, records })
            .collect()
    }
}

//------------ RecordSet -----------------------------------------------------

/// All records of one type, as kept in a report.
#[derive(Clone, Debug, Serialize)]
pub struct RecordSet {
    #[serde(rename = "type", serialize_with = "display")]
    pub rtype: Rtype,

    pub records: Vec<ResourceRecord>,
}

impl fmt::Display for RecordSet {
    /// Formats the set as a block headed by its type.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "  [ {} ]", self.rtype)?;
        let last = self.records.len().saturating_sub(1);
        for (i, rr) in self.records.iter().enumerate() {
            if i == last {
                writeln!(f, "  |_____{rr}")?;
                writeln!(f)?;
            } else {
                writeln!(f, "  | \t{rr}")?;
            }
        }
        Ok(())
    }
}

//============ Tests =========================================================
