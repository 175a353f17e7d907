//! Presenting the results of an enumeration.
//!
//! A [`Report`] collects everything one run produced. Its `Display`
//! implementation renders the human-readable text output, and
//! [`Report::to_json`] renders the same data as a JSON document.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::crawl::{CrawlReport, FailureKind};
use crate::probe::{ProbeError, ProbeReport};
use crate::record::RecordSet;

/// The format of timestamps in the text output.
const TIME_FORMAT: &str = "%a, %Y-%m-%d %H:%M:%S";

//------------ Report --------------------------------------------------------

/// The results of enumerating one domain.
#[derive(Debug)]
pub struct Report {
    /// The domain that was enumerated.
    domain: String,

    /// The nameserver the plain queries went to.
    nameserver: String,

    /// When the run started.
    started: DateTime<Local>,

    /// When the run ended.
    finished: DateTime<Local>,

    /// The results of the plain queries.
    probe: ProbeReport,

    /// The results of the zone transfer crawl if there was one.
    crawl: Option<CrawlReport>,
}

impl Report {
    pub fn new(
        domain: impl Into<String>,
        nameserver: impl Into<String>,
        started: DateTime<Local>,
        finished: DateTime<Local>,
        probe: ProbeReport,
        crawl: Option<CrawlReport>,
    ) -> Self {
        Report {
            domain: domain.into(),
            nameserver: nameserver.into(),
            started,
            finished,
            probe,
            crawl,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn nameserver(&self) -> &str {
        &self.nameserver
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn finished(&self) -> DateTime<Local> {
        self.finished
    }

    /// Returns how long the run took.
    pub fn elapsed(&self) -> Duration {
        (self.finished - self.started).to_std().unwrap_or_default()
    }

    pub fn probe(&self) -> &ProbeReport {
        &self.probe
    }

    pub fn crawl(&self) -> Option<&CrawlReport> {
        self.crawl.as_ref()
    }

    /// Renders the report as a pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonReport {
            domain: &self.domain,
            nameserver: &self.nameserver,
            started: self.started.to_rfc3339(),
            finished: self.finished.to_rfc3339(),
            elapsed_ms: self.elapsed().as_millis(),
            records: self.probe.store().record_sets(),
            errors: self.probe.errors(),
            zone_transfers: self.crawl.as_ref(),
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "[DNS ENUMERATION]")?;
        writeln!(f, " Domain: {}", self.domain)?;
        writeln!(f, " Nameserver: {}", self.nameserver)?;
        writeln!(f, " Time Start: {}", self.started.format(TIME_FORMAT))?;
        writeln!(f)?;

        for err in self.probe.errors() {
            writeln!(f, "[ERROR] DNS Lookup Failure: {err}")?;
        }
        writeln!(f, "[ Record Check Results ]")?;
        for set in self.probe.store().record_sets() {
            write!(f, "{set}")?;
        }

        if let Some(crawl) = self.crawl.as_ref() {
            writeln!(f, "[ Zone Transfer Results ]")?;
            for entry in &crawl.transfers {
                writeln!(f, "[------ {} ------]", entry.key)?;
                for set in &entry.records {
                    write!(f, "{set}")?;
                }
            }
            for failure in &crawl.failures {
                let prefix = match failure.kind() {
                    FailureKind::Transfer => "[AXFR Fail]",
                    FailureKind::Stream => "[AXFR Error]",
                };
                writeln!(f, "{prefix} - {failure}")?;
            }
        }

        writeln!(f)?;
        writeln!(f, "[---FINISHED---]")?;
        writeln!(f, " Time End: {}", self.finished.format(TIME_FORMAT))?;
        writeln!(f, " Took: {:.3?}", self.elapsed())
    }
}

//------------ JsonReport ----------------------------------------------------

#[derive(Serialize)]
struct JsonReport<'a> {
    domain: &'a str,
    nameserver: &'a str,
    started: String,
    finished: String,
    elapsed_ms: u128,
    records: Vec<RecordSet>,
    errors: &'a [ProbeError],

    #[serde(skip_serializing_if = "Option::is_none")]
    zone_transfers: Option<&'a CrawlReport>,
}

//============ Tests =========================================================
