//! Enumerating a domain.
//!
//! This is where the pieces come together: the [`Prober`] asks the
//! configured nameserver for every selected record type and, if zone
//! transfers were asked for, the [`Crawler`] walks every nameserver found.
//! The function [`run`] does all this against the network. The
//! [`Enumerator`] does the same on top of any client.

use std::error;
use std::fmt;
use std::sync::Arc;

use chrono::Local;
use domain::base::iana::Rtype;
use tracing::{debug, info};

use crate::config::{Options, UnknownType};
use crate::crawl::Crawler;
use crate::net::{self, Client, Lookup, TransferSource};
use crate::probe::Prober;
use crate::report::Report;
use crate::task::{fqdn, normalize_nameserver, Task};

//------------ run -----------------------------------------------------------

/// Enumerates the domain given in `options` using the network.
///
/// The nameserver is resolved up front so that an unusable nameserver is
/// reported before any query is sent.
pub async fn run(options: Options) -> Result<Report, Error> {
    let client = Client::new(options.net.clone());
    let addr = client
        .resolve(&options.nameserver)
        .await
        .map_err(Error::Nameserver)?;
    debug!("using nameserver {} at {addr}", options.nameserver);
    Enumerator::new(Arc::new(client), options).run().await
}

//------------ Enumerator ----------------------------------------------------

/// Runs the plain probe and the zone transfer crawl for one domain.
#[derive(Debug)]
pub struct Enumerator<C> {
    client: Arc<C>,
    options: Options,
}

impl<C: Lookup + TransferSource> Enumerator<C> {
    pub fn new(client: Arc<C>, options: Options) -> Self {
        Enumerator { client, options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Enumerates the domain.
    ///
    /// Only invalid options lead to an error. Failures while talking to
    /// nameservers end up in the report.
    pub async fn run(&self) -> Result<Report, Error> {
        let started = Local::now();
        if self.options.domain.trim().is_empty() {
            return Err(Error::BadDomain(self.options.domain.clone()));
        }
        let domain = fqdn(&self.options.domain);
        net::to_name(&domain)
            .map_err(|_| Error::BadDomain(self.options.domain.clone()))?;
        let nameserver = normalize_nameserver(&self.options.nameserver);
        let types = self.options.record_types()?;

        info!("enumerating {domain} at {nameserver}");
        let probe = Prober::new(self.client.clone(), self.options.threads)
            .run(&domain, &nameserver, &types)
            .await;

        let crawl = if types.contains(&Rtype::AXFR) {
            let mut seeds = vec![Task::new(&domain, &nameserver)];
            seeds.extend(
                probe
                    .store()
                    .get(Rtype::NS)
                    .iter()
                    .filter_map(|ns| ns.target())
                    .map(|target| Task::new(&domain, target)),
            );
            let crawler =
                Crawler::new(self.client.clone(), self.options.crawl.clone());
            Some(crawler.run(seeds).await)
        } else {
            None
        };

        Ok(Report::new(
            domain,
            nameserver,
            started,
            Local::now(),
            probe,
            crawl,
        ))
    }
}

//------------ Error ---------------------------------------------------------

/// An enumeration could not be started.
#[derive(Clone, Debug)]
pub enum Error {
    /// The domain is not a valid domain name.
    BadDomain(String),

    /// The record type selection contains an unknown type.
    UnknownType(String),

    /// The nameserver cannot be used.
    Nameserver(net::Error),
}

impl From<UnknownType> for Error {
    fn from(err: UnknownType) -> Self {
        Error::UnknownType(err.0)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadDomain(name) => write!(f, "invalid domain '{name}'"),
            Error::UnknownType(name) => {
                write!(f, "unknown record type '{name}'")
            }
            Error::Nameserver(err) => {
                write!(f, "unusable nameserver: {err}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Nameserver(err) => Some(err),
            _ => None,
        }
    }
}

//============ Tests =========================================================
