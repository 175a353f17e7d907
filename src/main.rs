//! The zonewalk command line tool.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use zonewalk::config::{Options, DEFAULT_NAMESERVER, DEFAULT_TYPES, THREADS};
use zonewalk::crawl::{self, OwnerScope};
use zonewalk::enumerate;
use zonewalk::logging::init_logging;
use zonewalk::net::DEFAULT_PORT;

/// Arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Domain to enumerate.
    #[arg(short, long)]
    domain: String,

    /// Nameserver to send the record queries to.
    #[arg(short, long, default_value = DEFAULT_NAMESERVER)]
    nameserver: String,

    /// Record types to query, comma separated. ANY selects all of them,
    /// AXFR starts the zone transfer crawl.
    #[arg(short = 't', long = "type", default_value = DEFAULT_TYPES)]
    types: String,

    /// Port nameservers listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Number of parallel record queries.
    #[arg(short = 'T', long, default_value_t = THREADS.default())]
    threads: usize,

    /// Timeout for each network operation, e.g. 3s, 500ms or 1m30s.
    #[arg(
        short = 'D',
        long,
        default_value = "3s",
        value_parser = humantime::parse_duration
    )]
    duration: Duration,

    /// Number of parallel zone transfers.
    #[arg(
        short = 'w',
        long = "axfr-workers",
        default_value_t = crawl::Config::default().workers()
    )]
    axfr_workers: usize,

    /// Owner names to try as zones: all or delegations.
    #[arg(long, default_value_t = OwnerScope::All)]
    owner_scope: OwnerScope,

    /// Print the results as JSON.
    #[arg(long)]
    json: bool,

    /// Log progress to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_options(&self) -> Options {
        let mut options = Options::new(self.domain.clone());
        options.nameserver = self.nameserver.clone();
        options.types = self.types.clone();
        options.set_threads(self.threads);
        options.net.set_port(self.port);
        options.net.set_read_timeout(self.duration);
        options.crawl.set_workers(self.axfr_workers);
        options.crawl.set_owner_scope(self.owner_scope);
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let report = match enumerate::run(args.to_options()).await {
        Ok(report) => report,
        Err(err) => {
            error!("enumeration failed: {err}");
            eprintln!("[ERROR] {err}");
            return ExitCode::FAILURE;
        }
    };
    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("[ERROR] cannot render JSON: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{report}");
    }
    ExitCode::SUCCESS
}

//============ Tests =========================================================
