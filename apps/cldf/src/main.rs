//! # cldf - Climbing Log Data Format tool
//!
//! ## Usage
//!
//! ```bash
//! # Integrity report for one or more archives
//! cldf validate export.cldf backup.cldf
//!
//! # Manifest and counts
//! cldf info export.cldf --json
//!
//! # Combine phone and watch exports
//! cldf merge phone.cldf watch.cldf -o combined.cldf
//!
//! # Identifiers
//! cldf clid generate route --count 3
//! cldf clid parse clid:route:550e8400-e29b-41d4-a716-446655440000
//! ```

use clap::Parser;
use cldf::cli::{self, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // CLDF_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CLDF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "cldf=debug,cldf_core=debug"
    } else if cli.quiet {
        "cldf=error,cldf_core=error"
    } else {
        "cldf=info,cldf_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    match cli::execute(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(2);
        }
    }
}
