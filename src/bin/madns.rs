//! Resolve a multiaddress on the command line.
//!
//! Takes one multiaddress and prints every address it resolves to,
//! one per line. A bare hostname is treated as a `dnsaddr` query:
//!
//! ```text
//! $ madns bootstrap.libp2p.io
//! $ madns /dns4/example.com/tcp/443
//! ```
//!
//! Set `RUST_LOG` to see what the resolver is doing.

use madns::{Multiaddr, Resolver};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(query) = env::args().nth(1) else {
        eprintln!("Usage: madns <multiaddr-or-hostname>");
        return ExitCode::FAILURE;
    };
    let query = if query.starts_with('/') {
        query
    } else {
        eprintln!("madns: changing query to /dnsaddr/{}", query);
        format!("/dnsaddr/{}", query)
    };

    let addr: Multiaddr = match query.parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match Resolver::system().resolve(&addr).await {
        Ok(resolved) => {
            for addr in resolved {
                println!("{}", addr);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
