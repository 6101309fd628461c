//! Resolving multiaddresses that name their hosts through the DNS.
//!
//! A multiaddress such as `/dns4/example.com/tcp/443` cannot be dialed
//! as it stands: the `dns4` segment names a host where a dialer needs
//! an address. This crate replaces the DNS-bearing segments of a
//! multiaddress (`dns`, `dns4`, `dns6`, and `dnsaddr`) with what they
//! resolve to and returns every combination of the alternatives,
//! ready for dialing.
//!
//! The work is split over a small set of types:
//!
//! * [`Resolver`] is the entry point. It owns one default [`Backend`]
//!   plus any number of domain-scoped ones, routes each hostname to
//!   the most specific backend, and answers peer-identified domains of
//!   the p2p-forge form (`<ip>.<peer-id>.<suffix>`) offline from the
//!   name itself.
//! * [`Backend`] is the contract a source of DNS records implements:
//!   an address lookup and a TXT lookup. [`MockBackend`] serves tests
//!   from in-memory maps, [`SystemBackend`] asks the name servers the
//!   host is configured with, and [`DohBackend`] speaks the JSON
//!   flavor of DNS over HTTPS.
//! * [`resolve()`] is the engine itself, usable with any backend, and
//!   [`matches()`] tells whether an address has anything left to
//!   resolve.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use madns::{MockBackend, Resolver};
//!
//! let backend = MockBackend::new()
//!     .ip("example.com", ["192.0.2.1".parse()?]);
//! let resolver = Resolver::new(backend);
//!
//! let addr: madns::Multiaddr = "/dns4/example.com/tcp/443".parse()?;
//! let resolved = resolver.resolve(&addr).await?;
//! assert_eq!(resolved[0].to_string(), "/ip4/192.0.2.1/tcp/443");
//! # Ok(())
//! # }
//! ```
//!
//! Resolution is one pass: a `dnsaddr` TXT record may itself carry DNS
//! segments, and those come back unresolved. Callers that want full
//! expansion iterate while [`matches()`] is true for any result.
//!
//! # Reference of feature flags
//!
//! * `system`: enables [`SystemBackend`], a backend built on
//!   [hickory-resolver](https://github.com/hickory-dns/hickory-dns),
//!   and with it [`Resolver::system`]. Enabled by default.
//! * `doh`: enables [`DohBackend`], built on
//!   [reqwest](https://github.com/seanmonstar/reqwest). Enabled by
//!   default.
//! * `bin`: builds the `madns` command line tool.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
#[cfg(feature = "doh")]
#[cfg_attr(docsrs, doc(cfg(feature = "doh")))]
pub mod doh;
mod forge;
mod resolve;
pub mod resolver;

pub use self::backend::{Backend, LookupError, MockBackend};
#[cfg(feature = "system")]
pub use self::backend::SystemBackend;
#[cfg(feature = "doh")]
pub use self::doh::DohBackend;
pub use self::resolve::{matches, resolve};
pub use self::resolver::{BuildError, Resolver, ResolverBuilder};

pub use multiaddr::Multiaddr;

/// Re-exported for implementing [`Backend`] outside this crate.
pub use async_trait::async_trait;
