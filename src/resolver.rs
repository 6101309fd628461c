//! The resolver.
//!
//! A [`Resolver`] owns the backends that answer DNS questions and
//! routes every lookup to the right one: hostnames under a configured
//! domain go to the backend registered for the longest matching
//! suffix, everything else goes to the default backend, and domains
//! that carry their own answer in their labels are resolved without
//! any backend at all. Since the resolver implements [`Backend`]
//! itself, it plugs into the resolution engine and into other
//! resolvers.
//!
//! ```no_run
//! # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
//! use madns::Resolver;
//!
//! let resolver = Resolver::system();
//! let addr = "/dnsaddr/bootstrap.libp2p.io".parse()?;
//! for addr in resolver.resolve(&addr).await? {
//!     println!("{}", addr);
//! }
//! # Ok(())
//! # }
//! ```

use crate::backend::{Backend, LookupError};
use crate::forge;
use crate::resolve;
use async_trait::async_trait;
use multiaddr::Multiaddr;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::{error, fmt};
use tracing::trace;

#[cfg(feature = "system")]
use crate::backend::SystemBackend;

//------------ Resolver ------------------------------------------------------

/// A dispatching resolver for multiaddresses.
///
/// Routing is fixed at construction; afterwards the resolver is
/// immutable and safe to share between tasks. Build one with
/// [`builder`][Self::builder], or with [`new`][Self::new] when a
/// single backend is all there is.
pub struct Resolver {
    /// The backend for hostnames no domain entry covers.
    default: Arc<dyn Backend>,

    /// Backends keyed by normalized domain suffix.
    domains: HashMap<String, Arc<dyn Backend>>,

    /// The cap on the number of addresses a resolution returns.
    max_resolved_addrs: usize,
}

impl Resolver {
    /// Starts building a resolver.
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    /// Creates a resolver that sends every lookup to one backend.
    pub fn new(default: impl Backend + 'static) -> Self {
        Resolver {
            default: Arc::new(default),
            domains: HashMap::new(),
            max_resolved_addrs: resolve::MAX_RESOLVED_ADDRS,
        }
    }

    /// Creates a resolver around the system's DNS configuration.
    #[cfg(feature = "system")]
    pub fn system() -> Self {
        Self::new(SystemBackend::new())
    }

    /// Resolves the DNS segments of an address.
    ///
    /// One pass over the address; see [`resolve`][crate::resolve()]
    /// for the exact semantics. Lookups go through this resolver's
    /// routing table and results are capped at its configured limit.
    pub async fn resolve(
        &self,
        addr: &Multiaddr,
    ) -> Result<Vec<Multiaddr>, LookupError> {
        resolve::resolve(self, addr, self.max_resolved_addrs).await
    }

    /// Picks the backend for a hostname.
    ///
    /// Walks the hostname's suffixes from longest to shortest; the
    /// first one with an entry wins, so a more specific domain shadows
    /// a broader one.
    fn backend_for(&self, host: &str) -> &dyn Backend {
        if !self.domains.is_empty() {
            let host = normalize_domain(host);
            let mut suffix = host.as_str();
            loop {
                if let Some(backend) = self.domains.get(suffix) {
                    return backend.as_ref();
                }
                match suffix.split_once('.') {
                    Some((_, rest)) => suffix = rest,
                    None => break,
                }
            }
        }
        self.default.as_ref()
    }
}

#[cfg(feature = "system")]
impl Default for Resolver {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut domains: Vec<_> = self.domains.keys().collect();
        domains.sort();
        f.debug_struct("Resolver")
            .field("domains", &domains)
            .field("max_resolved_addrs", &self.max_resolved_addrs)
            .finish_non_exhaustive()
    }
}

//--- Backend

#[async_trait]
impl Backend for Resolver {
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        if let Some(labels) = forge::parse_forge_domain(host) {
            match forge::resolve_forge_domain(host, &labels) {
                Ok(addrs) => return Ok(addrs),
                Err(err) => {
                    // A bad encoding falls through to regular DNS.
                    trace!(%host, %err, "offline resolution failed");
                }
            }
        }
        self.backend_for(host).lookup_ip_addr(host).await
    }

    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError> {
        self.backend_for(host).lookup_txt(host).await
    }
}

//------------ ResolverBuilder -----------------------------------------------

/// A builder for [`Resolver`] values.
///
/// The default backend is the one piece that must be provided;
/// [`build`][Self::build] fails without it.
#[derive(Default)]
pub struct ResolverBuilder {
    default: Option<Arc<dyn Backend>>,
    domains: HashMap<String, Arc<dyn Backend>>,
    max_resolved_addrs: Option<usize>,
}

impl ResolverBuilder {
    /// Creates a builder with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend for hostnames no domain entry covers.
    pub fn default_backend(
        mut self,
        backend: impl Backend + 'static,
    ) -> Self {
        self.default = Some(Arc::new(backend));
        self
    }

    /// Routes hostnames under `domain` to a dedicated backend.
    ///
    /// `domain` matches itself and everything below it; when several
    /// registered domains match a hostname, the most specific one is
    /// used. Registering the same domain again replaces its backend.
    pub fn domain_backend(
        mut self,
        domain: &str,
        backend: impl Backend + 'static,
    ) -> Self {
        self.domains
            .insert(normalize_domain(domain), Arc::new(backend));
        self
    }

    /// Overrides the cap on the number of resolved addresses.
    ///
    /// The default is 100.
    pub fn max_resolved_addrs(mut self, limit: usize) -> Self {
        self.max_resolved_addrs = Some(limit);
        self
    }

    /// Builds the resolver.
    pub fn build(self) -> Result<Resolver, BuildError> {
        let default =
            self.default.ok_or(BuildError::MissingDefaultBackend)?;
        Ok(Resolver {
            default,
            domains: self.domains,
            max_resolved_addrs: self
                .max_resolved_addrs
                .unwrap_or(resolve::MAX_RESOLVED_ADDRS),
        })
    }
}

impl fmt::Debug for ResolverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut domains: Vec<_> = self.domains.keys().collect();
        domains.sort();
        f.debug_struct("ResolverBuilder")
            .field("has_default", &self.default.is_some())
            .field("domains", &domains)
            .field("max_resolved_addrs", &self.max_resolved_addrs)
            .finish()
    }
}

//------------ BuildError ----------------------------------------------------

/// An error building a [`Resolver`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildError {
    /// No default backend was configured.
    MissingDefaultBackend,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingDefaultBackend => {
                write!(f, "a resolver needs a default backend")
            }
        }
    }
}

impl error::Error for BuildError {}

//------------ Helpers -------------------------------------------------------

/// Normalizes a domain for routing comparisons.
///
/// DNS names compare without regard to ASCII case or a trailing dot.
fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

//============ Test ==========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::MockBackend;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const PEER_ID: &str =
        "k51qzi5uqu5dj2c294cab64yiq2ri684kc5sr9odfhoo84osl4resldwfy8u5r";

    #[tokio::test]
    async fn routing_prefers_the_longest_suffix() {
        let default = MockBackend::new().ip("example.com", [ip("1.2.3.4")]);
        let custom = MockBackend::new()
            .ip("custom.test", [ip("2.3.4.5")])
            .ip("another.custom.test", [ip("3.4.5.6")])
            .ip("more.custom.test", [ip("6.8.9.10")]);
        let more_custom = MockBackend::new()
            .ip("more.custom.test", [ip("4.5.6.8")])
            .ip("some.more.custom.test", [ip("5.6.8.9")]);

        let resolver = Resolver::builder()
            .default_backend(default)
            .domain_backend("custom.test", custom)
            .domain_backend("more.custom.test", more_custom)
            .build()
            .unwrap();

        for (host, expected) in [
            ("example.com", "1.2.3.4"),
            ("custom.test", "2.3.4.5"),
            ("another.custom.test", "3.4.5.6"),
            // more.custom.test shadows custom.test here.
            ("more.custom.test", "4.5.6.8"),
            ("some.more.custom.test", "5.6.8.9"),
        ] {
            assert_eq!(
                resolver.lookup_ip_addr(host).await.unwrap(),
                vec![ip(expected)],
                "{}",
                host
            );
        }
    }

    #[tokio::test]
    async fn routing_ignores_case_and_trailing_dot() {
        let resolver = Resolver::builder()
            .default_backend(MockBackend::new())
            .domain_backend(
                "Custom.Test.",
                MockBackend::new().ip("sub.custom.test", [ip("2.3.4.5")]),
            )
            .build()
            .unwrap();

        assert_eq!(
            resolver.lookup_ip_addr("sub.custom.test").await.unwrap(),
            vec![ip("2.3.4.5")]
        );
    }

    #[tokio::test]
    async fn txt_lookups_route_too() {
        let resolver = Resolver::builder()
            .default_backend(MockBackend::new())
            .domain_backend(
                "custom.test",
                MockBackend::new()
                    .txt("_dnsaddr.sub.custom.test", ["dnsaddr=/tcp/1"]),
            )
            .build()
            .unwrap();

        assert_eq!(
            resolver.lookup_txt("_dnsaddr.sub.custom.test").await.unwrap(),
            vec!["dnsaddr=/tcp/1".to_string()]
        );
    }

    #[tokio::test]
    async fn peer_identified_domains_skip_the_backend() {
        // The backend knows nothing; the answer is in the name.
        let resolver = Resolver::new(MockBackend::new());

        let host = format!("192-0-2-1.{}.libp2p.direct", PEER_ID);
        assert_eq!(
            resolver.lookup_ip_addr(&host).await.unwrap(),
            vec![ip("192.0.2.1")]
        );

        let host = format!("0--1.{}.libp2p.direct", PEER_ID);
        assert_eq!(
            resolver.lookup_ip_addr(&host).await.unwrap(),
            vec![ip("::1")]
        );

        // Any suffix will do.
        let host = format!("203-0-113-42.{}.peer.example.org", PEER_ID);
        assert_eq!(
            resolver.lookup_ip_addr(&host).await.unwrap(),
            vec![ip("203.0.113.42")]
        );
    }

    #[tokio::test]
    async fn bad_ip_labels_fall_through_to_dns() {
        let empty = Resolver::new(MockBackend::new());
        let host = format!("invalid-ip.{}.libp2p.direct", PEER_ID);
        assert!(empty.lookup_ip_addr(&host).await.unwrap().is_empty());

        // With a record under the full name, the fallback finds it.
        let host = format!("fallback.{}.libp2p.direct", PEER_ID);
        let resolver = Resolver::new(
            MockBackend::new().ip(host.clone(), [ip("192.0.2.1")]),
        );
        assert_eq!(
            resolver.lookup_ip_addr(&host).await.unwrap(),
            vec![ip("192.0.2.1")]
        );
    }

    #[tokio::test]
    async fn domains_without_peer_ids_use_the_backend() {
        let resolver = Resolver::new(MockBackend::new());
        assert!(resolver
            .lookup_ip_addr("192-0-2-1.libp2p.direct")
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn building_without_a_default_backend_fails() {
        assert_eq!(
            Resolver::builder()
                .domain_backend("custom.test", MockBackend::new())
                .build()
                .err(),
            Some(BuildError::MissingDefaultBackend)
        );
    }
}
