//! DNS backends.
//!
//! A backend answers the two kinds of DNS questions the resolution
//! engine asks: address lookups and TXT lookups. The [`Backend`] trait
//! captures that contract. Three implementations live in this crate:
//! an in-memory [`MockBackend`] for tests, a [`SystemBackend`] that
//! queries the name servers the host is configured with, and a
//! DNS-over-HTTPS client in the [doh][crate::doh] module. The
//! [`Resolver`][crate::Resolver] dispatcher implements the trait as
//! well, so backends compose.
//!
//! All lookups are asynchronous. Cancellation is dropping the returned
//! future; callers that need a deadline wrap the call in a timeout.
//! Implementations must be safe for concurrent use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::{error, fmt, io};

#[cfg(feature = "system")]
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig};
#[cfg(feature = "system")]
use hickory_resolver::name_server::TokioConnectionProvider;
#[cfg(feature = "system")]
use hickory_resolver::proto::{ProtoError, ProtoErrorKind};
#[cfg(feature = "system")]
use hickory_resolver::{ResolveError, ResolveErrorKind, TokioResolver};
#[cfg(feature = "system")]
use tracing::warn;

//------------ Backend -------------------------------------------------------

/// A source of DNS records.
///
/// The contract is deliberately small: return a possibly empty list on
/// success and an error only for transport or protocol failure. A name
/// that does not exist is an empty list, not an error.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Looks up the IP addresses of a host name.
    ///
    /// Returns the A and AAAA records the backend knows about, in the
    /// order the backend chose. Callers filter by address family.
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError>;

    /// Looks up the TXT records of a host name.
    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        (**self).lookup_ip_addr(host).await
    }

    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError> {
        (**self).lookup_txt(host).await
    }
}

//------------ LookupError ---------------------------------------------------

/// An error returned by a [`Backend`] lookup.
///
/// The type is cheap to clone; underlying causes are kept behind arcs.
#[derive(Clone, Debug)]
pub enum LookupError {
    /// An I/O error from the transport underneath a backend.
    Io(Arc<io::Error>),

    /// The recursive resolver reported a failure.
    #[cfg(feature = "system")]
    Dns(Arc<ResolveError>),

    /// The HTTP request to a DNS-over-HTTPS endpoint failed.
    #[cfg(feature = "doh")]
    Http(Arc<reqwest::Error>),

    /// A DNS-over-HTTPS endpoint answered with a non-success status.
    #[cfg(feature = "doh")]
    Status(u16),

    /// The leftmost label of a peer-identified domain is not a valid
    /// hyphen-encoded IP address.
    InvalidIpEncoding {
        /// The domain whose leftmost label failed to decode.
        domain: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Io(err) => fmt::Display::fmt(err, f),
            #[cfg(feature = "system")]
            LookupError::Dns(err) => fmt::Display::fmt(err, f),
            #[cfg(feature = "doh")]
            LookupError::Http(err) => fmt::Display::fmt(err, f),
            #[cfg(feature = "doh")]
            LookupError::Status(status) => {
                write!(f, "resolver endpoint returned HTTP status {}", status)
            }
            LookupError::InvalidIpEncoding { domain } => {
                write!(f, "{}: invalid IP encoding in p2p-forge domain", domain)
            }
        }
    }
}

impl error::Error for LookupError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LookupError::Io(err) => Some(err.as_ref()),
            #[cfg(feature = "system")]
            LookupError::Dns(err) => Some(err.as_ref()),
            #[cfg(feature = "doh")]
            LookupError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for LookupError {
    fn from(err: io::Error) -> Self {
        LookupError::Io(Arc::new(err))
    }
}

#[cfg(feature = "system")]
impl From<ResolveError> for LookupError {
    fn from(err: ResolveError) -> Self {
        LookupError::Dns(Arc::new(err))
    }
}

#[cfg(feature = "doh")]
impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Http(Arc::new(err))
    }
}

//------------ MockBackend ---------------------------------------------------

/// A backend answering from two in-memory maps.
///
/// Hosts without an entry yield empty results, not errors, the same
/// way a live backend treats names that do not exist. Intended for
/// tests:
///
/// ```
/// use madns::MockBackend;
///
/// let backend = MockBackend::new()
///     .ip("example.com", ["192.0.2.1".parse().unwrap()])
///     .txt("_dnsaddr.example.com", ["dnsaddr=/ip4/192.0.2.1/tcp/443"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    ip: HashMap<String, Vec<IpAddr>>,
    txt: HashMap<String, Vec<String>>,
}

impl MockBackend {
    /// Creates a backend with no records at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds address records for a host, replacing earlier ones.
    pub fn ip(
        mut self,
        host: impl Into<String>,
        records: impl IntoIterator<Item = IpAddr>,
    ) -> Self {
        self.ip.insert(host.into(), records.into_iter().collect());
        self
    }

    /// Adds TXT records for a host, replacing earlier ones.
    ///
    /// Note that TXT records for `dnsaddr` resolution live under the
    /// `_dnsaddr.` label, so that is the host name to register here.
    pub fn txt<S: Into<String>>(
        mut self,
        host: impl Into<String>,
        records: impl IntoIterator<Item = S>,
    ) -> Self {
        self.txt.insert(
            host.into(),
            records.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        Ok(self.ip.get(host).cloned().unwrap_or_default())
    }

    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError> {
        Ok(self.txt.get(host).cloned().unwrap_or_default())
    }
}

//------------ SystemBackend -------------------------------------------------

/// A backend that asks the name servers the host is configured with.
///
/// Reads the system configuration (`/etc/resolv.conf` on Unix) when
/// possible and falls back to well-known public servers otherwise.
/// Address lookups request both families, so `dns` segments expand to
/// IPv4 and IPv6 alternatives alike.
#[cfg(feature = "system")]
#[derive(Debug)]
pub struct SystemBackend {
    resolver: TokioResolver,
}

#[cfg(feature = "system")]
impl SystemBackend {
    /// Creates a backend from the system configuration.
    pub fn new() -> Self {
        let mut builder = match TokioResolver::builder_tokio() {
            Ok(builder) => builder,
            Err(err) => {
                warn!(
                    error = %err,
                    "cannot read system DNS configuration, using defaults"
                );
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            }
        };
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        SystemBackend {
            resolver: builder.build(),
        }
    }

    /// Creates a backend around an already configured resolver.
    ///
    /// The resolver's lookup strategy decides which address families a
    /// `dns` segment can expand to.
    pub fn from_resolver(resolver: TokioResolver) -> Self {
        SystemBackend { resolver }
    }
}

#[cfg(feature = "system")]
impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system")]
#[async_trait]
impl Backend for SystemBackend {
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(err) if is_no_records(&err) => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError> {
        let lookup = match self.resolver.txt_lookup(host).await {
            Ok(lookup) => lookup,
            Err(err) if is_no_records(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut records = Vec::new();
        for txt in lookup.iter() {
            // The character-strings of one record form one value.
            let mut value = String::new();
            for part in txt.txt_data() {
                value.push_str(&String::from_utf8_lossy(part));
            }
            records.push(value);
        }
        Ok(records)
    }
}

/// Returns whether an error merely says that the name has no records.
///
/// The backend contract wants those reported as an empty answer.
#[cfg(feature = "system")]
fn is_no_records(err: &ResolveError) -> bool {
    match err.kind() {
        ResolveErrorKind::Proto(ProtoError { kind, .. }) => {
            matches!(kind.as_ref(), ProtoErrorKind::NoRecordsFound { .. })
        }
        _ => false,
    }
}

//============ Test ==========================================================
