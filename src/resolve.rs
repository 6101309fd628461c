//! Resolving the DNS segments of a multiaddress.
//!
//! A multiaddress may name its host through one of four DNS-bearing
//! protocols. `dns4`, `dns6` and `dns` stand for the A records, the
//! AAAA records, or both, of the host they carry; `dnsaddr` stands for
//! the multiaddresses published in TXT records under the `_dnsaddr.`
//! label of its host. The [`resolve`] function replaces every such
//! segment with the alternatives a backend returns and hands back the
//! cross product, so that `/dns4/a.example/tcp/443/dns6/b.example`
//! becomes one address per A-record/AAAA-record pair, left segment
//! varying slowest.
//!
//! Resolution is a single pass. A `dnsaddr` TXT record may itself
//! contain DNS segments; those come back unresolved, and callers that
//! want full expansion iterate while [`matches`] reports work left to
//! do. One pass never issues more than one lookup per DNS segment of
//! its input, which keeps the cost of a call easy to reason about.

use crate::backend::{Backend, LookupError};
use multiaddr::{Multiaddr, Protocol};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, trace};

/// The largest number of addresses a resolution returns.
///
/// Cross products grow quickly; everything beyond this many addresses
/// is silently cut off. The cut keeps the front of the list, so the
/// result is a prefix of the untruncated expansion.
pub(crate) const MAX_RESOLVED_ADDRS: usize = 100;

/// The label under which `dnsaddr` TXT records are published.
const DNSADDR_PREFIX: &str = "_dnsaddr.";

//------------ matches -------------------------------------------------------

/// Returns whether an address has any DNS segment left to resolve.
pub fn matches(addr: &Multiaddr) -> bool {
    addr.iter().any(|p| is_resolvable(&p))
}

/// Returns whether a single component is a DNS segment.
fn is_resolvable(proto: &Protocol<'_>) -> bool {
    matches!(
        proto,
        Protocol::Dns(_)
            | Protocol::Dns4(_)
            | Protocol::Dns6(_)
            | Protocol::Dnsaddr(_)
    )
}

//------------ resolve -------------------------------------------------------

/// Resolves the DNS segments of an address against a backend.
///
/// Returns every combination of the alternatives the backend offered,
/// in backend order with the leftmost segment varying slowest, capped
/// at `limit` addresses. An address without DNS segments comes back
/// as the only element of the result; an empty address yields an
/// empty result.
///
/// A DNS segment for which the backend has no records makes the whole
/// result empty: there is nothing the address can be dialed as. That
/// is not an error. Errors are whatever the backend fails with, and
/// the first one aborts the resolution.
///
/// The [`Resolver`][crate::Resolver] method of the same name wires in
/// its own routing table and limit; this function is the way to run
/// the engine over a bare backend.
pub async fn resolve<B: Backend + ?Sized>(
    backend: &B,
    addr: &Multiaddr,
    limit: usize,
) -> Result<Vec<Multiaddr>, LookupError> {
    let mut results: Vec<Multiaddr> = Vec::new();
    let mut remaining = addr.clone();

    loop {
        // Split off the prefix up to the first DNS segment.
        let at = remaining.iter().position(|p| is_resolvable(&p));
        let (keep, rest): (Multiaddr, Multiaddr) = match at {
            Some(at) => (
                remaining.iter().take(at).collect(),
                remaining.iter().skip(at).collect(),
            ),
            None => (remaining.clone(), Multiaddr::empty()),
        };

        // The prefix survives into every result gathered so far.
        if !keep.is_empty() {
            if results.is_empty() {
                results.push(keep);
            } else {
                for result in &mut results {
                    for proto in keep.iter() {
                        result.push(proto);
                    }
                }
            }
        }

        let mut rest_iter = rest.iter();
        let resolving = match rest_iter.next() {
            Some(proto) => proto,
            None => break,
        };
        remaining = rest_iter.collect();

        let resolved = match &resolving {
            Protocol::Dns4(host) => {
                ip_components(backend, host.as_ref(), Family::V4, limit)
                    .await?
            }
            Protocol::Dns6(host) => {
                ip_components(backend, host.as_ref(), Family::V6, limit)
                    .await?
            }
            Protocol::Dns(host) => {
                ip_components(backend, host.as_ref(), Family::Both, limit)
                    .await?
            }
            Protocol::Dnsaddr(host) => {
                let name = format!("{}{}", DNSADDR_PREFIX, host);
                let records = backend.lookup_txt(&name).await?;
                let matched =
                    match_dnsaddr_records(records, &remaining, limit);
                // The trailer was the matcher; it is used up now.
                remaining = Multiaddr::empty();
                matched
            }
            proto => unreachable!("split stopped at non-DNS segment {proto}"),
        };

        if resolved.is_empty() {
            debug!(segment = %resolving, "no records, address unreachable");
            return Ok(Vec::new());
        }

        if results.is_empty() {
            results = resolved;
        } else {
            results = cross(&results, &resolved, limit);
        }
    }

    Ok(results)
}

//------------ ip_components -------------------------------------------------

/// The address families a DNS segment accepts.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Family {
    V4,
    V6,
    Both,
}

/// Looks up a host and turns its records into `ip4`/`ip6` components.
///
/// Records arrive as plain addresses, so an IPv4-mapped IPv6 record
/// counts as IPv4.
async fn ip_components<B: Backend + ?Sized>(
    backend: &B,
    host: &str,
    family: Family,
    limit: usize,
) -> Result<Vec<Multiaddr>, LookupError> {
    let records = backend.lookup_ip_addr(host).await?;

    let mut resolved = Vec::new();
    for record in records {
        let proto = match as_ipv4(record) {
            Some(ip) => {
                if family == Family::V6 {
                    continue;
                }
                Protocol::Ip4(ip)
            }
            None => {
                if family == Family::V4 {
                    continue;
                }
                let IpAddr::V6(ip) = record else { continue };
                Protocol::Ip6(ip)
            }
        };
        resolved.push(Multiaddr::empty().with(proto));
        if resolved.len() == limit {
            break;
        }
    }
    Ok(resolved)
}

/// Returns the IPv4 address a record carries, if it carries one.
fn as_ipv4(record: IpAddr) -> Option<Ipv4Addr> {
    match record {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    }
}

//------------ match_dnsaddr_records -----------------------------------------

/// Picks the published addresses that end in the wanted trailer.
///
/// Each record must carry the literal `dnsaddr=` prefix followed by a
/// multiaddress; anything else is skipped, as is anything that fails
/// to parse. With a non-empty trailer, an address qualifies only if
/// its last components equal the trailer exactly, component for
/// component. Qualifying addresses are returned as published,
/// trailer included.
fn match_dnsaddr_records(
    records: Vec<String>,
    trailer: &Multiaddr,
    limit: usize,
) -> Vec<Multiaddr> {
    let trailer_len = trailer.iter().count();

    let mut resolved = Vec::new();
    for record in records {
        let Some(value) = record.strip_prefix("dnsaddr=") else {
            trace!(%record, "skipping TXT record without dnsaddr prefix");
            continue;
        };
        let candidate: Multiaddr = match value.parse() {
            Ok(addr) => addr,
            Err(err) => {
                debug!(%record, %err, "skipping unparseable dnsaddr record");
                continue;
            }
        };

        if !trailer.is_empty() {
            let candidate_len = candidate.iter().count();
            if candidate_len < trailer_len {
                continue;
            }
            let tail: Multiaddr = candidate
                .iter()
                .skip(candidate_len - trailer_len)
                .collect();
            if &tail != trailer {
                continue;
            }
        }

        resolved.push(candidate);
        if resolved.len() == limit {
            break;
        }
    }
    resolved
}

//------------ cross ---------------------------------------------------------

/// Combines every gathered address with every new alternative.
///
/// Keeps the order of both lists, left list varying slowest, and stops
/// once `limit` combinations exist. Everything an earlier step put
/// into `results` is a prefix of what comes out, so cutting here cuts
/// the same addresses a cut of the full product would.
fn cross(
    results: &[Multiaddr],
    resolved: &[Multiaddr],
    limit: usize,
) -> Vec<Multiaddr> {
    let mut crossed =
        Vec::with_capacity((results.len() * resolved.len()).min(limit));
    for left in results {
        for right in resolved {
            let mut joined = left.clone();
            for proto in right.iter() {
                joined.push(proto);
            }
            crossed.push(joined);
            if crossed.len() == limit {
                return crossed;
            }
        }
    }
    crossed
}

//============ Test ==========================================================
