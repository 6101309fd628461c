//! Offline resolution of peer-identified domains.
//!
//! The p2p-forge convention hands out names of the shape
//! `<encoded-ip>.<peer-id>.<suffix>` where the second label is a
//! libp2p peer ID and the leftmost label spells out an IP address with
//! hyphens standing in for the separators that DNS labels cannot
//! carry. Such names need no network traffic at all: the answer is in
//! the name. The dispatcher consults this module before it talks to
//! any backend.
//!
//! IPv4 labels replace each dot with a hyphen (`203-0-113-42`). IPv6
//! labels replace each colon with a hyphen and a `::` zero-run with
//! `--`; because a DNS label must not begin or end with a hyphen, an
//! encoder may pad a leading run with `0--` and a trailing run with
//! `--0` (`0--1` for `::1`, `2001-db8--0` for `2001:db8::`).

use crate::backend::LookupError;
use cid::Cid;
use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The multicodec code for libp2p public keys.
const LIBP2P_KEY_CODEC: u64 = 0x72;

/// Conservative lower bound on the textual length of a peer ID.
const MIN_PEER_ID_LEN: usize = 42;

/// The shortest possible peer-identified domain.
///
/// Shortest IPv4 label `0-0-0-0`, a peer ID, a one-character suffix,
/// and the two separating dots.
const MIN_FORGE_DOMAIN_LEN: usize = 7 + 1 + MIN_PEER_ID_LEN + 1 + 1;

//------------ parse_forge_domain --------------------------------------------

/// Checks whether a domain has the peer-identified shape.
///
/// Returns the DNS labels of the domain if it does, `None` otherwise.
pub(crate) fn parse_forge_domain(domain: &str) -> Option<Vec<&str>> {
    // Too short to hold an IP label, a peer ID, and a suffix.
    if domain.len() < MIN_FORGE_DOMAIN_LEN {
        return None;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 3 {
        return None;
    }

    if !is_peer_id(labels[1]) {
        return None;
    }

    Some(labels)
}

//------------ is_peer_id ----------------------------------------------------

/// Returns whether a string is a textual libp2p peer ID.
///
/// A peer ID for our purposes is a CID whose codec is libp2p-key.
/// Base36 CIDv1 strings are the expected positive case; legacy base58
/// forms decode to a different codec or not at all and are rejected,
/// which keeps ordinary host names off the offline path.
pub(crate) fn is_peer_id(s: &str) -> bool {
    if s.len() < MIN_PEER_ID_LEN {
        return false;
    }
    match Cid::try_from(s) {
        Ok(cid) => cid.codec() == LIBP2P_KEY_CODEC,
        Err(_) => false,
    }
}

//------------ resolve_forge_domain ------------------------------------------

/// Resolves a peer-identified domain to the address it encodes.
///
/// `labels` are the labels [`parse_forge_domain`] returned for
/// `domain`. The IPv6 decoder runs first: it is the stricter of the
/// two, so labels such as `10-0-0-1` fall through to the IPv4 decoder
/// instead of being misread as truncated IPv6. Trying IPv4 first would
/// get ambiguous labels wrong.
pub(crate) fn resolve_forge_domain(
    domain: &str,
    labels: &[&str],
) -> Result<Vec<IpAddr>, LookupError> {
    let encoded = labels[0];

    if let Some(ip) = decode_ipv6(encoded) {
        return Ok(vec![IpAddr::V6(ip)]);
    }
    if let Some(ip) = decode_ipv4(encoded) {
        return Ok(vec![IpAddr::V4(ip)]);
    }

    Err(LookupError::InvalidIpEncoding {
        domain: domain.into(),
    })
}

//------------ decode_ipv4 ---------------------------------------------------

/// Decodes a hyphen-separated IPv4 label such as `192-0-2-1`.
fn decode_ipv4(encoded: &str) -> Option<Ipv4Addr> {
    encoded.replace('-', ".").parse().ok()
}

//------------ decode_ipv6 ---------------------------------------------------

/// Decodes a hyphen-separated IPv6 label.
///
/// Accepts the full eight-group form, a single condensed zero-run
/// written `--`, and the `0--`/`--0` padded variants of leading and
/// trailing runs. A label with more than one `--` turns into more than
/// one `::` and fails the final parse.
fn decode_ipv6(encoded: &str) -> Option<Ipv6Addr> {
    let mut label = Cow::Borrowed(encoded);
    if label.starts_with("0--") {
        label = Cow::Owned(label[1..].to_string());
    }
    if label.ends_with("--0") {
        let trimmed = label.len() - 1;
        label = Cow::Owned(label[..trimmed].to_string());
    }

    let addr = label.replace("--", "::").replace('-', ":");
    let ip: Ipv6Addr = addr.parse().ok()?;

    // An IPv4-mapped result means the label was not an IPv6 encoding.
    if ip.to_ipv4_mapped().is_some() {
        return None;
    }
    Some(ip)
}

//============ Test ==========================================================
