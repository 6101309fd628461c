//! End-to-end resolution scenarios against the mock backend.

use madns::{
    async_trait, matches, Backend, LookupError, MockBackend, Multiaddr,
    Resolver,
};
use std::io;
use std::net::IpAddr;

fn ma(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn example_backend() -> MockBackend {
    MockBackend::new()
        .ip(
            "example.com",
            [
                ip("192.0.2.1"),
                ip("192.0.2.2"),
                ip("2001:db8::a3"),
                ip("2001:db8::a4"),
            ],
        )
        .txt(
            "_dnsaddr.matching.com",
            [
                "dnsaddr=/ip4/192.0.2.1/tcp/123/http",
                "dnsaddr=/ip4/192.0.2.1/tcp/123",
                "dnsaddr=/ip4/192.0.2.1/tcp/789/http",
                "not a dnsaddr",
                "dnsaddr=/foobar",
            ],
        )
}

/// Resolves until no DNS segments are left in any result.
///
/// One `resolve` call is a single pass; TXT records may introduce new
/// DNS segments that need further passes. This is the loop callers
/// run when they want addresses and nothing but addresses.
async fn resolve_fully(
    resolver: &Resolver,
    addr: &Multiaddr,
) -> Result<Vec<Multiaddr>, LookupError> {
    let mut done = Vec::new();
    let mut pending = vec![addr.clone()];
    while let Some(next) = pending.pop() {
        for resolved in resolver.resolve(&next).await? {
            if matches(&resolved) {
                pending.push(resolved);
            } else {
                done.push(resolved);
            }
        }
    }
    Ok(done)
}

#[tokio::test]
async fn dns_chains_expand_to_the_cross_product() {
    let resolver = Resolver::new(example_backend());
    let addrs = resolver
        .resolve(&ma("/dns4/example.com/quic/dns6/example.com"))
        .await
        .unwrap();

    assert_eq!(addrs.len(), 4);
    let mut expected = Vec::new();
    for v4 in ["192.0.2.1", "192.0.2.2"] {
        for v6 in ["2001:db8::a3", "2001:db8::a4"] {
            expected.push(ma(&format!("/ip4/{}/quic/ip6/{}", v4, v6)));
        }
    }
    assert_eq!(addrs, expected);
}

#[tokio::test]
async fn dnsaddr_catalogues_narrow_by_trailer() {
    let resolver = Resolver::new(example_backend());

    let addrs = resolver
        .resolve(&ma("/dnsaddr/matching.com/tcp/123/http"))
        .await
        .unwrap();
    assert_eq!(addrs, vec![ma("/ip4/192.0.2.1/tcp/123/http")]);

    let addrs = resolver
        .resolve(&ma("/dnsaddr/matching.com/tcp/123"))
        .await
        .unwrap();
    assert_eq!(addrs, vec![ma("/ip4/192.0.2.1/tcp/123")]);

    // Every result ends in the requested trailer.
    let trailer = ma("/tcp/123");
    let trailer_len = trailer.iter().count();
    for addr in &addrs {
        let len = addr.iter().count();
        let tail: Multiaddr = addr.iter().skip(len - trailer_len).collect();
        assert_eq!(tail, trailer);
    }
}

#[tokio::test]
async fn plain_addresses_come_back_alone() {
    let resolver = Resolver::new(example_backend());
    let addr = ma("/ip4/192.0.2.1/udp/4001/quic-v1");
    assert_eq!(resolver.resolve(&addr).await.unwrap(), vec![addr]);

    assert!(resolver
        .resolve(&Multiaddr::empty())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn txt_records_can_require_another_pass() {
    let backend = example_backend().txt(
        "_dnsaddr.bootstrap.test",
        [
            "dnsaddr=/dns4/example.com/tcp/4001",
            "dnsaddr=/ip4/203.0.113.7/tcp/4001",
        ],
    );
    let resolver = Resolver::new(backend);
    let addr = ma("/dnsaddr/bootstrap.test/tcp/4001");

    // A single pass leaves the dns4 record unexpanded.
    let first = resolver.resolve(&addr).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().any(matches));

    // The loop drives it to quiescence.
    let all = resolve_fully(&resolver, &addr).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|addr| !matches(addr)));
    for expected in [
        ma("/ip4/203.0.113.7/tcp/4001"),
        ma("/ip4/192.0.2.1/tcp/4001"),
        ma("/ip4/192.0.2.2/tcp/4001"),
    ] {
        assert!(all.contains(&expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn scoped_domains_resolve_through_their_backend() {
    let resolver = Resolver::builder()
        .default_backend(example_backend())
        .domain_backend(
            "custom.test",
            MockBackend::new().ip("sub.custom.test", [ip("203.0.113.1")]),
        )
        .build()
        .unwrap();

    let addrs = resolver
        .resolve(&ma("/dns4/sub.custom.test/tcp/443"))
        .await
        .unwrap();
    assert_eq!(addrs, vec![ma("/ip4/203.0.113.1/tcp/443")]);

    // Unscoped hostnames still hit the default backend.
    let addrs = resolver
        .resolve(&ma("/dns4/example.com"))
        .await
        .unwrap();
    assert_eq!(addrs.len(), 2);
}

#[tokio::test]
async fn the_cap_is_configurable() {
    let records: Vec<IpAddr> =
        (1..=20u8).map(|i| ip(&format!("192.0.2.{}", i))).collect();
    let resolver = Resolver::builder()
        .default_backend(MockBackend::new().ip("example.com", records))
        .max_resolved_addrs(5)
        .build()
        .unwrap();

    let addrs = resolver
        .resolve(&ma("/dns4/example.com"))
        .await
        .unwrap();
    assert_eq!(addrs.len(), 5);
    // The cap keeps the front of the record list.
    assert_eq!(addrs[0], ma("/ip4/192.0.2.1"));
    assert_eq!(addrs[4], ma("/ip4/192.0.2.5"));
}

/// A backend whose lookups always fail.
struct BrokenBackend;

#[async_trait]
impl Backend for BrokenBackend {
    async fn lookup_ip_addr(
        &self,
        _host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "down").into())
    }

    async fn lookup_txt(
        &self,
        _host: &str,
    ) -> Result<Vec<String>, LookupError> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "down").into())
    }
}

#[tokio::test]
async fn backend_errors_abort_the_resolution() {
    let resolver = Resolver::new(BrokenBackend);

    assert!(resolver.resolve(&ma("/dns4/example.com")).await.is_err());
    assert!(resolver
        .resolve(&ma("/dnsaddr/example.com"))
        .await
        .is_err());

    // Addresses that need no lookup still pass through.
    let addr = ma("/ip4/192.0.2.1");
    assert_eq!(resolver.resolve(&addr).await.unwrap(), vec![addr]);
}

#[tokio::test]
async fn offline_domains_resolve_against_a_broken_backend() {
    let resolver = Resolver::new(BrokenBackend);
    let addr = ma(
        "/dns4/192-0-2-1.k51qzi5uqu5dj2c294cab64yiq2ri684kc5sr9odfhoo84o\
         sl4resldwfy8u5r.libp2p.direct/tcp/443",
    );
    assert_eq!(
        resolver.resolve(&addr).await.unwrap(),
        vec![ma("/ip4/192.0.2.1/tcp/443")]
    );
}
