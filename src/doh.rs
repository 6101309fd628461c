//! A DNS-over-HTTPS backend.
//!
//! [`DohBackend`] is a thin client for the JSON flavor of DNS over
//! HTTPS that the large public resolvers speak: one GET per question,
//! `name` and `type` as query parameters, answers as a JSON document.
//! It carries none of the DNS wire format and no connection state
//! beyond what the HTTP client pools.

use crate::backend::{Backend, LookupError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::net::IpAddr;
use tracing::debug;

/// The record type number of an A record.
const TYPE_A: u16 = 1;

/// The record type number of a TXT record.
const TYPE_TXT: u16 = 16;

//------------ DohBackend ----------------------------------------------------

/// A backend that asks a JSON DNS-over-HTTPS endpoint.
///
/// Address lookups query A records, so this backend only ever yields
/// IPv4 addresses; `dns6` segments resolved through it come up empty.
#[derive(Clone, Debug)]
pub struct DohBackend {
    endpoint: Url,
    client: Client,
}

impl DohBackend {
    /// Creates a backend for the given endpoint.
    ///
    /// The endpoint is the full query URL without parameters, e.g.
    /// `https://dns.google/resolve`.
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    /// Creates a backend that reuses an existing HTTP client.
    pub fn with_client(endpoint: Url, client: Client) -> Self {
        DohBackend { endpoint, client }
    }

    /// Creates a backend for Google's public endpoint.
    pub fn google() -> Self {
        Self::new(
            Url::parse("https://dns.google/resolve")
                .expect("well-formed endpoint URL"),
        )
    }

    /// Runs one query and returns the data of the matching answers.
    async fn query(
        &self,
        name: &str,
        rtype: u16,
    ) -> Result<Vec<String>, LookupError> {
        let type_param = rtype.to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("name", name), ("type", type_param.as_str())])
            .header("accept", "application/dns-json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: Response = response.json().await?;
        Ok(body.answers(rtype))
    }
}

#[async_trait]
impl Backend for DohBackend {
    async fn lookup_ip_addr(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>, LookupError> {
        let records = self.query(host, TYPE_A).await?;
        Ok(records
            .into_iter()
            .filter_map(|data| match data.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    debug!(%host, %data, "skipping unparseable A record");
                    None
                }
            })
            .collect())
    }

    async fn lookup_txt(
        &self,
        host: &str,
    ) -> Result<Vec<String>, LookupError> {
        let records = self.query(host, TYPE_TXT).await?;
        Ok(records
            .into_iter()
            .map(|data| data.trim_matches('"').to_string())
            .collect())
    }
}

//------------ Response ------------------------------------------------------

/// The part of a DNS JSON response this backend reads.
#[derive(Clone, Debug, Deserialize)]
struct Response {
    /// The answer section; missing on negative responses.
    #[serde(default, rename = "Answer")]
    answer: Vec<Answer>,
}

/// One answer record.
#[derive(Clone, Debug, Deserialize)]
struct Answer {
    /// The record type number.
    #[serde(rename = "type")]
    rtype: u16,

    /// The record data in presentation format.
    data: String,
}

impl Response {
    /// Returns the data of every answer of the wanted type.
    ///
    /// Endpoints interleave other types into the answer section, CNAME
    /// chains in particular; those are dropped here.
    fn answers(self, rtype: u16) -> Vec<String> {
        self.answer
            .into_iter()
            .filter(|answer| answer.rtype == rtype)
            .map(|answer| answer.data)
            .collect()
    }
}

//============ Test ==========================================================
