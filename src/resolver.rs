//! Query resolution.
//!
//! A query is answered from the local record store when a pattern covers
//! the name with addresses of the requested family. Otherwise it is
//! forwarded to each upstream in turn and the first reply wins. When every
//! upstream fails the client still gets a well-formed, empty NOERROR reply.

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record};
use log::{debug, error, log_enabled, warn, Level};
use std::net::IpAddr;

use crate::config::{ServerConfig, DEFAULT_LOCAL_TTL};
use crate::errors::DnsError;
use crate::forwarder::Forwarder;
use crate::records::RecordStore;
use crate::upstream::UpstreamServer;

/// Resolves raw queries against local records and upstream servers.
///
/// A resolver is immutable once built; reloading configuration means
/// building a new one.
#[derive(Debug)]
pub struct Resolver {
    records: RecordStore,
    upstreams: Vec<UpstreamServer>,
    forwarder: Forwarder,
    ttl: u32,
}

impl Resolver {
    pub fn new(records: RecordStore, upstreams: Vec<UpstreamServer>) -> Self {
        Self {
            records,
            upstreams,
            forwarder: Forwarder::default(),
            ttl: DEFAULT_LOCAL_TTL,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.records.clone(), config.upstreams.clone()).with_ttl(config.local_ttl)
    }

    /// Use a forwarder with a non-default port or timeout.
    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = forwarder;
        self
    }

    /// TTL put on answers built from local records.
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn upstreams(&self) -> &[UpstreamServer] {
        &self.upstreams
    }

    /// Resolve a raw query into raw response bytes.
    ///
    /// Fails only when the query itself cannot be parsed or carries no
    /// question; upstream failures are absorbed into an empty reply.
    pub async fn resolve(&self, query: &[u8]) -> Result<Vec<u8>, DnsError> {
        let request =
            Message::from_vec(query).map_err(|e| DnsError::MalformedQuery(e.to_string()))?;
        let question = request
            .queries()
            .first()
            .ok_or_else(|| DnsError::MalformedQuery("no question section".into()))?;

        let fqdn = question.name().to_ascii();
        let qname = fqdn.trim_end_matches('.');
        let qtype = question.query_type();
        let mut reply = build_reply(&request);

        if let Some(addrs) = self.records.lookup(qname, qtype) {
            debug!("Local hit: {} [{}] -> {:?}", qname, qtype, addrs);
            for ip in addrs {
                reply.add_answer(Record::from_rdata(
                    question.name().clone(),
                    self.ttl,
                    address_rdata(ip),
                ));
            }
            return encode(&reply);
        }

        debug!("Local miss: {} [{}]", qname, qtype);

        for upstream in &self.upstreams {
            match self.forwarder.forward(query, upstream.address).await {
                Ok(response) => {
                    if log_enabled!(Level::Debug) {
                        debug!(
                            "Upstream hit ({}): {} [{}] -> {:?}",
                            upstream.address,
                            qname,
                            qtype,
                            answer_addrs(&response)
                        );
                    }
                    return Ok(response);
                }
                Err(e) => warn!("Upstream {} failed for {}: {}", upstream.address, qname, e),
            }
        }

        if !self.upstreams.is_empty() {
            error!("All upstreams failed for {}", qname);
        }

        encode(&reply)
    }
}

/// Empty NOERROR reply carrying the request's ID, opcode and question.
fn build_reply(request: &Message) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_authoritative(true)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(ResponseCode::NoError);
    reply.add_queries(request.queries().iter().cloned());
    reply
}

fn address_rdata(ip: IpAddr) -> RData {
    match ip {
        IpAddr::V4(v4) => RData::A(A(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
    }
}

fn encode(reply: &Message) -> Result<Vec<u8>, DnsError> {
    reply
        .to_vec()
        .map_err(|e| DnsError::Protocol(e.to_string()))
}

/// Addresses carried in an upstream reply, for logging only.
fn answer_addrs(response: &[u8]) -> Vec<IpAddr> {
    let Ok(message) = Message::from_vec(response) else {
        return Vec::new();
    };
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::A(a)) => Some(IpAddr::V4(a.0)),
            Some(RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}
