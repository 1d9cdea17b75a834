//! The `ServerContext` in this module holds the common state across the server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::dns::authority::Authority;
use crate::dns::resolve::{DnsResolver, ZoneResolver};

#[derive(Default)]
pub struct ServerStatistics {
    /// Datagrams received, well formed or not
    pub udp_query_count: AtomicUsize,
    /// Datagrams dropped because they could not be decoded
    pub malformed_count: AtomicUsize,
    /// Responses handed to the socket
    pub response_count: AtomicUsize,
}

impl ServerStatistics {
    pub fn get_udp_query_count(&self) -> usize {
        self.udp_query_count.load(Ordering::Acquire)
    }

    pub fn get_malformed_count(&self) -> usize {
        self.malformed_count.load(Ordering::Acquire)
    }

    pub fn get_response_count(&self) -> usize {
        self.response_count.load(Ordering::Acquire)
    }
}

/// Server configuration and shared state
///
/// The record store is wrapped in an `Arc` and never mutated after startup,
/// so request threads read it without locking.
pub struct ServerContext {
    pub authority: Arc<Authority>,
    pub listen_host: String,
    pub dns_port: u16,
    /// Upper bound (exclusive, in whole seconds) of the random delay added
    /// before each response. Zero disables the delay.
    pub max_delay_secs: u64,
    pub statistics: ServerStatistics,
}

impl ServerContext {
    pub fn new(authority: Authority) -> ServerContext {
        ServerContext {
            authority: Arc::new(authority),
            listen_host: "127.0.0.1".to_string(),
            dns_port: 53,
            max_delay_secs: 0,
            statistics: ServerStatistics::default(),
        }
    }

    pub fn create_resolver(&self) -> Box<dyn DnsResolver> {
        Box::new(ZoneResolver::new(self.authority.clone()))
    }
}
