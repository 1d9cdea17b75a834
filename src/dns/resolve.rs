//! resolution of incoming queries against the local record store
//!
//! Rules, in order of precedence:
//!
//! 1. the name is an alias and the query asks for `CNAME`: answer the alias
//! 2. the name is an alias and the query asks for anything else: answer the
//!    alias, then resolve the same query type for the canonical name and
//!    append everything that produces
//! 3. the name holds records of the requested family: `A` records become
//!    answers, `NS` records become authorities with their addresses as glue
//! 4. otherwise refer: walk toward the root one label at a time and delegate
//!    to the first (closest) parent that has name servers

use std::sync::Arc;

use derive_more::{Display, Error};

use crate::dns::authority::{Authority, ROOT};
use crate::dns::protocol::{DnsRecord, QueryType};

/// Longest alias chain that will be followed
pub const MAX_ALIAS_DEPTH: usize = 16;

#[derive(Debug, Display, Error)]
pub enum ResolveError {
    #[display(fmt = "alias chain through {} is longer than {} links", _0, MAX_ALIAS_DEPTH)]
    AliasChainTooLong(#[error(not(source))] String),
}

type Result<T> = std::result::Result<T, ResolveError>;

/// The three record lists making up a response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub resources: Vec<DnsRecord>,
}

impl Resolution {
    pub fn new() -> Resolution {
        Resolution::default()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.authorities.is_empty() && self.resources.is_empty()
    }

    /// Append the lists of `other` after ours
    pub fn merge(&mut self, other: Resolution) {
        self.answers.extend(other.answers);
        self.authorities.extend(other.authorities);
        self.resources.extend(other.resources);
    }

    /// Add one authority record per name server of `zone`, each followed by
    /// glue for the addresses the store knows for it
    fn delegate(&mut self, authority: &Authority, zone: &str) {
        for host in authority.nameservers(zone) {
            self.authorities.push(DnsRecord::Ns {
                domain: zone.to_string(),
                host: host.clone(),
            });

            for addr in authority.addresses(host) {
                self.resources.push(DnsRecord::A {
                    domain: host.clone(),
                    addr: addr.clone(),
                });
            }
        }
    }
}

/// Common trait for resolvers handed out by the server context
pub trait DnsResolver {
    fn resolve(&self, qname: &str, qtype: QueryType) -> Result<Resolution>;
}

/// Resolves queries against a shared, read-only record store
#[derive(Clone)]
pub struct ZoneResolver {
    authority: Arc<Authority>,
}

impl ZoneResolver {
    pub fn new(authority: Arc<Authority>) -> ZoneResolver {
        ZoneResolver { authority }
    }
}

impl DnsResolver for ZoneResolver {
    fn resolve(&self, qname: &str, qtype: QueryType) -> Result<Resolution> {
        resolve(qtype, qname, &self.authority)
    }
}

/// Resolve `qname` for `qtype`
///
/// This is a pure function of its arguments: the same store and query always
/// produce the same lists in the same order.
pub fn resolve(qtype: QueryType, qname: &str, authority: &Authority) -> Result<Resolution> {
    resolve_with_depth(qtype, qname, authority, 0)
}

fn resolve_with_depth(
    qtype: QueryType,
    qname: &str,
    authority: &Authority,
    depth: usize,
) -> Result<Resolution> {
    let mut result = Resolution::new();

    if let Some(host) = authority.alias(qname) {
        result.answers.push(DnsRecord::Cname {
            domain: qname.to_string(),
            host: host.to_string(),
        });

        if qtype == QueryType::Cname {
            return Ok(result);
        }

        if depth >= MAX_ALIAS_DEPTH {
            log::warn!("Giving up on alias chain at {}", qname);
            return Err(ResolveError::AliasChainTooLong(qname.to_string()));
        }

        result.merge(resolve_with_depth(qtype, host, authority, depth + 1)?);
        return Ok(result);
    }

    match qtype {
        QueryType::A => {
            let addrs = authority.addresses(qname);
            if !addrs.is_empty() {
                result.answers.extend(addrs.iter().map(|addr| DnsRecord::A {
                    domain: qname.to_string(),
                    addr: addr.clone(),
                }));
                return Ok(result);
            }
        }
        QueryType::Ns => {
            if !authority.nameservers(qname).is_empty() {
                result.delegate(authority, qname);
                return Ok(result);
            }
        }
        QueryType::Cname => {}
    }

    match closest_delegation(qname, authority) {
        Some(zone) => {
            log::debug!("Referring {} to {}", qname, zone);
            result.delegate(authority, zone);
        }
        None => log::debug!("No referral possible for {}", qname),
    }

    Ok(result)
}

/// Find the closest strict parent of `qname` that has name servers
///
/// `a.b.c` checks `b.c`, then `c`, then the root. The name itself is not
/// considered.
fn closest_delegation<'a>(qname: &'a str, authority: &Authority) -> Option<&'a str> {
    let mut rest = qname;
    while let Some(idx) = rest.find('.') {
        rest = &rest[idx + 1..];
        if rest.is_empty() {
            break;
        }

        if !authority.nameservers(rest).is_empty() {
            return Some(rest);
        }
    }

    if authority.has_root_nameserver() {
        Some(ROOT)
    } else {
        None
    }
}
