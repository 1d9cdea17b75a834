//! Contains the data store for the local zone
//!
//! ## Record families
//!
//! The `Authority` keeps three independent mappings keyed by domain name:
//! - addresses (`A`): a name may have several, kept in insertion order
//! - name servers (`NS`): a name may have several, kept in insertion order
//! - aliases (`CNAME`): at most one per name, a later entry replaces an
//!   earlier one
//!
//! The root of the hierarchy is written `.`. Referrals only work if the store
//! holds at least one `NS` record for `.`, ideally with a matching address.
//!
//! ## Master file format
//!
//! One record per line, three whitespace separated fields:
//!
//! ```text
//! .               NS      ns1.root
//! ns1.root        A       198.41.0.4
//! www.example.com CNAME   example.com
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Other lines that do
//! not parse are logged and skipped; they never abort loading.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use derive_more::{Display, Error, From};

use crate::dns::protocol::{DnsRecord, QueryType};

#[derive(Debug, Display, From, Error)]
pub enum AuthorityError {
    Io(std::io::Error),
    #[display(fmt = "invalid record type given: {}", _0)]
    #[from(ignore)]
    InvalidRecordType(#[error(not(source))] String),
}

type Result<T> = std::result::Result<T, AuthorityError>;

/// Name of the root of the hierarchy
pub const ROOT: &str = ".";

#[derive(Clone, Debug, Default)]
pub struct Authority {
    addresses: HashMap<String, Vec<String>>,
    nameservers: HashMap<String, Vec<String>>,
    aliases: HashMap<String, String>,
}

impl Authority {
    pub fn new() -> Authority {
        Authority::default()
    }

    /// Store a record given as the three master file fields
    pub fn add_record(&mut self, domain: &str, rtype: &str, value: &str) -> Result<()> {
        let qtype = rtype
            .parse::<QueryType>()
            .map_err(|_| AuthorityError::InvalidRecordType(rtype.to_string()))?;

        self.insert(DnsRecord::new(domain, qtype, value));

        Ok(())
    }

    pub fn insert(&mut self, record: DnsRecord) {
        match record {
            DnsRecord::A { domain, addr } => {
                self.addresses.entry(domain).or_insert_with(Vec::new).push(addr);
            }
            DnsRecord::Ns { domain, host } => {
                self.nameservers.entry(domain).or_insert_with(Vec::new).push(host);
            }
            DnsRecord::Cname { domain, host } => {
                self.aliases.insert(domain, host);
            }
        }
    }

    pub fn addresses(&self, domain: &str) -> &[String] {
        self.addresses.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nameservers(&self, domain: &str) -> &[String] {
        self.nameservers.get(domain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn alias(&self, domain: &str) -> Option<&str> {
        self.aliases.get(domain).map(String::as_str)
    }

    pub fn has_root_nameserver(&self) -> bool {
        !self.nameservers(ROOT).is_empty()
    }

    /// Total number of stored records across all families
    pub fn len(&self) -> usize {
        let addresses: usize = self.addresses.values().map(Vec::len).sum();
        let nameservers: usize = self.nameservers.values().map(Vec::len).sum();

        addresses + nameservers + self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read master file lines from `reader`, returning how many were stored
    pub fn load<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut stored = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 3 {
                log::warn!(
                    "Skipping line {}: expected `name type value`, got {:?}",
                    idx + 1,
                    line
                );
                continue;
            }

            match self.add_record(parts[0], parts[1], parts[2]) {
                Ok(()) => stored += 1,
                Err(e) => log::warn!("Skipping line {}: {}", idx + 1, e),
            }
        }

        Ok(stored)
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let file = File::open(path.as_ref())?;
        let stored = self.load(BufReader::new(file))?;

        log::info!("Loaded {} records from {}", stored, path.as_ref().display());
        if !self.has_root_nameserver() {
            log::warn!("No NS record for the root zone, referrals will come back empty");
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_add_record() {
        let mut authority = Authority::new();
        authority.add_record("example.com", "A", "10.0.0.1").unwrap();
        authority.add_record("example.com", "A", "10.0.0.2").unwrap();
        authority.add_record("example.com", "NS", "ns1.example.com").unwrap();
        authority.add_record("www.example.com", "CNAME", "example.com").unwrap();

        assert_eq!(
            &["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            authority.addresses("example.com")
        );
        assert_eq!(&["ns1.example.com".to_string()], authority.nameservers("example.com"));
        assert_eq!(Some("example.com"), authority.alias("www.example.com"));
        assert_eq!(4, authority.len());

        assert!(authority.addresses("nope.example.com").is_empty());
        assert!(authority.alias("example.com").is_none());
    }

    #[test]
    fn test_invalid_record_type() {
        let mut authority = Authority::new();
        match authority.add_record("example.com", "MX", "mail.example.com") {
            Err(AuthorityError::InvalidRecordType(rtype)) => assert_eq!("MX", rtype),
            other => panic!("unexpected {:?}", other),
        }
        assert!(authority.is_empty());
    }

    #[test]
    fn test_alias_last_write_wins() {
        let mut authority = Authority::new();
        authority.add_record("www", "CNAME", "one").unwrap();
        authority.add_record("www", "CNAME", "two").unwrap();

        assert_eq!(Some("two"), authority.alias("www"));
        assert_eq!(1, authority.len());
    }

    #[test]
    fn test_load_skips_bad_lines() {
        let master = "\
# root hints
. NS ns1.root
ns1.root A 198.41.0.4

this line is too long
short line
example.com MX mail.example.com
www.example.com   CNAME   example.com
";
        let mut authority = Authority::new();
        let stored = authority.load(master.as_bytes()).unwrap();

        assert_eq!(3, stored);
        assert!(authority.has_root_nameserver());
        assert_eq!(&["198.41.0.4".to_string()], authority.addresses("ns1.root"));
        assert_eq!(Some("example.com"), authority.alias("www.example.com"));
    }

    #[test]
    fn test_load_missing_file() {
        let mut authority = Authority::new();
        assert!(matches!(
            authority.load_file("/nonexistent/master.txt"),
            Err(AuthorityError::Io(_))
        ));
    }
}
