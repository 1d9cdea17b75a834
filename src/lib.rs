//! tinyns
//!
//! A minimal name-resolution server and client.
//!
//! # Features
//!
//! * Compact little-endian wire format (header, question, resource records)
//! * In-memory record store seeded from a master file
//! * Alias chasing, referrals toward the closest known name server, glue
//! * One thread per inbound datagram on the server
//! * Single-shot client with a bounded wait
//!
//! # Architecture
//!
//! Everything lives in the `dns` module; the `tinyns-server` and
//! `tinyns-client` binaries only parse arguments and wire things together.

/// Protocol, record store, resolver, server and client
pub mod dns;
