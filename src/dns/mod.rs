//! Name resolution protocol implementation
//!
//! # Module Structure
//!
//! * `buffer` - Little-endian byte cursor used by the codec
//! * `protocol` - Wire structures and their encoding
//! * `authority` - In-memory record store and master file loader
//! * `resolve` - Resolution engine (aliases, exact matches, referrals)
//! * `context` - Server configuration and shared state
//! * `server` - UDP query dispatcher
//! * `client` - Single-shot UDP client

/// In-memory record store and master file loading
pub mod authority;

/// Low-level buffer operations for packet handling
pub mod buffer;

/// Client for issuing a single query
pub mod client;

/// Server configuration and shared context
pub mod context;

/// Protocol definitions and packet structures
pub mod protocol;

/// Resolution engine
pub mod resolve;

/// UDP server implementation
pub mod server;
