//! # arx DNS protocol library
//!
//! Protocol types and codecs for the arx authoritative server: domain
//! names, messages, resource records with wire and presentation formats,
//! EDNS0, and TSIG transaction signatures (RFC 8945).
//!
//! The supported record types are the ones an arx authority serves and
//! accepts in dynamic updates: A, AAAA, CNAME, NS, SOA, TXT, and SRV.
//! Anything else round-trips as opaque rdata.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod edns;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod opcode;
pub mod question;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;
pub mod tsig;

pub use class::{Class, RecordClass};
pub use edns::Edns;
pub use error::{Error, Result, TsigError};
pub use header::Header;
pub use message::Message;
pub use name::Name;
pub use opcode::OpCode;
pub use question::Question;
pub use rcode::ResponseCode;
pub use rdata::RData;
pub use record::ResourceRecord;
pub use rtype::{RecordType, Type};
pub use tsig::{TsigAlgorithm, TsigKey};

/// Maximum length of a single label (RFC 1035).
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a name in wire form (RFC 1035).
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum UDP payload without EDNS0.
pub const MAX_UDP_MESSAGE_SIZE: usize = 512;

/// EDNS0 UDP payload size advertised and honored by arx.
pub const EDNS_UDP_SIZE: u16 = 4096;

/// Maximum DNS message size over TCP (also the AXFR envelope cap).
pub const MAX_TCP_MESSAGE_SIZE: usize = 65535;
