//! PCAP/PCAPNG source implementation.
//!
//! This module provides a `PacketSource` backed by PCAP or PCAPNG files. It
//! owns the file handle and decode cursor, reports the static capture
//! properties from the file header, and validates each framed record before
//! handing it to the merge engine.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
