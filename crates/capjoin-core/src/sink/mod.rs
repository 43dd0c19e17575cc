//! Output side of the merge: a capture header followed by packet records.

mod layout;
mod writer;

pub use writer::PcapWriter;

use pcap_parser::Linktype;
use thiserror::Error;

use crate::source::PacketRecord;

/// Global properties written once, before the first packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    pub snaplen: u32,
    pub linktype: Linktype,
}

/// Timestamp resolution of the written capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampPrecision {
    #[default]
    Microsecond,
    Nanosecond,
}

pub trait PacketSink {
    fn write_header(&mut self, header: &CaptureHeader) -> Result<(), SinkError>;
    fn write_packet(&mut self, record: &PacketRecord) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timestamp {0}ns does not fit the capture format")]
    TimestampOutOfRange(i64),
    #[error("payload of {0} bytes does not fit the capture format")]
    PayloadTooLarge(usize),
}

impl SinkError {
    /// Whether only the current packet was rejected and the sink is still usable.
    pub fn is_packet_error(&self) -> bool {
        !matches!(self, SinkError::Io(_))
    }
}
