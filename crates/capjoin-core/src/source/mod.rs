pub(crate) mod pcap;

pub use pcap::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;

/// One decoded capture record.
///
/// The captured length is the payload length; the original wire length is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    /// Capture timestamp in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Length of the packet on the wire.
    pub original_len: u32,
    pub data: Vec<u8>,
}

/// Static per-file properties read from the capture header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceProperties {
    pub snaplen: u32,
    pub linktype: Linktype,
}

/// A timestamp-sorted stream of capture records.
pub trait PacketSource {
    fn properties(&self) -> SourceProperties;

    /// Decode the next record.
    ///
    /// `Ok(None)` marks end of input. `Err(SourceError::Record(_))` means a
    /// single record was unusable and reading may continue; any other error
    /// leaves the decode cursor stuck.
    fn next_record(&mut self) -> Result<Option<PacketRecord>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("bad record: {0}")]
    Record(#[from] RecordError),
}

impl SourceError {
    /// Whether the error only concerns one record and the source can keep going.
    pub fn is_record_error(&self) -> bool {
        matches!(self, SourceError::Record(_))
    }
}

/// A record that was framed correctly but whose content cannot be merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("capture length exceeds snap length: {caplen} > {snaplen}")]
    ExceedsSnaplen { caplen: u32, snaplen: u32 },
    #[error("capture length exceeds original packet length: {caplen} > {original_len}")]
    ExceedsOriginalLength { caplen: u32, original_len: u32 },
    #[error("payload truncated: capture length {caplen}, {actual} bytes present")]
    Truncated { caplen: u32, actual: usize },
    #[error("packet references unknown interface {0}")]
    UnknownInterface(u32),
    #[error("interface link type {found:?} differs from capture link type {expected:?}")]
    LinktypeMismatch { expected: Linktype, found: Linktype },
    #[error("unsupported packet block: {0}")]
    UnsupportedBlock(&'static str),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
            pcap::error::PcapSourceError::MissingHeader(detail) => {
                SourceError::Pcap(format!("missing capture header: {detail}"))
            }
        }
    }
}
