use thiserror::Error;

#[derive(Debug, Error)]
pub enum PcapSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error ({context}): {message}")]
    Pcap {
        context: &'static str,
        message: String,
    },
    /// The file ended, or a packet appeared, before the capture properties were known.
    #[error("missing capture header: {0}")]
    MissingHeader(&'static str),
}
