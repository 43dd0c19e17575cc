//! capjoin core library: merge timestamp-sorted packet captures.
//!
//! Each input capture is read through a `PacketSource`; the merge engine keeps
//! one pending packet per open source in a min-heap and streams the globally
//! earliest packet to a `PacketSink`. Memory use depends on the number of
//! inputs, never on their size. All file I/O lives in `source` and `sink`;
//! the engine itself works on any source and sink implementation, which keeps
//! it testable with in-memory captures.
//!
//! Invariants:
//! - Output timestamps never decrease.
//! - Every admitted input shares one link type; the output snaplen is the
//!   largest snaplen of any admitted input.
//! - Bad records and unreadable files are skipped, never fatal.
//!
//! # Examples
//! ```no_run
//! use std::io::stdout;
//! use std::path::Path;
//!
//! use capjoin_core::{MergeEngine, MergeOptions, PcapWriter, TimestampPrecision};
//!
//! let mut engine = MergeEngine::new(MergeOptions::default());
//! engine.admit_path(Path::new("eth0.pcap"))?;
//! engine.admit_path(Path::new("eth1.pcap"))?;
//! let mut sink = PcapWriter::new(stdout().lock(), TimestampPrecision::Microsecond);
//! let summary = engine.run(&mut sink)?;
//! eprintln!("merged {} packets", summary.output.packets_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod merge;
mod sink;
mod source;

pub use merge::{
    CaptureProperties, MergeEngine, MergeError, MergeOptions, MergeStrategy, merge_pcap_files,
};
pub use pcap_parser::Linktype;
pub use sink::{CaptureHeader, PacketSink, PcapWriter, SinkError, TimestampPrecision};
pub use source::{
    PacketRecord, PacketSource, PcapFileSource, RecordError, SourceError, SourceProperties,
};

/// Current merge summary schema version.
pub const SUMMARY_VERSION: u32 = 1;

/// Outcome of a merge run, in input admission order.
///
/// # Examples
/// ```
/// use capjoin_core::{MergeEngine, MergeOptions, PcapFileSource, PcapWriter, TimestampPrecision};
///
/// let engine: MergeEngine<PcapFileSource> = MergeEngine::new(MergeOptions::default());
/// let mut sink = PcapWriter::new(Vec::new(), TimestampPrecision::Microsecond);
/// let summary = engine.run(&mut sink).unwrap();
/// assert_eq!(summary.summary_version, capjoin_core::SUMMARY_VERSION);
/// assert_eq!(summary.output.packets_written, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Summary schema version (not the binary version).
    pub summary_version: u32,
    pub tool: ToolInfo,
    pub output: OutputSummary,
    pub inputs: Vec<InputSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl ToolInfo {
    pub fn current() -> Self {
        Self {
            name: "capjoin".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// What was written to the merged capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSummary {
    pub snaplen: u32,
    /// Numeric link-layer type from the output header.
    pub linktype: i32,
    pub packets_written: u64,
    /// Packets the output format could not represent.
    pub packets_dropped: u64,
    /// Packets that went through the heap instead of being written directly.
    pub heap_insertions: u64,
    /// RFC3339 timestamp of the first written packet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last written packet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStatus {
    Admitted,
    Skipped,
}

/// Per-input accounting.
///
/// For admitted inputs, `reason` is set when the file stopped early on data
/// the decoder could not step over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSummary {
    pub path: String,
    pub status: InputStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snaplen: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linktype: Option<i32>,
    /// File size on disk, when the input is a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Usable records handed to the merge.
    pub packets_read: u64,
    /// Records rejected by the decoder.
    pub records_skipped: u64,
    /// Records skipped because their payload was empty.
    pub empty_payloads: u64,
}
