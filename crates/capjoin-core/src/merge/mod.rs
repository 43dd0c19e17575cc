//! Streaming k-way merge of timestamp-sorted packet sources.
//!
//! The engine keeps at most one pending packet per open source in a min-heap.
//! After emitting the heap minimum it keeps reading from the same source for
//! as long as the fresh packets are not later than the new heap minimum (the
//! horizon): those are provably the next packets in global order and bypass
//! the heap entirely.
//!
//! Invariants:
//! - A source has an entry in the heap iff it has a buffered packet.
//! - Sources are dropped (and their files closed) exactly once, when they
//!   reach end of input or fail in a way the decoder cannot step over.
//! - Global capture properties are fixed before the header is written.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::path::Path;

use pcap_parser::Linktype;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sink::{PacketSink, SinkError};
use crate::source::{PacketRecord, PacketSource, PcapFileSource};
use crate::{InputSummary, MergeSummary, ToolInfo};

mod heap;
mod properties;
mod summary;

use heap::PendingPacket;
pub use properties::CaptureProperties;
use summary::OutputStats;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{input}: different link types: {expected:?} and {found:?}")]
    LinktypeMismatch {
        input: String,
        expected: Linktype,
        found: Linktype,
    },
    #[error("output error: {0}")]
    Sink(#[from] SinkError),
}

/// How freshly read packets are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Emit packets at or below the horizon directly, insert the rest.
    #[default]
    Lookahead,
    /// Insert every packet into the heap and pop the minimum.
    HeapOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
}

struct ActiveSource<S> {
    name: String,
    input: usize,
    source: Option<S>,
}

pub struct MergeEngine<S: PacketSource> {
    options: MergeOptions,
    properties: CaptureProperties,
    sources: Vec<ActiveSource<S>>,
    heap: BinaryHeap<Reverse<PendingPacket>>,
    inputs: Vec<InputSummary>,
    output: OutputStats,
}

impl<S: PacketSource> MergeEngine<S> {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            properties: CaptureProperties::default(),
            sources: Vec::new(),
            heap: BinaryHeap::new(),
            inputs: Vec::new(),
            output: OutputStats::default(),
        }
    }

    pub fn properties(&self) -> &CaptureProperties {
        &self.properties
    }

    /// Number of sources that currently have a packet waiting.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Admit an opened source: reconcile its properties and seed the heap
    /// with its first packet.
    ///
    /// # Errors
    /// Returns `MergeError::LinktypeMismatch` when the source cannot share an
    /// output header with the inputs admitted so far.
    pub fn admit(&mut self, name: impl Into<String>, source: S) -> Result<(), MergeError> {
        let name = name.into();
        let properties = source.properties();
        self.properties.reconcile(&name, properties)?;
        debug!(
            input = %name,
            snaplen = properties.snaplen,
            linktype = ?properties.linktype,
            "admitted"
        );

        let index = self.sources.len();
        self.inputs
            .push(InputSummary::admitted(name.clone(), properties));
        self.sources.push(ActiveSource {
            name,
            input: self.inputs.len() - 1,
            source: Some(source),
        });
        if let Some(record) = self.read_next(index) {
            self.push(index, record);
        }
        Ok(())
    }

    /// Record an input that could not be opened or decoded.
    pub fn skip_input(&mut self, name: impl Into<String>, reason: impl ToString) {
        let name = name.into();
        let reason = reason.to_string();
        debug!(input = %name, %reason, "skipping this file");
        self.inputs.push(InputSummary::skipped(name, reason));
    }

    /// Write the header and every pending packet in timestamp order.
    ///
    /// # Errors
    /// Returns `MergeError::Sink` when the sink fails with an I/O error.
    /// Packets already written stay in the sink.
    pub fn run<K: PacketSink>(mut self, sink: &mut K) -> Result<MergeSummary, MergeError> {
        let header = self.properties.header();
        info!(
            inputs = self.sources.len(),
            input_bytes = self.inputs.iter().filter_map(|input| input.size_bytes).sum::<u64>(),
            snaplen = header.snaplen,
            linktype = ?header.linktype,
            "merging"
        );
        sink.write_header(&header)?;

        while let Some(Reverse(pending)) = self.heap.pop() {
            self.emit(sink, &pending.record)?;
            match self.options.strategy {
                MergeStrategy::Lookahead => self.drain_below_horizon(pending.source, sink)?,
                MergeStrategy::HeapOnly => {
                    if let Some(record) = self.read_next(pending.source) {
                        self.push(pending.source, record);
                    }
                }
            }
        }
        sink.flush()?;

        info!(
            written = self.output.packets_written,
            dropped = self.output.packets_dropped,
            "merge complete"
        );
        Ok(MergeSummary {
            summary_version: crate::SUMMARY_VERSION,
            tool: ToolInfo::current(),
            output: self.output.into_summary(header),
            inputs: self.inputs,
        })
    }

    fn drain_below_horizon<K: PacketSink>(
        &mut self,
        index: usize,
        sink: &mut K,
    ) -> Result<(), MergeError> {
        // Every other source's next packet is at or after the horizon.
        let horizon = self.heap.peek().map(|Reverse(pending)| pending.timestamp());
        while let Some(record) = self.read_next(index) {
            if horizon.is_none_or(|horizon| record.timestamp <= horizon) {
                self.emit(sink, &record)?;
            } else {
                self.push(index, record);
                break;
            }
        }
        Ok(())
    }

    fn push(&mut self, source: usize, record: PacketRecord) {
        self.output.heap_insertions += 1;
        self.heap.push(Reverse(PendingPacket { source, record }));
    }

    fn emit<K: PacketSink>(&mut self, sink: &mut K, record: &PacketRecord) -> Result<(), MergeError> {
        match sink.write_packet(record) {
            Ok(()) => {
                self.output.record_written(record.timestamp);
                Ok(())
            }
            Err(err) if err.is_packet_error() => {
                warn!(error = %err, "write error (skipping this packet)");
                self.output.packets_dropped += 1;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Next usable record of a source, skipping bad records and empty
    /// payloads. Retires the source and returns `None` once it cannot
    /// produce anything more.
    fn read_next(&mut self, index: usize) -> Option<PacketRecord> {
        let ActiveSource {
            name,
            input,
            source,
        } = &mut self.sources[index];
        let stats = &mut self.inputs[*input];
        let reader = source.as_mut()?;

        loop {
            match reader.next_record() {
                Ok(Some(record)) if record.data.is_empty() => {
                    stats.empty_payloads += 1;
                    debug!(input = %name, "empty data (skipping this packet)");
                }
                Ok(Some(record)) => {
                    stats.packets_read += 1;
                    return Some(record);
                }
                Ok(None) => {
                    debug!(input = %name, packets = stats.packets_read, "done");
                    break;
                }
                Err(err) if err.is_record_error() => {
                    stats.records_skipped += 1;
                    debug!(input = %name, error = %err, "skipping this packet");
                }
                Err(err) => {
                    warn!(input = %name, error = %err, "unreadable data (closing this file)");
                    stats.reason = Some(err.to_string());
                    break;
                }
            }
        }
        *source = None;
        None
    }
}

impl MergeEngine<PcapFileSource> {
    /// Open and admit a capture file. Files that cannot be opened or whose
    /// header cannot be decoded are skipped.
    ///
    /// # Errors
    /// Only a link type conflict is returned.
    pub fn admit_path(&mut self, path: &Path) -> Result<(), MergeError> {
        let name = path.display().to_string();
        match PcapFileSource::open(path) {
            Ok(source) => {
                self.admit(name, source)?;
                if let Some(input) = self.inputs.last_mut() {
                    input.size_bytes = fs::metadata(path).ok().map(|meta| meta.len());
                }
                Ok(())
            }
            Err(err) => {
                self.skip_input(name, err);
                Ok(())
            }
        }
    }
}

/// Merge capture files into `sink`.
///
/// # Examples
/// ```no_run
/// use std::fs::File;
/// use std::io::BufWriter;
///
/// use capjoin_core::{MergeOptions, PcapWriter, TimestampPrecision, merge_pcap_files};
///
/// let out = BufWriter::new(File::create("merged.pcap")?);
/// let mut sink = PcapWriter::new(out, TimestampPrecision::Microsecond);
/// let summary = merge_pcap_files(&["a.pcap", "b.pcap"], &mut sink, MergeOptions::default())?;
/// println!("{} packets", summary.output.packets_written);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn merge_pcap_files<P: AsRef<Path>, K: PacketSink>(
    paths: &[P],
    sink: &mut K,
    options: MergeOptions,
) -> Result<MergeSummary, MergeError> {
    let mut engine = MergeEngine::new(options);
    for path in paths {
        engine.admit_path(path.as_ref())?;
    }
    engine.run(sink)
}
