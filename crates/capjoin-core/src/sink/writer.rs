use std::io::Write;

use super::layout;
use super::{CaptureHeader, PacketSink, SinkError, TimestampPrecision};
use crate::source::PacketRecord;

/// Writes a little-endian legacy pcap stream.
pub struct PcapWriter<W: Write> {
    inner: W,
    precision: TimestampPrecision,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(inner: W, precision: TimestampPrecision) -> Self {
        Self { inner, precision }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> PacketSink for PcapWriter<W> {
    fn write_header(&mut self, header: &CaptureHeader) -> Result<(), SinkError> {
        let magic = match self.precision {
            TimestampPrecision::Microsecond => layout::MICROSECOND_MAGIC,
            TimestampPrecision::Nanosecond => layout::NANOSECOND_MAGIC,
        };
        let mut out = Vec::with_capacity(layout::FILE_HEADER_LEN);
        out.extend_from_slice(&magic.to_le_bytes());
        out.extend_from_slice(&layout::VERSION_MAJOR.to_le_bytes());
        out.extend_from_slice(&layout::VERSION_MINOR.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&header.snaplen.to_le_bytes());
        out.extend_from_slice(&header.linktype.0.to_le_bytes());
        self.inner.write_all(&out)?;
        Ok(())
    }

    fn write_packet(&mut self, record: &PacketRecord) -> Result<(), SinkError> {
        let (ts_sec, fraction) = split_timestamp(record.timestamp, self.precision)?;
        let caplen = u32::try_from(record.data.len())
            .map_err(|_| SinkError::PayloadTooLarge(record.data.len()))?;
        let original_len = record.original_len.max(caplen);

        let mut out = Vec::with_capacity(layout::RECORD_HEADER_LEN + record.data.len());
        out.extend_from_slice(&ts_sec.to_le_bytes());
        out.extend_from_slice(&fraction.to_le_bytes());
        out.extend_from_slice(&caplen.to_le_bytes());
        out.extend_from_slice(&original_len.to_le_bytes());
        out.extend_from_slice(&record.data);
        self.inner.write_all(&out)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Split a nanosecond timestamp into whole seconds and the sub-second part
/// at the requested precision.
fn split_timestamp(
    timestamp: i64,
    precision: TimestampPrecision,
) -> Result<(u32, u32), SinkError> {
    let seconds = timestamp.div_euclid(layout::NANOS_PER_SECOND);
    let nanos = timestamp.rem_euclid(layout::NANOS_PER_SECOND);
    let ts_sec = u32::try_from(seconds).map_err(|_| SinkError::TimestampOutOfRange(timestamp))?;
    let fraction = match precision {
        TimestampPrecision::Microsecond => nanos / layout::NANOS_PER_MICRO,
        TimestampPrecision::Nanosecond => nanos,
    };
    Ok((ts_sec, fraction as u32))
}
