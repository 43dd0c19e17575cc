use std::io::{Read, Seek, SeekFrom};

use super::error::PcapSourceError;
use super::layout;
use crate::source::RecordError;
use pcap_parser::Linktype;

/// Per-interface properties from a PCAPNG Interface Description Block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    pub linktype: Linktype,
    pub snaplen: u32,
}

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use capjoin_core::source::pcap::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Whether a legacy header magic announces nanosecond timestamps.
pub fn is_nanosecond_magic(magic_number: u32) -> bool {
    matches!(
        magic_number,
        layout::NANOSECOND_MAGIC | layout::NANOSECOND_MAGIC_SWAPPED
    )
}

/// Resolve the interface a PCAPNG packet was captured on.
pub fn interface_for_packet(interfaces: &[Interface], if_id: u32) -> Result<Interface, RecordError> {
    interfaces
        .get(if_id as usize)
        .copied()
        .ok_or(RecordError::UnknownInterface(if_id))
}

/// Convert a legacy record timestamp to nanoseconds since the epoch.
///
/// `fraction` holds microseconds, or nanoseconds when the file uses the
/// nanosecond magic.
pub fn legacy_ts_to_nanos(ts_sec: u32, fraction: u32, nanosecond: bool) -> i64 {
    let fraction = if nanosecond {
        fraction as i64
    } else {
        fraction as i64 * layout::NANOS_PER_MICRO
    };
    ts_sec as i64 * layout::NANOS_PER_SECOND + fraction
}

/// Convert PCAPNG high/low timestamp (microsecond units) to nanoseconds.
pub fn pcapng_ts_to_nanos(ts_high: u32, ts_low: u32) -> i64 {
    let ts = ((ts_high as u64) << 32) | (ts_low as u64);
    (ts as i64).saturating_mul(layout::NANOS_PER_MICRO)
}

/// Snap length covering both limits; zero means unlimited and wins.
pub fn widen_snaplen(current: u32, other: u32) -> u32 {
    if current == 0 || other == 0 {
        0
    } else {
        current.max(other)
    }
}

/// Tighter of two snap length limits; zero means unlimited.
pub fn narrow_snaplen(a: u32, b: u32) -> u32 {
    match (a, b) {
        (0, limit) | (limit, 0) => limit,
        (a, b) => a.min(b),
    }
}

/// Check a framed record against its capture limits and return the payload.
///
/// A `snaplen` of zero disables the snap length check.
pub fn validate_record<'a>(
    data: &'a [u8],
    caplen: u32,
    original_len: u32,
    snaplen: u32,
) -> Result<&'a [u8], RecordError> {
    if snaplen != 0 && caplen > snaplen {
        return Err(RecordError::ExceedsSnaplen { caplen, snaplen });
    }
    if caplen > original_len {
        return Err(RecordError::ExceedsOriginalLength {
            caplen,
            original_len,
        });
    }
    data.get(..caplen as usize).ok_or(RecordError::Truncated {
        caplen,
        actual: data.len(),
    })
}
