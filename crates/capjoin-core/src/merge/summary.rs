use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::sink::CaptureHeader;
use crate::source::SourceProperties;
use crate::{InputStatus, InputSummary, OutputSummary};

impl InputSummary {
    pub(crate) fn admitted(path: String, properties: SourceProperties) -> Self {
        Self {
            path,
            status: InputStatus::Admitted,
            reason: None,
            snaplen: Some(properties.snaplen),
            linktype: Some(properties.linktype.0),
            size_bytes: None,
            packets_read: 0,
            records_skipped: 0,
            empty_payloads: 0,
        }
    }

    pub(crate) fn skipped(path: String, reason: String) -> Self {
        Self {
            path,
            status: InputStatus::Skipped,
            reason: Some(reason),
            snaplen: None,
            linktype: None,
            size_bytes: None,
            packets_read: 0,
            records_skipped: 0,
            empty_payloads: 0,
        }
    }
}

/// Counters for what reached the sink.
#[derive(Debug, Default)]
pub(crate) struct OutputStats {
    pub packets_written: u64,
    pub packets_dropped: u64,
    pub heap_insertions: u64,
    first_ts: Option<i64>,
    last_ts: Option<i64>,
}

impl OutputStats {
    pub fn record_written(&mut self, timestamp: i64) {
        self.packets_written += 1;
        self.first_ts.get_or_insert(timestamp);
        self.last_ts = Some(timestamp);
    }

    pub fn into_summary(self, header: CaptureHeader) -> OutputSummary {
        OutputSummary {
            snaplen: header.snaplen,
            linktype: header.linktype.0,
            packets_written: self.packets_written,
            packets_dropped: self.packets_dropped,
            heap_insertions: self.heap_insertions,
            time_start: ts_to_rfc3339(self.first_ts),
            time_end: ts_to_rfc3339(self.last_ts),
        }
    }
}

fn ts_to_rfc3339(ts: Option<i64>) -> Option<String> {
    let ts = ts?;
    OffsetDateTime::from_unix_timestamp_nanos(ts as i128)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
