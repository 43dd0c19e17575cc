use std::cmp::Ordering;

use crate::source::PacketRecord;

/// A packet waiting in the merge heap.
///
/// `source` names the producing source by index; it does not own it.
#[derive(Debug)]
pub struct PendingPacket {
    pub source: usize,
    pub record: PacketRecord,
}

impl PendingPacket {
    pub fn timestamp(&self) -> i64 {
        self.record.timestamp
    }
}

// Ordered by timestamp, then by admission order so equal timestamps pop
// deterministically. Wrap in `Reverse` for a min-heap.
impl Ord for PendingPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp()
            .cmp(&other.timestamp())
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for PendingPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingPacket {}
