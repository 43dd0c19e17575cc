pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Legacy pcap magic for nanosecond timestamps, as read natively and byte-swapped.
pub const NANOSECOND_MAGIC: u32 = 0xa1b2_3c4d;
pub const NANOSECOND_MAGIC_SWAPPED: u32 = 0x4d3c_b2a1;

/// Large enough to hold one record at the maximum common snaplen (262144)
/// together with its block header.
pub const PCAP_READER_BUFFER_SIZE: usize = 320 * 1024;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MICRO: i64 = 1_000;

/// Block type of the obsolete PCAPNG Packet Block.
pub const OBSOLETE_PACKET_BLOCK_TYPE: u32 = 0x0000_0002;
