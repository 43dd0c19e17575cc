pub const MICROSECOND_MAGIC: u32 = 0xa1b2_c3d4;
pub const NANOSECOND_MAGIC: u32 = 0xa1b2_3c4d;
pub const VERSION_MAJOR: u16 = 2;
pub const VERSION_MINOR: u16 = 4;

pub const FILE_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MICRO: i64 = 1_000;
