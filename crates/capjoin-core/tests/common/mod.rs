#![allow(dead_code)]

use std::fs;
use std::path::Path;

use capjoin_core::{PacketRecord, PacketSource, PcapFileSource, SourceProperties};

pub const LINKTYPE_ETHERNET: u32 = 1;
pub const LINKTYPE_RAW: u32 = 101;

/// One legacy pcap record exactly as it lands on disk.
pub struct RawRecord {
    pub ts_sec: u32,
    pub ts_frac: u32,
    pub caplen: u32,
    pub origlen: u32,
    pub data: Vec<u8>,
}

impl RawRecord {
    /// A well-formed record stamped `ts_us` microseconds after the epoch.
    pub fn at_micros(ts_us: u64, data: &[u8]) -> Self {
        Self {
            ts_sec: (ts_us / 1_000_000) as u32,
            ts_frac: (ts_us % 1_000_000) as u32,
            caplen: data.len() as u32,
            origlen: data.len() as u32,
            data: data.to_vec(),
        }
    }
}

/// Well-formed records at the given microsecond timestamps, payload tagged by index.
pub fn records_at(tag: u8, timestamps_us: &[u64]) -> Vec<RawRecord> {
    timestamps_us
        .iter()
        .enumerate()
        .map(|(idx, ts)| RawRecord::at_micros(*ts, &[tag, idx as u8, 0xee, 0xff]))
        .collect()
}

pub fn write_legacy_pcap(path: &Path, snaplen: u32, linktype: u32, records: &[RawRecord]) {
    let mut output = Vec::new();
    output.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    output.extend_from_slice(&2u16.to_le_bytes());
    output.extend_from_slice(&4u16.to_le_bytes());
    output.extend_from_slice(&0i32.to_le_bytes());
    output.extend_from_slice(&0u32.to_le_bytes());
    output.extend_from_slice(&snaplen.to_le_bytes());
    output.extend_from_slice(&linktype.to_le_bytes());
    for record in records {
        output.extend_from_slice(&record.ts_sec.to_le_bytes());
        output.extend_from_slice(&record.ts_frac.to_le_bytes());
        output.extend_from_slice(&record.caplen.to_le_bytes());
        output.extend_from_slice(&record.origlen.to_le_bytes());
        output.extend_from_slice(&record.data);
    }
    fs::write(path, output).expect("write pcap fixture");
}

/// One PCAPNG block of a hand-built fixture.
pub enum NgBlock {
    Section,
    Interface { linktype: u16, snaplen: u32 },
    Packet { if_id: u32, ts_us: u64, data: Vec<u8> },
    Simple(Vec<u8>),
}

pub fn write_pcapng(path: &Path, linktype: u16, packets: &[(u64, Vec<u8>)]) {
    let mut blocks = vec![
        NgBlock::Section,
        NgBlock::Interface {
            linktype,
            snaplen: 65535,
        },
    ];
    blocks.extend(packets.iter().map(|(ts_us, data)| NgBlock::Packet {
        if_id: 0,
        ts_us: *ts_us,
        data: data.clone(),
    }));
    write_pcapng_blocks(path, &blocks);
}

pub fn write_pcapng_blocks(path: &Path, blocks: &[NgBlock]) {
    let mut output = Vec::new();
    for block in blocks {
        let bytes = match block {
            NgBlock::Section => pcapng_block(0x0A0D0D0A, &section_header_body()),
            NgBlock::Interface { linktype, snaplen } => {
                pcapng_block(1, &interface_desc_body(*linktype, *snaplen))
            }
            NgBlock::Packet { if_id, ts_us, data } => {
                pcapng_block(6, &enhanced_packet_body(*if_id, *ts_us, data))
            }
            NgBlock::Simple(data) => pcapng_block(3, &simple_packet_body(data)),
        };
        output.extend_from_slice(&bytes);
    }
    fs::write(path, output).expect("write pcapng fixture");
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body
}

fn interface_desc_body(linktype: u16, snaplen: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&linktype.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&snaplen.to_be_bytes());
    body
}

fn simple_packet_body(data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(data.len() as u32).to_be_bytes());
    body.extend_from_slice(data);
    let pad_len = (4 - (data.len() % 4)) % 4;
    body.extend(std::iter::repeat_n(0u8, pad_len));
    body
}

fn enhanced_packet_body(if_id: u32, ts_us: u64, data: &[u8]) -> Vec<u8> {
    let ts_high = ((ts_us >> 32) & 0xFFFF_FFFF) as u32;
    let ts_low = (ts_us & 0xFFFF_FFFF) as u32;
    let cap_len = data.len() as u32;
    let mut body = Vec::new();
    body.extend_from_slice(&if_id.to_be_bytes());
    body.extend_from_slice(&ts_high.to_be_bytes());
    body.extend_from_slice(&ts_low.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(data);
    let pad_len = (4 - (data.len() % 4)) % 4;
    body.extend(std::iter::repeat_n(0u8, pad_len));
    body
}

/// Decode a capture file completely.
pub fn read_capture(path: &Path) -> (SourceProperties, Vec<PacketRecord>) {
    let mut source = PcapFileSource::open(path).expect("open capture");
    let properties = source.properties();
    let mut records = Vec::new();
    while let Some(record) = source.next_record().expect("decode record") {
        records.push(record);
    }
    (properties, records)
}

pub fn timestamps_us(records: &[PacketRecord]) -> Vec<i64> {
    records.iter().map(|r| r.timestamp / 1_000).collect()
}
