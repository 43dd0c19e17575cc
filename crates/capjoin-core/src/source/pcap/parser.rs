use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, EnhancedPacketBlock, LegacyPcapReader, Linktype, PcapBlockOwned, PcapNGReader,
    traits::PcapReaderIterator,
};

use crate::source::{PacketRecord, PacketSource, RecordError, SourceError, SourceProperties};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    Interface, interface_for_packet, is_nanosecond_magic, is_pcapng_magic, legacy_ts_to_nanos,
    narrow_snaplen, pcapng_ts_to_nanos, read_magic_and_rewind, validate_record, widen_snaplen,
};

pub struct PcapFileSource {
    inner: PcapReader,
    properties: SourceProperties,
    /// Outcome of the read-ahead past the PCAPNG interface descriptions.
    pending: Pending,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        snaplen: u32,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        /// Interfaces of the current section.
        interfaces: Vec<Interface>,
        /// Link type of the first interface in the file.
        linktype: Option<Linktype>,
        /// Snap length announced for the whole file.
        snaplen: u32,
    },
}

enum Event {
    Properties(SourceProperties),
    Record(Result<PacketRecord, RecordError>),
}

impl PcapFileSource {
    /// Open a capture file and decode its header.
    ///
    /// For PCAPNG the header is every interface described before the first
    /// packet. The file is closed again when this returns an error.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let mut inner = create_reader(file).map_err(SourceError::from)?;
        let (properties, pending) = read_properties(&mut inner).map_err(SourceError::from)?;
        Ok(Self {
            inner,
            properties,
            pending,
        })
    }
}

impl PacketSource for PcapFileSource {
    fn properties(&self) -> SourceProperties {
        self.properties
    }

    fn next_record(&mut self) -> Result<Option<PacketRecord>, SourceError> {
        if let Some(pending) = self.pending.take() {
            return pending;
        }
        loop {
            match next_event(&mut self.inner).map_err(SourceError::from)? {
                Some(Event::Record(record)) => return record.map(Some).map_err(SourceError::from),
                Some(Event::Properties(_)) => continue,
                None => return Ok(None),
            }
        }
    }
}

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcapng reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Ng {
            reader,
            interfaces: Vec::new(),
            linktype: None,
            snaplen: 0,
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
            PcapSourceError::Pcap {
                context: "pcap reader init",
                message: e.to_string(),
            }
        })?;
        Ok(PcapReader::Legacy {
            reader,
            snaplen: 0,
            nanosecond: false,
        })
    }
}

type Pending = Option<Result<Option<PacketRecord>, SourceError>>;

fn read_properties(reader: &mut PcapReader) -> Result<(SourceProperties, Pending), PcapSourceError> {
    let mut properties = match next_event(reader)? {
        Some(Event::Properties(properties)) => properties,
        Some(Event::Record(_)) => {
            return Err(PcapSourceError::MissingHeader(
                "packet found before the capture header",
            ));
        }
        None => {
            return Err(PcapSourceError::MissingHeader(
                "file ended before the capture header",
            ));
        }
    };
    if !matches!(reader, PcapReader::Ng { .. }) {
        return Ok((properties, None));
    }

    // The output header must cover every interface packets may arrive on,
    // so widen the snap length over all interfaces ahead of the first packet.
    let pending = loop {
        match next_event(reader) {
            Ok(Some(Event::Properties(interface))) => {
                if interface.linktype == properties.linktype {
                    properties.snaplen = widen_snaplen(properties.snaplen, interface.snaplen);
                }
            }
            Ok(Some(Event::Record(record))) => break record.map(Some).map_err(SourceError::from),
            Ok(None) => break Ok(None),
            Err(err) => break Err(SourceError::from(err)),
        }
    };
    if let PcapReader::Ng { snaplen, .. } = reader {
        *snaplen = properties.snaplen;
    }
    Ok((properties, Some(pending)))
}

fn next_event(reader: &mut PcapReader) -> Result<Option<Event>, PcapSourceError> {
    loop {
        match reader {
            PcapReader::Legacy {
                reader,
                snaplen,
                nanosecond,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *snaplen = header.snaplen;
                            *nanosecond = is_nanosecond_magic(header.magic_number);
                            Some(Event::Properties(SourceProperties {
                                snaplen: header.snaplen,
                                linktype: header.network,
                            }))
                        }
                        PcapBlockOwned::Legacy(packet) => {
                            let record =
                                validate_record(packet.data, packet.caplen, packet.origlen, *snaplen)
                                    .map(|data| PacketRecord {
                                        timestamp: legacy_ts_to_nanos(
                                            packet.ts_sec,
                                            packet.ts_usec,
                                            *nanosecond,
                                        ),
                                        original_len: packet.origlen,
                                        data: data.to_vec(),
                                    });
                            Some(Event::Record(record))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng {
                reader,
                interfaces,
                linktype,
                snaplen,
            } => match reader.next() {
                Ok((offset, block)) => {
                    let event = match block {
                        // Interface ids restart with every section.
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            interfaces.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            if linktype.is_none() {
                                *linktype = Some(intf.linktype);
                            }
                            interfaces.push(Interface {
                                linktype: intf.linktype,
                                snaplen: intf.snaplen,
                            });
                            Some(Event::Properties(SourceProperties {
                                snaplen: intf.snaplen,
                                linktype: intf.linktype,
                            }))
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let record = ng_record(interfaces, *linktype, *snaplen, &packet);
                            Some(Event::Record(record))
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(_)) => Some(Event::Record(Err(
                            RecordError::UnsupportedBlock("simple packet block"),
                        ))),
                        PcapBlockOwned::NG(Block::Unknown(unknown))
                            if unknown.block_type == layout::OBSOLETE_PACKET_BLOCK_TYPE =>
                        {
                            Some(Event::Record(Err(RecordError::UnsupportedBlock(
                                "obsolete packet block",
                            ))))
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if event.is_some() {
                        return Ok(event);
                    }
                }
                Err(pcap_parser::PcapError::Eof) => return Ok(None),
                Err(pcap_parser::PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}

/// Validate a PCAPNG packet against its interface and the file-level
/// link type and snap length.
fn ng_record(
    interfaces: &[Interface],
    linktype: Option<Linktype>,
    snaplen: u32,
    packet: &EnhancedPacketBlock<'_>,
) -> Result<PacketRecord, RecordError> {
    let interface = interface_for_packet(interfaces, packet.if_id)?;
    match linktype {
        Some(expected) if expected != interface.linktype => {
            return Err(RecordError::LinktypeMismatch {
                expected,
                found: interface.linktype,
            });
        }
        _ => {}
    }
    let limit = narrow_snaplen(interface.snaplen, snaplen);
    let data = validate_record(packet.data, packet.caplen, packet.origlen, limit)?;
    Ok(PacketRecord {
        timestamp: pcapng_ts_to_nanos(packet.ts_high, packet.ts_low),
        original_len: packet.origlen,
        data: data.to_vec(),
    })
}
