//! Program specific information (PAT and PMT).
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use crc::{Crc, CRC_32_MPEG_2};
use log::Level;

use crate::logging::LogLevel;
use crate::ts::reader::ReadTsPacket;
use crate::ts::Pid;
use crate::{ErrorKind, Result};

/// Maximum number of failed attempts to assemble a section before giving up.
pub const MAX_SECTION_RETRIES: usize = 16;

/// `table_id` of PAT sections.
pub const PAT_TABLE_ID: u8 = 0x00;

/// `table_id` of PMT sections.
pub const PMT_TABLE_ID: u8 = 0x02;

const MIN_SECTION_LEN: usize = 9;

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);
const MAX_SECTION_LEN: usize = 1021;

/// Elementary stream type of a PMT entry.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Mpeg1Video,
    Mpeg2Video,
    Mpeg4Visual,
    H264,
    H265,
    Mpeg1Audio,
    Mpeg2Audio,
    AdtsAac,
    LatmAac,
    Ac3,
    Eac3,
    Dts,
    Other(u8),
}
impl StreamType {
    /// Converts `stream_type` field value.
    pub fn from_u8(n: u8) -> Self {
        match n {
            0x01 => StreamType::Mpeg1Video,
            0x02 => StreamType::Mpeg2Video,
            0x10 => StreamType::Mpeg4Visual,
            0x1B => StreamType::H264,
            0x24 => StreamType::H265,
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x0F => StreamType::AdtsAac,
            0x11 => StreamType::LatmAac,
            0x81 => StreamType::Ac3,
            0x87 => StreamType::Eac3,
            0x82 => StreamType::Dts,
            n => StreamType::Other(n),
        }
    }

    /// Returns `stream_type` field value.
    pub fn as_u8(self) -> u8 {
        match self {
            StreamType::Mpeg1Video => 0x01,
            StreamType::Mpeg2Video => 0x02,
            StreamType::Mpeg4Visual => 0x10,
            StreamType::H264 => 0x1B,
            StreamType::H265 => 0x24,
            StreamType::Mpeg1Audio => 0x03,
            StreamType::Mpeg2Audio => 0x04,
            StreamType::AdtsAac => 0x0F,
            StreamType::LatmAac => 0x11,
            StreamType::Ac3 => 0x81,
            StreamType::Eac3 => 0x87,
            StreamType::Dts => 0x82,
            StreamType::Other(n) => n,
        }
    }

    /// Returns `true` if MPEG-1/2 video headers can be decoded from the stream.
    pub fn is_mpeg_video(self) -> bool {
        self == StreamType::Mpeg1Video || self == StreamType::Mpeg2Video
    }

    /// Returns `true` if it is a video stream type.
    pub fn is_video(self) -> bool {
        match self {
            StreamType::Mpeg1Video
            | StreamType::Mpeg2Video
            | StreamType::Mpeg4Visual
            | StreamType::H264
            | StreamType::H265 => true,
            _ => false,
        }
    }

    /// Returns `true` if it is an audio stream type.
    pub fn is_audio(self) -> bool {
        match self {
            StreamType::Mpeg1Audio
            | StreamType::Mpeg2Audio
            | StreamType::AdtsAac
            | StreamType::LatmAac
            | StreamType::Ac3
            | StreamType::Eac3
            | StreamType::Dts => true,
            _ => false,
        }
    }
}

/// An entry of a PAT.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAssociation {
    pub program_num: u16,
    pub program_map_pid: u16,
}

/// Program association table.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub table: Vec<ProgramAssociation>,
}
impl Pat {
    /// Decodes a PAT from a complete section (`table_id` through `CRC_32`).
    ///
    /// Entries with `program_number == 0` (network PID) are skipped.
    pub fn decode(section: &[u8]) -> Result<Self> {
        let header = track!(SectionHeader::decode(section, PAT_TABLE_ID))?;
        let mut table = Vec::new();
        for entry in section[SectionHeader::SIZE..header.crc_offset].chunks(4) {
            track_assert_eq!(entry.len(), 4, ErrorKind::SectionIntegrity);
            let program_num = BigEndian::read_u16(entry);
            let program_map_pid = BigEndian::read_u16(&entry[2..]) & Pid::MAX;
            if program_num != 0 {
                table.push(ProgramAssociation {
                    program_num,
                    program_map_pid,
                });
            }
        }
        Ok(Pat {
            transport_stream_id: header.table_id_extension,
            version_number: header.version_number,
            table,
        })
    }
}

/// An entry of a PMT.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsInfo {
    pub stream_type: StreamType,
    pub elementary_pid: u16,
}

/// Program map table.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_num: u16,
    pub version_number: u8,

    /// `None` if `PCR_PID` is `0x1FFF` (no PCR).
    pub pcr_pid: Option<u16>,
    pub table: Vec<EsInfo>,
}
impl Pmt {
    /// Decodes a PMT from a complete section (`table_id` through `CRC_32`).
    pub fn decode(section: &[u8]) -> Result<Self> {
        let header = track!(SectionHeader::decode(section, PMT_TABLE_ID))?;
        let mut reader = &section[SectionHeader::SIZE..header.crc_offset];
        let pcr_pid = track_io!(reader.read_u16::<BigEndian>())? & Pid::MAX;
        let program_info_len = track_io!(reader.read_u16::<BigEndian>())? & 0x0FFF;
        track_assert!(
            usize::from(program_info_len) <= reader.len(),
            ErrorKind::SectionIntegrity,
            "program_info_length={}, remaining={}",
            program_info_len,
            reader.len()
        );
        reader = &reader[usize::from(program_info_len)..];

        let mut table = Vec::new();
        while !reader.is_empty() {
            let stream_type = track_io!(reader.read_u8())?;
            let elementary_pid = track_io!(reader.read_u16::<BigEndian>())? & Pid::MAX;
            let es_info_len = usize::from(track_io!(reader.read_u16::<BigEndian>())? & 0x0FFF);
            track_assert!(
                es_info_len <= reader.len(),
                ErrorKind::SectionIntegrity,
                "ES_info_length={}, remaining={}",
                es_info_len,
                reader.len()
            );
            reader = &reader[es_info_len..];
            table.push(EsInfo {
                stream_type: StreamType::from_u8(stream_type),
                elementary_pid,
            });
        }
        Ok(Pmt {
            program_num: header.table_id_extension,
            version_number: header.version_number,
            pcr_pid: if pcr_pid == Pid::NULL {
                None
            } else {
                Some(pcr_pid)
            },
            table,
        })
    }

    /// Returns the first video stream.
    pub fn video_stream(&self) -> Option<EsInfo> {
        self.table.iter().copied().find(|e| e.stream_type.is_video())
    }

    /// Returns the first audio stream.
    pub fn audio_stream(&self) -> Option<EsInfo> {
        self.table.iter().copied().find(|e| e.stream_type.is_audio())
    }

    /// Returns the entry of the given PID.
    pub fn stream(&self, pid: u16) -> Option<EsInfo> {
        self.table.iter().copied().find(|e| e.elementary_pid == pid)
    }
}

#[derive(Debug)]
struct SectionHeader {
    table_id_extension: u16,
    version_number: u8,
    crc_offset: usize,
}
impl SectionHeader {
    const SIZE: usize = 8;

    fn decode(section: &[u8], table_id: u8) -> Result<Self> {
        track_assert!(section.len() >= 3, ErrorKind::SectionIntegrity);
        track_assert_eq!(section[0], table_id, ErrorKind::SectionIntegrity);
        let len = section_len(section);
        track_assert!(
            MIN_SECTION_LEN <= len && len <= MAX_SECTION_LEN,
            ErrorKind::SectionIntegrity,
            "section_length={}",
            len
        );
        track_assert_eq!(section.len(), 3 + len, ErrorKind::SectionIntegrity);

        let mut reader = &section[3..];
        let table_id_extension = track_io!(reader.read_u16::<BigEndian>())?;
        let version_number = (track_io!(reader.read_u8())? >> 1) & 0b1_1111;
        Ok(SectionHeader {
            table_id_extension,
            version_number,
            crc_offset: section.len() - 4,
        })
    }
}

fn section_len(section: &[u8]) -> usize {
    usize::from(BigEndian::read_u16(&section[1..]) & 0x0FFF)
}

/// Checks the `CRC_32` at the tail of a complete section.
pub fn verify_crc(section: &[u8]) -> bool {
    if section.len() < 4 {
        return false;
    }
    let (body, tail) = section.split_at(section.len() - 4);
    CRC.checksum(body) == BigEndian::read_u32(tail)
}

/// Reads the next complete PSI section with the given PID and `table_id`.
///
/// The section may span several packets. Every packet after the first must be a continuation
/// (`payload_unit_start_indicator` unset); a packet that starts a new payload unit aborts the
/// attempt and is pushed back so that the next attempt starts from it. Sections whose length is
/// inconsistent (or, with `strict_crc`, whose `CRC_32` does not match) are dropped as well.
///
/// Returns `Ok(None)` if the end of the stream is reached first.
///
/// # Errors
///
/// If `MAX_SECTION_RETRIES` attempts fail, it will return an `ErrorKind::SectionIntegrity` error.
pub fn read_section<T: ReadTsPacket>(
    reader: &mut T,
    pid: u16,
    table_id: u8,
    strict_crc: bool,
    log: LogLevel,
) -> Result<Option<Vec<u8>>> {
    for attempt in 0..MAX_SECTION_RETRIES {
        let packet = match track!(reader.next_unit_start(pid))? {
            None => return Ok(None),
            Some(packet) => packet,
        };
        let payload = packet.payload();
        let pointer_field = payload.first().map_or(0, |&n| usize::from(n));
        if payload.len() <= 1 + pointer_field {
            mpeg_log!(log, Level::Warn, "Invalid pointer_field: pid={}, value={}", pid, pointer_field);
            continue;
        }
        let mut section = payload[1 + pointer_field..].to_vec();

        let mut aborted = false;
        loop {
            if section.len() >= 3 && section.len() >= 3 + section_len(&section) {
                break;
            }
            let next = match track!(reader.next_packet(pid))? {
                None => return Ok(None),
                Some(next) => next,
            };
            if next.header.payload_unit_start_indicator {
                mpeg_log!(
                    log,
                    Level::Warn,
                    "Section interrupted by a new payload unit: pid={}, position={}, attempt={}",
                    pid,
                    next.position,
                    attempt
                );
                reader.unread_ts_packet(next);
                aborted = true;
                break;
            }
            section.extend_from_slice(next.payload());
        }
        if aborted {
            continue;
        }

        if section[0] != table_id {
            mpeg_log!(
                log,
                Level::Debug,
                "Unexpected table_id: pid={}, expected={}, actual={}",
                pid,
                table_id,
                section[0]
            );
            continue;
        }
        let len = section_len(&section);
        if len < MIN_SECTION_LEN || len > MAX_SECTION_LEN {
            mpeg_log!(log, Level::Warn, "Invalid section_length: pid={}, value={}", pid, len);
            continue;
        }
        section.truncate(3 + len);

        if !verify_crc(&section) {
            mpeg_log!(
                log,
                Level::Warn,
                "CRC_32 mismatch: pid={}, table_id={}, strict={}",
                pid,
                table_id,
                strict_crc
            );
            if strict_crc {
                continue;
            }
        }
        return Ok(Some(section));
    }
    track_panic!(
        ErrorKind::SectionIntegrity,
        "Cannot assemble a section: pid={}, table_id={}",
        pid,
        table_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::TsPacket;

    fn section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
        let len = 5 + body.len() + 4;
        let mut bytes = vec![
            table_id,
            0xB0 | (len >> 8) as u8,
            len as u8,
            (id >> 8) as u8,
            id as u8,
            0xC3,
            0x00,
            0x00,
        ];
        bytes.extend_from_slice(body);
        let crc = CRC.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes
    }

    fn pmt_body() -> Vec<u8> {
        vec![
            0xE1, 0x00, // PCR_PID
            0xF0, 0x03, 0x0E, 0x01, 0x00, // program_info
            0x02, 0xE1, 0x00, 0xF0, 0x02, 0x52, 0x00, // MPEG-2 video, pid=0x100
            0x0F, 0xE1, 0x10, 0xF0, 0x00, // AAC, pid=0x110
            0x06, 0xE1, 0x20, 0xF0, 0x00, // private data, pid=0x120
        ]
    }

    struct Packets(Vec<TsPacket>);
    impl ReadTsPacket for Packets {
        fn read_ts_packet(&mut self) -> Result<Option<TsPacket>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }

        fn unread_ts_packet(&mut self, packet: TsPacket) {
            self.0.insert(0, packet);
        }
    }

    fn packet(pid: u16, pusi: bool, payload: &[u8]) -> TsPacket {
        let mut bytes = vec![0x47, ((pusi as u8) << 6) | (pid >> 8) as u8, pid as u8, 0x10];
        bytes.extend_from_slice(payload);
        bytes.resize(188, 0xFF);
        TsPacket::decode(&bytes, 0).unwrap()
    }

    #[test]
    fn verify_crc_works() {
        // PAT: program 1 -> PMT PID 0x1000
        let mut bytes = vec![
            0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00, 0x2A, 0xB1,
            0x04, 0xB2,
        ];
        assert!(verify_crc(&bytes));

        bytes[11] ^= 0x01;
        assert!(!verify_crc(&bytes));
        assert!(!verify_crc(&[0x00, 0xB0]));
    }

    #[test]
    fn decode_pat() {
        let bytes = section(0x00, 1, &[0x00, 0x00, 0xE0, 0x10, 0x00, 0x01, 0xE1, 0x00]);
        assert!(verify_crc(&bytes));
        let pat = Pat::decode(&bytes).unwrap();
        assert_eq!(pat.transport_stream_id, 1);
        assert_eq!(pat.version_number, 1);
        assert_eq!(
            pat.table,
            vec![ProgramAssociation {
                program_num: 1,
                program_map_pid: 0x100
            }]
        );
    }

    #[test]
    fn decode_pmt() {
        let bytes = section(0x02, 1, &pmt_body());
        let pmt = Pmt::decode(&bytes).unwrap();
        assert_eq!(pmt.pcr_pid, Some(0x100));
        assert_eq!(pmt.table.len(), 3);
        let video = pmt.video_stream().unwrap();
        assert_eq!(video.elementary_pid, 0x100);
        assert!(video.stream_type.is_mpeg_video());
        let audio = pmt.audio_stream().unwrap();
        assert_eq!(audio.elementary_pid, 0x110);
        assert_eq!(audio.stream_type, StreamType::AdtsAac);
        assert_eq!(pmt.stream(0x120).map(|e| e.stream_type), Some(StreamType::Other(6)));
    }

    #[test]
    fn inconsistent_sections() {
        let mut bytes = section(0x02, 1, &pmt_body());
        bytes[10] = 0xFF; // program_info_length
        let e = Pmt::decode(&bytes).err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::SectionIntegrity);

        let bytes = section(0x00, 1, &[]);
        assert!(Pat::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Pmt::decode(&section(0x00, 1, &[0, 0, 0, 0])).is_err());
    }

    #[test]
    fn read_section_in_one_packet() {
        let bytes = section(0x00, 1, &[0x00, 0x01, 0xE1, 0x00]);
        let mut payload = vec![0x00];
        payload.extend_from_slice(&bytes);
        let mut packets = Packets(vec![
            packet(0x100, true, &[0x00]),
            packet(0x000, false, &[0x00]),
            packet(0x000, true, &payload),
        ]);
        let section = read_section(&mut packets, 0, 0x00, true, LogLevel::Lv0).unwrap();
        assert_eq!(section, Some(bytes));
    }

    #[test]
    fn read_section_across_packets() {
        let body: Vec<u8> = (0..50u16).flat_map(|i| vec![0x00, i as u8 + 1, 0xE1, i as u8]).collect();
        let bytes = section(0x00, 1, &body);
        let mut first = vec![0x00];
        first.extend_from_slice(&bytes[..183]);
        let mut packets = Packets(vec![
            packet(0x000, true, &first),
            packet(0x100, true, &[0x00]),
            packet(0x000, false, &bytes[183..]),
        ]);
        let section = read_section(&mut packets, 0, 0x00, true, LogLevel::Lv0).unwrap().unwrap();
        assert_eq!(section, bytes);
        assert_eq!(Pat::decode(&section).unwrap().table.len(), 50);
    }

    #[test]
    fn stray_unit_start_aborts_and_retries() {
        let bytes = section(0x00, 1, &[0x00, 0x01, 0xE1, 0x00]);
        let mut whole = vec![0x00];
        whole.extend_from_slice(&bytes);

        // The first occurrence is cut right before its CRC_32
        let mut head: Vec<u8> = vec![(184 - 1 - (bytes.len() - 4)) as u8];
        head.resize(usize::from(head[0]) + 1, 0xFF);
        head.extend_from_slice(&bytes[..bytes.len() - 4]);
        assert_eq!(head.len(), 184);

        let mut packets = Packets(vec![
            packet(0x000, true, &head),
            packet(0x000, true, &whole),
        ]);
        let section = read_section(&mut packets, 0, 0x00, true, LogLevel::Lv0).unwrap();
        assert_eq!(section, Some(bytes));
        assert!(packets.0.is_empty());
    }

    #[test]
    fn crc_enforcement() {
        let mut bytes = section(0x00, 1, &[0x00, 0x01, 0xE1, 0x00]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut payload = vec![0x00];
        payload.extend_from_slice(&bytes);

        let mut packets = Packets(vec![packet(0x000, true, &payload)]);
        let section = read_section(&mut packets, 0, 0x00, false, LogLevel::Lv0).unwrap();
        assert_eq!(section, Some(bytes.clone()));

        let mut packets = Packets(vec![packet(0x000, true, &payload)]);
        assert_eq!(read_section(&mut packets, 0, 0x00, true, LogLevel::Lv0).unwrap(), None);

        let mut packets = Packets(vec![packet(0x000, true, &payload); MAX_SECTION_RETRIES]);
        let e = read_section(&mut packets, 0, 0x00, true, LogLevel::Lv0).err().unwrap();
        assert_eq!(*e.kind(), ErrorKind::SectionIntegrity);
    }
}
