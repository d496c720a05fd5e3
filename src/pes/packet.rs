use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::es::stream_id::{is_pes_start_code, StreamId};
use crate::time::Timestamp;
use crate::{ErrorKind, Result};

/// PES packet header.
///
/// Only the fixed part and the PTS/DTS fields of the optional header are decoded;
/// the remaining optional fields are reported through their flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    /// Stream identifier.
    pub stream_id: StreamId,

    /// `PES_packet_length` (`0` means unbounded).
    pub packet_len: u16,

    /// `PES_scrambling_control`.
    pub scrambling_control: u8,

    /// `PES_priority`.
    pub priority: bool,

    /// `data_alignment_indicator`.
    pub data_alignment_indicator: bool,

    /// `copyright`.
    pub copyright: bool,

    /// `original_or_copy`.
    pub original_or_copy: bool,

    /// `ESCR_flag`.
    pub escr_flag: bool,

    /// `ES_rate_flag`.
    pub es_rate_flag: bool,

    /// `DSM_trick_mode_flag`.
    pub dsm_trick_mode_flag: bool,

    /// `additional_copy_info_flag`.
    pub additional_copy_info_flag: bool,

    /// `PES_CRC_flag`.
    pub crc_flag: bool,

    /// `PES_extension_flag`.
    pub extension_flag: bool,

    /// `PES_header_data_length`.
    pub header_data_len: u8,

    /// Presentation timestamp.
    pub pts: Option<Timestamp>,

    /// Decoding timestamp.
    pub dts: Option<Timestamp>,
}
impl PesHeader {
    /// Length of the fixed part (start code prefix, `stream_id` and `PES_packet_length`).
    pub const FIXED_LEN: usize = 6;

    /// Length of the fixed part plus the flags and `PES_header_data_length` fields.
    pub const FLAGS_LEN: usize = 9;

    /// Makes a header for a PES packet that carries `payload_len` bytes with the given timestamps.
    ///
    /// `dts` is only written if it differs from `pts`.
    pub fn new(stream_id: StreamId, pts: Timestamp, dts: Option<Timestamp>, payload_len: usize) -> Self {
        let dts = dts.filter(|&dts| dts != pts);
        let header_data_len = if dts.is_some() { 10 } else { 5 };
        let total = 3 + header_data_len + payload_len;
        PesHeader {
            stream_id,
            packet_len: if total <= 0xFFFF { total as u16 } else { 0 },
            scrambling_control: 0,
            priority: false,
            data_alignment_indicator: true,
            copyright: false,
            original_or_copy: false,
            escr_flag: false,
            es_rate_flag: false,
            dsm_trick_mode_flag: false,
            additional_copy_info_flag: false,
            crc_flag: false,
            extension_flag: false,
            header_data_len: header_data_len as u8,
            pts: Some(pts),
            dts,
        }
    }

    /// Returns `true` if `PTS_DTS_flags` indicates a PTS.
    pub fn pts_flag(&self) -> bool {
        self.pts.is_some()
    }

    /// Returns `true` if `PTS_DTS_flags` indicates a DTS.
    pub fn dts_flag(&self) -> bool {
        self.dts.is_some()
    }

    /// Returns the length of the optional header (the flags bytes plus `PES_header_data_length`).
    pub fn optional_header_len(&self) -> u16 {
        if self.stream_id.has_optional_header() {
            3 + u16::from(self.header_data_len)
        } else {
            0
        }
    }

    /// Returns the whole header length, i.e., the offset of the payload within the PES packet.
    pub fn header_len(&self) -> usize {
        Self::FIXED_LEN + self.optional_header_len() as usize
    }

    /// Returns the number of leading bytes needed to decode a header from `bytes`,
    /// or `None` if `bytes` is too short to tell.
    pub fn required_len(bytes: &[u8]) -> Option<usize> {
        if bytes.len() < 4 {
            return None;
        }
        if !StreamId::new(bytes[3]).has_optional_header() {
            return Some(Self::FIXED_LEN);
        }
        if bytes.len() < Self::FLAGS_LEN {
            return None;
        }
        let timestamps_len = match bytes[7] >> 6 {
            0b10 => 5,
            0b11 => 10,
            _ => 0,
        };
        Some(Self::FLAGS_LEN + timestamps_len.min(usize::from(bytes[8])))
    }

    /// Decodes a PES header from the head of `bytes`.
    ///
    /// # Errors
    ///
    /// If `bytes` does not start with a PES start code, it will return an `ErrorKind::InvalidInput` error.
    /// If `bytes` is shorter than `required_len`, it will return an `ErrorKind::Truncated` error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        track_assert!(
            bytes.len() < 4 || is_pes_start_code(bytes),
            ErrorKind::InvalidInput,
            "Not a PES start code: {:02x?}",
            &bytes[..4]
        );
        let required = track_assert_some!(Self::required_len(bytes), ErrorKind::Truncated);
        track_assert!(
            bytes.len() >= required,
            ErrorKind::Truncated,
            "actual={}, required={}",
            bytes.len(),
            required
        );

        let mut reader = &bytes[3..];
        let stream_id = StreamId::new(track_io!(reader.read_u8())?);
        let packet_len = track_io!(reader.read_u16::<BigEndian>())?;
        let mut header = PesHeader {
            stream_id,
            packet_len,
            scrambling_control: 0,
            priority: false,
            data_alignment_indicator: false,
            copyright: false,
            original_or_copy: false,
            escr_flag: false,
            es_rate_flag: false,
            dsm_trick_mode_flag: false,
            additional_copy_info_flag: false,
            crc_flag: false,
            extension_flag: false,
            header_data_len: 0,
            pts: None,
            dts: None,
        };
        if !stream_id.has_optional_header() {
            return Ok(header);
        }

        let b = track_io!(reader.read_u8())?;
        if b >> 6 != 0b10 {
            log::trace!("Unexpected PES optional header marker: 0x{:02x}", b);
        }
        header.scrambling_control = (b >> 4) & 0b11;
        header.priority = (b & 0b1000) != 0;
        header.data_alignment_indicator = (b & 0b0100) != 0;
        header.copyright = (b & 0b0010) != 0;
        header.original_or_copy = (b & 0b0001) != 0;

        let b = track_io!(reader.read_u8())?;
        let pts_dts_flags = b >> 6;
        header.escr_flag = (b & 0b0010_0000) != 0;
        header.es_rate_flag = (b & 0b0001_0000) != 0;
        header.dsm_trick_mode_flag = (b & 0b0000_1000) != 0;
        header.additional_copy_info_flag = (b & 0b0000_0100) != 0;
        header.crc_flag = (b & 0b0000_0010) != 0;
        header.extension_flag = (b & 0b0000_0001) != 0;
        header.header_data_len = track_io!(reader.read_u8())?;

        let available = usize::from(header.header_data_len);
        match pts_dts_flags {
            0b10 if available >= 5 => {
                let (pts, _) = track!(Timestamp::read_from(&mut reader))?;
                header.pts = Some(pts);
            }
            0b11 if available >= 10 => {
                let (pts, _) = track!(Timestamp::read_from(&mut reader))?;
                let (dts, _) = track!(Timestamp::read_from(&mut reader))?;
                header.pts = Some(pts);
                header.dts = Some(dts);
            }
            0b00 => {}
            flags => {
                log::trace!(
                    "Inconsistent PTS_DTS_flags: flags={:02b}, header_data_len={}",
                    flags,
                    available
                );
            }
        }
        Ok(header)
    }

    /// Writes the header.
    ///
    /// Only the PTS/DTS fields of the optional header are written; the remaining bytes
    /// up to `header_data_len` are filled with stuffing bytes.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_io!(writer.write_all(&[0x00, 0x00, 0x01, self.stream_id.as_u8()]))?;
        track_io!(writer.write_u16::<BigEndian>(self.packet_len))?;
        if !self.stream_id.has_optional_header() {
            return Ok(());
        }

        let timestamps_len = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 10,
            (Some(_), None) => 5,
            _ => 0,
        };
        track_assert!(
            usize::from(self.header_data_len) >= timestamps_len,
            ErrorKind::InvalidInput,
            "header_data_len={}",
            self.header_data_len
        );

        let n = 0b1000_0000
            | (self.scrambling_control << 4)
            | ((self.priority as u8) << 3)
            | ((self.data_alignment_indicator as u8) << 2)
            | ((self.copyright as u8) << 1)
            | self.original_or_copy as u8;
        track_io!(writer.write_u8(n))?;

        let pts_dts_flags = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0b11,
            (Some(_), None) => 0b10,
            _ => 0b00,
        };
        let n = (pts_dts_flags << 6)
            | ((self.escr_flag as u8) << 5)
            | ((self.es_rate_flag as u8) << 4)
            | ((self.dsm_trick_mode_flag as u8) << 3)
            | ((self.additional_copy_info_flag as u8) << 2)
            | ((self.crc_flag as u8) << 1)
            | self.extension_flag as u8;
        track_io!(writer.write_u8(n))?;
        track_io!(writer.write_u8(self.header_data_len))?;

        match (self.pts, self.dts) {
            (Some(pts), Some(dts)) => {
                track!(pts.write_to(&mut writer, 0b0011))?;
                track!(dts.write_to(&mut writer, 0b0001))?;
            }
            (Some(pts), None) => {
                track!(pts.write_to(&mut writer, 0b0010))?;
            }
            _ => {}
        }
        for _ in timestamps_len..usize::from(self.header_data_len) {
            track_io!(writer.write_u8(0xFF))?;
        }
        Ok(())
    }
}

/// Reads the PES header at the head of `reader`, and returns it with the number of bytes consumed.
pub(crate) fn read_pes_header<R: Read>(mut reader: R) -> Result<(PesHeader, usize)> {
    let mut buf = vec![0; PesHeader::FIXED_LEN];
    track_io!(reader.read_exact(&mut buf))?;
    let stream_id = StreamId::new(buf[3]);
    if stream_id.has_optional_header() {
        buf.resize(PesHeader::FLAGS_LEN, 0);
        track_io!(reader.read_exact(&mut buf[PesHeader::FIXED_LEN..]))?;
        let len = PesHeader::FLAGS_LEN + usize::from(buf[8]);
        buf.resize(len, 0);
        track_io!(reader.read_exact(&mut buf[PesHeader::FLAGS_LEN..]))?;
    }
    let header = track!(PesHeader::decode(&buf))?;
    Ok((header, buf.len()))
}
