use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

use crate::time::ClockReference;
use crate::{ErrorKind, Result};

/// Packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);
impl Pid {
    /// PID of the program association table.
    pub const PAT: u16 = 0x0000;

    /// PID of null packets.
    pub const NULL: u16 = 0x1FFF;

    /// Maximum PID value.
    pub const MAX: u16 = 0x1FFF;

    /// Makes a new `Pid` instance.
    ///
    /// # Errors
    ///
    /// If `pid` exceeds `Pid::MAX`, it will return an `ErrorKind::InvalidInput` error.
    pub fn new(pid: u16) -> Result<Self> {
        track_assert!(pid <= Self::MAX, ErrorKind::InvalidInput, "Too large PID: {}", pid);
        Ok(Pid(pid))
    }

    /// Returns the value of the PID.
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

/// Framing of TS packets in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketFormat {
    /// Plain 188 byte packets.
    Plain,

    /// 192 byte packets (4 byte timestamp prefix, as in BDAV/M2TS).
    Timestamped,

    /// 204 byte packets (16 byte FEC trailer).
    Fec,
}
impl PacketFormat {
    /// Formats in the order they are tried by autodetection.
    pub const ALL: [PacketFormat; 3] = [PacketFormat::Plain, PacketFormat::Timestamped, PacketFormat::Fec];

    /// Returns the stride between packet starts.
    pub fn size(self) -> usize {
        match self {
            PacketFormat::Plain => 188,
            PacketFormat::Timestamped => 192,
            PacketFormat::Fec => 204,
        }
    }

    /// Returns the offset of the sync byte within a stride unit.
    pub fn sync_offset(self) -> usize {
        match self {
            PacketFormat::Timestamped => 4,
            _ => 0,
        }
    }
}

/// `adaptation_field_control`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdaptationFieldControl {
    Reserved,
    PayloadOnly,
    AdaptationFieldOnly,
    AdaptationFieldAndPayload,
}
impl AdaptationFieldControl {
    fn from_u8(n: u8) -> Self {
        match n & 0b11 {
            0b01 => AdaptationFieldControl::PayloadOnly,
            0b10 => AdaptationFieldControl::AdaptationFieldOnly,
            0b11 => AdaptationFieldControl::AdaptationFieldAndPayload,
            _ => AdaptationFieldControl::Reserved,
        }
    }

    /// Returns `true` if the packet has an adaptation field.
    pub fn has_adaptation_field(self) -> bool {
        match self {
            AdaptationFieldControl::AdaptationFieldOnly
            | AdaptationFieldControl::AdaptationFieldAndPayload => true,
            _ => false,
        }
    }

    /// Returns `true` if the packet has a payload.
    pub fn has_payload(self) -> bool {
        match self {
            AdaptationFieldControl::PayloadOnly
            | AdaptationFieldControl::AdaptationFieldAndPayload => true,
            _ => false,
        }
    }
}

/// TS packet header.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error_indicator: bool,
    pub payload_unit_start_indicator: bool,
    pub transport_priority: bool,
    pub pid: Pid,
    pub transport_scrambling_control: u8,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter: u8,
}
impl TsHeader {
    /// Size of the header.
    pub const SIZE: usize = 4;

    /// Sync byte.
    pub const SYNC_BYTE: u8 = 0x47;

    /// Reads a 4 byte TS header.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let sync_byte = track_io!(reader.read_u8())?;
        track_assert_eq!(sync_byte, Self::SYNC_BYTE, ErrorKind::InvalidInput);

        let n = track_io!(reader.read_u16::<BigEndian>())?;
        let transport_error_indicator = (n & 0x8000) != 0;
        let payload_unit_start_indicator = (n & 0x4000) != 0;
        let transport_priority = (n & 0x2000) != 0;
        let pid = Pid(n & Pid::MAX);

        let n = track_io!(reader.read_u8())?;
        Ok(TsHeader {
            transport_error_indicator,
            payload_unit_start_indicator,
            transport_priority,
            pid,
            transport_scrambling_control: n >> 6,
            adaptation_field_control: AdaptationFieldControl::from_u8(n >> 4),
            continuity_counter: n & 0x0F,
        })
    }
}

/// Adaptation field.
///
/// Transport private data and the adaptation field extension are not decoded.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub es_priority_indicator: bool,
    pub pcr: Option<ClockReference>,
    pub opcr: Option<ClockReference>,
    pub splice_countdown: Option<i8>,
}
impl AdaptationField {
    /// Reads an adaptation field.
    ///
    /// Returns `None` if `adaptation_field_length` is zero.
    /// The whole field (`1 + adaptation_field_length` bytes) is consumed.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Option<Self>> {
        let adaptation_field_len = track_io!(reader.read_u8())?;
        if adaptation_field_len == 0 {
            return Ok(None);
        }
        let mut buf = [0; 183];
        track_assert!(
            adaptation_field_len <= 183,
            ErrorKind::InvalidInput,
            "adaptation_field_length={}",
            adaptation_field_len
        );
        let buf = &mut buf[..usize::from(adaptation_field_len)];
        track_io!(reader.read_exact(buf))?;

        let mut reader = &buf[..];
        let b = track_io!(reader.read_u8())?;
        let discontinuity_indicator = (b & 0b1000_0000) != 0;
        let random_access_indicator = (b & 0b0100_0000) != 0;
        let es_priority_indicator = (b & 0b0010_0000) != 0;
        let pcr_flag = (b & 0b0001_0000) != 0;
        let opcr_flag = (b & 0b0000_1000) != 0;
        let splicing_point_flag = (b & 0b0000_0100) != 0;

        let pcr = if pcr_flag {
            Some(track!(ClockReference::read_from(&mut reader))?)
        } else {
            None
        };
        let opcr = if opcr_flag {
            Some(track!(ClockReference::read_from(&mut reader))?)
        } else {
            None
        };
        let splice_countdown = if splicing_point_flag {
            Some(track_io!(reader.read_i8())?)
        } else {
            None
        };
        Ok(Some(AdaptationField {
            discontinuity_indicator,
            random_access_indicator,
            es_priority_indicator,
            pcr,
            opcr,
            splice_countdown,
        }))
    }
}

/// TS packet.
#[derive(Debug, Clone)]
pub struct TsPacket {
    /// Byte offset of the packet's stride unit in the file
    /// (for 192 byte packets this is the offset of the timestamp prefix).
    pub position: u64,

    /// Header.
    pub header: TsHeader,

    /// Adaptation field.
    pub adaptation_field: Option<AdaptationField>,

    bytes: [u8; TsPacket::SIZE],
    payload_offset: usize,
}
impl TsPacket {
    /// Size of a packet (without timestamp prefix or FEC trailer).
    pub const SIZE: usize = 188;

    /// Decodes a 188 byte packet that starts at the sync byte.
    pub fn decode(bytes: &[u8], position: u64) -> Result<Self> {
        track_assert_eq!(bytes.len(), Self::SIZE, ErrorKind::InvalidInput);
        let mut reader = bytes;
        let header = track!(TsHeader::read_from(&mut reader))?;
        let (adaptation_field, payload_offset) =
            if header.adaptation_field_control.has_adaptation_field() {
                let field = track!(AdaptationField::read_from(&mut reader))?;
                (field, TsHeader::SIZE + 1 + usize::from(bytes[TsHeader::SIZE]))
            } else {
                (None, TsHeader::SIZE)
            };
        track_assert!(
            payload_offset <= Self::SIZE,
            ErrorKind::InvalidInput,
            "payload_offset={}",
            payload_offset
        );

        let mut packet = TsPacket {
            position,
            header,
            adaptation_field,
            bytes: [0; Self::SIZE],
            payload_offset,
        };
        packet.bytes.copy_from_slice(bytes);
        Ok(packet)
    }

    /// Returns the PID of the packet.
    pub fn pid(&self) -> u16 {
        self.header.pid.as_u16()
    }

    /// Returns the payload (empty if the packet has none).
    pub fn payload(&self) -> &[u8] {
        if self.header.adaptation_field_control.has_payload() {
            &self.bytes[self.payload_offset..]
        } else {
            &[]
        }
    }

    /// Returns the 188 packet bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Returns the PCR carried in the adaptation field.
    pub fn pcr(&self) -> Option<ClockReference> {
        self.adaptation_field.and_then(|a| a.pcr)
    }

    /// Returns `random_access_indicator` of the adaptation field.
    pub fn is_random_access(&self) -> bool {
        self.adaptation_field
            .map_or(false, |a| a.random_access_indicator)
    }
}
