//! PES stream identifiers (ISO/IEC 13818-1, Table 2-22).
use crate::{ErrorKind, Result};

/// Stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u8);
impl StreamId {
    /// Minimum value of the identifiers for audio streams.
    pub const AUDIO_MIN: u8 = 0xC0;

    /// Maximum value of the identifiers for audio streams.
    pub const AUDIO_MAX: u8 = 0xDF;

    /// Minimum value of the identifiers for video streams.
    pub const VIDEO_MIN: u8 = 0xE0;

    /// Maximum value of the identifiers for video streams.
    pub const VIDEO_MAX: u8 = 0xEF;

    /// Makes a new `StreamId` instance.
    pub fn new(id: u8) -> Self {
        StreamId(id)
    }

    /// Makes a new `StreamId` instance for video stream.
    ///
    /// # Errors
    ///
    /// If `id` is not between `VIDEO_MIN` and `VIDEO_MAX`, it will return an `ErrorKind::InvalidInput` error.
    pub fn new_video(id: u8) -> Result<Self> {
        track_assert!(
            Self::VIDEO_MIN <= id && id <= Self::VIDEO_MAX,
            ErrorKind::InvalidInput,
            "Not a video ID: {}",
            id
        );
        Ok(StreamId(id))
    }

    /// Returns the value of the identifier.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns the class of the identifier.
    pub fn kind(self) -> PesStreamKind {
        PesStreamKind::ALL
            .iter()
            .copied()
            .find(|k| k.matches(self.0))
            .unwrap_or(PesStreamKind::Reserved)
    }

    /// Returns `true` if it is an audio identifier, otherwise `false`.
    pub fn is_audio(self) -> bool {
        self.kind() == PesStreamKind::Audio
    }

    /// Returns `true` if it is a video identifier, otherwise `false`.
    pub fn is_video(self) -> bool {
        self.kind() == PesStreamKind::Video
    }

    /// Returns `true` if PES packets of this stream carry the optional PES header
    /// (flags, PTS/DTS and so on), otherwise `false`.
    pub fn has_optional_header(self) -> bool {
        match self.kind() {
            PesStreamKind::ProgramStreamMap
            | PesStreamKind::PaddingStream
            | PesStreamKind::PrivateStream2
            | PesStreamKind::Ecm
            | PesStreamKind::Emm
            | PesStreamKind::ProgramStreamDirectory
            | PesStreamKind::DsmCc
            | PesStreamKind::H2221TypeE => false,
            _ => true,
        }
    }
}

/// Classes of PES `stream_id` values (ISO/IEC 13818-1, Table 2-22).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PesStreamKind {
    ProgramStreamMap,
    PrivateStream1,
    PaddingStream,
    PrivateStream2,
    Audio,
    Video,
    Ecm,
    Emm,
    DsmCc,
    Iso13522,
    H2221TypeA,
    H2221TypeB,
    H2221TypeC,
    H2221TypeD,
    H2221TypeE,
    Ancillary,
    SlPacketized,
    FlexMux,
    Metadata,
    ExtendedStreamId,
    Reserved,
    ProgramStreamDirectory,
}
impl PesStreamKind {
    const ALL: [PesStreamKind; 22] = [
        PesStreamKind::ProgramStreamMap,
        PesStreamKind::PrivateStream1,
        PesStreamKind::PaddingStream,
        PesStreamKind::PrivateStream2,
        PesStreamKind::Audio,
        PesStreamKind::Video,
        PesStreamKind::Ecm,
        PesStreamKind::Emm,
        PesStreamKind::DsmCc,
        PesStreamKind::Iso13522,
        PesStreamKind::H2221TypeA,
        PesStreamKind::H2221TypeB,
        PesStreamKind::H2221TypeC,
        PesStreamKind::H2221TypeD,
        PesStreamKind::H2221TypeE,
        PesStreamKind::Ancillary,
        PesStreamKind::SlPacketized,
        PesStreamKind::FlexMux,
        PesStreamKind::Metadata,
        PesStreamKind::ExtendedStreamId,
        PesStreamKind::Reserved,
        PesStreamKind::ProgramStreamDirectory,
    ];

    /// Returns the `(mask, value)` pair selecting the `stream_id` values of this class.
    pub fn mask_and_value(self) -> (u8, u8) {
        match self {
            PesStreamKind::ProgramStreamMap => (0xFF, 0xBC),
            PesStreamKind::PrivateStream1 => (0xFF, 0xBD),
            PesStreamKind::PaddingStream => (0xFF, 0xBE),
            PesStreamKind::PrivateStream2 => (0xFF, 0xBF),
            PesStreamKind::Audio => (0xE0, 0xC0),
            PesStreamKind::Video => (0xF0, 0xE0),
            PesStreamKind::Ecm => (0xFF, 0xF0),
            PesStreamKind::Emm => (0xFF, 0xF1),
            PesStreamKind::DsmCc => (0xFF, 0xF2),
            PesStreamKind::Iso13522 => (0xFF, 0xF3),
            PesStreamKind::H2221TypeA => (0xFF, 0xF4),
            PesStreamKind::H2221TypeB => (0xFF, 0xF5),
            PesStreamKind::H2221TypeC => (0xFF, 0xF6),
            PesStreamKind::H2221TypeD => (0xFF, 0xF7),
            PesStreamKind::H2221TypeE => (0xFF, 0xF8),
            PesStreamKind::Ancillary => (0xFF, 0xF9),
            PesStreamKind::SlPacketized => (0xFF, 0xFA),
            PesStreamKind::FlexMux => (0xFF, 0xFB),
            PesStreamKind::Metadata => (0xFF, 0xFC),
            PesStreamKind::ExtendedStreamId => (0xFF, 0xFD),
            PesStreamKind::Reserved => (0xFF, 0xFE),
            PesStreamKind::ProgramStreamDirectory => (0xFF, 0xFF),
        }
    }

    fn matches(self, id: u8) -> bool {
        let (mask, value) = self.mask_and_value();
        id & mask == value
    }
}

/// Returns `true` if `buf` starts with the PES start code prefix (`00 00 01`) followed by
/// a `stream_id` of the given class.
pub fn check_pes_start_code(buf: &[u8], kind: PesStreamKind) -> bool {
    buf.len() >= 4 && buf[..3] == [0x00, 0x00, 0x01] && kind.matches(buf[3])
}

/// Returns `true` if `buf` starts with a PES start code of any class.
pub fn is_pes_start_code(buf: &[u8]) -> bool {
    buf.len() >= 4 && buf[..3] == [0x00, 0x00, 0x01] && buf[3] >= 0xBC
}
