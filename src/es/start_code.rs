//! MPEG video start codes (ISO/IEC 13818-2, Table 6-1).
use std::io::BufRead;

use crate::Result;

/// Kinds of MPEG video start codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoStartCode {
    /// `sequence_header_code` (`0xB3`).
    SequenceHeader,

    /// `extension_start_code` (`0xB5`).
    Extension,

    /// `user_data_start_code` (`0xB2`).
    UserData,

    /// `sequence_end_code` (`0xB7`).
    SequenceEnd,

    /// `group_start_code` (`0xB8`).
    Gop,

    /// `picture_start_code` (`0x00`).
    Picture,

    /// `slice_start_code` (`0x01..=0xAF`).
    Slice,
}
impl VideoStartCode {
    const ALL: [VideoStartCode; 7] = [
        VideoStartCode::SequenceHeader,
        VideoStartCode::Extension,
        VideoStartCode::UserData,
        VideoStartCode::SequenceEnd,
        VideoStartCode::Gop,
        VideoStartCode::Picture,
        VideoStartCode::Slice,
    ];

    /// Classifies the byte that follows the `00 00 01` prefix.
    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.matches(code))
    }

    /// Classifies the start code at the head of `buf`.
    pub fn detect(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 || buf[..3] != [0x00, 0x00, 0x01] {
            return None;
        }
        Self::from_u8(buf[3])
    }

    /// Returns `true` if a sample (coded picture together with its leading headers) may start here.
    pub fn starts_sample(self) -> bool {
        match self {
            VideoStartCode::SequenceHeader | VideoStartCode::Gop | VideoStartCode::Picture => true,
            _ => false,
        }
    }

    /// Returns `true` if the current sample ends just before this start code.
    pub fn ends_sample(self) -> bool {
        self.starts_sample() || self == VideoStartCode::SequenceEnd
    }

    fn matches(self, code: u8) -> bool {
        match self {
            VideoStartCode::SequenceHeader => code == 0xB3,
            VideoStartCode::Extension => code == 0xB5,
            VideoStartCode::UserData => code == 0xB2,
            VideoStartCode::SequenceEnd => code == 0xB7,
            VideoStartCode::Gop => code == 0xB8,
            VideoStartCode::Picture => code == 0x00,
            VideoStartCode::Slice => 0x01 <= code && code <= 0xAF,
        }
    }
}

/// Returns `true` if `buf` starts with the given kind of video start code.
pub fn check_video_start_code(buf: &[u8], kind: VideoStartCode) -> bool {
    buf.len() >= 4 && buf[..3] == [0x00, 0x00, 0x01] && kind.matches(buf[3])
}

/// Scans `reader` for the next `00 00 01 xx` sequence using a 4 byte sliding window.
///
/// Returns the code byte `xx` and the number of bytes consumed including the 4 byte start code,
/// or `None` if the end of the stream is reached first.
pub fn find_start_code<B: BufRead>(reader: &mut B) -> Result<Option<(u8, u64)>> {
    let mut window = 0xFFFF_FFFFu32;
    let mut consumed = 0;
    loop {
        let (n, found) = {
            let buf = track_io!(reader.fill_buf())?;
            if buf.is_empty() {
                return Ok(None);
            }
            let mut found = None;
            for (i, &b) in buf.iter().enumerate() {
                window = (window << 8) | u32::from(b);
                if window & 0xFFFF_FF00 == 0x0000_0100 {
                    found = Some((i + 1, b));
                    break;
                }
            }
            match found {
                Some((n, b)) => (n, Some(b)),
                None => (buf.len(), None),
            }
        };
        reader.consume(n);
        consumed += n as u64;
        if let Some(code) = found {
            return Ok(Some((code, consumed)));
        }
    }
}

/// `extension_start_code_identifier` values (ISO/IEC 13818-2, Table 6-2).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionId {
    Sequence,
    SequenceDisplay,
    QuantMatrix,
    Copyright,
    SequenceScalable,
    PictureDisplay,
    PictureCoding,
    PictureSpatialScalable,
    PictureTemporalScalable,
}
impl ExtensionId {
    /// Converts the 4 bit identifier into `ExtensionId`.
    ///
    /// Reserved identifiers yield `None`.
    pub fn from_u8(n: u8) -> Option<Self> {
        Some(match n {
            0b0001 => ExtensionId::Sequence,
            0b0010 => ExtensionId::SequenceDisplay,
            0b0011 => ExtensionId::QuantMatrix,
            0b0100 => ExtensionId::Copyright,
            0b0101 => ExtensionId::SequenceScalable,
            0b0111 => ExtensionId::PictureDisplay,
            0b1000 => ExtensionId::PictureCoding,
            0b1001 => ExtensionId::PictureSpatialScalable,
            0b1010 => ExtensionId::PictureTemporalScalable,
            _ => return None,
        })
    }

    /// Returns the 4 bit identifier.
    pub fn as_u8(self) -> u8 {
        match self {
            ExtensionId::Sequence => 0b0001,
            ExtensionId::SequenceDisplay => 0b0010,
            ExtensionId::QuantMatrix => 0b0011,
            ExtensionId::Copyright => 0b0100,
            ExtensionId::SequenceScalable => 0b0101,
            ExtensionId::PictureDisplay => 0b0111,
            ExtensionId::PictureCoding => 0b1000,
            ExtensionId::PictureSpatialScalable => 0b1001,
            ExtensionId::PictureTemporalScalable => 0b1010,
        }
    }
}
