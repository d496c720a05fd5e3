//! Sample records produced by the parsers and stored in sample lists.
pub use crate::es::video::{PictureCodingType, PictureStructure};

/// Kind of elementary stream a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Video stream.
    Video,

    /// Audio stream.
    Audio,
}

/// Framing of the payload returned by sample data extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleDataMode {
    /// Elementary stream bytes only.
    Raw,

    /// PES packet (header and payload).
    ///
    /// For elementary stream input, a PES header carrying the sample's PTS/DTS is synthesized.
    Pes,

    /// Bytes as framed by the container (TS packets of the sample, or raw bytes for elementary stream input).
    Container,
}

/// A video sample as found by a parser.
///
/// Timestamps are raw 33 bit values.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSampleInfo {
    pub file_position: u64,
    pub sample_size: u64,
    pub pts: u64,
    pub dts: u64,
    pub gop_number: u32,
    pub progressive_sequence: bool,
    pub closed_gop: bool,
    pub picture_coding_type: PictureCodingType,
    pub temporal_reference: u16,
    pub picture_structure: PictureStructure,
    pub progressive_frame: bool,
    pub repeat_first_field: bool,
    pub top_field_first: bool,

    /// `random_access_indicator` of the TS packet that starts the sample
    /// (elementary stream input: `true` for I-pictures).
    pub random_access: bool,
}

/// An audio sample as found by a parser.
///
/// Timestamps are raw 33 bit values.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSampleInfo {
    pub file_position: u64,
    pub sample_size: u64,
    pub pts: u64,
    pub dts: u64,
}

/// Per-GOP flags.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GopRecord {
    pub progressive_sequence: bool,
    pub closed_gop: bool,
}

/// An entry of the video sample list.
///
/// `pts` and `dts` are corrected for 33 bit wraparound.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSample {
    pub file_position: u64,
    pub sample_size: u64,
    pub gop_number: u32,
    pub pts: u64,
    pub dts: u64,
    pub picture_coding_type: PictureCodingType,
    pub temporal_reference: u16,
    pub picture_structure: PictureStructure,
    pub progressive_frame: bool,
    pub repeat_first_field: bool,
    pub top_field_first: bool,
    pub random_access: bool,
}
impl VideoSample {
    pub(crate) fn new(info: &VideoSampleInfo, pts: u64, dts: u64) -> Self {
        VideoSample {
            file_position: info.file_position,
            sample_size: info.sample_size,
            gop_number: info.gop_number,
            pts,
            dts,
            picture_coding_type: info.picture_coding_type,
            temporal_reference: info.temporal_reference,
            picture_structure: info.picture_structure,
            progressive_frame: info.progressive_frame,
            repeat_first_field: info.repeat_first_field,
            top_field_first: info.top_field_first,
            random_access: info.random_access,
        }
    }

    /// Returns `true` if decoding can start at this sample.
    ///
    /// That is an I-picture, or a random access point when the picture type is unknown.
    pub fn is_keyframe(&self) -> bool {
        match self.picture_coding_type {
            PictureCodingType::I => true,
            PictureCodingType::Unknown => self.random_access,
            _ => false,
        }
    }

    /// Returns the number of fields the picture occupies on display.
    ///
    /// In a progressive sequence `repeat_first_field` doubles (or, with `top_field_first`, triples)
    /// the frame.
    pub fn display_fields(&self, progressive_sequence: bool) -> u32 {
        if self.picture_structure.is_field() {
            1
        } else if progressive_sequence {
            match (self.repeat_first_field, self.top_field_first) {
                (false, _) => 2,
                (true, false) => 4,
                (true, true) => 6,
            }
        } else if self.repeat_first_field {
            3
        } else {
            2
        }
    }
}

/// An entry of the audio sample list.
///
/// `pts` and `dts` are corrected for 33 bit wraparound.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSample {
    pub file_position: u64,
    pub sample_size: u64,
    pub pts: u64,
    pub dts: u64,
}
