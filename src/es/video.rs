//! MPEG-1/2 video header decoding (ISO/IEC 13818-2, section 6.2).
//!
//! Each `decode` function takes the bytes that follow a start code and requires the buffer
//! to hold at least the header's full size. [`VideoHeaderDecoder::read_header`] sizes the
//! variable-length headers from already parsed state before pulling exactly that many bytes
//! from a reader, so a header is never decoded from a short buffer.
use bitstream_io::{BigEndian, BitRead, BitReader};
use std::io::Read;

use crate::es::start_code::{ExtensionId, VideoStartCode};
use crate::{ErrorKind, Result};

/// Picture coding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureCodingType {
    /// Intra-coded (I) picture.
    I,

    /// Predictive-coded (P) picture.
    P,

    /// Bidirectionally-predictive-coded (B) picture.
    B,

    /// Unknown or not available.
    Unknown,
}
impl PictureCodingType {
    /// Converts `picture_coding_type` field value.
    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => PictureCodingType::I,
            2 => PictureCodingType::P,
            3 => PictureCodingType::B,
            _ => PictureCodingType::Unknown,
        }
    }

    /// Returns a single character label (`I`, `P`, `B` or `?`).
    pub fn as_char(self) -> char {
        match self {
            PictureCodingType::I => 'I',
            PictureCodingType::P => 'P',
            PictureCodingType::B => 'B',
            PictureCodingType::Unknown => '?',
        }
    }
}
impl Default for PictureCodingType {
    fn default() -> Self {
        PictureCodingType::Unknown
    }
}

/// Picture structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureStructure {
    /// Top field.
    TopField,

    /// Bottom field.
    BottomField,

    /// Frame picture.
    Frame,
}
impl PictureStructure {
    /// Converts `picture_structure` field value.
    ///
    /// The reserved value `0` is treated as a frame picture.
    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => PictureStructure::TopField,
            2 => PictureStructure::BottomField,
            _ => PictureStructure::Frame,
        }
    }

    /// Returns `true` if it is a field picture.
    pub fn is_field(self) -> bool {
        self != PictureStructure::Frame
    }
}
impl Default for PictureStructure {
    fn default() -> Self {
        PictureStructure::Frame
    }
}

/// Appends bytes from `reader` until `buf` holds `len` bytes.
fn fill_to<R: Read>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> Result<()> {
    if buf.len() < len {
        let start = buf.len();
        buf.resize(len, 0);
        track_io!(reader.read_exact(&mut buf[start..]))?;
    }
    Ok(())
}

fn check_size(buf: &[u8], size: usize) -> Result<()> {
    track_assert!(
        buf.len() >= size,
        ErrorKind::Truncated,
        "Too short header: actual={}, required={}",
        buf.len(),
        size
    );
    Ok(())
}

/// Consumes a marker bit.
///
/// Streams in the wild frequently violate marker bits, so an unset marker is only logged.
fn skip_marker<R: BitRead>(r: &mut R) -> Result<()> {
    if !track_io!(r.read_bit())? {
        log::trace!("Marker bit is not set");
    }
    Ok(())
}

/// Reads a 64 entry quantiser matrix (8 bits per entry, zigzag order).
fn read_matrix<R: BitRead>(r: &mut R) -> Result<[u8; 64]> {
    let mut matrix = [0; 64];
    track_io!(r.read_bytes(&mut matrix))?;
    Ok(matrix)
}

fn flag_at(buf: &[u8], bit: usize) -> bool {
    (buf[bit / 8] >> (7 - bit % 8)) & 1 == 1
}

/// Sequence header.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    pub horizontal_size_value: u16,
    pub vertical_size_value: u16,
    pub aspect_ratio_information: u8,
    pub frame_rate_code: u8,
    pub bit_rate_value: u32,
    pub vbv_buffer_size_value: u16,
    pub constrained_parameters_flag: bool,
    pub intra_quantiser_matrix: Option<[u8; 64]>,
    pub non_intra_quantiser_matrix: Option<[u8; 64]>,
}
impl SequenceHeader {
    /// Size without the quantiser matrices.
    pub const MIN_SIZE: usize = 8;

    /// Returns the size of the header, or `None` if `buf` is too short to tell.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        if buf.len() < Self::MIN_SIZE {
            return None;
        }
        if flag_at(buf, 62) {
            if buf.len() < Self::MIN_SIZE + 64 {
                return None;
            }
            Some(if flag_at(buf, 575) { 136 } else { 72 })
        } else {
            Some(if flag_at(buf, 63) { 72 } else { 8 })
        }
    }

    /// Decodes a sequence header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(
            Self::required_size(buf),
            ErrorKind::Truncated,
            "Too short sequence header: {} bytes",
            buf.len()
        );
        track!(check_size(buf, size))?;

        let mut r = BitReader::endian(buf, BigEndian);
        let horizontal_size_value = track_io!(r.read::<12, u16>())?;
        let vertical_size_value = track_io!(r.read::<12, u16>())?;
        let aspect_ratio_information = track_io!(r.read::<4, u8>())?;
        let frame_rate_code = track_io!(r.read::<4, u8>())?;
        let bit_rate_value = track_io!(r.read::<18, u32>())?;
        track!(skip_marker(&mut r))?;
        let vbv_buffer_size_value = track_io!(r.read::<10, u16>())?;
        let constrained_parameters_flag = track_io!(r.read_bit())?;
        let intra_quantiser_matrix = if track_io!(r.read_bit())? {
            Some(track!(read_matrix(&mut r))?)
        } else {
            None
        };
        let non_intra_quantiser_matrix = if track_io!(r.read_bit())? {
            Some(track!(read_matrix(&mut r))?)
        } else {
            None
        };
        Ok(SequenceHeader {
            horizontal_size_value,
            vertical_size_value,
            aspect_ratio_information,
            frame_rate_code,
            bit_rate_value,
            vbv_buffer_size_value,
            constrained_parameters_flag,
            intra_quantiser_matrix,
            non_intra_quantiser_matrix,
        })
    }

    /// Returns the nominal frame rate as a `(numerator, denominator)` pair.
    ///
    /// Returns `None` for forbidden and reserved `frame_rate_code` values.
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        Some(match self.frame_rate_code {
            1 => (24000, 1001),
            2 => (24, 1),
            3 => (25, 1),
            4 => (30000, 1001),
            5 => (30, 1),
            6 => (50, 1),
            7 => (60000, 1001),
            8 => (60, 1),
            _ => return None,
        })
    }
}

/// Sequence extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceExtension {
    pub profile_and_level_indication: u8,
    pub progressive_sequence: bool,
    pub chroma_format: u8,
    pub horizontal_size_extension: u8,
    pub vertical_size_extension: u8,
    pub bit_rate_extension: u16,
    pub vbv_buffer_size_extension: u8,
    pub low_delay: bool,
    pub frame_rate_extension_n: u8,
    pub frame_rate_extension_d: u8,
}
impl SequenceExtension {
    /// Size of the extension (including the identifier nibble).
    pub const SIZE: usize = 6;

    /// Decodes a sequence extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track!(check_size(buf, Self::SIZE))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let profile_and_level_indication = track_io!(r.read::<8, u8>())?;
        let progressive_sequence = track_io!(r.read_bit())?;
        let chroma_format = track_io!(r.read::<2, u8>())?;
        let horizontal_size_extension = track_io!(r.read::<2, u8>())?;
        let vertical_size_extension = track_io!(r.read::<2, u8>())?;
        let bit_rate_extension = track_io!(r.read::<12, u16>())?;
        track!(skip_marker(&mut r))?;
        let vbv_buffer_size_extension = track_io!(r.read::<8, u8>())?;
        let low_delay = track_io!(r.read_bit())?;
        let frame_rate_extension_n = track_io!(r.read::<2, u8>())?;
        let frame_rate_extension_d = track_io!(r.read::<5, u8>())?;
        Ok(SequenceExtension {
            profile_and_level_indication,
            progressive_sequence,
            chroma_format,
            horizontal_size_extension,
            vertical_size_extension,
            bit_rate_extension,
            vbv_buffer_size_extension,
            low_delay,
            frame_rate_extension_n,
            frame_rate_extension_d,
        })
    }
}

/// Colour description of a sequence display extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourDescription {
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
}

/// Sequence display extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDisplayExtension {
    pub video_format: u8,
    pub colour_description: Option<ColourDescription>,
    pub display_horizontal_size: u16,
    pub display_vertical_size: u16,
}
impl SequenceDisplayExtension {
    /// Returns the size of the extension, or `None` if `buf` is empty.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        buf.first().map(|b| if b & 1 == 1 { 8 } else { 5 })
    }

    /// Decodes a sequence display extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(Self::required_size(buf), ErrorKind::Truncated);
        track!(check_size(buf, size))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let video_format = track_io!(r.read::<3, u8>())?;
        let colour_description = if track_io!(r.read_bit())? {
            Some(ColourDescription {
                colour_primaries: track_io!(r.read::<8, u8>())?,
                transfer_characteristics: track_io!(r.read::<8, u8>())?,
                matrix_coefficients: track_io!(r.read::<8, u8>())?,
            })
        } else {
            None
        };
        let display_horizontal_size = track_io!(r.read::<14, u16>())?;
        track!(skip_marker(&mut r))?;
        let display_vertical_size = track_io!(r.read::<14, u16>())?;
        Ok(SequenceDisplayExtension {
            video_format,
            colour_description,
            display_horizontal_size,
            display_vertical_size,
        })
    }
}

/// Spatial scalability parameters of a sequence scalable extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialScalability {
    pub lower_layer_prediction_horizontal_size: u16,
    pub lower_layer_prediction_vertical_size: u16,
    pub horizontal_subsampling_factor_m: u8,
    pub horizontal_subsampling_factor_n: u8,
    pub vertical_subsampling_factor_m: u8,
    pub vertical_subsampling_factor_n: u8,
}

/// Temporal scalability parameters of a sequence scalable extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalScalability {
    pub picture_mux_enable: bool,
    pub mux_to_progressive_sequence: bool,
    pub picture_mux_order: u8,
    pub picture_mux_factor: u8,
}

/// Sequence scalable extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceScalableExtension {
    pub scalable_mode: u8,
    pub layer_id: u8,
    pub spatial: Option<SpatialScalability>,
    pub temporal: Option<TemporalScalability>,
}
impl SequenceScalableExtension {
    /// `scalable_mode` of spatial scalability.
    pub const SPATIAL: u8 = 0b01;

    /// `scalable_mode` of temporal scalability.
    pub const TEMPORAL: u8 = 0b11;

    /// Returns the size of the extension, or `None` if `buf` is too short to tell.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        let mode = (buf.first()? >> 2) & 0b11;
        match mode {
            Self::SPATIAL => Some(8),
            Self::TEMPORAL => {
                if buf.len() < 2 {
                    None
                } else {
                    Some(3)
                }
            }
            _ => Some(2),
        }
    }

    /// Decodes a sequence scalable extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(Self::required_size(buf), ErrorKind::Truncated);
        track!(check_size(buf, size))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let scalable_mode = track_io!(r.read::<2, u8>())?;
        let layer_id = track_io!(r.read::<4, u8>())?;

        let mut spatial = None;
        let mut temporal = None;
        if scalable_mode == Self::SPATIAL {
            let lower_layer_prediction_horizontal_size = track_io!(r.read::<14, u16>())?;
            track!(skip_marker(&mut r))?;
            spatial = Some(SpatialScalability {
                lower_layer_prediction_horizontal_size,
                lower_layer_prediction_vertical_size: track_io!(r.read::<14, u16>())?,
                horizontal_subsampling_factor_m: track_io!(r.read::<5, u8>())?,
                horizontal_subsampling_factor_n: track_io!(r.read::<5, u8>())?,
                vertical_subsampling_factor_m: track_io!(r.read::<5, u8>())?,
                vertical_subsampling_factor_n: track_io!(r.read::<5, u8>())?,
            });
        } else if scalable_mode == Self::TEMPORAL {
            let picture_mux_enable = track_io!(r.read_bit())?;
            let mux_to_progressive_sequence = if picture_mux_enable {
                track_io!(r.read_bit())?
            } else {
                false
            };
            temporal = Some(TemporalScalability {
                picture_mux_enable,
                mux_to_progressive_sequence,
                picture_mux_order: track_io!(r.read::<3, u8>())?,
                picture_mux_factor: track_io!(r.read::<3, u8>())?,
            });
        }
        Ok(SequenceScalableExtension {
            scalable_mode,
            layer_id,
            spatial,
            temporal,
        })
    }
}

/// Group of pictures header.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GopHeader {
    pub drop_frame_flag: bool,
    pub time_code_hours: u8,
    pub time_code_minutes: u8,
    pub time_code_seconds: u8,
    pub time_code_pictures: u8,
    pub closed_gop: bool,
    pub broken_link: bool,
}
impl GopHeader {
    /// Size of the header.
    pub const SIZE: usize = 4;

    /// Decodes a GOP header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track!(check_size(buf, Self::SIZE))?;
        let mut r = BitReader::endian(buf, BigEndian);
        let drop_frame_flag = track_io!(r.read_bit())?;
        let time_code_hours = track_io!(r.read::<5, u8>())?;
        let time_code_minutes = track_io!(r.read::<6, u8>())?;
        track!(skip_marker(&mut r))?;
        let time_code_seconds = track_io!(r.read::<6, u8>())?;
        let time_code_pictures = track_io!(r.read::<6, u8>())?;
        let closed_gop = track_io!(r.read_bit())?;
        let broken_link = track_io!(r.read_bit())?;
        Ok(GopHeader {
            drop_frame_flag,
            time_code_hours,
            time_code_minutes,
            time_code_seconds,
            time_code_pictures,
            closed_gop,
            broken_link,
        })
    }
}

/// Picture header.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureHeader {
    pub temporal_reference: u16,
    pub picture_coding_type: PictureCodingType,
    pub vbv_delay: u16,
    pub full_pel_forward_vector: bool,
    pub forward_f_code: u8,
    pub full_pel_backward_vector: bool,
    pub backward_f_code: u8,
}
impl PictureHeader {
    /// Returns the size of the header, or `None` if `buf` is too short to tell.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        let coding_type = (buf.get(1)? >> 3) & 0b111;
        Some(match coding_type {
            2 | 3 => 5,
            _ => 4,
        })
    }

    /// Decodes a picture header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(Self::required_size(buf), ErrorKind::Truncated);
        track!(check_size(buf, size))?;
        let mut r = BitReader::endian(buf, BigEndian);
        let temporal_reference = track_io!(r.read::<10, u16>())?;
        let coding_type = track_io!(r.read::<3, u8>())?;
        let vbv_delay = track_io!(r.read::<16, u16>())?;

        let mut header = PictureHeader {
            temporal_reference,
            picture_coding_type: PictureCodingType::from_u8(coding_type),
            vbv_delay,
            full_pel_forward_vector: false,
            forward_f_code: 0,
            full_pel_backward_vector: false,
            backward_f_code: 0,
        };
        if coding_type == 2 || coding_type == 3 {
            header.full_pel_forward_vector = track_io!(r.read_bit())?;
            header.forward_f_code = track_io!(r.read::<3, u8>())?;
        }
        if coding_type == 3 {
            header.full_pel_backward_vector = track_io!(r.read_bit())?;
            header.backward_f_code = track_io!(r.read::<3, u8>())?;
        }
        Ok(header)
    }
}

/// Composite display information of a picture coding extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeDisplay {
    pub v_axis: bool,
    pub field_sequence: u8,
    pub sub_carrier: bool,
    pub burst_amplitude: u8,
    pub sub_carrier_phase: u8,
}

/// Picture coding extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureCodingExtension {
    /// `f_code[s][t]`.
    pub f_code: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: PictureStructure,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub chroma_420_type: bool,
    pub progressive_frame: bool,
    pub composite_display: Option<CompositeDisplay>,
}
impl PictureCodingExtension {
    /// Returns the size of the extension, or `None` if `buf` is too short to tell.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        if buf.len() < 5 {
            return None;
        }
        Some(if flag_at(buf, 33) { 7 } else { 5 })
    }

    /// Decodes a picture coding extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(Self::required_size(buf), ErrorKind::Truncated);
        track!(check_size(buf, size))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let mut f_code = [[0; 2]; 2];
        for s in f_code.iter_mut() {
            for t in s.iter_mut() {
                *t = track_io!(r.read::<4, u8>())?;
            }
        }
        let intra_dc_precision = track_io!(r.read::<2, u8>())?;
        let picture_structure = PictureStructure::from_u8(track_io!(r.read::<2, u8>())?);
        let top_field_first = track_io!(r.read_bit())?;
        let frame_pred_frame_dct = track_io!(r.read_bit())?;
        let concealment_motion_vectors = track_io!(r.read_bit())?;
        let q_scale_type = track_io!(r.read_bit())?;
        let intra_vlc_format = track_io!(r.read_bit())?;
        let alternate_scan = track_io!(r.read_bit())?;
        let repeat_first_field = track_io!(r.read_bit())?;
        let chroma_420_type = track_io!(r.read_bit())?;
        let progressive_frame = track_io!(r.read_bit())?;
        let composite_display = if track_io!(r.read_bit())? {
            Some(CompositeDisplay {
                v_axis: track_io!(r.read_bit())?,
                field_sequence: track_io!(r.read::<3, u8>())?,
                sub_carrier: track_io!(r.read_bit())?,
                burst_amplitude: track_io!(r.read::<7, u8>())?,
                sub_carrier_phase: track_io!(r.read::<8, u8>())?,
            })
        } else {
            None
        };
        Ok(PictureCodingExtension {
            f_code,
            intra_dc_precision,
            picture_structure,
            top_field_first,
            frame_pred_frame_dct,
            concealment_motion_vectors,
            q_scale_type,
            intra_vlc_format,
            alternate_scan,
            repeat_first_field,
            chroma_420_type,
            progressive_frame,
            composite_display,
        })
    }
}

/// Quant matrix extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantMatrixExtension {
    pub intra_quantiser_matrix: Option<[u8; 64]>,
    pub non_intra_quantiser_matrix: Option<[u8; 64]>,
    pub chroma_intra_quantiser_matrix: Option<[u8; 64]>,
    pub chroma_non_intra_quantiser_matrix: Option<[u8; 64]>,
}
impl QuantMatrixExtension {
    /// Returns the size of the extension, or `None` if `buf` is too short to tell.
    pub fn required_size(buf: &[u8]) -> Option<usize> {
        Self::size_or_needed(buf).ok()
    }

    /// Returns `Ok(size)`, or `Err(n)` where `n` is the buffer length needed to go further.
    fn size_or_needed(buf: &[u8]) -> std::result::Result<usize, usize> {
        let mut bit = 4;
        for _ in 0..4 {
            if buf.len() <= bit / 8 {
                return Err(bit / 8 + 1);
            }
            let load = flag_at(buf, bit);
            bit += 1;
            if load {
                bit += 512;
            }
        }
        Ok((bit + 7) / 8)
    }

    /// Decodes a quant matrix extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let size = track_assert_some!(Self::required_size(buf), ErrorKind::Truncated);
        track!(check_size(buf, size))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let mut matrices = [None; 4];
        for m in matrices.iter_mut() {
            if track_io!(r.read_bit())? {
                *m = Some(track!(read_matrix(&mut r))?);
            }
        }
        Ok(QuantMatrixExtension {
            intra_quantiser_matrix: matrices[0],
            non_intra_quantiser_matrix: matrices[1],
            chroma_intra_quantiser_matrix: matrices[2],
            chroma_non_intra_quantiser_matrix: matrices[3],
        })
    }
}

/// Picture display extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureDisplayExtension {
    /// `(frame_centre_horizontal_offset, frame_centre_vertical_offset)` pairs in 1/16 pixel units.
    pub frame_centre_offsets: Vec<(i16, i16)>,
}
impl PictureDisplayExtension {
    /// Returns the number of frame centre offsets carried by the extension.
    ///
    /// It depends on the sequence and picture coding state that precedes the extension.
    pub fn number_of_frame_centre_offsets(
        progressive_sequence: bool,
        picture_structure: PictureStructure,
        top_field_first: bool,
        repeat_first_field: bool,
    ) -> usize {
        if progressive_sequence {
            if repeat_first_field {
                if top_field_first {
                    3
                } else {
                    2
                }
            } else {
                1
            }
        } else if picture_structure.is_field() {
            1
        } else if repeat_first_field {
            3
        } else {
            2
        }
    }

    /// Returns the size of an extension holding `offsets` frame centre offsets.
    pub fn size(offsets: usize) -> usize {
        (4 + 34 * offsets + 7) / 8
    }

    /// Decodes a picture display extension holding `offsets` frame centre offsets.
    pub fn decode(buf: &[u8], offsets: usize) -> Result<Self> {
        track!(check_size(buf, Self::size(offsets)))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let mut frame_centre_offsets = Vec::with_capacity(offsets);
        for _ in 0..offsets {
            let horizontal = track_io!(r.read_signed::<16, i16>())?;
            track!(skip_marker(&mut r))?;
            let vertical = track_io!(r.read_signed::<16, i16>())?;
            track!(skip_marker(&mut r))?;
            frame_centre_offsets.push((horizontal, vertical));
        }
        Ok(PictureDisplayExtension {
            frame_centre_offsets,
        })
    }
}

/// Picture temporal scalable extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureTemporalScalableExtension {
    pub reference_select_code: u8,
    pub forward_temporal_reference: u16,
    pub backward_temporal_reference: u16,
}
impl PictureTemporalScalableExtension {
    /// Size of the extension.
    pub const SIZE: usize = 4;

    /// Decodes a picture temporal scalable extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track!(check_size(buf, Self::SIZE))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let reference_select_code = track_io!(r.read::<2, u8>())?;
        let forward_temporal_reference = track_io!(r.read::<10, u16>())?;
        track!(skip_marker(&mut r))?;
        let backward_temporal_reference = track_io!(r.read::<10, u16>())?;
        Ok(PictureTemporalScalableExtension {
            reference_select_code,
            forward_temporal_reference,
            backward_temporal_reference,
        })
    }
}

/// Picture spatial scalable extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureSpatialScalableExtension {
    pub lower_layer_temporal_reference: u16,
    pub lower_layer_horizontal_offset: i16,
    pub lower_layer_vertical_offset: i16,
    pub spatial_temporal_weight_code_table_index: u8,
    pub lower_layer_progressive_frame: bool,
    pub lower_layer_deinterlaced_field_select: bool,
}
impl PictureSpatialScalableExtension {
    /// Size of the extension.
    pub const SIZE: usize = 7;

    /// Decodes a picture spatial scalable extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track!(check_size(buf, Self::SIZE))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let lower_layer_temporal_reference = track_io!(r.read::<10, u16>())?;
        track!(skip_marker(&mut r))?;
        let lower_layer_horizontal_offset = track_io!(r.read_signed::<15, i16>())?;
        track!(skip_marker(&mut r))?;
        let lower_layer_vertical_offset = track_io!(r.read_signed::<15, i16>())?;
        Ok(PictureSpatialScalableExtension {
            lower_layer_temporal_reference,
            lower_layer_horizontal_offset,
            lower_layer_vertical_offset,
            spatial_temporal_weight_code_table_index: track_io!(r.read::<2, u8>())?,
            lower_layer_progressive_frame: track_io!(r.read_bit())?,
            lower_layer_deinterlaced_field_select: track_io!(r.read_bit())?,
        })
    }
}

/// Copyright extension.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyrightExtension {
    pub copyright_flag: bool,
    pub copyright_identifier: u8,
    pub original_or_copy: bool,
    /// `copyright_number_1`, `_2` and `_3` concatenated (20 + 22 + 22 bits).
    pub copyright_number: u64,
}
impl CopyrightExtension {
    /// Size of the extension.
    pub const SIZE: usize = 11;

    /// Decodes a copyright extension.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        track!(check_size(buf, Self::SIZE))?;
        let mut r = BitReader::endian(buf, BigEndian);
        track_io!(r.skip(4))?;
        let copyright_flag = track_io!(r.read_bit())?;
        let copyright_identifier = track_io!(r.read::<8, u8>())?;
        let original_or_copy = track_io!(r.read_bit())?;
        track_io!(r.skip(7))?;
        track!(skip_marker(&mut r))?;
        let n1 = track_io!(r.read::<20, u64>())?;
        track!(skip_marker(&mut r))?;
        let n2 = track_io!(r.read::<22, u64>())?;
        track!(skip_marker(&mut r))?;
        let n3 = track_io!(r.read::<22, u64>())?;
        Ok(CopyrightExtension {
            copyright_flag,
            copyright_identifier,
            original_or_copy,
            copyright_number: (n1 << 44) | (n2 << 22) | n3,
        })
    }
}

/// Extension data.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    Sequence(SequenceExtension),
    SequenceDisplay(SequenceDisplayExtension),
    SequenceScalable(SequenceScalableExtension),
    PictureCoding(PictureCodingExtension),
    QuantMatrix(QuantMatrixExtension),
    PictureDisplay(PictureDisplayExtension),
    PictureTemporalScalable(PictureTemporalScalableExtension),
    PictureSpatialScalable(PictureSpatialScalableExtension),
    Copyright(CopyrightExtension),

    /// Reserved identifier (ignored).
    Unknown(u8),
}

/// A decoded video header.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoHeader {
    Sequence(SequenceHeader),
    Gop(GopHeader),
    Picture(PictureHeader),
    Extension(Extension),

    /// Start codes without a decoded header body (user data, slices and sequence end).
    Other(VideoStartCode),
}

/// Stateful video header decoder.
///
/// Keeps the most recent sequence and picture level headers, which are required to size
/// the picture display extension and to report picture flags.
#[derive(Debug, Default, Clone)]
pub struct VideoHeaderDecoder {
    sequence_header: Option<SequenceHeader>,
    sequence_extension: Option<SequenceExtension>,
    gop_header: Option<GopHeader>,
    picture_header: Option<PictureHeader>,
    picture_coding_extension: Option<PictureCodingExtension>,
    buf: Vec<u8>,
}
impl VideoHeaderDecoder {
    /// Makes a new `VideoHeaderDecoder` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every header decoded so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the last sequence header.
    pub fn sequence_header(&self) -> Option<&SequenceHeader> {
        self.sequence_header.as_ref()
    }

    /// Returns the last sequence extension.
    pub fn sequence_extension(&self) -> Option<&SequenceExtension> {
        self.sequence_extension.as_ref()
    }

    /// Returns the last GOP header.
    pub fn gop_header(&self) -> Option<&GopHeader> {
        self.gop_header.as_ref()
    }

    /// Returns the current picture header.
    pub fn picture_header(&self) -> Option<&PictureHeader> {
        self.picture_header.as_ref()
    }

    /// Returns the picture coding extension of the current picture.
    pub fn picture_coding_extension(&self) -> Option<&PictureCodingExtension> {
        self.picture_coding_extension.as_ref()
    }

    /// Returns `progressive_sequence` (`true` for MPEG-1 streams).
    pub fn progressive_sequence(&self) -> bool {
        self.sequence_extension
            .map_or(true, |e| e.progressive_sequence)
    }

    /// Returns the frame rate including `frame_rate_extension_n/d`.
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        let (num, den) = self.sequence_header.as_ref()?.frame_rate()?;
        Some(match self.sequence_extension {
            Some(e) => (
                num * (u32::from(e.frame_rate_extension_n) + 1),
                den * (u32::from(e.frame_rate_extension_d) + 1),
            ),
            None => (num, den),
        })
    }

    /// Reads and decodes the header that follows a start code of the given kind.
    ///
    /// `reader` must be positioned just after the 4 byte start code.
    /// Exactly the bytes of the header are consumed.
    ///
    /// # Errors
    ///
    /// If `reader` ends before the header is complete, it will return an `ErrorKind::Truncated` error.
    pub fn read_header<R: Read>(
        &mut self,
        code: VideoStartCode,
        reader: &mut R,
    ) -> Result<VideoHeader> {
        let mut buf = std::mem::replace(&mut self.buf, Vec::new());
        buf.clear();
        let result = self.read_header_into(code, reader, &mut buf);
        self.buf = buf;
        result
    }

    fn read_header_into<R: Read>(
        &mut self,
        code: VideoStartCode,
        reader: &mut R,
        buf: &mut Vec<u8>,
    ) -> Result<VideoHeader> {
        match code {
            VideoStartCode::SequenceHeader => {
                track!(fill_to(reader, buf, SequenceHeader::MIN_SIZE))?;
                if let Some(size) = SequenceHeader::required_size(buf) {
                    track!(fill_to(reader, buf, size))?;
                } else {
                    track!(fill_to(reader, buf, SequenceHeader::MIN_SIZE + 64))?;
                    let size = track_assert_some!(
                        SequenceHeader::required_size(buf),
                        ErrorKind::Truncated
                    );
                    track!(fill_to(reader, buf, size))?;
                }
                let header = track!(SequenceHeader::decode(buf))?;
                self.sequence_header = Some(header.clone());
                Ok(VideoHeader::Sequence(header))
            }
            VideoStartCode::Gop => {
                track!(fill_to(reader, buf, GopHeader::SIZE))?;
                let header = track!(GopHeader::decode(buf))?;
                self.gop_header = Some(header);
                Ok(VideoHeader::Gop(header))
            }
            VideoStartCode::Picture => {
                track!(fill_to(reader, buf, 2))?;
                let size = track_assert_some!(
                    PictureHeader::required_size(buf),
                    ErrorKind::Truncated
                );
                track!(fill_to(reader, buf, size))?;
                let header = track!(PictureHeader::decode(buf))?;
                self.picture_header = Some(header);
                self.picture_coding_extension = None;
                Ok(VideoHeader::Picture(header))
            }
            VideoStartCode::Extension => {
                let extension = track!(self.read_extension(reader, buf))?;
                Ok(VideoHeader::Extension(extension))
            }
            VideoStartCode::UserData | VideoStartCode::SequenceEnd | VideoStartCode::Slice => {
                Ok(VideoHeader::Other(code))
            }
        }
    }

    fn read_extension<R: Read>(&mut self, reader: &mut R, buf: &mut Vec<u8>) -> Result<Extension> {
        track!(fill_to(reader, buf, 1))?;
        let id = buf[0] >> 4;
        let id = match ExtensionId::from_u8(id) {
            None => {
                log::trace!("Ignored reserved extension identifier: {}", id);
                return Ok(Extension::Unknown(id));
            }
            Some(id) => id,
        };

        let extension = match id {
            ExtensionId::Sequence => {
                track!(fill_to(reader, buf, SequenceExtension::SIZE))?;
                let e = track!(SequenceExtension::decode(buf))?;
                self.sequence_extension = Some(e);
                Extension::Sequence(e)
            }
            ExtensionId::SequenceDisplay => {
                let size = track_assert_some!(
                    SequenceDisplayExtension::required_size(buf),
                    ErrorKind::Truncated
                );
                track!(fill_to(reader, buf, size))?;
                Extension::SequenceDisplay(track!(SequenceDisplayExtension::decode(buf))?)
            }
            ExtensionId::SequenceScalable => {
                track!(fill_to(reader, buf, 2))?;
                let size = track_assert_some!(
                    SequenceScalableExtension::required_size(buf),
                    ErrorKind::Truncated
                );
                track!(fill_to(reader, buf, size))?;
                Extension::SequenceScalable(track!(SequenceScalableExtension::decode(buf))?)
            }
            ExtensionId::PictureCoding => {
                track!(fill_to(reader, buf, 5))?;
                let size = track_assert_some!(
                    PictureCodingExtension::required_size(buf),
                    ErrorKind::Truncated
                );
                track!(fill_to(reader, buf, size))?;
                let e = track!(PictureCodingExtension::decode(buf))?;
                self.picture_coding_extension = Some(e);
                Extension::PictureCoding(e)
            }
            ExtensionId::QuantMatrix => {
                let size = loop {
                    match QuantMatrixExtension::size_or_needed(buf) {
                        Ok(size) => break size,
                        Err(len) => track!(fill_to(reader, buf, len))?,
                    }
                };
                track!(fill_to(reader, buf, size))?;
                Extension::QuantMatrix(track!(QuantMatrixExtension::decode(buf))?)
            }
            ExtensionId::PictureDisplay => {
                let pce = self.picture_coding_extension.unwrap_or(PictureCodingExtension {
                    f_code: [[0; 2]; 2],
                    intra_dc_precision: 0,
                    picture_structure: PictureStructure::Frame,
                    top_field_first: false,
                    frame_pred_frame_dct: true,
                    concealment_motion_vectors: false,
                    q_scale_type: false,
                    intra_vlc_format: false,
                    alternate_scan: false,
                    repeat_first_field: false,
                    chroma_420_type: false,
                    progressive_frame: true,
                    composite_display: None,
                });
                let offsets = PictureDisplayExtension::number_of_frame_centre_offsets(
                    self.progressive_sequence(),
                    pce.picture_structure,
                    pce.top_field_first,
                    pce.repeat_first_field,
                );
                track!(fill_to(reader, buf, PictureDisplayExtension::size(offsets)))?;
                Extension::PictureDisplay(track!(PictureDisplayExtension::decode(buf, offsets))?)
            }
            ExtensionId::PictureTemporalScalable => {
                track!(fill_to(reader, buf, PictureTemporalScalableExtension::SIZE))?;
                Extension::PictureTemporalScalable(track!(
                    PictureTemporalScalableExtension::decode(buf)
                )?)
            }
            ExtensionId::PictureSpatialScalable => {
                track!(fill_to(reader, buf, PictureSpatialScalableExtension::SIZE))?;
                Extension::PictureSpatialScalable(track!(
                    PictureSpatialScalableExtension::decode(buf)
                )?)
            }
            ExtensionId::Copyright => {
                track!(fill_to(reader, buf, CopyrightExtension::SIZE))?;
                Extension::Copyright(track!(CopyrightExtension::decode(buf))?)
            }
        };
        log::trace!("Extension: {:?}", extension);
        Ok(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 720x480, 4:3, 29.97 fps, bit_rate_value=0x3A98, vbv=112, no matrices
    const SEQUENCE_HEADER: [u8; 8] = [0x2D, 0x01, 0xE0, 0x24, 0x0E, 0xA6, 0x23, 0x80];

    #[test]
    fn decode_sequence_header_works() {
        let header = SequenceHeader::decode(&SEQUENCE_HEADER).unwrap();
        assert_eq!(header.horizontal_size_value, 720);
        assert_eq!(header.vertical_size_value, 480);
        assert_eq!(header.aspect_ratio_information, 2);
        assert_eq!(header.frame_rate_code, 4);
        assert_eq!(header.frame_rate(), Some((30000, 1001)));
        assert_eq!(header.bit_rate_value, 0x3A98);
        assert_eq!(header.vbv_buffer_size_value, 112);
        assert!(!header.constrained_parameters_flag);
        assert_eq!(header.intra_quantiser_matrix, None);
        assert_eq!(header.non_intra_quantiser_matrix, None);
    }

    #[test]
    fn sequence_header_with_intra_matrix() {
        let mut buf = SEQUENCE_HEADER.to_vec();
        buf[7] |= 0b10; // load_intra_quantiser_matrix
        assert_eq!(SequenceHeader::required_size(&buf), None);

        // the matrix occupies bits 63..575; every entry is 16 -> bit pattern 0001_0000
        let mut bits = vec![];
        for _ in 0..64 {
            bits.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
        }
        bits.push(0); // load_non_intra_quantiser_matrix
        buf[7] &= 0xFE;
        buf[7] |= bits[0];
        let mut rest = vec![0u8; 64];
        for (i, b) in bits[1..].iter().enumerate() {
            rest[i / 8] |= b << (7 - i % 8);
        }
        buf.extend_from_slice(&rest);
        assert_eq!(SequenceHeader::required_size(&buf), Some(72));

        let header = SequenceHeader::decode(&buf).unwrap();
        assert_eq!(header.intra_quantiser_matrix, Some([16; 64]));
        assert_eq!(header.non_intra_quantiser_matrix, None);
    }

    #[test]
    fn decode_gop_header_works() {
        // drop_frame=0, 01:02:03, pictures=4, closed_gop=1, broken_link=0
        let buf = [0x04, 0x28, 0x62, 0x40];
        let header = GopHeader::decode(&buf).unwrap();
        assert!(!header.drop_frame_flag);
        assert_eq!(header.time_code_hours, 1);
        assert_eq!(header.time_code_minutes, 2);
        assert_eq!(header.time_code_seconds, 3);
        assert_eq!(header.time_code_pictures, 4);
        assert!(header.closed_gop);
        assert!(!header.broken_link);
    }

    #[test]
    fn decode_picture_header_works() {
        // temporal_reference=2, B-picture, vbv_delay=0xFFFF, f_codes
        let buf = [0x00, 0x9F, 0xFF, 0xFF, 0xF8];
        assert_eq!(PictureHeader::required_size(&buf), Some(5));
        let header = PictureHeader::decode(&buf).unwrap();
        assert_eq!(header.temporal_reference, 2);
        assert_eq!(header.picture_coding_type, PictureCodingType::B);
        assert_eq!(header.vbv_delay, 0xFFFF);

        // I-picture only needs 4 bytes
        let buf = [0x00, 0x0F, 0xFF, 0xF8];
        assert_eq!(PictureHeader::required_size(&buf), Some(4));
        let header = PictureHeader::decode(&buf).unwrap();
        assert_eq!(header.picture_coding_type, PictureCodingType::I);
        assert_eq!(header.temporal_reference, 0);
    }

    #[test]
    fn decode_picture_coding_extension_works() {
        // id=8, f_code=ffff, intra_dc=0, structure=frame, tff=1, fpfd=0, ..., rff=0, 420=1, pf=0
        let buf = [0x8F, 0xFF, 0xF3, 0x81, 0x00];
        let e = PictureCodingExtension::decode(&buf).unwrap();
        assert_eq!(e.f_code, [[15, 15], [15, 15]]);
        assert_eq!(e.picture_structure, PictureStructure::Frame);
        assert!(e.top_field_first);
        assert!(!e.frame_pred_frame_dct);
        assert!(!e.repeat_first_field);
        assert!(e.chroma_420_type);
        assert!(!e.progressive_frame);
        assert_eq!(e.composite_display, None);
    }

    #[test]
    fn picture_display_offsets_depend_on_state() {
        use self::PictureStructure::*;
        let n = PictureDisplayExtension::number_of_frame_centre_offsets;
        assert_eq!(n(true, Frame, false, false), 1);
        assert_eq!(n(true, Frame, false, true), 2);
        assert_eq!(n(true, Frame, true, true), 3);
        assert_eq!(n(false, TopField, true, true), 1);
        assert_eq!(n(false, Frame, true, false), 2);
        assert_eq!(n(false, Frame, true, true), 3);
        assert_eq!(PictureDisplayExtension::size(1), 5);
        assert_eq!(PictureDisplayExtension::size(2), 9);
        assert_eq!(PictureDisplayExtension::size(3), 14);
    }

    #[test]
    fn read_header_consumes_exactly_the_header() {
        let mut decoder = VideoHeaderDecoder::new();
        let mut bytes = SEQUENCE_HEADER.to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x01, 0xB5]);
        let mut reader = &bytes[..];
        let header = decoder
            .read_header(VideoStartCode::SequenceHeader, &mut reader)
            .unwrap();
        match header {
            VideoHeader::Sequence(h) => assert_eq!(h.horizontal_size_value, 720),
            _ => panic!(),
        }
        assert_eq!(reader, &[0x00, 0x00, 0x01, 0xB5][..]);
        assert_eq!(decoder.frame_rate(), Some((30000, 1001)));
        assert!(decoder.progressive_sequence());
    }

    #[test]
    fn sequence_extension_updates_frame_rate_and_progressive_flag() {
        let mut decoder = VideoHeaderDecoder::new();
        let mut reader = &SEQUENCE_HEADER[..];
        decoder
            .read_header(VideoStartCode::SequenceHeader, &mut reader)
            .unwrap();

        // id=1, profile_level=0x48, progressive=0, chroma=01, ... n=1, d=0
        let ext = [0x14, 0x82, 0x00, 0x01, 0x00, 0x20];
        let mut reader = &ext[..];
        let header = decoder
            .read_header(VideoStartCode::Extension, &mut reader)
            .unwrap();
        match header {
            VideoHeader::Extension(Extension::Sequence(e)) => {
                assert_eq!(e.profile_and_level_indication, 0x48);
                assert!(!e.progressive_sequence);
                assert_eq!(e.chroma_format, 1);
                assert_eq!(e.frame_rate_extension_n, 1);
                assert_eq!(e.frame_rate_extension_d, 0);
            }
            h => panic!("{:?}", h),
        }
        assert!(!decoder.progressive_sequence());
        assert_eq!(decoder.frame_rate(), Some((60000, 1001)));
    }

    #[test]
    fn unknown_extension_is_ignored() {
        let mut decoder = VideoHeaderDecoder::new();
        let bytes = [0x60, 0x12, 0x34];
        let mut reader = &bytes[..];
        let header = decoder
            .read_header(VideoStartCode::Extension, &mut reader)
            .unwrap();
        assert_eq!(header, VideoHeader::Extension(Extension::Unknown(6)));
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn short_header_is_truncated() {
        let mut decoder = VideoHeaderDecoder::new();
        let mut reader = &SEQUENCE_HEADER[..5];
        let e = decoder
            .read_header(VideoStartCode::SequenceHeader, &mut reader)
            .err()
            .unwrap();
        assert_eq!(*e.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn decode_copyright_extension_works() {
        let mut bits = vec![0, 1, 0, 0]; // id=4
        bits.push(1); // copyright_flag
        bits.extend_from_slice(&[0, 0, 0, 0, 0, 0, 1, 1]); // identifier=3
        bits.push(1); // original_or_copy
        bits.extend_from_slice(&[0; 7]);
        bits.push(1);
        bits.extend_from_slice(&[0; 19]);
        bits.push(1); // n1=1
        bits.push(1);
        bits.extend_from_slice(&[0; 21]);
        bits.push(1); // n2=1
        bits.push(1);
        bits.extend_from_slice(&[0; 21]);
        bits.push(1); // n3=1
        assert_eq!(bits.len(), 88);
        let mut buf = vec![0u8; 11];
        for (i, b) in bits.iter().enumerate() {
            buf[i / 8] |= b << (7 - i % 8);
        }
        let e = CopyrightExtension::decode(&buf).unwrap();
        assert!(e.copyright_flag);
        assert_eq!(e.copyright_identifier, 3);
        assert!(e.original_or_copy);
        assert_eq!(e.copyright_number, (1 << 44) | (1 << 22) | 1);
    }

    #[test]
    fn signed_offsets_are_sign_extended() {
        // horizontal=-2, vertical=3
        let e = PictureDisplayExtension::decode(&[0x7F, 0xFF, 0xE8, 0x00, 0x1C], 1).unwrap();
        assert_eq!(e.frame_centre_offsets, vec![(-2, 3)]);

        let e = PictureSpatialScalableExtension::decode(&[0xA0, 0x17, 0xFF, 0xC2, 0x00, 0x22, 0x80])
            .unwrap();
        assert_eq!(e.lower_layer_temporal_reference, 5);
        assert_eq!(e.lower_layer_horizontal_offset, -16);
        assert_eq!(e.lower_layer_vertical_offset, 8);
        assert_eq!(e.spatial_temporal_weight_code_table_index, 2);
        assert!(e.lower_layer_progressive_frame);
        assert!(!e.lower_layer_deinterlaced_field_select);
    }
}
