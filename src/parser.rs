//! Container-independent parser interface.
use log::Level;
use std::io::{Read, Seek};

use crate::es::EsParser;
use crate::options::ParserOptions;
use crate::sample::{AudioSampleInfo, SampleDataMode, SampleKind, VideoSampleInfo};
use crate::time::ClockReference;
use crate::ts::{PacketFormat, TsParser};
use crate::{ErrorKind, Result};

/// Detected container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    /// MPEG-2 transport stream with the given packet framing.
    Ts(PacketFormat),

    /// MPEG-1/2 video elementary stream.
    Es,
}

/// Parser of either container format.
///
/// The variant is chosen by probing the content (transport stream first), never by file name.
#[derive(Debug)]
pub enum MpegParser<R> {
    /// Transport stream parser.
    Ts(TsParser<R>),

    /// Elementary stream parser.
    Es(EsParser<R>),
}
impl<R: Read + Seek> MpegParser<R> {
    /// Probes `stream` and makes the matching parser.
    ///
    /// # Errors
    ///
    /// If `stream` is neither a transport stream nor a video elementary stream,
    /// it will return an `ErrorKind::FormatMismatch` error.
    pub fn new(mut stream: R, options: &ParserOptions) -> Result<Self> {
        track!(options.validate())?;
        let log = options.log_level;
        match crate::ts::detect_packet_format(&mut stream) {
            Ok(_) => return track!(TsParser::new(stream, options)).map(MpegParser::Ts),
            Err(e) => {
                if *e.kind() != ErrorKind::FormatMismatch {
                    return Err(track!(e));
                }
                mpeg_log!(log, Level::Debug, "Not a transport stream: {}", e);
            }
        }
        match EsParser::probe(&mut stream) {
            Ok(()) => track!(EsParser::new(stream, options)).map(MpegParser::Es),
            Err(e) => {
                if *e.kind() == ErrorKind::FormatMismatch {
                    mpeg_log!(log, Level::Warn, "Unrecognized input format");
                }
                Err(track!(e))
            }
        }
    }

    /// Returns the detected format.
    pub fn format(&self) -> StreamFormat {
        match self {
            MpegParser::Ts(p) => StreamFormat::Ts(p.format()),
            MpegParser::Es(_) => StreamFormat::Es,
        }
    }

    /// Resolves stream level information (PIDs, frame rate) and rewinds the cursor.
    pub fn parse(&mut self) -> Result<()> {
        match self {
            MpegParser::Ts(p) => track!(p.parse()),
            MpegParser::Es(p) => track!(p.parse()),
        }
    }

    /// Reads the next video sample.
    pub fn next_video_sample(&mut self) -> Result<Option<VideoSampleInfo>> {
        match self {
            MpegParser::Ts(p) => track!(p.next_video_sample()),
            MpegParser::Es(p) => track!(p.next_video_sample()),
        }
    }

    /// Reads the next audio sample.
    ///
    /// Elementary streams have no audio, so this always returns `Ok(None)` for them.
    pub fn next_audio_sample(&mut self) -> Result<Option<AudioSampleInfo>> {
        match self {
            MpegParser::Ts(p) => track!(p.next_audio_sample()),
            MpegParser::Es(_) => Ok(None),
        }
    }

    /// Reads the next PCR.
    ///
    /// Elementary streams have no PCR, so this always returns `Ok(None)` for them.
    pub fn pcr(&mut self) -> Result<Option<ClockReference>> {
        match self {
            MpegParser::Ts(p) => track!(p.pcr()),
            MpegParser::Es(_) => Ok(None),
        }
    }

    /// Returns the video frame rate known so far as a `(numerator, denominator)` pair.
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        match self {
            MpegParser::Ts(p) => p.frame_rate(),
            MpegParser::Es(p) => p.frame_rate(),
        }
    }

    /// Returns the current read position.
    pub fn position(&self) -> u64 {
        match self {
            MpegParser::Ts(p) => p.position(),
            MpegParser::Es(p) => p.position(),
        }
    }

    /// Moves the read position.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        match self {
            MpegParser::Ts(p) => track!(p.seek(position)),
            MpegParser::Es(p) => track!(p.seek(position)),
        }
    }

    /// Resets the counters that a forward scan accumulates (GOP and picture numbering).
    pub fn reset_scan_state(&mut self) {
        match self {
            MpegParser::Ts(p) => p.reset_scan_state(),
            MpegParser::Es(p) => p.reset_scan_state(),
        }
    }

    /// Skips to the next position where a sample of the given kind starts, and returns it.
    pub fn seek_next_sample_position(&mut self, kind: SampleKind) -> Result<Option<u64>> {
        match (self, kind) {
            (MpegParser::Ts(p), _) => track!(p.seek_next_sample_position(kind)),
            (MpegParser::Es(p), SampleKind::Video) => track!(p.seek_next_sample_position()),
            (MpegParser::Es(_), SampleKind::Audio) => Ok(None),
        }
    }

    /// Reads the bytes of a sample.
    ///
    /// For elementary streams every mode yields the sample's byte span
    /// (PES framing is synthesized by `MpegStream`, which knows the sample's timestamps).
    pub fn read_sample_data(
        &mut self,
        kind: SampleKind,
        position: u64,
        size: u64,
        mode: SampleDataMode,
    ) -> Result<Vec<u8>> {
        match self {
            MpegParser::Ts(p) => track!(p.read_sample_data(kind, position, size, mode)),
            MpegParser::Es(p) => {
                track_assert_eq!(kind, SampleKind::Video, ErrorKind::NotFound);
                track!(p.read_sample_data(position, size))
            }
        }
    }
}
