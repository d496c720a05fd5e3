//! Sample list builder and random access to the indexed samples.
use log::Level;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::es::StreamId;
use crate::parser::{MpegParser, StreamFormat};
use crate::pes::PesHeader;
use crate::sample::{AudioSample, GopRecord, SampleDataMode, SampleKind, VideoSample};
use crate::time::{ClockReference, Timestamp, WrapAroundCorrector};
use crate::{ErrorKind, ParserOptions, Result};

const INITIAL_GOP_CAPACITY: usize = 40_000;
const INITIAL_VIDEO_CAPACITY: usize = 50_000;
const INITIAL_AUDIO_CAPACITY: usize = 80_000;

/// Summary of a stream obtained by a bounded probe.
///
/// Timestamps are raw 33 bit values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Container format.
    pub format: StreamFormat,

    /// `true` if a video sample was found.
    pub has_video: bool,

    /// `true` if an audio sample was found.
    pub has_audio: bool,

    /// PTS of the first video sample.
    pub first_video_pts: Option<u64>,

    /// PTS of the first keyframe.
    pub first_keyframe_pts: Option<u64>,

    /// PTS of the first audio sample.
    pub first_audio_pts: Option<u64>,

    /// First PCR of the stream.
    pub first_pcr: Option<ClockReference>,

    /// Video frame rate as a `(numerator, denominator)` pair.
    pub frame_rate: Option<(u32, u32)>,
}
impl StreamInfo {
    /// Returns the offset of the first audio sample relative to the first keyframe, in 90 kHz ticks.
    pub fn audio_delay(&self) -> Option<i64> {
        let video = self.first_keyframe_pts.or(self.first_video_pts)?;
        let audio = self.first_audio_pts?;
        let mut delay = audio as i64 - video as i64;
        // One of the two wrapped around
        let half = (Timestamp::MAX as i64 + 1) / 2;
        if delay > half {
            delay -= Timestamp::MAX as i64 + 1;
        } else if delay < -half {
            delay += Timestamp::MAX as i64 + 1;
        }
        Some(delay)
    }
}

/// MPEG stream handle.
///
/// Owns the parser selected by probing the input, and the sample lists built from it.
///
/// # Examples
///
/// ```no_run
/// use mpeg2index::{MpegStream, ParserOptions};
///
/// # fn main() -> mpeg2index::Result<()> {
/// let mut stream = MpegStream::open("input.m2v", ParserOptions::default())?;
/// stream.create_sample_list()?;
/// println!("{} frames, keyframes: {:?}", stream.video_sample_count(), stream.keyframes());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MpegStream<R> {
    parser: MpegParser<R>,
    options: ParserOptions,
    start: u64,
    video_samples: Vec<VideoSample>,
    audio_samples: Vec<AudioSample>,
    gops: Vec<GopRecord>,
}
impl MpegStream<File> {
    /// Opens the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self> {
        let file = track_io!(File::open(path.as_ref()))
            .map_err(|e| track!(e, "path={:?}", path.as_ref()))?;
        track!(Self::new(file, options))
    }
}
impl<R: Read + Seek> MpegStream<R> {
    /// Makes a new `MpegStream` instance.
    ///
    /// The input format is detected and stream level information is resolved
    /// (PAT/PMT for transport streams, frame rate for elementary streams).
    ///
    /// # Errors
    ///
    /// If the input format is not recognized, it will return an `ErrorKind::FormatMismatch` error.
    pub fn new(stream: R, options: ParserOptions) -> Result<Self> {
        let mut parser = track!(MpegParser::new(stream, &options))?;
        track!(parser.parse())?;
        mpeg_log!(options.log_level, Level::Info, "Detected format: {:?}", parser.format());
        let start = parser.position();
        Ok(MpegStream {
            parser,
            options,
            start,
            video_samples: Vec::new(),
            audio_samples: Vec::new(),
            gops: Vec::new(),
        })
    }

    /// Returns the detected format.
    pub fn format(&self) -> StreamFormat {
        self.parser.format()
    }

    /// Returns a reference to the parser.
    pub fn parser(&self) -> &MpegParser<R> {
        &self.parser
    }

    /// Returns the options of the handle.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Builds the video and audio sample lists by scanning forward from the current position.
    ///
    /// PTS/DTS values are corrected for 33 bit wraparound per stream.
    /// The read position is restored afterwards, so the lists can be built again.
    ///
    /// # Errors
    ///
    /// If no sample is found, it will return an `ErrorKind::NotFound` error.
    /// On any error the sample lists are left empty.
    pub fn create_sample_list(&mut self) -> Result<()> {
        let position = self.parser.position();
        let result = self.scan_samples(position);
        let restored = self.parser.seek(position);
        self.parser.reset_scan_state();
        if let Err(e) = result {
            self.clear_sample_lists();
            return Err(track!(e));
        }
        track!(restored)?;

        if self.video_samples.is_empty() && self.audio_samples.is_empty() {
            self.clear_sample_lists();
            track_panic!(ErrorKind::NotFound, "Neither video nor audio samples found");
        }
        mpeg_log!(
            self.options.log_level,
            Level::Info,
            "Sample lists: video={}, audio={}, gops={}",
            self.video_samples.len(),
            self.audio_samples.len(),
            self.gops.len()
        );
        Ok(())
    }

    fn scan_samples(&mut self, position: u64) -> Result<()> {
        self.video_samples = Vec::with_capacity(INITIAL_VIDEO_CAPACITY);
        self.audio_samples = Vec::with_capacity(INITIAL_AUDIO_CAPACITY);
        self.gops = Vec::with_capacity(INITIAL_GOP_CAPACITY);

        track!(self.parser.seek(position))?;
        self.parser.reset_scan_state();
        let mut pts = WrapAroundCorrector::new();
        let mut dts = WrapAroundCorrector::new();
        while let Some(info) = track!(self.parser.next_video_sample())? {
            let gop = info.gop_number as usize;
            if gop >= self.gops.len() {
                self.gops.resize(gop + 1, GopRecord::default());
                self.gops[gop] = GopRecord {
                    progressive_sequence: info.progressive_sequence,
                    closed_gop: info.closed_gop,
                };
            }
            let sample = VideoSample::new(&info, pts.correct(info.pts), dts.correct(info.dts));
            self.video_samples.push(sample);
        }
        if pts.wraps() > 0 {
            mpeg_log!(
                self.options.log_level,
                Level::Info,
                "Video PTS wrapped around {} time(s)",
                pts.wraps()
            );
        }

        track!(self.parser.seek(position))?;
        self.parser.reset_scan_state();
        let mut pts = WrapAroundCorrector::new();
        let mut dts = WrapAroundCorrector::new();
        while let Some(info) = track!(self.parser.next_audio_sample())? {
            self.audio_samples.push(AudioSample {
                file_position: info.file_position,
                sample_size: info.sample_size,
                pts: pts.correct(info.pts),
                dts: dts.correct(info.dts),
            });
        }
        Ok(())
    }

    fn clear_sample_lists(&mut self) {
        self.video_samples = Vec::new();
        self.audio_samples = Vec::new();
        self.gops = Vec::new();
    }

    /// Returns the number of video samples.
    pub fn video_sample_count(&self) -> usize {
        self.video_samples.len()
    }

    /// Returns the number of audio samples.
    pub fn audio_sample_count(&self) -> usize {
        self.audio_samples.len()
    }

    /// Returns the number of GOPs.
    pub fn gop_count(&self) -> usize {
        self.gops.len()
    }

    /// Returns the video sample at `index`.
    pub fn video_sample(&self, index: usize) -> Option<&VideoSample> {
        self.video_samples.get(index)
    }

    /// Returns the audio sample at `index`.
    pub fn audio_sample(&self, index: usize) -> Option<&AudioSample> {
        self.audio_samples.get(index)
    }

    /// Returns the GOP record at `index`.
    pub fn gop(&self, index: usize) -> Option<&GopRecord> {
        self.gops.get(index)
    }

    /// Returns the video sample list.
    pub fn video_samples(&self) -> &[VideoSample] {
        &self.video_samples
    }

    /// Returns the audio sample list.
    pub fn audio_samples(&self) -> &[AudioSample] {
        &self.audio_samples
    }

    /// Returns the GOP records.
    pub fn gops(&self) -> &[GopRecord] {
        &self.gops
    }

    /// Returns the indices of the video samples decoding can start at.
    pub fn keyframes(&self) -> Vec<usize> {
        self.video_samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_keyframe())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the total number of displayed fields of the video sample list.
    pub fn total_display_fields(&self) -> u64 {
        self.video_samples
            .iter()
            .map(|s| {
                let progressive_sequence = self
                    .gops
                    .get(s.gop_number as usize)
                    .map_or(false, |g| g.progressive_sequence);
                u64::from(s.display_fields(progressive_sequence))
            })
            .sum()
    }

    /// Reads the data of a sample from the input.
    ///
    /// # Errors
    ///
    /// If there is no sample at `index`, it will return an `ErrorKind::NotFound` error.
    pub fn sample_data(&mut self, kind: SampleKind, index: usize, mode: SampleDataMode) -> Result<Vec<u8>> {
        let (position, size, pts, dts) = match kind {
            SampleKind::Video => {
                let s = track_assert_some!(
                    self.video_samples.get(index),
                    ErrorKind::NotFound,
                    "No video sample: index={}",
                    index
                );
                (s.file_position, s.sample_size, s.pts, s.dts)
            }
            SampleKind::Audio => {
                let s = track_assert_some!(
                    self.audio_samples.get(index),
                    ErrorKind::NotFound,
                    "No audio sample: index={}",
                    index
                );
                (s.file_position, s.sample_size, s.pts, s.dts)
            }
        };
        let data = track!(self.parser.read_sample_data(kind, position, size, mode))?;
        if self.format() != StreamFormat::Es || mode != SampleDataMode::Pes {
            return Ok(data);
        }

        let stream_id = track!(StreamId::new_video(StreamId::VIDEO_MIN))?;
        let header = PesHeader::new(
            stream_id,
            Timestamp::wrapping(pts),
            Some(Timestamp::wrapping(dts)),
            data.len(),
        );
        let mut pes = Vec::with_capacity(header.header_len() + data.len());
        track!(header.write_to(&mut pes))?;
        pes.extend_from_slice(&data);
        Ok(pes)
    }

    /// Reads the data of the video sample at `index`.
    pub fn video_sample_data(&mut self, index: usize, mode: SampleDataMode) -> Result<Vec<u8>> {
        track!(self.sample_data(SampleKind::Video, index, mode))
    }

    /// Reads the data of the audio sample at `index`.
    pub fn audio_sample_data(&mut self, index: usize, mode: SampleDataMode) -> Result<Vec<u8>> {
        track!(self.sample_data(SampleKind::Audio, index, mode))
    }

    /// Probes the beginning of the stream without building the sample lists.
    ///
    /// At most `ParserOptions::probe_limit` video samples are examined.
    /// The read position is restored afterwards.
    pub fn stream_info(&mut self) -> Result<StreamInfo> {
        let position = self.parser.position();
        let result = self.probe();
        let restored = self.parser.seek(position);
        self.parser.reset_scan_state();
        let info = track!(result)?;
        track!(restored)?;
        Ok(info)
    }

    fn probe(&mut self) -> Result<StreamInfo> {
        let mut info = StreamInfo {
            format: self.parser.format(),
            has_video: false,
            has_audio: false,
            first_video_pts: None,
            first_keyframe_pts: None,
            first_audio_pts: None,
            first_pcr: None,
            frame_rate: None,
        };

        track!(self.parser.seek(self.start))?;
        self.parser.reset_scan_state();
        for _ in 0..self.options.probe_limit {
            let sample = match track!(self.parser.next_video_sample())? {
                None => break,
                Some(sample) => sample,
            };
            info.has_video = true;
            if info.first_video_pts.is_none() {
                info.first_video_pts = Some(sample.pts);
            }
            let keyframe = VideoSample::new(&sample, sample.pts, sample.dts).is_keyframe();
            if keyframe {
                info.first_keyframe_pts = Some(sample.pts);
                break;
            }
        }
        info.frame_rate = self.parser.frame_rate();

        track!(self.parser.seek(self.start))?;
        self.parser.reset_scan_state();
        if let Some(sample) = track!(self.parser.next_audio_sample())? {
            info.has_audio = true;
            info.first_audio_pts = Some(sample.pts);
        }

        track!(self.parser.seek(self.start))?;
        info.first_pcr = track!(self.parser.pcr())?;
        mpeg_log!(self.options.log_level, Level::Info, "Stream info: {:?}", info);
        Ok(info)
    }

    /// Reads the next PCR after the current position (`None` for elementary streams).
    pub fn pcr(&mut self) -> Result<Option<ClockReference>> {
        track!(self.parser.pcr())
    }

    /// Overrides the PMT PID of a transport stream and resolves its streams again.
    ///
    /// The sample lists are cleared. On failure the handle keeps the previously resolved
    /// streams, options and sample lists.
    ///
    /// # Errors
    ///
    /// For elementary streams, or if `pid` is invalid, it will return an
    /// `ErrorKind::InvalidInput` error.
    /// If no video or audio stream is found through the new PMT, it will return an
    /// `ErrorKind::NotFound` error.
    pub fn set_pmt_pid(&mut self, pid: u16) -> Result<()> {
        let parser = track!(self.ts_parser())?;
        track!(parser.set_pmt_pid(pid))?;
        self.options.pmt_pid = Some(pid);
        self.clear_sample_lists();
        Ok(())
    }

    /// Forces the video PID of a transport stream.
    ///
    /// The sample lists are cleared.
    pub fn set_video_pid(&mut self, pid: u16) -> Result<()> {
        let parser = track!(self.ts_parser())?;
        track!(parser.set_video_pid(pid))?;
        self.options.video_pid = Some(pid);
        self.clear_sample_lists();
        Ok(())
    }

    /// Forces the audio PID of a transport stream.
    ///
    /// The sample lists are cleared.
    pub fn set_audio_pid(&mut self, pid: u16) -> Result<()> {
        let parser = track!(self.ts_parser())?;
        track!(parser.set_audio_pid(pid))?;
        self.options.audio_pid = Some(pid);
        self.clear_sample_lists();
        Ok(())
    }

    fn ts_parser(&mut self) -> Result<&mut crate::ts::TsParser<R>> {
        match self.parser {
            MpegParser::Ts(ref mut p) => Ok(p),
            MpegParser::Es(_) => track_panic!(
                ErrorKind::InvalidInput,
                "PIDs cannot be set for elementary streams"
            ),
        }
    }
}
