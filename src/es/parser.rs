use log::Level;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::TruncatedAsEos;
use crate::es::start_code::{check_video_start_code, find_start_code, VideoStartCode};
use crate::es::video::{Extension, PictureCodingType, PictureStructure, VideoHeader, VideoHeaderDecoder};
use crate::logging::LogLevel;
use crate::options::ParserOptions;
use crate::sample::VideoSampleInfo;
use crate::time::Timestamp;
use crate::{ErrorKind, Result};

/// MPEG-1/2 video elementary stream parser.
///
/// Samples are delimited by start codes: a sample runs from the first sequence, GOP or picture
/// start code that precedes a picture up to the next such start code (or a sequence end code).
/// Since an elementary stream carries no timestamps, PTS/DTS are synthesized from the frame rate
/// and the GOP/picture counters.
#[derive(Debug)]
pub struct EsParser<R> {
    reader: BufReader<R>,
    position: u64,
    decoder: VideoHeaderDecoder,
    frame_rate: Option<(u32, u32)>,
    gop_count: u32,
    picture_counter: i64,
    total_pictures: i64,
    log: LogLevel,
}
impl<R: Read + Seek> EsParser<R> {
    /// Checks whether `stream` starts with a sequence header start code.
    ///
    /// The stream is rewound to its beginning afterwards.
    ///
    /// # Errors
    ///
    /// If the first four bytes are not a sequence header start code,
    /// it will return an `ErrorKind::FormatMismatch` error.
    pub fn probe(stream: &mut R) -> Result<()> {
        track_io!(stream.seek(SeekFrom::Start(0)))?;
        let mut buf = [0; 4];
        let result = stream.read_exact(&mut buf);
        track_io!(stream.seek(SeekFrom::Start(0)))?;
        match result {
            Ok(()) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                track_panic!(ErrorKind::FormatMismatch, "Too short stream");
            }
            Err(e) => return Err(track!(crate::Error::from(e))),
        }
        track_assert!(
            check_video_start_code(&buf, VideoStartCode::SequenceHeader),
            ErrorKind::FormatMismatch,
            "Not a sequence header: {:02x?}",
            buf
        );
        Ok(())
    }

    /// Makes a new `EsParser` instance.
    ///
    /// # Errors
    ///
    /// If `stream` does not start with a sequence header, it will return an
    /// `ErrorKind::FormatMismatch` error.
    pub fn new(mut stream: R, options: &ParserOptions) -> Result<Self> {
        track!(Self::probe(&mut stream))?;
        Ok(EsParser {
            reader: BufReader::new(stream),
            position: 0,
            decoder: VideoHeaderDecoder::new(),
            frame_rate: None,
            gop_count: 0,
            picture_counter: -1,
            total_pictures: 0,
            log: options.log_level,
        })
    }

    /// Reads the first sequence header (and its extension) to learn the frame rate.
    ///
    /// The cursor and the counters are reset to the beginning of the stream.
    pub fn parse(&mut self) -> Result<()> {
        track!(self.seek(0))?;
        self.reset_scan_state();
        loop {
            let code = match track!(self.next_start_code())? {
                None => break,
                Some(code) => code,
            };
            match VideoStartCode::from_u8(code) {
                Some(kind @ VideoStartCode::SequenceHeader) | Some(kind @ VideoStartCode::Extension) => {
                    let header = match track!(self.read_header(kind).map(Some)).or_eos()? {
                        None => break,
                        Some(header) => header,
                    };
                    self.update_frame_rate(&header);
                }
                Some(VideoStartCode::Picture) => break,
                _ => {}
            }
        }

        let frame_rate = track_assert_some!(
            self.frame_rate,
            ErrorKind::FormatMismatch,
            "No valid sequence header"
        );
        mpeg_log!(
            self.log,
            Level::Info,
            "Elementary stream: frame_rate={}/{}, progressive_sequence={}",
            frame_rate.0,
            frame_rate.1,
            self.decoder.progressive_sequence()
        );

        track!(self.seek(0))?;
        self.reset_scan_state();
        Ok(())
    }

    /// Returns the frame rate as a `(numerator, denominator)` pair, if known.
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        self.frame_rate
    }

    /// Returns the duration of a frame in 90 kHz ticks as a `(numerator, denominator)` pair.
    pub fn timestamp_base(&self) -> Option<(u64, u64)> {
        self.frame_rate
            .map(|(num, den)| (Timestamp::RESOLUTION * u64::from(den), u64::from(num)))
    }

    /// Returns the number of GOP headers consumed so far.
    pub fn gop_count(&self) -> u32 {
        self.gop_count
    }

    /// Returns the current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves the read position.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        track_io!(self.reader.seek(SeekFrom::Start(position)))?;
        self.position = position;
        Ok(())
    }

    /// Resets the GOP/picture counters and the decoded header state.
    ///
    /// The frame rate learnt by `parse` is kept.
    pub fn reset_scan_state(&mut self) {
        self.decoder.reset();
        self.gop_count = 0;
        self.picture_counter = -1;
        self.total_pictures = 0;
    }

    /// Reads the next video sample.
    ///
    /// If the end of the stream is reached (including a header cut off by the end of the file),
    /// it will return `Ok(None)`.
    pub fn next_video_sample(&mut self) -> Result<Option<VideoSampleInfo>> {
        track!(self.read_next_video_sample()).or_eos()
    }

    /// Skips to the next position where a video sample may start, and returns it.
    pub fn seek_next_sample_position(&mut self) -> Result<Option<u64>> {
        loop {
            let code = match track!(self.next_start_code())? {
                None => return Ok(None),
                Some(code) => code,
            };
            if VideoStartCode::from_u8(code).map_or(false, VideoStartCode::starts_sample) {
                let position = self.position - 4;
                track!(self.seek(position))?;
                return Ok(Some(position));
            }
        }
    }

    /// Reads `size` bytes at `position`.
    pub fn read_sample_data(&mut self, position: u64, size: u64) -> Result<Vec<u8>> {
        track!(self.seek(position))?;
        let mut buf = vec![0; size as usize];
        track_io!(self.reader.read_exact(&mut buf))?;
        self.position += size;
        Ok(buf)
    }

    fn read_next_video_sample(&mut self) -> Result<Option<VideoSampleInfo>> {
        let mut start = None;
        let mut info: Option<VideoSampleInfo> = None;
        loop {
            let code = match track!(self.next_start_code())? {
                None => {
                    // A picture without slices at the end of the stream is not a sample
                    return Ok(None);
                }
                Some(code) => code,
            };
            let code_position = self.position - 4;
            let kind = match VideoStartCode::from_u8(code) {
                None => continue,
                Some(kind) => kind,
            };

            if start.is_none() {
                if !kind.starts_sample() {
                    continue;
                }
                start = Some(code_position);
            }
            if info.is_some() && kind.ends_sample() {
                // The picture had no slice data
                track!(self.seek(code_position))?;
                break;
            }

            match kind {
                VideoStartCode::Slice if info.is_some() => {
                    track!(self.skip_to_sample_end())?;
                    break;
                }
                VideoStartCode::Slice | VideoStartCode::SequenceEnd | VideoStartCode::UserData => {}
                _ => {
                    let header = track!(self.read_header(kind))?;
                    match header {
                        VideoHeader::Sequence(_) | VideoHeader::Extension(Extension::Sequence(_)) => {
                            self.update_frame_rate(&header);
                        }
                        VideoHeader::Gop(ref gop) => {
                            self.total_pictures += self.picture_counter + 1;
                            self.picture_counter = -1;
                            self.gop_count += 1;
                            mpeg_log!(
                                self.log,
                                Level::Debug,
                                "GOP #{}: closed_gop={}, broken_link={}, total_pictures={}",
                                self.gop_count - 1,
                                gop.closed_gop,
                                gop.broken_link,
                                self.total_pictures
                            );
                        }
                        VideoHeader::Picture(_) => {
                            info = Some(track!(self.picture_sample(code_position))?);
                        }
                        VideoHeader::Extension(Extension::PictureCoding(pce)) => {
                            if let Some(info) = info.as_mut() {
                                info.picture_structure = pce.picture_structure;
                                info.progressive_frame = pce.progressive_frame;
                                info.repeat_first_field = pce.repeat_first_field;
                                info.top_field_first = pce.top_field_first;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let mut info = match info {
            None => return Ok(None),
            Some(info) => info,
        };
        let start = start.unwrap_or(info.file_position);
        info.file_position = start;
        info.sample_size = self.position - start;
        mpeg_log!(
            self.log,
            Level::Debug,
            "Video sample: position={}, size={}, type={}, tr={}, pts={}, dts={}",
            info.file_position,
            info.sample_size,
            info.picture_coding_type.as_char(),
            info.temporal_reference,
            info.pts,
            info.dts
        );
        Ok(Some(info))
    }

    fn picture_sample(&mut self, position: u64) -> Result<VideoSampleInfo> {
        let picture = track_assert_some!(self.decoder.picture_header().copied(), ErrorKind::Other);
        let (num, den) = track_assert_some!(
            self.frame_rate,
            ErrorKind::FormatMismatch,
            "Picture before any sequence header"
        );
        self.picture_counter += 1;

        let temporal_reference = i64::from(picture.temporal_reference);
        let pts_index = self.total_pictures + temporal_reference;
        let dts_index = if picture.picture_coding_type == PictureCodingType::B
            || temporal_reference == self.picture_counter
        {
            pts_index
        } else {
            (self.total_pictures + self.picture_counter - 1).max(0)
        };
        let ticks = |n: i64| (n as u64) * Timestamp::RESOLUTION * u64::from(den) / u64::from(num);

        let gop = self.decoder.gop_header();
        Ok(VideoSampleInfo {
            file_position: position,
            sample_size: 0,
            pts: ticks(pts_index),
            dts: ticks(dts_index),
            gop_number: self.gop_count.saturating_sub(1),
            progressive_sequence: self.decoder.progressive_sequence(),
            closed_gop: gop.map_or(false, |g| g.closed_gop),
            picture_coding_type: picture.picture_coding_type,
            temporal_reference: picture.temporal_reference,
            picture_structure: PictureStructure::Frame,
            progressive_frame: true,
            repeat_first_field: false,
            top_field_first: false,
            random_access: picture.picture_coding_type == PictureCodingType::I,
        })
    }

    fn skip_to_sample_end(&mut self) -> Result<()> {
        loop {
            let code = match track!(self.next_start_code())? {
                None => return Ok(()),
                Some(code) => code,
            };
            if VideoStartCode::from_u8(code).map_or(false, VideoStartCode::ends_sample) {
                let end = self.position - 4;
                track!(self.seek(end))?;
                return Ok(());
            }
        }
    }

    fn update_frame_rate(&mut self, header: &VideoHeader) {
        if let Some(frame_rate) = self.decoder.frame_rate() {
            if self.frame_rate != Some(frame_rate) {
                if let VideoHeader::Sequence(ref h) = *header {
                    mpeg_log!(
                        self.log,
                        Level::Debug,
                        "Sequence header: {}x{}, frame_rate_code={}",
                        h.horizontal_size_value,
                        h.vertical_size_value,
                        h.frame_rate_code
                    );
                }
                self.frame_rate = Some(frame_rate);
            }
        }
    }

    fn read_header(&mut self, kind: VideoStartCode) -> Result<VideoHeader> {
        let mut reader = CountingReader {
            inner: &mut self.reader,
            count: 0,
        };
        let result = self.decoder.read_header(kind, &mut reader);
        self.position += reader.count;
        if self.log.enabled(Level::Trace) {
            if let Ok(ref header) = result {
                log::trace!("Video header at {}: {:?}", self.position, header);
            }
        }
        track!(result)
    }

    fn next_start_code(&mut self) -> Result<Option<u8>> {
        match track!(find_start_code(&mut self.reader))? {
            None => {
                self.position = track_io!(self.reader.seek(SeekFrom::End(0)))?;
                Ok(None)
            }
            Some((code, consumed)) => {
                self.position += consumed;
                Ok(Some(code))
            }
        }
    }
}

struct CountingReader<'a, R> {
    inner: &'a mut R,
    count: u64,
}
impl<'a, R: Read> Read for CountingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
