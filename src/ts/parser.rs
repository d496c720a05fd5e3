use log::Level;
use std::io::{self, BufRead, Read, Seek};

use crate::es::start_code::{find_start_code, VideoStartCode};
use crate::es::video::{PictureCodingType, PictureStructure, VideoHeader, VideoHeaderDecoder};
use crate::logging::LogLevel;
use crate::options::ParserOptions;
use crate::pes::{read_pes_header, PesHeader, PesHeaderAssembler};
use crate::sample::{AudioSampleInfo, SampleDataMode, SampleKind, VideoSampleInfo};
use crate::time::ClockReference;
use crate::ts::psi::{self, EsInfo, Pat, Pmt, StreamType};
use crate::ts::reader::{detect_packet_format, ReadTsPacket, TsPacketReader};
use crate::ts::{PacketFormat, Pid, TsPacket};
use crate::{ErrorKind, Result};

/// MPEG-2 transport stream parser.
///
/// A sample is one PES packet: it starts at the TS packet that carries the PES start
/// (`payload_unit_start_indicator`) and spans every packet of the same PID up to the next start.
#[derive(Debug)]
pub struct TsParser<R> {
    reader: TsPacketReader<R>,
    start: u64,
    options: ParserOptions,
    pat: Option<Pat>,
    pmt_pid: Option<u16>,
    pmt: Option<Pmt>,
    video: Option<EsInfo>,
    audio: Option<EsInfo>,
    pcr_pid: Option<u16>,
    decoder: VideoHeaderDecoder,
    assembler: PesHeaderAssembler,
    gop_count: u32,
}
impl<R: Read + Seek> TsParser<R> {
    /// Makes a new `TsParser` instance.
    ///
    /// # Errors
    ///
    /// If no stable TS framing is found, it will return an `ErrorKind::FormatMismatch` error.
    pub fn new(mut stream: R, options: &ParserOptions) -> Result<Self> {
        track!(options.validate())?;
        let (format, start) = track!(detect_packet_format(&mut stream))?;
        mpeg_log!(
            options.log_level,
            Level::Info,
            "Transport stream: packet_size={}, first_packet={}",
            format.size(),
            start
        );
        let reader = track!(TsPacketReader::new(stream, format, start, options.log_level))?;
        Ok(TsParser {
            reader,
            start,
            options: options.clone(),
            pat: None,
            pmt_pid: None,
            pmt: None,
            video: None,
            audio: None,
            pcr_pid: None,
            decoder: VideoHeaderDecoder::new(),
            assembler: PesHeaderAssembler::new(),
            gop_count: 0,
        })
    }

    /// Resolves the PMT, the video/audio PIDs and the PCR PID.
    ///
    /// Previously resolved tables are discarded first. The cursor is moved to the first packet.
    ///
    /// # Errors
    ///
    /// If neither a video nor an audio stream is found, it will return an `ErrorKind::NotFound` error.
    /// If a PAT or PMT section cannot be assembled, it will return an
    /// `ErrorKind::SectionIntegrity` error.
    pub fn parse(&mut self) -> Result<()> {
        self.pat = None;
        self.pmt_pid = None;
        self.pmt = None;
        self.video = None;
        self.audio = None;
        self.pcr_pid = None;
        let log = self.options.log_level;

        let candidates = if let Some(pid) = self.options.pmt_pid {
            vec![pid]
        } else {
            track!(self.reader.seek(self.start))?;
            let section = track!(psi::read_section(
                &mut self.reader,
                Pid::PAT,
                psi::PAT_TABLE_ID,
                self.options.strict_crc,
                log
            ))?;
            match section {
                None => {
                    mpeg_log!(log, Level::Warn, "No PAT found");
                    Vec::new()
                }
                Some(section) => {
                    let pat = track!(Pat::decode(&section))?;
                    mpeg_log!(log, Level::Info, "PAT: {:?}", pat);
                    let pids = pat.table.iter().map(|p| p.program_map_pid).collect();
                    self.pat = Some(pat);
                    pids
                }
            }
        };

        for pid in candidates {
            track!(self.reader.seek(self.start))?;
            let section = track!(psi::read_section(
                &mut self.reader,
                pid,
                psi::PMT_TABLE_ID,
                self.options.strict_crc,
                log
            ))?;
            let section = match section {
                None => {
                    mpeg_log!(log, Level::Debug, "No PMT found: pid={}", pid);
                    continue;
                }
                Some(section) => section,
            };
            let pmt = match Pmt::decode(&section) {
                Ok(pmt) => pmt,
                Err(e) => {
                    mpeg_log!(log, Level::Warn, "Broken PMT: pid={}, reason={}", pid, e);
                    continue;
                }
            };
            let usable = pmt.video_stream().is_some() || pmt.audio_stream().is_some();
            if usable || self.options.pmt_pid.is_some() {
                mpeg_log!(log, Level::Info, "PMT: pid={}, {:?}", pid, pmt);
                self.pmt_pid = Some(pid);
                self.pmt = Some(pmt);
                break;
            }
        }

        self.video = match self.options.video_pid {
            Some(pid) => Some(self.forced_stream(pid, StreamType::Mpeg2Video)),
            None => self.pmt.as_ref().and_then(Pmt::video_stream),
        };
        self.audio = match self.options.audio_pid {
            Some(pid) => Some(self.forced_stream(pid, StreamType::Other(0))),
            None => self.pmt.as_ref().and_then(Pmt::audio_stream),
        };
        self.pcr_pid = self
            .pmt
            .as_ref()
            .and_then(|p| p.pcr_pid)
            .or_else(|| self.video.map(|v| v.elementary_pid));
        track_assert!(
            self.video.is_some() || self.audio.is_some(),
            ErrorKind::NotFound,
            "No video or audio stream"
        );
        mpeg_log!(
            log,
            Level::Info,
            "Streams: video={:?}, audio={:?}, pcr_pid={:?}",
            self.video,
            self.audio,
            self.pcr_pid
        );

        track!(self.reader.seek(self.start))?;
        self.reset_scan_state();
        Ok(())
    }

    /// Overrides the PMT PID and resolves the streams again.
    ///
    /// If the streams cannot be resolved from the new PMT, the previously resolved tables and
    /// the previous override are restored before the error is returned.
    pub fn set_pmt_pid(&mut self, pid: u16) -> Result<()> {
        track!(Pid::new(pid))?;
        let saved_option = self.options.pmt_pid;
        let saved = (
            self.pat.clone(),
            self.pmt_pid,
            self.pmt.clone(),
            self.video,
            self.audio,
            self.pcr_pid,
        );

        self.options.pmt_pid = Some(pid);
        if let Err(e) = self.parse() {
            self.options.pmt_pid = saved_option;
            let (pat, pmt_pid, pmt, video, audio, pcr_pid) = saved;
            self.pat = pat;
            self.pmt_pid = pmt_pid;
            self.pmt = pmt;
            self.video = video;
            self.audio = audio;
            self.pcr_pid = pcr_pid;
            track!(self.reader.seek(self.start))?;
            self.reset_scan_state();
            return Err(track!(e));
        }
        Ok(())
    }

    /// Forces the video PID.
    pub fn set_video_pid(&mut self, pid: u16) -> Result<()> {
        track!(Pid::new(pid))?;
        self.options.video_pid = Some(pid);
        self.video = Some(self.forced_stream(pid, StreamType::Mpeg2Video));
        if self.pcr_pid.is_none() {
            self.pcr_pid = Some(pid);
        }
        Ok(())
    }

    /// Forces the audio PID.
    pub fn set_audio_pid(&mut self, pid: u16) -> Result<()> {
        track!(Pid::new(pid))?;
        self.options.audio_pid = Some(pid);
        self.audio = Some(self.forced_stream(pid, StreamType::Other(0)));
        Ok(())
    }

    /// Returns the packet format.
    pub fn format(&self) -> PacketFormat {
        self.reader.format()
    }

    /// Returns the PAT found by `parse`.
    pub fn pat(&self) -> Option<&Pat> {
        self.pat.as_ref()
    }

    /// Returns the PMT selected by `parse`.
    pub fn pmt(&self) -> Option<&Pmt> {
        self.pmt.as_ref()
    }

    /// Returns the PID of the selected PMT.
    pub fn pmt_pid(&self) -> Option<u16> {
        self.pmt_pid
    }

    /// Returns the video stream.
    pub fn video_stream(&self) -> Option<EsInfo> {
        self.video
    }

    /// Returns the audio stream.
    pub fn audio_stream(&self) -> Option<EsInfo> {
        self.audio
    }

    /// Returns the PCR PID.
    pub fn pcr_pid(&self) -> Option<u16> {
        self.pcr_pid
    }

    /// Returns the frame rate of the last sequence header seen since the scan state was reset.
    pub fn frame_rate(&self) -> Option<(u32, u32)> {
        self.decoder.frame_rate()
    }

    /// Returns the current read position.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Moves the read position to the start of a packet.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        track!(self.reader.seek(position))
    }

    /// Resets the GOP counter and the decoded video header state.
    pub fn reset_scan_state(&mut self) {
        self.decoder.reset();
        self.assembler.reset();
        self.gop_count = 0;
    }

    /// Reads the next PCR after the current position.
    ///
    /// Returns `Ok(None)` if there is no PCR PID or no PCR until the end of the stream.
    pub fn pcr(&mut self) -> Result<Option<ClockReference>> {
        let pid = match self.pcr_pid {
            None => return Ok(None),
            Some(pid) => pid,
        };
        while let Some(packet) = track!(self.reader.next_packet(pid))? {
            if let Some(pcr) = packet.pcr() {
                mpeg_log!(
                    self.options.log_level,
                    Level::Trace,
                    "PCR: position={}, base={}, extension={}",
                    packet.position,
                    pcr.base(),
                    pcr.extension()
                );
                return Ok(Some(pcr));
            }
        }
        Ok(None)
    }

    /// Reads the next video sample.
    pub fn next_video_sample(&mut self) -> Result<Option<VideoSampleInfo>> {
        let video = match self.video {
            None => return Ok(None),
            Some(video) => video,
        };
        let pid = video.elementary_pid;
        let start = match track!(self.read_pes_start(pid))? {
            None => return Ok(None),
            Some(start) => start,
        };
        let pts = start.header.pts.map_or(0, |t| t.as_u64());
        let dts = start.header.dts.map_or(pts, |t| t.as_u64());
        let log = self.options.log_level;
        if !start.header.stream_id.is_video() {
            mpeg_log!(
                log,
                Level::Debug,
                "Video PID carries stream_id=0x{:02x}",
                start.header.stream_id.as_u8()
            );
        }

        let mut payload = PesPayloadReader::new(&mut self.reader, pid, start.header.header_len());
        let snapshot = if video.stream_type.is_mpeg_video() {
            track!(scan_video_headers(
                &mut self.decoder,
                &mut self.gop_count,
                &mut payload,
                log
            ))?
        } else {
            if start.random_access {
                self.gop_count += 1;
            }
            None
        };
        let packets = track!(payload.drain())?;

        let mut info = VideoSampleInfo {
            file_position: start.position,
            sample_size: packets * self.reader.format().size() as u64,
            pts,
            dts,
            gop_number: self.gop_count.saturating_sub(1),
            progressive_sequence: self.decoder.progressive_sequence(),
            closed_gop: self.decoder.gop_header().map_or(false, |g| g.closed_gop),
            picture_coding_type: PictureCodingType::Unknown,
            temporal_reference: 0,
            picture_structure: PictureStructure::Frame,
            progressive_frame: false,
            repeat_first_field: false,
            top_field_first: false,
            random_access: start.random_access,
        };
        if let Some(s) = snapshot {
            info.gop_number = s.gop_number;
            info.progressive_sequence = s.progressive_sequence;
            info.closed_gop = s.closed_gop;
            info.picture_coding_type = s.picture_coding_type;
            info.temporal_reference = s.temporal_reference;
            info.picture_structure = s.picture_structure;
            info.progressive_frame = s.progressive_frame;
            info.repeat_first_field = s.repeat_first_field;
            info.top_field_first = s.top_field_first;
        }
        mpeg_log!(
            log,
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

    /// Reads the next audio sample.
    pub fn next_audio_sample(&mut self) -> Result<Option<AudioSampleInfo>> {
        let pid = match self.audio {
            None => return Ok(None),
            Some(audio) => audio.elementary_pid,
        };
        let start = match track!(self.read_pes_start(pid))? {
            None => return Ok(None),
            Some(start) => start,
        };
        let pts = start.header.pts.map_or(0, |t| t.as_u64());
        let dts = start.header.dts.map_or(pts, |t| t.as_u64());
        if !start.header.stream_id.is_audio() {
            mpeg_log!(
                self.options.log_level,
                Level::Debug,
                "Audio PID carries stream_id=0x{:02x}",
                start.header.stream_id.as_u8()
            );
        }
        let packets = track!(PesPayloadReader::new(&mut self.reader, pid, 0).drain())?;

        let info = AudioSampleInfo {
            file_position: start.position,
            sample_size: packets * self.reader.format().size() as u64,
            pts,
            dts,
        };
        mpeg_log!(
            self.options.log_level,
            Level::Debug,
            "Audio sample: position={}, size={}, pts={}",
            info.file_position,
            info.sample_size,
            info.pts
        );
        Ok(Some(info))
    }

    /// Skips to the next PES start of the given stream, and returns its position.
    pub fn seek_next_sample_position(&mut self, kind: SampleKind) -> Result<Option<u64>> {
        let pid = match track!(self.stream_pid(kind)) {
            Ok(pid) => pid,
            Err(_) => return Ok(None),
        };
        match track!(self.reader.next_unit_start(pid))? {
            None => Ok(None),
            Some(packet) => {
                let position = packet.position;
                self.reader.unread_ts_packet(packet);
                Ok(Some(position))
            }
        }
    }

    /// Reads the data of the sample at `position` that spans `size` bytes of TS packets.
    pub fn read_sample_data(
        &mut self,
        kind: SampleKind,
        position: u64,
        size: u64,
        mode: SampleDataMode,
    ) -> Result<Vec<u8>> {
        let pid = track!(self.stream_pid(kind))?;
        let stride = self.reader.format().size() as u64;
        track!(self.reader.seek(position))?;

        let mut data = Vec::with_capacity(size as usize);
        for _ in 0..size / stride {
            let packet = match track!(self.reader.next_packet(pid))? {
                None => break,
                Some(packet) => packet,
            };
            match mode {
                SampleDataMode::Container => data.extend_from_slice(self.reader.last_unit()),
                SampleDataMode::Pes | SampleDataMode::Raw => data.extend_from_slice(packet.payload()),
            }
        }
        if mode == SampleDataMode::Raw {
            let (_, header_len) = track!(read_pes_header(&data[..]))?;
            data.drain(..header_len);
        }
        Ok(data)
    }

    fn stream_pid(&self, kind: SampleKind) -> Result<u16> {
        let stream = match kind {
            SampleKind::Video => self.video,
            SampleKind::Audio => self.audio,
        };
        let stream = track_assert_some!(stream, ErrorKind::NotFound, "No {:?} stream", kind);
        Ok(stream.elementary_pid)
    }

    fn forced_stream(&self, pid: u16, default_type: StreamType) -> EsInfo {
        self.pmt
            .as_ref()
            .and_then(|p| p.stream(pid))
            .unwrap_or(EsInfo {
                stream_type: default_type,
                elementary_pid: pid,
            })
    }

    /// Finds the next PES of `pid` that carries a PTS, and moves the cursor back to its first packet.
    fn read_pes_start(&mut self, pid: u16) -> Result<Option<PesStart>> {
        let log = self.options.log_level;
        loop {
            let first = match track!(self.reader.next_unit_start(pid))? {
                None => return Ok(None),
                Some(packet) => packet,
            };
            self.assembler.reset();

            let mut packet = first.clone();
            let header = loop {
                match self.assembler.push(packet.payload()) {
                    Err(e) => {
                        mpeg_log!(log, Level::Debug, "Not a PES start: position={}, {}", packet.position, e);
                        break None;
                    }
                    Ok(Some(header)) => break Some(header),
                    Ok(None) => {}
                }
                let next = match track!(self.reader.next_packet(pid))? {
                    None => return Ok(None),
                    Some(next) => next,
                };
                if next.header.payload_unit_start_indicator {
                    mpeg_log!(
                        log,
                        Level::Warn,
                        "PES header truncated by a new payload unit: position={}",
                        next.position
                    );
                    self.reader.unread_ts_packet(next);
                    break None;
                }
                packet = next;
            };
            let header = match header {
                None => continue,
                Some(header) => header,
            };
            if header.pts.is_none() {
                mpeg_log!(log, Level::Trace, "PES without PTS: position={}", first.position);
                continue;
            }

            track!(self.reader.seek(first.position))?;
            return Ok(Some(PesStart {
                position: first.position,
                random_access: first.is_random_access(),
                header,
            }));
        }
    }
}

#[derive(Debug)]
struct PesStart {
    position: u64,
    random_access: bool,
    header: PesHeader,
}

#[derive(Debug, Clone, Copy)]
struct PictureSnapshot {
    gop_number: u32,
    progressive_sequence: bool,
    closed_gop: bool,
    picture_coding_type: PictureCodingType,
    temporal_reference: u16,
    picture_structure: PictureStructure,
    progressive_frame: bool,
    repeat_first_field: bool,
    top_field_first: bool,
}
impl PictureSnapshot {
    fn take(decoder: &VideoHeaderDecoder, gop_count: u32) -> Option<Self> {
        let picture = decoder.picture_header()?;
        let mut snapshot = PictureSnapshot {
            gop_number: gop_count.saturating_sub(1),
            progressive_sequence: decoder.progressive_sequence(),
            closed_gop: decoder.gop_header().map_or(false, |g| g.closed_gop),
            picture_coding_type: picture.picture_coding_type,
            temporal_reference: picture.temporal_reference,
            picture_structure: PictureStructure::Frame,
            progressive_frame: true,
            repeat_first_field: false,
            top_field_first: false,
        };
        if let Some(pce) = decoder.picture_coding_extension() {
            snapshot.picture_structure = pce.picture_structure;
            snapshot.progressive_frame = pce.progressive_frame;
            snapshot.repeat_first_field = pce.repeat_first_field;
            snapshot.top_field_first = pce.top_field_first;
        }
        Some(snapshot)
    }
}

/// Decodes the video headers of a PES payload.
///
/// Returns the state of the first picture as of its first slice. GOP headers are counted
/// through the whole payload.
fn scan_video_headers<B: BufRead>(
    decoder: &mut VideoHeaderDecoder,
    gop_count: &mut u32,
    payload: &mut B,
    log: LogLevel,
) -> Result<Option<PictureSnapshot>> {
    let mut snapshot = None;
    let mut picture_seen = false;
    while let Some((code, _)) = track!(find_start_code(payload))? {
        let kind = match VideoStartCode::from_u8(code) {
            None => continue,
            Some(kind) => kind,
        };
        let pending = picture_seen && snapshot.is_none();
        match kind {
            VideoStartCode::Slice => {
                if pending {
                    snapshot = PictureSnapshot::take(decoder, *gop_count);
                }
                continue;
            }
            VideoStartCode::UserData => continue,
            _ if pending && kind.ends_sample() => {
                snapshot = PictureSnapshot::take(decoder, *gop_count);
            }
            _ => {}
        }
        if kind == VideoStartCode::SequenceEnd {
            continue;
        }

        match decoder.read_header(kind, payload) {
            Ok(VideoHeader::Gop(_)) => *gop_count += 1,
            Ok(VideoHeader::Picture(_)) => {
                if snapshot.is_none() {
                    picture_seen = true;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if *e.kind() != ErrorKind::Truncated {
                    mpeg_log!(log, Level::Warn, "Broken video header: {}", e);
                }
                break;
            }
        }
    }
    if picture_seen && snapshot.is_none() {
        snapshot = PictureSnapshot::take(decoder, *gop_count);
    }
    Ok(snapshot)
}

/// Payload bytes of a single PES, read across the TS packets of its PID.
///
/// Stops before the next packet that starts a payload unit, which is pushed back to the reader.
struct PesPayloadReader<'a, R> {
    reader: &'a mut TsPacketReader<R>,
    pid: u16,
    packet: Option<TsPacket>,
    offset: usize,
    skip: usize,
    packets: u64,
    eos: bool,
}
impl<'a, R: Read + Seek> PesPayloadReader<'a, R> {
    fn new(reader: &'a mut TsPacketReader<R>, pid: u16, header_len: usize) -> Self {
        PesPayloadReader {
            reader,
            pid,
            packet: None,
            offset: 0,
            skip: header_len,
            packets: 0,
            eos: false,
        }
    }

    fn load_next_packet(&mut self) -> Result<bool> {
        if self.eos {
            return Ok(false);
        }
        let packet = match track!(self.reader.next_packet(self.pid))? {
            None => {
                self.eos = true;
                return Ok(false);
            }
            Some(packet) => packet,
        };
        if packet.header.payload_unit_start_indicator && self.packets > 0 {
            self.reader.unread_ts_packet(packet);
            self.eos = true;
            return Ok(false);
        }

        let skip = self.skip.min(packet.payload().len());
        self.skip -= skip;
        self.offset = skip;
        self.packet = Some(packet);
        self.packets += 1;
        Ok(true)
    }

    fn remaining(&self) -> usize {
        self.packet
            .as_ref()
            .map_or(0, |p| p.payload().len() - self.offset)
    }

    /// Consumes the rest of the PES, and returns the number of its TS packets.
    fn drain(mut self) -> Result<u64> {
        self.packet = None;
        while track!(self.load_next_packet())? {}
        Ok(self.packets)
    }
}
impl<'a, R: Read + Seek> Read for PesPayloadReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let src = self.fill_buf()?;
            let n = src.len().min(buf.len());
            buf[..n].copy_from_slice(&src[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}
impl<'a, R: Read + Seek> BufRead for PesPayloadReader<'a, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.remaining() == 0 {
            let loaded = self
                .load_next_packet()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if !loaded {
                return Ok(&[]);
            }
        }
        match self.packet {
            Some(ref packet) => Ok(&packet.payload()[self.offset..]),
            None => Ok(&[]),
        }
    }

    fn consume(&mut self, amt: usize) {
        self.offset = (self.offset + amt).min(self.offset + self.remaining());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packet(pid: u16, pusi: bool, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x47, ((pusi as u8) << 6) | (pid >> 8) as u8, pid as u8, 0x10];
        bytes.extend_from_slice(payload);
        bytes.resize(188, 0xFF);
        bytes
    }

    #[test]
    fn payload_reader_skips_header_and_stops_at_next_unit() {
        let mut first = vec![0xAA; 10];
        first.extend_from_slice(&[1, 2, 3]);
        first.resize(184, 4);
        let mut bytes = packet(0x100, true, &first);
        bytes.extend(packet(0x200, true, &[9; 184]));
        bytes.extend(packet(0x100, false, &[5; 184]));
        bytes.extend(packet(0x100, true, &[6; 184]));

        let mut reader =
            TsPacketReader::new(Cursor::new(bytes), PacketFormat::Plain, 0, LogLevel::Lv0).unwrap();
        let mut payload = PesPayloadReader::new(&mut reader, 0x100, 10);
        let mut data = Vec::new();
        payload.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 174 + 184);
        assert_eq!(&data[..4], &[1, 2, 3, 4]);
        assert!(data[174..].iter().all(|&b| b == 5));
        assert_eq!(payload.drain().unwrap(), 2);

        let next = reader.read_ts_packet().unwrap().unwrap();
        assert_eq!(next.position, 188 * 3);
    }

    #[test]
    fn header_longer_than_first_payload() {
        let mut bytes = packet(0x100, true, &[0xAA; 184]);
        bytes.extend(packet(0x100, false, &[7; 184]));
        let mut reader =
            TsPacketReader::new(Cursor::new(bytes), PacketFormat::Plain, 0, LogLevel::Lv0).unwrap();
        let mut payload = PesPayloadReader::new(&mut reader, 0x100, 190);
        let mut data = Vec::new();
        payload.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 184 - 6);
        assert!(data.iter().all(|&b| b == 7));
    }
}
