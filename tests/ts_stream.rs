mod common;

use common::*;
use mpeg2index::time::Timestamp;
use mpeg2index::ts::{psi::StreamType, PacketFormat};
use mpeg2index::{
    ErrorKind, MpegParser, MpegStream, ParserOptions, PictureCodingType, SampleDataMode,
    StreamFormat,
};
use std::io::Cursor;

const PMT_PID: u16 = 0x1000;
const VIDEO_PID: u16 = 0x100;
const AUDIO_PID: u16 = 0x110;
const DATA_PID: u16 = 0x120;

const PTS_INDICES: [u64; 7] = [1, 0, 4, 2, 3, 6, 5];
const DTS_INDICES: [u64; 7] = [0, 0, 1, 2, 3, 4, 5];

#[derive(Debug, Default)]
struct Layout {
    video: Vec<(u64, u64)>,
    audio: Vec<(u64, u64)>,
    pictures: Vec<Vec<u8>>,
}

fn ts_stream(ts: &mut TsBuilder, format: PacketFormat, base: u64) -> Layout {
    let stride = format.size() as u64;
    let pictures = gop_2_3_2(true).pictures();
    let mut layout = Layout::default();
    for (i, picture) in pictures.iter().enumerate() {
        let pts = base + PTS_INDICES[i] * 3003;
        let dts = base + DTS_INDICES[i] * 3003;
        let keyframe = [0, 2, 5].contains(&i);

        let position = ts.position();
        let packets = ts.pes(VIDEO_PID, 0xE0, pts, Some(dts), picture, keyframe, Some(dts));
        layout.video.push((position, packets as u64 * stride));

        let position = ts.position();
        let packets = ts.pes(AUDIO_PID, 0xC0, base + i as u64 * 3003, None, &[0x55; 400], false, None);
        layout.audio.push((position, packets as u64 * stride));
        ts.null();
    }
    layout.pictures = pictures;
    layout
}

fn standard(format: PacketFormat, base: u64) -> (Vec<u8>, Layout) {
    let mut ts = TsBuilder::new(format);
    ts.pat(&[(1, PMT_PID)]);
    ts.pmt(PMT_PID, VIDEO_PID, &[(0x02, VIDEO_PID), (0x04, AUDIO_PID)]);
    let layout = ts_stream(&mut ts, format, base);
    (ts.build(), layout)
}

fn open(bytes: Vec<u8>, options: ParserOptions) -> MpegStream<Cursor<Vec<u8>>> {
    MpegStream::new(Cursor::new(bytes), options).unwrap()
}

#[test]
fn resolves_program_and_streams() {
    let (bytes, _) = standard(PacketFormat::Plain, 90_000);
    let options = ParserOptions::default();
    let mut parser = MpegParser::new(Cursor::new(bytes), &options).unwrap();
    parser.parse().unwrap();
    assert_eq!(parser.format(), StreamFormat::Ts(PacketFormat::Plain));

    match parser {
        MpegParser::Ts(ref p) => {
            let pat = p.pat().unwrap();
            assert_eq!(pat.table.len(), 1);
            assert_eq!(pat.table[0].program_map_pid, PMT_PID);
            assert_eq!(p.pmt_pid(), Some(PMT_PID));
            let video = p.video_stream().unwrap();
            assert_eq!(video.elementary_pid, VIDEO_PID);
            assert_eq!(video.stream_type, StreamType::Mpeg2Video);
            let audio = p.audio_stream().unwrap();
            assert_eq!(audio.elementary_pid, AUDIO_PID);
            assert_eq!(audio.stream_type, StreamType::Mpeg2Audio);
            assert_eq!(p.pcr_pid(), Some(VIDEO_PID));
        }
        MpegParser::Es(_) => panic!(),
    }
}

#[test]
fn sample_lists_for_each_packet_format() {
    for &format in PacketFormat::ALL.iter() {
        let base = 90_000;
        let (bytes, layout) = standard(format, base);
        let mut stream = open(bytes, ParserOptions::default());
        assert_eq!(stream.format(), StreamFormat::Ts(format));
        stream.create_sample_list().unwrap();

        assert_eq!(stream.video_sample_count(), 7, "{:?}", format);
        assert_eq!(stream.audio_sample_count(), 7, "{:?}", format);
        assert_eq!(stream.gop_count(), 3);

        let video: Vec<_> = stream
            .video_samples()
            .iter()
            .map(|s| (s.file_position, s.sample_size))
            .collect();
        assert_eq!(video, layout.video);
        let audio: Vec<_> = stream
            .audio_samples()
            .iter()
            .map(|s| (s.file_position, s.sample_size))
            .collect();
        assert_eq!(audio, layout.audio);

        for (i, s) in stream.video_samples().iter().enumerate() {
            assert_eq!(s.pts, base + PTS_INDICES[i] * 3003);
            assert_eq!(s.dts, base + DTS_INDICES[i] * 3003);
        }
        let types: Vec<_> = stream
            .video_samples()
            .iter()
            .map(|s| s.picture_coding_type)
            .collect();
        use PictureCodingType::*;
        assert_eq!(types, vec![I, B, I, B, B, I, B]);

        let gops: Vec<_> = stream.video_samples().iter().map(|s| s.gop_number).collect();
        assert_eq!(gops, vec![0, 0, 1, 1, 1, 2, 2]);
        assert!(stream.gop(0).unwrap().closed_gop);
        assert_eq!(stream.keyframes(), vec![0, 2, 5]);
        assert_eq!(stream.total_display_fields(), 15);
    }
}

#[test]
fn timestamps_are_monotonic_across_wraparound() {
    let base = Timestamp::MAX - 3003 * 2;
    let (bytes, _) = standard(PacketFormat::Plain, base);
    let mut stream = open(bytes, ParserOptions::default());
    stream.create_sample_list().unwrap();

    for (i, s) in stream.video_samples().iter().enumerate() {
        assert_eq!(s.pts, base + PTS_INDICES[i] * 3003);
        assert_eq!(s.dts, base + DTS_INDICES[i] * 3003);
    }
    assert!(stream.video_samples().iter().any(|s| s.pts > Timestamp::MAX));
    assert!(stream
        .video_samples()
        .windows(2)
        .all(|w| w[0].dts <= w[1].dts));
    assert!(stream
        .audio_samples()
        .windows(2)
        .all(|w| w[0].pts < w[1].pts));
}

#[test]
fn pat_split_across_packets_after_a_stray_unit_start() {
    let pat = pat_section(&[(1, PMT_PID)]);
    let mut ts = TsBuilder::new(PacketFormat::Plain);

    // The first attempt is interrupted by the next unit start
    let mut stray = vec![0x00];
    stray.extend_from_slice(&pat[..6]);
    ts.packet(0x0000, true, false, None, &stray);
    ts.section(0x0000, &pat, 7);
    ts.pmt(PMT_PID, VIDEO_PID, &[(0x02, VIDEO_PID), (0x04, AUDIO_PID)]);
    ts_stream(&mut ts, PacketFormat::Plain, 0);

    let mut stream = open(ts.build(), ParserOptions::default());
    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);
    assert_eq!(stream.audio_sample_count(), 7);
}

#[test]
fn pmt_crc_mismatch() {
    let mut pmt = pmt_section(1, VIDEO_PID, &[(0x02, VIDEO_PID)]);
    let last = pmt.len() - 1;
    pmt[last] ^= 0xFF;

    let mut ts = TsBuilder::new(PacketFormat::Plain);
    ts.pat(&[(1, PMT_PID)]);
    ts.section(PMT_PID, &pmt, 184);
    ts_stream(&mut ts, PacketFormat::Plain, 0);
    let bytes = ts.build();

    let mut stream = open(bytes.clone(), ParserOptions::default());
    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);

    let e = MpegStream::new(Cursor::new(bytes), ParserOptions::new().strict_crc(true))
        .err()
        .unwrap();
    assert_eq!(*e.kind(), ErrorKind::NotFound);
}

#[test]
fn pmt_pid_override_without_pat() {
    let mut ts = TsBuilder::new(PacketFormat::Plain);
    ts.pmt(PMT_PID, VIDEO_PID, &[(0x02, VIDEO_PID), (0x04, AUDIO_PID)]);
    ts_stream(&mut ts, PacketFormat::Plain, 0);
    let bytes = ts.build();

    let e = MpegStream::new(Cursor::new(bytes.clone()), ParserOptions::default())
        .err()
        .unwrap();
    assert_eq!(*e.kind(), ErrorKind::NotFound);

    let mut stream = open(bytes, ParserOptions::new().pmt_pid(PMT_PID));
    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);
}

#[test]
fn failed_pmt_pid_override_keeps_previous_streams() {
    let (bytes, layout) = standard(PacketFormat::Plain, 0);
    let mut stream = open(bytes, ParserOptions::default());
    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);
    assert_eq!(stream.audio_sample_count(), 7);

    let e = stream.set_pmt_pid(PMT_PID + 1).err().unwrap();
    assert_eq!(*e.kind(), ErrorKind::NotFound);
    assert_eq!(stream.options().pmt_pid, None);
    match stream.parser() {
        MpegParser::Ts(p) => {
            assert_eq!(p.pmt_pid(), Some(PMT_PID));
            assert_eq!(p.video_stream().map(|s| s.elementary_pid), Some(VIDEO_PID));
            assert_eq!(p.audio_stream().map(|s| s.elementary_pid), Some(AUDIO_PID));
        }
        MpegParser::Es(_) => panic!(),
    }

    let positions: Vec<_> = stream
        .video_samples()
        .iter()
        .map(|s| (s.file_position, s.sample_size))
        .collect();
    assert_eq!(positions, layout.video);

    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);
    assert_eq!(stream.audio_sample_count(), 7);

    stream.set_pmt_pid(PMT_PID).unwrap();
    assert_eq!(stream.options().pmt_pid, Some(PMT_PID));
    assert_eq!(stream.video_sample_count(), 0);
}

#[test]
fn forced_video_pid_of_unknown_stream_type() {
    let mut ts = TsBuilder::new(PacketFormat::Plain);
    ts.pat(&[(1, PMT_PID)]);
    ts.pmt(
        PMT_PID,
        VIDEO_PID,
        &[(0x02, VIDEO_PID), (0x04, AUDIO_PID), (0x06, DATA_PID)],
    );
    ts_stream(&mut ts, PacketFormat::Plain, 0);
    for (i, &random_access) in [true, false, true].iter().enumerate() {
        ts.pes(DATA_PID, 0xE1, 1000 * i as u64, None, &[0x66; 250], random_access, None);
    }

    let mut stream = open(ts.build(), ParserOptions::default());
    stream.set_video_pid(DATA_PID).unwrap();
    stream.create_sample_list().unwrap();

    let samples = stream.video_samples();
    assert_eq!(samples.len(), 3);
    assert!(samples
        .iter()
        .all(|s| s.picture_coding_type == PictureCodingType::Unknown));
    let gops: Vec<_> = samples.iter().map(|s| s.gop_number).collect();
    assert_eq!(gops, vec![0, 0, 1]);
    assert_eq!(stream.keyframes(), vec![0, 2]);
    assert_eq!(stream.audio_sample_count(), 7);

    let e = stream.set_audio_pid(0x2000).err().unwrap();
    assert_eq!(*e.kind(), ErrorKind::InvalidInput);
}

#[test]
fn sample_data_modes() {
    let format = PacketFormat::Timestamped;
    let (bytes, layout) = standard(format, 0);
    let mut stream = open(bytes.clone(), ParserOptions::default());
    stream.create_sample_list().unwrap();

    for (i, picture) in layout.pictures.iter().enumerate() {
        let raw = stream.video_sample_data(i, SampleDataMode::Raw).unwrap();
        assert_eq!(&raw, picture);
    }

    let sample = *stream.video_sample(2).unwrap();
    let pes = stream.video_sample_data(2, SampleDataMode::Pes).unwrap();
    let header = mpeg2index::pes::PesHeader::decode(&pes).unwrap();
    assert_eq!(header.stream_id.as_u8(), 0xE0);
    assert_eq!(header.pts.unwrap().as_u64(), sample.pts);
    assert_eq!(header.dts.unwrap().as_u64(), sample.dts);
    assert_eq!(&pes[header.header_len()..], &layout.pictures[2][..]);

    let start = sample.file_position as usize;
    let end = start + sample.sample_size as usize;
    let container = stream.video_sample_data(2, SampleDataMode::Container).unwrap();
    assert_eq!(&container[..], &bytes[start..end]);

    let audio = stream.audio_sample_data(3, SampleDataMode::Raw).unwrap();
    assert_eq!(audio, vec![0x55; 400]);
    let e = stream.audio_sample_data(7, SampleDataMode::Raw).err().unwrap();
    assert_eq!(*e.kind(), ErrorKind::NotFound);
}

#[test]
fn stream_info_of_transport_stream() {
    let base = 900_000;
    let (bytes, _) = standard(PacketFormat::Fec, base);
    let mut stream = open(bytes, ParserOptions::default());
    let info = stream.stream_info().unwrap();

    assert_eq!(info.format, StreamFormat::Ts(PacketFormat::Fec));
    assert!(info.has_video);
    assert!(info.has_audio);
    assert_eq!(info.first_video_pts, Some(base + 3003));
    assert_eq!(info.first_keyframe_pts, Some(base + 3003));
    assert_eq!(info.first_audio_pts, Some(base));
    assert_eq!(info.first_pcr.map(|p| p.base()), Some(base));
    assert_eq!(info.frame_rate, Some((30000, 1001)));
    assert_eq!(info.audio_delay(), Some(-3003));

    // The probe does not disturb sample list creation
    stream.create_sample_list().unwrap();
    assert_eq!(stream.video_sample_count(), 7);
}

#[test]
fn garbage_and_truncated_tail_are_skipped() {
    let mut ts = TsBuilder::new(PacketFormat::Plain);
    ts.pat(&[(1, PMT_PID)]);
    ts.pmt(PMT_PID, VIDEO_PID, &[(0x02, VIDEO_PID), (0x04, AUDIO_PID)]);
    for _ in 0..8 {
        ts.null();
    }
    ts.garbage(&[0x00; 50]);
    let layout = ts_stream(&mut ts, PacketFormat::Plain, 0);
    let mut bytes = ts.build();
    bytes.extend_from_slice(&[0x47, 0x01, 0x00, 0x10, 0x00]);

    let mut stream = open(bytes, ParserOptions::default());
    stream.create_sample_list().unwrap();
    let video: Vec<_> = stream
        .video_samples()
        .iter()
        .map(|s| (s.file_position, s.sample_size))
        .collect();
    assert_eq!(video, layout.video);
}
