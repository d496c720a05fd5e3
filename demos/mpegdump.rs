extern crate clap;
extern crate env_logger;
extern crate mpeg2index;
#[macro_use]
extern crate trackable;

use clap::{App, Arg};
use mpeg2index::{LogLevel, MpegParser, MpegStream, ParserOptions, SampleDataMode, SampleKind};
use std::io::Write;
use trackable::error::Failure;

fn parse_pid(s: &str) -> u16 {
    let pid = if s.starts_with("0x") || s.starts_with("0X") {
        u16::from_str_radix(&s[2..], 16)
    } else {
        s.parse()
    };
    track_try_unwrap!(pid.map_err(Failure::from_error))
}

fn main() {
    let matches = App::new("mpegdump")
        .arg(Arg::with_name("INPUT").index(1).required(true))
        .arg(
            Arg::with_name("OUTPUT_TYPE")
                .long("output-type")
                .short("o")
                .takes_value(true)
                .possible_values(&["samples", "info", "gops", "psi", "video", "audio"])
                .default_value("samples"),
        )
        .arg(
            Arg::with_name("MODE")
                .long("mode")
                .short("m")
                .takes_value(true)
                .possible_values(&["raw", "pes", "container"])
                .default_value("raw"),
        )
        .arg(Arg::with_name("PMT_PID").long("pmt-pid").takes_value(true))
        .arg(Arg::with_name("VIDEO_PID").long("video-pid").takes_value(true))
        .arg(Arg::with_name("AUDIO_PID").long("audio-pid").takes_value(true))
        .arg(Arg::with_name("STRICT_CRC").long("strict-crc"))
        .arg(
            Arg::with_name("VERBOSE")
                .long("verbose")
                .short("v")
                .multiple(true),
        )
        .get_matches();

    let log_level = LogLevel::from_u8(matches.occurrences_of("VERBOSE") as u8 + 1);
    env_logger::Builder::new()
        .filter_level(log_level.to_level_filter())
        .init();

    let mut options = ParserOptions::new()
        .strict_crc(matches.is_present("STRICT_CRC"))
        .log_level(log_level);
    if let Some(pid) = matches.value_of("PMT_PID") {
        options = options.pmt_pid(parse_pid(pid));
    }
    if let Some(pid) = matches.value_of("VIDEO_PID") {
        options = options.video_pid(parse_pid(pid));
    }
    if let Some(pid) = matches.value_of("AUDIO_PID") {
        options = options.audio_pid(parse_pid(pid));
    }

    let input = matches.value_of("INPUT").unwrap();
    let mut stream = track_try_unwrap!(MpegStream::open(input, options));
    match matches.value_of("OUTPUT_TYPE").unwrap() {
        "info" => {
            let info = track_try_unwrap!(stream.stream_info());
            println!("{:#?}", info);
            if let Some(delay) = info.audio_delay() {
                println!("audio delay: {} ms", delay / 90);
            }
        }
        "psi" => match stream.parser() {
            MpegParser::Ts(p) => {
                println!("PAT: {:?}", p.pat());
                println!("PMT (PID={:?}): {:?}", p.pmt_pid(), p.pmt());
                println!("video: {:?}", p.video_stream());
                println!("audio: {:?}", p.audio_stream());
                println!("PCR PID: {:?}", p.pcr_pid());
            }
            MpegParser::Es(p) => {
                println!("elementary stream: frame_rate={:?}", p.frame_rate());
            }
        },
        "samples" => {
            track_try_unwrap!(stream.create_sample_list());
            for (i, s) in stream.video_samples().iter().enumerate() {
                println!(
                    "V {:>6} pos={} size={} gop={} {} tr={} pts={} dts={}{}",
                    i,
                    s.file_position,
                    s.sample_size,
                    s.gop_number,
                    s.picture_coding_type.as_char(),
                    s.temporal_reference,
                    s.pts,
                    s.dts,
                    if s.is_keyframe() { " key" } else { "" }
                );
            }
            for (i, s) in stream.audio_samples().iter().enumerate() {
                println!(
                    "A {:>6} pos={} size={} pts={} dts={}",
                    i, s.file_position, s.sample_size, s.pts, s.dts
                );
            }
            println!("total display fields: {}", stream.total_display_fields());
        }
        "gops" => {
            track_try_unwrap!(stream.create_sample_list());
            for (i, g) in stream.gops().iter().enumerate() {
                println!(
                    "GOP {:>5} closed={} progressive_sequence={}",
                    i, g.closed_gop, g.progressive_sequence
                );
            }
        }
        kind @ "video" | kind @ "audio" => {
            let kind = if kind == "video" {
                SampleKind::Video
            } else {
                SampleKind::Audio
            };
            let mode = match matches.value_of("MODE").unwrap() {
                "pes" => SampleDataMode::Pes,
                "container" => SampleDataMode::Container,
                _ => SampleDataMode::Raw,
            };
            track_try_unwrap!(stream.create_sample_list());
            let count = match kind {
                SampleKind::Video => stream.video_sample_count(),
                SampleKind::Audio => stream.audio_sample_count(),
            };
            let stdout = std::io::stdout();
            let mut stdout = stdout.lock();
            for i in 0..count {
                let data = track_try_unwrap!(stream.sample_data(kind, i, mode));
                track_try_unwrap!(stdout.write_all(&data).map_err(Failure::from_error));
            }
        }
        _ => unreachable!(),
    }
}
