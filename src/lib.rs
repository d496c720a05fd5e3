//! MPEG-2 TS and MPEG video elementary stream sample indexer.
//!
//! This crate scans MPEG-2 transport streams and raw MPEG-1/2 video elementary streams,
//! and builds a random-accessible, timestamp-ordered index of the video and audio samples
//! they contain (file position, size, PTS/DTS corrected for 33-bit wraparound, GOP and
//! picture flags).
//!
//! # Examples
//!
//! ```no_run
//! # extern crate mpeg2index;
//! use mpeg2index::{MpegStream, ParserOptions, SampleDataMode};
//!
//! # fn main() -> mpeg2index::Result<()> {
//! let mut stream = MpegStream::open("input.ts", ParserOptions::default())?;
//! stream.create_sample_list()?;
//! for i in 0..stream.video_sample_count() {
//!     let sample = stream.video_sample(i).unwrap();
//!     println!("{} {:?} pts={}", i, sample.picture_coding_type, sample.pts);
//! }
//! let first_frame = stream.video_sample_data(0, SampleDataMode::Raw)?;
//! # let _ = first_frame;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - ISO/IEC 13818-1 (MPEG-2 Systems)
//! - ISO/IEC 13818-2 (MPEG-2 Video)
#![warn(missing_docs)]
extern crate bitstream_io;
extern crate byteorder;
extern crate crc;
extern crate log;
#[macro_use]
extern crate trackable;

pub use error::{Error, ErrorKind};
pub use logging::LogLevel;
pub use options::ParserOptions;
pub use parser::{MpegParser, StreamFormat};
pub use sample::{
    AudioSample, AudioSampleInfo, GopRecord, PictureCodingType, PictureStructure, SampleDataMode,
    SampleKind, VideoSample, VideoSampleInfo,
};
pub use stream::{MpegStream, StreamInfo};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

#[macro_use]
mod logging;

pub mod es;
pub mod parser;
pub mod pes;
pub mod sample;
pub mod stream;
pub mod time;
pub mod ts;

mod error;
mod options;

/// This crate specific `Result` type.
pub type Result<T> = std::result::Result<T, Error>;
