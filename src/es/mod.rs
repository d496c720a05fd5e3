//! Elementary stream level components.
//!
//! Stream identifiers, MPEG video start codes and headers, and the parser for raw
//! MPEG-1/2 video elementary streams.
//!
//! # References
//!
//! - [Elementary stream](https://en.wikipedia.org/wiki/Elementary_stream)
pub use self::parser::EsParser;
pub use self::start_code::{check_video_start_code, ExtensionId, VideoStartCode};
pub use self::stream_id::{check_pes_start_code, PesStreamKind, StreamId};

pub mod start_code;
pub mod stream_id;
pub mod video;

mod parser;
