//! Transport stream.
//!
//! # References
//!
//! - [MPEG transport stream](https://en.wikipedia.org/wiki/MPEG_transport_stream)
pub use self::packet::{
    AdaptationField, AdaptationFieldControl, PacketFormat, Pid, TsHeader, TsPacket,
};
pub use self::parser::TsParser;
pub use self::reader::{detect_packet_format, ReadTsPacket, TsPacketReader, SYNC_CONFIRMATIONS};

pub mod psi;

mod packet;
mod parser;
mod reader;
