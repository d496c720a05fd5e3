//! Packetized elementary stream.
//!
//! # References
//!
//! - [Packetized elementary stream](https://en.wikipedia.org/wiki/Packetized_elementary_stream)
pub use self::assembler::PesHeaderAssembler;
pub use self::packet::PesHeader;

pub(crate) use self::packet::read_pes_header;

mod assembler;
mod packet;
