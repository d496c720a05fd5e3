use log::Level;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

use crate::logging::LogLevel;
use crate::ts::{PacketFormat, TsHeader, TsPacket};
use crate::{ErrorKind, Result};

/// Number of consecutive sync bytes required by packet format autodetection.
pub const SYNC_CONFIRMATIONS: usize = 8;

const DETECTION_WINDOW: usize = 204 * (SYNC_CONFIRMATIONS + 1);

/// The `ReadTsPacket` trait allows for reading TS packets from a source.
pub trait ReadTsPacket {
    /// Reads a TS packet.
    ///
    /// If the end of the stream is reached, it will return `Ok(None)`.
    fn read_ts_packet(&mut self) -> Result<Option<TsPacket>>;

    /// Pushes `packet` back so that the next `read_ts_packet` call returns it again.
    fn unread_ts_packet(&mut self, packet: TsPacket);

    /// Reads the next packet with the given PID.
    fn next_packet(&mut self, pid: u16) -> Result<Option<TsPacket>> {
        loop {
            match track!(self.read_ts_packet())? {
                None => return Ok(None),
                Some(packet) if packet.pid() == pid => return Ok(Some(packet)),
                Some(_) => {}
            }
        }
    }

    /// Reads the next packet with the given PID that starts a payload unit.
    fn next_unit_start(&mut self, pid: u16) -> Result<Option<TsPacket>> {
        loop {
            match track!(self.next_packet(pid))? {
                None => return Ok(None),
                Some(packet) if packet.header.payload_unit_start_indicator => {
                    return Ok(Some(packet))
                }
                Some(_) => {}
            }
        }
    }
}

/// Detects the packet format of `stream` and the offset of its first packet.
///
/// Each format is tried in the order of `PacketFormat::ALL`: a format matches at an offset if
/// the sync byte recurs at the format's stride for `SYNC_CONFIRMATIONS` consecutive packets
/// (or for every packet in a shorter stream, at least two).
/// The stream is rewound to its beginning afterwards.
///
/// # Errors
///
/// If no format matches, it will return an `ErrorKind::FormatMismatch` error.
pub fn detect_packet_format<R: Read + Seek>(stream: &mut R) -> Result<(PacketFormat, u64)> {
    track_io!(stream.seek(SeekFrom::Start(0)))?;
    let mut buf = Vec::with_capacity(DETECTION_WINDOW);
    track_io!(stream.by_ref().take(DETECTION_WINDOW as u64).read_to_end(&mut buf))?;
    track_io!(stream.seek(SeekFrom::Start(0)))?;

    for &format in PacketFormat::ALL.iter() {
        let size = format.size();
        for offset in 0..size {
            let sync_position = offset + format.sync_offset();
            let available = if buf.len() > sync_position {
                (buf.len() - sync_position + size - TsPacket::SIZE) / size
            } else {
                0
            };
            let required = available.min(SYNC_CONFIRMATIONS);
            if required < 2 {
                continue;
            }
            if (0..required).all(|i| buf[sync_position + i * size] == TsHeader::SYNC_BYTE) {
                return Ok((format, offset as u64));
            }
        }
    }
    track_panic!(ErrorKind::FormatMismatch, "No stable TS sync framing");
}

/// TS packet reader.
///
/// Reads stride units of the detected packet format from a seekable byte stream.
/// Units whose sync byte is missing trigger a resynchronization; packets that fail to decode
/// are dropped.
#[derive(Debug)]
pub struct TsPacketReader<R> {
    peeked_packet: Option<TsPacket>,
    stream: BufReader<R>,
    format: PacketFormat,
    position: u64,
    unit: Vec<u8>,
    log: LogLevel,
}
impl<R: Read + Seek> TsPacketReader<R> {
    /// Makes a new `TsPacketReader` instance positioned at `offset`.
    pub fn new(stream: R, format: PacketFormat, offset: u64, log: LogLevel) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        track_io!(stream.seek(SeekFrom::Start(offset)))?;
        Ok(TsPacketReader {
            peeked_packet: None,
            stream,
            format,
            position: offset,
            unit: Vec::with_capacity(format.size()),
            log,
        })
    }

    /// Returns the packet format.
    pub fn format(&self) -> PacketFormat {
        self.format
    }

    /// Returns the position of the next packet.
    pub fn position(&self) -> u64 {
        self.peeked_packet
            .as_ref()
            .map_or(self.position, |p| p.position)
    }

    /// Moves the read position to `position`, which should be the start of a stride unit.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.peeked_packet = None;
        if position != self.position {
            track_io!(self.stream.seek(SeekFrom::Start(position)))?;
            self.position = position;
        }
        Ok(())
    }

    /// Returns the whole stride unit (including a timestamp prefix or FEC trailer)
    /// of the packet most recently read.
    pub fn last_unit(&self) -> &[u8] {
        &self.unit
    }

    fn read_unit(&mut self) -> Result<bool> {
        let size = self.format.size();
        self.unit.clear();
        let n = track_io!(self.stream.by_ref().take(size as u64).read_to_end(&mut self.unit))?;
        self.position += n as u64;
        if n < size {
            if n != 0 {
                mpeg_log!(self.log, Level::Debug, "Truncated packet at the end: {} bytes", n);
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn resync(&mut self, unit_position: u64) -> Result<bool> {
        let sync_offset = self.format.sync_offset() as u64;
        let mut position = unit_position + sync_offset + 1;
        track_io!(self.stream.seek(SeekFrom::Start(position)))?;
        loop {
            let (consumed, found) = {
                let buf = track_io!(self.stream.fill_buf())?;
                if buf.is_empty() {
                    self.position = position;
                    return Ok(false);
                }
                match buf.iter().position(|&b| b == TsHeader::SYNC_BYTE) {
                    Some(i) => (i, true),
                    None => (buf.len(), false),
                }
            };
            self.stream.consume(consumed);
            position += consumed as u64;
            if found && position >= sync_offset {
                let next = position - sync_offset;
                track_io!(self.stream.seek(SeekFrom::Start(next)))?;
                self.position = next;
                mpeg_log!(
                    self.log,
                    Level::Warn,
                    "Lost sync at {}, resynchronized at {}",
                    unit_position,
                    next
                );
                return Ok(true);
            }
            if found {
                self.stream.consume(1);
                position += 1;
            }
        }
    }

    fn read_next_packet(&mut self) -> Result<Option<TsPacket>> {
        loop {
            let unit_position = self.position;
            if !track!(self.read_unit())? {
                return Ok(None);
            }

            let sync_offset = self.format.sync_offset();
            if self.unit[sync_offset] != TsHeader::SYNC_BYTE {
                if !track!(self.resync(unit_position))? {
                    return Ok(None);
                }
                continue;
            }

            let bytes = &self.unit[sync_offset..sync_offset + TsPacket::SIZE];
            match TsPacket::decode(bytes, unit_position) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => {
                    mpeg_log!(self.log, Level::Trace, "Dropped packet: {:?}", e);
                }
            }
        }
    }
}
impl<R: Read + Seek> ReadTsPacket for TsPacketReader<R> {
    fn read_ts_packet(&mut self) -> Result<Option<TsPacket>> {
        if let Some(packet) = self.peeked_packet.take() {
            return Ok(Some(packet));
        }
        track!(self.read_next_packet())
    }

    fn unread_ts_packet(&mut self, packet: TsPacket) {
        self.peeked_packet = Some(packet);
    }
}
