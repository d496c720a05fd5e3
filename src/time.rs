//! Time-related constituent elements.
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{ErrorKind, Result};

/// Timestamp type for PTS/DTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(u64);
impl Timestamp {
    /// 90 kHz.
    pub const RESOLUTION: u64 = 90_000;

    /// Maximum timestamp value.
    pub const MAX: u64 = (1 << 33) - 1;

    /// Makes a new `Timestamp` instance.
    ///
    /// # Errors
    ///
    /// If `n` exceeds `Timestamp::MAX`, it will return an `ErrorKind::InvalidInput` error.
    pub fn new(n: u64) -> Result<Self> {
        track_assert!(n <= Self::MAX, ErrorKind::InvalidInput);
        Ok(Timestamp(n))
    }

    /// Makes a new `Timestamp` instance by discarding the bits above the 33 bit range.
    pub fn wrapping(n: u64) -> Self {
        Timestamp(n & Self::MAX)
    }

    /// Returns the value of the timestamp.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Reads a 5 byte encoded timestamp.
    ///
    /// Returns the timestamp and the 4 bit prefix (`0b0010` for PTS only, `0b0011`/`0b0001` for
    /// PTS/DTS pairs).
    pub(crate) fn read_from<R: Read>(mut reader: R) -> Result<(Self, u8)> {
        let n0 = track_io!(reader.read_u8())?;
        let n1 = track_io!(reader.read_u16::<BigEndian>())?;
        let n2 = track_io!(reader.read_u16::<BigEndian>())?;
        if n0 & 1 == 0 || n1 & 1 == 0 || n2 & 1 == 0 {
            log::trace!("Timestamp marker bits are not set: {:02x} {:04x} {:04x}", n0, n1, n2);
        }

        let prefix = n0 >> 4;
        let n = (u64::from(n0 & 0b1110) << 29) | (u64::from(n1 >> 1) << 15) | u64::from(n2 >> 1);
        Ok((Timestamp(n), prefix))
    }

    /// Writes the timestamp with the given 4 bit prefix.
    pub(crate) fn write_to<W: Write>(self, mut writer: W, prefix: u8) -> Result<()> {
        let n0 = (prefix << 4) | (((self.0 >> 30) as u8) << 1) | 1;
        let n1 = ((((self.0 >> 15) & 0x7FFF) as u16) << 1) | 1;
        let n2 = (((self.0 & 0x7FFF) as u16) << 1) | 1;
        track_io!(writer.write_u8(n0))?;
        track_io!(writer.write_u16::<BigEndian>(n1))?;
        track_io!(writer.write_u16::<BigEndian>(n2))?;
        Ok(())
    }
}
impl From<u32> for Timestamp {
    fn from(f: u32) -> Self {
        Timestamp(u64::from(f))
    }
}

/// Clock reference for PCR/OPCR.
///
/// The value is held as the raw 33 bit base (90 kHz) and 9 bit extension (27 MHz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockReference {
    base: u64,
    extension: u16,
}
impl ClockReference {
    /// 27 MHz.
    pub const RESOLUTION: u64 = 27_000_000;

    /// Makes a new `ClockReference` instance.
    ///
    /// # Errors
    ///
    /// If `base` exceeds 33 bits or `extension` is not less than 300,
    /// it will return an `ErrorKind::InvalidInput` error.
    pub fn new(base: u64, extension: u16) -> Result<Self> {
        track_assert!(base <= Timestamp::MAX, ErrorKind::InvalidInput);
        track_assert!(extension < 300, ErrorKind::InvalidInput);
        Ok(ClockReference { base, extension })
    }

    /// Returns the 33 bit base (90 kHz).
    pub fn base(self) -> u64 {
        self.base
    }

    /// Returns the 9 bit extension.
    pub fn extension(self) -> u16 {
        self.extension
    }

    /// Returns the value in 27 MHz ticks (`base * 300 + extension`).
    pub fn as_27mhz(self) -> u64 {
        self.base * 300 + u64::from(self.extension)
    }

    /// Returns the value in 90 kHz ticks, comparable with PTS/DTS values.
    pub fn as_90khz(self) -> u64 {
        self.base + u64::from(self.extension) / 300
    }

    /// Reads a 6 byte encoded clock reference.
    pub(crate) fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let n = track_io!(reader.read_uint::<BigEndian>(6))?;
        let base = n >> 15;
        let extension = (n & 0x1FF) as u16;
        Ok(ClockReference { base, extension })
    }
}

/// Half of the 33 bit timestamp space.
///
/// A timestamp that goes backwards further than this is regarded as a wraparound.
pub const WRAPAROUND_THRESHOLD: u64 = 1 << 32;

/// Extends 33 bit timestamps of a single stream into a monotonic 64 bit timeline.
///
/// Each time a timestamp falls below the high-water mark by more than
/// [`WRAPAROUND_THRESHOLD`], the wraparound counter is incremented and all subsequent
/// timestamps are offset by `counter * 2^33`.
#[derive(Debug, Default, Clone)]
pub struct WrapAroundCorrector {
    high_water: Option<u64>,
    wraps: u64,
}
impl WrapAroundCorrector {
    /// Makes a new `WrapAroundCorrector` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of wraparounds detected so far.
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Corrects `timestamp` (a 33 bit value).
    pub fn correct(&mut self, timestamp: u64) -> u64 {
        let timestamp = timestamp & Timestamp::MAX;
        let high_water = match self.high_water {
            None => {
                self.high_water = Some(timestamp);
                return timestamp;
            }
            Some(h) => h,
        };

        if timestamp < high_water && high_water - timestamp > WRAPAROUND_THRESHOLD {
            self.wraps += 1;
            self.high_water = Some(timestamp);
        } else if timestamp > high_water && timestamp - high_water > WRAPAROUND_THRESHOLD {
            // A late value from before the most recent wraparound (e.g., a reordered B-picture)
            if self.wraps > 0 {
                return (self.wraps - 1) * (Timestamp::MAX + 1) + timestamp;
            }
            self.high_water = Some(timestamp);
        } else if timestamp > high_water {
            self.high_water = Some(timestamp);
        }
        self.wraps * (Timestamp::MAX + 1) + timestamp
    }
}
