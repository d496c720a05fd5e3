use crate::es::stream_id::is_pes_start_code;
use crate::pes::PesHeader;
use crate::{ErrorKind, Result};

/// Reassembles a PES header whose bytes are split across several TS packet payloads.
///
/// Only the leading bytes needed to decode the header (up to and including the PTS/DTS fields)
/// are buffered.
#[derive(Debug, Default)]
pub struct PesHeaderAssembler {
    buf: Vec<u8>,
}
impl PesHeaderAssembler {
    /// Makes a new `PesHeaderAssembler` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Returns the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Appends the payload of the next packet of the PES.
    ///
    /// Returns the header once enough bytes have been pushed, or `None` if more are needed.
    ///
    /// # Errors
    ///
    /// If the buffered bytes do not start with a PES start code, or `PES_packet_length` is
    /// shorter than the optional header, it will return an `ErrorKind::InvalidInput` error.
    pub fn push(&mut self, payload: &[u8]) -> Result<Option<PesHeader>> {
        let needed = PesHeader::required_len(&self.buf).unwrap_or(PesHeader::FLAGS_LEN);
        let take = needed.saturating_sub(self.buf.len()).min(payload.len());
        self.buf.extend_from_slice(&payload[..take]);
        if self.buf.len() >= 4 {
            track_assert!(
                is_pes_start_code(&self.buf),
                ErrorKind::InvalidInput,
                "Not a PES start code: {:02x?}",
                &self.buf[..4]
            );
        }

        match PesHeader::required_len(&self.buf) {
            None => return Ok(None),
            Some(required) if required > self.buf.len() => {
                // The flags are known now, so the rest of this payload may still be needed
                let rest = &payload[take..];
                let more = (required - self.buf.len()).min(rest.len());
                self.buf.extend_from_slice(&rest[..more]);
                if self.buf.len() < required {
                    return Ok(None);
                }
            }
            Some(_) => {}
        }

        let header = track!(PesHeader::decode(&self.buf))?;
        let optional_header_len = header.optional_header_len();
        track_assert!(
            header.packet_len == 0 || header.packet_len >= optional_header_len,
            ErrorKind::InvalidInput,
            "pes.packet_len={}, optional_header_len={}",
            header.packet_len,
            optional_header_len
        );
        self.buf.clear();
        Ok(Some(header))
    }
}
