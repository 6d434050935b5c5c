//! eISCP stream decoder
//!
//! TCP gives no guarantee that one read holds exactly one frame. Bytes are
//! accumulated here and frames are split off by their declared length, so a
//! frame spread over several reads, or several frames in one read, decode the
//! same way.

use crate::frame::{Frame, FrameHeader, HEADER_LENGTH, MAGIC};
use bytes::{Buf, BytesMut};
use eiscp_core::{EiscpError, EiscpResult};

/// Largest payload accepted before a header is treated as corrupt
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Reassembles frames from a byte stream
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            max_payload,
        }
    }

    /// Append bytes received from the stream
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Take the next item from the buffer
    ///
    /// # Returns
    /// - `None` when more bytes are needed
    /// - `Some(Ok(frame))` for a complete, valid frame
    /// - `Some(Err(_))` when bytes were discarded (garbage before a magic
    ///   marker, an impossible header, or an invalid payload). Decoding can
    ///   continue with the next call.
    pub fn decode_next(&mut self) -> Option<EiscpResult<Frame>> {
        match find_magic(&self.buffer) {
            Some(0) => {}
            Some(pos) => {
                self.buffer.advance(pos);
                return Some(Err(EiscpError::FrameInvalid(format!(
                    "Skipped {} bytes before frame marker",
                    pos
                ))));
            }
            None => {
                // Keep a possible partial marker at the tail.
                let keep = MAGIC.len() - 1;
                if self.buffer.len() > keep {
                    let skipped = self.buffer.len() - keep;
                    self.buffer.advance(skipped);
                    return Some(Err(EiscpError::FrameInvalid(format!(
                        "Skipped {} bytes without frame marker",
                        skipped
                    ))));
                }
                return None;
            }
        }

        if self.buffer.len() < HEADER_LENGTH {
            return None;
        }

        let header = match FrameHeader::decode(&self.buffer[..HEADER_LENGTH]) {
            Ok(header) if header.data_length() <= self.max_payload => header,
            Ok(header) => {
                self.buffer.advance(MAGIC.len());
                return Some(Err(EiscpError::FrameInvalid(format!(
                    "Declared payload length {} exceeds limit {}",
                    header.data_length(),
                    self.max_payload
                ))));
            }
            Err(e) => {
                self.buffer.advance(MAGIC.len());
                return Some(Err(e));
            }
        };

        let total = match header.frame_length() {
            Some(total) if header.header_length() <= HEADER_LENGTH + self.max_payload => total,
            _ => {
                self.buffer.advance(MAGIC.len());
                return Some(Err(EiscpError::FrameInvalid(format!(
                    "Declared header length {} is not plausible",
                    header.header_length()
                ))));
            }
        };
        if self.buffer.len() < total {
            return None;
        }

        let raw = self.buffer.split_to(total);
        Some(Frame::decode(&raw))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(MAGIC.len()).position(|window| window == MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelProfile;
    use eiscp_core::{Command, PropertyCode};

    fn encoded(code: &str, value: &str) -> Vec<u8> {
        let cmd = Command::assign(PropertyCode::new(code).unwrap(), value).unwrap();
        Frame::encode(&cmd, &ModelProfile::default())
    }

    fn drain(decoder: &mut FrameDecoder) -> (Vec<String>, usize) {
        let mut frames = Vec::new();
        let mut rejected = 0;
        while let Some(item) = decoder.decode_next() {
            match item {
                Ok(frame) => frames.push(frame.message().to_string()),
                Err(_) => rejected += 1,
            }
        }
        (frames, rejected)
    }

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&encoded("PWR", "01"));
        assert_eq!(drain(&mut decoder), (vec!["!1PWR01".to_string()], 0));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_split_across_reads() {
        let data = encoded("MVL", "2A");
        let mut decoder = FrameDecoder::new();
        for chunk in data.chunks(3) {
            let (frames, rejected) = drain(&mut decoder);
            assert!(frames.is_empty());
            assert_eq!(rejected, 0);
            decoder.extend(chunk);
        }
        assert_eq!(drain(&mut decoder), (vec!["!1MVL2A".to_string()], 0));
    }

    #[test]
    fn test_coalesced_frames() {
        let mut data = encoded("PWR", "01");
        data.extend(encoded("MVL", "20"));
        data.extend(encoded("SLI", "10"));
        let mut decoder = FrameDecoder::new();
        decoder.extend(&data);
        let (frames, rejected) = drain(&mut decoder);
        assert_eq!(frames, vec!["!1PWR01", "!1MVL20", "!1SLI10"]);
        assert_eq!(rejected, 0);
    }

    #[test]
    fn test_garbage_before_frame() {
        let mut data = b"noise\x00\x01".to_vec();
        data.extend(encoded("PWR", "00"));
        let mut decoder = FrameDecoder::new();
        decoder.extend(&data);
        let (frames, rejected) = drain(&mut decoder);
        assert_eq!(frames, vec!["!1PWR00"]);
        assert_eq!(rejected, 1);
    }

    #[test]
    fn test_partial_magic_kept() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"xxxxISC");
        let (frames, rejected) = drain(&mut decoder);
        assert!(frames.is_empty());
        assert_eq!(rejected, 1);
        assert_eq!(decoder.buffered(), 3);

        let data = encoded("PWR", "01");
        decoder.clear();
        decoder.extend(&data[..3]);
        assert!(decoder.decode_next().is_none());
        decoder.extend(&data[3..]);
        assert_eq!(drain(&mut decoder), (vec!["!1PWR01".to_string()], 0));
    }

    #[test]
    fn test_oversized_header_resyncs() {
        let mut bogus = encoded("PWR", "01");
        bogus[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut data = bogus;
        data.extend(encoded("MVL", "30"));

        let mut decoder = FrameDecoder::with_max_payload(1024);
        decoder.extend(&data);
        let (frames, rejected) = drain(&mut decoder);
        assert_eq!(frames, vec!["!1MVL30"]);
        assert!(rejected >= 1);
    }

    #[test]
    fn test_invalid_payload_is_skipped() {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&[0x01, 0, 0, 0]);
        data.extend_from_slice(b"???");
        data.extend(encoded("PWR", "01"));

        let mut decoder = FrameDecoder::new();
        decoder.extend(&data);
        let (frames, rejected) = drain(&mut decoder);
        assert_eq!(frames, vec!["!1PWR01"]);
        assert_eq!(rejected, 1);
    }
}
