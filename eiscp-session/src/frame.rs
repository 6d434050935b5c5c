//! eISCP frame envelope
//!
//! Every message on the wire is a 16-byte header followed by the payload:
//!
//! ```text
//! +--------+--------------+--------------+---------+----------+
//! | "ISCP" | header size  | data size    | version | reserved |
//! | 4      | u32 BE (=16) | u32 BE       | 1       | 3        |
//! +--------+--------------+--------------+---------+----------+
//! | payload: "!1PWR01" + terminator                            |
//! +------------------------------------------------------------+
//! ```
//!
//! The version and reserved bytes come from the receiver model profile and are
//! copied verbatim into outbound headers.

use crate::model::ModelProfile;
use eiscp_core::{Command, EiscpError, EiscpResult};
use std::fmt;

/// Magic marker opening every frame
pub const MAGIC: &[u8; 4] = b"ISCP";

/// Length of the frame header
pub const HEADER_LENGTH: usize = 16;

/// Bytes receivers append after the command text
const TERMINATORS: &[char] = &['\x1a', '\r', '\n'];

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    header_length: u32,
    data_length: u32,
    version: u8,
    reserved: [u8; 3],
}

impl FrameHeader {
    /// Decode a header from the start of `data`
    ///
    /// Only the fixed fields are checked here; whether the declared lengths fit
    /// the buffer is up to the caller.
    pub fn decode(data: &[u8]) -> EiscpResult<Self> {
        if data.len() < HEADER_LENGTH {
            return Err(EiscpError::FrameInvalid(format!(
                "Header too short: expected {}, got {}",
                HEADER_LENGTH,
                data.len()
            )));
        }
        if &data[..4] != MAGIC {
            return Err(EiscpError::FrameInvalid(format!(
                "Bad magic: {:02X?}",
                &data[..4]
            )));
        }

        let header_length = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if (header_length as usize) < HEADER_LENGTH {
            return Err(EiscpError::FrameInvalid(format!(
                "Declared header length {} is below {}",
                header_length, HEADER_LENGTH
            )));
        }
        let data_length = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        Ok(Self {
            header_length,
            data_length,
            version: data[12],
            reserved: [data[13], data[14], data[15]],
        })
    }

    /// Total frame length declared by this header, None on overflow
    pub fn frame_length(&self) -> Option<usize> {
        (self.header_length as usize).checked_add(self.data_length as usize)
    }

    pub fn header_length(&self) -> usize {
        self.header_length as usize
    }

    pub fn data_length(&self) -> usize {
        self.data_length as usize
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn reserved(&self) -> [u8; 3] {
        self.reserved
    }
}

/// A complete eISCP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    message: String,
}

impl Frame {
    /// Encode a command into a wire frame
    pub fn encode(command: &Command, model: &ModelProfile) -> Vec<u8> {
        let mut payload = command.to_payload().into_bytes();
        payload.extend_from_slice(model.terminator());

        let mut result = Vec::with_capacity(HEADER_LENGTH + payload.len());
        result.extend_from_slice(MAGIC);
        result.extend_from_slice(&(HEADER_LENGTH as u32).to_be_bytes());
        result.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        result.extend_from_slice(model.header_tail());
        result.extend_from_slice(&payload);
        result
    }

    /// Decode one frame from the start of `data`
    ///
    /// Never panics on malformed input. Any envelope or payload problem is
    /// reported as `FrameInvalid` and the frame should be discarded.
    pub fn decode(data: &[u8]) -> EiscpResult<Self> {
        let header = FrameHeader::decode(data)?;
        let end = header
            .frame_length()
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                EiscpError::FrameInvalid(format!(
                    "Declared length {}+{} exceeds {} available bytes",
                    header.header_length,
                    header.data_length,
                    data.len()
                ))
            })?;

        let payload = &data[header.header_length()..end];
        let message = String::from_utf8_lossy(payload)
            .trim_end_matches(TERMINATORS)
            .to_string();

        // Validate the command shape up front so callers only see usable frames.
        Command::parse(&message).map_err(|e| EiscpError::FrameInvalid(e.to_string()))?;

        Ok(Self { header, message })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Payload text with terminators removed
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Command carried by this frame
    pub fn command(&self) -> EiscpResult<Command> {
        Command::parse(&self.message)
    }

    /// Frame length on the wire
    pub fn length(&self) -> usize {
        self.header.header_length() + self.header.data_length()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "eISCP Frame: v{}, len={}, message={}",
            self.header.version,
            self.length(),
            self.message
        )
    }
}
