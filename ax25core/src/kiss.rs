//! KISS framing between the host and the TNC.
//!
//! KISS carries raw AX.25 frames with FEND delimiters, a one-byte
//! port/command header and byte stuffing for the two reserved values.

use crate::frame::MAX_AX25_LEN;

const FEND: u8 = 0xC0;
const FESC: u8 = 0xDB;
const TFEND: u8 = 0xDC;
const TFESC: u8 = 0xDD;

/// The TNC port all outbound traffic is sent on.
pub const DEFAULT_PORT: u8 = 0;

/// Maximum size of any KISS frame this implementation will produce or accept.
///
/// The largest AX.25 frame we handle is `MAX_AX25_LEN` (328) octets. In the
/// worst case every octet is FEND or FESC and doubles when escaped, so the
/// payload may occupy 656 octets on the wire. Add a FEND at each end and the
/// header byte for 659.
pub const MAX_FRAME_LEN: usize = MAX_AX25_LEN * 2 + 3;

/// Holder for a single KISS frame.
///
/// `data` and `len` are exposed directly so received data may be streamed
/// into a pre-allocated `KissFrame`.
pub struct KissFrame {
    pub data: [u8; MAX_FRAME_LEN],
    pub len: usize,
}

impl KissFrame {
    pub fn new_empty() -> Self {
        KissFrame {
            data: [0u8; MAX_FRAME_LEN],
            len: 0,
        }
    }

    /// Wrap a raw AX.25 frame for transmission on port 0 as a data frame.
    pub fn new_data_frame(payload: &[u8]) -> Result<Self, KissError> {
        if payload.len() > MAX_AX25_LEN {
            return Err(KissError::PayloadTooBig);
        }
        let mut data = [0u8; MAX_FRAME_LEN];
        let mut i = 0;
        push(&mut data, &mut i, FEND);
        push(
            &mut data,
            &mut i,
            kiss_header(DEFAULT_PORT, KissCommand::DataFrame.proto_value()),
        );
        i += escape(payload, &mut data[i..]);
        push(&mut data, &mut i, FEND);

        Ok(KissFrame { data, len: i })
    }

    /// Return this frame's KISS command type.
    pub fn command(&self) -> Result<KissCommand, KissError> {
        KissCommand::from_proto(self.header_byte()? & 0x0f)
    }

    /// Return the TNC port this frame relates to.
    pub fn port(&self) -> Result<u8, KissError> {
        Ok(self.header_byte()? >> 4)
    }

    /// Payload part of the frame between the header byte and the trailing FEND, unescaped.
    pub fn decode_payload(&self, out: &mut [u8]) -> Result<usize, KissError> {
        let start = self
            .data
            .iter()
            .enumerate()
            .skip_while(|(_, b)| **b == FEND)
            .nth(1)
            .ok_or(KissError::MalformedKissFrame)?
            .0;
        let end = self.data[start..]
            .iter()
            .enumerate()
            .find(|(_, b)| **b == FEND)
            .ok_or(KissError::MalformedKissFrame)?
            .0
            + start;
        Ok(unescape(&self.data[start..end], out))
    }

    /// Borrow the frame as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Return the header byte of the KISS frame, skipping over 0 or more prepended FENDs.
    fn header_byte(&self) -> Result<u8, KissError> {
        self.data
            .iter()
            .find(|b| **b != FEND)
            .cloned()
            .ok_or(KissError::MalformedKissFrame)
    }
}

/// Rolling receive buffer which handles KISS data arriving in arbitrary chunks.
///
/// TCP reads may split a frame anywhere. Write whatever bytes are available
/// into `buf_remaining()`, confirm with `did_write()`, then call
/// `next_frame()` until it returns `None`.
pub struct KissBuffer {
    buf: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl KissBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0u8; MAX_FRAME_LEN],
            len: 0,
        }
    }

    /// Space available for more received bytes.
    pub fn buf_remaining(&mut self) -> &mut [u8] {
        if self.len == self.buf.len() {
            // A filled buffer with no frame boundary cannot be a valid frame.
            // Discard it so the reader always makes progress.
            self.len = 0;
        }
        &mut self.buf[self.len..]
    }

    /// Record how many bytes were appended via `buf_remaining()`.
    pub fn did_write(&mut self, n: usize) {
        self.len += n;
    }

    /// Extract the next complete frame, if a terminating FEND has arrived.
    ///
    /// Back-to-back FENDs (empty frames) are skipped silently.
    pub fn next_frame(&mut self) -> Option<KissFrame> {
        loop {
            let mut start = 0;
            while start < self.len && self.buf[start] == FEND {
                start += 1;
            }
            let mut end = start;
            while end < self.len && self.buf[end] != FEND {
                end += 1;
            }
            if end == self.len {
                // no terminating FEND yet; drop the FENDs we skipped
                if start > 0 {
                    self.buf.copy_within(start..self.len, 0);
                    self.len -= start;
                }
                return None;
            }
            let content_len = end - start;
            // retain the trailing FEND; it also opens the next frame
            let consumed = end;
            if content_len + 2 > MAX_FRAME_LEN {
                self.buf.copy_within(consumed..self.len, 0);
                self.len -= consumed;
                log::debug!("discarding oversized KISS frame ({} octets)", content_len);
                continue;
            }
            let mut frame = KissFrame::new_empty();
            frame.data[0] = FEND;
            frame.data[1..1 + content_len].copy_from_slice(&self.buf[start..end]);
            frame.data[1 + content_len] = FEND;
            frame.len = content_len + 2;
            self.buf.copy_within(consumed..self.len, 0);
            self.len -= consumed;
            return Some(frame);
        }
    }
}

impl Default for KissBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn kiss_header(port: u8, command: u8) -> u8 {
    (port << 4) | (command & 0x0f)
}

fn push(data: &mut [u8], idx: &mut usize, value: u8) {
    data[*idx] = value;
    *idx += 1;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KissCommand {
    DataFrame,
    TxDelay,
    Persistence,
    SlotTime,
    TxTail,
    FullDuplex,
    SetHardware,
}

impl KissCommand {
    fn from_proto(value: u8) -> Result<Self, KissError> {
        Ok(match value {
            0 => KissCommand::DataFrame,
            1 => KissCommand::TxDelay,
            2 => KissCommand::Persistence,
            3 => KissCommand::SlotTime,
            4 => KissCommand::TxTail,
            5 => KissCommand::FullDuplex,
            6 => KissCommand::SetHardware,
            _ => return Err(KissError::UnsupportedKissCommand),
        })
    }

    fn proto_value(&self) -> u8 {
        match self {
            KissCommand::DataFrame => 0,
            KissCommand::TxDelay => 1,
            KissCommand::Persistence => 2,
            KissCommand::SlotTime => 3,
            KissCommand::TxTail => 4,
            KissCommand::FullDuplex => 5,
            KissCommand::SetHardware => 6,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KissError {
    MalformedKissFrame,
    UnsupportedKissCommand,
    PayloadTooBig,
}

fn escape(src: &[u8], dst: &mut [u8]) -> usize {
    let mut i = 0;
    let mut j = 0;
    while i < src.len() && j < dst.len() {
        if src[i] == FEND {
            dst[j] = FESC;
            j += 1;
            dst[j] = TFEND;
        } else if src[i] == FESC {
            dst[j] = FESC;
            j += 1;
            dst[j] = TFESC;
        } else {
            dst[j] = src[i];
        }
        i += 1;
        j += 1;
    }
    j
}

fn unescape(src: &[u8], dst: &mut [u8]) -> usize {
    let mut i = 0;
    let mut j = 0;
    while i < src.len() && j < dst.len() {
        if src[i] == FESC {
            if i == src.len() - 1 {
                break;
            }
            i += 1;
            if src[i] == TFEND {
                dst[j] = FEND;
            } else if src[i] == TFESC {
                dst[j] = FESC;
            }
        } else {
            dst[j] = src[i];
        }
        i += 1;
        j += 1;
    }
    j
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        let mut buf = [0u8; 1024];

        let src = [0, 1, 2, 3, 4, 5];
        let n = escape(&src, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(&buf[0..6], src);

        let src = [0, 1, TFESC, 3, TFEND, 5];
        let n = escape(&src, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(&buf[0..6], src);

        let src = [0, 1, FEND, 3, 4, 5];
        let n = escape(&src, &mut buf);
        assert_eq!(n, 7);
        assert_eq!(&buf[0..7], &[0, 1, FESC, TFEND, 3, 4, 5]);

        let src = [0, 1, 2, 3, 4, FESC];
        let n = escape(&src, &mut buf);
        assert_eq!(n, 7);
        assert_eq!(&buf[0..7], &[0, 1, 2, 3, 4, FESC, TFESC]);
    }

    #[test]
    fn test_unescape() {
        let mut buf = [0u8; 1024];

        let src = [0, 1, 2, 3, 4, 5];
        let n = unescape(&src, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(&buf[0..6], src);

        let src = [0, 1, FESC, TFEND, 3, 4, 5];
        let n = unescape(&src, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(&buf[0..6], &[0, 1, FEND, 3, 4, 5]);

        let src = [0, 1, 2, 3, 4, FESC, TFESC];
        let n = unescape(&src, &mut buf);
        assert_eq!(n, 6);
        assert_eq!(&buf[0..6], &[0, 1, 2, 3, 4, FESC]);
    }

    #[test]
    fn data_frame_roundtrip() {
        let f = KissFrame::new_data_frame(&[0, 1, 2, 3]).unwrap();
        assert_eq!(f.as_bytes(), &[FEND, 0, 0, 1, 2, 3, FEND]);
        assert_eq!(f.command(), Ok(KissCommand::DataFrame));
        assert_eq!(f.port(), Ok(0));
        let mut buf = [0u8; 1024];
        let n = f.decode_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0, 1, 2, 3]);
    }

    #[test]
    fn data_frame_roundtrip_with_reserved_bytes() {
        let payload = [0x10, FEND, 0x20, FESC, FEND];
        let f = KissFrame::new_data_frame(&payload).unwrap();
        let mut buf = [0u8; 1024];
        let n = f.decode_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], &payload);
    }

    #[test]
    fn deframe_across_partial_reads() {
        let f = KissFrame::new_data_frame(&[0xAA, FEND, 0xBB]).unwrap();
        let wire = f.as_bytes();
        let mut buffer = KissBuffer::new();

        // deliver one byte at a time, as a pathological TCP might
        for (i, b) in wire.iter().enumerate() {
            buffer.buf_remaining()[0] = *b;
            buffer.did_write(1);
            if i < wire.len() - 1 {
                assert!(buffer.next_frame().is_none());
            }
        }
        let got = buffer.next_frame().expect("frame after final FEND");
        let mut payload = [0u8; 16];
        let n = got.decode_payload(&mut payload).unwrap();
        assert_eq!(&payload[..n], &[0xAA, FEND, 0xBB]);
    }

    #[test]
    fn deframe_two_frames_one_chunk() {
        let f1 = KissFrame::new_data_frame(&[1, 2]).unwrap();
        let f2 = KissFrame::new_data_frame(&[3, 4]).unwrap();
        let mut buffer = KissBuffer::new();
        let space = buffer.buf_remaining();
        let n1 = f1.as_bytes().len();
        let n2 = f2.as_bytes().len();
        space[..n1].copy_from_slice(f1.as_bytes());
        space[n1..n1 + n2].copy_from_slice(f2.as_bytes());
        buffer.did_write(n1 + n2);

        let mut payload = [0u8; 16];
        let got = buffer.next_frame().unwrap();
        let n = got.decode_payload(&mut payload).unwrap();
        assert_eq!(&payload[..n], &[1, 2]);
        let got = buffer.next_frame().unwrap();
        let n = got.decode_payload(&mut payload).unwrap();
        assert_eq!(&payload[..n], &[3, 4]);
        assert!(buffer.next_frame().is_none());
    }

    #[test]
    fn empty_frames_are_dropped() {
        let mut buffer = KissBuffer::new();
        let bytes = [FEND, FEND, FEND, 0x00, 0x42, FEND];
        buffer.buf_remaining()[..bytes.len()].copy_from_slice(&bytes);
        buffer.did_write(bytes.len());
        let got = buffer.next_frame().unwrap();
        let mut payload = [0u8; 16];
        let n = got.decode_payload(&mut payload).unwrap();
        assert_eq!(&payload[..n], &[0x42]);
        assert!(buffer.next_frame().is_none());
    }

    #[test]
    fn control_commands_recognized() {
        // SET_HARDWARE from the TNC should parse so the host can skip it
        let mut buffer = KissBuffer::new();
        let bytes = [FEND, 0x06, 0x01, 0x02, FEND];
        buffer.buf_remaining()[..bytes.len()].copy_from_slice(&bytes);
        buffer.did_write(bytes.len());
        let got = buffer.next_frame().unwrap();
        assert_eq!(got.command(), Ok(KissCommand::SetHardware));
    }
}
