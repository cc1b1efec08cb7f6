//! AX.25 v2.x frame codec (modulo-8).
//!
//! A frame is an address chain (destination, source, up to eight
//! digipeaters), one control octet, an optional PID and an optional
//! information field. The three control formats are distinguished by the low
//! two bits: I (xxxxxxx0), S (xxxxxx01) and U (xxxxxx11).

use crate::address::{AddressError, Callsign, DigiPath, Digipeater, ADDR_LEN, MAX_DIGIS};

/// PID for "no layer 3 protocol", the only value this engine emits.
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Default AX.25 N1: the largest information field we send or accept.
pub const MAX_INFO_LEN: usize = 256;

/// Longest possible encoded frame: full address chain, control, PID, info.
pub const MAX_AX25_LEN: usize = (2 + MAX_DIGIS) * ADDR_LEN + 2 + MAX_INFO_LEN;

/// Shortest decodable frame: destination and source addresses plus control.
const MIN_AX25_LEN: usize = 2 * ADDR_LEN + 1;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FrameError {
    /// Too short to hold an address chain and control octet.
    Truncated,
    /// No frame format matches the control octet.
    UnknownControl,
    Address(AddressError),
    InfoTooLong,
}

impl From<AddressError> for FrameError {
    fn from(e: AddressError) -> Self {
        FrameError::Address(e)
    }
}

/// Supervisory frame kinds.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SFormat {
    Rr,
    Rnr,
    Rej,
}

/// Unnumbered frame kinds.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UFormat {
    Sabm,
    Sabme,
    Disc,
    Dm,
    Ua,
    Frmr,
    Ui,
}

/// Decoded control octet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Control {
    Info { ns: u8, nr: u8, poll: bool },
    Supervisory { kind: SFormat, nr: u8, poll_final: bool },
    Unnumbered { kind: UFormat, poll_final: bool },
}

impl Control {
    pub fn poll_final(&self) -> bool {
        match *self {
            Control::Info { poll, .. } => poll,
            Control::Supervisory { poll_final, .. } => poll_final,
            Control::Unnumbered { poll_final, .. } => poll_final,
        }
    }

    pub fn encode(&self) -> u8 {
        match *self {
            Control::Info { ns, nr, poll } => {
                ((nr & 7) << 5) | ((poll as u8) << 4) | ((ns & 7) << 1)
            }
            Control::Supervisory {
                kind,
                nr,
                poll_final,
            } => {
                let ss = match kind {
                    SFormat::Rr => 0,
                    SFormat::Rnr => 1,
                    SFormat::Rej => 2,
                };
                ((nr & 7) << 5) | ((poll_final as u8) << 4) | (ss << 2) | 0b01
            }
            Control::Unnumbered { kind, poll_final } => {
                let base = match kind {
                    UFormat::Sabm => 0x2F,
                    UFormat::Sabme => 0x6F,
                    UFormat::Disc => 0x43,
                    UFormat::Dm => 0x0F,
                    UFormat::Ua => 0x63,
                    UFormat::Frmr => 0x87,
                    UFormat::Ui => 0x03,
                };
                base | ((poll_final as u8) << 4)
            }
        }
    }

    pub fn decode(octet: u8) -> Result<Self, FrameError> {
        if octet & 0x01 == 0 {
            return Ok(Control::Info {
                ns: (octet >> 1) & 7,
                nr: octet >> 5,
                poll: octet & 0x10 != 0,
            });
        }
        let poll_final = octet & 0x10 != 0;
        if octet & 0x03 == 0b01 {
            let kind = match (octet >> 2) & 0x03 {
                0 => SFormat::Rr,
                1 => SFormat::Rnr,
                2 => SFormat::Rej,
                _ => return Err(FrameError::UnknownControl),
            };
            return Ok(Control::Supervisory {
                kind,
                nr: octet >> 5,
                poll_final,
            });
        }
        let kind = match octet & 0xEF {
            0x2F => UFormat::Sabm,
            0x6F => UFormat::Sabme,
            0x43 => UFormat::Disc,
            0x0F => UFormat::Dm,
            0x63 => UFormat::Ua,
            0x87 => UFormat::Frmr,
            0x03 => UFormat::Ui,
            _ => return Err(FrameError::UnknownControl),
        };
        Ok(Control::Unnumbered { kind, poll_final })
    }
}

/// Fixed-capacity information field.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Info {
    data: [u8; MAX_INFO_LEN],
    len: usize,
}

impl Info {
    pub fn empty() -> Self {
        Info {
            data: [0u8; MAX_INFO_LEN],
            len: 0,
        }
    }

    pub fn new(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() > MAX_INFO_LEN {
            return Err(FrameError::InfoTooLong);
        }
        let mut info = Self::empty();
        info.data[..bytes.len()].copy_from_slice(bytes);
        info.len = bytes.len();
        Ok(info)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Info {
    fn default() -> Self {
        Self::empty()
    }
}

impl core::fmt::Debug for Info {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Info({} octets)", self.len)
    }
}

/// One decoded (or to-be-encoded) AX.25 frame.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Ax25Frame {
    pub dest: Callsign,
    pub source: Callsign,
    pub path: DigiPath,
    /// Command frames set C on the destination; responses set it on the source.
    pub command: bool,
    pub control: Control,
    pub pid: Option<u8>,
    pub info: Info,
}

impl Ax25Frame {
    /// Build a UI frame for unconnected ("UNPROTO") transmission.
    pub fn ui(
        source: Callsign,
        dest: Callsign,
        path: DigiPath,
        payload: &[u8],
    ) -> Result<Self, FrameError> {
        Ok(Ax25Frame {
            dest,
            source,
            path,
            command: true,
            control: Control::Unnumbered {
                kind: UFormat::Ui,
                poll_final: false,
            },
            pid: Some(PID_NO_LAYER3),
            info: Info::new(payload)?,
        })
    }

    /// Encode into `out`, which must hold at least `MAX_AX25_LEN` octets.
    /// Returns the number of octets written.
    pub fn encode(&self, out: &mut [u8]) -> usize {
        let mut i = 0;
        self.dest.encode(self.command, false, &mut out[i..]);
        i += ADDR_LEN;
        self.source
            .encode(!self.command, self.path.is_empty(), &mut out[i..]);
        i += ADDR_LEN;
        let hops = self.path.len();
        for (n, digi) in self.path.iter().enumerate() {
            digi.call
                .encode(digi.repeated, n == hops - 1, &mut out[i..]);
            i += ADDR_LEN;
        }
        out[i] = self.control.encode();
        i += 1;
        if let Some(pid) = self.pid {
            out[i] = pid;
            i += 1;
        }
        out[i..i + self.info.len()].copy_from_slice(self.info.as_bytes());
        i + self.info.len()
    }

    /// Decode a raw AX.25 frame as delivered by the KISS layer.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < MIN_AX25_LEN {
            return Err(FrameError::Truncated);
        }
        let (dest, dest_c, dest_last) = Callsign::decode(&bytes[0..ADDR_LEN]);
        if dest_last {
            // chain cannot end before the source address
            return Err(FrameError::Truncated);
        }
        let (source, source_c, mut last) = Callsign::decode(&bytes[ADDR_LEN..2 * ADDR_LEN]);
        let mut i = 2 * ADDR_LEN;
        let mut path = DigiPath::new();
        while !last {
            if bytes.len() < i + ADDR_LEN + 1 {
                return Err(FrameError::Truncated);
            }
            if path.len() == MAX_DIGIS {
                return Err(FrameError::Address(AddressError::TooManyDigipeaters));
            }
            let (call, repeated, is_last) = Callsign::decode(&bytes[i..i + ADDR_LEN]);
            path.push_entry(Digipeater { call, repeated })?;
            i += ADDR_LEN;
            last = is_last;
        }
        let control = Control::decode(bytes[i])?;
        i += 1;
        let command = dest_c && !source_c;
        let (pid, info) = match control {
            Control::Info { .. }
            | Control::Unnumbered {
                kind: UFormat::Ui, ..
            } => {
                if bytes.len() < i + 1 {
                    return Err(FrameError::Truncated);
                }
                let pid = bytes[i];
                (Some(pid), Info::new(&bytes[i + 1..])?)
            }
            Control::Unnumbered {
                kind: UFormat::Frmr,
                ..
            } => (None, Info::new(&bytes[i..])?),
            _ => (None, Info::empty()),
        };
        Ok(Ax25Frame {
            dest,
            source,
            path,
            command,
            control,
            pid,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(s: &str) -> Callsign {
        Callsign::parse(s).unwrap()
    }

    #[test]
    fn control_octet_constants() {
        let sabm = Control::Unnumbered {
            kind: UFormat::Sabm,
            poll_final: false,
        };
        assert_eq!(sabm.encode(), 0x2F);
        let sabm_p = Control::Unnumbered {
            kind: UFormat::Sabm,
            poll_final: true,
        };
        assert_eq!(sabm_p.encode(), 0x3F);
        let sabme = Control::Unnumbered {
            kind: UFormat::Sabme,
            poll_final: true,
        };
        assert_eq!(sabme.encode(), 0x7F);
        let disc = Control::Unnumbered {
            kind: UFormat::Disc,
            poll_final: false,
        };
        assert_eq!(disc.encode(), 0x43);
        let ua = Control::Unnumbered {
            kind: UFormat::Ua,
            poll_final: true,
        };
        assert_eq!(ua.encode(), 0x73);
        let ui = Control::Unnumbered {
            kind: UFormat::Ui,
            poll_final: false,
        };
        assert_eq!(ui.encode(), 0x03);
    }

    #[test]
    fn control_octet_roundtrip() {
        for octet in 0..=255u8 {
            if let Ok(control) = Control::decode(octet) {
                assert_eq!(control.encode(), octet, "octet {:#04x}", octet);
            }
        }
    }

    #[test]
    fn i_frame_control_fields() {
        let c = Control::Info {
            ns: 5,
            nr: 3,
            poll: true,
        };
        let octet = c.encode();
        assert_eq!(octet, (3 << 5) | 0x10 | (5 << 1));
        assert_eq!(Control::decode(octet).unwrap(), c);
    }

    #[test]
    fn s_frame_control_fields() {
        let c = Control::Supervisory {
            kind: SFormat::Rej,
            nr: 6,
            poll_final: false,
        };
        let octet = c.encode();
        assert_eq!(octet, (6 << 5) | (2 << 2) | 0b01);
        assert_eq!(Control::decode(octet).unwrap(), c);
    }

    #[test]
    fn ui_frame_wire_format() {
        let mut path = DigiPath::new();
        path.push(call("WIDE1-1")).unwrap();
        let frame =
            Ax25Frame::ui(call("KC3SMW"), call("CQ"), path, b"CQ CQ de KC3SMW").unwrap();
        let mut buf = [0u8; MAX_AX25_LEN];
        let n = frame.encode(&mut buf);

        // destination CQ, command bit set, not last
        assert_eq!(buf[0], b'C' << 1);
        assert_eq!(buf[1], b'Q' << 1);
        assert_eq!(buf[6], 0x80 | 0x60);
        // source KC3SMW-0, C clear, not last
        assert_eq!(buf[7], b'K' << 1);
        assert_eq!(buf[13], 0x60);
        // digipeater WIDE1-1, H clear, last
        assert_eq!(buf[14], b'W' << 1);
        assert_eq!(buf[20], 0x60 | (1 << 1) | 0x01);
        // control UI, PID F0, info
        assert_eq!(buf[21], 0x03);
        assert_eq!(buf[22], PID_NO_LAYER3);
        assert_eq!(&buf[23..n], b"CQ CQ de KC3SMW");
    }

    #[test]
    fn frame_roundtrip_with_path() {
        let mut path = DigiPath::new();
        path.push(call("W1AW-1")).unwrap();
        path.push(call("W1AW-2")).unwrap();
        let frame = Ax25Frame {
            dest: call("KC3SMW-7"),
            source: call("KC3SMW"),
            path,
            command: true,
            control: Control::Info {
                ns: 2,
                nr: 4,
                poll: false,
            },
            pid: Some(PID_NO_LAYER3),
            info: Info::new(b"hello\r").unwrap(),
        };
        let mut buf = [0u8; MAX_AX25_LEN];
        let n = frame.encode(&mut buf);
        let parsed = Ax25Frame::parse(&buf[..n]).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn response_frame_roundtrip() {
        let frame = Ax25Frame {
            dest: call("KC3SMW-7"),
            source: call("KC3SMW"),
            path: DigiPath::new(),
            command: false,
            control: Control::Supervisory {
                kind: SFormat::Rr,
                nr: 1,
                poll_final: true,
            },
            pid: None,
            info: Info::empty(),
        };
        let mut buf = [0u8; MAX_AX25_LEN];
        let n = frame.encode(&mut buf);
        // S frames carry no PID: addresses + control only
        assert_eq!(n, 15);
        let parsed = Ax25Frame::parse(&buf[..n]).unwrap();
        assert!(!parsed.command);
        assert_eq!(parsed, frame);
    }

    #[test]
    fn parse_rejects_short_frames() {
        assert_eq!(Ax25Frame::parse(&[0u8; 5]), Err(FrameError::Truncated));
        assert_eq!(Ax25Frame::parse(&[0u8; 14]), Err(FrameError::Truncated));
    }

    #[test]
    fn parse_accepts_frmr_with_info() {
        let frame = Ax25Frame {
            dest: call("KC3SMW"),
            source: call("KC3SMW-7"),
            path: DigiPath::new(),
            command: false,
            control: Control::Unnumbered {
                kind: UFormat::Frmr,
                poll_final: true,
            },
            pid: None,
            info: Info::new(&[0x01, 0x02, 0x03]).unwrap(),
        };
        let mut buf = [0u8; MAX_AX25_LEN];
        let n = frame.encode(&mut buf);
        let parsed = Ax25Frame::parse(&buf[..n]).unwrap();
        assert_eq!(parsed.info.as_bytes(), &[0x01, 0x02, 0x03]);
    }
}
