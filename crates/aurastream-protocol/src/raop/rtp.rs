//! RAOP (AirPlay 1) RTP audio packet framing (spec.md §6).
//!
//! Audio arrives as 7002-byte RTP frames: a 12-byte fixed-format RTP
//! header (version 2, payload type `0x60` live or `0x60e0` retransmit)
//! followed by an AES-128-CBC-encrypted ALAC payload.

pub const AUDIO_FRAME_LEN: usize = 7002;
pub const RTP_HEADER_LEN: usize = 12;
pub const PAYLOAD_TYPE_STANDARD: u8 = 0x60;
pub const PAYLOAD_TYPE_RETRANSMIT: u8 = 0xe0;

/// A parsed RTP audio packet header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RtpError {
    #[error("packet too short for an RTP header ({0} bytes)")]
    TooShort(usize),
    #[error("unexpected RTP version {0} (expected 2)")]
    BadVersion(u8),
}

impl RtpHeader {
    /// Parse the fixed 12-byte RTP header at the front of `packet`.
    pub fn parse(packet: &[u8]) -> Result<(Self, &[u8]), RtpError> {
        if packet.len() < RTP_HEADER_LEN {
            return Err(RtpError::TooShort(packet.len()));
        }
        let version = packet[0] >> 6;
        if version != 2 {
            return Err(RtpError::BadVersion(version));
        }
        let payload_type = packet[1] & 0x7f;
        let sequence = u16::from_be_bytes([packet[2], packet[3]]);
        let timestamp = u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]);
        let ssrc = u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]);
        Ok((
            Self { version, payload_type, sequence, timestamp, ssrc },
            &packet[RTP_HEADER_LEN..],
        ))
    }

    pub fn is_retransmit(&self) -> bool {
        self.payload_type == PAYLOAD_TYPE_RETRANSMIT
    }
}

/// A retransmit-response packet prepends a 4-byte "resend" sub-header
/// (original seq repeated) before the usual RTP header; strip it so the
/// remaining bytes parse the same way as a live packet.
pub fn strip_retransmit_wrapper(packet: &[u8]) -> &[u8] {
    const RESEND_WRAPPER_LEN: usize = 4;
    if packet.len() > RESEND_WRAPPER_LEN {
        &packet[RESEND_WRAPPER_LEN..]
    } else {
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header(seq: u16, payload_type: u8) -> Vec<u8> {
        let mut pkt = vec![0x80, payload_type, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2];
        pkt[2..4].copy_from_slice(&seq.to_be_bytes());
        pkt.extend_from_slice(&[0xaa; 16]);
        pkt
    }

    #[test]
    fn parses_standard_header() {
        let pkt = make_header(42, PAYLOAD_TYPE_STANDARD);
        let (header, payload) = RtpHeader::parse(&pkt).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.sequence, 42);
        assert_eq!(header.timestamp, 1);
        assert!(!header.is_retransmit());
        assert_eq!(payload.len(), 16);
    }

    #[test]
    fn rejects_short_packet() {
        assert_eq!(RtpHeader::parse(&[0u8; 4]), Err(RtpError::TooShort(4)));
    }

    #[test]
    fn rejects_bad_version() {
        let mut pkt = make_header(1, PAYLOAD_TYPE_STANDARD);
        pkt[0] = 0x40; // version 1
        assert_eq!(RtpHeader::parse(&pkt).unwrap_err(), RtpError::BadVersion(1));
    }

    #[test]
    fn retransmit_flag_is_detected() {
        let pkt = make_header(7, PAYLOAD_TYPE_RETRANSMIT);
        let (header, _) = RtpHeader::parse(&pkt).unwrap();
        assert!(header.is_retransmit());
    }
}
