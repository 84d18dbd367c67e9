//! RAOP control-channel packet types (spec.md §6): sync (`0x80D4`),
//! resend request (`0x80D5`), resend response (`0x80D6`).

pub const TYPE_SYNC: u16 = 0x80D4;
pub const TYPE_RESEND_REQUEST: u16 = 0x80D5;
pub const TYPE_RESEND_RESPONSE: u16 = 0x80D6;

const SYNC_PACKET_LEN: usize = 20;

/// Parsed `0x80D4` sync packet: correlates the RTP timestamp clock with
/// wall-clock playout time across renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPacket {
    pub now_minus_latency: u32,
    pub play_at: u32,
    pub next_timestamp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("control packet too short ({0} bytes)")]
    TooShort(usize),
    #[error("unrecognised control packet type {0:#06x}")]
    UnknownType(u16),
}

pub fn packet_type(packet: &[u8]) -> Result<u16, ControlError> {
    if packet.len() < 2 {
        return Err(ControlError::TooShort(packet.len()));
    }
    Ok(u16::from_be_bytes([packet[0], packet[1]]))
}

/// Parse a `0x80D4` sync packet (20 bytes: 2-byte type/flags header, then
/// three big-endian u32 fields, per spec.md §6).
pub fn parse_sync(packet: &[u8]) -> Result<SyncPacket, ControlError> {
    if packet.len() < SYNC_PACKET_LEN {
        return Err(ControlError::TooShort(packet.len()));
    }
    Ok(SyncPacket {
        now_minus_latency: u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]),
        play_at: u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]),
        next_timestamp: u32::from_be_bytes([packet[16], packet[17], packet[18], packet[19]]),
    })
}

/// Build a `0x80D5` resend request: 16-bit missing packet id followed by
/// a 16-bit count of packets requested starting there.
pub fn build_resend_request(missing_seq: u16, count: u16) -> [u8; 8] {
    let mut packet = [0u8; 8];
    packet[0] = 0x80;
    packet[1] = 0xd5;
    packet[2..4].copy_from_slice(&missing_seq.to_be_bytes());
    packet[4..6].copy_from_slice(&missing_seq.to_be_bytes());
    packet[6..8].copy_from_slice(&count.to_be_bytes());
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resend_request_encodes_id_and_count() {
        let packet = build_resend_request(100, 3);
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), 100);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), 3);
    }

    #[test]
    fn sync_packet_parses_expected_fields() {
        let mut packet = [0u8; SYNC_PACKET_LEN];
        packet[0] = 0x80;
        packet[1] = 0xd4;
        packet[4..8].copy_from_slice(&100u32.to_be_bytes());
        packet[8..12].copy_from_slice(&200u32.to_be_bytes());
        packet[16..20].copy_from_slice(&300u32.to_be_bytes());
        let sync = parse_sync(&packet).unwrap();
        assert_eq!(sync.now_minus_latency, 100);
        assert_eq!(sync.play_at, 200);
        assert_eq!(sync.next_timestamp, 300);
    }

    #[test]
    fn short_sync_packet_is_rejected() {
        assert_eq!(parse_sync(&[0u8; 10]), Err(ControlError::TooShort(10)));
    }
}
