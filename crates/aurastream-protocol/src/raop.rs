//! RAOP (AirPlay 1): spec.md §6's "one representative" protocol,
//! reproduced bit-exactly at the RTP/control/crypto layer.

pub mod control;
pub mod crypto;
pub mod protocol;
pub mod resend;
pub mod rtp;

pub use protocol::{RaopProtocol, RaopSessionConfig};
pub use resend::{GapAction, ResendTracker};
