//! Message model, jiffies, ramps, ids, and allocators shared by every
//! pipeline stage crate.

pub mod decoded_audio;
pub mod factory;
pub mod handler;
pub mod ids;
pub mod jiffies;
pub mod msg;
pub mod pool;
pub mod ramp;

pub use decoded_audio::DecodedAudio;
pub use factory::{FactoryConfig, MessageFactory};
pub use handler::{OkToPlay, StreamHandler, StreamHandlerId, StreamHandlerRegistry};
pub use ids::{IdProvider, IdProviders};
pub use msg::Msg;
pub use pool::{AllocatorError, BoundedPool, PoolPermit};
pub use ramp::{Ramp, RampDirection, RAMP_MAX};
