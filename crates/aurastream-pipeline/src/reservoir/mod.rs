//! The two bounded reservoirs that are the pipeline's only blocking points
//! (spec.md §4.5): [`encoded::EncodedReservoir`] between protocol and codec
//! controller, [`decoded::DecodedReservoir`] between codec controller and
//! the ramping stages.

pub mod decoded;
pub mod encoded;

pub use decoded::{DecodedReservoir, DecodedReservoirConfig};
pub use encoded::{EncodedReservoir, EncodedReservoirConfig};
