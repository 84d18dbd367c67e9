//! Codec registration and cheapest-first recognition (spec.md §4.3 step 2).

use crate::codec::Codec;

/// Registered codecs, always kept sorted by ascending `recognise_cost`.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    pub fn register(&mut self, codec: Box<dyn Codec>) {
        self.codecs.push(codec);
        self.codecs.sort_by_key(|c| c.recognise_cost());
    }

    /// Offer `window` to each registered codec, cheapest first, returning
    /// the index of the first that recognises it.
    pub fn recognise(&self, window: &[u8]) -> Option<usize> {
        self.codecs.iter().position(|codec| codec.recognise(window))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn Codec>> {
        self.codecs.get_mut(index)
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EncodedSource, ProcessOutcome};
    use crate::errors::CodecError;
    use aurastream_core::msg::DecodedStreamInfo;

    struct Stub {
        cost: u32,
        magic: &'static [u8],
    }

    impl Codec for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn recognise_cost(&self) -> u32 {
            self.cost
        }
        fn recognise(&self, window: &[u8]) -> bool {
            window.starts_with(self.magic)
        }
        fn stream_initialise(
            &mut self,
            _source: Box<dyn EncodedSource>,
            _stream_id: u32,
            _start_sample: u64,
            _handler: aurastream_core::StreamHandlerId,
        ) -> Result<DecodedStreamInfo, CodecError> {
            unimplemented!()
        }
        fn process(&mut self) -> Result<ProcessOutcome, CodecError> {
            unimplemented!()
        }
        fn try_seek(&mut self, _sample: u64) -> Option<u64> {
            None
        }
    }

    #[test]
    fn recognition_tries_cheapest_first() {
        let mut registry = CodecRegistry::new();
        registry.register(Box::new(Stub { cost: 10, magic: b"AAAA" }));
        registry.register(Box::new(Stub { cost: 1, magic: b"BBBB" }));
        // Both would match a window starting with neither; use a window
        // that only the expensive one recognises to prove order doesn't
        // falsely short-circuit, then one only the cheap one recognises.
        assert_eq!(registry.recognise(b"AAAA..."), Some(1));
        assert_eq!(registry.recognise(b"BBBB..."), Some(0));
    }
}
