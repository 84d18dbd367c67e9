//! Shared id allocation and handler registration every protocol
//! implementation draws from, so each one doesn't need its own copy of
//! the pipeline's id spaces (spec.md §3.4).

use aurastream_core::{IdProviders, StreamHandler, StreamHandlerId, StreamHandlerRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProtocolContext {
    ids: Arc<IdProviders>,
    handlers: Arc<StreamHandlerRegistry>,
}

impl ProtocolContext {
    pub fn new(ids: Arc<IdProviders>, handlers: Arc<StreamHandlerRegistry>) -> Self {
        Self { ids, handlers }
    }

    pub fn next_stream_id(&self) -> u32 {
        self.ids.stream.next()
    }

    pub fn next_flush_id(&self) -> u32 {
        self.ids.flush.next()
    }

    pub fn register(&self, handler: Arc<dyn StreamHandler>) -> StreamHandlerId {
        self.handlers.register(&handler)
    }
}
