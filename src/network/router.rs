//! Reply routing
//!
//! Receive-side glue, free of any I/O: bytes in, replies out to the pipeline
//! or to the handler.

use crate::pipeline::RequestPipeline;
use crate::protocol::{DecoderLimits, ReplyDecoder};

use super::ReplyHandler;

/// Owns the decoder for one link
#[derive(Debug, Default)]
pub struct ReplyRouter {
    decoder: ReplyDecoder,
}

impl ReplyRouter {
    pub fn new(limits: DecoderLimits) -> Self {
        Self {
            decoder: ReplyDecoder::with_limits(limits),
        }
    }

    /// Decode `data` and deliver every completed reply
    ///
    /// Returns the number of top-level replies decoded.
    pub fn route(&mut self, data: &[u8], pipeline: &RequestPipeline, handler: &dyn ReplyHandler) -> usize {
        let mut decoded = 0;
        for outcome in self.decoder.decode(data) {
            decoded += 1;
            let outcome = match outcome {
                Ok(reply) => match handler.intercept(reply) {
                    Some(reply) => Ok(reply),
                    None => continue,
                },
                Err(e) => Err(e),
            };
            tracing::trace!("Routing reply: {:?}", outcome);
            if let Err(orphan) = pipeline.complete(outcome) {
                handler.unsolicited(orphan);
            }
        }
        decoded
    }

    /// Bytes received but not yet part of a complete reply
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }
}
