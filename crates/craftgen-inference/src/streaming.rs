//! Token streams for incremental answer emission.
//!
//! Answers are currently produced by one blocking call and emitted as a
//! single chunk; the SSE transport consumes a [`TokenStream`] either way.

use std::pin::Pin;

use futures::{stream, Stream};

use craftgen_core::Result;

/// Stream of generation tokens.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A stream yielding `text` as one chunk.
///
/// Used where an answer is produced by a single blocking call but the
/// transport expects a token stream.
pub fn single_chunk(text: String) -> TokenStream {
    Box::pin(stream::once(async move { Ok(text) }))
}
