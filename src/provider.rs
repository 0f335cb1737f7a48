//! Provider trait for update sources

use crate::Result;
use crate::types::Update;

/// Trait for timing feed sources
///
/// Providers abstract over where updates come from (a capture file, memory, a
/// recorded history, a transport owned by someone else) and handle their own
/// timing internally. Wrapping providers such as
/// [`ReplayProvider`](crate::providers::ReplayProvider) and
/// [`HistoryProvider`](crate::providers::HistoryProvider) are themselves providers,
/// so they compose.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next update
    ///
    /// Returns:
    /// - `Ok(Some(update))` - New update available
    /// - `Ok(None)` - Stream ended (normal termination)
    /// - `Err(e)` - Error occurred
    ///
    /// This is the only place the pipeline suspends.
    async fn next_update(&mut self) -> Result<Option<Update>>;
}

#[async_trait::async_trait]
impl Provider for Box<dyn Provider> {
    async fn next_update(&mut self) -> Result<Option<Update>> {
        (**self).next_update().await
    }
}
