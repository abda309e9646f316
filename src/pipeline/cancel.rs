//! Hard cancellation of a pipeline output.
//!
//! Cancelling ends the guarded stream at its next poll and drops the wrapped
//! stream on the spot, which releases the upstream source and every part an
//! operator was still buffering. Nothing buffered is flushed.

use crate::types::UiStreamEvent;
use crate::BoxStream;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle returned by [`Pipeline::process_stream_with_cancel`](super::Pipeline::process_stream_with_cancel).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn guard(
        &self,
        input: BoxStream<'static, UiStreamEvent>,
    ) -> BoxStream<'static, UiStreamEvent> {
        let token = self.token.clone();
        let guarded = stream::unfold((input, token), |(mut input, token)| async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("pipeline output cancelled; dropping source");
                    None
                }
                item = input.next() => item.map(|item| (item, (input, token))),
            }
        });
        Box::pin(guarded.fuse())
    }
}
