use super::MessageAssembler;
use crate::pipeline::PipelineError;
use crate::types::{UiMessage, UiStreamEvent};
use crate::{BoxStream, Result};
use futures::StreamExt;
use tracing::warn;

/// Consume a whole event stream and return the final assembled message.
///
/// A stream that yields no parts at all (only meta or step events) is rejected with
/// [`PipelineError::EmptyMessage`]; source errors are returned as-is.
pub async fn read_message(mut input: BoxStream<'_, UiStreamEvent>) -> Result<UiMessage> {
    let mut assembler = MessageAssembler::new();
    while let Some(item) = input.next().await {
        let event = item?;
        if let UiStreamEvent::Error { error_text } = &event {
            warn!(error_text = error_text.as_str(), "error event in message stream");
        }
        assembler.fold(&event);
    }

    let message = assembler.into_message();
    if !message.has_content() {
        return Err(PipelineError::EmptyMessage { hint: None }
            .with_hint("the source emitted only meta/step events; check the producer")
            .into());
    }
    Ok(message)
}
