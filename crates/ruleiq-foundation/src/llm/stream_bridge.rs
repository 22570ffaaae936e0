//! Bridges `BoxTokenStream` into foundation `TextStream` and `StreamEvent` streams

use futures::StreamExt;
use ruleiq_kernel::llm::streaming::{BoxTokenStream, StreamError};

use super::agent::{StreamEvent, TextStream};
use super::types::{LLMError, LLMResult};

/// `StreamError` to `LLMError`
pub fn stream_error_to_llm_error(err: StreamError) -> LLMError {
    match err {
        StreamError::Provider { message, .. } => LLMError::ApiError { code: None, message },
        StreamError::Connection(msg) => LLMError::NetworkError(msg),
        StreamError::Parse(msg) => LLMError::SerializationError(msg),
        StreamError::Timeout(msg) => LLMError::Timeout(msg),
        StreamError::Cancelled => LLMError::Other("stream cancelled".into()),
        _ => LLMError::Other(err.to_string()),
    }
}

/// `LLMError` to `StreamError`
pub fn llm_error_to_stream_error(provider: &str, err: LLMError) -> StreamError {
    match err {
        LLMError::NetworkError(msg) | LLMError::Timeout(msg) => StreamError::Connection(msg),
        LLMError::SerializationError(msg) => StreamError::Parse(msg),
        other => StreamError::provider(provider, other.to_string()),
    }
}

pub fn token_stream_to_text(stream: BoxTokenStream) -> TextStream {
    let mapped = stream.filter_map(|result| async move {
        match result {
            Ok(chunk) => {
                if chunk.delta.is_empty() || chunk.is_done() {
                    None
                } else {
                    Some(Ok(chunk.delta))
                }
            }
            Err(err) => Some(Err(stream_error_to_llm_error(err))),
        }
    });
    Box::pin(mapped)
}

/// `BoxTokenStream`to stream of `StreamEvent`s
pub fn token_stream_to_events(
    stream: BoxTokenStream,
) -> std::pin::Pin<Box<dyn futures::Stream<Item = LLMResult<StreamEvent>> + Send>> {
    let mapped = stream.flat_map(|result| {
        let events: Vec<LLMResult<StreamEvent>> = match result {
            Ok(chunk) => {
                let mut v = Vec::new();

                // Tool call events
                if let Some(ref tcs) = chunk.tool_calls {
                    for tc in tcs {
                        if tc.id.is_some() {
                            v.push(Ok(StreamEvent::ToolCallStart {
                                id: tc.id.clone().unwrap_or_default(),
                                name: tc
                                    .function
                                    .as_ref()
                                    .and_then(|f| f.name.clone())
                                    .unwrap_or_default(),
                            }));
                        } else if let Some(ref f) = tc.function {
                            v.push(Ok(StreamEvent::ToolCallDelta {
                                id: tc.id.clone().unwrap_or_default(),
                                arguments_delta: f.arguments.clone().unwrap_or_default(),
                            }));
                        }
                    }
                }

                if !chunk.delta.is_empty() {
                    v.push(Ok(StreamEvent::Text(chunk.delta.clone())));
                }

                if chunk.is_done() {
                    v.push(Ok(StreamEvent::Done(
                        chunk.finish_reason.as_ref().map(|fr| format!("{:?}", fr)),
                    )));
                }

                v
            }
            Err(err) => vec![Err(stream_error_to_llm_error(err))],
        };
        futures::stream::iter(events)
    });
    Box::pin(mapped)
}
