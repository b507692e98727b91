//! Stream transformations applied by every transport.

use futures::StreamExt;

use super::TextStream;
use crate::agent_loop::CancellationSignal;
use crate::types::TextStreamDelta;

const THOUGHT_OPEN: &str = "<thought>";
const THOUGHT_CLOSE: &str = "</thought>";

/// Removes `<thought>...</thought>` spans from streamed text, including tags
/// split across chunks.
#[derive(Debug, Default)]
pub struct ThoughtFilter {
    in_thought: bool,
    pending: String,
}

impl ThoughtFilter {
    /// Whether `model` emits inline thoughts that should be hidden.
    pub fn applies_to(model: &str) -> bool {
        model.contains("thinking")
    }

    /// Feed a chunk and return the visible text it releases.
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);
        let mut out = String::new();
        loop {
            let tag = if self.in_thought { THOUGHT_CLOSE } else { THOUGHT_OPEN };
            if let Some(at) = self.pending.find(tag) {
                if !self.in_thought {
                    out.push_str(&self.pending[..at]);
                }
                self.pending.drain(..at + tag.len());
                self.in_thought = !self.in_thought;
                continue;
            }
            // keep a possible partial tag at the end for the next chunk
            let keep = partial_suffix_len(&self.pending, tag);
            let release = self.pending.len() - keep;
            if !self.in_thought {
                out.push_str(&self.pending[..release]);
            }
            self.pending.drain(..release);
            return out;
        }
    }

    /// Flush any held-back text at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        if self.in_thought {
            String::new()
        } else {
            rest
        }
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`.
fn partial_suffix_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.len() >= n && text.is_char_boundary(text.len() - n) && tag.starts_with(&text[text.len() - n..]))
        .unwrap_or(0)
}

/// Hide inline thoughts from a stream.
pub fn strip_thoughts(stream: TextStream) -> TextStream {
    let transformed = async_stream::stream! {
        let mut filter = ThoughtFilter::default();
        let mut inner = std::pin::pin!(stream);
        while let Some(item) = inner.next().await {
            match item {
                Ok(mut delta) => {
                    delta.text = filter.push(&delta.text);
                    if !delta.text.is_empty() || delta.finish_reason.is_some() {
                        yield Ok(delta);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
        let rest = filter.finish();
        if !rest.is_empty() {
            yield Ok(TextStreamDelta::text(rest));
        }
    };
    Box::pin(transformed)
}

/// Stop yielding as soon as `cancel` is set. Data that arrives afterwards
/// is never forwarded.
pub fn stop_on_cancel(stream: TextStream, cancel: CancellationSignal) -> TextStream {
    let transformed = async_stream::stream! {
        let mut inner = std::pin::pin!(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = inner.next() => item,
            };
            if cancel.is_cancelled() {
                tracing::debug!("stream cancelled, discarding remaining output");
                break;
            }
            let Some(item) = next else { break; };
            let failed = item.is_err();
            yield item;
            if failed {
                break;
            }
        }
    };
    Box::pin(transformed)
}
