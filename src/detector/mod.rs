//! Incremental detection of tool-call blocks in streamed model output.

pub mod segments;

pub use segments::{final_response, parse_segments, Segment, SegmentKind};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SegmentMarkers;
use crate::error::ToolcodeError;

/// A complete call block found in a buffer.
///
/// `start..end` are byte offsets covering the whole fenced block, open and
/// close delimiters included; `call_text` is what sits between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpan {
    pub call_text: String,
    pub start: usize,
    pub end: usize,
}

/// Finds the fenced call block that follows the last call header.
///
/// Detection is a pure function of the buffer, so it can be re-run after
/// every streamed chunk.
#[derive(Debug, Clone)]
pub struct SegmentDetector {
    header: String,
    pattern: Regex,
}

impl SegmentDetector {
    /// Build a detector for `header` followed by an `open ... close` fence.
    pub fn new(
        header: impl Into<String>,
        open: &str,
        close: &str,
    ) -> Result<Self, ToolcodeError> {
        let header = header.into();
        if header.is_empty() || open.is_empty() || close.is_empty() {
            return Err(ToolcodeError::Configuration(
                "call header and fences must not be empty".into(),
            ));
        }
        let pattern = Regex::new(&format!(
            "(?s){}(.*?){}",
            regex::escape(open),
            regex::escape(close)
        ))
        .map_err(|e| ToolcodeError::Configuration(format!("invalid call fence: {e}")))?;
        Ok(Self { header, pattern })
    }

    pub fn from_markers(markers: &SegmentMarkers) -> Result<Self, ToolcodeError> {
        Self::new(
            markers.call_header.clone(),
            &markers.call_open,
            &markers.call_close,
        )
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Locate the call block after the last header in `buffer`.
    ///
    /// Returns `None` when there is no header yet or its block has not been
    /// closed; neither case is an error while the stream is still growing.
    pub fn detect(&self, buffer: &str) -> Option<CallSpan> {
        let header_at = buffer.rfind(&self.header)?;
        let region = &buffer[header_at..];
        let captures = self.pattern.captures(region)?;
        let block = captures.get(0)?;
        let inner = captures.get(1)?;
        Some(CallSpan {
            call_text: inner.as_str().to_string(),
            start: header_at + block.start(),
            end: header_at + block.end(),
        })
    }
}
