//! Splitting ReAct output into header-tagged segments.

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Opening tag of a segment header.
pub const HEADER_OPEN: &str = "<reactAgentSegmentHeader>";
/// Closing tag of a segment header.
pub const HEADER_CLOSE: &str = "</reactAgentSegmentHeader>";

/// Segment kinds the agent prompt defines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentKind {
    Think,
    CallToolCode,
    SendResponseToUser,
    SystemFeedback,
    SystemAlert,
    UserMessage,
    #[strum(default)]
    #[serde(untagged)]
    Other(String),
}

/// A header and the text that follows it up to the next header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

/// Render the header tag for `name`.
pub fn header(name: &str) -> String {
    format!("{HEADER_OPEN}{name}{HEADER_CLOSE}")
}

/// Split `text` into segments. Text before the first header is dropped, and
/// a header tag that is never closed ends parsing.
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut headers = Vec::new();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(HEADER_OPEN) {
        let name_start = cursor + found + HEADER_OPEN.len();
        let Some(name_len) = text[name_start..].find(HEADER_CLOSE) else {
            break;
        };
        let name = &text[name_start..name_start + name_len];
        let body_start = name_start + name_len + HEADER_CLOSE.len();
        headers.push((cursor + found, name, body_start));
        cursor = body_start;
    }

    headers
        .iter()
        .enumerate()
        .map(|(i, (_, name, body_start))| {
            let body_end = headers.get(i + 1).map_or(text.len(), |next| next.0);
            Segment {
                kind: name
                    .trim()
                    .parse()
                    .unwrap_or_else(|_| SegmentKind::Other(name.trim().to_string())),
                content: text[*body_start..body_end].trim().to_string(),
            }
        })
        .collect()
}

/// Content of the last `send_response_to_user` segment, if any.
pub fn final_response(text: &str) -> Option<String> {
    parse_segments(text)
        .into_iter()
        .rev()
        .find(|segment| segment.kind == SegmentKind::SendResponseToUser)
        .map(|segment| segment.content)
}
