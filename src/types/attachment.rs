//! Media attachments carried by conversation turns.
//!
//! The mime type is resolved once when the attachment is built: an explicit
//! type wins, then the file's magic bytes, then a caller-supplied hint (a
//! mime type, a file name or a bare extension). The [`AttachmentKind`] is
//! always derived from the resolved mime type, so the two never disagree.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ToolcodeError;

const OCTET_STREAM: &str = "application/octet-stream";

/// Broad media category of an attachment.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    Document,
}

impl AttachmentKind {
    /// Derive the kind from a mime type.
    pub fn from_mime(mime_type: &str) -> Self {
        let top = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            _ => Self::Document,
        }
    }
}

/// Binary media attached to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttachment", into = "RawAttachment")]
pub struct Attachment {
    data: Vec<u8>,
    mime_type: String,
    kind: AttachmentKind,
    file_name: Option<String>,
}

impl Attachment {
    /// Create an attachment with an explicit mime type.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            kind: AttachmentKind::from_mime(&mime_type),
            data,
            mime_type,
            file_name: None,
        }
    }

    /// Create an attachment, sniffing the mime type from the content and
    /// falling back to `hint`.
    pub fn from_bytes(data: Vec<u8>, hint: Option<&str>) -> Self {
        let mime_type = sniff_mime(&data)
            .map(str::to_string)
            .or_else(|| hint.and_then(mime_from_hint))
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        Self::new(data, mime_type)
    }

    /// Read a file from disk and build an attachment from it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ToolcodeError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let mut attachment = Self::from_bytes(data, file_name.as_deref());
        attachment.file_name = file_name;
        Ok(attachment)
    }

    /// Set the display file name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Standard base64 encoding of the payload.
    pub fn base64_data(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:` URL suitable for OpenAI-style `image_url` parts.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data())
    }
}

/// Wire form used for (de)serialization.
#[derive(Serialize, Deserialize)]
struct RawAttachment {
    data: String,
    mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<AttachmentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
}

impl TryFrom<RawAttachment> for Attachment {
    type Error = String;

    fn try_from(raw: RawAttachment) -> Result<Self, Self::Error> {
        let data = STANDARD
            .decode(raw.data.as_bytes())
            .map_err(|e| format!("invalid base64 attachment data: {e}"))?;
        // `kind` on the wire is informational; it is re-derived from the mime type.
        let mut attachment = Attachment::new(data, raw.mime_type);
        attachment.file_name = raw.file_name;
        Ok(attachment)
    }
}

impl From<Attachment> for RawAttachment {
    fn from(attachment: Attachment) -> Self {
        Self {
            data: attachment.base64_data(),
            mime_type: attachment.mime_type,
            kind: Some(attachment.kind),
            file_name: attachment.file_name,
        }
    }
}

/// Detect a mime type from well-known file signatures.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    let starts = |sig: &[u8]| data.starts_with(sig);
    let at = |offset: usize, sig: &[u8]| {
        data.len() >= offset + sig.len() && &data[offset..offset + sig.len()] == sig
    };

    if starts(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if starts(b"\xff\xd8\xff") {
        return Some("image/jpeg");
    }
    if starts(b"GIF87a") || starts(b"GIF89a") {
        return Some("image/gif");
    }
    if starts(b"RIFF") && at(8, b"WEBP") {
        return Some("image/webp");
    }
    if starts(b"RIFF") && at(8, b"WAVE") {
        return Some("audio/wav");
    }
    if starts(b"BM") && data.len() > 14 {
        return Some("image/bmp");
    }
    if starts(b"%PDF-") {
        return Some("application/pdf");
    }
    if starts(b"ID3") || (data.len() > 1 && data[0] == 0xff && data[1] & 0xe0 == 0xe0) {
        return Some("audio/mpeg");
    }
    if starts(b"OggS") {
        return Some("audio/ogg");
    }
    if starts(b"fLaC") {
        return Some("audio/flac");
    }
    if at(4, b"ftypqt") {
        return Some("video/quicktime");
    }
    if at(4, b"ftyp") {
        return Some("video/mp4");
    }
    if starts(b"\x1a\x45\xdf\xa3") {
        return Some("video/webm");
    }
    None
}

/// Resolve a hint (mime type, file name or extension) to a mime type.
pub fn mime_from_hint(hint: &str) -> Option<String> {
    let hint = hint.trim();
    if hint.is_empty() {
        return None;
    }
    if hint.contains('/') && !hint.contains('.') {
        return Some(hint.to_ascii_lowercase());
    }
    let ext = hint.rsplit('.').next().unwrap_or(hint).to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => return None,
    };
    Some(mime.to_string())
}
