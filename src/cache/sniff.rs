//! Sniff collaborator: infers a file type from leading content bytes.
//!
//! Consulted once per fetched resource, over the same byte pass the
//! cache uses for hashing, so no second read of the source happens.

/// How many leading bytes the cache hands to the sniffer
pub const SNIFF_HEADER_LEN: usize = 4100;

/// A detected file kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    /// File extension without the leading dot, e.g. `"png"`
    pub extension: &'static str,
}

/// Infers a file kind from the first bytes of a resource
pub trait TypeSniffer: Send + Sync {
    fn sniff(&self, head: &[u8]) -> Option<FileKind>;
}

/// Default sniffer: a magic-number table for common web asset types
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl TypeSniffer for MagicSniffer {
    fn sniff(&self, head: &[u8]) -> Option<FileKind> {
        detect(head).map(|extension| FileKind { extension })
    }
}

fn detect(head: &[u8]) -> Option<&'static str> {
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("png");
    }
    if head.starts_with(b"\xff\xd8\xff") {
        return Some("jpg");
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        match &head[8..12] {
            b"WEBP" => return Some("webp"),
            b"WAVE" => return Some("wav"),
            _ => {}
        }
    }
    if head.starts_with(b"BM") {
        return Some("bmp");
    }
    if head.starts_with(b"\x00\x00\x01\x00") {
        return Some("ico");
    }
    if head.starts_with(b"%PDF-") {
        return Some("pdf");
    }
    if head.starts_with(b"PK\x03\x04") {
        return Some("zip");
    }
    if head.starts_with(b"\x1f\x8b") {
        return Some("gz");
    }
    if head.starts_with(b"ID3") || head.starts_with(b"\xff\xfb") {
        return Some("mp3");
    }
    if head.len() >= 12 && head[4..8] == *b"ftyp" {
        return Some("mp4");
    }
    if head.starts_with(b"OggS") {
        return Some("ogg");
    }
    // Text formats, after the binary signatures
    let trimmed = skip_leading_whitespace(head);
    if trimmed.starts_with(b"<?xml") {
        return Some("xml");
    }
    if trimmed.starts_with(b"<svg") {
        return Some("svg");
    }
    None
}

fn skip_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}
