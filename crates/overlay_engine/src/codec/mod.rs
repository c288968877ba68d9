//! Host-native document formats.
//!
//! A [`ContentCodec`] converts between a host-native JSON layout and the neutral
//! [`ContentDocument`]. Decoding produces the document the merge works on;
//! encoding re-projects merged values into the *original* host bytes, so every
//! part of the host document the engine does not understand (actors, metadata,
//! unknown properties) survives the round trip untouched.
//!
//! The crate ships one codec per [`ArtifactKind`]:
//!
//! | Kind | Native layout | Entry key |
//! |------|---------------|-----------|
//! | `DialogueDatabase` | `conversations[].dialogueEntries[].fields[]` | `"<title>#<id>"` |
//! | `TextTable` | `fields.<id>.texts.<langId>` | field id |
//! | `TextMap` | `{ "<path>": "text" }` | object path |
//! | `Document` | [`ContentDocument`] JSON | entry key |

mod dialogue;
mod text_map;
mod text_table;

pub use dialogue::DialogueDatabaseCodec;
pub use text_map::TextMapCodec;
pub use text_table::TextTableCodec;

use crate::descriptor::ArtifactKind;
use crate::document::{ContentDocument, Entry, Field};
use crate::error::{Error, Result};
use serde_json::Value;

/// Converts a host-native format to and from [`ContentDocument`].
///
/// `artifact` is only used for error context.
pub trait ContentCodec: Send + Sync {
    /// Decode the host's original content.
    fn decode_original(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument>;

    /// Decode a remote patch document. Defaults to the original layout.
    fn decode_patch(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        self.decode_original(artifact, bytes)
    }

    /// Write `merged` back into the host layout of `original`.
    fn encode(&self, artifact: &str, original: &[u8], merged: &ContentDocument)
        -> Result<Vec<u8>>;
}

/// Codec for the given artifact kind.
pub fn codec_for(kind: ArtifactKind) -> Box<dyn ContentCodec> {
    match kind {
        ArtifactKind::DialogueDatabase => Box::new(DialogueDatabaseCodec),
        ArtifactKind::TextTable => Box::new(TextTableCodec),
        ArtifactKind::TextMap => Box::new(TextMapCodec),
        ArtifactKind::Document => Box::new(DocumentCodec),
    }
}

/// The neutral [`ContentDocument`] JSON itself.
pub struct DocumentCodec;

impl ContentCodec for DocumentCodec {
    fn decode_original(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        ContentDocument::from_json_slice(strip_bom(bytes))
            .map_err(|e| Error::parse(artifact, "document", e))
    }

    fn encode(
        &self,
        _artifact: &str,
        _original: &[u8],
        merged: &ContentDocument,
    ) -> Result<Vec<u8>> {
        Ok(merged.to_json_vec()?)
    }
}

/// A named string slot inside a parsed host document.
pub(crate) type Slot<'a> = (String, &'a mut String);

/// Walks the translatable string values of a host layout in document order.
///
/// `walk` must visit entries in a deterministic order so that decode and encode
/// line up positionally.
pub(crate) trait NativeLayout {
    fn walk<'a>(
        &self,
        root: &'a mut Value,
        visit: &mut dyn FnMut(String, Vec<Slot<'a>>),
    ) -> std::result::Result<(), String>;
}

pub(crate) fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

fn parse_value(artifact: &str, what: &'static str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(strip_bom(bytes)).map_err(|e| Error::parse(artifact, what, e))
}

pub(crate) fn decode_layout(
    layout: &dyn NativeLayout,
    artifact: &str,
    what: &'static str,
    bytes: &[u8],
) -> Result<ContentDocument> {
    let mut root = parse_value(artifact, what, bytes)?;
    let mut entries = Vec::new();
    layout
        .walk(&mut root, &mut |key, slots| {
            let fields = slots
                .into_iter()
                .map(|(name, value)| Field::new(name, value.clone()))
                .collect();
            entries.push(Entry { key, fields });
        })
        .map_err(|e| Error::parse(artifact, what, e))?;
    Ok(ContentDocument::new(entries))
}

pub(crate) fn encode_layout(
    layout: &dyn NativeLayout,
    artifact: &str,
    original: &[u8],
    merged: &ContentDocument,
) -> Result<Vec<u8>> {
    let mut root = parse_value(artifact, "original", original)?;
    let mut position = 0usize;
    let mut misaligned: Option<String> = None;

    layout
        .walk(&mut root, &mut |key, slots| {
            match merged.entries.get(position) {
                Some(entry) if entry.key == key && entry.fields.len() == slots.len() => {
                    for ((_, slot), field) in slots.into_iter().zip(&entry.fields) {
                        if *slot != field.value {
                            *slot = field.value.clone();
                        }
                    }
                }
                _ => {
                    misaligned.get_or_insert(key);
                }
            }
            position += 1;
        })
        .map_err(|e| Error::parse(artifact, "original", e))?;

    if let Some(key) = misaligned {
        return Err(Error::parse(
            artifact,
            "merged overlay",
            format!("entry '{}' does not line up with the original", key),
        ));
    }
    if position != merged.len() {
        return Err(Error::parse(
            artifact,
            "merged overlay",
            format!(
                "expected {} entries, original has {}",
                merged.len(),
                position
            ),
        ));
    }

    Ok(serde_json::to_vec_pretty(&root)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_codec_roundtrip() {
        let doc = ContentDocument::new(vec![Entry::new("k").with_field("text", "v")]);
        let bytes = DocumentCodec.encode("doc", b"", &doc).unwrap();
        assert_eq!(DocumentCodec.decode_original("doc", &bytes).unwrap(), doc);
    }

    #[test]
    fn test_document_codec_rejects_garbage() {
        let err = DocumentCodec.decode_patch("doc", b"not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBF{}"), b"{}");
        assert_eq!(strip_bom(b"{}"), b"{}");
    }

    #[test]
    fn test_codec_for_each_kind() {
        let map = br#"{"[Menu] Canvas/Title": "Play"}"#;
        let doc = codec_for(ArtifactKind::TextMap)
            .decode_original("map", map)
            .unwrap();
        assert_eq!(doc.len(), 1);
    }
}
