//! Flat text maps keyed by scene object path, e.g.
//! `{ "[MainMenu] Canvas/Buttons/Play": "Play" }`.

use super::{decode_layout, encode_layout, ContentCodec, NativeLayout, Slot};
use crate::document::ContentDocument;
use crate::error::Result;
use serde_json::Value;

/// Name of the single field each text map entry carries.
pub const TEXT_FIELD: &str = "text";

pub struct TextMapCodec;

impl NativeLayout for TextMapCodec {
    fn walk<'a>(
        &self,
        root: &'a mut Value,
        visit: &mut dyn FnMut(String, Vec<Slot<'a>>),
    ) -> std::result::Result<(), String> {
        let map = root
            .as_object_mut()
            .ok_or_else(|| "text map must be a JSON object".to_string())?;

        for (path, text) in map.iter_mut() {
            if let Value::String(text) = text {
                visit(path.clone(), vec![(TEXT_FIELD.to_string(), text)]);
            }
        }
        Ok(())
    }
}

impl ContentCodec for TextMapCodec {
    fn decode_original(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        decode_layout(self, artifact, "text map", bytes)
    }

    fn encode(
        &self,
        artifact: &str,
        original: &[u8],
        merged: &ContentDocument,
    ) -> Result<Vec<u8>> {
        encode_layout(self, artifact, original, merged)
    }
}
