//! Localized text tables.
//!
//! ```json
//! {
//!   "languages": { "Default": 0, "tr": 1 },
//!   "fields": {
//!     "12": { "fieldName": "MENU_PLAY", "texts": { "0": "Play", "1": "Oyna" } }
//!   }
//! }
//! ```
//!
//! Each table field becomes one entry keyed by its id; each language text becomes
//! a [`Field`](crate::document::Field) named by its language id. Original and patch
//! share the layout.

use super::{decode_layout, encode_layout, ContentCodec, NativeLayout, Slot};
use crate::document::ContentDocument;
use crate::error::Result;
use serde_json::Value;

pub struct TextTableCodec;

impl NativeLayout for TextTableCodec {
    fn walk<'a>(
        &self,
        root: &'a mut Value,
        visit: &mut dyn FnMut(String, Vec<Slot<'a>>),
    ) -> std::result::Result<(), String> {
        let fields = root
            .get_mut("fields")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| "missing `fields` object".to_string())?;

        for (id, field) in fields.iter_mut() {
            let mut slots = Vec::new();
            if let Some(texts) = field.get_mut("texts").and_then(Value::as_object_mut) {
                for (language, text) in texts.iter_mut() {
                    if let Value::String(text) = text {
                        slots.push((language.clone(), text));
                    }
                }
            }
            visit(id.clone(), slots);
        }
        Ok(())
    }
}

impl ContentCodec for TextTableCodec {
    fn decode_original(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        decode_layout(self, artifact, "text table", bytes)
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
