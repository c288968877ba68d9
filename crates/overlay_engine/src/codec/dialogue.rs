//! Dialogue database exports.
//!
//! Original (host export):
//!
//! ```json
//! {
//!   "actors": [ ... ],
//!   "conversations": [
//!     {
//!       "id": 1,
//!       "fields": [{ "title": "Title", "value": "Intro" }],
//!       "dialogueEntries": [
//!         { "id": 3, "fields": [{ "title": "Dialogue Text", "value": "Hello" }] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Patch (translation document):
//!
//! ```json
//! {
//!   "conversations": [
//!     { "Title": "Intro", "Dialogue": [{ "entryId": 3, "Dialogue Text": "Merhaba", "Menu Text": "" }] }
//!   ]
//! }
//! ```

use super::{decode_layout, encode_layout, strip_bom, ContentCodec, NativeLayout, Slot};
use crate::document::{ContentDocument, Entry};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

pub const DIALOGUE_TEXT: &str = "Dialogue Text";
pub const MENU_TEXT: &str = "Menu Text";

const TITLE_FIELD: &str = "Title";

/// Codec for dialogue database exports and their translation documents.
pub struct DialogueDatabaseCodec;

/// Entry key for a dialogue entry.
pub fn dialogue_key(conversation_title: &str, entry_id: i64) -> String {
    format!("{}#{}", conversation_title, entry_id)
}

#[derive(Deserialize)]
struct TranslationRoot {
    conversations: Vec<TranslationConversation>,
}

#[derive(Deserialize)]
struct TranslationConversation {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Dialogue", default)]
    dialogue: Vec<TranslationEntry>,
}

#[derive(Deserialize)]
struct TranslationEntry {
    #[serde(rename = "entryId")]
    entry_id: i64,
    #[serde(rename = "Dialogue Text", default)]
    dialogue_text: Option<String>,
    #[serde(rename = "Menu Text", default)]
    menu_text: Option<String>,
}

impl NativeLayout for DialogueDatabaseCodec {
    fn walk<'a>(
        &self,
        root: &'a mut Value,
        visit: &mut dyn FnMut(String, Vec<Slot<'a>>),
    ) -> std::result::Result<(), String> {
        let conversations = root
            .get_mut("conversations")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| "missing `conversations` array".to_string())?;

        for (index, conversation) in conversations.iter_mut().enumerate() {
            let title = conversation
                .get("fields")
                .and_then(Value::as_array)
                .and_then(|fields| conversation_title(fields))
                .ok_or_else(|| format!("conversation #{} has no Title field", index))?;

            let Some(entries) = conversation
                .get_mut("dialogueEntries")
                .and_then(Value::as_array_mut)
            else {
                continue;
            };

            for entry in entries.iter_mut() {
                let id = entry
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| format!("dialogue entry in '{}' has no numeric id", title))?;

                let mut slots = Vec::new();
                if let Some(fields) = entry.get_mut("fields").and_then(Value::as_array_mut) {
                    for field in fields.iter_mut() {
                        let Some(object) = field.as_object_mut() else {
                            continue;
                        };
                        let Some(name) = object.get("title").and_then(Value::as_str) else {
                            continue;
                        };
                        let name = name.to_string();
                        if let Some(Value::String(value)) = object.get_mut("value") {
                            slots.push((name, value));
                        }
                    }
                }

                visit(dialogue_key(&title, id), slots);
            }
        }

        Ok(())
    }
}

fn conversation_title(fields: &[Value]) -> Option<String> {
    fields.iter().find_map(|field| {
        (field.get("title")?.as_str()? == TITLE_FIELD)
            .then(|| field.get("value")?.as_str().map(str::to_string))
            .flatten()
    })
}

impl ContentCodec for DialogueDatabaseCodec {
    fn decode_original(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        decode_layout(self, artifact, "dialogue database", bytes)
    }

    fn decode_patch(&self, artifact: &str, bytes: &[u8]) -> Result<ContentDocument> {
        let root: TranslationRoot = serde_json::from_slice(strip_bom(bytes))
            .map_err(|e| Error::parse(artifact, "dialogue translation", e))?;

        let mut entries = Vec::new();
        for conversation in root.conversations {
            for line in conversation.dialogue {
                let mut entry = Entry::new(dialogue_key(&conversation.title, line.entry_id));
                if let Some(text) = line.dialogue_text {
                    entry = entry.with_field(DIALOGUE_TEXT, text);
                }
                if let Some(text) = line.menu_text {
                    entry = entry.with_field(MENU_TEXT, text);
                }
                entries.push(entry);
            }
        }
        Ok(ContentDocument::new(entries))
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
