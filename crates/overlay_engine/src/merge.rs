//! Overlay patch values onto an original document.
//!
//! # Merge Algorithm
//!
//! 1. Index the patch by entry key. Duplicate patch keys resolve last-writer-wins.
//! 2. Walk the original entries in order. For an entry with a patch counterpart,
//!    overwrite each field whose name matches a patch field with a **non-empty**
//!    value. Empty patch values mean "no translation available" and never blank
//!    out original content.
//! 3. Original entries without a patch counterpart pass through untouched.
//! 4. Patch entries without an original counterpart are dropped. Merging never
//!    adds keys to the host's content.
//!
//! The merge always runs against the original snapshot, so merging the same
//! patch twice yields the same document.

use crate::document::{ContentDocument, Field};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Counters describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Entries in the original document.
    pub original_entries: usize,
    /// Original entries that had a patch counterpart.
    pub matched_entries: usize,
    /// Field values that were replaced.
    pub overridden_fields: usize,
    /// Patch fields skipped because their value was empty.
    pub empty_patch_fields: usize,
    /// Patch keys with no original counterpart (dropped).
    pub unmatched_patch_keys: Vec<String>,
}

/// Merge `patch` onto `original`. See the module docs for the rules.
pub fn merge(original: &ContentDocument, patch: &ContentDocument) -> ContentDocument {
    merge_with_report(original, patch).0
}

/// Like [`merge`], also returning a [`MergeReport`].
pub fn merge_with_report(
    original: &ContentDocument,
    patch: &ContentDocument,
) -> (ContentDocument, MergeReport) {
    let mut lookup: HashMap<&str, HashMap<&str, &str>> = HashMap::with_capacity(patch.len());
    for entry in &patch.entries {
        let fields = lookup.entry(entry.key.as_str()).or_default();
        // A later duplicate entry replaces the earlier one wholesale.
        fields.clear();
        for field in &entry.fields {
            fields.insert(field.name.as_str(), field.value.as_str());
        }
    }

    let mut report = MergeReport {
        original_entries: original.len(),
        ..Default::default()
    };

    let mut seen: HashSet<&str> = HashSet::with_capacity(original.len());
    let mut merged = original.clone();

    for entry in &mut merged.entries {
        let Some(patch_fields) = lookup.get(entry.key.as_str()) else {
            continue;
        };
        report.matched_entries += 1;

        for Field { name, value } in &mut entry.fields {
            match patch_fields.get(name.as_str()) {
                Some(patched) if !patched.is_empty() => {
                    *value = (*patched).to_string();
                    report.overridden_fields += 1;
                }
                Some(_) => report.empty_patch_fields += 1,
                None => {}
            }
        }
    }

    for entry in &original.entries {
        seen.insert(entry.key.as_str());
    }
    let mut reported: HashSet<&str> = HashSet::new();
    for entry in &patch.entries {
        let key = entry.key.as_str();
        if !seen.contains(key) && reported.insert(key) {
            report.unmatched_patch_keys.push(key.to_string());
        }
    }

    if !report.unmatched_patch_keys.is_empty() {
        tracing::debug!(
            "Ignoring {} patch entries with no original counterpart",
            report.unmatched_patch_keys.len()
        );
    }

    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Entry;
    use proptest::prelude::*;

    fn original() -> ContentDocument {
        ContentDocument::new(vec![
            Entry::new("Intro#1")
                .with_field("Title", "Greeting")
                .with_field("Dialogue Text", "Hello")
                .with_field("Menu Text", "Hi"),
            Entry::new("Intro#2").with_field("Dialogue Text", "Bye"),
            Entry::new("Outro#1").with_field("Dialogue Text", "The end"),
        ])
    }

    #[test]
    fn test_overrides_matching_fields() {
        let patch = ContentDocument::new(vec![Entry::new("Intro#1")
            .with_field("Dialogue Text", "Merhaba")
            .with_field("Menu Text", "Selam")]);

        let (merged, report) = merge_with_report(&original(), &patch);
        let intro = merged.get("Intro#1").unwrap();
        assert_eq!(intro.field("Dialogue Text"), Some("Merhaba"));
        assert_eq!(intro.field("Menu Text"), Some("Selam"));
        assert_eq!(intro.field("Title"), Some("Greeting"));
        assert_eq!(report.matched_entries, 1);
        assert_eq!(report.overridden_fields, 2);
    }

    #[test]
    fn test_empty_patch_value_keeps_original() {
        let patch = ContentDocument::new(vec![Entry::new("Intro#1")
            .with_field("Dialogue Text", "")
            .with_field("Menu Text", "Selam")]);

        let (merged, report) = merge_with_report(&original(), &patch);
        let intro = merged.get("Intro#1").unwrap();
        assert_eq!(intro.field("Dialogue Text"), Some("Hello"));
        assert_eq!(intro.field("Menu Text"), Some("Selam"));
        assert_eq!(report.empty_patch_fields, 1);
    }

    #[test]
    fn test_unmatched_patch_keys_are_dropped() {
        let patch = ContentDocument::new(vec![
            Entry::new("Secret#9").with_field("Dialogue Text", "injected"),
            Entry::new("Secret#9").with_field("Dialogue Text", "again"),
        ]);

        let (merged, report) = merge_with_report(&original(), &patch);
        assert_eq!(merged, original());
        assert!(merged.get("Secret#9").is_none());
        assert_eq!(report.unmatched_patch_keys, vec!["Secret#9".to_string()]);
    }

    #[test]
    fn test_duplicate_patch_keys_last_wins() {
        let patch = ContentDocument::new(vec![
            Entry::new("Intro#2").with_field("Dialogue Text", "first"),
            Entry::new("Intro#2").with_field("Dialogue Text", "second"),
        ]);

        let merged = merge(&original(), &patch);
        assert_eq!(
            merged.get("Intro#2").unwrap().field("Dialogue Text"),
            Some("second")
        );
    }

    #[test]
    fn test_duplicate_original_keys_all_patched() {
        let original = ContentDocument::new(vec![
            Entry::new("dup").with_field("text", "a"),
            Entry::new("dup").with_field("text", "b"),
        ]);
        let patch = ContentDocument::new(vec![Entry::new("dup").with_field("text", "z")]);

        let merged = merge(&original, &patch);
        assert!(merged.entries.iter().all(|e| e.field("text") == Some("z")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let merged = merge(&original(), &ContentDocument::default());
        assert_eq!(merged, original());
    }

    fn arb_document() -> impl Strategy<Value = ContentDocument> {
        let field = ("[a-c]", "[a-z]{0,3}").prop_map(|(n, v)| Field::new(n, v));
        let entry = ("k[0-9]", prop::collection::vec(field, 0..4))
            .prop_map(|(key, fields)| Entry { key, fields });
        prop::collection::vec(entry, 0..12).prop_map(ContentDocument::new)
    }

    proptest! {
        #[test]
        fn prop_preserves_count_and_order(original in arb_document(), patch in arb_document()) {
            let merged = merge(&original, &patch);
            prop_assert_eq!(merged.len(), original.len());
            let original_keys: Vec<&str> = original.keys().collect();
            let merged_keys: Vec<&str> = merged.keys().collect();
            prop_assert_eq!(merged_keys, original_keys);
        }

        #[test]
        fn prop_never_injects_keys(original in arb_document(), patch in arb_document()) {
            let merged = merge(&original, &patch);
            let original_keys: HashSet<&str> = original.keys().collect();
            for key in merged.keys() {
                prop_assert!(original_keys.contains(key));
            }
        }

        #[test]
        fn prop_field_values_follow_patch(original in arb_document(), patch in arb_document()) {
            let merged = merge(&original, &patch);
            let patch_index = patch.index();
            for (orig, out) in original.entries.iter().zip(&merged.entries) {
                for (of, mf) in orig.fields.iter().zip(&out.fields) {
                    prop_assert_eq!(&of.name, &mf.name);
                    let patched = patch_index
                        .get(orig.key.as_str())
                        .and_then(|&pos| {
                            patch.entries[pos]
                                .fields
                                .iter()
                                .rev()
                                .find(|f| f.name == of.name)
                                .map(|f| f.value.as_str())
                        })
                        .filter(|v| !v.is_empty());
                    match patched {
                        Some(v) => prop_assert_eq!(mf.value.as_str(), v),
                        None => prop_assert_eq!(&mf.value, &of.value),
                    }
                }
            }
        }

        #[test]
        fn prop_idempotent(original in arb_document(), patch in arb_document()) {
            let once = merge(&original, &patch);
            let twice = merge(&once, &patch);
            prop_assert_eq!(twice, once);
        }
    }
}
