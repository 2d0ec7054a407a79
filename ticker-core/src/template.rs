//! Template descriptors and field-schema resolution.
//!
//! A style's template arrives from the server as a JSON object of named
//! entries, each holding a list of text segments. Segment text may embed
//! `{field}` placeholders; the set of distinct placeholder names, in first
//! occurrence order, becomes the editable field schema for that style.
//!
//! Placeholder grammar: `{` IDENT `}` where IDENT is one or more characters
//! excluding `{` and `}`. An unterminated `{`, an empty `{}` and a nested
//! `{` all fail to form a placeholder and are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CoreConfig;

/// One positioned text segment of a template entry.
///
/// Rendering attributes (position, font, colour) are opaque to the core and
/// ignored on decode; only `text` matters for schema resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSegment {
    /// Text content, possibly containing `{field}` placeholders.
    #[serde(default)]
    pub text: String,
}

/// A named group of segments inside a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Segments in draw order.
    #[serde(default)]
    pub segments: Vec<TemplateSegment>,
}

/// A style's template as fetched from the server.
///
/// Kept as raw JSON values so a single malformed entry degrades to "skipped"
/// rather than failing the whole descriptor. Entry order is the server's
/// object order (`serde_json` is built with `preserve_order`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateDescriptor {
    /// Named entries in server order.
    pub entries: serde_json::Map<String, Value>,
}

impl TemplateDescriptor {
    /// Iterate the entries that decode as [`TemplateEntry`], skipping
    /// malformed ones.
    pub fn parsed_entries(&self) -> impl Iterator<Item = (&str, TemplateEntry)> + '_ {
        self.entries.iter().filter_map(|(name, value)| {
            serde_json::from_value::<TemplateEntry>(value.clone())
                .ok()
                .map(|entry| (name.as_str(), entry))
        })
    }
}

/// Schema of one editable form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Stable field key (the placeholder name).
    pub key: String,
    /// Display label.
    pub label: String,
    /// Whether the field must be non-empty to generate a ticket.
    #[serde(default)]
    pub required: bool,
    /// Input hint shown to the user.
    #[serde(default)]
    pub description: String,
    /// Whether the field participates in generation by default.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FieldSchema {
    /// Schema derived from a template placeholder: optional, enabled, with a
    /// generated input hint.
    #[must_use]
    pub fn derived(name: &str) -> Self {
        Self {
            key: name.to_string(),
            label: name.to_string(),
            required: false,
            description: format!("请输入{name}"),
            enabled: true,
        }
    }
}

/// The built-in fallback schema used when a descriptor yields no fields.
#[must_use]
pub fn default_fields() -> Vec<FieldSchema> {
    let fields = [
        ("上票号", false),
        ("检票口", false),
        ("出发站", true),
        ("到达站", true),
        ("车次", true),
        ("日期", true),
        ("时间", true),
        ("座位号", false),
        ("票价", false),
    ];
    fields
        .into_iter()
        .map(|(name, required)| FieldSchema {
            required,
            ..FieldSchema::derived(name)
        })
        .collect()
}

/// Extract placeholder names from segment text, in order of appearance.
///
/// Duplicates are kept; deduplication happens at schema level where first
/// occurrence order must win across segments.
#[must_use]
pub fn placeholder_names(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        rest = &rest[open + 1..];
        let Some(end) = rest.find(|c| c == '{' || c == '}') else {
            break;
        };
        if rest[end..].starts_with('}') {
            if end > 0 {
                names.push(&rest[..end]);
            }
            rest = &rest[end + 1..];
        } else {
            // A second `{` before any `}`: restart the scan from it.
            rest = &rest[end..];
        }
    }
    names
}

/// Derives editable field schemas from template descriptors.
///
/// Pure and infallible: a descriptor that yields no usable placeholders
/// resolves to the configured default schema, never to an empty one.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    defaults: Vec<FieldSchema>,
}

impl SchemaResolver {
    /// Resolver with an explicit fallback schema.
    #[must_use]
    pub fn new(defaults: Vec<FieldSchema>) -> Self {
        Self { defaults }
    }

    /// Resolver using the configured default field set.
    #[must_use]
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.default_fields.clone())
    }

    /// Resolve the field schema for `descriptor`.
    ///
    /// First occurrence across all entries and segments wins; later
    /// duplicates are ignored. Same descriptor in, same schema out.
    #[must_use]
    pub fn resolve(&self, descriptor: &TemplateDescriptor) -> Vec<FieldSchema> {
        let mut seen = std::collections::HashSet::new();
        let mut fields = Vec::new();
        for (_, entry) in descriptor.parsed_entries() {
            for segment in &entry.segments {
                for name in placeholder_names(&segment.text) {
                    if seen.insert(name.to_string()) {
                        fields.push(FieldSchema::derived(name));
                    }
                }
            }
        }
        if fields.is_empty() {
            tracing::debug!("descriptor yielded no fields, using default schema");
            self.defaults.clone()
        } else {
            fields
        }
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new(default_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Value) -> TemplateDescriptor {
        serde_json::from_value(value).expect("descriptor should decode")
    }

    #[test]
    fn test_placeholder_extraction_basic() {
        assert_eq!(placeholder_names("{出发站} → {到达站}"), vec!["出发站", "到达站"]);
    }

    #[test]
    fn test_placeholder_extraction_ignores_malformed() {
        assert_eq!(placeholder_names("{}"), Vec::<&str>::new());
        assert_eq!(placeholder_names("{未闭合"), Vec::<&str>::new());
        assert_eq!(placeholder_names("尾括号}"), Vec::<&str>::new());
        // Nested open brace restarts the scan at the inner one.
        assert_eq!(placeholder_names("{外{内}"), vec!["内"]);
    }

    #[test]
    fn test_placeholder_extraction_keeps_duplicates_in_order() {
        assert_eq!(placeholder_names("{A}{B}{A}"), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_resolve_dedupes_first_occurrence() {
        let resolver = SchemaResolver::default();
        let desc = descriptor(json!({
            "row1": { "segments": [{ "text": "{A}" }, { "text": "{B}" }] },
            "row2": { "segments": [{ "text": "{A}" }] },
        }));
        let fields = resolver.resolve(&desc);
        let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = SchemaResolver::default();
        let desc = descriptor(json!({
            "a": { "segments": [{ "text": "{车次}" }] },
            "b": { "segments": [{ "text": "{日期} {时间}" }] },
        }));
        assert_eq!(resolver.resolve(&desc), resolver.resolve(&desc));
    }

    #[test]
    fn test_derived_field_shape() {
        let field = FieldSchema::derived("出发站");
        assert_eq!(field.label, "出发站");
        assert_eq!(field.description, "请输入出发站");
        assert!(!field.required);
        assert!(field.enabled);
    }

    #[test]
    fn test_empty_descriptor_falls_back_to_defaults() {
        let resolver = SchemaResolver::default();
        let fields = resolver.resolve(&TemplateDescriptor::default());
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[2].key, "出发站");
        assert!(fields[2].required);
    }

    #[test]
    fn test_malformed_entries_skipped_not_fatal() {
        let resolver = SchemaResolver::default();
        let desc = descriptor(json!({
            "bad": { "segments": "not-a-list" },
            "good": { "segments": [{ "text": "{票价}" }] },
        }));
        let fields = resolver.resolve(&desc);
        let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["票价"]);
    }

    #[test]
    fn test_fully_malformed_descriptor_falls_back() {
        let resolver = SchemaResolver::default();
        let desc = descriptor(json!({
            "bad": { "segments": [{ "text": "没有占位符" }] },
        }));
        assert_eq!(resolver.resolve(&desc).len(), 9);
    }

    #[test]
    fn test_default_fields_required_set() {
        let fields = default_fields();
        let required: Vec<&str> = fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.key.as_str())
            .collect();
        assert_eq!(required, vec!["出发站", "到达站", "车次", "日期", "时间"]);
    }
}
