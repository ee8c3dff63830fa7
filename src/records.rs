//! JSON records and tag extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::dsl::{Record, Value};

/// Field paths walk nested objects. Numbers, strings and booleans are
/// scalars; null, arrays and objects count as absent.
impl Record for Json {
    fn tags(&self) -> Vec<String> {
        TagSource::default().extract(self)
    }

    fn resolve(&self, path: &[String]) -> Value {
        let mut current = self;
        for segment in path {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Value::Absent,
            }
        }

        match current {
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Value::Absent, Value::Number),
            Json::String(s) => Value::Text(s.clone()),
            Json::Null | Json::Array(_) | Json::Object(_) => Value::Absent,
        }
    }
}

/// Where a record keeps its tags: an array of strings, or a single string
/// joined with `separator`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TagSource {
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_field() -> String {
    "tags".to_string()
}

fn default_separator() -> String {
    ",".to_string()
}

impl Default for TagSource {
    fn default() -> Self {
        Self {
            field: default_field(),
            separator: default_separator(),
        }
    }
}

impl TagSource {
    /// Collect the tags of a record, trimmed, with empty entries dropped.
    pub fn extract(&self, record: &Json) -> Vec<String> {
        let found = self
            .field
            .split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(record, |current, segment| current.get(segment));

        let mut tags: Vec<String> = match found {
            Some(Json::String(joined)) if self.separator.is_empty() => vec![joined.clone()],
            Some(Json::String(joined)) => joined
                .split(self.separator.as_str())
                .map(str::to_string)
                .collect(),
            Some(Json::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        for tag in &mut tags {
            let trimmed = tag.trim();
            if trimmed.len() != tag.len() {
                *tag = trimmed.to_string();
            }
        }
        tags.retain(|tag| !tag.is_empty());
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_nested_fields() {
        let record = json!({
            "rating": 4.5,
            "meta": { "words": 1200, "complete": true, "title": "Dawn" },
            "chapters": [1, 2],
            "sequel": null,
        });
        assert_eq!(record.resolve(&path("rating")), Value::Number(4.5));
        assert_eq!(record.resolve(&path("meta.words")), Value::Number(1200.0));
        assert_eq!(record.resolve(&path("meta.complete")), Value::Bool(true));
        assert_eq!(record.resolve(&path("meta.title")), Value::Text("Dawn".into()));
        assert_eq!(record.resolve(&path("meta.missing")), Value::Absent);
        assert_eq!(record.resolve(&path("rating.deeper")), Value::Absent);
        assert_eq!(record.resolve(&path("chapters")), Value::Absent);
        assert_eq!(record.resolve(&path("sequel")), Value::Absent);
    }

    #[test]
    fn test_tags_from_joined_string() {
        let source = TagSource {
            field: "story_tags".into(),
            separator: ",".into(),
        };
        let record = json!({ "story_tags": "Adventure, Slice of Life,,Romance " });
        assert_eq!(
            source.extract(&record),
            vec!["Adventure", "Slice of Life", "Romance"]
        );
    }

    #[test]
    fn test_tags_from_array_and_nested_field() {
        let source = TagSource {
            field: "meta.tags".into(),
            separator: ",".into(),
        };
        let record = json!({ "meta": { "tags": ["fantasy", 3, " drama "] } });
        assert_eq!(source.extract(&record), vec!["fantasy", "drama"]);
        assert!(source.extract(&json!({ "tags": ["x"] })).is_empty());
    }

    #[test]
    fn test_default_tags_field() {
        let record = json!({ "tags": "a,b" });
        assert_eq!(record.tags(), vec!["a", "b"]);
    }
}
