//! Retrieved passages and the request shape used to fetch them

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Label used when a passage carries no `source_file`
pub const UNKNOWN_SOURCE: &str = "Bilinmeyen Kaynak";

/// Fixed-shape passage metadata written at ingestion time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub source_file: String,
    #[serde(default)]
    pub source_dir: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_label: Option<String>,
}

impl PassageMetadata {
    /// Page shown in citations: label first, then raw page index, then "N/A"
    pub fn display_page(&self) -> String {
        match (&self.page_label, self.page) {
            (Some(label), _) if !label.trim().is_empty() => label.clone(),
            (_, Some(page)) => page.to_string(),
            _ => "N/A".to_string(),
        }
    }

    /// Build from a loosely-typed payload object; missing fields take defaults
    pub fn from_json(value: &JsonValue) -> Self {
        let text = |key: &str| {
            value.get(key).and_then(|v| match v {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        let page = value.get("page").and_then(|v| match v {
            JsonValue::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Self {
            source_file: text("source_file")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            source_dir: text("source_dir").unwrap_or_default(),
            page,
            page_label: text("page_label"),
        }
    }
}

impl Default for PassageMetadata {
    fn default() -> Self {
        Self {
            source_file: UNKNOWN_SOURCE.to_string(),
            source_dir: String::new(),
            page: None,
            page_label: None,
        }
    }
}

/// A retrieved chunk of corpus text. Never mutated after retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub metadata: PassageMetadata,
    /// Vector similarity score from the broad retrieval pass
    pub score: f32,
}

/// Passage with the second-pass relevance score attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPassage {
    pub passage: Passage,
    pub relevance: f32,
}

/// Equality predicates over passage metadata fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, JsonValue>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition on `field`
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Restrict to passages from one source directory
    pub fn source_dir(value: impl Into<String>) -> Self {
        Self::new().equals("source_dir", value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.conditions.iter()
    }

    /// Check a passage against every condition
    pub fn matches(&self, metadata: &PassageMetadata) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = match field.as_str() {
                "source_file" => JsonValue::from(metadata.source_file.clone()),
                "source_dir" => JsonValue::from(metadata.source_dir.clone()),
                "page" => metadata.page.map(JsonValue::from).unwrap_or(JsonValue::Null),
                "page_label" => metadata
                    .page_label
                    .clone()
                    .map(JsonValue::from)
                    .unwrap_or(JsonValue::Null),
                _ => JsonValue::Null,
            };
            &actual == expected
        })
    }
}

/// One vector-store query. Lives only for the duration of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query_vector: Vec<f32>,
    /// ANN candidate pool size (10 x limit)
    pub num_candidates: usize,
    pub limit: usize,
    pub filter: Option<MetadataFilter>,
}

/// Candidate pool multiplier applied to every search
pub const CANDIDATE_MULTIPLIER: usize = 10;

impl RetrievalRequest {
    pub fn new(query_vector: Vec<f32>, k: usize, filter: Option<MetadataFilter>) -> Self {
        Self {
            query_vector,
            num_candidates: k.saturating_mul(CANDIDATE_MULTIPLIER),
            limit: k,
            filter: filter.filter(|f| !f.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(file: &str, dir: &str, page: Option<u32>, label: Option<&str>) -> PassageMetadata {
        PassageMetadata {
            source_file: file.to_string(),
            source_dir: dir.to_string(),
            page,
            page_label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_display_page_prefers_label() {
        assert_eq!(metadata("a.pdf", "", Some(3), Some("4")).display_page(), "4");
        assert_eq!(metadata("a.pdf", "", Some(3), None).display_page(), "3");
        assert_eq!(metadata("a.pdf", "", None, Some("  ")).display_page(), "N/A");
    }

    #[test]
    fn test_metadata_from_loose_payload() {
        let parsed = PassageMetadata::from_json(&serde_json::json!({
            "source_file": "6331_sayili_kanun.pdf",
            "source_dir": "KANUN VE YÖNETMELİKLER",
            "page": "7",
            "page_label": 8
        }));
        assert_eq!(parsed.page, Some(7));
        assert_eq!(parsed.page_label.as_deref(), Some("8"));

        let empty = PassageMetadata::from_json(&serde_json::json!({}));
        assert_eq!(empty, PassageMetadata::default());
    }

    #[test]
    fn test_oversized_page_number_dropped() {
        let parsed = PassageMetadata::from_json(&serde_json::json!({
            "source_file": "6331_sayili_kanun.pdf",
            "page": u64::from(u32::MAX) + 1
        }));
        assert_eq!(parsed.page, None);

        let max = PassageMetadata::from_json(&serde_json::json!({ "page": u32::MAX }));
        assert_eq!(max.page, Some(u32::MAX));
    }

    #[test]
    fn test_request_candidate_pool() {
        let request = RetrievalRequest::new(vec![0.0; 4], 50, None);
        assert_eq!(request.limit, 50);
        assert_eq!(request.num_candidates, 500);
    }

    #[test]
    fn test_empty_filter_dropped() {
        let request = RetrievalRequest::new(vec![], 5, Some(MetadataFilter::new()));
        assert!(request.filter.is_none());
    }

    #[test]
    fn test_filter_matches() {
        let filter = MetadataFilter::source_dir("TEBLİĞ");
        assert!(filter.matches(&metadata("x.pdf", "TEBLİĞ", None, None)));
        assert!(!filter.matches(&metadata("x.pdf", "KANUN VE YÖNETMELİKLER", None, None)));

        let by_page = MetadataFilter::new().equals("page", 2);
        assert!(by_page.matches(&metadata("x.pdf", "", Some(2), None)));
        assert!(!by_page.matches(&metadata("x.pdf", "", None, None)));
    }
}
