// Qdrant-backed vector index
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, vectors_config::Config as VectorsConfigKind,
        with_payload_selector::SelectorOptions, Condition, CountPoints, Distance, Filter,
        GetCollectionInfoRequest, PointId, SearchParams, SearchPoints, Value as QdrantValue,
        WithPayloadSelector,
    },
    Qdrant,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

use super::{IndexVectorParams, SimilarityMetric, VectorIndex};
use crate::errors::{RagError, Result};
use crate::types::{MetadataFilter, Passage, PassageMetadata, RetrievalRequest};

/// Payload key holding the passage text
const CONTENT_KEY: &str = "content";
/// Payload key holding the metadata object
const METADATA_KEY: &str = "metadata";

/// Vector index stored in a Qdrant collection
///
/// Points carry `{content, metadata: {source_file, source_dir, page, page_label}}`.
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
    collection: String,
}

impl QdrantIndex {
    /// Connect to a Qdrant server (gRPC port, usually 6334)
    pub fn connect(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut config = Qdrant::from_url(url).timeout(timeout);
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            config = config.api_key(key);
        }
        let client = config
            .build()
            .map_err(|e| RagError::Initialization(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            collection: collection.to_string(),
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(&self, request: &RetrievalRequest) -> Result<Vec<Passage>> {
        let filter = request.filter.as_ref().map(to_qdrant_filter).transpose()?;

        let response = self
            .client
            .search_points(SearchPoints {
                collection_name: self.collection.clone(),
                vector: request.query_vector.clone(),
                limit: request.limit as u64,
                filter,
                params: Some(SearchParams {
                    hnsw_ef: Some(request.num_candidates as u64),
                    ..Default::default()
                }),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::VectorStore(format!("Search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| passage_from_payload(point_id_to_string(&point.id), point.payload, point.score))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPoints {
                collection_name: self.collection.clone(),
                exact: Some(true),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::VectorStore(format!("Count failed: {}", e)))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| RagError::VectorStore(format!("Qdrant unreachable at {}: {}", self.url, e)))
    }

    async fn vector_params(&self) -> Result<Option<IndexVectorParams>> {
        let info = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: self.collection.clone(),
            })
            .await
            .map_err(|e| {
                RagError::VectorStore(format!("Collection '{}' unavailable: {}", self.collection, e))
            })?;

        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        let vector = match params {
            Some(VectorsConfigKind::Params(params)) => params,
            // Named vectors: only a single unnamed layout is supported
            Some(VectorsConfigKind::ParamsMap(_)) | None => return Ok(None),
        };

        let metric = match Distance::try_from(vector.distance) {
            Ok(Distance::Cosine) => SimilarityMetric::Cosine,
            Ok(Distance::Dot) => SimilarityMetric::Dot,
            Ok(Distance::Euclid) => SimilarityMetric::Euclid,
            Ok(Distance::Manhattan) => SimilarityMetric::Manhattan,
            _ => {
                return Err(RagError::VectorStore(format!(
                    "Collection '{}' reports unknown distance {}",
                    self.collection, vector.distance
                )))
            }
        };

        Ok(Some(IndexVectorParams {
            dimension: vector.size as usize,
            metric,
        }))
    }

    fn database_id(&self) -> String {
        self.url.clone()
    }

    fn collection_id(&self) -> String {
        self.collection.clone()
    }
}

/// Metadata filter -> `must` conditions on `metadata.<field>`
fn to_qdrant_filter(filter: &MetadataFilter) -> Result<Filter> {
    let conditions = filter
        .conditions()
        .map(|(field, value)| {
            let key = format!("{}.{}", METADATA_KEY, field);
            match value {
                JsonValue::String(s) => Ok(Condition::matches(key, s.clone())),
                JsonValue::Bool(b) => Ok(Condition::matches(key, *b)),
                JsonValue::Number(n) => n
                    .as_i64()
                    .map(|i| Condition::matches(key, i))
                    .ok_or_else(|| {
                        RagError::VectorStore(format!("Filter on '{}' needs an integer", field))
                    }),
                other => Err(RagError::VectorStore(format!(
                    "Unsupported filter value for '{}': {}",
                    field, other
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Filter::must(conditions))
}

fn passage_from_payload(id: String, payload: HashMap<String, QdrantValue>, score: f32) -> Passage {
    let text = payload
        .get(CONTENT_KEY)
        .or_else(|| payload.get("text"))
        .and_then(qdrant_value_to_string)
        .unwrap_or_default();

    let metadata = match payload.get(METADATA_KEY).and_then(qdrant_to_json_value) {
        Some(nested @ JsonValue::Object(_)) => PassageMetadata::from_json(&nested),
        // Flat payloads keep metadata fields at the top level
        _ => {
            let flat: serde_json::Map<String, JsonValue> = payload
                .iter()
                .filter_map(|(k, v)| qdrant_to_json_value(v).map(|j| (k.clone(), j)))
                .collect();
            PassageMetadata::from_json(&JsonValue::Object(flat))
        }
    };

    Passage {
        id,
        text,
        metadata,
        score,
    }
}

// Helper functions for type conversions
fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::NullValue(_) => Some(JsonValue::Null),
        Kind::StructValue(s) => Some(JsonValue::Object(
            s.fields
                .iter()
                .filter_map(|(k, v)| qdrant_to_json_value(v).map(|j| (k.clone(), j)))
                .collect(),
        )),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
    })
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref() {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn point_id_to_string(point_id: &Option<PointId>) -> String {
    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::Struct;

    fn string(s: &str) -> QdrantValue {
        QdrantValue::from(s.to_string())
    }

    #[test]
    fn test_nested_payload_to_passage() {
        let mut metadata = HashMap::new();
        metadata.insert("source_file".to_string(), string("6331_sayili_kanun.pdf"));
        metadata.insert("source_dir".to_string(), string("KANUN VE YÖNETMELİKLER"));
        metadata.insert("page".to_string(), QdrantValue::from(3i64));
        metadata.insert("page_label".to_string(), string("4"));

        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), string("MADDE 4 - İşverenin genel yükümlülüğü"));
        payload.insert(
            METADATA_KEY.to_string(),
            QdrantValue {
                kind: Some(Kind::StructValue(Struct { fields: metadata })),
            },
        );

        let passage = passage_from_payload("p1".to_string(), payload, 0.82);
        assert_eq!(passage.text, "MADDE 4 - İşverenin genel yükümlülüğü");
        assert_eq!(passage.metadata.source_file, "6331_sayili_kanun.pdf");
        assert_eq!(passage.metadata.page, Some(3));
        assert_eq!(passage.metadata.display_page(), "4");
        assert!((passage.score - 0.82).abs() < f32::EPSILON);
    }

    #[test]
    fn test_flat_payload_to_passage() {
        let mut payload = HashMap::new();
        payload.insert("text".to_string(), string("MADDE 26"));
        payload.insert("source_file".to_string(), string("kanun.pdf"));

        let passage = passage_from_payload("p2".to_string(), payload, 0.5);
        assert_eq!(passage.text, "MADDE 26");
        assert_eq!(passage.metadata.source_file, "kanun.pdf");
        assert_eq!(passage.metadata.source_dir, "");
    }

    #[test]
    fn test_filter_targets_metadata_fields() {
        let filter = to_qdrant_filter(&MetadataFilter::source_dir("TEBLİĞ")).unwrap();
        assert_eq!(filter.must.len(), 1);

        let nested = MetadataFilter::new().equals("page", serde_json::json!({"a": 1}));
        assert!(to_qdrant_filter(&nested).is_err());
    }

    #[test]
    fn test_point_id_conversion() {
        assert_eq!(point_id_to_string(&Some(PointId::from(7u64))), "7");
        assert_eq!(point_id_to_string(&None), "unknown");
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_live_count() {
        let index = QdrantIndex::connect(
            "http://localhost:6334",
            None,
            "documents",
            Duration::from_secs(5),
        )
        .unwrap();
        index.ping().await.unwrap();
        assert!(index.count().await.unwrap() > 0);
    }
}
