//! Index schema and document shapes

use serde::Serialize;
use serde_json::{json, Value};

const HNSW_CONFIG: &str = "default-hnsw";
const VECTOR_PROFILE: &str = "default-vector-profile";

/// Index definition accepted by `PUT /indexes/{name}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<IndexField>,
    pub vector_search: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facetable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

impl IndexField {
    fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "Edm.String".to_string(),
            key: None,
            searchable: None,
            filterable: None,
            sortable: None,
            facetable: None,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    fn vector(name: &str, dimensions: usize) -> Self {
        Self {
            field_type: "Collection(Edm.Single)".to_string(),
            searchable: Some(true),
            dimensions: Some(dimensions),
            vector_search_profile: Some(VECTOR_PROFILE.to_string()),
            ..Self::string(name)
        }
    }
}

impl IndexSchema {
    /// The schema the ingestion tool writes and the query pipeline reads:
    /// `id`, `content`, `source`, `createdAt` and the vector field.
    pub fn standard(name: &str, dimensions: usize, vector_field: &str) -> Self {
        let fields = vec![
            IndexField {
                key: Some(true),
                filterable: Some(true),
                ..IndexField::string("id")
            },
            IndexField {
                searchable: Some(true),
                ..IndexField::string("content")
            },
            IndexField {
                filterable: Some(true),
                facetable: Some(true),
                ..IndexField::string("source")
            },
            IndexField {
                filterable: Some(true),
                sortable: Some(true),
                ..IndexField::string("createdAt")
            },
            IndexField::vector(vector_field, dimensions),
        ];

        Self {
            name: name.to_string(),
            fields,
            vector_search: json!({
                "algorithms": [{ "name": HNSW_CONFIG, "kind": "hnsw" }],
                "profiles": [{ "name": VECTOR_PROFILE, "algorithm": HNSW_CONFIG }],
            }),
        }
    }
}

/// One chunk as stored in the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub source: String,
    pub created_at: String,
}

impl IndexDocument {
    /// Body item for `docs/index` with `@search.action: upload`
    pub fn upload_action(&self, vector_field: &str) -> Value {
        let mut doc = json!({
            "@search.action": "upload",
            "id": self.id,
            "content": self.content,
            "source": self.source,
            "createdAt": self.created_at,
        });
        doc[vector_field] = json!(self.vector);
        doc
    }
}

/// Body item for `docs/index` with `@search.action: delete`
pub(crate) fn delete_action(id: &str) -> Value {
    json!({ "@search.action": "delete", "id": id })
}
