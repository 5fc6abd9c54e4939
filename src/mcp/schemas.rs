//! JSON schema builders for MCP tools.

use serde_json::{Map, Value};

use crate::config::Config;

/// Build the schema describing the `search_government_documents` tool input.
pub(crate) fn government_search_input_schema(config: &Config) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "query".into(),
        string_schema("Natural language search query"),
    );

    let mut type_item = Map::new();
    type_item.insert("type".into(), Value::String("string".into()));
    type_item.insert(
        "enum".into(),
        Value::Array(vec![
            Value::String("scotus".into()),
            Value::String("executive_orders".into()),
        ]),
    );
    let mut types_schema = Map::new();
    types_schema.insert("type".into(), Value::String("array".into()));
    types_schema.insert(
        "description".into(),
        Value::String("Document collections to search; defaults to both.".into()),
    );
    types_schema.insert("items".into(), Value::Object(type_item));
    types_schema.insert(
        "default".into(),
        Value::Array(vec![
            Value::String("scotus".into()),
            Value::String("executive_orders".into()),
        ]),
    );
    properties.insert("document_types".into(), Value::Object(types_schema));

    properties.insert("limit".into(), limit_schema(config));

    finalize_object_schema(properties, &["query"])
}

/// Build the schema describing the `search_scotus_opinions` tool input.
pub(crate) fn scotus_search_input_schema(config: &Config) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "query".into(),
        string_schema("Natural language search query"),
    );

    let mut opinion_schema = Map::new();
    opinion_schema.insert("type".into(), Value::String("string".into()));
    opinion_schema.insert(
        "description".into(),
        Value::String("Filter by opinion type".into()),
    );
    opinion_schema.insert(
        "enum".into(),
        Value::Array(
            ["majority", "concurring", "dissenting", "syllabus"]
                .into_iter()
                .map(|variant| Value::String(variant.into()))
                .collect(),
        ),
    );
    properties.insert("opinion_type".into(), Value::Object(opinion_schema));

    properties.insert(
        "justice".into(),
        string_schema("Filter by authoring justice surname"),
    );
    properties.insert(
        "start_date".into(),
        string_schema("Inclusive filing-date lower bound (YYYY-MM-DD)"),
    );
    properties.insert(
        "end_date".into(),
        string_schema("Inclusive filing-date upper bound (YYYY-MM-DD)"),
    );
    properties.insert("limit".into(), limit_schema(config));

    finalize_object_schema(properties, &["query"])
}

/// Build the schema describing the `search_executive_orders` tool input.
pub(crate) fn eo_search_input_schema(config: &Config) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "query".into(),
        string_schema("Natural language search query"),
    );
    properties.insert(
        "president".into(),
        string_schema("Filter by signing president's name"),
    );
    properties.insert(
        "agencies".into(),
        string_array_schema("Match orders impacting any of these agencies"),
    );
    properties.insert(
        "policy_topics".into(),
        string_array_schema("Match orders tagged with any of these policy topics"),
    );
    properties.insert(
        "start_date".into(),
        string_schema("Inclusive signing-date lower bound (YYYY-MM-DD)"),
    );
    properties.insert(
        "end_date".into(),
        string_schema("Inclusive signing-date upper bound (YYYY-MM-DD)"),
    );
    properties.insert("limit".into(), limit_schema(config));

    finalize_object_schema(properties, &["query"])
}

/// Build the schema describing the `get_document_by_id` tool input.
pub(crate) fn get_document_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "document_id".into(),
        string_schema("Chunk identifier, e.g. 12345_chunk_0"),
    );

    let mut collection_schema = Map::new();
    collection_schema.insert("type".into(), Value::String("string".into()));
    collection_schema.insert(
        "description".into(),
        Value::String("Collection holding the chunk".into()),
    );
    collection_schema.insert(
        "enum".into(),
        Value::Array(vec![
            Value::String(crate::config::SCOTUS_COLLECTION.into()),
            Value::String(crate::config::EO_COLLECTION.into()),
        ]),
    );
    properties.insert("collection".into(), Value::Object(collection_schema));

    let mut full_schema = Map::new();
    full_schema.insert("type".into(), Value::String("boolean".into()));
    full_schema.insert(
        "description".into(),
        Value::String("Also fetch the complete source document from its API".into()),
    );
    full_schema.insert("default".into(), Value::Bool(false));
    properties.insert("full_document".into(), Value::Object(full_schema));

    finalize_object_schema(properties, &["document_id", "collection"])
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn limit_schema(config: &Config) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("integer".into()));
    schema.insert(
        "description".into(),
        Value::String("Maximum number of results to return".into()),
    );
    schema.insert("minimum".into(), Value::Number(1.into()));
    schema.insert(
        "default".into(),
        Value::Number(serde_json::Number::from(
            config.mcp_default_search_limit as u64,
        )),
    );
    schema.insert(
        "maximum".into(),
        Value::Number(serde_json::Number::from(config.mcp_max_search_limit as u64)),
    );
    Value::Object(schema)
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn string_array_schema(description: &str) -> Value {
    let mut item = Map::new();
    item.insert("type".into(), Value::String("string".into()));
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("array".into()));
    schema.insert("description".into(), Value::String(description.into()));
    schema.insert("items".into(), Value::Object(item));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        crate::config::tests::test_config()
    }

    #[test]
    fn search_schemas_require_the_query() {
        for schema in [
            government_search_input_schema(&config()),
            scotus_search_input_schema(&config()),
            eo_search_input_schema(&config()),
        ] {
            let required = schema["required"].as_array().expect("required");
            assert!(required.contains(&Value::String("query".into())));
            assert_eq!(schema["additionalProperties"], Value::Bool(false));
        }
    }

    #[test]
    fn document_types_enum_covers_both_collections() {
        let schema = government_search_input_schema(&config());
        let items = &schema["properties"]["document_types"]["items"]["enum"];
        assert_eq!(
            items,
            &Value::Array(vec![
                Value::String("scotus".into()),
                Value::String("executive_orders".into())
            ])
        );
    }

    #[test]
    fn opinion_type_enum_matches_the_tool_surface() {
        let schema = scotus_search_input_schema(&config());
        let variants = schema["properties"]["opinion_type"]["enum"]
            .as_array()
            .expect("enum");
        assert_eq!(variants.len(), 4);
    }

    #[test]
    fn limits_carry_configured_bounds() {
        let schema = eo_search_input_schema(&config());
        assert_eq!(schema["properties"]["limit"]["default"], 10);
        assert_eq!(schema["properties"]["limit"]["maximum"], 50);
    }
}
