//! OpenAPI / Swagger document loading.
//!
//! [`parse_document`] is pure and does all the work; [`OpenApiLoader`] only
//! fetches the text.

use apiprobe_proto::{ApiDocument, CollaboratorError, DocumentLoader, Endpoint};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

/// Characters of raw document text kept for the analyst.
pub const RAW_PREVIEW_CHARS: usize = 15_000;

const HTTP_METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];

const OPENAPI_SCHEMA_PREFIX: &str = "#/components/schemas/";
const SWAGGER_SCHEMA_PREFIX: &str = "#/definitions/";

pub struct OpenApiLoader {
    client: Client,
}

impl OpenApiLoader {
    pub fn new(timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentLoader for OpenApiLoader {
    async fn load(&self, url: &str) -> Result<ApiDocument, CollaboratorError> {
        info!(url, "Fetching API document");
        let response = self
            .client
            .get(url)
            .header("accept", "application/json, application/yaml, */*")
            .send()
            .await
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http(format!(
                "Failed to fetch API document: {} - {}",
                status, body
            )));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;
        let document = parse_document(&raw, url)?;
        debug!(endpoints = document.endpoints.len(), "Parsed API document");
        Ok(document)
    }
}

/// Parses an OpenAPI 3 or Swagger 2 document given as JSON or YAML.
///
/// `source_url` is the address the document was fetched from; it resolves
/// relative server URLs and supplies the base URL when the document has none.
pub fn parse_document(raw: &str, source_url: &str) -> Result<ApiDocument, CollaboratorError> {
    let root: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            CollaboratorError::Parse(format!(
                "API document is neither JSON ({json_err}) nor YAML ({yaml_err})"
            ))
        })?,
    };
    if !root.is_object() {
        return Err(CollaboratorError::Parse(
            "API document root is not an object".to_string(),
        ));
    }

    let endpoints = extract_endpoints(&root);
    let outline = endpoints
        .iter()
        .map(|e| {
            if e.summary.is_empty() {
                e.label()
            } else {
                format!("{} - {}", e.label(), e.summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ApiDocument {
        base_url: base_url(&root, source_url),
        endpoints,
        outline,
        raw_preview: raw.chars().take(RAW_PREVIEW_CHARS).collect(),
    })
}

fn base_url(root: &Value, source_url: &str) -> Option<String> {
    let source = Url::parse(source_url).ok();

    let declared = root
        .pointer("/servers/0/url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(server) = declared {
        let resolved = match Url::parse(server) {
            Ok(url) => Some(url),
            Err(_) => source.as_ref().and_then(|src| src.join(server).ok()),
        };
        return resolved.map(|url| url.as_str().trim_end_matches('/').to_string());
    }

    if let Some(host) = root.get("host").and_then(Value::as_str) {
        let scheme = root
            .pointer("/schemes/0")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| source.as_ref().map(|s| s.scheme().to_string()))
            .unwrap_or_else(|| "http".to_string());
        let base_path = root.get("basePath").and_then(Value::as_str).unwrap_or("");
        let joined = format!("{scheme}://{host}{base_path}");
        return Some(joined.trim_end_matches('/').to_string());
    }

    source
        .map(|s| s.origin().ascii_serialization())
        .filter(|origin| origin != "null")
}

fn extract_endpoints(root: &Value) -> Vec<Endpoint> {
    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut endpoints = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        for (method, operation) in item {
            if !HTTP_METHODS.contains(&method.to_lowercase().as_str()) {
                continue;
            }
            let summary = operation
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let tags: Vec<String> = operation
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let mut endpoint = Endpoint::new(method.as_str(), path.as_str())
                .with_tags(tags)
                .with_definition(endpoint_definition(root, operation));
            endpoint.summary = summary.to_string();
            endpoints.push(endpoint);
        }
    }
    endpoints
}

/// `{ "operation": op, "components_schemas": {..} }` where the schemas are
/// every component reachable from `op` through `$ref`s. The schema map is
/// omitted when nothing is referenced.
pub fn endpoint_definition(root: &Value, operation: &Value) -> Value {
    let mut queue: VecDeque<String> = VecDeque::new();
    collect_refs(operation, &mut queue);

    let mut seen = HashSet::new();
    let mut schemas = BTreeMap::new();
    while let Some(reference) = queue.pop_front() {
        if !seen.insert(reference.clone()) {
            continue;
        }
        let Some((name, schema)) = resolve_schema(root, &reference) else {
            continue;
        };
        collect_refs(schema, &mut queue);
        schemas.insert(name.to_string(), schema.clone());
    }

    let mut definition = Map::new();
    definition.insert("operation".to_string(), operation.clone());
    if !schemas.is_empty() {
        definition.insert(
            "components_schemas".to_string(),
            Value::Object(schemas.into_iter().collect()),
        );
    }
    Value::Object(definition)
}

fn resolve_schema<'r, 'n>(root: &'r Value, reference: &'n str) -> Option<(&'n str, &'r Value)> {
    if let Some(name) = reference.strip_prefix(OPENAPI_SCHEMA_PREFIX) {
        return root
            .pointer("/components/schemas")
            .and_then(|s| s.get(name))
            .map(|schema| (name, schema));
    }
    if let Some(name) = reference.strip_prefix(SWAGGER_SCHEMA_PREFIX) {
        return root
            .get("definitions")
            .and_then(|d| d.get(name))
            .map(|schema| (name, schema));
    }
    None
}

fn collect_refs(node: &Value, out: &mut VecDeque<String>) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                out.push_back(reference.to_string());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_refs(child, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.1",
            "servers": [{ "url": "https://pets.test/api/" }],
            "paths": {
                "/pets": {
                    "get": { "summary": "List pets", "tags": ["pets"] },
                    "post": {
                        "summary": "Create pet",
                        "tags": ["pets", "admin"],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/NewPet" }
                                }
                            }
                        }
                    },
                    "parameters": [{ "name": "trace", "in": "header" }]
                },
                "/pets/{id}": {
                    "delete": {}
                }
            },
            "components": {
                "schemas": {
                    "NewPet": {
                        "type": "object",
                        "properties": { "owner": { "$ref": "#/components/schemas/Owner" } }
                    },
                    "Owner": {
                        "type": "object",
                        "properties": { "pets": { "type": "array", "items": { "$ref": "#/components/schemas/NewPet" } } }
                    },
                    "Unused": { "type": "string" }
                }
            }
        })
    }

    #[test]
    fn test_parse_openapi3_endpoints_and_outline() {
        let doc = parse_document(&petstore().to_string(), "https://pets.test/openapi.json").unwrap();
        assert_eq!(doc.base_url.as_deref(), Some("https://pets.test/api"));

        let labels: Vec<String> = doc.endpoints.iter().map(Endpoint::label).collect();
        assert_eq!(labels, vec!["GET /pets", "POST /pets", "DELETE /pets/{id}"]);
        assert_eq!(doc.endpoints[1].tags, vec!["pets", "admin"]);
        assert_eq!(
            doc.outline,
            "GET /pets - List pets\nPOST /pets - Create pet\nDELETE /pets/{id}"
        );
    }

    #[test]
    fn test_definition_carries_transitive_refs() {
        let root = petstore();
        let op = root.pointer("/paths/~1pets/post").unwrap();
        let def = endpoint_definition(&root, op);
        let schemas = def["components_schemas"].as_object().unwrap();
        let mut names: Vec<&String> = schemas.keys().collect();
        names.sort();
        assert_eq!(names, vec!["NewPet", "Owner"]);
        assert_eq!(def["operation"]["summary"], "Create pet");

        let get = root.pointer("/paths/~1pets/get").unwrap();
        assert!(endpoint_definition(&root, get).get("components_schemas").is_none());
    }

    #[test]
    fn test_swagger2_base_url_and_definitions() {
        let raw = r##"
swagger: "2.0"
host: legacy.test:8080
basePath: /v2
schemes: [https]
paths:
  /orders:
    post:
      parameters:
        - in: body
          name: body
          schema:
            $ref: "#/definitions/Order"
definitions:
  Order:
    type: object
"##;
        let doc = parse_document(raw, "http://docs.test/swagger.yaml").unwrap();
        assert_eq!(doc.base_url.as_deref(), Some("https://legacy.test:8080/v2"));
        assert_eq!(doc.endpoints.len(), 1);
        assert_eq!(doc.endpoints[0].method, "POST");
        assert!(doc.endpoints[0].definition["components_schemas"]["Order"].is_object());
    }

    #[test]
    fn test_relative_server_url_resolves_against_source() {
        let raw = json!({ "servers": [{ "url": "/api/v1" }], "paths": {} }).to_string();
        let doc = parse_document(&raw, "http://svc.test:9000/docs/openapi.json").unwrap();
        assert_eq!(doc.base_url.as_deref(), Some("http://svc.test:9000/api/v1"));
    }

    #[test]
    fn test_base_url_falls_back_to_source_origin() {
        let doc = parse_document(r#"{"openapi":"3.0.0","paths":{}}"#, "http://svc.test:9000/v3/api-docs").unwrap();
        assert_eq!(doc.base_url.as_deref(), Some("http://svc.test:9000"));
        assert!(doc.endpoints.is_empty());
    }

    #[test]
    fn test_rejects_non_object_and_garbage() {
        assert!(matches!(
            parse_document("[1, 2]", "http://x.test"),
            Err(CollaboratorError::Parse(_))
        ));
        assert!(matches!(
            parse_document("{ not: [valid", "http://x.test"),
            Err(CollaboratorError::Parse(_))
        ));
    }

    #[test]
    fn test_raw_preview_is_truncated() {
        let padding = "x".repeat(RAW_PREVIEW_CHARS * 2);
        let raw = json!({ "paths": {}, "info": { "description": padding } }).to_string();
        let doc = parse_document(&raw, "http://x.test").unwrap();
        assert_eq!(doc.raw_preview.chars().count(), RAW_PREVIEW_CHARS);
    }
}
