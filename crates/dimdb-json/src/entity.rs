//! Entity documents: reading, writing and validating the JSON form of a
//! schema.
//!
//! An entity document is an object with `name`, `version`, `namespace`,
//! `description`, a `dimensions` array of `{name, description}` and a
//! `properties` array of `{name, type, dims?, unit?, description?}` where
//! `dims` entries refer to dimensions by name.

use dimdb_core::{
    error::{Error, Result},
    obs,
    schema::{Dimension, Entity, Property},
    types::{POINTER_SIZE, TypeKind},
    uri::MetaUri,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Count the declared dimensions of an entity document, validating their
/// names. Any violation is diagnosed and yields a `format` error.
pub fn entity_dimension_count(doc: &Map<String, Value>) -> Result<usize> {
    let mut count = 0;
    let mut violations = 0;

    if let Some(Value::Array(dims)) = doc.get("dimensions") {
        for (i, item) in dims.iter().enumerate() {
            let name = item.get("name").and_then(Value::as_str).unwrap_or("");
            if name.trim().is_empty() {
                obs::diag(&format!("entity dimension [{}] has no valid name", i + 1));
                violations += 1;
            } else {
                count += 1;
            }
        }
    }

    if violations > 0 {
        return Err(Error::Format(format!(
            "entity document declares {violations} invalid dimensions"
        )));
    }
    Ok(count)
}

/// Count the declared properties of an entity document, validating names,
/// types and dimension references. Any violation is diagnosed and yields a
/// `format` error.
pub fn entity_property_count(doc: &Map<String, Value>) -> Result<usize> {
    let mut count = 0;
    let mut violations = 0;

    let entity_dims = doc.get("dimensions").and_then(Value::as_array);

    if let Some(Value::Array(props)) = doc.get("properties") {
        for (i, item) in props.iter().enumerate() {
            let name = item.get("name").and_then(Value::as_str).unwrap_or("");
            let type_label = item.get("type").and_then(Value::as_str).unwrap_or("");

            if name.trim().is_empty() {
                obs::diag(&format!("entity property [{}] has no valid name", i + 1));
                violations += 1;
            } else if TypeKind::parse(type_label).is_none() {
                obs::diag(&format!(
                    "entity property [{}] '{name}' has no valid type: '{type_label}'",
                    i + 1
                ));
                violations += 1;
            } else if !dims_are_declared(name, item.get("dims"), entity_dims) {
                violations += 1;
            } else {
                count += 1;
            }
        }
    }

    if violations > 0 {
        return Err(Error::Format(format!(
            "entity document declares {violations} invalid properties"
        )));
    }
    Ok(count)
}

/// Check that every `dims` entry of a property names a declared dimension.
fn dims_are_declared(
    prop_name: &str,
    prop_dims: Option<&Value>,
    entity_dims: Option<&Vec<Value>>,
) -> bool {
    let Some(Value::Array(dims)) = prop_dims else {
        return true;
    };
    let mut ok = true;
    for dim in dims {
        let dim_name = dim.as_str().unwrap_or("");
        let declared = entity_dims.is_some_and(|list| {
            list.iter()
                .any(|e| e.get("name").and_then(Value::as_str) == Some(dim_name))
        });
        if !declared {
            obs::diag(&format!(
                "dimension '{dim_name}' of property '{prop_name}' is not declared"
            ));
            ok = false;
        }
    }
    ok
}

/// Element width implied by a property type when the document does not
/// carry an explicit `size`.
fn default_size(kind: TypeKind) -> Option<usize> {
    match kind {
        TypeKind::Bool => Some(1),
        TypeKind::Int | TypeKind::Uint | TypeKind::Float => Some(8),
        TypeKind::StringPtr => Some(POINTER_SIZE),
        TypeKind::Blob | TypeKind::String => None,
    }
}

/// Build an entity from a validated entity document.
pub fn entity_from_document(doc: &Map<String, Value>) -> Result<Arc<Entity>> {
    entity_dimension_count(doc).map_err(Error::emit)?;
    entity_property_count(doc).map_err(Error::emit)?;

    let field = |key: &str| -> Result<&str> {
        doc.get(key).and_then(Value::as_str).ok_or_else(|| {
            Error::Format(format!("entity document lacks the '{key}' key")).emit()
        })
    };
    let name = field("name")?;
    let version = field("version")?;
    let namespace = field("namespace")?;
    let description = doc.get("description").and_then(Value::as_str).unwrap_or("");
    let uri = MetaUri::join(name, version, namespace);

    let mut dimensions = Vec::new();
    if let Some(Value::Array(dims)) = doc.get("dimensions") {
        for item in dims {
            dimensions.push(Dimension::new(
                item.get("name").and_then(Value::as_str).unwrap_or(""),
                item.get("description").and_then(Value::as_str).unwrap_or(""),
            ));
        }
    }

    let mut properties = Vec::new();
    if let Some(Value::Array(props)) = doc.get("properties") {
        for item in props {
            let prop_name = item.get("name").and_then(Value::as_str).unwrap_or("");
            let label = item.get("type").and_then(Value::as_str).unwrap_or("");
            let kind = TypeKind::parse(label).ok_or_else(|| {
                Error::Format(format!(
                    "property '{prop_name}' has unrecognised type '{label}'"
                ))
                .emit()
            })?;

            let declared = item.get("size").and_then(Value::as_u64).map(|s| s as usize);
            let size = match kind {
                // The element of a string property is a pointer whatever the
                // document says.
                TypeKind::StringPtr => POINTER_SIZE,
                _ => declared.or_else(|| default_size(kind)).ok_or_else(|| {
                    Error::Format(format!(
                        "property '{prop_name}' of type {label} needs an explicit size"
                    ))
                    .emit()
                })?,
            };

            let mut dims = Vec::new();
            if let Some(Value::Array(names)) = item.get("dims") {
                for dim in names {
                    let dim_name = dim.as_str().unwrap_or("");
                    let index = dimensions
                        .iter()
                        .position(|d| d.name == dim_name)
                        .ok_or_else(|| {
                            Error::Format(format!(
                                "dimension '{dim_name}' of property '{prop_name}' is not declared"
                            ))
                            .emit()
                        })?;
                    dims.push(index);
                }
            }

            let mut property = Property::with_dims(prop_name, kind, size, dims);
            property.unit = item
                .get("unit")
                .and_then(Value::as_str)
                .map(str::to_string);
            property.description = item
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            properties.push(property);
        }
    }

    Entity::new(Some(&uri), description, dimensions, properties)
}

/// Render an entity as an entity document.
pub fn entity_to_document(entity: &Entity) -> Result<Map<String, Value>> {
    let uri = entity.uri().ok_or_else(|| {
        Error::InvalidArg(format!(
            "entity {} has no uri and cannot be written as a document",
            entity.ident()
        ))
        .emit()
    })?;
    let parts = MetaUri::split(uri).map_err(Error::emit)?;

    let mut doc = Map::new();
    doc.insert("name".to_string(), json!(parts.name));
    doc.insert("version".to_string(), json!(parts.version));
    doc.insert("namespace".to_string(), json!(parts.namespace));
    doc.insert("description".to_string(), json!(entity.description()));

    let dimensions: Vec<Value> = entity
        .dimensions()
        .iter()
        .map(|d| json!({"name": d.name, "description": d.description}))
        .collect();
    doc.insert("dimensions".to_string(), Value::Array(dimensions));

    let properties: Vec<Value> = entity
        .properties()
        .iter()
        .map(|p| {
            let mut item = Map::new();
            item.insert("name".to_string(), json!(p.name));
            item.insert("type".to_string(), json!(p.kind.label()));
            if default_size(p.kind) != Some(p.size) && p.kind != TypeKind::StringPtr {
                item.insert("size".to_string(), json!(p.size));
            }
            if !p.dims.is_empty() {
                let names: Vec<&str> = p
                    .dims
                    .iter()
                    .map(|&i| entity.dimensions()[i].name.as_str())
                    .collect();
                item.insert("dims".to_string(), json!(names));
            }
            if let Some(unit) = &p.unit {
                item.insert("unit".to_string(), json!(unit));
            }
            if let Some(description) = &p.description {
                item.insert("description".to_string(), json!(description));
            }
            Value::Object(item)
        })
        .collect();
    doc.insert("properties".to_string(), Value::Array(properties));

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimdb_core::obs::{NoopDiagSink, with_diag_sink};
    use serde_json::json;

    fn sample_doc() -> Map<String, Value> {
        let Value::Object(doc) = json!({
            "name": "Point",
            "version": "0.2",
            "namespace": "http://data.example.org",
            "description": "A labelled point set.",
            "dimensions": [
                {"name": "n", "description": "Number of points."}
            ],
            "properties": [
                {"name": "label", "type": "string"},
                {"name": "x", "type": "float", "dims": ["n"], "unit": "m"},
                {"name": "flags", "type": "boolean", "dims": ["n"]}
            ]
        }) else {
            unreachable!()
        };
        doc
    }

    #[test]
    fn counting_helpers_accept_a_valid_document() {
        let doc = sample_doc();
        assert_eq!(entity_dimension_count(&doc).unwrap(), 1);
        assert_eq!(entity_property_count(&doc).unwrap(), 3);
    }

    #[test]
    fn counting_helpers_reject_violations() {
        with_diag_sink(&NoopDiagSink, || {
            let mut doc = sample_doc();
            doc["dimensions"][0]["name"] = json!("   ");
            assert!(entity_dimension_count(&doc).is_err());

            let mut doc = sample_doc();
            doc["properties"][1]["type"] = json!("tensor");
            assert!(entity_property_count(&doc).is_err());

            let mut doc = sample_doc();
            doc["properties"][1]["dims"] = json!(["m"]);
            assert!(entity_property_count(&doc).is_err());

            let mut doc = sample_doc();
            doc["properties"][0]["name"] = json!("");
            assert!(entity_property_count(&doc).is_err());
        });
    }

    #[test]
    fn document_round_trip_preserves_the_schema() {
        let doc = sample_doc();
        let entity = entity_from_document(&doc).unwrap();

        assert_eq!(entity.uri(), Some("http://data.example.org/0.2/Point"));
        assert_eq!(entity.ndimensions(), 1);
        assert_eq!(entity.nproperties(), 3);

        let label = entity.property("label").unwrap();
        assert_eq!(label.kind, TypeKind::StringPtr);
        assert_eq!(label.size, POINTER_SIZE);
        let x = entity.property("x").unwrap();
        assert_eq!(x.kind, TypeKind::Float);
        assert_eq!(x.size, 8);
        assert_eq!(x.dims, vec![0]);
        assert_eq!(x.unit.as_deref(), Some("m"));

        let back = entity_to_document(&entity).unwrap();
        let again = entity_from_document(&back).unwrap();
        assert_eq!(again.uri(), entity.uri());
        assert_eq!(again.nproperties(), entity.nproperties());
        assert_eq!(again.property("x"), entity.property("x"));
    }

    #[test]
    fn explicit_sizes_are_honoured() {
        let mut doc = sample_doc();
        doc["properties"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "code", "type": "fixstring", "size": 16}));
        doc["properties"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "count", "type": "integer", "size": 4}));

        let entity = entity_from_document(&doc).unwrap();
        assert_eq!(entity.property("code").unwrap().size, 16);
        assert_eq!(entity.property("count").unwrap().size, 4);

        with_diag_sink(&NoopDiagSink, || {
            let mut doc = sample_doc();
            doc["properties"]
                .as_array_mut()
                .unwrap()
                .push(json!({"name": "raw", "type": "blob"}));
            assert!(entity_from_document(&doc).is_err());
        });
    }
}
