//! End-to-end tests of the JSON backend: entity loading, instance
//! save/load round-trips, and the data-model capabilities.

use dimdb_core::{
    ErrorKind,
    instance::{Instance, PropertyValue},
    obs::{NoopDiagSink, with_diag_sink},
    schema::Entity,
    storage::{Storage, StorageDriver, StorageOptions},
    types::{POINTER_SIZE, TypeKind},
};
use dimdb_json::JsonDriver;
use std::{path::PathBuf, sync::Arc};

const CHEMISTRY_URI: &str = "http://www.sintef.no/calm/0.1/Chemistry";

fn fixture_path() -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/entities/Chemistry-0.1.json");
    path.to_str().unwrap().to_string()
}

fn open(uri: &str, options: &str) -> Box<dyn Storage> {
    JsonDriver
        .open(uri, &StorageOptions::parse(options).unwrap())
        .unwrap()
}

fn load_chemistry() -> Arc<Entity> {
    let storage = open(&fixture_path(), "r");
    Entity::load(storage.as_ref(), CHEMISTRY_URI).unwrap()
}

#[test]
fn entity_loads_from_an_entity_file() {
    let entity = load_chemistry();

    assert_eq!(entity.uri(), Some(CHEMISTRY_URI));
    assert_eq!(entity.meta_dimension_size("ndimensions").unwrap(), 2);
    assert_eq!(entity.meta_dimension_size("nproperties").unwrap(), 8);

    let elements = entity.property("elements").unwrap();
    assert_eq!(elements.kind, TypeKind::StringPtr);
    assert_eq!(elements.size, POINTER_SIZE);
    assert_eq!(elements.ndims(), 1);
    assert_eq!(
        elements.description.as_deref(),
        Some(
            "Chemical symbol of each chemical element.  By convension the \
             dependent element (e.g. Al) is listed first."
        )
    );
}

#[test]
fn entity_load_checks_the_identifier() {
    with_diag_sink(&NoopDiagSink, || {
        let storage = open(&fixture_path(), "r");

        // An id naming a different entity misses.
        let err = Entity::load(storage.as_ref(), "http://other.org/0.1/Foo").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // A blank id cannot be derived.
        let err = Entity::load(storage.as_ref(), "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArg);
    });
}

fn populate(instance: &mut Instance) {
    instance
        .set_property("alloy", &PropertyValue::strings(["6063"]))
        .unwrap();
    instance
        .set_property("elements", &PropertyValue::strings(["Al", "Mg", "Si"]))
        .unwrap();
    instance
        .set_property("phases", &PropertyValue::strings(["beta\"", "beta'"]))
        .unwrap();
    instance
        .set_property("X0", &PropertyValue::floats(&[0.99, 0.005, 0.005]))
        .unwrap();
    instance
        .set_property(
            "Xp",
            &PropertyValue::floats(&[
                2.0 / 11.0,
                5.0 / 11.0,
                4.0 / 11.0,
                0.0,
                9.0 / 14.0,
                5.0 / 14.0,
            ]),
        )
        .unwrap();
    instance
        .set_property("volfrac", &PropertyValue::floats(&[0.005, 0.001]))
        .unwrap();
    instance
        .set_property("rpart", &PropertyValue::floats(&[7e-9, 15e-9]))
        .unwrap();
    instance
        .set_property("atvol", &PropertyValue::floats(&[1.9e-29, 1.8e-29]))
        .unwrap();
}

#[test]
fn instance_save_then_load_round_trips() {
    let entity = load_chemistry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alloys.json");
    let path = path.to_str().unwrap();

    let mut instance = Instance::new(&entity, &[3, 2], Some("myinst")).unwrap();
    populate(&mut instance);
    let uuid = instance.uuid();

    let mut storage = open(path, "w");
    instance.save(storage.as_ref()).unwrap();
    storage.close().unwrap();

    // The written file carries the declared shape and exact values.
    let text = std::fs::read_to_string(path).unwrap();
    let root: serde_json::Value = serde_json::from_str(&text).unwrap();
    let doc = &root[uuid.to_string()];
    assert_eq!(doc["meta"], serde_json::json!(CHEMISTRY_URI));
    assert_eq!(doc["uri"], serde_json::json!("myinst"));
    assert_eq!(doc["dimensions"]["nelements"], serde_json::json!(3));
    assert_eq!(doc["dimensions"]["nphases"], serde_json::json!(2));
    assert_eq!(doc["properties"]["alloy"], serde_json::json!("6063"));
    assert_eq!(
        doc["properties"]["elements"],
        serde_json::json!(["Al", "Mg", "Si"])
    );
    assert_eq!(
        doc["properties"]["Xp"],
        serde_json::json!([
            [2.0 / 11.0, 5.0 / 11.0, 4.0 / 11.0],
            [0.0, 9.0 / 14.0, 5.0 / 14.0]
        ])
    );
    assert_eq!(
        doc["properties"]["rpart"],
        serde_json::json!([7e-9, 15e-9])
    );

    // Reading it back reproduces every property.
    let storage = open(path, "r");
    let loaded = Instance::load(storage.as_ref(), "myinst", &entity).unwrap();
    assert_eq!(loaded.uuid(), uuid);
    assert_eq!(loaded.dimension_sizes(), vec![3, 2]);
    for name in [
        "alloy", "elements", "phases", "X0", "Xp", "volfrac", "rpart", "atvol",
    ] {
        assert_eq!(
            loaded.property_value(name).unwrap(),
            instance.property_value(name).unwrap(),
            "property '{name}' must round-trip"
        );
    }
}

#[test]
fn load_rejects_mismatched_metadata() {
    let entity = load_chemistry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.json");
    let path = path.to_str().unwrap();

    let mut instance = Instance::new(&entity, &[3, 2], Some("myinst")).unwrap();
    populate(&mut instance);
    let mut storage = open(path, "w");
    instance.save(storage.as_ref()).unwrap();
    storage.close().unwrap();

    let other = Entity::new(
        Some("http://other.org/0.1/Chemistry"),
        "",
        entity.dimensions().to_vec(),
        entity.properties().to_vec(),
    )
    .unwrap();

    with_diag_sink(&NoopDiagSink, || {
        let storage = open(path, "r");
        let err = Instance::load(storage.as_ref(), "myinst", &other).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    });
}

#[test]
fn data_model_capabilities() {
    let entity = load_chemistry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caps.json");
    let path = path.to_str().unwrap();

    let mut instance = Instance::new(&entity, &[3, 2], Some("myinst")).unwrap();
    populate(&mut instance);
    let mut storage = open(path, "w");
    instance.save(storage.as_ref()).unwrap();
    storage.close().unwrap();

    let storage = open(path, "append");
    assert_eq!(storage.uuids().unwrap(), vec![instance.uuid().to_string()]);

    let model = storage.data_model(&instance.uuid()).unwrap();
    assert_eq!(model.meta_uri().unwrap(), CHEMISTRY_URI);
    assert_eq!(model.dimension_size("nelements").unwrap(), 3);
    assert!(model.has_dimension("nphases").unwrap());
    assert!(!model.has_dimension("nlayers").unwrap());
    assert!(model.has_property("alloy").unwrap());
    assert_eq!(model.data_name().unwrap(), Some("myinst".to_string()));

    let value = model
        .get_property("X0", TypeKind::Float, 8, &[3])
        .unwrap();
    assert_eq!(value, PropertyValue::floats(&[0.99, 0.005, 0.005]));

    with_diag_sink(&NoopDiagSink, || {
        let err = model
            .get_property("X0", TypeKind::Float, 8, &[4])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    });
}

#[test]
fn read_only_storages_reject_writes() {
    let entity = load_chemistry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.json");
    let path = path.to_str().unwrap();

    let mut instance = Instance::new(&entity, &[3, 2], Some("myinst")).unwrap();
    populate(&mut instance);
    let mut storage = open(path, "w");
    instance.save(storage.as_ref()).unwrap();
    storage.close().unwrap();

    with_diag_sink(&NoopDiagSink, || {
        let storage = open(path, "r");
        let err = instance.save(storage.as_ref()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArg);

        // writable=false forces read-only even in append mode.
        let storage = open(path, "append;writable=false");
        let err = instance.save(storage.as_ref()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArg);
    });
}

#[test]
fn entity_save_then_load_round_trips() {
    let entity = load_chemistry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entity.json");
    let path = path.to_str().unwrap();

    let mut storage = open(path, "w");
    Entity::save(storage.as_ref(), &entity).unwrap();
    storage.close().unwrap();

    let storage = open(path, "r");
    let loaded = Entity::load(storage.as_ref(), CHEMISTRY_URI).unwrap();
    assert_eq!(loaded.uri(), entity.uri());
    assert_eq!(loaded.uuid(), entity.uuid());
    assert_eq!(loaded.nproperties(), 8);
    assert_eq!(
        loaded.property("elements"),
        entity.property("elements")
    );
}
