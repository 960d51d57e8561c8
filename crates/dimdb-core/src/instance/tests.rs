use crate::{
    error::ErrorKind,
    instance::{Instance, PropertySlice, PropertyValue},
    obs::{NoopDiagSink, with_diag_sink},
    schema::{Dimension, Entity, Property},
    types::{POINTER_SIZE, TypeKind},
};
use std::sync::Arc;

fn alloy_entity() -> Arc<Entity> {
    let dimensions = vec![
        Dimension::new("nelements", "Number of elements."),
        Dimension::new("nphases", "Number of phases."),
    ];
    let properties = vec![
        Property::scalar("alloy", TypeKind::StringPtr, POINTER_SIZE),
        Property::with_dims("elements", TypeKind::StringPtr, POINTER_SIZE, vec![0]),
        Property::with_dims("X0", TypeKind::Float, 8, vec![0]),
        Property::with_dims("Xp", TypeKind::Float, 8, vec![1, 0]),
        Property::scalar("tagged", TypeKind::Bool, 1),
    ];
    Entity::new(
        Some("http://data.example.org/0.1/Alloy"),
        "Alloy composition.",
        dimensions,
        properties,
    )
    .unwrap()
}

#[test]
fn create_and_drop_leave_the_refcount_unchanged() {
    let entity = alloy_entity();
    let before = Arc::strong_count(&entity);

    let instance = Instance::new(&entity, &[3, 2], None).unwrap();
    assert_eq!(Arc::strong_count(&entity), before + 1);

    drop(instance);
    assert_eq!(Arc::strong_count(&entity), before);
}

#[test]
fn identifier_handling_matches_uuid_derivation() {
    let entity = alloy_entity();

    let named = Instance::new(&entity, &[3, 2], Some("myinst")).unwrap();
    assert_eq!(named.uri(), Some("myinst"));

    let anonymous = Instance::new(&entity, &[3, 2], None).unwrap();
    assert_eq!(anonymous.uri(), None);
    assert_ne!(anonymous.uuid(), named.uuid());

    let adopted = Instance::new(
        &entity,
        &[3, 2],
        Some("550e8400-e29b-41d4-a716-446655440000"),
    )
    .unwrap();
    assert_eq!(adopted.uri(), None);
    assert_eq!(
        adopted.uuid().to_string(),
        "550e8400-e29b-41d4-a716-446655440000"
    );
}

#[test]
fn dimension_accessors() {
    let entity = alloy_entity();
    let instance = Instance::new(&entity, &[3, 2], None).unwrap();

    assert_eq!(instance.dimension_sizes(), vec![3, 2]);
    assert_eq!(instance.dimension_size("nelements").unwrap(), 3);
    assert_eq!(instance.dimension_size_by_index(1).unwrap(), 2);

    assert_eq!(instance.property_ndims("Xp").unwrap(), 2);
    assert_eq!(instance.property_dim_size("Xp", 0).unwrap(), 2);
    assert_eq!(instance.property_dim_size("Xp", 1).unwrap(), 3);

    with_diag_sink(&NoopDiagSink, || {
        assert_eq!(
            instance.dimension_size_by_index(2).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            instance.dimension_size("melting_point").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            instance.property_dim_size("Xp", 2).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    });
}

#[test]
fn fixed_kind_round_trip_is_byte_identical() {
    let entity = alloy_entity();
    let mut instance = Instance::new(&entity, &[3, 2], None).unwrap();

    let x0 = PropertyValue::floats(&[0.99, 0.005, 0.005]);
    instance.set_property("X0", &x0).unwrap();
    assert_eq!(instance.property_value("X0").unwrap(), x0);

    let xp = PropertyValue::floats(&[
        2.0 / 11.0,
        5.0 / 11.0,
        4.0 / 11.0,
        0.0,
        9.0 / 14.0,
        5.0 / 14.0,
    ]);
    instance.set_property("Xp", &xp).unwrap();
    assert_eq!(instance.property_value("Xp").unwrap(), xp);

    instance
        .set_property("tagged", &PropertyValue::bools(&[true]))
        .unwrap();
    assert_eq!(
        instance.property("tagged").unwrap(),
        PropertySlice::Fixed(&[1])
    );
}

#[test]
fn string_pointer_round_trip_duplicates_elements() {
    let entity = alloy_entity();
    let mut instance = Instance::new(&entity, &[3, 2], None).unwrap();

    let source = vec!["Al".to_string(), "Mg".to_string(), "Si".to_string()];
    instance
        .set_property("elements", &PropertyValue::Strings(source.clone()))
        .unwrap();

    let slice = instance.property("elements").unwrap();
    let stored = slice.as_strings().unwrap();
    assert_eq!(stored.len(), 3);
    for (held, original) in stored.iter().zip(&source) {
        let held = held.as_ref().unwrap();
        assert_eq!(held, original);
        // Owned duplicate, not a shared allocation.
        assert_ne!(held.as_ptr(), original.as_ptr());
    }

    // Scalar string-pointer properties behave the same with one element.
    instance
        .set_property("alloy", &PropertyValue::strings(["6063"]))
        .unwrap();
    assert_eq!(
        instance.property_value("alloy").unwrap(),
        PropertyValue::strings(["6063"])
    );
}

#[test]
fn unassigned_string_elements_read_as_null() {
    let entity = alloy_entity();
    let instance = Instance::new(&entity, &[3, 2], None).unwrap();

    let slice = instance.property("elements").unwrap();
    let stored = slice.as_strings().unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(Option::is_none));
}

#[test]
fn payload_shape_and_kind_are_enforced() {
    let entity = alloy_entity();
    let mut instance = Instance::new(&entity, &[3, 2], None).unwrap();

    with_diag_sink(&NoopDiagSink, || {
        // Wrong element count.
        let err = instance
            .set_property("X0", &PropertyValue::floats(&[1.0, 2.0]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

        // Wrong payload family for the kind.
        let err = instance
            .set_property("elements", &PropertyValue::floats(&[1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        // Unknown property name.
        let err = instance
            .set_property("volume", &PropertyValue::floats(&[1.0]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    });
}

#[test]
fn dimension_count_is_checked_at_creation() {
    let entity = alloy_entity();
    with_diag_sink(&NoopDiagSink, || {
        let err = Instance::new(&entity, &[3], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArg);
    });
}

#[test]
fn zero_sized_dimensions_yield_empty_buffers() {
    let entity = alloy_entity();
    let instance = Instance::new(&entity, &[0, 2], None).unwrap();

    let slice = instance.property("elements").unwrap();
    assert_eq!(slice.as_strings().unwrap().len(), 0);
    let x0 = instance.property("X0").unwrap();
    assert_eq!(x0.as_bytes().unwrap().len(), 0);
}
