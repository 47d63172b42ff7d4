use dagshear::property::{PropertyBag, PropertyKind, PropertyValue};
use dagshear::ReshapeError;

#[test]
fn missing_required_property_reports_kind_and_element() {
    let bag = PropertyBag::new();
    let err = bag.require(PropertyKind::Parallelism, "vertex A").unwrap_err();
    match err {
        ReshapeError::MissingRequiredProperty { element, kind } => {
            assert_eq!(element, "vertex A");
            assert_eq!(kind, PropertyKind::Parallelism);
        }
        other => panic!("expected MissingRequiredProperty, got {other:?}"),
    }
}

#[test]
fn set_then_get_round_trips() {
    let mut bag = PropertyBag::new();
    bag.set(PropertyValue::Parallelism(4), false, "vertex A").unwrap();
    let value = bag.get(PropertyKind::Parallelism);
    assert!(matches!(value, Some(PropertyValue::Parallelism(4))), "got {value:?}");
}

#[test]
fn permanent_property_rejects_conflicting_override() {
    let mut bag = PropertyBag::new();
    bag.set_permanent(PropertyValue::Parallelism(4), "vertex A").unwrap();
    let err = bag.set(PropertyValue::Parallelism(8), false, "vertex A").unwrap_err();
    match err {
        ReshapeError::PermanentConflict { element, kind } => {
            assert_eq!(element, "vertex A");
            assert_eq!(kind, PropertyKind::Parallelism);
        }
        other => panic!("expected PermanentConflict, got {other:?}"),
    }
}

#[test]
fn permanent_property_accepts_identical_re_set_without_downgrading() {
    let mut bag = PropertyBag::new();
    bag.set_permanent(PropertyValue::Parallelism(4), "vertex A").unwrap();
    bag.set(PropertyValue::Parallelism(4), false, "vertex A").unwrap();
    assert!(bag.is_permanent(PropertyKind::Parallelism));
}

#[test]
fn non_permanent_property_can_be_overridden() {
    let mut bag = PropertyBag::new();
    bag.set(PropertyValue::Parallelism(4), false, "vertex A").unwrap();
    bag.set(PropertyValue::Parallelism(8), false, "vertex A").unwrap();
    let value = bag.get(PropertyKind::Parallelism);
    assert!(matches!(value, Some(PropertyValue::Parallelism(8))), "got {value:?}");
}

#[test]
fn copy_to_preserves_permanence() {
    let mut src = PropertyBag::new();
    src.set_permanent(PropertyValue::Parallelism(4), "vertex A").unwrap();
    src.set(PropertyValue::ResourceSlot(true), false, "vertex A").unwrap();

    let mut dst = PropertyBag::new();
    src.copy_to(&mut dst);

    assert!(dst.is_permanent(PropertyKind::Parallelism));
    assert!(!dst.is_permanent(PropertyKind::ResourceSlot));
    let value = dst.get(PropertyKind::Parallelism);
    assert!(matches!(value, Some(PropertyValue::Parallelism(4))), "got {value:?}");
}
