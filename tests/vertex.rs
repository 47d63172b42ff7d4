use dagshear::property::{PropertyKind, PropertyValue};
use dagshear::testing::{test_operator, test_source};
use dagshear::vertex::Vertex;

#[test]
fn sampled_clone_gets_fresh_id_and_restriction() {
    let source = test_source("A", 4);
    let Vertex::Source(source) = &source else {
        panic!("test_source must build a SourceVertex");
    };

    let clone = source.sampled_clone("A--sampled-1".into(), vec![0, 2], 4);
    assert_eq!(clone.id().as_str(), "A--sampled-1");
    assert_eq!(clone.restriction(), Some(&(vec![0, 2], 4)));
}

#[test]
fn clone_structural_preserves_transform_with_fresh_id() {
    let op = test_operator("B", 2);
    let Vertex::Operator(op) = &op else {
        panic!("test_operator must build an OperatorVertex");
    };

    let clone = op.clone_structural("B--clone-1".into());
    assert_eq!(clone.id().as_str(), "B--clone-1");
    assert!(clone.properties().get(PropertyKind::Parallelism).is_none());
}

#[test]
fn copy_execution_properties_to_preserves_permanence() {
    let source = test_source("A", 4);
    let mut target = test_operator("A--clone-1", 99);

    source.copy_execution_properties_to(&mut target);
    let value = target.properties().get(PropertyKind::Parallelism);
    assert!(matches!(value, Some(PropertyValue::Parallelism(4))), "got {value:?}");
    assert!(target.properties().is_permanent(PropertyKind::Parallelism));
}

#[test]
fn duplicate_preserves_id_and_properties() {
    let source = test_source("A", 4);
    let dup = source.duplicate();
    assert_eq!(dup.id().as_str(), "A");
    let value = dup.properties().get(PropertyKind::Parallelism);
    assert!(matches!(value, Some(PropertyValue::Parallelism(4))), "got {value:?}");
}
