//! Registration outcomes seen through the manager.

mod common;

use cairn_resources::{
    GroupDefinition, GroupState, RegisterOutcome, ResourceError, ResourceKey, ThreadingModel,
};
use common::{Harness, rec};

#[test]
fn same_definition_twice_creates_one_group() {
    let mut h = Harness::new(ThreadingModel::SingleThread);
    let def = GroupDefinition::new("g").resource_with("rec", "a", rec("a"));
    assert_eq!(h.manager.register_group(&def), Ok(RegisterOutcome::Created));
    assert_eq!(
        h.manager.register_group(&def),
        Ok(RegisterOutcome::DuplicateIgnored)
    );
    assert_eq!(h.manager.registry().len(), 1);
}

#[test]
fn incoming_overridable_definition_merges() {
    let mut h = Harness::new(ThreadingModel::SingleThread);
    h.manager
        .register_group(&GroupDefinition::new("g").resource_with("rec", "a", rec("a")))
        .unwrap();
    let outcome = h
        .manager
        .register_group(
            &GroupDefinition::new("g")
                .resource_with("rec", "b", rec("b"))
                .overridable(true),
        )
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::Merged);

    let group = h.manager.registry().group("g").unwrap();
    let names: Vec<_> = group.resources().iter().map(|e| e.key().name()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(group.state(), GroupState::Unloaded);
}

#[test]
fn missing_required_param_is_bad_param() {
    let mut h = Harness::new(ThreadingModel::SingleThread);
    let err = h
        .manager
        .register_group(&GroupDefinition::new("g").resource("rec", "unlabelled"))
        .unwrap_err();
    assert!(matches!(err, ResourceError::BadParam(_)));
    assert!(h.manager.registry().is_empty());
}

#[test]
fn resources_are_reachable_by_key() {
    let mut h = Harness::new(ThreadingModel::SingleThread);
    h.manager
        .register_group(&GroupDefinition::new("g").resource_with("rec", "a", rec("a")))
        .unwrap();
    let key = ResourceKey::new("rec", "a");
    assert!(h.manager.resource("g", &key).is_some());
    assert!(h.manager.resource("g", &ResourceKey::new("rec", "z")).is_none());
    assert!(h.manager.resource("nope", &key).is_none());
}
