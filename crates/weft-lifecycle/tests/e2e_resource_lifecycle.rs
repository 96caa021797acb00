//! End-to-end resource lifecycle scenarios.
//!
//! The canonical cycle: a resource whose setup registers a sync handler
//! (reading an invalidation marker) and a finalize handler. The full event
//! ordering across first read, invalidation, quiescent re-read, and owner
//! teardown is asserted step by step.

use weft_core::Timeline;
use weft_harness::EventLog;
use weft_lifecycle::{Cleanup, Lifetime, Resource, ResourceBlueprint};
use weft_reactive::{Cell, Marker};

struct TestResource {
    events: EventLog,
    invalidate: Marker,
    blueprint: ResourceBlueprint<u32>,
}

/// A resource that records setup / sync / cleanup / finalize, with a marker
/// wired into the sync handler's dependencies.
fn test_resource(timeline: &Timeline, id: u32) -> TestResource {
    let events = EventLog::new();
    let invalidate = Marker::named(timeline, "invalidate");

    let (log, gate) = (events.clone(), invalidate.clone());
    let blueprint = ResourceBlueprint::named(
        move |on| {
            log.record("setup");

            let (sync_log, gate) = (log.clone(), gate.clone());
            on.sync(move || {
                sync_log.record("sync");
                gate.read();
                let cleanup_log = sync_log.clone();
                Cleanup::of(move || cleanup_log.record("cleanup"))
            });

            let finalize_log = log.clone();
            on.finalize(move || finalize_log.record("finalize"));

            id
        },
        format!("test resource {id}"),
    );

    TestResource {
        events,
        invalidate,
        blueprint,
    }
}

#[test]
fn full_resource_cycle() {
    let timeline = Timeline::new();
    let owner = Lifetime::named("component");
    let fixture = test_resource(&timeline, 1);
    let resource = fixture.blueprint.attach(&timeline, &owner).unwrap();

    // Nothing happens before the first read.
    assert!(fixture.events.is_empty());

    // First read: setup, then the sync handler, in order.
    assert_eq!(resource.get(), Some(1));
    fixture.events.expect(&["setup", "sync"]);

    // Invalidation re-runs only the sync cycle: cleanup, then sync.
    fixture.invalidate.mark();
    assert_eq!(resource.get(), Some(1));
    fixture.events.expect(&["cleanup", "sync"]);

    // Quiescent re-read: no events.
    assert_eq!(resource.get(), Some(1));
    fixture.events.expect(&[]);

    // Owner teardown: cleanup, then finalize, each exactly once.
    owner.finalize();
    fixture.events.expect(&["cleanup", "finalize"]);

    // Finalization is terminal and idempotent.
    owner.finalize();
    assert_eq!(resource.get(), Some(1));
    assert!(fixture.events.is_empty());
}

#[test]
fn teardown_ordering_across_sibling_resources() {
    let timeline = Timeline::new();
    let owner = Lifetime::named("component");
    let events = EventLog::new();

    let mut handles: Vec<Resource<u32>> = Vec::new();
    for id in 0..3 {
        let log = events.prefixed(format!("r{id}"));
        let blueprint = ResourceBlueprint::named(
            move |on| {
                let fin = log.clone();
                on.finalize(move || fin.record("finalize"));
                id
            },
            format!("resource {id}"),
        );
        handles.push(blueprint.attach(&timeline, &owner).unwrap());
    }
    for (id, handle) in handles.iter().enumerate() {
        assert_eq!(handle.get(), Some(id as u32));
    }

    // Resources tear down in attach order.
    owner.finalize();
    events.expect(&["r0:finalize", "r1:finalize", "r2:finalize"]);
}

#[test]
fn setup_dependency_change_replaces_instance_before_teardown() {
    let timeline = Timeline::new();
    let owner = Lifetime::named("component");
    let events = EventLog::new();
    let mode = Cell::named(&timeline, "a", "mode");

    let (log, source) = (events.clone(), mode.clone());
    let blueprint = ResourceBlueprint::named(
        move |on| {
            let mode = source.get();
            log.record(&format!("setup-{mode}"));

            let sync_log = log.clone();
            on.sync(move || {
                sync_log.record(&format!("sync-{mode}"));
                let cleanup_log = sync_log.clone();
                Cleanup::of(move || cleanup_log.record(&format!("cleanup-{mode}")))
            });

            let finalize_log = log.clone();
            on.finalize(move || finalize_log.record(&format!("finalize-{mode}")));
            mode
        },
        "modal resource",
    );
    let resource = blueprint.attach(&timeline, &owner).unwrap();

    assert_eq!(resource.get(), Some("a"));
    events.expect(&["setup-a", "sync-a"]);

    // The setup's own dependency changed: old cleanups run, the whole
    // instance is replaced, the replaced instance's finalize never fires.
    mode.set("b").unwrap();
    assert_eq!(resource.get(), Some("b"));
    events.expect(&["cleanup-a", "setup-b", "sync-b"]);

    owner.finalize();
    events.expect(&["cleanup-b", "finalize-b"]);
}

#[test]
fn resource_read_inside_a_tracked_computation_propagates_staleness() {
    let timeline = Timeline::new();
    let owner = Lifetime::named("component");
    let config = Cell::named(&timeline, 10, "config");

    let source = config.clone();
    let blueprint = ResourceBlueprint::named(move |_on| source.get() * 2, "doubler");
    let resource = blueprint.attach(&timeline, &owner).unwrap();

    let reader = resource.clone();
    let (value, frame) = timeline.with_frame("consumer", || reader.get());
    assert_eq!(value, Some(20));
    assert!(frame.is_valid());

    config.set(11).unwrap();
    assert!(!frame.is_valid());
}
