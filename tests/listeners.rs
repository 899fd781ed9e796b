mod common;

use common::*;
use glam::Vec3;
use parking_lot::Mutex;
use rust_rigidphysics::{
    BodyActivationListener, BodyId, ContactListener, ContactManifold, ContactSettings, ValidateResult,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Added(BodyId, BodyId),
    Persisted(BodyId, BodyId),
    Removed(BodyId, BodyId),
    Activated(BodyId),
    Deactivated(BodyId),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    reject: Mutex<Option<BodyId>>,
}

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl ContactListener for Recorder {
    fn validate_contact(&self, body_a: BodyId, body_b: BodyId, _: Vec3, _: f32) -> ValidateResult {
        match *self.reject.lock() {
            Some(id) if id == body_a || id == body_b => ValidateResult::RejectAllContactsForThisBodyPair,
            _ => ValidateResult::AcceptAllContactsForThisBodyPair,
        }
    }

    fn on_contact_added(&self, manifold: &ContactManifold, _: &mut ContactSettings) {
        self.events.lock().push(Event::Added(manifold.body_a, manifold.body_b));
    }

    fn on_contact_persisted(&self, manifold: &ContactManifold, _: &mut ContactSettings) {
        self.events.lock().push(Event::Persisted(manifold.body_a, manifold.body_b));
    }

    fn on_contact_removed(&self, body_a: BodyId, body_b: BodyId) {
        self.events.lock().push(Event::Removed(body_a, body_b));
    }
}

impl BodyActivationListener for Recorder {
    fn on_body_activated(&self, body_id: BodyId, _: u64) {
        self.events.lock().push(Event::Activated(body_id));
    }

    fn on_body_deactivated(&self, body_id: BodyId, _: u64) {
        self.events.lock().push(Event::Deactivated(body_id));
    }
}

fn recorded_system() -> (rust_rigidphysics::PhysicsSystem, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let system = builder()
        .with_contact_listener(recorder.clone())
        .with_body_activation_listener(recorder.clone())
        .build()
        .unwrap();
    (system, recorder)
}

#[test]
fn contact_events_follow_the_contact_lifetime() {
    let (mut system, recorder) = recorded_system();
    let ground = add_ground(&mut system);
    let ball = add_sphere(&mut system, Vec3::new(0.0, 0.5, 0.0), 0.5);
    recorder.take();

    run(&mut system, 1);
    assert_eq!(recorder.take(), vec![Event::Added(ground, ball)]);

    run(&mut system, 1);
    assert_eq!(recorder.take(), vec![Event::Persisted(ground, ball)]);

    system.set_position(ball, Vec3::new(0.0, 5.0, 0.0), rust_rigidphysics::Activation::Activate).unwrap();
    run(&mut system, 1);
    assert_eq!(recorder.take(), vec![Event::Removed(ground, ball)]);
}

#[test]
fn rejected_pair_never_collides() {
    let (mut system, recorder) = recorded_system();
    add_ground(&mut system);
    let ball = add_sphere(&mut system, Vec3::new(0.0, 1.0, 0.0), 0.5);
    *recorder.reject.lock() = Some(ball);

    run(&mut system, 60);
    assert!(system.position(ball).unwrap().y < -1.0);
    assert!(!recorder.take().iter().any(|e| matches!(e, Event::Added(..))));
}

#[test]
fn sleeping_and_waking_is_reported() {
    let (mut system, recorder) = recorded_system();
    add_ground(&mut system);
    let ball = add_sphere(&mut system, Vec3::new(0.0, 0.5, 0.0), 0.5);
    assert!(recorder.take().contains(&Event::Activated(ball)));

    run(&mut system, 120);
    assert!(!system.is_active(ball));
    let events = recorder.take();
    assert_eq!(events.iter().filter(|e| **e == Event::Deactivated(ball)).count(), 1);

    system.activate_body(ball).unwrap();
    assert_eq!(recorder.take(), vec![Event::Activated(ball)]);
}

#[test]
fn removing_a_touching_body_reports_contact_removal() {
    let (mut system, recorder) = recorded_system();
    let ground = add_ground(&mut system);
    let ball = add_sphere(&mut system, Vec3::new(0.0, 0.5, 0.0), 0.5);
    run(&mut system, 2);
    recorder.take();

    system.remove_body(ball).unwrap();
    let events = recorder.take();
    assert!(events.contains(&Event::Removed(ground, ball)));
    assert!(events.contains(&Event::Deactivated(ball)));
}
