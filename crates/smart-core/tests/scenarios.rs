//! End-to-end behavior of the scripting runtime over a whole scene

use smart_core::{
    Action, ActionTarget, ActionType, Actions, Condition, ConditionType, EffectContext, EntityId,
    Runtime, Scene, States, Trigger, TriggerType, Triggers, ValueMap,
};
use std::cell::Cell;
use std::rc::Rc;

/// An entity with `States{off,on}`, a `Toggle` (-> on) and a `Restore`
/// (-> off) action, and a click trigger bound to `Toggle`
fn switch(scene: &mut Scene) -> EntityId {
    let e = scene.add_entity();
    let id = scene.mint_id();
    scene
        .create_or_replace(e, States::new(["off", "on"]).with_current("off"))
        .unwrap();
    scene
        .create_or_replace(
            e,
            Actions::new(id)
                .with(Action::new("Toggle", ActionType::SetState).with("state", "on"))
                .with(Action::new("Restore", ActionType::SetState).with("state", "off")),
        )
        .unwrap();
    scene
        .create_or_replace(
            e,
            Triggers::new().with(Trigger::new(TriggerType::OnClick).then(ActionTarget::local("Toggle"))),
        )
        .unwrap();
    e
}

fn start(scene: &mut Scene) -> Runtime {
    let mut runtime = Runtime::new();
    runtime.install(scene).unwrap();
    runtime.tick(scene);
    runtime
}

fn count_trigger(runtime: &mut Runtime, entity: EntityId, trigger: TriggerType) -> Rc<Cell<usize>> {
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    runtime.observe_trigger(entity, trigger, Rc::new(move |_: EntityId, _: &ValueMap| h.set(h.get() + 1)));
    hits
}

fn current(scene: &Scene, entity: EntityId) -> Option<String> {
    scene
        .get::<States>(entity)
        .and_then(|s| s.effective_current())
        .map(str::to_string)
}

#[test]
fn click_sets_state_and_emits_one_state_change() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    let mut runtime = start(&mut scene);
    let changes = count_trigger(&mut runtime, e, TriggerType::OnStateChange);

    assert!(runtime.click(&mut scene, e));

    assert_eq!(scene.get::<States>(e).unwrap().current_value.as_deref(), Some("on"));
    assert_eq!(changes.get(), 1);
}

#[test]
fn emitted_actions_work_without_input() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    let mut runtime = start(&mut scene);

    runtime.emit_action(&mut scene, e, "Restore", &ValueMap::new());
    runtime.emit_action(&mut scene, e, "Toggle", &ValueMap::new());

    assert_eq!(current(&scene, e).as_deref(), Some("on"));
}

#[test]
fn clicks_fire_once_each_regardless_of_ticks() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    let mut runtime = start(&mut scene);

    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    runtime.observe_action(e, "Toggle", Rc::new(move |_: EntityId, _: &ValueMap| r.set(r.get() + 1)));

    for _ in 0..20 {
        runtime.tick(&mut scene);
    }
    for _ in 0..3 {
        runtime.click(&mut scene, e);
    }
    assert_eq!(runs.get(), 3);
}

#[test]
fn state_change_chains_into_another_entity() {
    let mut scene = Scene::new();
    let lever = switch(&mut scene);
    let lever_states = scene.mint_id();
    scene.get_mut::<States>(lever).unwrap().id = lever_states;

    let door = scene.add_entity();
    let door_actions = scene.mint_id();
    scene
        .create_or_replace(door, States::new(["closed", "open"]))
        .unwrap();
    scene
        .create_or_replace(
            door,
            Actions::new(door_actions)
                .with(Action::new("Open", ActionType::SetState).with("state", "open"))
                .with(Action::new("Close", ActionType::SetState).with("state", "closed")),
        )
        .unwrap();

    // the lever reacts to its own state changes by driving the door
    let mut triggers = scene.get::<Triggers>(lever).unwrap().clone();
    triggers.value.push(
        Trigger::new(TriggerType::OnStateChange)
            .when(Condition::new(ConditionType::WhenStateIs, "on").on(lever_states))
            .then(ActionTarget::remote(door_actions, "Open")),
    );
    triggers.value.push(
        Trigger::new(TriggerType::OnStateChange)
            .when(Condition::new(ConditionType::WhenStateIs, "off"))
            .then(ActionTarget::remote(door_actions, "Close")),
    );
    scene.create_or_replace(lever, triggers).unwrap();

    let mut runtime = start(&mut scene);
    runtime.click(&mut scene, lever);
    assert_eq!(current(&scene, door).as_deref(), Some("open"));

    runtime.emit_action(&mut scene, lever, "Restore", &ValueMap::new());
    assert_eq!(current(&scene, door).as_deref(), Some("closed"));
}

#[test]
fn invalid_requested_state_lands_on_default() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    scene.get_mut::<States>(e).unwrap().default_value = Some("on".into());
    let actions = scene.get_mut::<Actions>(e).unwrap();
    actions
        .value
        .push(Action::new("Broken", ActionType::SetState).with("state", "purple"));
    let mut runtime = start(&mut scene);

    runtime.emit_action(&mut scene, e, "Restore", &ValueMap::new());
    assert_eq!(current(&scene, e).as_deref(), Some("off"));

    runtime.emit_action(&mut scene, e, "Broken", &ValueMap::new());
    let states = scene.get::<States>(e).unwrap();
    assert_eq!(states.effective_current(), states.effective_default());
    assert_eq!(states.effective_current(), Some("on"));
}

#[test]
fn cloned_entity_is_wired_to_itself() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    let own = scene.get::<Actions>(e).unwrap().id;
    // make the click target explicit so the clone has something to remap
    scene.get_mut::<Triggers>(e).unwrap().value[0].actions[0].id = Some(own);

    let mut runtime = start(&mut scene);
    let copy = scene.clone_entity(e).unwrap();
    assert!(!runtime.triggers_bound(copy));
    runtime.tick(&mut scene);
    assert!(runtime.is_clickable(copy));

    runtime.click(&mut scene, copy);
    assert_eq!(current(&scene, copy).as_deref(), Some("on"));
    assert_eq!(current(&scene, e).as_deref(), Some("off"), "original untouched");

    let original_target = scene.get::<Triggers>(e).unwrap().value[0].actions[0].id;
    assert_eq!(original_target, Some(own));
}

#[test]
fn clone_action_spawns_working_copy() {
    let mut scene = Scene::new();
    let e = switch(&mut scene);
    scene
        .get_mut::<Actions>(e)
        .unwrap()
        .value
        .push(Action::new("Duplicate", ActionType::CloneEntity));
    let mut runtime = start(&mut scene);

    runtime.emit_action(&mut scene, e, "Duplicate", &ValueMap::new());
    let report = runtime.tick(&mut scene);
    assert_eq!(report.bound_actions.len(), 1);
    assert_eq!(report.bound_triggers.len(), 1);
}

#[test]
fn independent_runtimes_do_not_share_bindings() {
    let mut a = Scene::new();
    let mut b = Scene::new();
    let ea = switch(&mut a);
    let eb = switch(&mut b);
    assert_eq!(ea, eb);

    let mut ra = start(&mut a);
    let mut rb = Runtime::new();
    rb.install(&b).unwrap();

    assert!(ra.click(&mut a, ea));
    assert!(!rb.click(&mut b, eb), "b has not ticked yet");
    assert_eq!(current(&b, eb).as_deref(), Some("off"));
}

#[test]
fn effect_handlers_are_pluggable() {
    let mut scene = Scene::new();
    let e = scene.add_entity();
    let id = scene.mint_id();
    scene
        .create_or_replace(
            e,
            Actions::new(id).with(Action::new("Chime", ActionType::PlaySound).with("src", "bell.mp3")),
        )
        .unwrap();
    scene
        .create_or_replace(
            e,
            Triggers::new().with(Trigger::new(TriggerType::OnSpawn).then(ActionTarget::local("Chime"))),
        )
        .unwrap();

    let played = Rc::new(Cell::new(0));
    let p = played.clone();
    let mut runtime = Runtime::new();
    runtime
        .register_handler(ActionType::PlaySound, move |cx: &mut EffectContext<'_>, action: &Action| {
            assert_eq!(action.name, "Chime");
            assert_eq!(cx.payload.get("src").and_then(|v| v.as_str()), Some("bell.mp3"));
            p.set(p.get() + 1);
        })
        .unwrap();
    runtime.install(&scene).unwrap();

    for _ in 0..4 {
        runtime.tick(&mut scene);
    }
    assert_eq!(played.get(), 1);
}
