//! Door Switch Demo
//!
//! A lever and a door described in RON. Clicking the lever opens the door,
//! and a delay pulls the lever back a few ticks later, which closes it
//! again. The door counts how often it was opened.
//!
//! Run with `RUST_LOG=debug` to watch the dispatchers.

use smart_core::{Action, ActionType, Counter, EffectContext, EntityId, Runtime, Scene, States};
use smart_script::Loader;

const SCENE: &str = r#"
(
    entities: [
        (
            name: "lever",
            states: Some((values: ["up", "down"], default: Some("up"))),
            actions: [
                (name: "Pull", type: set_state, payload: {"state": "down"}),
                (name: "Release", type: set_state, payload: {"state": "up"}),
                (name: "SpringBack", type: start_delay, payload: {"actions": ["Release"], "ticks": 3}),
            ],
            triggers: [
                (
                    type: on_click,
                    conditions: [(type: when_state_is, value: "up")],
                    actions: [(name: "Pull")],
                ),
                (
                    type: on_state_change,
                    conditions: [(type: when_state_is, value: "down")],
                    actions: [(entity: Some("door"), name: "Open"), (name: "SpringBack")],
                ),
                (
                    type: on_state_change,
                    conditions: [(type: when_state_is, value: "up")],
                    actions: [(entity: Some("door"), name: "Close")],
                ),
            ],
        ),
        (
            name: "door",
            states: Some((values: ["closed", "open"])),
            counter: Some(0),
            actions: [
                (name: "Open", type: set_state, payload: {"state": "open"}),
                (name: "Close", type: set_state, payload: {"state": "closed"}),
                (name: "Tally", type: increment_counter),
                (name: "Creak", type: play_sound, payload: {"src": "creak.ogg"}),
            ],
            triggers: [
                (
                    type: on_state_change,
                    conditions: [(type: when_state_is, value: "open")],
                    actions: [(name: "Tally"), (name: "Creak")],
                ),
            ],
        ),
    ],
)
"#;

fn door_state(scene: &Scene, door: EntityId) -> String {
    let state = scene
        .get::<States>(door)
        .and_then(|s| s.effective_current())
        .unwrap_or("?");
    let opened = scene.get::<Counter>(door).map_or(0, |c| c.value);
    format!("{} (opened {} times)", state, opened)
}

fn main() -> smart_script::Result<()> {
    env_logger::init();

    println!("=== Smart Items Door Switch Demo ===\n");

    let mut loader = Loader::new();
    loader.load_str(SCENE)?;
    let defs = loader.finish();
    println!("Loaded {} entity definitions", defs.len());

    let mut scene = Scene::new();
    let created = defs.instantiate(&mut scene)?;
    let (Some(&lever), Some(&door)) = (created.get("lever"), created.get("door")) else {
        log::error!("scene is missing the lever or the door");
        return Ok(());
    };
    println!("  lever: {}", lever);
    println!("  door:  {}\n", door);

    let mut runtime = Runtime::new();
    runtime.register_handler(
        ActionType::PlaySound,
        |cx: &mut EffectContext<'_>, action: &Action| {
            let src = cx.payload.get("src").and_then(|v| v.as_str()).unwrap_or("?");
            println!("    [tick {}] {} {} plays {}", cx.tick(), cx.entity, action.name, src);
        },
    )?;
    runtime.install(&scene)?;

    let report = runtime.tick(&mut scene);
    println!(
        "Tick {}: bound {} action catalogs, {} trigger catalogs",
        report.tick,
        report.bound_actions.len(),
        report.bound_triggers.len()
    );
    println!("Door: {}\n", door_state(&scene, door));

    for attempt in 1..=2 {
        let clicked = runtime.click(&mut scene, lever);
        println!("Click {} on the lever (clickable: {})", attempt, clicked);
        println!("Door: {}\n", door_state(&scene, door));
    }

    println!("Waiting for the lever to spring back...");
    for _ in 0..4 {
        let report = runtime.tick(&mut scene);
        if report.delays_fired > 0 {
            println!("  tick {}: {} delay(s) fired", report.tick, report.delays_fired);
        }
    }
    println!("Door: {}\n", door_state(&scene, door));

    runtime.click(&mut scene, lever);
    println!("Click 3 on the lever");
    println!("Door: {}", door_state(&scene, door));

    println!("\n=== Demo Complete ===");
    Ok(())
}
