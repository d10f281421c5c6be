use std::rc::Rc;

use glam::Vec2;
use hearth_engine::audio::{AudioCue, AudioEvent, AudioSink, RecordingAudio};
use hearth_engine::config::SceneConfig;
use hearth_engine::dialogue::{ModalKind, ScriptPhase};
use hearth_engine::geometry::Direction;
use hearth_engine::input::{ActionButton, Command, Key, RawInput};
use hearth_engine::scene::{Actor, HeadlessScene, SceneHost};
use hearth_engine::session::{NpcStage, Session};

const TICK: u64 = 16;

fn build(host: impl FnOnce(&SceneConfig) -> HeadlessScene) -> (Session<HeadlessScene>, RecordingAudio) {
    let config = SceneConfig::default();
    let host = host(&config);
    let audio = RecordingAudio::new();
    let session = Session::new(config, host, Rc::new(audio.clone()) as Rc<dyn AudioSink>)
        .expect("built-in scene is valid");
    (session, audio)
}

fn session() -> (Session<HeadlessScene>, RecordingAudio) {
    build(HeadlessScene::from_config)
}

fn run_ticks(session: &mut Session<HeadlessScene>, ticks: usize) {
    for _ in 0..ticks {
        session.tick(TICK);
    }
}

fn count_events(session: &Session<HeadlessScene>, line: &str) -> usize {
    session.events().iter().filter(|event| *event == line).count()
}

fn wait_for_script(session: &mut Session<HeadlessScene>) {
    for _ in 0..400 {
        if session.modal().focused_kind() == Some(ModalKind::NpcDialogue) {
            return;
        }
        session.tick(TICK);
    }
    panic!("scripted dialogue never opened");
}

fn finish_intro(session: &mut Session<HeadlessScene>) {
    wait_for_script(session);
    for _ in 0..20 {
        if !session.modal().is_focused() {
            break;
        }
        session.command(Command::Confirm);
        session.tick(TICK);
    }
    assert!(!session.modal().is_focused(), "dialogue did not finish");
    assert_eq!(session.npc_stage(), NpcStage::Relocating);
}

fn wait_for_counter(session: &mut Session<HeadlessScene>) {
    for _ in 0..400 {
        if session.npc_stage() == NpcStage::AtCounter {
            return;
        }
        session.tick(TICK);
    }
    panic!("npc never reached the counter");
}

/// Puts the avatar in front of the counter and waits for the sales prompt.
fn open_sales_prompt(session: &mut Session<HeadlessScene>) {
    finish_intro(session);
    wait_for_counter(session);
    session.host_mut().teleport_avatar(Vec2::new(340.0, 180.0));
    session.tick(TICK);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::MenuPrompt));
}

#[test]
fn skills_zone_opens_and_closes_the_skills_modal() {
    let (mut session, _) = session();
    finish_intro(&mut session);
    let before = session.events().len();

    session.host_mut().teleport_avatar(Vec2::new(70.0, 130.0));
    session.handle_input(RawInput::KeyDown { key: Key::Up });
    for _ in 0..20 {
        session.tick(TICK);
        if session.modal().is_focused() {
            break;
        }
    }
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::Skills));
    let entry = session.modal().entry().expect("entry");
    assert_eq!(entry.kind, ModalKind::Skills);

    session.handle_input(RawInput::KeyUp { key: Key::Up });
    session.host_mut().teleport_avatar(Vec2::new(70.0, 200.0));
    session.tick(TICK);
    assert!(!session.modal().is_focused());

    let modal_lines: Vec<&String> = session.events()[before..]
        .iter()
        .filter(|line| line.starts_with("modal."))
        .collect();
    assert_eq!(modal_lines, vec!["modal.open skills", "modal.close skills"]);
    assert_eq!(count_events(&session, "zone.enter skills"), 1);
    assert_eq!(count_events(&session, "zone.exit skills"), 1);
}

#[test]
fn dismissed_ambient_modal_reopens_only_after_leaving() {
    let (mut session, _) = session();
    finish_intro(&mut session);
    session.host_mut().teleport_avatar(Vec2::new(70.0, 113.0));
    session.tick(TICK);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::Skills));

    session.command(Command::Dismiss);
    run_ticks(&mut session, 10);
    assert!(!session.modal().is_focused());

    session.handle_input(RawInput::KeyDown { key: Key::Down });
    run_ticks(&mut session, 5);
    session.handle_input(RawInput::KeyUp { key: Key::Down });
    session.handle_input(RawInput::KeyDown { key: Key::Up });
    for _ in 0..20 {
        session.tick(TICK);
        if session.modal().is_focused() {
            break;
        }
    }
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::Skills));
    assert_eq!(count_events(&session, "modal.open skills"), 2);
}

#[test]
fn movement_is_gated_while_a_modal_is_focused() {
    let (mut session, _) = session();
    wait_for_script(&mut session);
    let start = session.avatar_position();

    session.handle_input(RawInput::KeyDown { key: Key::Left });
    session.command(Command::Move(Direction::Right));
    run_ticks(&mut session, 30);
    assert_eq!(session.avatar_position(), start);
    assert!(!session.is_walking());
}

#[test]
fn three_line_script_relocates_the_npc_exactly_once() {
    let (mut session, _) = session();
    wait_for_script(&mut session);
    assert_eq!(session.modal().script_phase(), Some(ScriptPhase::Revealing(0)));

    let expected = [
        Some(ScriptPhase::Complete(0)),
        Some(ScriptPhase::Revealing(1)),
        Some(ScriptPhase::Complete(1)),
        Some(ScriptPhase::Revealing(2)),
        Some(ScriptPhase::Complete(2)),
        None,
    ];
    for phase in expected {
        session.command(Command::Confirm);
        session.tick(TICK);
        assert_eq!(session.modal().script_phase(), phase);
    }
    assert!(!session.modal().is_focused());
    assert_eq!(session.npc_stage(), NpcStage::Relocating);
    assert_eq!(count_events(&session, "sequence.start relocation"), 1);

    session.command(Command::Confirm);
    run_ticks(&mut session, 10);
    assert_eq!(count_events(&session, "sequence.start relocation"), 1);

    wait_for_counter(&mut session);
    assert_eq!(session.npc_position(), Vec2::new(360.0, 120.0));
    assert_eq!(session.host().last_animation(Actor::Npc), Some("idle-counter"));
}

#[test]
fn unattended_script_advances_on_its_own() {
    let (mut session, _) = session();
    wait_for_script(&mut session);
    // Longest line reveals in about 5 s, then waits 4 s before advancing.
    run_ticks(&mut session, 2_000);
    assert_eq!(session.modal().script_phase(), Some(ScriptPhase::Complete(2)));
    assert_eq!(session.npc_stage(), NpcStage::Talking);
}

#[test]
fn unattended_prompt_opens_options_once() {
    let (mut session, _) = session();
    open_sales_prompt(&mut session);
    assert!(session.host().barrier_engaged());

    run_ticks(&mut session, 180);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::MenuPrompt));
    run_ticks(&mut session, 10);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::MenuOptions));
    assert_eq!(session.modal().menu_selection(), Some(0));

    run_ticks(&mut session, 400);
    assert_eq!(count_events(&session, "modal.open menu_options"), 1);
    assert_eq!(session.modal().menu_selection(), Some(0));
}

#[test]
fn dismissed_menu_waits_out_the_cooldown() {
    let (mut session, _) = session();
    open_sales_prompt(&mut session);
    session.command(Command::Confirm);
    session.tick(TICK);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::MenuOptions));

    session.command(Command::Dismiss);
    session.tick(TICK);
    assert!(!session.modal().is_focused());
    assert!(!session.host().barrier_engaged());

    run_ticks(&mut session, 20);
    assert!(!session.modal().is_focused());
    run_ticks(&mut session, 40);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::MenuPrompt));
    assert_eq!(count_events(&session, "modal.open menu_prompt"), 2);
}

#[test]
fn confirming_an_option_runs_its_action() {
    let (mut session, audio) = session();
    open_sales_prompt(&mut session);
    session.command(Command::Confirm);
    session.tick(TICK);

    session.handle_input(RawInput::KeyDown { key: Key::Down });
    session.tick(TICK);
    session.handle_input(RawInput::KeyUp { key: Key::Down });
    session.tick(TICK);
    assert_eq!(session.modal().menu_selection(), Some(1));
    assert_eq!(audio.count(AudioCue::MenuSelect), 1);

    session.command(Command::Confirm);
    session.tick(TICK);
    assert!(!session.modal().is_focused());
    assert_eq!(count_events(&session, "menu.action games"), 1);
    assert_eq!(
        session.host().opened_links(),
        ["https://github.com/sw4y4mj4in".to_string()]
    );
}

#[test]
fn failed_link_is_logged_and_the_modal_still_closes() {
    let (mut session, _) = build(|config| HeadlessScene::from_config(config).refusing_links());
    finish_intro(&mut session);

    session.handle_input(RawInput::KeyDown { key: Key::Down });
    for _ in 0..10 {
        session.tick(TICK);
        if session.modal().is_focused() {
            break;
        }
    }
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::Contact));
    session.handle_input(RawInput::KeyUp { key: Key::Down });
    session.command(Command::Confirm);
    run_ticks(&mut session, 5);

    assert!(!session.modal().is_focused());
    assert_eq!(
        count_events(&session, "link.failed https://instagram.com/sw4y4mj4in"),
        1
    );
    assert!(session.host().opened_links().is_empty());
}

#[test]
fn walking_drives_animation_and_walk_loop() {
    let (mut session, audio) = session();
    finish_intro(&mut session);
    let start = session.avatar_position();

    session.command(Command::Move(Direction::Left));
    session.tick(TICK);
    let moved = start - session.avatar_position();
    assert!((moved.x - 2.56).abs() < 1e-3 && moved.y == 0.0, "moved {moved:?}");
    assert_eq!(session.host().last_animation(Actor::Avatar), Some("walk-left"));
    session.tick(TICK);
    assert_eq!(session.host().last_animation(Actor::Avatar), Some("idle-left"));

    let walk_loop: Vec<bool> = audio
        .events()
        .into_iter()
        .filter_map(|event| match event {
            AudioEvent::WalkLoop { active } => Some(active),
            AudioEvent::Play { .. } => None,
        })
        .collect();
    assert_eq!(walk_loop, vec![true, false]);
}

#[test]
fn npc_arriving_on_the_avatar_does_not_trap_it() {
    let (mut session, _) = session();
    finish_intro(&mut session);
    session.host_mut().teleport_avatar(Vec2::new(345.0, 120.0));
    wait_for_counter(&mut session);
    let start = session.avatar_position();
    assert!(session.host().npc_bounds().intersects(&session.host().avatar_bounds()));
    assert!(!session.modal().is_focused());

    session.handle_input(RawInput::KeyDown { key: Key::Left });
    run_ticks(&mut session, 60);
    session.handle_input(RawInput::KeyUp { key: Key::Left });
    session.tick(TICK);
    assert!(session.avatar_position().x < start.x - 100.0);
    assert!(!session.host().npc_bounds().intersects(&session.host().avatar_bounds()));

    // Walking back stops at the NPC's edge instead of re-entering it.
    session.handle_input(RawInput::KeyDown { key: Key::Right });
    run_ticks(&mut session, 80);
    assert!(!session.host().npc_bounds().intersects(&session.host().avatar_bounds()));
}

#[test]
fn camera_follows_the_avatar_from_the_start() {
    let (session, _) = session();
    let camera = session.host().camera().expect("camera follows");
    assert_eq!(camera.zoom, 2.0);
    assert_eq!(camera.deadzone, Vec2::new(50.0, 50.0));
}

#[test]
fn held_stick_scrolls_the_menu_options() {
    let (mut session, audio) = session();
    open_sales_prompt(&mut session);
    session.command(Command::Confirm);
    session.tick(TICK);
    assert_eq!(session.modal().menu_selection(), Some(0));

    session.handle_input(RawInput::Joystick { x: 0.0, y: -1.0 });
    run_ticks(&mut session, 20);
    assert_eq!(session.modal().menu_selection(), Some(2));
    assert_eq!(audio.count(AudioCue::MenuSelect), 2);

    session.handle_input(RawInput::JoystickReleased);
    run_ticks(&mut session, 40);
    assert_eq!(session.modal().menu_selection(), Some(2));
}

#[test]
fn dismiss_does_not_cut_the_scripted_dialogue_short() {
    let (mut session, _) = session();
    wait_for_script(&mut session);
    session.command(Command::Dismiss);
    session.handle_input(RawInput::Button {
        button: ActionButton::S,
    });
    run_ticks(&mut session, 5);
    assert_eq!(session.modal().focused_kind(), Some(ModalKind::NpcDialogue));
    assert_eq!(session.npc_stage(), NpcStage::Talking);
    assert_eq!(count_events(&session, "modal.close npc_dialogue"), 0);
}
