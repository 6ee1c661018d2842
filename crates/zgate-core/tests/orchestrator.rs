//! End-to-end tests for the session orchestrator.
//!
//! These run the real PTY plumbing against `fixtures/fake_zork.sh`, a shell
//! stand-in that speaks the same prompt grammar as dfrotz.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zgate_core::{
    InterpreterConfig, OrchestratorConfig, ProtocolTimeouts, SessionOrchestrator, SnapshotId,
    ZgateError,
};
use zgate_types::{GameTitle, Profile, AUTOSAVE_LABEL};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn test_config(saves_dir: &Path) -> OrchestratorConfig {
    let mut data_files: HashMap<GameTitle, PathBuf> = GameTitle::ALL
        .into_iter()
        .map(|title| (title, PathBuf::from("fake_zork.sh")))
        .collect();
    data_files.insert(GameTitle::Zork2, PathBuf::from("silent.sh"));
    data_files.insert(GameTitle::Zork3, PathBuf::from("missing.z5"));

    OrchestratorConfig {
        interpreter: InterpreterConfig {
            binary: PathBuf::from("/bin/sh"),
            flags: Vec::new(),
            games_root: fixtures_dir(),
            data_files,
        },
        saves_dir: saves_dir.to_path_buf(),
        timeouts: ProtocolTimeouts {
            banner: Duration::from_secs(5),
            filename_prompt: Duration::from_secs(5),
            overwrite_question: Duration::from_secs(2),
            ready: Duration::from_secs(2),
        },
    }
}

fn setup() -> (SessionOrchestrator, TempDir) {
    let dir = TempDir::new().unwrap();
    let orchestrator = SessionOrchestrator::new(test_config(&dir.path().join("saves"))).unwrap();
    (orchestrator, dir)
}

fn read_snapshot(orchestrator: &SessionOrchestrator, identity: &str, label: &str) -> String {
    let id = SnapshotId::new(identity, GameTitle::Zork1, label).unwrap();
    std::fs::read_to_string(orchestrator.snapshots().path_for(&id))
        .unwrap()
        .trim()
        .to_string()
}

// ============================================================================
// NEW GAME
// ============================================================================

#[test]
fn test_new_game_records_autosave() {
    let (orchestrator, _dir) = setup();

    let result = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();

    assert!(result.title_info.contains("Serial number"));
    assert!(result.first_line.contains("West of House"));
    assert_eq!(result.user_profile.last_game, Some(GameTitle::Zork1));
    assert!(result.user_profile.has_save(GameTitle::Zork1, AUTOSAVE_LABEL));
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "West of House");
}

#[test]
fn test_new_game_replaces_existing_autosave() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let moved = orchestrator
        .act(started.user_profile, "zork1", "north")
        .unwrap();
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "North of House");

    let restarted = orchestrator.new_game(moved.user_profile, "zork1").unwrap();
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "West of House");
    assert_eq!(restarted.user_profile.saves(GameTitle::Zork1).len(), 1);
}

#[test]
fn test_new_game_resets_checkpoint_missing_from_profile() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    orchestrator.act(started.user_profile, "zork1", "north").unwrap();

    // A profile that lost its AutoSave entry while the file stayed behind.
    let restarted = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    assert!(restarted.user_profile.has_save(GameTitle::Zork1, AUTOSAVE_LABEL));
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "West of House");

    let looked = orchestrator.act(restarted.user_profile, "zork1", "look").unwrap();
    assert!(looked.cmd_output.contains("West of House"), "{:?}", looked.cmd_output);
    assert!(!looked.cmd_output.contains("North of House"), "{:?}", looked.cmd_output);
}

#[test]
fn test_unknown_title_falls_back_to_default() {
    let (orchestrator, _dir) = setup();

    let result = orchestrator.new_game(Profile::new("u1"), "planetfall").unwrap();
    assert_eq!(result.user_profile.last_game, Some(GameTitle::Zork1));
    assert!(result.user_profile.has_save(GameTitle::Zork1, AUTOSAVE_LABEL));
}

// ============================================================================
// ACT
// ============================================================================

#[test]
fn test_look_after_new_game() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let looked = orchestrator
        .act(started.user_profile.clone(), "zork1", "look")
        .unwrap();

    assert!(!looked.cmd_output.trim().is_empty());
    assert!(looked.cmd_output.contains("West of House"));
    assert_eq!(looked.look_output.first_line, started.first_line);
    assert_eq!(looked.look_output.title_info, started.title_info);
    assert_eq!(looked.user_profile, started.user_profile);
}

#[test]
fn test_act_carries_state_between_requests() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let moved = orchestrator
        .act(started.user_profile, "zork1", "north")
        .unwrap();
    assert!(moved.cmd_output.contains("North of House"));

    let looked = orchestrator.act(moved.user_profile, "zork1", "look").unwrap();
    assert!(looked.cmd_output.contains("North of House"), "{:?}", looked.cmd_output);
}

#[test]
fn test_act_resaves_after_invalid_command() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let id = SnapshotId::autosave("u1", GameTitle::Zork1).unwrap();
    let path = orchestrator.snapshots().path_for(&id);
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let result = orchestrator
        .act(started.user_profile, "zork1", "xyzzy")
        .unwrap();
    assert!(result.cmd_output.contains("I don't know the word"));

    let after = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert!(after > before);
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "West of House");
}

// ============================================================================
// SAVE AS / START FROM SAVE
// ============================================================================

#[test]
fn test_save_as_records_label_and_overwrites() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let moved = orchestrator
        .act(started.user_profile, "zork1", "north")
        .unwrap();

    let profile = orchestrator
        .save_as(moved.user_profile, "zork1", "cellar")
        .unwrap();
    assert!(profile.has_save(GameTitle::Zork1, "cellar"));
    assert_eq!(read_snapshot(&orchestrator, "u1", "cellar"), "North of House");

    // Second save under the same label goes through the overwrite question.
    let back = orchestrator.act(profile, "zork1", "south").unwrap();
    let profile = orchestrator
        .save_as(back.user_profile, "zork1", "cellar")
        .unwrap();
    assert_eq!(read_snapshot(&orchestrator, "u1", "cellar"), "West of House");
    assert_eq!(profile.saves(GameTitle::Zork1).len(), 2);
}

#[test]
fn test_start_from_save() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    let profile = orchestrator
        .save_as(started.user_profile, "zork1", "opening")
        .unwrap();

    let mut elsewhere = profile.clone();
    elsewhere.last_game = Some(GameTitle::Wish);
    let resumed = orchestrator
        .start_from_save(elsewhere, "zork1", "opening")
        .unwrap();

    assert_eq!(resumed.first_line, started.first_line);
    assert_eq!(resumed.user_profile.last_game, Some(GameTitle::Zork1));
    assert_eq!(
        resumed.user_profile.saves(GameTitle::Zork1),
        profile.saves(GameTitle::Zork1)
    );
}

#[test]
fn test_save_as_rejects_path_escape_before_spawning() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir.path().join("saves"));
    // Any spawn attempt would fail with ProcessSpawnFailed instead.
    config.interpreter.binary = PathBuf::from("/nonexistent/dfrotz");
    let orchestrator = SessionOrchestrator::new(config).unwrap();

    let err = orchestrator
        .save_as(Profile::new("u1"), "zork1", "../evil")
        .unwrap_err();
    assert!(matches!(err, ZgateError::InvalidLabel { .. }), "{:?}", err);

    let err = orchestrator
        .start_from_save(Profile::new("u1"), "zork1", "/etc/passwd")
        .unwrap_err();
    assert!(matches!(err, ZgateError::InvalidLabel { .. }), "{:?}", err);
}

#[test]
fn test_act_on_unrecorded_checkpoint_is_reported() {
    let (orchestrator, _dir) = setup();

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();
    orchestrator.act(started.user_profile, "zork1", "north").unwrap();

    let err = orchestrator.act(Profile::new("u1"), "zork1", "south").unwrap_err();
    assert!(matches!(err, ZgateError::UnexpectedOverwrite(_)), "{:?}", err);
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "North of House");
}

#[test]
fn test_save_as_rejects_prompt_characters() {
    let (orchestrator, _dir) = setup();

    for label in ["cellar>", "why?"] {
        let err = orchestrator
            .save_as(Profile::new("u1"), "zork1", label)
            .unwrap_err();
        assert!(matches!(err, ZgateError::InvalidLabel { .. }), "{}: {:?}", label, err);
    }
}

#[test]
fn test_save_as_rejects_reserved_label() {
    let (orchestrator, _dir) = setup();

    let err = orchestrator
        .save_as(Profile::new("u1"), "zork1", AUTOSAVE_LABEL)
        .unwrap_err();
    assert!(matches!(err, ZgateError::InvalidLabel { .. }), "{:?}", err);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_spawn_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir.path().join("saves"));
    config.interpreter.binary = PathBuf::from("/nonexistent/dfrotz");
    let orchestrator = SessionOrchestrator::new(config).unwrap();

    let err = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap_err();
    assert!(matches!(err, ZgateError::ProcessSpawnFailed(_)), "{:?}", err);
}

#[test]
fn test_missing_banner_times_out() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir.path().join("saves"));
    config.timeouts.banner = Duration::from_millis(300);
    let orchestrator = SessionOrchestrator::new(config).unwrap();

    let err = orchestrator.new_game(Profile::new("u1"), "zork2").unwrap_err();
    assert!(matches!(err, ZgateError::ProtocolTimeout { .. }), "{:?}", err);
    assert!(err.is_protocol_failure());
}

#[test]
fn test_interpreter_exit_is_protocol_failure() {
    let (orchestrator, _dir) = setup();

    let err = orchestrator.new_game(Profile::new("u1"), "zork3").unwrap_err();
    assert!(matches!(err, ZgateError::UnexpectedEof { .. }), "{:?}", err);
}

#[test]
fn test_invalid_identity_rejected() {
    let (orchestrator, _dir) = setup();

    let err = orchestrator.new_game(Profile::new("../u1"), "zork1").unwrap_err();
    assert!(matches!(err, ZgateError::InvalidIdentity(_)), "{:?}", err);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_actions_on_same_checkpoint() {
    let (orchestrator, _dir) = setup();
    let orchestrator = Arc::new(orchestrator);

    let started = orchestrator.new_game(Profile::new("u1"), "zork1").unwrap();

    let handles: Vec<_> = ["look", "xyzzy", "look"]
        .into_iter()
        .map(|action| {
            let orchestrator = orchestrator.clone();
            let profile = started.user_profile.clone();
            std::thread::spawn(move || orchestrator.act(profile, "zork1", action))
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap().unwrap();
        assert!(!result.cmd_output.trim().is_empty());
    }
    assert_eq!(read_snapshot(&orchestrator, "u1", AUTOSAVE_LABEL), "West of House");
}

#[test]
fn test_independent_players_do_not_share_checkpoints() {
    let (orchestrator, _dir) = setup();

    let a = orchestrator.new_game(Profile::new("alice@example.com"), "zork1").unwrap();
    let b = orchestrator.new_game(Profile::new("bob@example.com"), "zork1").unwrap();
    orchestrator.act(a.user_profile, "zork1", "north").unwrap();

    assert_eq!(
        read_snapshot(&orchestrator, "alice@example.com", AUTOSAVE_LABEL),
        "North of House"
    );
    let looked = orchestrator.act(b.user_profile, "zork1", "look").unwrap();
    assert!(looked.cmd_output.contains("West of House"));
}
