//! Per-request game sessions.
//!
//! Each operation launches one interpreter, replays the player's checkpoint
//! into it, applies the request and writes the checkpoint back, then kills
//! the interpreter before returning. The profile goes in and comes back out
//! by value; nothing here writes it to a store.

use crate::process::{CommandLine, InterpreterProcess};
use crate::protocol::{ProtocolTimeouts, SessionProtocol};
use crate::snapshot::{SnapshotId, SnapshotStore};
use crate::{Result, ZgateError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use zgate_types::{
    ActionResponse, GameTitle, NewGameResponse, Profile, StartResponse, AUTOSAVE_LABEL,
};

/// How to launch the interpreter for a title.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub binary: PathBuf,
    pub flags: Vec<String>,
    /// Working directory; story files are resolved relative to it.
    pub games_root: PathBuf,
    /// Per-title replacements for the catalogue's story files.
    pub data_files: HashMap<GameTitle, PathBuf>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/games/dfrotz"),
            flags: vec!["-mp".to_string()],
            games_root: PathBuf::from("."),
            data_files: HashMap::new(),
        }
    }
}

impl InterpreterConfig {
    pub fn data_file(&self, title: GameTitle) -> PathBuf {
        self.data_files
            .get(&title)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(title.data_file()))
    }

    /// `<binary> <flags> <story file>`, run from the games root.
    pub fn command_for(&self, title: GameTitle) -> CommandLine {
        CommandLine::new(&self.binary)
            .args(self.flags.iter().cloned())
            .arg(self.data_file(title).to_string_lossy())
            .cwd(&self.games_root)
    }
}

/// Configuration for the session orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub interpreter: InterpreterConfig,
    pub saves_dir: PathBuf,
    pub timeouts: ProtocolTimeouts,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interpreter: InterpreterConfig::default(),
            saves_dir: PathBuf::from("/data/saves"),
            timeouts: ProtocolTimeouts::default(),
        }
    }
}

/// Runs the four game operations, one interpreter per call.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    snapshots: SnapshotStore,
    /// Serializes operations on the same (identity, title) checkpoint.
    title_locks: DashMap<(String, GameTitle), Arc<Mutex<()>>>,
}

impl SessionOrchestrator {
    /// Create the orchestrator, making sure the snapshot directory exists.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let snapshots = SnapshotStore::new(&config.saves_dir);
        snapshots.ensure_dir()?;
        debug!(target: "zgate::session", "Snapshots kept in {:?}", snapshots.dir());

        Ok(Self {
            config,
            snapshots,
            title_locks: DashMap::new(),
        })
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Start `title` from the beginning and checkpoint it.
    pub fn new_game(&self, mut profile: Profile, title: &str) -> Result<NewGameResponse> {
        let title = resolve_title(title);
        let autosave = SnapshotId::autosave(&profile.email, title)?;

        let opening = self.with_title_lock(&autosave, || {
            // A new game replaces the old checkpoint rather than overwriting it,
            // including one the profile has lost track of.
            let recorded = self.snapshot_recorded(&profile, &autosave);
            let mut exists = false;
            if recorded || self.snapshots.exists(&autosave) {
                if let Err(e) = self.snapshots.remove(&autosave) {
                    warn!(target: "zgate::session", "Failed to remove old checkpoint {}: {}", autosave, e);
                    exists = true;
                }
            }

            self.run(title, |session| {
                let opening = session.read_opening()?;
                session.save(&self.snapshots.path_for(&autosave), exists)?;
                Ok(opening)
            })
        })?;

        profile.last_game = Some(title);
        profile.record_save(title, AUTOSAVE_LABEL);
        info!(target: "zgate::session", "New {} game for {}", title, profile.email);

        Ok(NewGameResponse {
            title_info: opening.title_info,
            first_line: opening.first_line,
            user_profile: profile,
        })
    }

    /// Resume `title` from a named save.
    pub fn start_from_save(
        &self,
        mut profile: Profile,
        title: &str,
        label: &str,
    ) -> Result<StartResponse> {
        let title = resolve_title(title);
        let snapshot = SnapshotId::new(&profile.email, title, label)?;

        let opening = self.with_title_lock(&snapshot, || {
            self.run(title, |session| {
                let opening = session.read_opening()?;
                let reply = session.restore(&self.snapshots.path_for(&snapshot))?;
                debug!(target: "zgate::session", "Restore of {} replied {:?}", snapshot, reply);
                Ok(opening)
            })
        })?;

        profile.last_game = Some(title);
        Ok(StartResponse {
            title_info: opening.title_info,
            first_line: opening.first_line,
            user_profile: profile,
        })
    }

    /// Apply one action on top of the checkpoint and checkpoint the result.
    pub fn act(&self, mut profile: Profile, title: &str, action: &str) -> Result<ActionResponse> {
        let title = resolve_title(title);
        let autosave = SnapshotId::autosave(&profile.email, title)?;

        let (look_output, cmd_output) = self.with_title_lock(&autosave, || {
            let exists = self.snapshot_recorded(&profile, &autosave);
            self.run(title, |session| {
                let path = self.snapshots.path_for(&autosave);
                let opening = session.read_opening()?;
                session.restore(&path)?;
                let output = session.execute(action)?;
                session.save(&path, exists)?;
                Ok((opening, output))
            })
        })?;

        profile.last_game = Some(title);
        // The checkpoint was just written, so the profile has to know about it.
        profile.record_save(title, AUTOSAVE_LABEL);
        debug!(target: "zgate::session", "{} in {}: {:?}", profile.email, title, action);

        Ok(ActionResponse {
            cmd_output,
            look_output,
            user_profile: profile,
        })
    }

    /// Copy the checkpoint into a save under a player-chosen label.
    pub fn save_as(&self, mut profile: Profile, title: &str, label: &str) -> Result<Profile> {
        let title = resolve_title(title);
        let target = SnapshotId::new(&profile.email, title, label)?;
        if target.is_autosave() {
            return Err(ZgateError::InvalidLabel {
                label: label.to_string(),
                reason: "reserved for the automatic checkpoint",
            });
        }
        let autosave = SnapshotId::autosave(&profile.email, title)?;

        self.with_title_lock(&autosave, || {
            let exists = self.snapshot_recorded(&profile, &target);
            self.run(title, |session| {
                session.read_opening()?;
                session.restore(&self.snapshots.path_for(&autosave))?;
                session.save(&self.snapshots.path_for(&target), exists)?;
                Ok(())
            })
        })?;

        profile.last_game = Some(title);
        if profile.record_save(title, label) {
            info!(target: "zgate::session", "Recorded save '{}' for {} in {}", label, profile.email, title);
        }
        Ok(profile)
    }

    /// Spawn an interpreter for `title`, hand it to `steps`, and kill it
    /// afterwards whatever `steps` returned.
    fn run<T>(
        &self,
        title: GameTitle,
        steps: impl FnOnce(&mut SessionProtocol) -> Result<T>,
    ) -> Result<T> {
        let command = self.config.interpreter.command_for(title);
        let process = InterpreterProcess::spawn(&command)?;
        let mut session = SessionProtocol::new(process, self.config.timeouts);
        let session_id = session.session_id();

        let result = steps(&mut session);
        session.terminate();

        if let Err(e) = &result {
            warn!(target: "zgate::session", "Session {} for {} failed: {}", session_id, title, e);
        }
        result
    }

    /// Run `f` while holding the lock for the snapshot's (identity, title).
    /// The map entry goes away once nobody else holds or waits on it.
    fn with_title_lock<T>(&self, snapshot: &SnapshotId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let key = (snapshot.identity().to_string(), snapshot.title());
        let lock = self.title_locks.entry(key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        drop(lock);
        self.title_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Whether the interpreter will ask before overwriting `snapshot`.
    ///
    /// The profile's save set is the answer. A disagreeing snapshot directory
    /// is logged and otherwise left alone.
    fn snapshot_recorded(&self, profile: &Profile, snapshot: &SnapshotId) -> bool {
        let recorded = profile.has_save(snapshot.title(), snapshot.label());
        let on_disk = self.snapshots.exists(snapshot);
        if recorded != on_disk {
            warn!(
                target: "zgate::session",
                "Profile and snapshot directory disagree about {} (recorded: {}, on disk: {})",
                snapshot, recorded, on_disk
            );
        }
        recorded
    }
}

fn resolve_title(requested: &str) -> GameTitle {
    let title = GameTitle::resolve(requested);
    if title.as_str() != requested {
        info!(target: "zgate::session", "Unknown title '{}', using {}", requested, title);
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_line() {
        let config = InterpreterConfig::default();
        let command = config.command_for(GameTitle::Zork1);
        assert_eq!(command.program, PathBuf::from("/usr/games/dfrotz"));
        assert_eq!(command.args, vec!["-mp", "Games/Zork1/zork1.z5"]);
        assert_eq!(command.cwd, Some(PathBuf::from(".")));
    }

    #[test]
    fn test_data_file_override() {
        let mut config = InterpreterConfig::default();
        config
            .data_files
            .insert(GameTitle::Hike, PathBuf::from("custom/hhgg.z5"));
        assert_eq!(config.data_file(GameTitle::Hike), PathBuf::from("custom/hhgg.z5"));
        assert_eq!(config.data_file(GameTitle::Wish), PathBuf::from("Games/Wishbringer/wishbrin.dat"));
    }

    #[test]
    fn test_title_locks_are_released() {
        let dir = tempfile::TempDir::new().unwrap();
        let orchestrator = SessionOrchestrator::new(OrchestratorConfig {
            saves_dir: dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        let id = SnapshotId::autosave("u1", GameTitle::Zork1).unwrap();

        let value = orchestrator
            .with_title_lock(&id, || {
                assert_eq!(orchestrator.title_locks.len(), 1);
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert!(orchestrator.title_locks.is_empty());

        let err = orchestrator
            .with_title_lock(&id, || -> Result<()> { Err(ZgateError::InvalidIdentity("x".to_string())) })
            .unwrap_err();
        assert!(matches!(err, ZgateError::InvalidIdentity(_)));
        assert!(orchestrator.title_locks.is_empty());
    }

    #[test]
    fn test_resolve_title() {
        assert_eq!(resolve_title("spell"), GameTitle::Spell);
        assert_eq!(resolve_title("trinity"), GameTitle::Zork1);
    }
}
