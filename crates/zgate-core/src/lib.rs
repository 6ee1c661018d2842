//! Core interpreter session handling for zgate.

mod error;
mod expect;
mod process;
mod protocol;
mod session;
mod snapshot;
mod store;

pub use error::ZgateError;
pub use expect::{Expect, Match, OutputStream};
pub use process::{CommandLine, InterpreterProcess};
pub use protocol::{Marker, Phase, ProtocolTimeouts, SessionProtocol};
pub use session::{InterpreterConfig, OrchestratorConfig, SessionOrchestrator};
pub use snapshot::{validate_identity, validate_label, SnapshotId, SnapshotStore};
pub use store::{ProfileStore, SqliteProfileStore};

/// Result type for zgate operations.
pub type Result<T> = std::result::Result<T, ZgateError>;
