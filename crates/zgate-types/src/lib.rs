//! Shared types for the zgate game-session service.

mod game;
mod profile;
mod session;

pub use game::*;
pub use profile::*;
pub use session::*;
