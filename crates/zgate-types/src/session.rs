//! Results of game-session operations.

use crate::Profile;
use serde::{Deserialize, Serialize};

/// Text read when an interpreter starts: the title/serial banner and the
/// opening room description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opening {
    pub title_info: String,
    pub first_line: String,
}

/// Result of starting a new game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResponse {
    pub title_info: String,
    pub first_line: String,
    pub user_profile: Profile,
}

/// Result of resuming from a named save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub title_info: String,
    pub first_line: String,
    pub user_profile: Profile,
}

/// Result of applying one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    /// Everything the interpreter printed in response to the action.
    pub cmd_output: String,
    /// Opening text read before the checkpoint was restored.
    pub look_output: Opening,
    pub user_profile: Profile,
}

/// Result of looking up (or creating) a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub new_user: bool,
    pub profile: Profile,
}
