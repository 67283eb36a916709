//! Command data models
//!
//! A command is a named command line stored per workspace, e.g.
//! `MVN_CLEAN_INSTALL` → `mvn clean install`.

use crate::links::Link;
use serde::{Deserialize, Serialize};

/// Who can see a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the creator
    #[default]
    Private,
    /// Everybody in the workspace
    Public,
}

impl Visibility {
    /// Convert the visibility to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

impl From<&str> for Visibility {
    fn from(s: &str) -> Self {
        match s {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

/// A stored workspace command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Unique identifier, e.g. `command12345679`
    pub id: String,
    /// Display name
    pub name: String,
    /// Command line to execute in a machine
    pub command_line: String,
    /// Id of the user who created the command
    pub creator: String,
    /// Workspace the command belongs to
    pub workspace_id: String,
    /// Visibility of the command
    pub visibility: Visibility,
    /// Command type, e.g. `maven`
    #[serde(rename = "type")]
    pub command_type: Option<String>,
    /// Working directory inside the machine
    pub working_dir: Option<String>,
}

impl Command {
    /// Whether `user_id` may read this command
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.visibility == Visibility::Public || self.creator == user_id
    }

    /// Apply the present fields of `update`
    pub fn apply(&mut self, update: &CommandUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(command_line) = &update.command_line {
            self.command_line = command_line.clone();
        }
        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }
        if let Some(command_type) = &update.command_type {
            self.command_type = Some(command_type.clone());
        }
        if let Some(working_dir) = &update.working_dir {
            self.working_dir = Some(working_dir.clone());
        }
    }
}

/// Request body for creating a command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommand {
    /// Display name (required)
    pub name: Option<String>,
    /// Command line (required)
    pub command_line: Option<String>,
    /// Defaults to private
    pub visibility: Option<Visibility>,
    /// Command type
    #[serde(rename = "type")]
    pub command_type: Option<String>,
    /// Working directory
    pub working_dir: Option<String>,
}

/// Request body for updating a command; absent fields stay unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandUpdate {
    /// Id of the command to update (required)
    pub id: Option<String>,
    /// New name
    pub name: Option<String>,
    /// New command line
    pub command_line: Option<String>,
    /// New visibility
    pub visibility: Option<Visibility>,
    /// New type
    #[serde(rename = "type")]
    pub command_type: Option<String>,
    /// New working directory
    pub working_dir: Option<String>,
}

/// Command as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    /// Command fields
    #[serde(flatten)]
    pub command: Command,
    /// Operations available to the caller
    pub links: Vec<Link>,
}
