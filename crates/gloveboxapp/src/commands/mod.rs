//! # Command Layer
//!
//! One submodule per use case. Each exposes plain functions that take the
//! components they need, do the work through the repository and friends, and
//! return a [`CmdResult`]. Nothing here prints, prompts or exits; the client
//! (CLI today) decides how to render the result.
//!
//! - [`storage`]: choose, show and forget the storage folder
//! - [`vehicles`]: list, show, add, edit, remove, set primary
//! - [`documents`]: attach, edit and remove documents
//! - [`maintenance`]: rebuild from sidecars, legacy migration, doctor
//! - [`status`]: a summary of the current state
//! - [`helpers`]: resolving user-typed vehicle and document references

use crate::model::{Document, Vehicle};
use serde::Serialize;
use std::path::PathBuf;

pub mod documents;
pub mod helpers;
pub mod maintenance;
pub mod status;
pub mod storage;
pub mod vehicles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    /// Vehicles created or changed by the command.
    pub affected_vehicles: Vec<Vehicle>,
    /// Vehicles to display, in display order.
    pub listed_vehicles: Vec<Vehicle>,
    /// Documents created or changed by the command.
    pub affected_documents: Vec<Document>,
    pub paths: Vec<PathBuf>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_vehicles(mut self, vehicles: Vec<Vehicle>) -> Self {
        self.affected_vehicles = vehicles;
        self
    }

    pub fn with_listed_vehicles(mut self, vehicles: Vec<Vehicle>) -> Self {
        self.listed_vehicles = vehicles;
        self
    }

    pub fn with_affected_documents(mut self, documents: Vec<Document>) -> Self {
        self.affected_documents = documents;
        self
    }

    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Whether any message is at warning level or above.
    pub fn has_problems(&self) -> bool {
        self.messages
            .iter()
            .any(|m| matches!(m.level, MessageLevel::Warning | MessageLevel::Error))
    }
}
