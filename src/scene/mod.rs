//! The live scene: named bodies with their visuals, built up instruction by instruction.

use thiserror::Error;

pub mod body;
pub mod graph;
pub mod host;
pub mod visual;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("There is no body named {0}")]
    UnknownBody(String),

    #[error("The parent {parent} of {body} does not exist (yet)")]
    UnknownParent { body: String, parent: String },

    #[error("Unsupported shape {0}")]
    UnsupportedShape(String),
}
