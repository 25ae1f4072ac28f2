//! Everything that is streamed separately from the scene instructions: geometries and textures
//! are fetched over HTTP by their content hash, materials arrive inline.
//!
//! Instructions and asset downloads live on independent timelines, a visual may well reference a
//! mesh that has not been requested yet, or one that finished loading long ago. The
//! [`slot::AssetSlot`] is what reconciles the two: whoever needs an asset registers a callback
//! on the slot of that name, and whoever loads it resolves the slot exactly once.
//!
//! Downloads (and decoding) run on the [`fetcher::FetchPool`] workers, the decoded result is then
//! sent back to the dispatcher thread, so that slots are only ever resolved there and callbacks
//! never race with instruction handlers.

use std::fmt::{Display, Formatter};

use simview_assets::DecodeError;
use thiserror::Error;

pub mod cache;
pub mod fetcher;
pub mod slot;
pub mod table;
pub mod types;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Geometry,
    Material,
    Texture,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Geometry => write!(f, "geometry"),
            AssetKind::Material => write!(f, "material"),
            AssetKind::Texture => write!(f, "texture"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Fetching {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Malformed asset: {0}")]
    Malformed(#[from] DecodeError),

    #[error("The {kind} {name} has already been resolved")]
    DuplicateResolution { kind: AssetKind, name: String },
}
