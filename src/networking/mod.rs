//! The scene socket: a reconnecting, text framed duplex channel to the scene server.
//!
//! A [`connection::Connection`] owns the network thread. That thread only moves frames, every
//! received frame is forwarded to the dispatcher as a [`crate::viewer::events::ViewerEvent`],
//! which then calls [`connection::Connection::dispatch`] and thereby the registered handler.

use thiserror::Error;

pub mod backoff;
pub mod connection;
pub mod frame;
pub mod transport;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("The tag {0:?} contains the frame delimiter")]
    InvalidTag(String),

    #[error("The body of {tag} is not valid JSON: {source}")]
    InvalidJson {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("The connection is not open")]
    NotConnected,

    #[error("Could not spawn the network thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Encode(#[from] FrameError),

    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No handler registered for {0}")]
    UnknownTag(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Handler for {tag} failed: {source:#}")]
    Handler {
        tag: String,
        #[source]
        source: anyhow::Error,
    },
}
