#![forbid(unsafe_code)]

//! Session synchronization engine for the Palaver chat client.
//!
//! The engine owns the single live connection, the roster of users and
//! channels, the active conversation and its message log, the typing
//! state machine, and the send pipeline. All mutation happens inside one
//! task that consumes UI commands and inbound socket events one at a
//! time; callers observe it through [`EngineEvent`] notifications.

use std::time::Duration;

use palaver_util::endpoint::HttpEndpoint;

pub mod api;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod reconciler;
pub mod reconnect;
pub mod roster;
pub mod send;
pub mod session;
pub mod typing;

pub use api::{BoxedSocket, BoxedSocketEvents, ServerApi, SocketApi, SocketConnector, SocketEvents};
pub use controller::{EngineCommand, EngineController, ShutdownHandle};
pub use events::EngineEvent;
pub use send::{FilePayload, MAX_UPLOAD_BYTES};
pub use session::start_engine;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Backend host (DNS name or IP literal).
	pub server_host: String,

	/// Backend port (REST and the event channel share it).
	pub server_port: u16,

	/// Use https/wss.
	pub tls: bool,

	/// Client identifier reported to the backend.
	pub client_name: String,

	/// Client instance id (fresh per engine start).
	pub client_instance_id: String,

	/// Timeout for one connection attempt, handshake included.
	pub connect_timeout: Duration,

	/// Upload size cap in bytes.
	pub max_upload_bytes: usize,
}

impl EngineConfig {
	/// Parse an `http(s)://host:port` endpoint into `(host, port, tls)`.
	pub fn parse_endpoint(endpoint: &str) -> Result<HttpEndpoint, EngineError> {
		HttpEndpoint::parse(endpoint)
			.map_err(|msg| EngineError::Other(format!("invalid endpoint (expected http(s)://host:port): {msg}")))
	}

	/// Convenience: create a config from `http(s)://host:port`.
	pub fn from_endpoint(endpoint: &str) -> Result<Self, EngineError> {
		let e = Self::parse_endpoint(endpoint)?;
		Ok(Self {
			server_host: e.host,
			server_port: e.port,
			tls: e.tls,
			..Self::default()
		})
	}

	/// The configured endpoint.
	pub fn endpoint(&self) -> HttpEndpoint {
		HttpEndpoint {
			host: self.server_host.clone(),
			port: self.server_port,
			tls: self.tls,
		}
	}
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			server_host: "localhost".to_string(),
			server_port: 3000,
			tls: false,
			client_name: format!("palaver-engine/{}", env!("CARGO_PKG_VERSION")),
			client_instance_id: uuid::Uuid::new_v4().to_string(),
			connect_timeout: reconnect::CONNECT_ATTEMPT_TIMEOUT,
			max_upload_bytes: send::MAX_UPLOAD_BYTES,
		}
	}
}

/// Errors for engine operations. Nothing here is fatal to the process:
/// transport errors feed the reconnect ladder, validation and upload
/// errors surface to the caller, fetch errors degrade to an empty or
/// unchanged collection.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	/// Connection establishment failed.
	#[error("failed to connect: {0}")]
	Connect(String),

	/// The live channel failed mid-session.
	#[error("transport error: {0}")]
	Transport(String),

	/// A roster or history fetch failed.
	#[error("fetch failed: {0}")]
	Fetch(String),

	/// The attachment upload failed; the send was aborted.
	#[error("upload failed: {0}")]
	Upload(String),

	/// Attachment exceeds the upload cap.
	#[error("file too large: {len} bytes (max {max})")]
	PayloadTooLarge { len: usize, max: usize },

	/// No live connection.
	#[error("not connected")]
	NotConnected,

	/// No conversation is selected, or the selected one is gated.
	#[error("no active conversation")]
	NoActiveConversation,

	/// The viewer is not a member of the selected channel.
	#[error("channel is not accessible")]
	NotAccessible,

	/// Other error.
	#[error("error: {0}")]
	Other(String),
}

impl From<anyhow::Error> for EngineError {
	fn from(e: anyhow::Error) -> Self {
		EngineError::Other(format!("{e:#}"))
	}
}
