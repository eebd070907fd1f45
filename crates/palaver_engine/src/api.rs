use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use palaver_domain::{Channel, ChannelId, Message, Session, User, UserId};
use palaver_protocol::{ClientEvent, ServerEvent, UploadResponse};

use crate::send::FilePayload;
use crate::{EngineConfig, EngineError};

pub type BoxedSocket = Box<dyn SocketApi>;
pub type BoxedSocketEvents = Box<dyn SocketEvents>;

/// REST collaborator consumed by the engine. Implemented by the real
/// HTTP client and by in-memory fakes in tests.
#[async_trait]
pub trait ServerApi: Send + Sync {
	async fn fetch_users(&self) -> Result<Vec<User>, EngineError>;

	async fn fetch_channels(&self) -> Result<Vec<Channel>, EngineError>;

	async fn create_channel(&self, name: &str, description: Option<&str>) -> Result<Channel, EngineError>;

	async fn join_channel(&self, channel: &ChannelId) -> Result<(), EngineError>;

	/// Persisted channel history, newest first (the reconciler reverses it).
	async fn fetch_channel_messages(&self, channel: &ChannelId) -> Result<Vec<Message>, EngineError>;

	/// Persisted direct history with `peer`, newest first.
	async fn fetch_direct_messages(&self, peer: &UserId) -> Result<Vec<Message>, EngineError>;

	async fn upload(&self, file: &FilePayload) -> Result<UploadResponse, EngineError>;
}

/// Write half of the live event channel.
pub trait SocketApi: Send {
	fn emit<'a>(&'a mut self, event: ClientEvent) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>>;

	/// Close the channel. Idempotent.
	fn close(&self);
}

/// Read half of the live event channel.
pub trait SocketEvents: Send {
	fn run_events_loop<'a>(
		&'a mut self,
		on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>>;
}

/// Factory opening one live channel for a session. The engine applies
/// the per-attempt timeout and the retry ladder around it.
pub type SocketConnector = Box<
	dyn FnMut(
			EngineConfig,
			Session,
		) -> Pin<Box<dyn Future<Output = Result<(BoxedSocket, BoxedSocketEvents), EngineError>> + Send>>
		+ Send,
>;
