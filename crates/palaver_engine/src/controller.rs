use palaver_domain::{ChannelId, ConversationKey, Message, MessageId, Session};
use palaver_protocol::ServerEvent;
use tokio::sync::{mpsc, oneshot};

use crate::EngineError;
use crate::send::FilePayload;

/// Commands consumed by the engine task. The `SocketClosed` and
/// `HistoryLoaded` variants are internal: they are fed back by the
/// events task and by spawned history fetches.
#[derive(Debug)]
pub enum EngineCommand {
	Connect {
		session: Session,
	},
	Disconnect {
		reason: String,
	},
	SelectConversation {
		key: Option<ConversationKey>,
	},
	JoinChannel {
		channel_id: ChannelId,
	},
	CreateChannel {
		name: String,
		description: Option<String>,
	},
	RefreshRoster,
	Send {
		text: String,
		file: Option<FilePayload>,
	},
	InputActivity,
	React {
		message_id: MessageId,
		emoji: String,
	},
	Inbound {
		socket_generation: u64,
		event: ServerEvent,
	},
	SocketClosed {
		socket_generation: u64,
		reason: String,
	},
	HistoryLoaded {
		key: ConversationKey,
		result: Result<Vec<Message>, EngineError>,
	},
}

/// Cheap cloneable handle for driving the engine task.
#[derive(Clone)]
pub struct EngineController {
	pub(crate) cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineController {
	pub fn new(cmd_tx: mpsc::Sender<EngineCommand>) -> Self {
		Self { cmd_tx }
	}

	async fn send_command(&self, cmd: EngineCommand) -> Result<(), String> {
		self.cmd_tx.send(cmd).await.map_err(|_| "engine task is not running".to_string())
	}

	pub async fn connect(&self, session: Session) -> Result<(), String> {
		self.send_command(EngineCommand::Connect { session }).await
	}

	pub async fn disconnect(&self, reason: impl Into<String>) -> Result<(), String> {
		self.send_command(EngineCommand::Disconnect { reason: reason.into() }).await
	}

	pub async fn select_conversation(&self, key: Option<ConversationKey>) -> Result<(), String> {
		self.send_command(EngineCommand::SelectConversation { key }).await
	}

	pub async fn join_channel(&self, channel_id: ChannelId) -> Result<(), String> {
		self.send_command(EngineCommand::JoinChannel { channel_id }).await
	}

	pub async fn create_channel(&self, name: impl Into<String>, description: Option<String>) -> Result<(), String> {
		self.send_command(EngineCommand::CreateChannel {
			name: name.into(),
			description,
		})
		.await
	}

	pub async fn refresh_roster(&self) -> Result<(), String> {
		self.send_command(EngineCommand::RefreshRoster).await
	}

	pub async fn send(&self, text: impl Into<String>, file: Option<FilePayload>) -> Result<(), String> {
		self.send_command(EngineCommand::Send { text: text.into(), file }).await
	}

	/// Report a local keystroke in the composer.
	pub async fn input_activity(&self) -> Result<(), String> {
		self.send_command(EngineCommand::InputActivity).await
	}

	pub async fn react(&self, message_id: MessageId, emoji: impl Into<String>) -> Result<(), String> {
		self.send_command(EngineCommand::React {
			message_id,
			emoji: emoji.into(),
		})
		.await
	}
}

/// Stops the engine task and waits for it to wind down.
pub struct ShutdownHandle {
	pub(crate) shutdown_tx: oneshot::Sender<()>,
	pub(crate) join_handle: tokio::task::JoinHandle<()>,
}

impl ShutdownHandle {
	pub fn new(shutdown_tx: oneshot::Sender<()>, join_handle: tokio::task::JoinHandle<()>) -> Self {
		Self {
			shutdown_tx,
			join_handle,
		}
	}

	pub async fn shutdown(self) {
		let _ = self.shutdown_tx.send(());
		let _ = self.join_handle.await;
	}
}
