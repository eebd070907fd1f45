use core::fmt;

use palaver_domain::{Channel, ConnectionState, Conversation, ConversationKey, Message, User};

use crate::typing::Typist;

/// Notifications emitted by the engine task for the UI layer.
#[derive(Clone)]
pub enum EngineEvent {
	/// Connection status changed (emitted only on actual transitions).
	StateChanged(ConnectionState),
	/// A reconnect attempt is scheduled.
	Reconnecting { attempt: u32, next_retry_in_ms: u64 },
	/// Users/channels snapshot after a refresh or roster event.
	RosterUpdated { users: Vec<User>, channels: Vec<Channel> },
	/// The active conversation changed (or was cleared).
	ConversationSelected { conversation: Option<Conversation> },
	/// History installed for the active conversation; full snapshot.
	HistoryLoaded { key: ConversationKey, messages: Vec<Message> },
	/// A live message was appended to the active log.
	MessageAppended(Message),
	/// Reactions or read receipts mutated an existing entry.
	MessageUpdated(Message),
	/// The typist set for the active conversation changed.
	TypingChanged { typists: Vec<Typist> },
	/// The send pipeline emitted a message; it will appear via the
	/// inbound path once the backend echoes it.
	MessageSent { key: ConversationKey },
	/// A channel the viewer created was acknowledged by the backend.
	ChannelCreated(Channel),
	/// A non-fatal failure (validation, upload, fetch, transport).
	Error { message: String },
}

impl fmt::Debug for EngineEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EngineEvent::StateChanged(state) => write!(f, "EngineEvent::StateChanged({state})"),
			EngineEvent::Reconnecting {
				attempt,
				next_retry_in_ms,
			} => {
				write!(
					f,
					"EngineEvent::Reconnecting {{ attempt: {attempt}, next_retry_in_ms: {next_retry_in_ms} }}"
				)
			}
			EngineEvent::RosterUpdated { users, channels } => {
				write!(
					f,
					"EngineEvent::RosterUpdated {{ users: {}, channels: {} }}",
					users.len(),
					channels.len()
				)
			}
			EngineEvent::ConversationSelected { conversation } => {
				match conversation {
					Some(c) => write!(
						f,
						"EngineEvent::ConversationSelected {{ key: {}, accessible: {} }}",
						c.key, c.accessible
					),
					None => write!(f, "EngineEvent::ConversationSelected {{ none }}"),
				}
			}
			EngineEvent::HistoryLoaded { key, messages } => {
				write!(f, "EngineEvent::HistoryLoaded {{ key: {key}, messages: {} }}", messages.len())
			}
			EngineEvent::MessageAppended(msg) => write!(f, "EngineEvent::MessageAppended {{ id: {} }}", msg.id),
			EngineEvent::MessageUpdated(msg) => write!(f, "EngineEvent::MessageUpdated {{ id: {} }}", msg.id),
			EngineEvent::TypingChanged { typists } => {
				write!(f, "EngineEvent::TypingChanged {{ typists: {} }}", typists.len())
			}
			EngineEvent::MessageSent { key } => write!(f, "EngineEvent::MessageSent {{ key: {key} }}"),
			EngineEvent::ChannelCreated(channel) => {
				write!(f, "EngineEvent::ChannelCreated {{ id: {}, name: {} }}", channel.id, channel.name)
			}
			EngineEvent::Error { message } => write!(f, "EngineEvent::Error {{ message: {message} }}"),
		}
	}
}
