#![forbid(unsafe_code)]

use palaver_domain::{ChannelId, Message, MessageAddress, MessageId, Reaction, TypingSignal, User, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
	#[error("unknown event: {0}")]
	UnknownEvent(String),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Wire classification of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
	Text,
	Image,
	File,
}

impl MessageKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			MessageKind::Text => "text",
			MessageKind::Image => "image",
			MessageKind::File => "file",
		}
	}
}

/// `POST /upload` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
	pub url: String,
	pub format: String,
}

/// Server → client events on the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
	NewMessage(Message),
	NewUser(User),
	UserStatusChange { user_id: UserId, is_online: bool },
	UserTyping(TypingSignal),
	MessageReactionUpdate { message_id: MessageId, reactions: Vec<Reaction> },
	MessageRead { message_id: MessageId, read_by: UserId, read_at: chrono::DateTime<chrono::Utc> },
}

impl ServerEvent {
	/// Wire event name.
	pub const fn name(&self) -> &'static str {
		match self {
			ServerEvent::NewMessage(_) => "newMessage",
			ServerEvent::NewUser(_) => "newUser",
			ServerEvent::UserStatusChange { .. } => "userStatusChange",
			ServerEvent::UserTyping(_) => "userTyping",
			ServerEvent::MessageReactionUpdate { .. } => "messageReactionUpdate",
			ServerEvent::MessageRead { .. } => "messageRead",
		}
	}
}

/// Client → server events on the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
	SendMessage {
		content: String,
		address: MessageAddress,
		kind: MessageKind,
		file_url: Option<String>,
	},
	Typing {
		address: MessageAddress,
		is_typing: bool,
	},
	JoinChannel {
		channel_id: ChannelId,
	},
	MessageReaction {
		message_id: MessageId,
		emoji: String,
	},
}

impl ClientEvent {
	/// Wire event name.
	pub const fn name(&self) -> &'static str {
		match self {
			ClientEvent::SendMessage { .. } => "sendMessage",
			ClientEvent::Typing { .. } => "typing",
			ClientEvent::JoinChannel { .. } => "joinChannel",
			ClientEvent::MessageReaction { .. } => "messageReaction",
		}
	}
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusChangePayload {
	user_id: UserId,
	is_online: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingWire {
	#[serde(flatten)]
	address: MessageAddress,
	user_id: UserId,
	username: String,
	is_typing: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionUpdatePayload {
	message_id: MessageId,
	reactions: Vec<Reaction>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageReadPayload {
	message_id: MessageId,
	read_by: UserId,
	read_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessagePayload<'a> {
	content: &'a str,
	#[serde(flatten)]
	address: &'a MessageAddress,
	#[serde(rename = "type")]
	kind: MessageKind,
	file_url: &'a Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundTypingPayload<'a> {
	#[serde(flatten)]
	address: &'a MessageAddress,
	is_typing: bool,
}

/// Decode a named server event payload.
pub fn decode_server_event(name: &str, data: Value) -> Result<ServerEvent, EventError> {
	match name {
		"newMessage" => Ok(ServerEvent::NewMessage(serde_json::from_value(data)?)),
		"newUser" => Ok(ServerEvent::NewUser(serde_json::from_value(data)?)),
		"userStatusChange" => {
			let p: StatusChangePayload = serde_json::from_value(data)?;
			Ok(ServerEvent::UserStatusChange {
				user_id: p.user_id,
				is_online: p.is_online,
			})
		}
		"userTyping" => {
			let p: TypingWire = serde_json::from_value(data)?;
			Ok(ServerEvent::UserTyping(TypingSignal {
				address: p.address,
				user_id: p.user_id,
				username: p.username,
				active: p.is_typing,
			}))
		}
		"messageReactionUpdate" => {
			let p: ReactionUpdatePayload = serde_json::from_value(data)?;
			Ok(ServerEvent::MessageReactionUpdate {
				message_id: p.message_id,
				reactions: p.reactions,
			})
		}
		"messageRead" => {
			let p: MessageReadPayload = serde_json::from_value(data)?;
			Ok(ServerEvent::MessageRead {
				message_id: p.message_id,
				read_by: p.read_by,
				read_at: p.read_at,
			})
		}
		other => Err(EventError::UnknownEvent(other.to_string())),
	}
}

/// Encode a client event into `(name, payload)`.
pub fn encode_client_event(ev: &ClientEvent) -> Result<(&'static str, Value), EventError> {
	let payload = match ev {
		ClientEvent::SendMessage {
			content,
			address,
			kind,
			file_url,
		} => serde_json::to_value(SendMessagePayload {
			content,
			address,
			kind: *kind,
			file_url,
		})?,
		ClientEvent::Typing { address, is_typing } => serde_json::to_value(OutboundTypingPayload {
			address,
			is_typing: *is_typing,
		})?,
		ClientEvent::JoinChannel { channel_id } => serde_json::json!({ "channelId": channel_id }),
		ClientEvent::MessageReaction { message_id, emoji } => {
			serde_json::json!({ "messageId": message_id, "emoji": emoji })
		}
	};
	Ok((ev.name(), payload))
}

#[derive(Serialize, Deserialize)]
struct Frame {
	event: String,
	data: Value,
}

/// Encode a client event as one `{"event": ..., "data": ...}` text frame.
pub fn encode_frame(ev: &ClientEvent) -> Result<String, EventError> {
	let (event, data) = encode_client_event(ev)?;
	Ok(serde_json::to_string(&Frame {
		event: event.to_string(),
		data,
	})?)
}

/// Decode one text frame into a server event.
pub fn decode_frame(text: &str) -> Result<ServerEvent, EventError> {
	let frame: Frame = serde_json::from_str(text)?;
	decode_server_event(&frame.event, frame.data)
}
