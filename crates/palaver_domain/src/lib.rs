#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

macro_rules! opaque_id {
	($(#[$doc:meta])* $name:ident) => {
		$(#[$doc])*
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Create a non-empty id.
			pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
				let id = id.into();
				if id.trim().is_empty() {
					return Err(ParseIdError::Empty);
				}
				Ok(Self(id))
			}
			pub fn as_str(&self) -> &str {
				&self.0
			}
			pub fn into_string(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseIdError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				$name::new(s.to_string())
			}
		}
	};
}

opaque_id!(
	/// Backend-assigned user identifier.
	UserId
);
opaque_id!(
	/// Backend-assigned channel identifier.
	ChannelId
);
opaque_id!(
	/// Backend-assigned message identifier. Never minted by the client.
	MessageId
);

/// Authenticated session. Owned by the sign-in collaborator; the engine
/// only reads it to open the socket and to recognize "self".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	pub user_id: UserId,
	pub username: String,
	pub auth_token: String,
}

/// Live-connection status. Exactly one instance process-wide, owned by
/// the connection manager. `Connecting` is both the initial state and
/// the reconnect-in-progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	Connecting,
	Connected,
	Disconnected,
}

impl ConnectionState {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::Disconnected => "disconnected",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Directory entry for a known user. `is_online` is mutated only by
/// presence events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	#[serde(rename = "_id")]
	pub id: UserId,
	pub username: String,
	#[serde(default)]
	pub is_online: bool,
}

/// Directory entry for a channel. Membership is authoritative from the
/// backend; nothing here is inferred client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
	#[serde(rename = "_id")]
	pub id: ChannelId,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub members: BTreeSet<UserId>,
}

impl Channel {
	/// True if `viewer` is a recorded member.
	pub fn is_member(&self, viewer: &UserId) -> bool {
		self.members.contains(viewer)
	}
}

/// Key of a conversation: a channel or a direct peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKey {
	Channel(ChannelId),
	Direct(UserId),
}

impl ConversationKey {
	/// Parse a `channel:<id>` or `direct:<id>` string.
	pub fn parse(s: &str) -> Result<Self, ParseIdError> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		let (kind, id) = s
			.split_once(':')
			.ok_or_else(|| ParseIdError::InvalidFormat("expected channel:<id> or direct:<id>".into()))?;

		match kind {
			"channel" => Ok(ConversationKey::Channel(ChannelId::new(id)?)),
			"direct" => Ok(ConversationKey::Direct(UserId::new(id)?)),
			other => Err(ParseIdError::InvalidFormat(format!("unknown conversation kind: {other}"))),
		}
	}

	/// The channel id, when this is a channel conversation.
	pub fn channel_id(&self) -> Option<&ChannelId> {
		match self {
			ConversationKey::Channel(id) => Some(id),
			ConversationKey::Direct(_) => None,
		}
	}

	/// The peer id, when this is a direct conversation.
	pub fn peer_id(&self) -> Option<&UserId> {
		match self {
			ConversationKey::Channel(_) => None,
			ConversationKey::Direct(id) => Some(id),
		}
	}
}

impl fmt::Display for ConversationKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConversationKey::Channel(id) => write!(f, "channel:{id}"),
			ConversationKey::Direct(id) => write!(f, "direct:{id}"),
		}
	}
}

impl FromStr for ConversationKey {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ConversationKey::parse(s)
	}
}

/// The selected conversation plus its membership-gated accessibility.
/// Direct conversations are always accessible; channels only when the
/// viewer is a recorded member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
	pub key: ConversationKey,
	pub accessible: bool,
}

impl Conversation {
	/// A direct conversation (always accessible).
	pub fn direct(peer: UserId) -> Self {
		Self {
			key: ConversationKey::Direct(peer),
			accessible: true,
		}
	}

	/// A channel conversation, gated by membership.
	pub fn channel(channel: &Channel, viewer: &UserId) -> Self {
		Self {
			accessible: channel.is_member(viewer),
			key: ConversationKey::Channel(channel.id.clone()),
		}
	}
}

/// Addressing of a message or typing signal on the wire: exactly one of
/// `channel_id` / `recipient_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAddress {
	#[serde(default)]
	pub channel_id: Option<ChannelId>,
	#[serde(default)]
	pub recipient_id: Option<UserId>,
}

impl MessageAddress {
	/// Address a channel.
	pub fn channel(id: ChannelId) -> Self {
		Self {
			channel_id: Some(id),
			recipient_id: None,
		}
	}

	/// Address a direct recipient.
	pub fn direct(recipient: UserId) -> Self {
		Self {
			channel_id: None,
			recipient_id: Some(recipient),
		}
	}

	/// Address derived from a conversation key.
	pub fn for_conversation(key: &ConversationKey) -> Self {
		match key {
			ConversationKey::Channel(id) => Self::channel(id.clone()),
			ConversationKey::Direct(peer) => Self::direct(peer.clone()),
		}
	}
}

/// Kind of an uploaded attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
	Image,
	File,
}

impl AttachmentKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			AttachmentKind::Image => "image",
			AttachmentKind::File => "file",
		}
	}
}

impl fmt::Display for AttachmentKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Uploaded artifact reference carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
	pub url: String,
	pub kind: AttachmentKind,
}

/// One reaction entry. Order of arrival is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
	pub emoji: String,
	pub by_user_id: UserId,
}

/// One read receipt entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
	pub user_id: UserId,
	pub read_at: DateTime<Utc>,
}

/// A chat message. Identity is `id`, assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	#[serde(rename = "_id")]
	pub id: MessageId,
	#[serde(flatten)]
	pub address: MessageAddress,
	pub sender_id: UserId,
	pub content: String,
	#[serde(default)]
	pub attachment: Option<Attachment>,
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub reactions: Vec<Reaction>,
	#[serde(default)]
	pub read_by: Vec<ReadReceipt>,
}

/// Transient "is typing" notification. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
	#[serde(flatten)]
	pub address: MessageAddress,
	pub user_id: UserId,
	pub username: String,
	pub active: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connection_state_display() {
		assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
		assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
	}

	#[test]
	fn conversation_key_parse_roundtrip() {
		let key = ConversationKey::parse("channel:general").unwrap();
		assert_eq!(key.channel_id().unwrap().as_str(), "general");
		assert_eq!(key.to_string(), "channel:general");

		let key = ConversationKey::parse("direct:u1").unwrap();
		assert_eq!(key.peer_id().unwrap().as_str(), "u1");
		assert_eq!(key.to_string(), "direct:u1");
	}

	#[test]
	fn rejects_empty_and_unknown_keys() {
		assert!(ConversationKey::parse("").is_err());
		assert!(ConversationKey::parse("channel:").is_err());
		assert!(ConversationKey::parse("room:general").is_err());
		assert!(UserId::new("   ").is_err());
	}

	#[test]
	fn channel_membership_gates_accessibility() {
		let viewer = UserId::new("viewer").unwrap();
		let outsider = UserId::new("outsider").unwrap();
		let channel = Channel {
			id: ChannelId::new("general").unwrap(),
			name: "general".to_string(),
			description: None,
			members: [viewer.clone()].into_iter().collect(),
		};

		assert!(Conversation::channel(&channel, &viewer).accessible);
		assert!(!Conversation::channel(&channel, &outsider).accessible);
		assert!(Conversation::direct(outsider).accessible);
	}

	#[test]
	fn message_address_is_exclusive() {
		let ch = MessageAddress::channel(ChannelId::new("c1").unwrap());
		assert!(ch.channel_id.is_some() && ch.recipient_id.is_none());

		let dm = MessageAddress::for_conversation(&ConversationKey::Direct(UserId::new("u1").unwrap()));
		assert!(dm.channel_id.is_none() && dm.recipient_id.is_some());
	}

	#[test]
	fn message_wire_shape() {
		let json = serde_json::json!({
			"_id": "m1",
			"channelId": "c1",
			"senderId": "u1",
			"content": "hi",
			"createdAt": "2024-05-01T12:00:00Z",
		});
		let msg: Message = serde_json::from_value(json).unwrap();
		assert_eq!(msg.id.as_str(), "m1");
		assert_eq!(msg.address.channel_id.as_ref().unwrap().as_str(), "c1");
		assert!(msg.attachment.is_none());
		assert!(msg.reactions.is_empty() && msg.read_by.is_empty());
	}
}
