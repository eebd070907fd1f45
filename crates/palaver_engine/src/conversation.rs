use palaver_domain::{Conversation, ConversationKey, MessageAddress, UserId};

use crate::roster::RosterStore;

/// The one routing predicate for inbound events, shared by the message
/// reconciler and the typing coordinator so the two can never diverge.
///
/// An event routes to the active conversation iff:
/// - active is a channel and the event's channel reference matches, or
/// - active is a direct peer and that peer is the sender or the
///   recipient, or the viewer authored the event (server echoes of our
///   own direct messages carry our id as the sender).
pub fn routes_to_active(address: &MessageAddress, sender: &UserId, active: &ConversationKey, viewer: &UserId) -> bool {
	match active {
		ConversationKey::Channel(id) => address.channel_id.as_ref() == Some(id),
		ConversationKey::Direct(peer) => sender == peer || address.recipient_id.as_ref() == Some(peer) || sender == viewer,
	}
}

/// Tracks the single active conversation and its membership-gated
/// accessibility. At most one conversation is active at a time.
#[derive(Debug, Default)]
pub struct ConversationSelector {
	active: Option<Conversation>,
}

impl ConversationSelector {
	pub fn new() -> Self {
		Self::default()
	}

	/// Select `key` as the active conversation. Direct conversations are
	/// always accessible; channels only when the viewer is a recorded
	/// member (an unknown channel id counts as not a member).
	pub fn select(&mut self, key: ConversationKey, roster: &RosterStore, viewer: &UserId) -> &Conversation {
		let conversation = match &key {
			ConversationKey::Direct(peer) => Conversation::direct(peer.clone()),
			ConversationKey::Channel(id) => Conversation {
				accessible: roster.channel(id).is_some_and(|c| c.is_member(viewer)),
				key: key.clone(),
			},
		};
		&*self.active.insert(conversation)
	}

	/// Deselect any active conversation.
	pub fn clear(&mut self) {
		self.active = None;
	}

	pub fn active(&self) -> Option<&Conversation> {
		self.active.as_ref()
	}

	/// Re-derive accessibility from the roster after a channel refresh.
	/// Returns the new accessibility when it changed.
	pub fn recompute_accessibility(&mut self, roster: &RosterStore, viewer: &UserId) -> Option<bool> {
		let active = self.active.as_mut()?;
		let ConversationKey::Channel(id) = &active.key else {
			return None;
		};

		let accessible = roster.channel(id).is_some_and(|c| c.is_member(viewer));
		if accessible == active.accessible {
			return None;
		}
		active.accessible = accessible;
		Some(accessible)
	}
}
