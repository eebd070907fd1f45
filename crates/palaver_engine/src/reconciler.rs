use std::collections::HashSet;

use palaver_domain::{Message, MessageId, Reaction, ReadReceipt};
use tracing::debug;

/// Result of offering an inbound message to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
	/// Appended to the visible log.
	Appended,
	/// A history load is in flight; parked for replay after install.
	Buffered,
	/// The id is already present (at-least-once redelivery).
	Duplicate,
}

/// Append-only, per-conversation ordered message log. History installs
/// replace the log wholesale; live events append; reactions and read
/// receipts mutate entries in place. Ordering is merge-arrival order,
/// not strictly `created_at`.
///
/// Two hardenings over the bare contract: inbound messages are deduped
/// by id, and messages arriving while a history fetch is outstanding
/// are buffered and replayed once the fetch installs.
#[derive(Debug, Default)]
pub struct MessageReconciler {
	log: Vec<Message>,
	ids: HashSet<MessageId>,
	loading: bool,
	pending: Vec<Message>,
}

impl MessageReconciler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drop everything. Used on conversation switch and when the active
	/// channel is not accessible (the log is forced empty then).
	pub fn clear(&mut self) {
		self.log.clear();
		self.ids.clear();
		self.pending.clear();
		self.loading = false;
	}

	/// Mark a history fetch as outstanding. The log is cleared now so a
	/// gated or switched-away view never shows stale entries.
	pub fn begin_load(&mut self) {
		self.clear();
		self.loading = true;
	}

	/// The fetch failed or was superseded; the log stays empty.
	pub fn abort_load(&mut self) {
		self.pending.clear();
		self.loading = false;
	}

	/// Install a fetched history page. The backend returns newest first;
	/// the log is oldest first, so the page is reversed. This replaces
	/// any prior log, then replays messages buffered during the fetch
	/// (duplicates against the page are dropped by id).
	pub fn install_history(&mut self, newest_first: Vec<Message>) {
		self.log.clear();
		self.ids.clear();
		self.loading = false;

		for msg in newest_first.into_iter().rev() {
			if self.ids.insert(msg.id.clone()) {
				self.log.push(msg);
			}
		}

		let pending = std::mem::take(&mut self.pending);
		for msg in pending {
			if self.ids.insert(msg.id.clone()) {
				self.log.push(msg);
			} else {
				debug!(message_id = %msg.id, "buffered message already in history page");
			}
		}
	}

	/// Offer an inbound message that already passed the routing
	/// predicate for the active conversation.
	pub fn apply_inbound(&mut self, msg: Message) -> Applied {
		if self.ids.contains(&msg.id) || self.pending.iter().any(|m| m.id == msg.id) {
			debug!(message_id = %msg.id, "duplicate delivery dropped");
			return Applied::Duplicate;
		}

		if self.loading {
			self.pending.push(msg);
			return Applied::Buffered;
		}

		self.ids.insert(msg.id.clone());
		self.log.push(msg);
		Applied::Appended
	}

	/// Replace the reactions of the matching entry with the server's
	/// canonical set. No-op when the id is absent from the active log.
	pub fn apply_reaction_update(&mut self, message_id: &MessageId, reactions: Vec<Reaction>) -> Option<&Message> {
		let msg = self.log.iter_mut().find(|m| &m.id == message_id)?;
		msg.reactions = reactions;
		Some(msg)
	}

	/// Append a read receipt to the matching entry. Duplicate receipts
	/// for the same user are kept; deduplication is the caller's concern.
	pub fn apply_read_receipt(&mut self, message_id: &MessageId, receipt: ReadReceipt) -> Option<&Message> {
		let msg = self.log.iter_mut().find(|m| &m.id == message_id)?;
		msg.read_by.push(receipt);
		Some(msg)
	}

	pub fn messages(&self) -> &[Message] {
		&self.log
	}

	pub fn is_loading(&self) -> bool {
		self.loading
	}
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use palaver_domain::{ChannelId, MessageAddress, UserId};

	use super::*;

	fn msg(id: &str, content: &str) -> Message {
		Message {
			id: MessageId::new(id).unwrap(),
			address: MessageAddress::channel(ChannelId::new("c1").unwrap()),
			sender_id: UserId::new("u1").unwrap(),
			content: content.to_string(),
			attachment: None,
			created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
			reactions: Vec::new(),
			read_by: Vec::new(),
		}
	}

	fn ids(r: &MessageReconciler) -> Vec<&str> {
		r.messages().iter().map(|m| m.id.as_str()).collect()
	}

	#[test]
	fn history_installs_reversed_and_replaces() {
		let mut r = MessageReconciler::new();
		r.apply_inbound(msg("stale", "old view"));

		r.begin_load();
		assert!(r.messages().is_empty());

		// Backend returns newest first.
		r.install_history(vec![msg("m3", "c"), msg("m2", "b"), msg("m1", "a")]);
		assert_eq!(ids(&r), vec!["m1", "m2", "m3"]);
	}

	#[test]
	fn messages_during_load_are_buffered_and_replayed() {
		let mut r = MessageReconciler::new();
		r.begin_load();

		assert_eq!(r.apply_inbound(msg("m4", "live")), Applied::Buffered);
		assert!(r.messages().is_empty());

		r.install_history(vec![msg("m2", "b"), msg("m1", "a")]);
		assert_eq!(ids(&r), vec!["m1", "m2", "m4"]);
	}

	#[test]
	fn buffered_echo_of_history_entry_is_dropped() {
		let mut r = MessageReconciler::new();
		r.begin_load();
		r.apply_inbound(msg("m2", "raced ahead"));
		r.install_history(vec![msg("m2", "raced ahead"), msg("m1", "a")]);
		assert_eq!(ids(&r), vec!["m1", "m2"]);
	}

	#[test]
	fn duplicate_delivery_is_dropped() {
		let mut r = MessageReconciler::new();
		assert_eq!(r.apply_inbound(msg("m1", "a")), Applied::Appended);
		assert_eq!(r.apply_inbound(msg("m1", "a")), Applied::Duplicate);
		assert_eq!(r.messages().len(), 1);
	}

	#[test]
	fn reaction_update_replaces_wholesale_and_ignores_unknown_ids() {
		let mut r = MessageReconciler::new();
		r.apply_inbound(msg("m1", "a"));

		let thumbs = Reaction {
			emoji: "👍".to_string(),
			by_user_id: UserId::new("u2").unwrap(),
		};
		let updated = r
			.apply_reaction_update(&MessageId::new("m1").unwrap(), vec![thumbs.clone()])
			.unwrap();
		assert_eq!(updated.reactions, vec![thumbs.clone()]);

		// Server's canonical set wins, including removals.
		r.apply_reaction_update(&MessageId::new("m1").unwrap(), Vec::new());
		assert!(r.messages()[0].reactions.is_empty());

		let before = r.messages().to_vec();
		assert!(r.apply_reaction_update(&MessageId::new("ghost").unwrap(), vec![thumbs]).is_none());
		assert_eq!(r.messages(), before.as_slice());
	}

	#[test]
	fn read_receipts_append_without_dedup() {
		let mut r = MessageReconciler::new();
		r.apply_inbound(msg("m1", "a"));

		let receipt = ReadReceipt {
			user_id: UserId::new("u2").unwrap(),
			read_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap(),
		};
		r.apply_read_receipt(&MessageId::new("m1").unwrap(), receipt.clone());
		r.apply_read_receipt(&MessageId::new("m1").unwrap(), receipt);
		assert_eq!(r.messages()[0].read_by.len(), 2);

		assert!(
			r.apply_read_receipt(
				&MessageId::new("ghost").unwrap(),
				ReadReceipt {
					user_id: UserId::new("u2").unwrap(),
					read_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 6).unwrap(),
				}
			)
			.is_none()
		);
	}
}
