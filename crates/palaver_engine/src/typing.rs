use std::time::Duration;

use palaver_domain::{TypingSignal, UserId};

/// Quiet period after the last local keystroke before the `false` edge.
pub const TYPING_QUIET_PERIOD: Duration = Duration::from_millis(2000);

/// One remote typist, keyed by user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typist {
	pub user_id: UserId,
	pub username: String,
}

/// Per-conversation typing state: the local Idle/Active machine whose
/// edges drive outbound `typing` events, and the set of remote typists
/// currently shown. The session loop owns the quiet-period deadline;
/// received signals carry no timer — the origin is responsible for the
/// `false` edge.
#[derive(Debug, Default)]
pub struct TypingCoordinator {
	local_active: bool,
	typists: Vec<Typist>,
}

impl TypingCoordinator {
	pub fn new() -> Self {
		Self::default()
	}

	/// A local keystroke. Returns true on the Idle → Active edge, i.e.
	/// exactly when a `typing { isTyping: true }` must be emitted.
	/// Repeat keystrokes while Active only refresh the caller's deadline.
	pub fn note_local_activity(&mut self) -> bool {
		let edge = !self.local_active;
		self.local_active = true;
		edge
	}

	/// Force Idle (quiet period elapsed, message sent, or conversation
	/// switched). Returns true on the Active → Idle edge, i.e. exactly
	/// when a `typing { isTyping: false }` must be emitted.
	pub fn local_idle(&mut self) -> bool {
		let edge = self.local_active;
		self.local_active = false;
		edge
	}

	pub fn is_local_active(&self) -> bool {
		self.local_active
	}

	/// Apply a remote signal that already passed the routing predicate.
	/// Returns true when the typist set changed.
	pub fn apply_remote(&mut self, signal: &TypingSignal) -> bool {
		let known = self.typists.iter().position(|t| t.user_id == signal.user_id);
		match (signal.active, known) {
			(true, None) => {
				self.typists.push(Typist {
					user_id: signal.user_id.clone(),
					username: signal.username.clone(),
				});
				true
			}
			(false, Some(idx)) => {
				self.typists.remove(idx);
				true
			}
			_ => false,
		}
	}

	/// Drop all remote typists (conversation switch, disconnect).
	pub fn clear_remote(&mut self) -> bool {
		let changed = !self.typists.is_empty();
		self.typists.clear();
		changed
	}

	pub fn typists(&self) -> &[Typist] {
		&self.typists
	}

	/// Display line for the first typist, in arrival order.
	pub fn summary(&self) -> Option<String> {
		self.typists.first().map(|t| format!("{} is typing...", t.username))
	}
}

#[cfg(test)]
mod tests {
	use palaver_domain::{ChannelId, MessageAddress};

	use super::*;

	fn signal(user: &str, active: bool) -> TypingSignal {
		TypingSignal {
			address: MessageAddress::channel(ChannelId::new("c1").unwrap()),
			user_id: UserId::new(user).unwrap(),
			username: user.to_string(),
			active,
		}
	}

	#[test]
	fn local_edges_are_emitted_once() {
		let mut typing = TypingCoordinator::new();

		assert!(typing.note_local_activity());
		assert!(!typing.note_local_activity());
		assert!(!typing.note_local_activity());

		assert!(typing.local_idle());
		assert!(!typing.local_idle());
	}

	#[test]
	fn remote_typists_are_a_set_keyed_by_user() {
		let mut typing = TypingCoordinator::new();

		assert!(typing.apply_remote(&signal("ana", true)));
		assert!(!typing.apply_remote(&signal("ana", true)));
		assert!(typing.apply_remote(&signal("bob", true)));
		assert_eq!(typing.typists().len(), 2);
		assert_eq!(typing.summary().unwrap(), "ana is typing...");

		assert!(typing.apply_remote(&signal("ana", false)));
		assert_eq!(typing.summary().unwrap(), "bob is typing...");
		// Unknown typist going idle is a no-op.
		assert!(!typing.apply_remote(&signal("ghost", false)));
	}

	#[test]
	fn clear_remote_reports_changes_only() {
		let mut typing = TypingCoordinator::new();
		assert!(!typing.clear_remote());
		typing.apply_remote(&signal("ana", true));
		assert!(typing.clear_remote());
		assert!(typing.typists().is_empty());
	}
}
