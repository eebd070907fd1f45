use palaver_domain::{Channel, ChannelId, User, UserId};
use tracing::debug;

/// Directory of known users and channels, kept current via point-in-time
/// fetches and live roster events. The viewer is never listed among the
/// users. Presence events never patch channel membership; that changes
/// only through a full channel refresh.
#[derive(Debug, Default)]
pub struct RosterStore {
	users: Vec<User>,
	channels: Vec<Channel>,
}

impl RosterStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the user collection with a fresh fetch, self excluded.
	pub fn replace_users(&mut self, users: Vec<User>, viewer: &UserId) {
		self.users = users.into_iter().filter(|u| &u.id != viewer).collect();
	}

	/// Replace the channel collection with a fresh fetch.
	pub fn replace_channels(&mut self, channels: Vec<Channel>) {
		self.channels = channels;
	}

	/// Append a freshly registered user. Idempotent; self is ignored.
	pub fn apply_new_user(&mut self, user: User, viewer: &UserId) -> bool {
		if &user.id == viewer || self.users.iter().any(|u| u.id == user.id) {
			return false;
		}
		self.users.push(user);
		true
	}

	/// Update `is_online` for a known user; unknown ids are a no-op.
	pub fn apply_presence(&mut self, user_id: &UserId, is_online: bool) -> bool {
		match self.users.iter_mut().find(|u| &u.id == user_id) {
			Some(user) => {
				let changed = user.is_online != is_online;
				user.is_online = is_online;
				changed
			}
			None => {
				debug!(%user_id, "presence change for unknown user ignored");
				false
			}
		}
	}

	/// Append a channel just created by the viewer.
	pub fn add_channel(&mut self, channel: Channel) {
		if !self.channels.iter().any(|c| c.id == channel.id) {
			self.channels.push(channel);
		}
	}

	pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
		self.channels.iter().find(|c| &c.id == id)
	}

	pub fn user(&self, id: &UserId) -> Option<&User> {
		self.users.iter().find(|u| &u.id == id)
	}

	pub fn users(&self) -> &[User] {
		&self.users
	}

	pub fn channels(&self) -> &[Channel] {
		&self.channels
	}

	/// Users whose username contains `query`, case-insensitive.
	pub fn users_matching(&self, query: &str) -> Vec<&User> {
		let query = query.to_lowercase();
		self.users.iter().filter(|u| u.username.to_lowercase().contains(&query)).collect()
	}

	/// Channels whose name contains `query`, case-insensitive.
	pub fn channels_matching(&self, query: &str) -> Vec<&Channel> {
		let query = query.to_lowercase();
		self.channels.iter().filter(|c| c.name.to_lowercase().contains(&query)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn user(id: &str, name: &str, online: bool) -> User {
		User {
			id: UserId::new(id).unwrap(),
			username: name.to_string(),
			is_online: online,
		}
	}

	#[test]
	fn replace_users_excludes_self() {
		let viewer = UserId::new("me").unwrap();
		let mut roster = RosterStore::new();
		roster.replace_users(vec![user("me", "me", true), user("u1", "ana", true)], &viewer);
		assert_eq!(roster.users().len(), 1);
		assert_eq!(roster.users()[0].id.as_str(), "u1");
	}

	#[test]
	fn new_user_is_idempotent_and_skips_self() {
		let viewer = UserId::new("me").unwrap();
		let mut roster = RosterStore::new();
		assert!(roster.apply_new_user(user("u1", "ana", true), &viewer));
		assert!(!roster.apply_new_user(user("u1", "ana", true), &viewer));
		assert!(!roster.apply_new_user(user("me", "me", true), &viewer));
		assert_eq!(roster.users().len(), 1);
	}

	#[test]
	fn presence_updates_known_users_only() {
		let viewer = UserId::new("me").unwrap();
		let mut roster = RosterStore::new();
		roster.replace_users(vec![user("u1", "ana", true)], &viewer);

		assert!(roster.apply_presence(&UserId::new("u1").unwrap(), false));
		assert!(!roster.users()[0].is_online);
		// Same state again is not a change.
		assert!(!roster.apply_presence(&UserId::new("u1").unwrap(), false));
		// Unknown id is a no-op.
		assert!(!roster.apply_presence(&UserId::new("ghost").unwrap(), true));
		assert_eq!(roster.users().len(), 1);
	}

	#[test]
	fn search_is_case_insensitive_substring() {
		let viewer = UserId::new("me").unwrap();
		let mut roster = RosterStore::new();
		roster.replace_users(vec![user("u1", "Anabel", true), user("u2", "bob", false)], &viewer);

		assert_eq!(roster.users_matching("ANA").len(), 1);
		assert_eq!(roster.users_matching("").len(), 2);
		assert!(roster.users_matching("zzz").is_empty());
	}
}
