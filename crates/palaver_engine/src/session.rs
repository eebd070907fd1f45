use std::sync::Arc;

use palaver_domain::{
	ChannelId, ConnectionState, ConversationKey, Message, MessageAddress, MessageId, ReadReceipt, Session, UserId,
};
use palaver_protocol::{ClientEvent, MessageKind, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{BoxedSocket, BoxedSocketEvents, ServerApi, SocketConnector};
use crate::controller::{EngineCommand, EngineController, ShutdownHandle};
use crate::conversation::{ConversationSelector, routes_to_active};
use crate::events::EngineEvent;
use crate::reconciler::{Applied, MessageReconciler};
use crate::reconnect::schedule_reconnect;
use crate::roster::RosterStore;
use crate::send::{FilePayload, classify, plan_send};
use crate::typing::{TYPING_QUIET_PERIOD, TypingCoordinator};
use crate::{EngineConfig, EngineError};

/// Spawn the engine task. Returns the controller for commands, the
/// event stream for the UI, and a shutdown handle that tears down the
/// live channel on every exit path.
pub fn start_engine(
	config: EngineConfig,
	api: Arc<dyn ServerApi>,
	connector: SocketConnector,
) -> (EngineController, mpsc::UnboundedReceiver<EngineEvent>, ShutdownHandle) {
	let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>(128);
	let (event_tx, event_rx) = mpsc::unbounded_channel::<EngineEvent>();
	let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

	let controller = EngineController::new(cmd_tx);
	let join_handle = tokio::spawn(run_engine_task(config, api, connector, cmd_rx, event_tx, shutdown_rx));
	let shutdown = ShutdownHandle::new(shutdown_tx, join_handle);

	(controller, event_rx, shutdown)
}

/// Run the engine loop until shutdown. All state mutation happens here,
/// one command or inbound event at a time.
pub async fn run_engine_task(
	config: EngineConfig,
	api: Arc<dyn ServerApi>,
	connector: SocketConnector,
	mut cmd_rx: mpsc::Receiver<EngineCommand>,
	event_tx: mpsc::UnboundedSender<EngineEvent>,
	mut shutdown_rx: oneshot::Receiver<()>,
) {
	// Internal feedback path: the events task, history fetches and
	// socket-closed notifications re-enter the loop through here.
	let (feedback_tx, mut feedback_rx) = mpsc::unbounded_channel::<EngineCommand>();

	let mut task = EngineTask {
		config,
		api,
		connector,
		feedback_tx,
		event_tx,
		state: ConnectionState::Disconnected,
		session: None,
		socket: None,
		events_task: None,
		socket_generation: 0,
		roster: RosterStore::new(),
		selector: ConversationSelector::new(),
		reconciler: MessageReconciler::new(),
		typing: TypingCoordinator::new(),
		reconnect_attempt: 0,
		reconnect_deadline: None,
		typing_deadline: None,
	};

	loop {
		let reconnect_deadline = task.reconnect_deadline;
		let typing_deadline = task.typing_deadline;

		tokio::select! {
			_ = &mut shutdown_rx => {
				task.teardown("shutdown");
				break;
			}

			cmd = cmd_rx.recv() => {
				let Some(cmd) = cmd else {
					task.teardown("controller dropped");
					break;
				};
				task.handle_command(cmd).await;
			}

			cmd = feedback_rx.recv() => {
				// The task holds a sender clone, so this never closes.
				if let Some(cmd) = cmd {
					task.handle_command(cmd).await;
				}
			}

			_ = async {
				if let Some(deadline) = reconnect_deadline {
					tokio::time::sleep_until(deadline).await;
				}
			}, if reconnect_deadline.is_some() => {
				task.reconnect_deadline = None;
				task.attempt_connect().await;
			}

			_ = async {
				if let Some(deadline) = typing_deadline {
					tokio::time::sleep_until(deadline).await;
				}
			}, if typing_deadline.is_some() => {
				task.typing_deadline = None;
				if task.typing.local_idle() {
					task.emit_typing_signal(false).await;
				}
			}
		}
	}
}

struct EngineTask {
	config: EngineConfig,
	api: Arc<dyn ServerApi>,
	connector: SocketConnector,
	feedback_tx: mpsc::UnboundedSender<EngineCommand>,
	event_tx: mpsc::UnboundedSender<EngineEvent>,

	state: ConnectionState,
	session: Option<Session>,
	socket: Option<BoxedSocket>,
	events_task: Option<tokio::task::JoinHandle<()>>,
	socket_generation: u64,

	roster: RosterStore,
	selector: ConversationSelector,
	reconciler: MessageReconciler,
	typing: TypingCoordinator,

	reconnect_attempt: u32,
	reconnect_deadline: Option<Instant>,
	typing_deadline: Option<Instant>,
}

impl EngineTask {
	fn emit(&self, event: EngineEvent) {
		if self.event_tx.send(event).is_err() {
			debug!("engine event receiver dropped");
		}
	}

	fn emit_error(&self, error: &EngineError) {
		self.emit(EngineEvent::Error {
			message: error.to_string(),
		});
	}

	fn set_state(&mut self, next: ConnectionState) {
		if self.state != next {
			self.state = next;
			self.emit(EngineEvent::StateChanged(next));
		}
	}

	fn emit_roster(&self) {
		self.emit(EngineEvent::RosterUpdated {
			users: self.roster.users().to_vec(),
			channels: self.roster.channels().to_vec(),
		});
	}

	fn emit_typists(&self) {
		self.emit(EngineEvent::TypingChanged {
			typists: self.typing.typists().to_vec(),
		});
	}

	fn drop_socket(&mut self, reason: &str) {
		if let Some(task) = self.events_task.take() {
			task.abort();
		}
		if let Some(socket) = self.socket.take() {
			socket.close();
			debug!(%reason, "socket closed");
		}
	}

	fn teardown(&mut self, reason: &str) {
		info!(%reason, "engine task stopping");
		self.drop_socket(reason);
		self.reconnect_deadline = None;
		self.typing_deadline = None;
		self.set_state(ConnectionState::Disconnected);
	}

	async fn handle_command(&mut self, cmd: EngineCommand) {
		match cmd {
			EngineCommand::Connect { session } => {
				self.drop_socket("reconnect");
				self.session = Some(session);
				self.reconnect_attempt = 0;
				self.reconnect_deadline = None;
				self.attempt_connect().await;
			}

			EngineCommand::Disconnect { reason } => {
				self.drop_socket(&reason);
				self.session = None;
				self.reconnect_attempt = 0;
				self.reconnect_deadline = None;
				self.typing_deadline = None;
				self.typing.local_idle();
				if self.typing.clear_remote() {
					self.emit_typists();
				}
				self.set_state(ConnectionState::Disconnected);
			}

			EngineCommand::SelectConversation { key } => self.select_conversation(key).await,

			EngineCommand::JoinChannel { channel_id } => self.join_channel(channel_id).await,

			EngineCommand::CreateChannel { name, description } => {
				match self.api.create_channel(&name, description.as_deref()).await {
					Ok(channel) => {
						self.roster.add_channel(channel.clone());
						self.emit_roster();
						self.emit(EngineEvent::ChannelCreated(channel));
					}
					Err(e) => {
						warn!(error = %e, "create channel failed");
						self.emit_error(&e);
					}
				}
			}

			EngineCommand::RefreshRoster => self.refresh_roster().await,

			EngineCommand::Send { text, file } => self.handle_send(text, file).await,

			EngineCommand::InputActivity => self.handle_input_activity().await,

			EngineCommand::React { message_id, emoji } => self.handle_react(message_id, emoji).await,

			EngineCommand::Inbound {
				socket_generation,
				event,
			} => {
				if socket_generation != self.socket_generation {
					debug!(socket_generation, "event from a stale socket dropped");
					return;
				}
				self.handle_inbound(event);
			}

			EngineCommand::SocketClosed {
				socket_generation,
				reason,
			} => {
				if socket_generation != self.socket_generation || self.socket.is_none() {
					debug!(socket_generation, "close notice from a stale socket ignored");
					return;
				}
				warn!(%reason, "live channel dropped");
				self.drop_socket(&reason);
				if self.typing.clear_remote() {
					self.emit_typists();
				}
				self.typing.local_idle();
				self.typing_deadline = None;
				if self.session.is_some() {
					self.set_state(ConnectionState::Connecting);
					// The drop itself is not a failed attempt; the full
					// budget goes to the reconnects.
					self.reconnect_attempt = 0;
					self.arm_retry();
				} else {
					self.set_state(ConnectionState::Disconnected);
				}
			}

			EngineCommand::HistoryLoaded { key, result } => self.finish_history_load(key, result),
		}
	}

	/// One connection attempt, bounded by the per-attempt timeout.
	async fn attempt_connect(&mut self) {
		let Some(session) = self.session.clone() else {
			// No session, no live channel.
			self.set_state(ConnectionState::Disconnected);
			return;
		};

		self.set_state(ConnectionState::Connecting);

		let attempt_timeout = self.config.connect_timeout;
		let fut = (self.connector)(self.config.clone(), session);

		match tokio::time::timeout(attempt_timeout, fut).await {
			Ok(Ok((socket, events))) => {
				self.socket_generation += 1;
				self.events_task = Some(spawn_events_loop(events, self.feedback_tx.clone(), self.socket_generation));
				self.socket = Some(socket);
				self.reconnect_attempt = 0;
				self.reconnect_deadline = None;
				info!(host = %self.config.server_host, port = self.config.server_port, "connected");
				self.set_state(ConnectionState::Connected);
				self.refresh_roster().await;
			}
			Ok(Err(e)) => {
				warn!(error = %e, "connect failed");
				self.schedule_retry();
			}
			Err(_) => {
				warn!(timeout = ?attempt_timeout, "connect attempt timed out");
				self.schedule_retry();
			}
		}
	}

	/// Book one failed attempt and either arm the next deadline or give
	/// up into `Disconnected` once the budget is spent.
	fn schedule_retry(&mut self) {
		self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
		self.arm_retry();
	}

	/// Arm the next retry deadline from the current failure count, or
	/// give up once the budget is spent. `Reconnecting::attempt` numbers
	/// the attempt about to be made; the initial explicit connect counts
	/// as attempt 1 and emits no event.
	fn arm_retry(&mut self) {
		match schedule_reconnect(self.reconnect_attempt) {
			Some((deadline, next_retry_in_ms)) => {
				self.reconnect_deadline = Some(deadline);
				self.set_state(ConnectionState::Connecting);
				self.emit(EngineEvent::Reconnecting {
					attempt: self.reconnect_attempt.saturating_add(1),
					next_retry_in_ms,
				});
			}
			None => {
				self.reconnect_deadline = None;
				self.set_state(ConnectionState::Disconnected);
				self.emit(EngineEvent::Error {
					message: format!("giving up after {} connection attempts", self.reconnect_attempt),
				});
			}
		}
	}

	async fn select_conversation(&mut self, key: Option<ConversationKey>) {
		// Silence our own typing signal towards the conversation we are
		// leaving, then drop its typist set.
		self.typing_deadline = None;
		if self.typing.local_idle() {
			self.emit_typing_signal(false).await;
		}
		if self.typing.clear_remote() {
			self.emit_typists();
		}

		let Some(key) = key else {
			self.selector.clear();
			self.reconciler.clear();
			self.emit(EngineEvent::ConversationSelected { conversation: None });
			return;
		};

		let Some(session) = self.session.clone() else {
			self.emit_error(&EngineError::NotConnected);
			return;
		};

		let conversation = self.selector.select(key, &self.roster, &session.user_id).clone();
		debug!(key = %conversation.key, accessible = conversation.accessible, "conversation selected");
		self.emit(EngineEvent::ConversationSelected {
			conversation: Some(conversation.clone()),
		});

		if conversation.accessible {
			self.reconciler.begin_load();
			self.spawn_history_fetch(conversation.key);
		} else {
			// Membership-gated: the log stays forced empty, nothing is
			// fetched and nothing inbound is accepted.
			self.reconciler.clear();
		}
	}

	fn spawn_history_fetch(&self, key: ConversationKey) {
		let api = Arc::clone(&self.api);
		let feedback_tx = self.feedback_tx.clone();
		tokio::spawn(async move {
			let result = match &key {
				ConversationKey::Channel(id) => api.fetch_channel_messages(id).await,
				ConversationKey::Direct(peer) => api.fetch_direct_messages(peer).await,
			};
			let _ = feedback_tx.send(EngineCommand::HistoryLoaded { key, result });
		});
	}

	fn finish_history_load(&mut self, key: ConversationKey, result: Result<Vec<Message>, EngineError>) {
		let still_active = self
			.selector
			.active()
			.is_some_and(|c| c.key == key && c.accessible);
		if !still_active || !self.reconciler.is_loading() {
			debug!(%key, "stale history response discarded");
			return;
		}

		match result {
			Ok(page) => {
				self.reconciler.install_history(page);
				self.emit(EngineEvent::HistoryLoaded {
					key,
					messages: self.reconciler.messages().to_vec(),
				});
			}
			Err(e) => {
				// Degrades to an empty log; not retried automatically.
				warn!(%key, error = %e, "history fetch failed");
				self.reconciler.abort_load();
			}
		}
	}

	fn handle_inbound(&mut self, event: ServerEvent) {
		let Some(session) = &self.session else {
			return;
		};
		let viewer = session.user_id.clone();

		match event {
			ServerEvent::NewMessage(msg) => {
				let Some(active) = self.selector.active() else {
					return;
				};
				if !active.accessible {
					return;
				}
				if !routes_to_active(&msg.address, &msg.sender_id, &active.key, &viewer) {
					debug!(message_id = %msg.id, "message for another conversation dropped");
					return;
				}
				if self.reconciler.apply_inbound(msg.clone()) == Applied::Appended {
					self.emit(EngineEvent::MessageAppended(msg));
				}
			}

			ServerEvent::NewUser(user) => {
				if self.roster.apply_new_user(user, &viewer) {
					self.emit_roster();
				}
			}

			ServerEvent::UserStatusChange { user_id, is_online } => {
				if self.roster.apply_presence(&user_id, is_online) {
					self.emit_roster();
				}
			}

			ServerEvent::UserTyping(signal) => {
				if signal.user_id == viewer {
					return;
				}
				let Some(active) = self.selector.active() else {
					return;
				};
				if !routes_to_active(&signal.address, &signal.user_id, &active.key, &viewer) {
					return;
				}
				if self.typing.apply_remote(&signal) {
					self.emit_typists();
				}
			}

			ServerEvent::MessageReactionUpdate { message_id, reactions } => {
				let updated = self.reconciler.apply_reaction_update(&message_id, reactions).cloned();
				if let Some(msg) = updated {
					self.emit(EngineEvent::MessageUpdated(msg));
				}
			}

			ServerEvent::MessageRead {
				message_id,
				read_by,
				read_at,
			} => {
				let receipt = ReadReceipt {
					user_id: read_by,
					read_at,
				};
				let updated = self.reconciler.apply_read_receipt(&message_id, receipt).cloned();
				if let Some(msg) = updated {
					self.emit(EngineEvent::MessageUpdated(msg));
				}
			}
		}
	}

	async fn handle_send(&mut self, text: String, file: Option<FilePayload>) {
		let plan = match plan_send(&text, file, self.config.max_upload_bytes) {
			Ok(Some(plan)) => plan,
			Ok(None) => {
				// Nothing to send; still clears the typing signal.
				self.silence_local_typing().await;
				return;
			}
			Err(e) => {
				self.emit_error(&e);
				return;
			}
		};

		let Some(active) = self.selector.active().cloned() else {
			self.emit_error(&EngineError::NoActiveConversation);
			return;
		};
		if !active.accessible {
			self.emit_error(&EngineError::NotAccessible);
			return;
		}
		if self.socket.is_none() {
			self.emit_error(&EngineError::NotConnected);
			return;
		}

		// Upload strictly before the message event; a failed upload
		// aborts the send, leaving the caller's input intact for retry.
		let (file_url, kind) = match &plan.file {
			Some(file) => {
				let api = Arc::clone(&self.api);
				match api.upload(file).await {
					Ok(resp) => {
						let kind = classify(Some(&resp.format));
						(Some(resp.url), kind)
					}
					Err(e) => {
						warn!(file = %file.name, error = %e, "upload failed; send aborted");
						self.emit_error(&e);
						return;
					}
				}
			}
			None => (None, MessageKind::Text),
		};

		let event = ClientEvent::SendMessage {
			content: plan.content,
			address: MessageAddress::for_conversation(&active.key),
			kind,
			file_url,
		};

		let Some(socket) = self.socket.as_mut() else {
			self.emit_error(&EngineError::NotConnected);
			return;
		};
		match socket.emit(event).await {
			Ok(()) => {
				// No optimistic append: the message surfaces only when
				// the backend echoes it through the inbound path.
				self.emit(EngineEvent::MessageSent { key: active.key });
				self.silence_local_typing().await;
			}
			Err(e) => {
				warn!(error = %e, "send emit failed");
				self.emit_error(&EngineError::Transport(e.to_string()));
			}
		}
	}

	async fn handle_input_activity(&mut self) {
		let accessible = self.selector.active().is_some_and(|c| c.accessible);
		if !accessible || self.socket.is_none() {
			return;
		}

		let edge = self.typing.note_local_activity();
		self.typing_deadline = Some(Instant::now() + TYPING_QUIET_PERIOD);
		if edge {
			self.emit_typing_signal(true).await;
		}
	}

	async fn handle_react(&mut self, message_id: MessageId, emoji: String) {
		let Some(socket) = self.socket.as_mut() else {
			self.emit_error(&EngineError::NotConnected);
			return;
		};
		if let Err(e) = socket.emit(ClientEvent::MessageReaction { message_id, emoji }).await {
			warn!(error = %e, "reaction emit failed");
			self.emit_error(&EngineError::Transport(e.to_string()));
		}
	}

	/// Force the local typing machine to Idle, emitting the `false`
	/// edge when it was Active.
	async fn silence_local_typing(&mut self) {
		self.typing_deadline = None;
		if self.typing.local_idle() {
			self.emit_typing_signal(false).await;
		}
	}

	/// Best-effort outbound `typing` edge for the active conversation.
	async fn emit_typing_signal(&mut self, is_typing: bool) {
		let Some(active) = self.selector.active() else {
			return;
		};
		let address = MessageAddress::for_conversation(&active.key);
		let Some(socket) = self.socket.as_mut() else {
			return;
		};
		if let Err(e) = socket.emit(ClientEvent::Typing { address, is_typing }).await {
			debug!(error = %e, "typing emit failed");
		}
	}

	/// Point-in-time refresh of both roster collections. A failed fetch
	/// leaves the collection unchanged; it is logged, not retried.
	async fn refresh_roster(&mut self) {
		let Some(session) = self.session.clone() else {
			return;
		};

		match self.api.fetch_users().await {
			Ok(users) => self.roster.replace_users(users, &session.user_id),
			Err(e) => warn!(error = %e, "user fetch failed; keeping previous collection"),
		}

		match self.api.fetch_channels().await {
			Ok(channels) => {
				self.roster.replace_channels(channels);
				self.apply_membership_change(&session.user_id);
			}
			Err(e) => warn!(error = %e, "channel fetch failed; keeping previous collection"),
		}

		self.emit_roster();
	}

	/// After a channel refresh the active channel's accessibility may
	/// have flipped; opening it triggers the deferred history load,
	/// losing it forces the log empty.
	fn apply_membership_change(&mut self, viewer: &UserId) {
		let Some(accessible) = self.selector.recompute_accessibility(&self.roster, viewer) else {
			return;
		};

		let conversation = self.selector.active().cloned();
		let Some(key) = conversation.as_ref().map(|c| c.key.clone()) else {
			return;
		};
		info!(%key, accessible, "active conversation accessibility changed");
		self.emit(EngineEvent::ConversationSelected { conversation });

		if accessible {
			self.reconciler.begin_load();
			self.spawn_history_fetch(key);
		} else {
			self.reconciler.clear();
			self.emit(EngineEvent::HistoryLoaded {
				key,
				messages: Vec::new(),
			});
		}
	}

	/// Join action: REST join, then a membership refresh; the socket
	/// event keeps the backend's room bookkeeping in step.
	async fn join_channel(&mut self, channel_id: ChannelId) {
		if let Some(socket) = self.socket.as_mut()
			&& let Err(e) = socket
				.emit(ClientEvent::JoinChannel {
					channel_id: channel_id.clone(),
				})
				.await
		{
			debug!(error = %e, "joinChannel emit failed");
		}

		match self.api.join_channel(&channel_id).await {
			Ok(()) => {
				let Some(session) = self.session.clone() else {
					return;
				};
				match self.api.fetch_channels().await {
					Ok(channels) => {
						self.roster.replace_channels(channels);
						self.apply_membership_change(&session.user_id);
						self.emit_roster();
					}
					Err(e) => warn!(error = %e, "channel refresh after join failed"),
				}
			}
			Err(e) => {
				warn!(%channel_id, error = %e, "join failed");
				self.emit_error(&e);
			}
		}
	}
}

fn spawn_events_loop(
	mut events: BoxedSocketEvents,
	feedback_tx: mpsc::UnboundedSender<EngineCommand>,
	socket_generation: u64,
) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let forward = feedback_tx.clone();
		let res = events
			.run_events_loop(Box::new(move |event| {
				let _ = forward.send(EngineCommand::Inbound {
					socket_generation,
					event,
				});
			}))
			.await;

		let reason = match res {
			Ok(()) => "events stream closed".to_string(),
			Err(e) => e.to_string(),
		};
		let _ = feedback_tx.send(EngineCommand::SocketClosed {
			socket_generation,
			reason,
		});
	})
}
