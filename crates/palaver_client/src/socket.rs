#![forbid(unsafe_code)]

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use palaver_domain::Session;
use palaver_engine::api::{BoxedSocket, BoxedSocketEvents, SocketApi, SocketConnector, SocketEvents};
use palaver_engine::{EngineConfig, EngineError};
use palaver_protocol::{ClientEvent, EventError, ServerEvent, decode_frame, encode_frame};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the event channel.
pub struct WsSink {
	sink: SplitSink<Ws, WsMessage>,
}

/// Read half of the event channel.
pub struct WsStream {
	stream: SplitStream<Ws>,
}

/// Open the event socket for a session. The token travels in the
/// handshake query; the backend associates the connection with the
/// session from it.
pub async fn connect_socket(config: &EngineConfig, session: &Session) -> Result<(WsSink, WsStream), EngineError> {
	let url = format!("{}?token={}", config.endpoint().ws_url(), session.auth_token);
	let (ws, _response) = connect_async(&url)
		.await
		.map_err(|e| EngineError::Connect(e.to_string()))?;
	debug!(host = %config.server_host, port = config.server_port, "event socket open");

	let (sink, stream) = ws.split();
	Ok((WsSink { sink }, WsStream { stream }))
}

/// Connector for [`palaver_engine::start_engine`], boxing the two
/// halves behind the engine seams.
pub fn socket_connector() -> SocketConnector {
	Box::new(|config, session| {
		Box::pin(async move {
			let (sink, stream) = connect_socket(&config, &session).await?;
			Ok((Box::new(sink) as BoxedSocket, Box::new(stream) as BoxedSocketEvents))
		})
	})
}

impl SocketApi for WsSink {
	fn emit<'a>(&'a mut self, event: ClientEvent) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
		Box::pin(async move {
			let frame = encode_frame(&event).map_err(|e| EngineError::Transport(e.to_string()))?;
			self.sink
				.send(WsMessage::Text(frame.into()))
				.await
				.map_err(|e| EngineError::Transport(e.to_string()))
		})
	}

	fn close(&self) {
		// Dropping the halves closes the underlying stream.
		debug!("event socket closing");
	}
}

impl SocketEvents for WsStream {
	fn run_events_loop<'a>(
		&'a mut self,
		mut on_event: Box<dyn FnMut(ServerEvent) + Send + 'a>,
	) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
		Box::pin(async move {
			while let Some(next) = self.stream.next().await {
				match next {
					Ok(WsMessage::Text(text)) => match decode_frame(text.as_str()) {
						Ok(event) => on_event(event),
						Err(EventError::UnknownEvent(name)) => debug!(%name, "unknown event skipped"),
						Err(e) => warn!(error = %e, "undecodable frame skipped"),
					},
					Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
					Ok(WsMessage::Close(frame)) => {
						debug!(?frame, "server closed the event socket");
						return Ok(());
					}
					Ok(other) => debug!(?other, "non-text frame skipped"),
					Err(e) => return Err(EngineError::Transport(e.to_string())),
				}
			}
			Ok(())
		})
	}
}
