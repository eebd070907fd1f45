#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use palaver_domain::{Channel, ChannelId, Message, User, UserId};
use palaver_engine::api::ServerApi;
use palaver_engine::{EngineConfig, EngineError, FilePayload};
use palaver_protocol::UploadResponse;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST half of the backend surface. One instance per session; the
/// bearer token is attached to every request.
pub struct RestClient {
	http: reqwest::Client,
	base_url: String,
	auth_token: String,
}

impl RestClient {
	pub fn new(config: &EngineConfig, auth_token: impl Into<String>) -> anyhow::Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.user_agent(config.client_name.clone())
			.build()
			.context("build http client")?;

		Ok(Self {
			http,
			base_url: config.endpoint().base_url(),
			auth_token: auth_token.into(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
		debug!(%path, "rest get");
		let resp = self
			.http
			.get(self.url(path))
			.bearer_auth(&self.auth_token)
			.send()
			.await
			.with_context(|| format!("GET {path} request"))?
			.error_for_status()
			.with_context(|| format!("GET {path} status"))?;

		resp.json().await.with_context(|| format!("GET {path} json"))
	}

	async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> anyhow::Result<T> {
		debug!(%path, "rest post");
		let resp = self
			.http
			.post(self.url(path))
			.bearer_auth(&self.auth_token)
			.json(body)
			.send()
			.await
			.with_context(|| format!("POST {path} request"))?
			.error_for_status()
			.with_context(|| format!("POST {path} status"))?;

		resp.json().await.with_context(|| format!("POST {path} json"))
	}
}

#[derive(Serialize)]
struct CreateChannelBody<'a> {
	name: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	description: Option<&'a str>,
}

fn fetch_err(e: anyhow::Error) -> EngineError {
	EngineError::Fetch(format!("{e:#}"))
}

#[async_trait]
impl ServerApi for RestClient {
	async fn fetch_users(&self) -> Result<Vec<User>, EngineError> {
		self.get_json("/users").await.map_err(fetch_err)
	}

	async fn fetch_channels(&self) -> Result<Vec<Channel>, EngineError> {
		self.get_json("/channels").await.map_err(fetch_err)
	}

	async fn create_channel(&self, name: &str, description: Option<&str>) -> Result<Channel, EngineError> {
		self.post_json("/channels", &CreateChannelBody { name, description })
			.await
			.map_err(fetch_err)
	}

	async fn join_channel(&self, channel: &ChannelId) -> Result<(), EngineError> {
		let path = format!("/channels/{channel}/join");
		// The join response body is unused; membership comes back via
		// the subsequent channel refresh.
		let _: serde_json::Value = self.post_json(&path, &serde_json::json!({})).await.map_err(fetch_err)?;
		Ok(())
	}

	async fn fetch_channel_messages(&self, channel: &ChannelId) -> Result<Vec<Message>, EngineError> {
		self.get_json(&format!("/messages/channel/{channel}")).await.map_err(fetch_err)
	}

	async fn fetch_direct_messages(&self, peer: &UserId) -> Result<Vec<Message>, EngineError> {
		self.get_json(&format!("/messages/direct/{peer}")).await.map_err(fetch_err)
	}

	async fn upload(&self, file: &FilePayload) -> Result<UploadResponse, EngineError> {
		let part = reqwest::multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone());
		let form = reqwest::multipart::Form::new().part("file", part);

		let upload = async {
			let resp = self
				.http
				.post(self.url("/upload"))
				.bearer_auth(&self.auth_token)
				.multipart(form)
				.send()
				.await
				.context("POST /upload request")?
				.error_for_status()
				.context("POST /upload status")?;

			resp.json::<UploadResponse>().await.context("POST /upload json")
		};

		upload.await.map_err(|e| EngineError::Upload(format!("{e:#}")))
	}
}
