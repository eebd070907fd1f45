#![forbid(unsafe_code)]

use std::sync::Arc;

use palaver_client::{RestClient, socket_connector};
use palaver_domain::{ConversationKey, Session, UserId};
use palaver_engine::{EngineConfig, start_engine};
use tracing::info;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: palaver_client --token tok --user id [--connect http://host:port] [--name username] [--select conversation]\n\
\n\
Options:\n\
	--connect   Server endpoint (default: http://localhost:3000)\n\
	            Format: http(s)://host:port\n\
	--token     Auth token for the session (required)\n\
	--user      The session's user id (required)\n\
	--name      The session's username (default: the user id)\n\
	--select    Conversation to open after connecting\n\
	            Format: channel:<id> or direct:<user-id>\n\
	--help      Show this help\n\
\n\
Notes:\n\
	Engine events are printed to the log as they arrive; Ctrl-C exits.\n\
\n\
Examples:\n\
	palaver_client --token tok --user 65ab31 --name ana\n\
	palaver_client --connect https://chat.example.com:8443 --token tok --user 65ab31 --select channel:general\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,palaver_engine=debug".to_string());
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

struct Args {
	endpoint: String,
	token: String,
	user: String,
	name: Option<String>,
	select: Option<String>,
}

fn parse_args() -> Args {
	let mut endpoint = "http://localhost:3000".to_string();
	let mut token: Option<String> = None;
	let mut user: Option<String> = None;
	let mut name: Option<String> = None;
	let mut select: Option<String> = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--connect" | "--endpoint" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if let Err(e) = palaver_util::endpoint::validate_http_endpoint(&v) {
					eprintln!("Invalid --connect value: {e}");
					usage_and_exit();
				}
				endpoint = v;
			}
			"--token" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--token must be non-empty");
					usage_and_exit();
				}
				token = Some(v);
			}
			"--user" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--user must be non-empty");
					usage_and_exit();
				}
				user = Some(v);
			}
			"--name" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				name = Some(v);
			}
			"--select" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if ConversationKey::parse(&v).is_err() {
					eprintln!("Invalid --select value: {v} (expected channel:<id> or direct:<user-id>)");
					usage_and_exit();
				}
				select = Some(v);
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	let Some(token) = token else {
		eprintln!("--token is required");
		usage_and_exit();
	};
	let Some(user) = user else {
		eprintln!("--user is required");
		usage_and_exit();
	};

	Args {
		endpoint,
		token,
		user,
		name,
		select,
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let args = parse_args();

	let config = EngineConfig::from_endpoint(&args.endpoint).unwrap_or_else(|e| {
		eprintln!("Invalid --connect value: {}\n{e}", args.endpoint);
		usage_and_exit();
	});

	let api = Arc::new(RestClient::new(&config, &args.token)?);
	let (controller, mut events, shutdown) = start_engine(config, api, socket_connector());

	let session = Session {
		user_id: UserId::new(&args.user)?,
		username: args.name.clone().unwrap_or_else(|| args.user.clone()),
		auth_token: args.token.clone(),
	};
	controller.connect(session).await.map_err(anyhow::Error::msg)?;

	if let Some(select) = &args.select {
		let key = ConversationKey::parse(select)?;
		controller.select_conversation(Some(key)).await.map_err(anyhow::Error::msg)?;
	}

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted; shutting down");
				break;
			}
			event = events.recv() => {
				let Some(event) = event else {
					break;
				};
				info!(?event, "engine event");
			}
		}
	}

	shutdown.shutdown().await;
	Ok(())
}
