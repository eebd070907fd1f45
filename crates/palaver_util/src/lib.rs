#![forbid(unsafe_code)]

pub mod endpoint {
	/// Parsed `http://host:port` or `https://host:port` server endpoint.
	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	pub struct HttpEndpoint {
		pub host: String,
		pub port: u16,
		pub tls: bool,
	}

	impl HttpEndpoint {
		/// Returns `host:port` (host preserved, IPv6 stays bracketed).
		pub fn hostport(&self) -> String {
			format!("{}:{}", self.host, self.port)
		}

		/// REST base URL, no trailing slash.
		pub fn base_url(&self) -> String {
			let scheme = if self.tls { "https" } else { "http" };
			format!("{scheme}://{}:{}", self.host, self.port)
		}

		/// WebSocket URL for the event channel.
		pub fn ws_url(&self) -> String {
			let scheme = if self.tls { "wss" } else { "ws" };
			format!("{scheme}://{}:{}/socket", self.host, self.port)
		}

		/// Parse an endpoint string in the form `http(s)://host:port`.
		pub fn parse(s: &str) -> Result<Self, String> {
			let s = s.trim();
			if s.is_empty() {
				return Err("endpoint must be non-empty (expected http(s)://host:port)".to_string());
			}

			let (tls, rest) = if let Some(rest) = s.strip_prefix("https://") {
				(true, rest)
			} else if let Some(rest) = s.strip_prefix("http://") {
				(false, rest)
			} else {
				return Err(format!("invalid endpoint (expected http(s)://host:port): {s}"));
			};

			if rest.contains('/') || rest.contains('?') || rest.contains('#') {
				return Err(format!(
					"invalid endpoint (expected http(s)://host:port without path/query/fragment): {s}"
				));
			}

			let (host, port_str) = rest
				.rsplit_once(':')
				.ok_or_else(|| format!("invalid endpoint (missing :port, expected http(s)://host:port): {s}"))?;

			let host = host.trim();
			if host.is_empty() {
				return Err(format!("invalid endpoint host (expected http(s)://host:port): {s}"));
			}

			if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
				return Err(format!(
					"invalid endpoint host (IPv6 must be bracketed like http://[::1]:3000): {s}"
				));
			}

			let port: u16 = port_str
				.trim()
				.parse()
				.map_err(|_| format!("invalid endpoint port (expected 1..=65535): {s}"))?;

			if port == 0 {
				return Err(format!("invalid endpoint port (expected 1..=65535): {s}"));
			}

			Ok(Self {
				host: host.to_string(),
				port,
				tls,
			})
		}
	}

	/// Validate `http(s)://host:port`.
	pub fn validate_http_endpoint(s: &str) -> Result<(), String> {
		let _ = HttpEndpoint::parse(s)?;
		Ok(())
	}

}
