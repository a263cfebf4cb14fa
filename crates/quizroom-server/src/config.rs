use serde::Deserialize;

/// Top-level server configuration, loaded from `quizroom.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub generator: GeneratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Per-connection outbound message buffer.
    pub player_message_buffer: usize,
    /// Inbound WS message rate limit per connection (token bucket).
    pub ws_rate_limit_per_sec: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            player_message_buffer: 256,
            ws_rate_limit_per_sec: 20.0,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_players: usize,
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

/// Question-generation service client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5005/generate".to_string(),
            api_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on fatal misconfiguration.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }

        if self.rooms.max_players == 0 {
            tracing::error!("rooms.max_players must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }

        if self.generator.endpoint.is_empty() {
            tracing::error!("generator.endpoint must be set");
            std::process::exit(1);
        }
        if self.generator.request_timeout_secs == 0 {
            tracing::error!("generator.request_timeout_secs must be > 0");
            std::process::exit(1);
        }

        if self.generator.api_token.is_some() {
            tracing::warn!(
                "generator.api_token is set in config file, prefer the QUIZROOM_GENERATOR_TOKEN env var in production"
            );
        }
    }

    /// Load config from `quizroom.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("quizroom.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from quizroom.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse quizroom.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No quizroom.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("QUIZROOM_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("QUIZROOM_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(url) = std::env::var("QUIZROOM_GENERATOR_URL")
            && !url.is_empty()
        {
            config.generator.endpoint = url;
        }
        if let Ok(token) = std::env::var("QUIZROOM_GENERATOR_TOKEN")
            && !token.is_empty()
        {
            config.generator.api_token = Some(token);
        }
        if let Ok(val) = std::env::var("QUIZROOM_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("QUIZROOM_MAX_PLAYERS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.rooms.max_players = n;
        }

        config
    }
}
