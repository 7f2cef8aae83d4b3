use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pc: PcConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Directory served as the static sample UI.
    #[serde(default = "default_ui_dir")]
    pub ui_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), ui_dir: default_ui_dir() }
    }
}

/// Where and how to reach the PC server.
#[derive(Debug, Clone, Deserialize)]
pub struct PcConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub system_id: String,
    #[serde(default = "default_pc_timeout")]
    pub timeout_secs: u64,
    /// URL PC posts transaction callbacks to; sent along with new transactions.
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default = "default_transaction_text")]
    pub transaction_text: String,
}

impl Default for PcConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            system_id: String::new(),
            timeout_secs: default_pc_timeout(),
            callback_url: None,
            transaction_text: default_transaction_text(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_transaction_file")]
    pub transaction_file: String,
    #[serde(default = "default_alias_file")]
    pub alias_file: String,
    /// Serialize in-process read-modify-write cycles on the state file.
    #[serde(default = "default_true")]
    pub serialize_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transaction_file: default_transaction_file(),
            alias_file: default_alias_file(),
            serialize_writes: true,
        }
    }
}

fn default_ui_dir() -> String { "ui".into() }
fn default_pc_timeout() -> u64 { 10 }
fn default_transaction_text() -> String { "Confirm authentication".into() }
fn default_transaction_file() -> String { "/tmp/pc_sample_storage.json".into() }
fn default_alias_file() -> String { "/tmp/pc_sample_aliases.json".into() }
fn default_true() -> bool { true }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when the
    /// file is absent, then apply env overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.normalize_and_validate(&|key: &str| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        self.server.normalize(env)?;
        self.pc.normalize_from_env(env);
        self.pc.validate()?;
        self.storage.normalize_from_env(env);
        self.storage.validate()?;
        Ok(())
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn normalize(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = env("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = env("SERVER_PORT") {
            self.port = port.parse().map_err(|_| anyhow!("SERVER_PORT is not a valid port: {port}"))?;
        }
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl PcConfig {
    pub fn normalize_from_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if self.url.trim().is_empty() {
            if let Some(url) = env("PC_URL") {
                self.url = url;
            }
        }
        if self.system_id.trim().is_empty() {
            if let Some(id) = env("PC_SYSTEM_ID") {
                self.system_id = id;
            }
        }
        if let Some(secs) = env("PC_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = secs;
        }
        if self.callback_url.is_none() {
            self.callback_url = env("PC_CALLBACK_URL");
        }
        self.url = self.url.trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("pc.url is empty; set it in config.toml or PC_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("pc.url must start with http:// or https://"));
        }
        if self.system_id.trim().is_empty() {
            return Err(anyhow!("pc.system_id is empty; set it in config.toml or PC_SYSTEM_ID"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("pc.timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(path) = env("STORAGE_FILE") {
            self.transaction_file = path;
        }
        if let Some(path) = env("ALIAS_FILE") {
            self.alias_file = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.transaction_file.trim().is_empty() || self.alias_file.trim().is_empty() {
            return Err(anyhow!("storage file paths must not be empty"));
        }
        if self.transaction_file == self.alias_file {
            return Err(anyhow!("storage.transaction_file and storage.alias_file must differ"));
        }
        Ok(())
    }
}
