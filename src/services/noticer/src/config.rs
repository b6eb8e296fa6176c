//! Configuration module for noticer
//!
//! Every channel has its own section. Values come from the defaults below, an
//! optional file named by `NOTICER_CONFIG_FILE`, and `NOTICER__*` environment
//! variables, in that order of precedence.

use noticer_shared::{HttpClientConfig, RedisConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for noticer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticerConfig {
    /// Redis backing the cooldown counters and ticket cache
    pub redis: RedisConfig,

    /// Outbound HTTP client settings shared by all HTTP channels
    pub http: HttpClientConfig,

    pub ding_group: GroupRobotConfig,
    pub yach_group: GroupRobotConfig,
    pub ding_worker: WorkerBotConfig,
    pub yach_worker: WorkerBotConfig,
    pub sms: SmsConfig,
    pub phone: PhoneConfig,
    pub email: EmailConfig,
    pub metrics: MetricsConfig,
}

/// Per-endpoint rate-limit window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Prefix of the counter key; the endpoint identifier is appended
    pub key_prefix: String,
    /// Attempts allowed per window
    pub window_limit: u64,
    /// Window length in seconds, counted from the first attempt
    pub window_seconds: u64,
}

impl CooldownConfig {
    pub fn with_prefix<S: Into<String>>(key_prefix: S) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            window_limit: 19,
            window_seconds: 61,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Apply `sleep_redis_prefix`, `sleep_num` and `sleep_time` from `section`
    ///
    /// The defaults layer always carries the current key names, so the legacy
    /// names are read as separate keys and win when present.
    fn apply_legacy(&mut self, built: &config::Config, section: &str) {
        if let Ok(prefix) = built.get::<String>(&format!("{}.cooldown.sleep_redis_prefix", section)) {
            self.key_prefix = prefix;
        }
        if let Ok(limit) = built.get::<u64>(&format!("{}.cooldown.sleep_num", section)) {
            self.window_limit = limit;
        }
        if let Ok(seconds) = built.get::<u64>(&format!("{}.cooldown.sleep_time", section)) {
            self.window_seconds = seconds;
        }
    }
}

/// Group robot (webhook) channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRobotConfig {
    pub enabled: bool,
    pub uri_push: String,
    pub cooldown: CooldownConfig,
}

/// Worker robot channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerBotConfig {
    pub enabled: bool,
    pub appid: String,
    pub appkey: String,
    pub uri_get_ticket: String,
    pub uri_notice: String,
    pub ticket_ttl_seconds: u64,
}

/// SMS gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub enabled: bool,
    pub base_uri: String,
    pub appid: String,
    pub secret: String,
    pub phone_code: u32,
    pub ticket_ttl_seconds: u64,
}

/// Voice call (landing call) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    pub enabled: bool,
    pub base_uri: String,
    pub sid: String,
    pub token: String,
    pub appid: String,
    /// Extra body fields sent with every call, e.g. `playTimes`
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub from_address: String,
    pub from_name: String,
    pub timeout_seconds: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
}

impl Default for NoticerConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            http: HttpClientConfig::default(),
            ding_group: GroupRobotConfig::ding(),
            yach_group: GroupRobotConfig::yach(),
            ding_worker: WorkerBotConfig::default(),
            yach_worker: WorkerBotConfig::default(),
            sms: SmsConfig::default(),
            phone: PhoneConfig::default(),
            email: EmailConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl GroupRobotConfig {
    /// DingTalk group robot defaults
    pub fn ding() -> Self {
        Self {
            enabled: true,
            uri_push: "https://oapi.dingtalk.com/robot/send".to_string(),
            cooldown: CooldownConfig::with_prefix("dog.dinggroup.sleep."),
        }
    }

    /// Yach group robot defaults; the push URI is deployment specific
    pub fn yach() -> Self {
        Self {
            enabled: false,
            uri_push: std::env::var("YACH_GROUP_URI_PUSH").unwrap_or_default(),
            cooldown: CooldownConfig::with_prefix("dog.yachgroup.sleep."),
        }
    }
}

impl Default for WorkerBotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            appid: String::new(),
            appkey: String::new(),
            uri_get_ticket: String::new(),
            uri_notice: String::new(),
            ticket_ttl_seconds: 100,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Disabled by default due to cost
            base_uri: std::env::var("SMS_BASE_URI").unwrap_or_default(),
            appid: std::env::var("SMS_APPID").unwrap_or_default(),
            secret: std::env::var("SMS_SECRET").unwrap_or_default(),
            phone_code: 86,
            ticket_ttl_seconds: 6000,
        }
    }
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_uri: "https://app.cloopen.com:8883/2013-12-26/".to_string(),
            sid: std::env::var("PHONE_SID").unwrap_or_default(),
            token: std::env::var("PHONE_TOKEN").unwrap_or_default(),
            appid: std::env::var("PHONE_APPID").unwrap_or_default(),
            options: HashMap::new(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "465".to_string())
                .parse()
                .unwrap_or(465),
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_use_tls: true,
            from_address: std::env::var("FROM_EMAIL").unwrap_or_default(),
            from_name: std::env::var("FROM_NAME").unwrap_or_else(|_| "Noticer".to_string()),
            timeout_seconds: 30,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "noticer".to_string(),
        }
    }
}

impl NoticerConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut cfg = config::Config::builder();

        // Start with default configuration
        cfg = cfg.add_source(config::Config::try_from(&NoticerConfig::default())?);

        if let Ok(config_file) = std::env::var("NOTICER_CONFIG_FILE") {
            cfg = cfg.add_source(config::File::with_name(&config_file).required(false));
        }

        cfg = cfg.add_source(
            config::Environment::with_prefix("NOTICER")
                .separator("__")
                .try_parsing(true),
        );

        let built = cfg.build()?;
        let mut config: NoticerConfig = built.clone().try_deserialize()?;
        config.ding_group.cooldown.apply_legacy(&built, "ding_group");
        config.yach_group.cooldown.apply_legacy(&built, "yach_group");
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, group) in [("ding_group", &self.ding_group), ("yach_group", &self.yach_group)] {
            if !group.enabled {
                continue;
            }
            if group.uri_push.is_empty() {
                return Err(format!("{}: uri_push is required when enabled", name));
            }
            if group.cooldown.window_limit == 0 {
                return Err(format!("{}: cooldown window_limit must be greater than 0", name));
            }
            if group.cooldown.window_seconds == 0 {
                return Err(format!(
                    "{}: cooldown window_seconds must be greater than 0",
                    name
                ));
            }
        }

        for (name, worker) in [
            ("ding_worker", &self.ding_worker),
            ("yach_worker", &self.yach_worker),
        ] {
            if !worker.enabled {
                continue;
            }
            if worker.appid.is_empty() || worker.appkey.is_empty() {
                return Err(format!("{}: appid and appkey are required when enabled", name));
            }
            if worker.uri_get_ticket.is_empty() || worker.uri_notice.is_empty() {
                return Err(format!(
                    "{}: uri_get_ticket and uri_notice are required when enabled",
                    name
                ));
            }
        }

        if self.sms.enabled
            && (self.sms.base_uri.is_empty() || self.sms.appid.is_empty() || self.sms.secret.is_empty())
        {
            return Err("sms: base_uri, appid and secret are required when enabled".to_string());
        }

        if self.phone.enabled
            && (self.phone.sid.is_empty() || self.phone.token.is_empty() || self.phone.appid.is_empty())
        {
            return Err("phone: sid, token and appid are required when enabled".to_string());
        }

        if self.email.enabled {
            if self.email.smtp_host.is_empty() {
                return Err("SMTP host is required when email is enabled".to_string());
            }
            if self.email.from_address.is_empty() {
                return Err("From address is required when email is enabled".to_string());
            }
        }

        if self.http.timeout_seconds == 0 {
            return Err("http: timeout_seconds must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Check if a channel is enabled
    pub fn is_channel_enabled(&self, channel: &str) -> bool {
        match channel {
            "dinggroup" => self.ding_group.enabled,
            "yachgroup" => self.yach_group.enabled,
            "dingworker" => self.ding_worker.enabled,
            "yachworker" => self.yach_worker.enabled,
            "sms" => self.sms.enabled,
            "phone" => self.phone.enabled,
            "email" => self.email.enabled,
            _ => false,
        }
    }

    /// Whether any enabled channel needs the shared Redis store
    pub fn needs_store(&self) -> bool {
        self.ding_group.enabled
            || self.yach_group.enabled
            || self.ding_worker.enabled
            || self.yach_worker.enabled
            || self.sms.enabled
    }
}
