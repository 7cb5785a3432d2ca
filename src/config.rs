use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub session_key: Option<String>,
    pub app_name: String,
    pub master_form_id: String,
    pub worker_interval: Duration,
    pub form_settle: Duration,
    pub gateway: GatewayConfig,
}

/// Credentials and fixed fields for the messaging gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
    pub sender: String,
    pub priority: String,
    pub template: String,
    pub placeholder_text: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "https://bhashsms.com/api/sendmsgutil.php".to_string(),
            user: String::new(),
            pass: String::new(),
            sender: String::new(),
            priority: "wa".to_string(),
            template: "bookmeet".to_string(),
            placeholder_text: "tex1".to_string(),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn secs_or(name: &str, default: u64) -> Duration {
    let secs = match std::env::var(name) {
        Ok(v) => v.trim().parse::<u64>().unwrap_or_else(|_| {
            log::warn!("{name}={v:?} is not a number of seconds, using {default}");
            default
        }),
        Err(_) => default,
    };
    Duration::from_secs(secs)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            bind_addr: var_or("BIND_ADDR", "127.0.0.1:8080"),
            data_dir: PathBuf::from(var_or("DATA_DIR", "data")),
            session_key: std::env::var("SESSION_KEY").ok(),
            app_name: var_or("APP_NAME", "Slotbook"),
            master_form_id: var_or("MASTER_FORM_ID", ""),
            worker_interval: secs_or("WORKER_INTERVAL_SECS", 300),
            form_settle: secs_or("FORM_SETTLE_SECS", 5),
            gateway: GatewayConfig {
                url: var_or("GATEWAY_URL", &defaults.url),
                user: var_or("GATEWAY_USER", ""),
                pass: var_or("GATEWAY_PASS", ""),
                sender: var_or("GATEWAY_SENDER", ""),
                priority: var_or("GATEWAY_PRIORITY", &defaults.priority),
                template: var_or("GATEWAY_TEMPLATE", &defaults.template),
                placeholder_text: var_or("GATEWAY_PLACEHOLDER_TEXT", &defaults.placeholder_text),
            },
        }
    }

    /// Configuration rooted at `data_dir` with defaults everywhere else.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            data_dir: data_dir.as_ref().to_path_buf(),
            session_key: None,
            app_name: "Slotbook".to_string(),
            master_form_id: String::new(),
            worker_interval: Duration::from_secs(300),
            form_settle: Duration::from_secs(5),
            gateway: GatewayConfig::default(),
        }
    }

    pub fn forms_file(&self) -> PathBuf {
        self.data_dir.join("forms.json")
    }

    pub fn admin_auth_file(&self) -> PathBuf {
        self.data_dir.join("admin_auth.json")
    }

    pub fn identity_file(&self) -> PathBuf {
        self.data_dir.join("google_creds.json")
    }
}
