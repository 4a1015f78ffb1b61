use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;
use crate::domain::SubscriptionTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub stripe: StripeConfig,

    pub generation: GenerationConfig,

    pub tokens: TokenConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `sqlite:` for local runs, `postgres://` for the hosted database.
    pub database_url: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/repurposely.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    /// Public URL of the web app, used for checkout and portal redirects.
    pub site_url: String,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Session inactivity timeout in minutes.
    pub session_timeout_minutes: i64,

    /// Users allowed to repair other users' subscriptions.
    pub admin_user_ids: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3001,
            site_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            secure_cookies: true,
            session_timeout_minutes: 60,
            admin_user_ids: Vec::new(),
        }
    }
}

/// Hosted authentication provider (Supabase).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub supabase_url: String,

    pub anon_key: String,

    /// Needed only for deleting users through the admin API.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_role_key: String,

    pub request_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            anon_key: String::new(),
            service_role_key: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    pub publishable_key: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub webhook_secret: String,

    pub pro_price_id: String,

    pub enterprise_price_id: String,

    /// Maximum age of a webhook signature timestamp.
    pub webhook_tolerance_seconds: i64,

    pub request_timeout_seconds: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            publishable_key: String::new(),
            webhook_secret: String::new(),
            pro_price_id: String::new(),
            enterprise_price_id: String::new(),
            webhook_tolerance_seconds: 300,
            request_timeout_seconds: 30,
        }
    }
}

impl StripeConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    #[must_use]
    pub fn price_id_for(&self, tier: SubscriptionTier) -> Option<&str> {
        let id = match tier {
            SubscriptionTier::Free => return None,
            SubscriptionTier::Pro => &self.pro_price_id,
            SubscriptionTier::Enterprise => &self.enterprise_price_id,
        };
        (!id.is_empty()).then_some(id.as_str())
    }

    /// Maps a billing price back to the tier it sells.
    #[must_use]
    pub fn tier_for_price(&self, price_id: &str) -> Option<SubscriptionTier> {
        if price_id.is_empty() {
            None
        } else if price_id == self.pro_price_id {
            Some(SubscriptionTier::Pro)
        } else if price_id == self.enterprise_price_id {
            Some(SubscriptionTier::Enterprise)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub anthropic_api_key: String,

    pub anthropic_base_url: String,

    pub text_model: String,

    pub max_output_tokens: u32,

    pub temperature: f32,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,

    pub openai_base_url: String,

    pub image_model: String,

    pub transcription_model: String,

    /// Request timeout in seconds (default: 120)
    pub request_timeout_seconds: u64,

    /// Longest accepted source text, in characters.
    pub max_input_chars: usize,

    /// Largest accepted audio upload, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            anthropic_base_url: constants::ANTHROPIC_API_BASE.to_string(),
            text_model: "claude-3-5-sonnet-latest".to_string(),
            max_output_tokens: 4096,
            temperature: 0.7,
            openai_api_key: String::new(),
            openai_base_url: constants::OPENAI_API_BASE.to_string(),
            image_model: "dall-e-3".to_string(),
            transcription_model: "whisper-1".to_string(),
            request_timeout_seconds: 120,
            max_input_chars: 50_000,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub free_monthly_tokens: i32,

    pub pro_monthly_tokens: i32,

    pub enterprise_monthly_tokens: i32,

    pub image_cost: i32,

    pub repurpose_cost: i32,

    /// Cron expression (with seconds) for the monthly rollover job.
    pub reset_cron: String,

    pub reset_job_enabled: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            free_monthly_tokens: constants::FREE_MONTHLY_TOKENS,
            pro_monthly_tokens: constants::PRO_MONTHLY_TOKENS,
            enterprise_monthly_tokens: constants::ENTERPRISE_MONTHLY_TOKENS,
            image_cost: constants::IMAGE_GENERATION_COST,
            repurpose_cost: constants::REPURPOSE_COST,
            reset_cron: "0 0 0 1 * *".to_string(),
            reset_job_enabled: true,
        }
    }
}

impl TokenConfig {
    #[must_use]
    pub const fn allowance_for(&self, tier: SubscriptionTier) -> i32 {
        match tier {
            SubscriptionTier::Free => self.free_monthly_tokens,
            SubscriptionTier::Pro => self.pro_monthly_tokens,
            SubscriptionTier::Enterprise => self.enterprise_monthly_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "repurposely".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            generation: GenerationConfig::default(),
            tokens: TokenConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets and deployment-specific values come from the environment when set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.general.database_url = v;
        }
        if let Some(v) = get("RUST_LOG_FORMAT") {
            self.general.log_format = v;
        }
        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = get("SITE_URL").or_else(|| get("NEXT_PUBLIC_SITE_URL")) {
            self.server.site_url = v;
        }
        if let Some(v) = get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL")) {
            self.auth.supabase_url = v;
        }
        if let Some(v) = get("SUPABASE_ANON_KEY").or_else(|| get("NEXT_PUBLIC_SUPABASE_ANON_KEY")) {
            self.auth.anon_key = v;
        }
        if let Some(v) = get("SUPABASE_SERVICE_ROLE_KEY") {
            self.auth.service_role_key = v;
        }
        if let Some(v) = get("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Some(v) =
            get("STRIPE_PUBLISHABLE_KEY").or_else(|| get("NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY"))
        {
            self.stripe.publishable_key = v;
        }
        if let Some(v) = get("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Some(v) = get("STRIPE_PRO_PRICE_ID") {
            self.stripe.pro_price_id = v;
        }
        if let Some(v) = get("STRIPE_ENTERPRISE_PRICE_ID") {
            self.stripe.enterprise_price_id = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.generation.anthropic_api_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.generation.openai_api_key = v;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("repurposely").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".repurposely").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.trim().is_empty() {
            anyhow::bail!("general.database_url cannot be empty");
        }

        if self.tokens.free_monthly_tokens < 0 {
            anyhow::bail!("tokens.free_monthly_tokens cannot be negative");
        }

        if self.tokens.pro_monthly_tokens <= 0 || self.tokens.enterprise_monthly_tokens <= 0 {
            anyhow::bail!("Paid tiers must have a positive monthly token allowance");
        }

        if self.tokens.image_cost <= 0 {
            anyhow::bail!("tokens.image_cost must be > 0");
        }

        if self.tokens.repurpose_cost <= 0 {
            anyhow::bail!("tokens.repurpose_cost must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("min_db_connections cannot exceed max_db_connections");
        }

        Ok(())
    }

    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.server.admin_user_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tokens.image_cost, 10);
        assert_eq!(config.tokens.allowance_for(SubscriptionTier::Free), 50);
        assert!(config.tokens.allowance_for(SubscriptionTier::Pro) > 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_hides_empty_secrets() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[tokens]"));
        assert!(!toml_str.contains("secret_key"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [tokens]
            image_cost = 25
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.tokens.image_cost, 25);
        assert_eq!(config.tokens.free_monthly_tokens, 50);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("NEXT_PUBLIC_SITE_URL", "https://repurposely.app"),
            ("PORT", "8080"),
            ("OPENAI_API_KEY", "   "),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.stripe.secret_key, "sk_test_123");
        assert!(config.stripe.is_configured());
        assert_eq!(config.auth.supabase_url, "https://project.supabase.co");
        assert_eq!(config.server.site_url, "https://repurposely.app");
        assert_eq!(config.server.port, 8080);
        assert!(config.generation.openai_api_key.is_empty());
    }

    #[test]
    fn test_price_tier_mapping() {
        let mut stripe = StripeConfig::default();
        assert_eq!(stripe.price_id_for(SubscriptionTier::Pro), None);

        stripe.pro_price_id = "price_pro".to_string();
        stripe.enterprise_price_id = "price_ent".to_string();

        assert_eq!(stripe.price_id_for(SubscriptionTier::Pro), Some("price_pro"));
        assert_eq!(stripe.price_id_for(SubscriptionTier::Free), None);
        assert_eq!(stripe.tier_for_price("price_ent"), Some(SubscriptionTier::Enterprise));
        assert_eq!(stripe.tier_for_price("price_other"), None);
        assert_eq!(stripe.tier_for_price(""), None);
    }

    #[test]
    fn test_validate_rejects_zero_image_cost() {
        let mut config = Config::default();
        config.tokens.image_cost = 0;
        assert!(config.validate().is_err());
    }
}
