use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub hosts: HostsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (socket, preferences)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Timer periods used by the measurement pipeline and the session runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Window resize events are throttled to one per this many milliseconds
    #[serde(default = "default_resize_throttle")]
    pub resize_throttle_ms: u64,
    /// Topbar measurement requests are throttled to one per this many milliseconds
    #[serde(default = "default_topbar_throttle")]
    pub topbar_throttle_ms: u64,
    /// Safety re-measurement period in seconds
    #[serde(default = "default_periodic_check")]
    pub periodic_check_secs: u64,
    /// Delay before the single re-detection after a detection failure
    #[serde(default = "default_detection_retry")]
    pub detection_retry_ms: u64,
    /// Period of the ticker started by DOM mutations
    #[serde(default = "default_mutation_tick")]
    pub mutation_tick_ms: u64,
    /// Number of ticks run after the last mutation
    #[serde(default = "default_mutation_ticks")]
    pub mutation_ticks: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            resize_throttle_ms: default_resize_throttle(),
            topbar_throttle_ms: default_topbar_throttle(),
            periodic_check_secs: default_periodic_check(),
            detection_retry_ms: default_detection_retry(),
            mutation_tick_ms: default_mutation_tick(),
            mutation_ticks: default_mutation_ticks(),
        }
    }
}

impl TimingConfig {
    pub fn resize_throttle(&self) -> Duration {
        Duration::from_millis(self.resize_throttle_ms)
    }

    pub fn topbar_throttle(&self) -> Duration {
        Duration::from_millis(self.topbar_throttle_ms)
    }

    pub fn periodic_check(&self) -> Duration {
        Duration::from_secs(self.periodic_check_secs)
    }

    pub fn detection_retry(&self) -> Duration {
        Duration::from_millis(self.detection_retry_ms)
    }

    pub fn mutation_tick(&self) -> Duration {
        Duration::from_millis(self.mutation_tick_ms)
    }
}

/// Easing curve for smooth scrolling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    None,
    Linear,
    #[default]
    Cubic,
    Quintic,
    EaseOut,
}

/// Smooth scroll-to-heading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Animate scroll-to-heading instead of jumping
    #[serde(default = "default_true")]
    pub smooth_enabled: bool,
    /// Animation duration in milliseconds
    #[serde(default = "default_animation_duration")]
    pub animation_duration_ms: u64,
    /// Easing curve
    #[serde(default)]
    pub easing: EasingType,
    /// Animation frames per second
    #[serde(default = "default_animation_fps")]
    pub animation_fps: u32,
    /// Gap left above a heading after scrolling to it, on top of the topbar
    #[serde(default = "default_top_margin")]
    pub top_margin: f64,
    /// Gap used on feed-reader hosts to clear their sticky chrome
    #[serde(default = "default_feed_reader_top_margin")]
    pub feed_reader_top_margin: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            smooth_enabled: default_true(),
            animation_duration_ms: default_animation_duration(),
            easing: EasingType::default(),
            animation_fps: default_animation_fps(),
            top_margin: default_top_margin(),
            feed_reader_top_margin: default_feed_reader_top_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// A heading counts as passed only once its top is this far above the
    /// visible area boundary
    #[serde(default = "default_visibility_margin")]
    pub visibility_margin: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            visibility_margin: default_visibility_margin(),
        }
    }
}

/// Host pages that get special treatment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Feed-reader domains (matched as substrings of the page domain)
    #[serde(default = "default_feed_reader_domains")]
    pub feed_reader_domains: Vec<String>,
    /// Medium domain (matched as a substring of the page domain)
    #[serde(default = "default_medium_domain")]
    pub medium_domain: String,
    /// Path pattern of a Medium article page
    #[serde(default = "default_medium_article_pattern")]
    pub medium_article_pattern: String,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            feed_reader_domains: default_feed_reader_domains(),
            medium_domain: default_medium_domain(),
            medium_article_pattern: default_medium_article_pattern(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readtoc")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_resize_throttle() -> u64 {
    100
}

fn default_topbar_throttle() -> u64 {
    50
}

fn default_periodic_check() -> u64 {
    60
}

fn default_detection_retry() -> u64 {
    500
}

fn default_mutation_tick() -> u64 {
    300
}

fn default_mutation_ticks() -> u32 {
    4
}

fn default_animation_duration() -> u64 {
    150
}

fn default_animation_fps() -> u32 {
    60
}

fn default_top_margin() -> f64 {
    10.0
}

fn default_feed_reader_top_margin() -> f64 {
    50.0
}

fn default_visibility_margin() -> f64 {
    15.0
}

fn default_feed_reader_domains() -> Vec<String> {
    vec!["inoreader.com".to_string(), "innoreader.com".to_string()]
}

fn default_medium_domain() -> String {
    "medium.com".to_string()
}

fn default_medium_article_pattern() -> String {
    "-[0-9a-z]{10,}$".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/readtoc/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("readtoc")
            .join("config.toml")
    }

    /// Get the Unix socket path for the command server
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join("readtoc.sock")
    }

    /// Get the persisted preferences file path
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir().join("preferences.json")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_tuned_constants() {
        let config = AppConfig::default();
        assert_eq!(config.resolver.visibility_margin, 15.0);
        assert_eq!(config.scroll.top_margin, 10.0);
        assert_eq!(config.scroll.feed_reader_top_margin, 50.0);
        assert_eq!(config.timing.resize_throttle_ms, 100);
        assert_eq!(config.timing.topbar_throttle_ms, 50);
        assert_eq!(config.timing.periodic_check(), Duration::from_secs(60));
        assert_eq!(config.timing.detection_retry(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [scroll]
            smooth_enabled = false
            easing = "ease_out"

            [hosts]
            feed_reader_domains = ["reader.example"]
            "#,
        )
        .unwrap();

        assert!(!config.scroll.smooth_enabled);
        assert_eq!(config.scroll.easing, EasingType::EaseOut);
        assert_eq!(config.scroll.animation_duration_ms, 150);
        assert_eq!(config.hosts.feed_reader_domains, vec!["reader.example"]);
        assert_eq!(config.hosts.medium_domain, "medium.com");
        assert_eq!(config.timing.mutation_ticks, 4);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[scroll]\nanimation_fps = \"fast\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_paths_live_in_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/tmp/readtoc-test");
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/readtoc-test/readtoc.sock"));
        assert_eq!(
            config.preferences_path(),
            PathBuf::from("/tmp/readtoc-test/preferences.json")
        );
    }
}
