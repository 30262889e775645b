use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorConfig {
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub settle: SettleConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Distance in pixels kept between the top of the viewport and the destination
    #[serde(default)]
    pub offset: f64,
    /// Primary animation duration in milliseconds
    #[serde(default = "default_speed")]
    pub speed_ms: u64,
    /// Frame rate of the built-in frame scheduler
    #[serde(default = "default_animation_fps")]
    pub animation_fps: u32,
    /// Force `auto` scroll behavior on the container while an animation runs
    #[serde(default = "default_true")]
    pub disable_ambient_smooth_scroll: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            offset: 0.0,
            speed_ms: default_speed(),
            animation_fps: default_animation_fps(),
            disable_ambient_smooth_scroll: default_true(),
        }
    }
}

impl ScrollConfig {
    /// Primary animation duration
    #[inline]
    pub fn speed(&self) -> Duration {
        Duration::from_millis(self.speed_ms)
    }

    /// Interval between two frames of the built-in scheduler
    #[inline]
    pub fn frame_interval(&self) -> Duration {
        if self.animation_fps == 0 {
            Duration::from_millis(16) // ~60fps fallback
        } else {
            Duration::from_millis(1000 / self.animation_fps as u64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Re-measure the destination once the primary animation finished
    #[serde(default = "default_true")]
    pub micro_adjust: bool,
    /// Drift in pixels tolerated before a corrective animation runs
    #[serde(default = "default_micro_adjust_threshold")]
    pub micro_adjust_threshold: f64,
    /// Duration of the corrective animation in milliseconds
    #[serde(default = "default_micro_adjust_duration")]
    pub micro_adjust_duration_ms: u64,
    /// Watch the layout after scrolling and correct once it went quiet
    #[serde(default)]
    pub post_settle_adjust: bool,
    /// Upper bound of the monitoring window in milliseconds
    #[serde(default = "default_post_settle_max_wait")]
    pub post_settle_max_wait_ms: u64,
    /// Layout must stay unchanged this long (ms) before the final correction
    #[serde(default = "default_post_settle_quiet_window")]
    pub post_settle_quiet_window_ms: u64,
    /// Delay (ms) between the end of the animation and the start of monitoring
    #[serde(default = "default_post_settle_initial_delay")]
    pub post_settle_initial_delay_ms: u64,
    /// Period (ms) of the monitor's threshold check and polling fallback
    #[serde(default = "default_post_settle_check_interval")]
    pub post_settle_check_interval_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            micro_adjust: default_true(),
            micro_adjust_threshold: default_micro_adjust_threshold(),
            micro_adjust_duration_ms: default_micro_adjust_duration(),
            post_settle_adjust: false,
            post_settle_max_wait_ms: default_post_settle_max_wait(),
            post_settle_quiet_window_ms: default_post_settle_quiet_window(),
            post_settle_initial_delay_ms: default_post_settle_initial_delay(),
            post_settle_check_interval_ms: default_post_settle_check_interval(),
        }
    }
}

impl SettleConfig {
    pub fn micro_adjust_duration(&self) -> Duration {
        Duration::from_millis(self.micro_adjust_duration_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.post_settle_max_wait_ms)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.post_settle_quiet_window_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.post_settle_initial_delay_ms)
    }

    pub fn check_interval(&self) -> Duration {
        // a zero period would make tokio's interval panic
        Duration::from_millis(self.post_settle_check_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Libraries that change page height once they have instantiated
    #[serde(default)]
    pub height_modifying_libraries: Vec<String>,
    /// Delay between two readiness polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum number of polls before scrolling anyway
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            height_modifying_libraries: Vec::new(),
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// How the page URL reflects the section scrolled to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    /// `#section`
    #[default]
    Hash,
    /// `?scrollto=section`
    Query,
    /// URL is left untouched
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default)]
    pub url: UrlMode,
    /// Scroll to the section named in the URL on back/forward navigation
    #[serde(default = "default_true")]
    pub popstate: bool,
    /// Send start/end lifecycle events
    #[serde(default = "default_true")]
    pub emit_events: bool,
    /// Log per-scroll diagnostics
    #[serde(default)]
    pub debug: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            url: UrlMode::default(),
            popstate: default_true(),
            emit_events: default_true(),
            debug: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_speed() -> u64 {
    1500
}

fn default_animation_fps() -> u32 {
    60
}

fn default_micro_adjust_threshold() -> f64 {
    2.0
}

fn default_micro_adjust_duration() -> u64 {
    150
}

fn default_post_settle_max_wait() -> u64 {
    3000
}

fn default_post_settle_quiet_window() -> u64 {
    400
}

fn default_post_settle_initial_delay() -> u64 {
    100
}

fn default_post_settle_check_interval() -> u64 {
    100
}

fn default_poll_interval() -> u64 {
    100
}

fn default_max_polls() -> u32 {
    30 // 3 seconds at the default interval
}

impl AnchorConfig {
    /// Load configuration from the default path or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given path
    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/anchorto/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("anchorto")
            .join("config.toml")
    }

    /// Reject values the engine cannot animate with
    pub fn validate(&self) -> crate::Result<()> {
        if !self.scroll.offset.is_finite() {
            return Err(crate::Error::Config("scroll.offset must be finite".to_string()));
        }
        let threshold = self.settle.micro_adjust_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(crate::Error::Config(
                "settle.micro_adjust_threshold must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnchorConfig::default();
        assert_eq!(config.scroll.offset, 0.0);
        assert_eq!(config.scroll.speed_ms, 1500);
        assert_eq!(config.scroll.animation_fps, 60);
        assert!(config.scroll.disable_ambient_smooth_scroll);
        assert!(config.settle.micro_adjust);
        assert!(!config.settle.post_settle_adjust);
        assert_eq!(config.navigation.url, UrlMode::Hash);
        assert!(config.navigation.emit_events);
        assert!(config.readiness.height_modifying_libraries.is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnchorConfig = toml::from_str(
            r#"
            [scroll]
            speed_ms = 300
            offset = 50.0

            [navigation]
            url = "query"
            "#,
        )
        .unwrap();
        assert_eq!(config.scroll.speed(), Duration::from_millis(300));
        assert_eq!(config.scroll.offset, 50.0);
        assert_eq!(config.navigation.url, UrlMode::Query);
        assert!(config.navigation.popstate);
        assert_eq!(config.settle.micro_adjust_threshold, 2.0);
        assert_eq!(config.readiness.max_polls, 30);
    }

    #[test]
    fn test_frame_interval_fallback() {
        let mut config = ScrollConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        config.animation_fps = 0;
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        config.animation_fps = 30;
        assert_eq!(config.frame_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut config = AnchorConfig::default();
        config.settle.micro_adjust_threshold = -1.0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip_keeps_url_mode() {
        let mut config = AnchorConfig::default();
        config.navigation.url = UrlMode::None;
        let text = config.to_toml().unwrap();
        assert!(text.contains("url = \"none\""));
        let parsed: AnchorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.navigation.url, UrlMode::None);
    }
}
