//! 存储配置

use std::path::PathBuf;

/// 默认阈值：相似度 >= 90% 视为重复
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// 默认日志路径 `~/.nearline/lines.txt`
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nearline")
        .join("lines.txt")
}

/// 存储配置
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub threshold: f64,
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            threshold: DEFAULT_THRESHOLD,
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = var("NEARLINE_PATH") {
            if !v.trim().is_empty() {
                config.path = PathBuf::from(v);
            }
        }

        if let Some(v) = var("NEARLINE_THRESHOLD") {
            match v.trim().parse() {
                Ok(t) => config.threshold = t,
                Err(_) => tracing::warn!("Ignoring NEARLINE_THRESHOLD={:?}: not a number", v),
            }
        }

        if let Some(v) = var("NEARLINE_FSYNC") {
            match v.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "no" | "off" => config.fsync = false,
                "1" | "true" | "yes" | "on" => config.fsync = true,
                _ => tracing::warn!("Ignoring NEARLINE_FSYNC={:?}", v),
            }
        }

        config
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.threshold, 0.9);
        assert!(config.fsync);
        assert!(config.path.ends_with(".nearline/lines.txt"));
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = StoreConfig::from_vars(vars(&[
            ("NEARLINE_PATH", "/data/query/boolean-based.txt"),
            ("NEARLINE_THRESHOLD", "0.75"),
            ("NEARLINE_FSYNC", "false"),
        ]));

        assert_eq!(config.path, PathBuf::from("/data/query/boolean-based.txt"));
        assert_eq!(config.threshold, 0.75);
        assert!(!config.fsync);
    }

    #[test]
    fn test_from_vars_ignores_garbage() {
        let config = StoreConfig::from_vars(vars(&[
            ("NEARLINE_PATH", "   "),
            ("NEARLINE_THRESHOLD", "very similar"),
            ("NEARLINE_FSYNC", "maybe"),
        ]));

        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::default()
            .with_path("lines.txt")
            .with_threshold(1.0)
            .with_fsync(false);

        assert_eq!(config.path, PathBuf::from("lines.txt"));
        assert_eq!(config.threshold, 1.0);
        assert!(!config.fsync);
    }
}
