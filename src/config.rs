//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再叠加 `--config` 指定的文件，最后用环境变量 `PLOT__*` 覆盖
//! （双下划线表示嵌套，如 `PLOT__PLOT__POWER_THRESHOLD=300`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::MachineSettings;
use crate::script::ArityPolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub plot: PlotSection,
    pub script: ScriptSection,
    pub notify: NotifySection,
    pub server: ServerSection,
    pub logging: LoggingSection,
}

/// [plot] 段：电源阈值、强制单位、校准步长、轮询间隔
#[derive(Debug, Clone, Deserialize)]
pub struct PlotSection {
    #[serde(default = "default_power_threshold")]
    pub power_threshold: i64,
    #[serde(default = "default_forced_units")]
    pub forced_units: i64,
    #[serde(default = "default_walk_step_mm")]
    pub walk_step_mm: f64,
    /// 绘图中每个 Tick 的轮询超时（毫秒）
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// 等待按键状态下的轮询超时（毫秒）
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    #[serde(default = "default_home_macro")]
    pub home_macro: String,
    #[serde(default = "default_message_history")]
    pub message_history: usize,
}

fn default_power_threshold() -> i64 {
    276
}

fn default_forced_units() -> i64 {
    2
}

fn default_walk_step_mm() -> f64 {
    0.1
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_idle_poll_ms() -> u64 {
    500
}

fn default_home_macro() -> String {
    "go_home".to_string()
}

fn default_message_history() -> usize {
    200
}

impl Default for PlotSection {
    fn default() -> Self {
        Self {
            power_threshold: default_power_threshold(),
            forced_units: default_forced_units(),
            walk_step_mm: default_walk_step_mm(),
            tick_interval_ms: default_tick_interval_ms(),
            idle_poll_ms: default_idle_poll_ms(),
            home_macro: default_home_macro(),
            message_history: default_message_history(),
        }
    }
}

impl PlotSection {
    pub fn machine_settings(&self) -> MachineSettings {
        MachineSettings {
            power_threshold: self.power_threshold,
            forced_units: self.forced_units,
            walk_step_mm: self.walk_step_mm,
            home_macro: self.home_macro.clone(),
            message_history: self.message_history,
        }
    }
}

/// [script] 段：参数个数策略、宏分隔符
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSection {
    /// 多余参数是否报错
    #[serde(default)]
    pub strict_arity: bool,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "|".to_string()
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            strict_arity: false,
            separator: default_separator(),
        }
    }
}

impl ScriptSection {
    pub fn arity_policy(&self) -> ArityPolicy {
        if self.strict_arity {
            ArityPolicy::Strict
        } else {
            ArityPolicy::Permissive
        }
    }
}

/// [notify] 段：webhook 地址（命令行参数优先）
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    pub webhook: Option<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_notify_timeout_secs() -> u64 {
    10
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            webhook: None,
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

/// [server] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:50051".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// [logging] 段：TUI 日志文件
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("plot-director.log")
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 PLOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PLOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLOT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 加载失败时记录警告并使用默认值
pub fn load_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        AppConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.plot.power_threshold, 276);
        assert_eq!(cfg.plot.forced_units, 2);
        assert_eq!(cfg.plot.home_macro, "go_home");
        assert_eq!(cfg.script.separator, "|");
        assert_eq!(cfg.script.arity_policy(), ArityPolicy::Permissive);
        assert_eq!(cfg.server.bind, "0.0.0.0:50051");
        assert!(cfg.notify.webhook.is_none());
    }

    #[test]
    fn test_file_overrides_and_missing_keys_default() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[plot]\npower_threshold = 300\n\n[script]\nstrict_arity = true").unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.plot.power_threshold, 300);
        assert_eq!(cfg.plot.walk_step_mm, 0.1);
        assert_eq!(cfg.script.arity_policy(), ArityPolicy::Strict);

        let settings = cfg.plot.machine_settings();
        assert_eq!(settings.power_threshold, 300);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("PLOT__SERVER__BIND", "127.0.0.1:6000");
        let cfg = load_config(None).unwrap();
        std::env::remove_var("PLOT__SERVER__BIND");
        assert_eq!(cfg.server.bind, "127.0.0.1:6000");
    }
}
