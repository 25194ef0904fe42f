// ==========================================
// 活动资源分配引擎 - 引擎配置
// ==========================================
// 职责: 引擎运行参数的加载、覆写与校验
// 加载顺序: 内置默认值 → JSON 配置文件（可选）→ 环境变量覆写
// ==========================================

use crate::domain::labour::LabourLimits;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

// ==========================================
// 配置错误
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置格式错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置项 {key} 无效: {message}")]
    Invalid { key: String, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// EngineConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 劳动力请求找不到所属需求时使用的合成上限
    pub default_labour_limits: LabourLimits,
    /// 活动未按短缺比例调整时是否告警
    pub warn_unscaled_shortfall: bool,
    /// 模拟起始日期（按月步进）
    pub start_date: NaiveDate,
    /// 时间步数
    pub timesteps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_labour_limits: LabourLimits::default(),
            warn_unscaled_shortfall: true,
            start_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            timesteps: 12,
        }
    }
}

impl EngineConfig {
    /// 加载配置
    ///
    /// # 参数
    /// - `path`: 显式配置文件路径；None 时依次尝试环境变量与默认路径
    ///
    /// 默认路径不存在时使用内置默认值
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(config_keys::ENV_CONFIG_PATH).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(p) => Self::from_file(&p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => {
                    debug!("未找到配置文件，使用内置默认值");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;
        info!(
            start_date = %config.start_date,
            timesteps = config.timesteps,
            "引擎配置加载完成"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "读取配置文件");
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 应用环境变量覆写
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(value) = std::env::var(config_keys::ENV_TIMESTEPS) {
            self.timesteps = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: config_keys::ENV_TIMESTEPS.to_string(),
                message: format!("无法解析为整数: {}", value),
            })?;
        }
        if let Ok(value) = std::env::var(config_keys::ENV_START_DATE) {
            self.start_date =
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
                    ConfigError::Invalid {
                        key: config_keys::ENV_START_DATE.to_string(),
                        message: format!("{} ({})", value, e),
                    }
                })?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.default_labour_limits;
        for (key, value) in [
            ("default_labour_limits.max_per_person", limits.max_per_person),
            ("default_labour_limits.min_per_person", limits.min_per_person),
            ("default_labour_limits.max_per_group", limits.max_per_group),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    message: format!("必须为非负有限数: {}", value),
                });
            }
        }
        if limits.min_per_person > limits.max_per_person {
            return Err(ConfigError::Invalid {
                key: "default_labour_limits.min_per_person".to_string(),
                message: "不能大于 max_per_person".to_string(),
            });
        }
        if self.timesteps == 0 {
            return Err(ConfigError::Invalid {
                key: "timesteps".to_string(),
                message: "至少为 1".to_string(),
            });
        }
        Ok(())
    }
}

/// 默认配置文件路径（用户配置目录）
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("activity-resource-engine").join("engine.json"))
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 配置文件路径
    pub const ENV_CONFIG_PATH: &str = "ACTIVITY_ENGINE_CONFIG";

    // 运行参数
    pub const ENV_TIMESTEPS: &str = "ACTIVITY_ENGINE_TIMESTEPS";
    pub const ENV_START_DATE: &str = "ACTIVITY_ENGINE_START_DATE";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_labour_limits.max_per_group, 10000.0);
        assert_eq!(config.default_labour_limits.max_per_person, 1000.0);
        assert!(config.warn_unscaled_shortfall);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"timesteps": 3, "start_date": "2026-07-01"}"#).unwrap();
        assert_eq!(config.timesteps, 3);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        assert!(config.warn_unscaled_shortfall);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"warn_unscaled_shortfall": false}}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(!config.warn_unscaled_shortfall);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/engine.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.timesteps = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.default_labour_limits.max_per_person = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
