// ==========================================
// 活动资源分配引擎 - 配置层
// ==========================================
// 职责: 引擎配置（默认值 → 文件 → 环境变量）与场景文件
// ==========================================

pub mod engine_config;
pub mod scenario;

// 重导出
pub use engine_config::{config_keys, default_config_path, ConfigError, ConfigResult, EngineConfig};
pub use scenario::{ActivitySpec, CompanionSpec, Scenario, ScenarioSpec, TimerSpec};
