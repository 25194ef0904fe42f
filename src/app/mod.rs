// ==========================================
// 活动资源分配引擎 - 应用层
// ==========================================
// 职责: 场景运行器，连接配置与引擎
// ==========================================

pub mod runner;

// 重导出
pub use runner::{RunSummary, RunnerError, SimulationRunner, StepReport};
