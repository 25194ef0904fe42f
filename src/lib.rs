// ==========================================
// 活动资源分配引擎 - 核心库
// ==========================================
// 系统定位: 按时间步的资源准入与分配引擎
// 核心流程: 活动请求 → 检查/转换 → 短缺策略 → 扣减 → 执行
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 资源协议
pub mod engine;

// 配置层 - 引擎配置与场景
pub mod config;

// 应用层 - 场景运行器
pub mod app;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActivityStatus, AllocationStyle, CompanionKind, LabourLimitStyle, ShortfallPolicy,
};

// 领域实体
pub use domain::{
    LabourGroup, LabourIndividual, LabourLimits, LabourPool, ResourceKind, ResourcePool,
    ResourceRequest, ResourcesHolder, StockResource,
};

// 引擎
pub use engine::{
    Activity, ActivityBehavior, ActivityReporter, ActivityTree, EngineError, EngineResult,
    LabourAllocator, TransmutationProvider,
};

// 配置
pub use config::{EngineConfig, ScenarioSpec};

// 运行器
pub use app::SimulationRunner;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "活动资源分配引擎";
