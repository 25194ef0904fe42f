// ==========================================
// 活动资源分配引擎 - 引擎层
// ==========================================
// 职责: 每个时间步的资源准入与分配协议
// 流程: 活动树门控 → 准备 → 请求 → 检查/转换 → 调整
//       → 短缺上报 → 扣减 → 执行 → 状态上报
// 红线: 可恢复短缺不走错误通道；致命错误终止整个运行
// ==========================================

pub mod activity;
pub mod behaviors;
pub mod companion;
pub mod companions;
pub mod error;
pub mod events;
pub mod labour_allocator;
pub mod math;
pub mod shortfall;
pub mod timer;
pub mod transmutation;
pub mod tree;

// 重导出核心引擎
pub use activity::{
    Activity, ActivityBehavior, AdjustOutcome, AllocationContext, RequestContext, TaskContext,
    TaskOutcome,
};
pub use behaviors::{ActivityFolder, CompanionMetric, FixedDemand, FixedDemandBehavior};
pub use companion::{
    CompanionComponent, CompanionKey, CompanionLabels, CompanionModelRegistry,
    CompanionValidationWarning, CompanionValues, COMPANION_PROBLEM_VALUE,
};
pub use companions::{ActivityFee, LabourRequirement};
pub use error::{EngineError, EngineResult};
pub use events::{
    ActivityPerformedEvent, ActivityReporter, NoOpListener, PerformedListener, RecordingListener,
    ShortfallEvent, ShortfallListener,
};
pub use labour_allocator::{LabourAllocation, LabourAllocator};
pub use shortfall::{minimum_shortfall_proportion, scale_to_minimum_shortfall, ShortfallProportion};
pub use timer::{ActivityTimer, IntervalTimer, MonthRangeTimer};
pub use transmutation::{
    NoTransmutation, TransmutationPass, TransmutationProvider, TransmutationRule,
    TransmutationRules,
};
pub use tree::{ActivityTree, NodeId, TimestepSummary};
