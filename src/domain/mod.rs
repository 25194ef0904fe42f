// ==========================================
// 活动资源分配引擎 - 领域模型层
// ==========================================
// 职责: 资源请求、劳动力、库存资源与基础枚举
// 红线: 不含协议流程（检查/扣减顺序由引擎层负责）
// ==========================================

pub mod labour;
pub mod request;
pub mod resource;
pub mod types;

// 重导出核心类型
pub use labour::{
    CalculatedLimits, LabourFilter, LabourGroup, LabourIndividual, LabourLimits, LabourPool,
};
pub use request::{ActivityId, CompanionModelDetails, RequestOwner, ResourceKind, ResourceRequest};
pub use resource::{ResourcePool, ResourcesHolder, StockResource};
pub use types::{
    ActivityStatus, AllocationStyle, CompanionKind, LabourLimitStyle, Sex, ShortfallPolicy,
};
