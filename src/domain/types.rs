// ==========================================
// 活动资源分配引擎 - 领域类型定义
// ==========================================
// 职责: 活动状态、短缺处理策略、分配方式、伴生组件类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 活动状态 (Activity Status)
// ==========================================
// 每个时间步开始时重置为 Ignored
// Timer 仅用于上报到期计时器，不作为活动本身状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Ignored,   // 未执行（禁用或未到期）
    NotNeeded, // 已准备，无需资源
    Success,   // 全部资源满足并执行
    Partial,   // 部分资源满足
    Warning,   // 伴生组件报告问题
    Skipped,   // 因短缺跳过
    Critical,  // 短缺导致终止
    Timer,     // 计时器到期上报
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityStatus::Ignored => write!(f, "IGNORED"),
            ActivityStatus::NotNeeded => write!(f, "NOT_NEEDED"),
            ActivityStatus::Success => write!(f, "SUCCESS"),
            ActivityStatus::Partial => write!(f, "PARTIAL"),
            ActivityStatus::Warning => write!(f, "WARNING"),
            ActivityStatus::Skipped => write!(f, "SKIPPED"),
            ActivityStatus::Critical => write!(f, "CRITICAL"),
            ActivityStatus::Timer => write!(f, "TIMER"),
        }
    }
}

// ==========================================
// 短缺处理策略 (Shortfall Policy)
// ==========================================
// 当 required > available 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortfallPolicy {
    #[default]
    ReportErrorAndStop,           // 报错并终止模拟
    SkipActivity,                 // 跳过活动
    UseAvailableResources,        // 使用可用资源
    UseAvailableWithImplications, // 使用可用资源，并按短缺比例影响结果
}

impl ShortfallPolicy {
    /// 是否允许部分资源
    pub fn allows_partial(&self) -> bool {
        matches!(
            self,
            ShortfallPolicy::UseAvailableResources | ShortfallPolicy::UseAvailableWithImplications
        )
    }
}

impl fmt::Display for ShortfallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortfallPolicy::ReportErrorAndStop => write!(f, "REPORT_ERROR_AND_STOP"),
            ShortfallPolicy::SkipActivity => write!(f, "SKIP_ACTIVITY"),
            ShortfallPolicy::UseAvailableResources => write!(f, "USE_AVAILABLE_RESOURCES"),
            ShortfallPolicy::UseAvailableWithImplications => {
                write!(f, "USE_AVAILABLE_WITH_IMPLICATIONS")
            }
        }
    }
}

// ==========================================
// 资源分配方式 (Allocation Style)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStyle {
    #[default]
    Automatic, // 时间步事件自动触发
    Manual,    // 等待上级显式调用
}

// ==========================================
// 劳动力上限口径 (Labour Limit Style)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabourLimitStyle {
    #[default]
    AsDaysRequired,         // 上限为固定天数
    AsProportionOfRequired, // 上限为需求天数的比例
}

// ==========================================
// 伴生组件类型 (Companion Kind)
// ==========================================
// 封闭集合：未登记的类型名一律拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompanionKind {
    RuminantGroup,
    RuminantFeedGroup,
    LabourRequirement,
    ActivityFee,
    RuminantTrucking,
    GreenhouseGasActivityEmission,
    Relationship,
}

impl CompanionKind {
    /// 全部支持的伴生组件类型
    pub const ALL: [CompanionKind; 7] = [
        CompanionKind::RuminantGroup,
        CompanionKind::RuminantFeedGroup,
        CompanionKind::LabourRequirement,
        CompanionKind::ActivityFee,
        CompanionKind::RuminantTrucking,
        CompanionKind::GreenhouseGasActivityEmission,
        CompanionKind::Relationship,
    ];

    /// 从组件类型名解析（含别名）
    ///
    /// # 返回
    /// - `None`: 不支持的类型
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "RuminantGroup" | "RuminantGroupLinked" => Some(CompanionKind::RuminantGroup),
            "RuminantFeedGroup" | "RuminantFeedGroupMonthly" => {
                Some(CompanionKind::RuminantFeedGroup)
            }
            "LabourRequirement" => Some(CompanionKind::LabourRequirement),
            "ActivityFee" => Some(CompanionKind::ActivityFee),
            "RuminantTrucking" => Some(CompanionKind::RuminantTrucking),
            "GreenhouseGasActivityEmission" => Some(CompanionKind::GreenhouseGasActivityEmission),
            "Relationship" => Some(CompanionKind::Relationship),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanionKind::RuminantGroup => "RuminantGroup",
            CompanionKind::RuminantFeedGroup => "RuminantFeedGroup",
            CompanionKind::LabourRequirement => "LabourRequirement",
            CompanionKind::ActivityFee => "ActivityFee",
            CompanionKind::RuminantTrucking => "RuminantTrucking",
            CompanionKind::GreenhouseGasActivityEmission => "GreenhouseGasActivityEmission",
            CompanionKind::Relationship => "Relationship",
        }
    }
}

impl fmt::Display for CompanionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 性别 (Sex)
// ==========================================
// 劳动力筛选条件使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
}
