// ==========================================
// 活动资源分配引擎 - 资源请求
// ==========================================
// 职责: 一次资源请求的数据记录（需求/可用/实际提供/价值）
// 红线: 0 <= provided <= available；available 每次检查重新计算，不累加
// ==========================================

use crate::domain::labour::{LabourGroup, LabourLimits};
use crate::domain::types::CompanionKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// ActivityId - 活动唯一标识
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub Uuid);

impl ActivityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==========================================
// ResourceKind - 资源类别
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    /// 劳动力池（按个体分配）
    Labour,
    /// 通用库存资源（按名称查找）
    Stock(String),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Labour => write!(f, "Labour"),
            ResourceKind::Stock(name) => write!(f, "{}", name),
        }
    }
}

// ==========================================
// RequestOwner - 请求归属
// ==========================================
// 用于查找短缺策略；活动本身或其伴生组件（按下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOwner {
    Activity(ActivityId),
    Companion { activity: ActivityId, index: usize },
}

impl RequestOwner {
    pub fn activity_id(&self) -> ActivityId {
        match self {
            RequestOwner::Activity(id) => *id,
            RequestOwner::Companion { activity, .. } => *activity,
        }
    }
}

/// 产生请求的伴生组件标识 (类型, 标识符, 度量)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionModelDetails {
    pub kind: CompanionKind,
    pub identifier: String,
    pub measure: String,
}

// ==========================================
// ResourceRequest - 资源请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    // ===== 目标资源 =====
    pub resource_type: Option<ResourceKind>, // None 表示未跟踪资源
    pub category: String,                    // 交易类别

    // ===== 数量 =====
    pub required: f64,
    pub available: f64,
    pub provided: f64,
    pub value: f64, // provided × 单价

    // ===== 劳动力筛选 =====
    pub filter_details: Vec<LabourGroup>,
    pub labour_limits: Option<LabourLimits>, // 筛选组所属的劳动力需求上限

    // ===== 归属 =====
    pub activity_model: Option<RequestOwner>,
    pub companion_model_details: Option<CompanionModelDetails>,
    pub batch_id: Option<Uuid>,

    // ===== 转换 =====
    pub allow_transmutation: bool,
    pub transmutation_possible: bool,
}

impl ResourceRequest {
    /// 创建请求（其余字段为默认值）
    pub fn new(resource_type: Option<ResourceKind>, required: f64) -> Self {
        Self {
            resource_type,
            category: String::new(),
            required: required.max(0.0),
            available: 0.0,
            provided: 0.0,
            value: 0.0,
            filter_details: Vec::new(),
            labour_limits: None,
            activity_model: None,
            companion_model_details: None,
            batch_id: None,
            allow_transmutation: false,
            transmutation_possible: false,
        }
    }

    /// 库存资源请求
    pub fn stock(name: impl Into<String>, required: f64) -> Self {
        Self::new(Some(ResourceKind::Stock(name.into())), required)
    }

    /// 劳动力请求
    pub fn labour(required: f64) -> Self {
        Self::new(Some(ResourceKind::Labour), required)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_owner(mut self, owner: RequestOwner) -> Self {
        self.activity_model = Some(owner);
        self
    }

    pub fn with_filters(mut self, groups: Vec<LabourGroup>) -> Self {
        self.filter_details = groups;
        self
    }

    pub fn allowing_transmutation(mut self) -> Self {
        self.allow_transmutation = true;
        self
    }

    /// 当前短缺量（required - available，不小于 0）
    pub fn shortfall(&self) -> f64 {
        (self.required - self.available).max(0.0)
    }

    /// 是否是劳动力请求
    pub fn is_labour(&self) -> bool {
        matches!(self.resource_type, Some(ResourceKind::Labour))
    }

    /// 库存资源名称（非库存请求返回 None）
    pub fn stock_name(&self) -> Option<&str> {
        match &self.resource_type {
            Some(ResourceKind::Stock(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// 可用比例（required 为 0 时视为 1）
    pub fn available_proportion(&self) -> f64 {
        if self.required <= 0.0 {
            return 1.0;
        }
        self.available / self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_clamps_negative_required() {
        let request = ResourceRequest::stock("Hay", -3.0);
        assert_eq!(request.required, 0.0);
        assert_eq!(request.stock_name(), Some("Hay"));
        assert!(!request.is_labour());
    }

    #[test]
    fn test_shortfall_and_proportion() {
        let mut request = ResourceRequest::labour(10.0);
        request.available = 4.0;
        assert_eq!(request.shortfall(), 6.0);
        assert!((request.available_proportion() - 0.4).abs() < 1e-9);

        let empty = ResourceRequest::labour(0.0);
        assert_eq!(empty.available_proportion(), 1.0);
    }
}
