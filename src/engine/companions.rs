// ==========================================
// 活动资源分配引擎 - 内置伴生组件
// ==========================================
// 职责:
// - LabourRequirement: 按父活动度量值生成劳动力请求
// - ActivityFee: 按父活动度量值生成费用（库存）请求
// ==========================================

use crate::domain::labour::{LabourGroup, LabourLimits};
use crate::domain::request::ResourceRequest;
use crate::domain::types::ShortfallPolicy;
use crate::engine::companion::CompanionComponent;
use crate::engine::math::is_positive;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_unit_size() -> f64 {
    1.0
}

// ==========================================
// LabourRequirement - 劳动力需求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabourRequirement {
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub measure: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 每单位所需天数
    pub days_per_unit: f64,
    /// 单位大小（度量值 / unit_size = 单位数）
    #[serde(default = "default_unit_size")]
    pub unit_size: f64,
    /// 是否按整单位向上取整
    #[serde(default)]
    pub whole_unit_blocks: bool,

    #[serde(default)]
    pub limits: LabourLimits,
    /// 筛选组链（只使用第一个作为根）
    #[serde(default)]
    pub filter_groups: Vec<LabourGroup>,
    #[serde(default)]
    pub policy: ShortfallPolicy,
    #[serde(default)]
    pub category: String,

    #[serde(skip)]
    pub days_performed: f64,
}

impl LabourRequirement {
    pub fn new(name: impl Into<String>, days_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            identifier: String::new(),
            measure: String::new(),
            enabled: true,
            days_per_unit,
            unit_size: 1.0,
            whole_unit_blocks: false,
            limits: LabourLimits::default(),
            filter_groups: Vec::new(),
            policy: ShortfallPolicy::default(),
            category: String::new(),
            days_performed: 0.0,
        }
    }

    /// 按度量值计算所需天数
    pub fn days_required(&self, metric: f64) -> f64 {
        let size = if is_positive(self.unit_size) {
            self.unit_size
        } else {
            1.0
        };
        let mut units = metric / size;
        if self.whole_unit_blocks {
            units = units.ceil();
        }
        (units * self.days_per_unit).max(0.0)
    }
}

impl CompanionComponent for LabourRequirement {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "LabourRequirement"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn measure(&self) -> &str {
        &self.measure
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn shortfall_policy(&self) -> Option<ShortfallPolicy> {
        Some(self.policy)
    }

    fn labour_limits(&self) -> Option<&LabourLimits> {
        Some(&self.limits)
    }

    fn prepare_for_timestep(&mut self) {
        self.days_performed = 0.0;
    }

    fn request_resources(&mut self, metric: f64) -> Vec<ResourceRequest> {
        let days = self.days_required(metric);
        if !is_positive(days) {
            return Vec::new();
        }
        let mut request = ResourceRequest::labour(days)
            .with_category(self.category.clone())
            .with_filters(self.filter_groups.clone());
        request.labour_limits = Some(self.limits);
        vec![request]
    }

    fn perform_tasks(&mut self, metric: f64) {
        self.days_performed = self.days_required(metric);
    }
}

// ==========================================
// ActivityFee - 活动费用
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFee {
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub measure: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 付款账户（库存资源名）
    pub account: String,
    /// 每单位费用
    pub amount_per_unit: f64,
    #[serde(default)]
    pub category: String,
    /// 是否允许以其他资源转换补足
    #[serde(default)]
    pub allow_transmutation: bool,
}

impl ActivityFee {
    pub fn new(name: impl Into<String>, account: impl Into<String>, amount_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            identifier: String::new(),
            measure: String::new(),
            enabled: true,
            account: account.into(),
            amount_per_unit,
            category: String::new(),
            allow_transmutation: false,
        }
    }
}

impl CompanionComponent for ActivityFee {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "ActivityFee"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn measure(&self) -> &str {
        &self.measure
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    // 费用没有自己的短缺策略，沿用父活动

    fn request_resources(&mut self, metric: f64) -> Vec<ResourceRequest> {
        let amount = metric * self.amount_per_unit;
        if !is_positive(amount) {
            return Vec::new();
        }
        let mut request =
            ResourceRequest::stock(self.account.clone(), amount).with_category(self.category.clone());
        request.allow_transmutation = self.allow_transmutation;
        vec![request]
    }
}
