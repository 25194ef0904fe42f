// ==========================================
// 活动资源分配引擎 - 通用活动逻辑
// ==========================================
// 职责: 由配置驱动的活动（固定需求 + 固定伴生度量值）
// 用途: 场景文件运行、集成测试
// ==========================================

use crate::domain::labour::LabourGroup;
use crate::domain::request::{ResourceKind, ResourceRequest};
use crate::domain::types::CompanionKind;
use crate::engine::activity::{
    ActivityBehavior, AdjustOutcome, RequestContext, TaskContext, TaskOutcome,
};
use crate::engine::companion::{CompanionLabels, COMPANION_PROBLEM_VALUE};
use crate::engine::shortfall::{scale_to_minimum_shortfall, ShortfallProportion};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 固定资源需求（每时间步，乘以区域系数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedDemand {
    /// None 表示未跟踪的资源类别
    pub resource: Option<ResourceKind>,
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub allow_transmutation: bool,
    #[serde(default)]
    pub filters: Vec<LabourGroup>,
}

impl FixedDemand {
    pub fn stock(name: impl Into<String>, amount: f64) -> Self {
        Self {
            resource: Some(ResourceKind::Stock(name.into())),
            amount,
            category: String::new(),
            allow_transmutation: false,
            filters: Vec::new(),
        }
    }

    pub fn labour(amount: f64) -> Self {
        Self {
            resource: Some(ResourceKind::Labour),
            ..Self::stock("", amount)
        }
    }

    pub fn untracked(amount: f64) -> Self {
        Self {
            resource: None,
            ..Self::stock("", amount)
        }
    }
}

/// 每时间步提供给伴生组件的度量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionMetric {
    pub kind: CompanionKind,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub measure: String,
    /// 负数表示报告问题
    pub value: f64,
}

impl CompanionMetric {
    pub fn new(kind: CompanionKind, identifier: &str, measure: &str, value: f64) -> Self {
        Self {
            kind,
            identifier: identifier.to_string(),
            measure: measure.to_string(),
            value,
        }
    }

    /// 表示父活动无法计算该度量值
    pub fn problem(kind: CompanionKind, identifier: &str, measure: &str) -> Self {
        Self::new(kind, identifier, measure, COMPANION_PROBLEM_VALUE)
    }
}

/// 不含任何逻辑的活动（文件夹），只用于组织子活动
#[derive(Debug, Clone, Default)]
pub struct ActivityFolder;

impl ActivityBehavior for ActivityFolder {
    fn perform_tasks(&mut self, _ctx: &TaskContext<'_>) -> TaskOutcome {
        TaskOutcome::NotNeeded
    }
}

// ==========================================
// FixedDemandBehavior
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FixedDemandBehavior {
    pub demands: Vec<FixedDemand>,
    pub companion_metrics: Vec<CompanionMetric>,
    pub companion_labels: BTreeMap<CompanionKind, CompanionLabels>,
    /// 是否按最小短缺比例缩减其余请求
    pub scale_on_shortfall: bool,

    // ===== 运行记录 =====
    pub last_prepared: Option<NaiveDate>,
    pub times_performed: u32,
    /// 最近一次执行时各请求实际提供量之和
    pub last_provided: f64,
}

impl FixedDemandBehavior {
    pub fn new(demands: Vec<FixedDemand>) -> Self {
        Self {
            demands,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: CompanionMetric) -> Self {
        self.companion_metrics.push(metric);
        self
    }

    pub fn with_labels(mut self, kind: CompanionKind, labels: CompanionLabels) -> Self {
        self.companion_labels.insert(kind, labels);
        self
    }

    pub fn scaling(mut self) -> Self {
        self.scale_on_shortfall = true;
        self
    }
}

impl ActivityBehavior for FixedDemandBehavior {
    fn handles_companions(&self) -> bool {
        !self.companion_labels.is_empty()
    }

    fn define_companion_labels(&self, kind: CompanionKind) -> Option<CompanionLabels> {
        self.companion_labels.get(&kind).cloned()
    }

    fn prepare_for_timestep(&mut self, date: NaiveDate) {
        self.last_prepared = Some(date);
    }

    fn request_resources(&mut self, ctx: &mut RequestContext<'_>) -> Vec<ResourceRequest> {
        for metric in &self.companion_metrics {
            ctx.set_companion_value(metric.kind, &metric.identifier, &metric.measure, metric.value);
        }

        let owner = ctx.owner();
        self.demands
            .iter()
            .map(|demand| {
                let mut request =
                    ResourceRequest::new(demand.resource.clone(), demand.amount * ctx.zone_multiplier)
                        .with_category(demand.category.clone())
                        .with_owner(owner)
                        .with_filters(demand.filters.clone());
                request.allow_transmutation = demand.allow_transmutation;
                request
            })
            .collect()
    }

    fn adjust_resources(
        &mut self,
        requests: &mut [ResourceRequest],
        shortfall: &ShortfallProportion,
    ) -> AdjustOutcome {
        if !self.scale_on_shortfall {
            return AdjustOutcome::Unscaled;
        }
        scale_to_minimum_shortfall(requests, shortfall);
        AdjustOutcome::Scaled
    }

    fn perform_tasks(&mut self, ctx: &TaskContext<'_>) -> TaskOutcome {
        self.times_performed += 1;
        self.last_provided = ctx.requests.iter().map(|r| r.provided).sum();
        TaskOutcome::Completed
    }
}
