// ==========================================
// 活动资源分配引擎 - 场景文件
// ==========================================
// 职责: 声明式场景（JSON）→ 活动树 + 资源持有者 + 转换规则
// 说明: 场景中的活动均为固定需求活动，伴生组件为内置类型
// ==========================================

use crate::config::engine_config::{ConfigError, ConfigResult, EngineConfig};
use crate::domain::labour::{LabourIndividual, LabourPool};
use crate::domain::resource::{ResourcesHolder, StockResource};
use crate::domain::types::{AllocationStyle, CompanionKind, ShortfallPolicy};
use crate::engine::activity::Activity;
use crate::engine::behaviors::{CompanionMetric, FixedDemand, FixedDemandBehavior};
use crate::engine::companion::{CompanionComponent, CompanionLabels};
use crate::engine::companions::{ActivityFee, LabourRequirement};
use crate::engine::events::ActivityReporter;
use crate::engine::labour_allocator::LabourAllocator;
use crate::engine::timer::{ActivityTimer, IntervalTimer, MonthRangeTimer};
use crate::engine::transmutation::{TransmutationRule, TransmutationRules};
use crate::engine::tree::{ActivityTree, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

fn default_true() -> bool {
    true
}

fn default_multiplier() -> f64 {
    1.0
}

// ==========================================
// 场景定义
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub zone: String,
    #[serde(default = "default_multiplier")]
    pub zone_multiplier: f64,
    #[serde(default)]
    pub stocks: Vec<StockResource>,
    /// 每个时间步开始时恢复到此处的可用天数
    #[serde(default)]
    pub labour: Vec<LabourIndividual>,
    #[serde(default)]
    pub transmutations: Vec<TransmutationRule>,
    #[serde(default)]
    pub activities: Vec<ActivitySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub policy: ShortfallPolicy,
    #[serde(default)]
    pub allocation_style: AllocationStyle,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub scale_on_shortfall: bool,
    #[serde(default)]
    pub demands: Vec<FixedDemand>,
    #[serde(default)]
    pub companion_metrics: Vec<CompanionMetric>,
    #[serde(default)]
    pub companion_labels: BTreeMap<CompanionKind, CompanionLabels>,
    #[serde(default)]
    pub companions: Vec<CompanionSpec>,
    #[serde(default)]
    pub timers: Vec<TimerSpec>,
    #[serde(default)]
    pub children: Vec<ActivitySpec>,
}

/// 内置伴生组件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompanionSpec {
    LabourRequirement(LabourRequirement),
    ActivityFee(ActivityFee),
}

impl CompanionSpec {
    fn into_component(self) -> Box<dyn CompanionComponent> {
        match self {
            CompanionSpec::LabourRequirement(c) => Box::new(c),
            CompanionSpec::ActivityFee(c) => Box::new(c),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TimerSpec {
    MonthRange(MonthRangeTimer),
    Interval(IntervalTimer),
}

impl TimerSpec {
    fn into_timer(self) -> Box<dyn ActivityTimer> {
        match self {
            TimerSpec::MonthRange(t) => Box::new(t),
            TimerSpec::Interval(t) => Box::new(t),
        }
    }
}

/// 构建完成的场景
pub struct Scenario {
    pub tree: ActivityTree,
    pub resources: ResourcesHolder,
    pub transmutation: TransmutationRules,
    /// 每个时间步恢复的劳动力池
    pub labour_template: Option<LabourPool>,
}

impl ScenarioSpec {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let spec: Self = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.zone_multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                key: "zone_multiplier".to_string(),
                message: format!("不能为负: {}", self.zone_multiplier),
            });
        }
        for rule in &self.transmutations {
            if rule.source_per_unit <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: format!("transmutations[{}]", rule.target),
                    message: "source_per_unit 必须为正".to_string(),
                });
            }
        }
        Ok(())
    }

    /// 构建活动树与资源
    pub fn build(self, config: &EngineConfig, reporter: ActivityReporter) -> ConfigResult<Scenario> {
        let mut tree = ActivityTree::new(self.zone.clone())
            .with_zone_multiplier(self.zone_multiplier)
            .with_labour_allocator(LabourAllocator::new(config.default_labour_limits))
            .with_reporter(reporter)
            .with_unscaled_warning(config.warn_unscaled_shortfall);

        for spec in self.activities {
            add_activity(&mut tree, None, spec)?;
        }

        let mut resources = ResourcesHolder::new();
        for stock in self.stocks {
            resources = resources.with_stock(stock);
        }
        let labour_template = if self.labour.is_empty() {
            None
        } else {
            Some(LabourPool::new(self.labour))
        };
        if let Some(pool) = &labour_template {
            resources = resources.with_labour(pool.clone());
        }

        debug!(zone = %self.zone, activities = tree.len(), "场景构建完成");
        Ok(Scenario {
            tree,
            resources,
            transmutation: TransmutationRules::new(self.transmutations),
            labour_template,
        })
    }
}

fn add_activity(
    tree: &mut ActivityTree,
    parent: Option<NodeId>,
    spec: ActivitySpec,
) -> ConfigResult<NodeId> {
    let mut behavior = FixedDemandBehavior::new(spec.demands);
    behavior.companion_metrics = spec.companion_metrics;
    behavior.companion_labels = spec.companion_labels;
    behavior.scale_on_shortfall = spec.scale_on_shortfall;

    let mut activity = Activity::new(spec.name.clone(), Box::new(behavior))
        .with_policy(spec.policy)
        .with_allocation_style(spec.allocation_style)
        .with_category(spec.category);
    for companion in spec.companions {
        activity.add_companion(companion.into_component());
    }

    let id = tree
        .add_activity(parent, activity)
        .map_err(|e| invalid(&spec.name, e))?;
    for timer in spec.timers {
        tree.add_timer(id, timer.into_timer())
            .map_err(|e| invalid(&spec.name, e))?;
    }
    for child in spec.children {
        add_activity(tree, Some(id), child)?;
    }
    if !spec.enabled {
        tree.set_enabled(id, false)
            .map_err(|e| invalid(&spec.name, e))?;
    }
    Ok(id)
}

fn invalid(name: &str, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key: format!("activities[{}]", name),
        message: error.to_string(),
    }
}
