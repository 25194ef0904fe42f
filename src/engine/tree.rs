// ==========================================
// 活动资源分配引擎 - 活动树
// ==========================================
// 职责:
// 1) 父子组合（全名 = 区域.父.子）
// 2) 启用/停用向所有后代级联
// 3) 计时门控: 自身与祖先链上的全部计时器都到期才执行
// 4) 按固定先序遍历驱动每个时间步，结束后上报执行状态
// ==========================================
// 红线: 单线程固定顺序遍历，同一时间步内不得并发修改资源池
// ==========================================

use crate::domain::resource::ResourcePool;
use crate::domain::types::{ActivityStatus, AllocationStyle};
use crate::engine::activity::{Activity, AllocationContext};
use crate::engine::companion::CompanionValidationWarning;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{ActivityPerformedEvent, ActivityReporter};
use crate::engine::labour_allocator::LabourAllocator;
use crate::engine::timer::ActivityTimer;
use crate::engine::transmutation::TransmutationProvider;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// 活动节点下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

struct ActivityNode {
    activity: Activity,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    timers: Vec<Box<dyn ActivityTimer>>,
    /// 本时间步计时器是否全部到期（仅本节点）
    timers_due: bool,
}

/// 单个时间步的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct TimestepSummary {
    pub date: NaiveDate,
    /// 按遍历顺序的活动状态
    pub statuses: Vec<ActivityPerformedEvent>,
    /// 非空的状态消息（活动全名 → 消息）
    pub messages: BTreeMap<String, String>,
}

impl TimestepSummary {
    pub fn status_of(&self, name: &str) -> Option<ActivityStatus> {
        self.statuses
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.status)
    }
}

// ==========================================
// ActivityTree - 活动树
// ==========================================
pub struct ActivityTree {
    zone: String,
    zone_multiplier: f64,
    nodes: Vec<ActivityNode>,
    roots: Vec<NodeId>,
    allocator: LabourAllocator,
    reporter: ActivityReporter,
    warn_unscaled_shortfall: bool,
}

impl ActivityTree {
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            zone_multiplier: 1.0,
            nodes: Vec::new(),
            roots: Vec::new(),
            allocator: LabourAllocator::default(),
            reporter: ActivityReporter::default(),
            warn_unscaled_shortfall: true,
        }
    }

    pub fn with_zone_multiplier(mut self, multiplier: f64) -> Self {
        self.zone_multiplier = multiplier;
        self
    }

    pub fn with_labour_allocator(mut self, allocator: LabourAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_reporter(mut self, reporter: ActivityReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_unscaled_warning(mut self, warn: bool) -> Self {
        self.warn_unscaled_shortfall = warn;
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    // ==========================================
    // 构建
    // ==========================================

    /// 添加活动，parent 为 None 时作为根
    pub fn add_activity(&mut self, parent: Option<NodeId>, mut activity: Activity) -> EngineResult<NodeId> {
        let prefix = match parent {
            Some(p) => self.node(p)?.activity.qualified_name().to_string(),
            None => self.zone.clone(),
        };
        let qualified = if prefix.is_empty() {
            activity.name().to_string()
        } else {
            format!("{}.{}", prefix, activity.name())
        };
        activity.set_qualified_name(qualified);

        let id = NodeId(self.nodes.len());
        self.nodes.push(ActivityNode {
            activity,
            parent,
            children: Vec::new(),
            timers: Vec::new(),
            timers_due: true,
        });
        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn add_timer(&mut self, node: NodeId, timer: Box<dyn ActivityTimer>) -> EngineResult<()> {
        self.node_mut(node)?.timers.push(timer);
        Ok(())
    }

    fn node(&self, id: NodeId) -> EngineResult<&ActivityNode> {
        self.nodes.get(id.0).ok_or(EngineError::UnknownActivity(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> EngineResult<&mut ActivityNode> {
        self.nodes.get_mut(id.0).ok_or(EngineError::UnknownActivity(id.0))
    }

    pub fn activity(&self, id: NodeId) -> EngineResult<&Activity> {
        Ok(&self.node(id)?.activity)
    }

    pub fn activity_mut(&mut self, id: NodeId) -> EngineResult<&mut Activity> {
        Ok(&mut self.node_mut(id)?.activity)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// 按全名或名称查找（全名优先）
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.activity.qualified_name() == name)
            .or_else(|| self.nodes.iter().position(|n| n.activity.name() == name))
            .map(NodeId)
    }

    /// 先序遍历
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    fn ancestors_and_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.parent(id);
        while let Some(p) = current {
            chain.push(p);
            current = self.parent(p);
        }
        chain
    }

    // ==========================================
    // 启用级联
    // ==========================================

    /// 设置启用状态，值发生变化时级联到所有后代
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> EngineResult<()> {
        let node = self.node_mut(id)?;
        if node.activity.enabled == enabled {
            return Ok(());
        }
        node.activity.enabled = enabled;

        let mut stack: Vec<NodeId> = node.children.clone();
        while let Some(child) = stack.pop() {
            let node = self.node_mut(child)?;
            node.activity.enabled = enabled;
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }

    // ==========================================
    // 计时门控
    // ==========================================

    /// 本时间步（已评估）门控是否通过
    pub fn timing_ok(&self, id: NodeId) -> bool {
        self.ancestors_and_self(id)
            .iter()
            .filter_map(|n| self.nodes.get(n.0))
            .all(|n| n.timers_due)
    }

    /// 按给定日期重新评估门控（不修改缓存）
    pub fn timing_check(&self, id: NodeId, date: NaiveDate) -> bool {
        let not_due = self
            .ancestors_and_self(id)
            .iter()
            .filter_map(|n| self.nodes.get(n.0))
            .flat_map(|n| n.timers.iter())
            .filter(|t| !t.is_due(date))
            .count();
        not_due == 0
    }

    /// 自身或祖先是否存在计时器
    pub fn timing_exists(&self, id: NodeId) -> bool {
        self.ancestors_and_self(id)
            .iter()
            .filter_map(|n| self.nodes.get(n.0))
            .any(|n| !n.timers.is_empty())
    }

    fn evaluate_timers(&mut self, date: NaiveDate) {
        for node in &mut self.nodes {
            node.timers_due = node.timers.iter().all(|t| t.is_due(date));
        }
    }

    // ==========================================
    // 模拟开始
    // ==========================================

    /// 为每个活动定位伴生组件并校验标签
    pub fn start_of_simulation(&mut self) -> EngineResult<Vec<CompanionValidationWarning>> {
        let mut warnings = Vec::new();
        for node in &mut self.nodes {
            warnings.extend(node.activity.start_of_simulation()?);
        }
        info!(
            zone = %self.zone,
            activities = self.nodes.len(),
            warnings = warnings.len(),
            "活动树初始化完成"
        );
        Ok(warnings)
    }

    // ==========================================
    // 时间步
    // ==========================================

    /// 执行一个时间步
    ///
    /// 自动分配方式的活动按先序依次执行；手动方式的活动只重置，
    /// 等待调用方通过 `manage_resources_and_tasks` 触发
    ///
    /// # 错误
    /// 编程错误或 ReportErrorAndStop 导致整个运行终止
    #[instrument(skip_all, fields(zone = %self.zone, date = %date))]
    pub fn run_timestep(
        &mut self,
        date: NaiveDate,
        resources: &mut dyn ResourcePool,
        transmutation: &dyn TransmutationProvider,
    ) -> EngineResult<TimestepSummary> {
        self.begin_timestep(date);

        for id in self.pre_order() {
            if self.node(id)?.activity.allocation_style != AllocationStyle::Automatic {
                continue;
            }
            self.run_gated(id, "", date, resources, transmutation)?;
        }

        Ok(self.report_activity_status(date))
    }

    /// 时间步开始：评估计时器并重置所有活动
    pub fn begin_timestep(&mut self, date: NaiveDate) {
        self.evaluate_timers(date);
        for node in &mut self.nodes {
            node.activity.reset_for_timestep();
        }
    }

    /// 手动触发单个活动（仍受启用与计时门控约束）
    ///
    /// identifier 非空时只有同标识符的伴生组件参与
    pub fn manage_resources_and_tasks(
        &mut self,
        id: NodeId,
        identifier: &str,
        date: NaiveDate,
        resources: &mut dyn ResourcePool,
        transmutation: &dyn TransmutationProvider,
    ) -> EngineResult<ActivityStatus> {
        self.run_gated(id, identifier, date, resources, transmutation)?;
        Ok(self.node(id)?.activity.status())
    }

    fn run_gated(
        &mut self,
        id: NodeId,
        identifier: &str,
        date: NaiveDate,
        resources: &mut dyn ResourcePool,
        transmutation: &dyn TransmutationProvider,
    ) -> EngineResult<()> {
        let timing_ok = self.timing_ok(id);
        let Self {
            nodes,
            allocator,
            reporter,
            zone_multiplier,
            warn_unscaled_shortfall,
            ..
        } = self;
        let activity = &mut nodes
            .get_mut(id.0)
            .ok_or(EngineError::UnknownActivity(id.0))?
            .activity;

        if !activity.is_enabled() || !timing_ok {
            activity.set_status(ActivityStatus::Ignored);
            debug!(activity = %activity.qualified_name(), "未启用或计时未到期，忽略");
            return Ok(());
        }

        let mut ctx = AllocationContext {
            resources,
            transmutation,
            reporter,
            labour: allocator,
            date,
            zone_multiplier: *zone_multiplier,
            warn_unscaled_shortfall: *warn_unscaled_shortfall,
        };
        activity.manage_resources_and_tasks(&mut ctx, identifier)
    }

    // ==========================================
    // 状态上报
    // ==========================================

    /// 从根开始递归上报执行状态；到期的计时器另行上报 Timer 事件
    pub fn report_activity_status(&self, date: NaiveDate) -> TimestepSummary {
        let mut summary = TimestepSummary {
            date,
            statuses: Vec::new(),
            messages: BTreeMap::new(),
        };
        for &root in &self.roots {
            self.report_node(root, date, &mut summary);
        }
        summary
    }

    fn report_node(&self, id: NodeId, date: NaiveDate, summary: &mut TimestepSummary) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        let activity = &node.activity;

        let event = ActivityPerformedEvent {
            name: activity.qualified_name().to_string(),
            status: activity.status(),
            id: activity.id().to_string(),
        };
        self.reporter.report_performed(&event);
        summary.statuses.push(event);

        let message = activity.status_message();
        if !message.is_empty() {
            summary.messages.insert(activity.qualified_name().to_string(), message);
        }

        for (idx, companion) in activity.companions().iter().enumerate() {
            let status = activity.companion_status(idx).unwrap_or(ActivityStatus::Ignored);
            if status == ActivityStatus::Ignored {
                continue;
            }
            let event = ActivityPerformedEvent {
                name: format!("{}.{}", activity.qualified_name(), companion.name()),
                status,
                id: format!("{}#{}", activity.id(), idx),
            };
            self.reporter.report_performed(&event);
            summary.statuses.push(event);
        }

        if activity.is_enabled() {
            for timer in node.timers.iter().filter(|t| t.is_due(date)) {
                let event = ActivityPerformedEvent {
                    name: format!("{}.{}", activity.qualified_name(), timer.name()),
                    status: ActivityStatus::Timer,
                    id: activity.id().to_string(),
                };
                self.reporter.report_performed(&event);
                summary.statuses.push(event);
            }
        }

        for &child in &node.children {
            self.report_node(child, date, summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{ResourcesHolder, StockResource};
    use crate::engine::behaviors::{ActivityFolder, FixedDemand, FixedDemandBehavior};
    use crate::engine::timer::MonthRangeTimer;
    use crate::engine::transmutation::NoTransmutation;

    fn date(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, 1).unwrap()
    }

    fn hay_eater(name: &str, amount: f64) -> Activity {
        Activity::new(
            name,
            Box::new(FixedDemandBehavior::new(vec![FixedDemand::stock("Hay", amount)])),
        )
    }

    #[test]
    fn test_qualified_names_follow_tree() {
        let mut tree = ActivityTree::new("Farm");
        let herd = tree
            .add_activity(None, Activity::new("Herd", Box::new(ActivityFolder)))
            .unwrap();
        let feed = tree.add_activity(Some(herd), hay_eater("Feed", 1.0)).unwrap();

        assert_eq!(tree.activity(feed).unwrap().qualified_name(), "Farm.Herd.Feed");
        assert_eq!(tree.find("Feed"), Some(feed));
        assert_eq!(tree.pre_order(), vec![herd, feed]);
    }

    #[test]
    fn test_disable_cascades_only_on_change() {
        let mut tree = ActivityTree::new("Farm");
        let herd = tree
            .add_activity(None, Activity::new("Herd", Box::new(ActivityFolder)))
            .unwrap();
        let feed = tree.add_activity(Some(herd), hay_eater("Feed", 1.0)).unwrap();
        let supplement = tree.add_activity(Some(feed), hay_eater("Supplement", 1.0)).unwrap();

        tree.set_enabled(herd, false).unwrap();
        assert!(!tree.activity(supplement).unwrap().is_enabled());

        // 子节点单独启用后，父节点重复设置 false 不再级联
        tree.set_enabled(feed, true).unwrap();
        tree.set_enabled(herd, false).unwrap();
        assert!(tree.activity(feed).unwrap().is_enabled());
    }

    #[test]
    fn test_timer_on_ancestor_gates_descendants() {
        let mut tree = ActivityTree::new("Farm");
        let herd = tree
            .add_activity(None, Activity::new("Herd", Box::new(ActivityFolder)))
            .unwrap();
        let feed = tree.add_activity(Some(herd), hay_eater("Feed", 2.0)).unwrap();
        tree.add_timer(herd, Box::new(MonthRangeTimer::new("Winter", 6, 8)))
            .unwrap();

        assert!(tree.timing_exists(feed));
        assert!(!tree.timing_check(feed, date(3)));
        assert!(tree.timing_check(feed, date(7)));

        let mut holder = ResourcesHolder::new().with_stock(StockResource::new("Hay", 100.0));
        let summary = tree.run_timestep(date(3), &mut holder, &NoTransmutation).unwrap();
        assert_eq!(summary.status_of("Farm.Herd.Feed"), Some(ActivityStatus::Ignored));
        assert_eq!(holder.stock_amount("Hay"), Some(100.0));

        let summary = tree.run_timestep(date(7), &mut holder, &NoTransmutation).unwrap();
        assert_eq!(summary.status_of("Farm.Herd.Feed"), Some(ActivityStatus::Success));
        assert_eq!(summary.status_of("Farm.Herd.Winter"), Some(ActivityStatus::Timer));
        assert_eq!(holder.stock_amount("Hay"), Some(98.0));
    }

    #[test]
    fn test_manual_activity_waits_for_trigger() {
        let mut tree = ActivityTree::new("Farm");
        let feed = tree
            .add_activity(
                None,
                hay_eater("Feed", 5.0).with_allocation_style(AllocationStyle::Manual),
            )
            .unwrap();
        let mut holder = ResourcesHolder::new().with_stock(StockResource::new("Hay", 20.0));

        let summary = tree.run_timestep(date(1), &mut holder, &NoTransmutation).unwrap();
        assert_eq!(summary.status_of("Farm.Feed"), Some(ActivityStatus::Ignored));

        let status = tree
            .manage_resources_and_tasks(feed, "", date(1), &mut holder, &NoTransmutation)
            .unwrap();
        assert_eq!(status, ActivityStatus::Success);
        assert_eq!(holder.stock_amount("Hay"), Some(15.0));
    }

    #[test]
    fn test_unknown_node_is_error() {
        let tree = ActivityTree::new("Farm");
        assert!(matches!(
            tree.activity(NodeId(3)),
            Err(EngineError::UnknownActivity(3))
        ));
    }
}
