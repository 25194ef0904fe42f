// ==========================================
// 引擎测试辅助工具
// ==========================================
// 职责: 构建资源池、分配上下文与可观察的活动逻辑
// ==========================================

use activity_resource_engine::domain::labour::{LabourIndividual, LabourPool};
use activity_resource_engine::domain::types::Sex;
use activity_resource_engine::engine::{
    ActivityBehavior, ActivityReporter, AllocationContext, LabourAllocator, RecordingListener,
    RequestContext, TaskContext, TaskOutcome, TransmutationProvider,
};
use activity_resource_engine::{logging, Activity, ResourceRequest, ResourcesHolder};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

/// 创建劳动力池（每人只指定可用天数）
pub fn labour_pool(days: &[f64]) -> LabourPool {
    LabourPool::new(
        days.iter()
            .enumerate()
            .map(|(i, d)| LabourIndividual::new(format!("Worker{}", i + 1), Sex::Female, 30.0, *d))
            .collect(),
    )
}

// ==========================================
// Harness - 单活动运行环境
// ==========================================
pub struct Harness {
    pub resources: ResourcesHolder,
    pub allocator: LabourAllocator,
    pub listener: Arc<RecordingListener>,
    pub reporter: ActivityReporter,
    pub warn_unscaled_shortfall: bool,
}

impl Harness {
    pub fn new(resources: ResourcesHolder) -> Self {
        logging::init_test();
        let listener = Arc::new(RecordingListener::new());
        Self {
            resources,
            allocator: LabourAllocator::default(),
            reporter: ActivityReporter::recording(listener.clone()),
            listener,
            warn_unscaled_shortfall: true,
        }
    }

    pub fn context<'a>(
        &'a mut self,
        transmutation: &'a dyn TransmutationProvider,
    ) -> AllocationContext<'a> {
        AllocationContext {
            resources: &mut self.resources,
            transmutation,
            reporter: &self.reporter,
            labour: &self.allocator,
            date: test_date(),
            zone_multiplier: 1.0,
            warn_unscaled_shortfall: self.warn_unscaled_shortfall,
        }
    }

    /// 运行一个完整时间步（重置 → 协议）
    pub fn run(
        &mut self,
        activity: &mut Activity,
        transmutation: &dyn TransmutationProvider,
    ) -> Result<(), activity_resource_engine::EngineError> {
        activity.reset_for_timestep();
        let mut ctx = self.context(transmutation);
        activity.manage_resources_and_tasks(&mut ctx, "")
    }
}

// ==========================================
// CountingBehavior - 记录执行次数的活动逻辑
// ==========================================
pub struct CountingBehavior {
    pub requests: Vec<ResourceRequest>,
    pub performed: Arc<AtomicU32>,
}

impl CountingBehavior {
    pub fn new(requests: Vec<ResourceRequest>) -> (Self, Arc<AtomicU32>) {
        let performed = Arc::new(AtomicU32::new(0));
        (
            Self {
                requests,
                performed: performed.clone(),
            },
            performed,
        )
    }
}

impl ActivityBehavior for CountingBehavior {
    fn request_resources(&mut self, ctx: &mut RequestContext<'_>) -> Vec<ResourceRequest> {
        let owner = ctx.owner();
        self.requests
            .iter()
            .cloned()
            .map(|r| r.with_owner(owner))
            .collect()
    }

    fn perform_tasks(&mut self, _ctx: &TaskContext<'_>) -> TaskOutcome {
        self.performed.fetch_add(1, Ordering::SeqCst);
        TaskOutcome::Completed
    }
}

pub fn performed_count(counter: &Arc<AtomicU32>) -> u32 {
    counter.load(Ordering::SeqCst)
}
