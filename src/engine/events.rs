// ==========================================
// 活动资源分配引擎 - 活动事件上报
// ==========================================
// 职责: 定义短缺/执行状态监听 trait 与上报路由
// 说明: 市场资源的短缺上报到市场监听者（若已配置），其余上报本地
// ==========================================

use crate::domain::request::{CompanionModelDetails, ResourceRequest};
use crate::domain::types::ActivityStatus;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// 事件定义
// ==========================================

/// 资源短缺事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortfallEvent {
    /// 上报活动（含父路径）
    pub activity: String,
    /// 资源名称
    pub resource: String,
    pub category: String,
    pub required: f64,
    pub available: f64,
    /// 产生请求的伴生组件
    pub companion: Option<CompanionModelDetails>,
    /// 资源是否属于市场
    pub market: bool,
}

impl ShortfallEvent {
    pub fn from_request(activity: &str, request: &ResourceRequest, market: bool) -> Self {
        Self {
            activity: activity.to_string(),
            resource: request
                .resource_type
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_default(),
            category: request.category.clone(),
            required: request.required,
            available: request.available,
            companion: request.companion_model_details.clone(),
            market,
        }
    }
}

/// 活动执行事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPerformedEvent {
    pub name: String,
    pub status: ActivityStatus,
    pub id: String,
}

// ==========================================
// 监听 Trait
// ==========================================

/// 短缺监听者
pub trait ShortfallListener: Send + Sync {
    fn report_shortfall(&self, event: &ShortfallEvent);
}

/// 执行状态监听者
pub trait PerformedListener: Send + Sync {
    fn report_performed(&self, event: &ActivityPerformedEvent);
}

/// 空操作监听者
#[derive(Debug, Clone, Default)]
pub struct NoOpListener;

impl ShortfallListener for NoOpListener {
    fn report_shortfall(&self, event: &ShortfallEvent) {
        tracing::debug!(
            "NoOpListener: 跳过短缺上报 - activity={}, resource={}, required={}, available={}",
            event.activity,
            event.resource,
            event.required,
            event.available
        );
    }
}

impl PerformedListener for NoOpListener {
    fn report_performed(&self, event: &ActivityPerformedEvent) {
        tracing::debug!(
            "NoOpListener: 跳过执行上报 - name={}, status={}",
            event.name,
            event.status
        );
    }
}

/// 记录型监听者（运行汇总与测试使用）
#[derive(Debug, Default)]
pub struct RecordingListener {
    shortfalls: Mutex<Vec<ShortfallEvent>>,
    performed: Mutex<Vec<ActivityPerformedEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shortfalls(&self) -> Vec<ShortfallEvent> {
        self.shortfalls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn performed(&self) -> Vec<ActivityPerformedEvent> {
        self.performed.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// 取出并清空已记录事件
    pub fn drain(&self) -> (Vec<ShortfallEvent>, Vec<ActivityPerformedEvent>) {
        let shortfalls = self
            .shortfalls
            .lock()
            .map(|mut g| std::mem::take(&mut *g))
            .unwrap_or_default();
        let performed = self
            .performed
            .lock()
            .map(|mut g| std::mem::take(&mut *g))
            .unwrap_or_default();
        (shortfalls, performed)
    }
}

impl ShortfallListener for RecordingListener {
    fn report_shortfall(&self, event: &ShortfallEvent) {
        if let Ok(mut guard) = self.shortfalls.lock() {
            guard.push(event.clone());
        }
    }
}

impl PerformedListener for RecordingListener {
    fn report_performed(&self, event: &ActivityPerformedEvent) {
        if let Ok(mut guard) = self.performed.lock() {
            guard.push(event.clone());
        }
    }
}

// ==========================================
// ActivityReporter - 上报路由
// ==========================================
#[derive(Clone)]
pub struct ActivityReporter {
    local: Arc<dyn ShortfallListener>,
    market: Option<Arc<dyn ShortfallListener>>,
    performed: Arc<dyn PerformedListener>,
}

impl ActivityReporter {
    pub fn new(local: Arc<dyn ShortfallListener>, performed: Arc<dyn PerformedListener>) -> Self {
        Self {
            local,
            market: None,
            performed,
        }
    }

    /// 同一个记录型监听者同时接收短缺与执行事件
    pub fn recording(listener: Arc<RecordingListener>) -> Self {
        Self::new(listener.clone(), listener)
    }

    pub fn with_market(mut self, market: Arc<dyn ShortfallListener>) -> Self {
        self.market = Some(market);
        self
    }

    /// 上报短缺
    pub fn report_shortfall(&self, event: &ShortfallEvent) {
        match (&self.market, event.market) {
            (Some(market), true) => market.report_shortfall(event),
            _ => self.local.report_shortfall(event),
        }
    }

    pub fn report_performed(&self, event: &ActivityPerformedEvent) {
        self.performed.report_performed(event);
    }
}

impl Default for ActivityReporter {
    fn default() -> Self {
        Self::new(Arc::new(NoOpListener), Arc::new(NoOpListener))
    }
}
