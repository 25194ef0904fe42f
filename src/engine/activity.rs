// ==========================================
// 活动资源分配引擎 - 活动（协议状态机）
// ==========================================
// 职责: 单个活动在一个时间步内的资源协议
// 流程: 准备 → 请求（自身 + 伴生组件）→ 检查（可用量 + 转换）
//       → 调整 → 短缺上报 → 扣减 → 执行任务
// 红线:
// - check 必须先于 take；调整在 check 之后、上报之前；上报在 take 之前
// - 可恢复短缺在活动内部消化，只有致命错误向外传播
// ==========================================

use crate::domain::labour::LabourLimits;
use crate::domain::request::{ActivityId, CompanionModelDetails, RequestOwner, ResourceRequest};
use crate::domain::resource::ResourcePool;
use crate::domain::types::{ActivityStatus, AllocationStyle, CompanionKind, ShortfallPolicy};
use crate::engine::companion::{
    CompanionComponent, CompanionKey, CompanionLabels, CompanionModelRegistry, CompanionValidationWarning,
    CompanionValues,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{ActivityReporter, ShortfallEvent};
use crate::engine::labour_allocator::LabourAllocator;
use crate::engine::math::{is_negative, is_positive, is_short};
use crate::engine::shortfall::{minimum_shortfall_proportion, ShortfallProportion};
use crate::engine::transmutation::{TransmutationPass, TransmutationProvider};
use chrono::NaiveDate;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

// ==========================================
// 上下文
// ==========================================

/// 一次资源协议所需的外部协作者
pub struct AllocationContext<'a> {
    pub resources: &'a mut dyn ResourcePool,
    pub transmutation: &'a dyn TransmutationProvider,
    pub reporter: &'a ActivityReporter,
    pub labour: &'a LabourAllocator,
    pub date: NaiveDate,
    pub zone_multiplier: f64,
    pub warn_unscaled_shortfall: bool,
}

/// 请求阶段上下文
pub struct RequestContext<'a> {
    pub activity_id: ActivityId,
    pub date: NaiveDate,
    pub zone_multiplier: f64,
    pub companion_values: &'a mut CompanionValues,
}

impl RequestContext<'_> {
    /// 归属本活动的请求标记
    pub fn owner(&self) -> RequestOwner {
        RequestOwner::Activity(self.activity_id)
    }

    /// 设置伴生组件度量值
    pub fn set_companion_value(
        &mut self,
        kind: CompanionKind,
        identifier: &str,
        measure: &str,
        value: f64,
    ) {
        self.companion_values.set(kind, identifier, measure, value);
    }
}

/// 执行阶段上下文
pub struct TaskContext<'a> {
    pub activity_id: ActivityId,
    pub date: NaiveDate,
    pub zone_multiplier: f64,
    /// 已扣减的请求（provided 已写入）
    pub requests: &'a [ResourceRequest],
}

/// 任务执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// 已执行；无短缺时状态置为 Success
    Completed,
    /// 本时间步无事可做
    NotNeeded,
    /// 执行时发现问题
    Warning(String),
}

/// 调整钩子结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustOutcome {
    /// 未按短缺比例调整
    Unscaled,
    /// 已按短缺比例调整需求
    Scaled,
}

// ==========================================
// Trait: ActivityBehavior
// ==========================================
// 活动的具体逻辑以组合方式提供，引擎只负责资源协议
pub trait ActivityBehavior: Send + Sync {
    /// 是否支持伴生组件
    fn handles_companions(&self) -> bool {
        false
    }

    /// 为某类伴生组件声明的标识符/度量（None 表示未配置）
    fn define_companion_labels(&self, _kind: CompanionKind) -> Option<CompanionLabels> {
        None
    }

    fn prepare_for_timestep(&mut self, _date: NaiveDate) {}

    /// 生成本活动的请求，并计算伴生组件度量值
    fn request_resources(&mut self, _ctx: &mut RequestContext<'_>) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// 检查后、上报前的调整钩子
    ///
    /// 默认不调整，由引擎告警；需要按比例影响结果的活动可重写，
    /// 通常调用 `shortfall::scale_to_minimum_shortfall`
    fn adjust_resources(
        &mut self,
        _requests: &mut [ResourceRequest],
        _shortfall: &ShortfallProportion,
    ) -> AdjustOutcome {
        AdjustOutcome::Unscaled
    }

    fn perform_tasks(&mut self, _ctx: &TaskContext<'_>) -> TaskOutcome {
        TaskOutcome::Completed
    }
}

// ==========================================
// Activity - 活动
// ==========================================
pub struct Activity {
    id: ActivityId,
    name: String,
    qualified_name: String,

    // ===== 配置 =====
    pub(crate) enabled: bool,
    pub allocation_style: AllocationStyle,
    pub shortfall_policy: ShortfallPolicy,
    pub transaction_category: String,

    // ===== 每时间步状态 =====
    status: ActivityStatus,
    resource_request_list: Vec<ResourceRequest>,
    companion_values: CompanionValues,
    status_messages: Vec<String>,

    // ===== 伴生组件 =====
    companions: Vec<Box<dyn CompanionComponent>>,
    companion_status: Vec<ActivityStatus>,
    registry: CompanionModelRegistry,

    behavior: Box<dyn ActivityBehavior>,
}

impl std::fmt::Debug for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activity")
            .field("id", &self.id)
            .field("name", &self.qualified_name)
            .field("status", &self.status)
            .field("enabled", &self.enabled)
            .field("requests", &self.resource_request_list.len())
            .field("companions", &self.companions.len())
            .finish()
    }
}

impl Activity {
    pub fn new(name: impl Into<String>, behavior: Box<dyn ActivityBehavior>) -> Self {
        let name = name.into();
        Self {
            id: ActivityId::new(),
            qualified_name: name.clone(),
            name,
            enabled: true,
            allocation_style: AllocationStyle::Automatic,
            shortfall_policy: ShortfallPolicy::default(),
            transaction_category: String::new(),
            status: ActivityStatus::Ignored,
            resource_request_list: Vec::new(),
            companion_values: CompanionValues::default(),
            status_messages: Vec::new(),
            companions: Vec::new(),
            companion_status: Vec::new(),
            registry: CompanionModelRegistry::default(),
            behavior,
        }
    }

    pub fn with_policy(mut self, policy: ShortfallPolicy) -> Self {
        self.shortfall_policy = policy;
        self
    }

    pub fn with_allocation_style(mut self, style: AllocationStyle) -> Self {
        self.allocation_style = style;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.transaction_category = category.into();
        self
    }

    pub fn with_companion(mut self, companion: Box<dyn CompanionComponent>) -> Self {
        self.add_companion(companion);
        self
    }

    pub fn add_companion(&mut self, companion: Box<dyn CompanionComponent>) {
        self.companions.push(companion);
        self.companion_status.push(ActivityStatus::Ignored);
    }

    // ==========================================
    // 访问器
    // ==========================================

    pub fn id(&self) -> ActivityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 含父路径的全名
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub(crate) fn set_qualified_name(&mut self, qualified: String) {
        self.qualified_name = qualified;
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ActivityStatus) {
        self.status = status;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn resource_requests(&self) -> &[ResourceRequest] {
        &self.resource_request_list
    }

    pub fn companions(&self) -> &[Box<dyn CompanionComponent>] {
        &self.companions
    }

    /// 第 idx 个伴生组件的本时间步状态
    pub fn companion_status(&self, idx: usize) -> Option<ActivityStatus> {
        self.companion_status.get(idx).copied()
    }

    pub fn companion_values(&self) -> &CompanionValues {
        &self.companion_values
    }

    pub fn add_status_message(&mut self, message: impl Into<String>) {
        self.status_messages.push(message.into());
    }

    /// 本时间步状态消息（换行拼接）
    pub fn status_message(&self) -> String {
        self.status_messages.join("\n")
    }

    /// 最近的劳动力需求上限（劳动力请求无归属时使用）
    pub fn nearest_labour_limits(&self) -> Option<LabourLimits> {
        self.companions
            .iter()
            .find_map(|c| c.labour_limits().copied())
    }

    // ==========================================
    // 模拟开始
    // ==========================================

    /// 定位伴生组件并校验标签
    ///
    /// 不支持的类型、未配置的标识符为致命错误；无效标签只告警
    pub fn start_of_simulation(&mut self) -> EngineResult<Vec<CompanionValidationWarning>> {
        let behavior = &self.behavior;
        self.registry = CompanionModelRegistry::build(
            &self.qualified_name,
            behavior.handles_companions(),
            &self.companions,
            |kind| behavior.define_companion_labels(kind),
            &mut self.companion_values,
        )?;

        if self.companions.is_empty() {
            return Ok(Vec::new());
        }
        Ok(CompanionModelRegistry::validate(
            &self.qualified_name,
            &self.companions,
            |kind| behavior.define_companion_labels(kind),
        ))
    }

    // ==========================================
    // 时间步
    // ==========================================

    /// 时间步开始：清空请求、度量值、状态消息
    pub fn reset_for_timestep(&mut self) {
        self.resource_request_list.clear();
        self.companion_values.reset();
        self.status = ActivityStatus::Ignored;
        self.status_messages.clear();
        for status in &mut self.companion_status {
            *status = ActivityStatus::Ignored;
        }
    }

    /// 参与本次执行的已启用伴生组件下标（identifier 非空时只取同标识符者）
    fn participating_companions(&self, identifier: &str) -> Vec<usize> {
        self.companions
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled() && (identifier.is_empty() || c.identifier() == identifier))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// 准备时间步
    pub fn prepare_for_timestep(&mut self, date: NaiveDate, identifier: &str) {
        self.status = ActivityStatus::NotNeeded;
        self.behavior.prepare_for_timestep(date);
        for idx in self.participating_companions(identifier) {
            self.companions[idx].prepare_for_timestep();
            self.companion_status[idx] = ActivityStatus::NotNeeded;
        }
    }

    /// 读取伴生组件度量值
    ///
    /// 未登记或本时间步未计算均为编程错误
    pub fn value_for_companion_model(&self, idx: usize) -> EngineResult<f64> {
        let companion = self.companions.get(idx);
        let kind = self.registry.kind_of(idx);
        let (Some(companion), Some(kind)) = (companion, kind) else {
            return Err(EngineError::CompanionValueUnset {
                activity: self.qualified_name.clone(),
                kind: "UNKNOWN".to_string(),
                identifier: idx.to_string(),
                measure: String::new(),
            });
        };
        let key = CompanionKey::new(kind, companion.identifier(), companion.measure());
        match self.companion_values.get(&key) {
            Some(Some(value)) => Ok(value),
            _ => Err(EngineError::CompanionValueUnset {
                activity: self.qualified_name.clone(),
                kind: kind.to_string(),
                identifier: blank_label(&key.identifier),
                measure: blank_label(&key.measure),
            }),
        }
    }

    /// 该伴生组件是否由度量值驱动（其类型已登记度量槽位）
    fn is_metric_driven(&self, idx: usize) -> bool {
        self.registry
            .kind_of(idx)
            .map(|kind| self.companion_values.has_kind(kind))
            .unwrap_or(false)
    }

    /// 按标识符获取伴生组件
    ///
    /// must_be_provided 且未找到时告警
    pub fn companions_by_identifier(
        &self,
        kind: CompanionKind,
        identifier: &str,
        must_be_provided: bool,
    ) -> EngineResult<Vec<&dyn CompanionComponent>> {
        let found = self
            .registry
            .by_identifier(&self.qualified_name, kind, identifier)?
            .map(|members| {
                members
                    .iter()
                    .map(|&idx| self.companions[idx].as_ref())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if found.is_empty() && must_be_provided {
            warn!(
                "[a={}] 需要至少一个 [{}] 伴生组件{}",
                self.qualified_name,
                kind,
                if identifier.is_empty() {
                    "（含正确的标识符）".to_string()
                } else {
                    format!("，标识符为 [{}]", identifier)
                }
            );
        }
        Ok(found)
    }

    /// 管理本时间步的资源与任务（不含启用/计时门控，由活动树负责）
    #[instrument(skip_all, fields(activity = %self.qualified_name, identifier = identifier))]
    pub fn manage_resources_and_tasks(
        &mut self,
        ctx: &mut AllocationContext<'_>,
        identifier: &str,
    ) -> EngineResult<()> {
        // 每次执行使用新的请求批次，伴生度量值保留到时间步重置
        self.resource_request_list.clear();
        self.status_messages.clear();
        self.prepare_for_timestep(ctx.date, identifier);

        // 1) 自身请求（同时写入伴生度量值）
        let own = {
            let mut request_ctx = RequestContext {
                activity_id: self.id,
                date: ctx.date,
                zone_multiplier: ctx.zone_multiplier,
                companion_values: &mut self.companion_values,
            };
            self.behavior.request_resources(&mut request_ctx)
        };
        self.resource_request_list.extend(own);

        // 2) 伴生组件请求
        let participating = self.participating_companions(identifier);
        for &idx in &participating {
            if !self.is_metric_driven(idx) {
                continue;
            }
            let metric = self.value_for_companion_model(idx)?;
            if !is_positive(metric) {
                continue;
            }
            let kind = self.registry.kind_of(idx);
            let companion = &mut self.companions[idx];
            let owner = if companion.shortfall_policy().is_some() {
                RequestOwner::Companion {
                    activity: self.id,
                    index: idx,
                }
            } else {
                RequestOwner::Activity(self.id)
            };
            for mut request in companion.request_resources(metric) {
                if request.activity_model.is_none() {
                    request.activity_model = Some(owner);
                }
                if let Some(kind) = kind {
                    request.companion_model_details = Some(CompanionModelDetails {
                        kind,
                        identifier: companion.identifier().to_string(),
                        measure: companion.measure().to_string(),
                    });
                }
                if request.category.is_empty() {
                    request.category = self.transaction_category.clone();
                }
                self.resource_request_list.push(request);
            }
        }
        debug!(requests = self.resource_request_list.len(), "请求阶段完成");

        // 3) 检查 → 调整 → 上报 → 扣减 → 执行
        self.check_resources(ctx, Uuid::new_v4())?;
        self.adjust_resources_for_timestep(ctx)?;

        if self.report_shortfalls(ctx)? {
            return Ok(());
        }

        let taken = self.take_resources(ctx)?;
        if taken || self.resource_request_list.is_empty() {
            self.perform_tasks_for_timestep(ctx, &participating)?;
        }
        Ok(())
    }

    // ==========================================
    // 策略查询
    // ==========================================

    /// 请求所属对象的短缺策略
    fn policy_for(&self, request: &ResourceRequest) -> EngineResult<ShortfallPolicy> {
        let owner = request
            .activity_model
            .ok_or_else(|| EngineError::MissingActivityModel {
                activity: self.qualified_name.clone(),
            })?;
        let unsupported = || EngineError::UnsupportedRequestOwner {
            activity: self.qualified_name.clone(),
            owner: format!("{:?}", owner),
        };
        if owner.activity_id() != self.id {
            return Err(unsupported());
        }
        match owner {
            RequestOwner::Activity(_) => Ok(self.shortfall_policy),
            RequestOwner::Companion { index, .. } => self
                .companions
                .get(index)
                .and_then(|c| c.shortfall_policy())
                .ok_or_else(unsupported),
        }
    }

    fn policies(&self, requests: &[ResourceRequest]) -> EngineResult<Vec<ShortfallPolicy>> {
        requests.iter().map(|r| self.policy_for(r)).collect()
    }

    fn owner_status(&self, owner: Option<RequestOwner>) -> ActivityStatus {
        match owner {
            Some(RequestOwner::Companion { index, .. }) => self
                .companion_status
                .get(index)
                .copied()
                .unwrap_or(self.status),
            _ => self.status,
        }
    }

    fn set_owner_status(&mut self, owner: Option<RequestOwner>, status: ActivityStatus) {
        match owner {
            Some(RequestOwner::Companion { index, .. }) => {
                if let Some(slot) = self.companion_status.get_mut(index) {
                    *slot = status;
                }
            }
            _ => self.status = status,
        }
    }

    // ==========================================
    // 检查
    // ==========================================

    /// 检查本活动请求列表的可用量并尝试转换
    ///
    /// # 返回
    /// - `Ok(true)`: 活动仍可执行
    /// - `Ok(false)`: 活动被跳过
    /// - `Err`: 编程错误或 ReportErrorAndStop
    pub fn check_resources(
        &mut self,
        ctx: &mut AllocationContext<'_>,
        batch_id: Uuid,
    ) -> EngineResult<bool> {
        let mut requests = std::mem::take(&mut self.resource_request_list);
        let result = self.check_resource_list(&mut requests, ctx, batch_id);
        self.resource_request_list = requests;
        result
    }

    /// 检查外部提供的请求列表（所属对象必须为本活动或其伴生组件）
    pub fn check_resource_list(
        &mut self,
        requests: &mut [ResourceRequest],
        ctx: &mut AllocationContext<'_>,
        batch_id: Uuid,
    ) -> EngineResult<bool> {
        if requests.is_empty() {
            self.status = ActivityStatus::NotNeeded;
            return Ok(true);
        }

        let policies = self.policies(requests)?;
        let activity_limits = self.nearest_labour_limits();

        for (request, policy) in requests.iter_mut().zip(&policies) {
            request.batch_id = Some(batch_id);
            request.available = 0.0;

            // 未跟踪的资源不构成约束
            if !ctx.resources.is_tracked(request.resource_type.as_ref()) {
                request.available = request.required;
                request.provided = request.required;
                continue;
            }
            if request.is_labour() {
                if let Some(pool) = ctx.resources.labour() {
                    request.available = ctx.labour.check(
                        request,
                        self.id,
                        activity_limits.as_ref(),
                        pool,
                        policy.allows_partial(),
                    );
                }
            } else if let Some(stock) = request.stock_name().and_then(|n| ctx.resources.find_stock(n)) {
                request.available = stock.amount.min(request.required).max(0.0);
            }
        }

        // 1) 短缺请求先做转换查询（不论策略）
        let shortfall_idx: Vec<usize> = requests
            .iter()
            .enumerate()
            .filter(|(_, r)| is_short(r.available, r.required))
            .map(|(idx, _)| idx)
            .collect();
        if !shortfall_idx.is_empty() {
            transmute(requests, &shortfall_idx, ctx, TransmutationPass::Query);
        }

        // 2) 策略为跳过的所属对象标记 Skipped
        for &idx in &shortfall_idx {
            if policies[idx] == ShortfallPolicy::SkipActivity {
                self.set_owner_status(requests[idx].activity_model, ActivityStatus::Skipped);
            }
        }

        let all_transmutations_successful = shortfall_idx
            .iter()
            .all(|&idx| requests[idx].transmutation_possible || !requests[idx].allow_transmutation);

        // 3) 忽略已跳过的所属对象后重新计算短缺
        let remaining: Vec<usize> = requests
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                is_short(r.available, r.required)
                    && self.owner_status(r.activity_model) != ActivityStatus::Skipped
            })
            .map(|(idx, _)| idx)
            .collect();

        if !remaining.is_empty() {
            if !all_transmutations_successful {
                match self.shortfall_policy {
                    ShortfallPolicy::ReportErrorAndStop => {
                        // 终止前先上报短缺
                        for &idx in &remaining {
                            let request = &requests[idx];
                            let market = ctx
                                .resources
                                .is_market_resource(request.resource_type.as_ref());
                            ctx.reporter.report_shortfall(&ShortfallEvent::from_request(
                                &self.qualified_name,
                                request,
                                market,
                            ));
                        }
                        self.status = ActivityStatus::Critical;
                        error!(
                            "资源不足: [a={}]，短缺时动作为 [Report error and stop]",
                            self.qualified_name
                        );
                        return Err(EngineError::InsufficientResources {
                            activity: self.qualified_name.clone(),
                        });
                    }
                    ShortfallPolicy::SkipActivity => self.status = ActivityStatus::Skipped,
                    _ => {}
                }
            }

            if self.status != ActivityStatus::Skipped {
                // 实际转换（可动用市场），然后按补充后的库存重算
                transmute(requests, &remaining, ctx, TransmutationPass::Apply);
                for request in requests.iter_mut() {
                    if let Some(stock) = request.stock_name().and_then(|n| ctx.resources.find_stock(n)) {
                        request.available = stock.amount.min(request.required).max(0.0);
                    }
                }
            }
        }

        Ok(self.status != ActivityStatus::Skipped)
    }

    // ==========================================
    // 调整
    // ==========================================

    fn adjust_resources_for_timestep(&mut self, ctx: &AllocationContext<'_>) -> EngineResult<()> {
        let policies = self.policies(&self.resource_request_list)?;
        let Some(shortfall) = minimum_shortfall_proportion(&self.resource_request_list, &policies)
        else {
            return Ok(());
        };

        match self
            .behavior
            .adjust_resources(&mut self.resource_request_list, &shortfall)
        {
            AdjustOutcome::Scaled => {
                debug!(proportion = shortfall.proportion, "已按最小短缺比例调整需求");
            }
            AdjustOutcome::Unscaled => {
                if ctx.warn_unscaled_shortfall {
                    let message = format!(
                        "活动 [a={}] 不支持资源短缺影响活动结果（最小可用比例 {:.3}），仅按 [UseAvailableResources] 处理",
                        self.qualified_name, shortfall.proportion
                    );
                    warn!("{}", message);
                    self.add_status_message(message);
                }
            }
        }
        Ok(())
    }

    // ==========================================
    // 短缺上报
    // ==========================================

    /// 上报所有短缺请求
    ///
    /// # 返回
    /// - `Ok(true)`: 活动已被跳过
    pub fn report_shortfalls(&mut self, ctx: &AllocationContext<'_>) -> EngineResult<bool> {
        let mut component_error = false;

        let short: Vec<usize> = self
            .resource_request_list
            .iter()
            .enumerate()
            .filter(|(_, r)| is_positive(r.required - r.available))
            .map(|(idx, _)| idx)
            .collect();

        for idx in short {
            let policy = self.policy_for(&self.resource_request_list[idx])?;
            let owner = self.resource_request_list[idx].activity_model;

            if policy == ShortfallPolicy::ReportErrorAndStop {
                self.set_owner_status(owner, ActivityStatus::Critical);
                let request = &self.resource_request_list[idx];
                error!(
                    "[r={}] 不足: 需求 {:.3}, 可用 {:.3}, 活动 [a={}]，短缺时动作为 [Report error and stop]",
                    request
                        .resource_type
                        .as_ref()
                        .map(|k| k.to_string())
                        .unwrap_or_default(),
                    request.required,
                    request.available,
                    self.qualified_name
                );
                component_error = true;
            }

            let request = &self.resource_request_list[idx];
            let market = ctx
                .resources
                .is_market_resource(request.resource_type.as_ref());
            ctx.reporter
                .report_shortfall(&ShortfallEvent::from_request(&self.qualified_name, request, market));

            if self.status != ActivityStatus::Skipped && policy != ShortfallPolicy::SkipActivity {
                self.status = ActivityStatus::Partial;
            }
        }

        if component_error {
            self.status = ActivityStatus::Critical;
            return Err(EngineError::ComponentShortfall {
                activity: self.qualified_name.clone(),
            });
        }
        Ok(self.status == ActivityStatus::Skipped)
    }

    // ==========================================
    // 扣减
    // ==========================================

    /// 扣减资源
    ///
    /// 仍然短缺且所属策略不允许部分资源的请求先被移除
    pub fn take_resources(&mut self, ctx: &mut AllocationContext<'_>) -> EngineResult<bool> {
        let mut requests = std::mem::take(&mut self.resource_request_list);
        let result = self.take_resource_list(&mut requests, ctx);
        self.resource_request_list = requests;
        result
    }

    /// 扣减外部提供的请求列表（须已经过 check）
    pub fn take_resource_list(
        &mut self,
        requests: &mut Vec<ResourceRequest>,
        ctx: &mut AllocationContext<'_>,
    ) -> EngineResult<bool> {
        if requests.is_empty() {
            return Ok(false);
        }

        let policies = self.policies(requests)?;
        let mut keep = policies.iter().map(|p| p.allows_partial());
        requests.retain(|r| {
            let allows_partial = keep.next().unwrap_or(true);
            !is_short(r.available, r.required) || allows_partial
        });

        let activity_limits = self.nearest_labour_limits();
        for request in requests.iter_mut() {
            request.provided = 0.0;
            if !ctx.resources.is_tracked(request.resource_type.as_ref()) {
                request.provided = request.required;
                continue;
            }
            if request.is_labour() {
                let allow_partial = self.policy_for(request)?.allows_partial();
                let checked = request.available;
                if let Some(pool) = ctx.resources.labour_mut() {
                    request.available = ctx.labour.take(
                        request,
                        self.id,
                        activity_limits.as_ref(),
                        pool,
                        allow_partial,
                    );
                }
                // check 时已满足，但同批次前面的请求占用了个体
                if !is_short(checked, request.required)
                    && is_short(request.provided, request.required)
                {
                    warn!(
                        "[a={}] 劳动力扣减不足: 需要 {:.2}，实际 {:.2}",
                        self.qualified_name, request.required, request.provided
                    );
                    if self.status != ActivityStatus::Skipped {
                        self.status = ActivityStatus::Partial;
                    }
                    let market = ctx
                        .resources
                        .is_market_resource(request.resource_type.as_ref());
                    let event =
                        ShortfallEvent::from_request(&self.qualified_name, request, market);
                    ctx.reporter.report_shortfall(&event);
                }
            } else if let Some(name) = request.stock_name().map(str::to_string) {
                if let Some(stock) = ctx.resources.find_stock_mut(&name) {
                    request.available = stock.amount.min(request.required).max(0.0);
                    stock.remove(request);
                }
            }
        }

        Ok(self.status != ActivityStatus::Ignored)
    }

    // ==========================================
    // 执行
    // ==========================================

    fn perform_tasks_for_timestep(
        &mut self,
        ctx: &AllocationContext<'_>,
        participating: &[usize],
    ) -> EngineResult<()> {
        let outcome = {
            let task_ctx = TaskContext {
                activity_id: self.id,
                date: ctx.date,
                zone_multiplier: ctx.zone_multiplier,
                requests: &self.resource_request_list,
            };
            self.behavior.perform_tasks(&task_ctx)
        };
        match outcome {
            TaskOutcome::Completed => self.set_status_success_or_partial(),
            TaskOutcome::NotNeeded => {}
            TaskOutcome::Warning(message) => {
                self.status = ActivityStatus::Warning;
                self.add_status_message(message);
            }
        }

        for &idx in participating {
            if !self.is_metric_driven(idx) {
                continue;
            }
            let metric = self.value_for_companion_model(idx)?;
            if is_negative(metric) {
                // 父活动报告问题，不是真实短缺
                let name = self.companions[idx].name().to_string();
                self.companion_status[idx] = ActivityStatus::Warning;
                self.add_status_message(format!("伴生组件 [{}] 报告问题，未执行", name));
                continue;
            }
            if !is_positive(metric) || self.companion_status[idx] == ActivityStatus::Skipped {
                continue;
            }
            self.companions[idx].perform_tasks(metric);
            if self.companion_status[idx] == ActivityStatus::NotNeeded {
                self.companion_status[idx] = ActivityStatus::Success;
            }
        }
        Ok(())
    }

    /// 无短缺时 NotNeeded → Success；Warning 不变
    pub fn set_status_success_or_partial(&mut self) {
        if self.status == ActivityStatus::NotNeeded {
            self.status = ActivityStatus::Success;
        }
    }
}

/// 对指定下标的请求执行一轮转换
fn transmute(
    requests: &mut [ResourceRequest],
    indices: &[usize],
    ctx: &mut AllocationContext<'_>,
    pass: TransmutationPass,
) {
    let mut selected: Vec<&mut ResourceRequest> = requests
        .iter_mut()
        .enumerate()
        .filter(|(idx, _)| indices.contains(idx))
        .map(|(_, r)| r)
        .collect();
    ctx.transmutation
        .transmute_shortfall(&mut selected, &mut *ctx.resources, pass);
}

fn blank_label(value: &str) -> String {
    if value.is_empty() {
        "BLANK".to_string()
    } else {
        value.to_string()
    }
}
