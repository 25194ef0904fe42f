// ==========================================
// 活动资源分配引擎 - 劳动力分配器
// ==========================================
// 职责: 按筛选组链为劳动力请求分配个体
// 输入: 劳动力请求 + 调用活动 + 劳动力池
// 输出: 可用量（check）/ 实际提供量（take）
// ==========================================
// 规则:
// 1) 先找能独立完成剩余需求的个体（剩余能力最小者优先）
// 2) 允许部分资源时，按能力从大到小分摊
// 3) 任一独立分配量低于人均下限则立即终止，不再尝试后续筛选组
// 4) check 与 take 共用同一算法，check 不修改劳动力池
// ==========================================

use crate::domain::labour::{CalculatedLimits, LabourGroup, LabourLimits, LabourPool};
use crate::domain::request::{ActivityId, ResourceRequest};
use crate::engine::math::{is_positive, TOLERANCE};
use tracing::{debug, instrument};

/// 一次分配计划
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabourAllocation {
    /// 裁剪到组上限后的需求量
    pub required: f64,
    /// 可分配总量
    pub amount: f64,
    /// (个体下标, 分配天数)
    pub allocations: Vec<(usize, f64)>,
    /// 是否因人均下限终止
    pub min_limit_reached: bool,
}

// ==========================================
// LabourAllocator - 劳动力分配器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LabourAllocator {
    /// 无归属需求时使用的合成上限
    default_limits: LabourLimits,
}

impl LabourAllocator {
    pub fn new(default_limits: LabourLimits) -> Self {
        Self { default_limits }
    }

    /// 确定适用的劳动力上限
    ///
    /// 顺序: 请求所属劳动力需求 → 调用活动最近的劳动力需求 → 合成默认值
    pub fn resolve_limits(
        &self,
        request: &ResourceRequest,
        activity_limits: Option<&LabourLimits>,
    ) -> LabourLimits {
        request
            .labour_limits
            .or_else(|| activity_limits.copied())
            .unwrap_or(self.default_limits)
    }

    /// 检查可用劳动力（不修改劳动力池）
    ///
    /// 注意: request.required 会被裁剪到 max_per_group
    pub fn check(
        &self,
        request: &mut ResourceRequest,
        activity: ActivityId,
        activity_limits: Option<&LabourLimits>,
        pool: &LabourPool,
        allow_partial: bool,
    ) -> f64 {
        let plan = self.plan(request, activity, activity_limits, pool, allow_partial);
        request.required = plan.required;
        plan.amount
    }

    /// 分配并扣减劳动力，累计 provided 与 value
    pub fn take(
        &self,
        request: &mut ResourceRequest,
        activity: ActivityId,
        activity_limits: Option<&LabourLimits>,
        pool: &mut LabourPool,
        allow_partial: bool,
    ) -> f64 {
        let plan = self.plan(request, activity, activity_limits, pool, allow_partial);
        request.required = plan.required;
        request.provided = 0.0;
        request.value = 0.0;

        for (idx, amount) in &plan.allocations {
            if let Some(individual) = pool.individuals.get_mut(*idx) {
                individual.record_allocation(activity, *amount);
                request.provided += amount;
                request.value += amount * individual.pay_rate;
            }
        }
        plan.amount
    }

    /// 计算分配计划
    ///
    /// 同一计划内对个体的占用记在临时账上，使 check 的结果与 take 一致
    #[instrument(skip_all, fields(activity = %activity, required = request.required, allow_partial = allow_partial))]
    pub fn plan(
        &self,
        request: &ResourceRequest,
        activity: ActivityId,
        activity_limits: Option<&LabourLimits>,
        pool: &LabourPool,
        allow_partial: bool,
    ) -> LabourAllocation {
        let limits = self
            .resolve_limits(request, activity_limits)
            .calculate(request.required);
        let needed = request.required.min(limits.max_days_per_group).max(0.0);

        let mut plan = LabourAllocation {
            required: needed,
            ..Default::default()
        };
        let mut tentative = vec![0.0_f64; pool.individuals.len()];

        // 无筛选组时视为任意劳动力
        let any_group = LabourGroup::any();
        let mut current: Option<&LabourGroup> =
            Some(request.filter_details.first().unwrap_or(&any_group));

        while let Some(group) = current {
            if !is_positive(needed - plan.amount) {
                break;
            }

            let candidates: Vec<usize> = group
                .filter_indices(pool)
                .into_iter()
                .filter(|&idx| !is_capped(pool, idx, activity, &limits, &tentative))
                .collect();

            // 1) 整体任务优先：剩余能力足够且最紧凑者
            loop {
                let remaining = needed - plan.amount;
                if !is_positive(remaining) {
                    break;
                }
                let tightest = candidates
                    .iter()
                    .map(|&idx| (idx, capacity(pool, idx, activity, &limits, &tentative)))
                    .filter(|(_, cap)| *cap >= remaining - TOLERANCE)
                    .min_by(|a, b| a.1.total_cmp(&b.1));

                let Some((idx, cap)) = tightest else {
                    break;
                };

                let amount = remaining.min(cap).min(limits.max_days_per_person);
                if amount < limits.min_days_per_person {
                    debug!(
                        group = %group.name,
                        amount,
                        min_per_person = limits.min_days_per_person,
                        "低于人均下限，终止劳动力分配"
                    );
                    plan.min_limit_reached = true;
                    return plan;
                }
                if !is_positive(amount) {
                    break;
                }

                tentative[idx] += amount;
                plan.amount += amount;
                plan.allocations.push((idx, amount));
            }

            // 2) 部分任务：能力从大到小分摊
            if allow_partial && is_positive(needed - plan.amount) {
                let mut ordered: Vec<(usize, f64)> = candidates
                    .iter()
                    .map(|&idx| (idx, capacity(pool, idx, activity, &limits, &tentative)))
                    .collect();
                ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

                for (idx, cap) in ordered {
                    let remaining = needed - plan.amount;
                    if !is_positive(remaining) {
                        break;
                    }
                    let amount = remaining.min(cap).min(limits.max_days_per_person);
                    if amount >= limits.min_days_per_person && is_positive(amount) {
                        tentative[idx] += amount;
                        plan.amount += amount;
                        plan.allocations.push((idx, amount));
                    }
                }
            }

            current = group.child.as_deref();
        }

        debug!(provided = plan.amount, people = plan.allocations.len(), "劳动力分配计划完成");
        plan
    }
}

/// 个体对调用活动的剩余能力（扣除本计划临时占用）
fn capacity(
    pool: &LabourPool,
    idx: usize,
    activity: ActivityId,
    limits: &CalculatedLimits,
    tentative: &[f64],
) -> f64 {
    let individual = &pool.individuals[idx];
    (individual.capacity_for_activity(activity, limits.max_days_per_person) - tentative[idx])
        .max(0.0)
}

/// 个体是否已达到调用活动的人均上限
fn is_capped(
    pool: &LabourPool,
    idx: usize,
    activity: ActivityId,
    limits: &CalculatedLimits,
    tentative: &[f64],
) -> bool {
    let individual = &pool.individuals[idx];
    let used = if individual.last_request_owner == Some(activity) {
        individual.last_request_amount
    } else {
        0.0
    };
    used + tentative[idx] >= limits.max_days_per_person
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labour::{LabourFilter, LabourIndividual};
    use crate::domain::types::Sex;

    fn pool_with(capacities: &[f64]) -> LabourPool {
        LabourPool::new(
            capacities
                .iter()
                .enumerate()
                .map(|(i, &days)| LabourIndividual::new(format!("P{}", i), Sex::Female, 30.0, days))
                .collect(),
        )
    }

    fn limits(max_pp: f64, min_pp: f64) -> LabourLimits {
        LabourLimits {
            max_per_person: max_pp,
            min_per_person: min_pp,
            ..LabourLimits::default()
        }
    }

    #[test]
    fn test_whole_task_picks_tightest_fit() {
        let pool = pool_with(&[20.0, 6.0, 9.0]);
        let allocator = LabourAllocator::default();
        let mut request = ResourceRequest::labour(5.0);
        let plan = allocator.plan(&request, ActivityId::new(), None, &pool, false);
        assert_eq!(plan.allocations, vec![(1, 5.0)]);

        let available = allocator.check(&mut request, ActivityId::new(), None, &pool, false);
        assert_eq!(available, 5.0);
    }

    #[test]
    fn test_partial_descending_allocation() {
        let mut pool = pool_with(&[4.0, 6.0]);
        let allocator = LabourAllocator::default();
        let activity = ActivityId::new();
        let lim = limits(8.0, 2.0);

        let mut request = ResourceRequest::labour(10.0);
        let provided = allocator.take(&mut request, activity, Some(&lim), &mut pool, true);
        assert_eq!(provided, 10.0);
        assert_eq!(request.provided, 10.0);
        assert_eq!(pool.individuals[0].available_days, 0.0);
        assert_eq!(pool.individuals[1].available_days, 0.0);
    }

    #[test]
    fn test_no_partial_without_permission() {
        let pool = pool_with(&[4.0, 6.0]);
        let allocator = LabourAllocator::default();
        let mut request = ResourceRequest::labour(10.0);
        let available = allocator.check(&mut request, ActivityId::new(), None, &pool, false);
        assert_eq!(available, 0.0);
    }

    #[test]
    fn test_below_minimum_is_not_allocated() {
        let mut pool = pool_with(&[1.0]);
        let allocator = LabourAllocator::default();
        let lim = limits(8.0, 2.0);
        let mut request = ResourceRequest::labour(10.0);
        let provided = allocator.take(&mut request, ActivityId::new(), Some(&lim), &mut pool, true);
        assert_eq!(provided, 0.0);
        assert_eq!(pool.individuals[0].available_days, 1.0);
        assert!(pool.individuals[0].last_request_owner.is_none());
    }

    #[test]
    fn test_whole_task_below_minimum_halts_chain() {
        // 第一组满足 9 天后剩余 1 天，第二组的整体分配 1 < 下限 2，立即终止
        let pool = LabourPool::new(vec![
            LabourIndividual::new("Ann", Sex::Female, 30.0, 9.0),
            LabourIndividual::new("Bob", Sex::Male, 30.0, 5.0),
        ]);
        let chain = LabourGroup::new("Women", vec![LabourFilter::Sex(Sex::Female)])
            .with_child(LabourGroup::new("Men", vec![LabourFilter::Sex(Sex::Male)]));
        let request = ResourceRequest::labour(10.0).with_filters(vec![chain]);
        let allocator = LabourAllocator::default();

        let plan = allocator.plan(&request, ActivityId::new(), Some(&limits(9.0, 2.0)), &pool, true);
        assert!(plan.min_limit_reached);
        assert_eq!(plan.amount, 9.0);
        assert_eq!(plan.allocations, vec![(0, 9.0)]);
    }

    #[test]
    fn test_required_clamped_to_group_maximum() {
        let pool = pool_with(&[20.0]);
        let allocator = LabourAllocator::default();
        let lim = LabourLimits {
            max_per_group: 6.0,
            ..LabourLimits::default()
        };
        let mut request = ResourceRequest::labour(10.0);
        let available = allocator.check(&mut request, ActivityId::new(), Some(&lim), &pool, false);
        assert_eq!(request.required, 6.0);
        assert_eq!(available, 6.0);
    }

    #[test]
    fn test_same_activity_cap_across_requests() {
        let mut pool = pool_with(&[20.0]);
        let allocator = LabourAllocator::default();
        let activity = ActivityId::new();
        let lim = limits(8.0, 0.0);

        let mut first = ResourceRequest::labour(5.0);
        allocator.take(&mut first, activity, Some(&lim), &mut pool, true);
        let mut second = ResourceRequest::labour(5.0);
        let provided = allocator.take(&mut second, activity, Some(&lim), &mut pool, true);
        // 同一活动人均上限 8，已用 5，本次只能再给 3
        assert_eq!(provided, 3.0);

        // 其他活动不受该标记约束
        let mut other = ResourceRequest::labour(5.0);
        let provided = allocator.take(&mut other, ActivityId::new(), Some(&lim), &mut pool, true);
        assert_eq!(provided, 5.0);
    }

    #[test]
    fn test_value_uses_pay_rate() {
        let mut pool = LabourPool::new(vec![
            LabourIndividual::new("Ann", Sex::Female, 30.0, 10.0).with_pay_rate(100.0),
        ]);
        let mut request = ResourceRequest::labour(4.0);
        LabourAllocator::default().take(&mut request, ActivityId::new(), None, &mut pool, false);
        assert_eq!(request.value, 400.0);
    }
}
