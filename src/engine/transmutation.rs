// ==========================================
// 活动资源分配引擎 - 资源转换
// ==========================================
// 职责: 短缺时尝试以其他资源换取目标资源
// 两轮:
// - Query: 只判断能否转换（仅本地资源），写入 transmutation_possible
// - Apply: 实际转换，可动用市场资源，扣减来源并补充目标
// ==========================================

use crate::domain::request::ResourceRequest;
use crate::domain::resource::ResourcePool;
use crate::engine::math::is_positive;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 转换轮次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmutationPass {
    Query,
    Apply,
}

// ==========================================
// Trait: TransmutationProvider
// ==========================================
pub trait TransmutationProvider {
    /// 尝试覆盖短缺
    ///
    /// # 参数
    /// - `shortfalls`: 处于短缺的请求
    /// - `resources`: 资源池（Query 轮不得修改）
    /// - `pass`: 转换轮次
    fn transmute_shortfall(
        &self,
        shortfalls: &mut [&mut ResourceRequest],
        resources: &mut dyn ResourcePool,
        pass: TransmutationPass,
    );
}

/// 不提供任何转换
#[derive(Debug, Clone, Default)]
pub struct NoTransmutation;

impl TransmutationProvider for NoTransmutation {
    fn transmute_shortfall(
        &self,
        shortfalls: &mut [&mut ResourceRequest],
        _resources: &mut dyn ResourcePool,
        _pass: TransmutationPass,
    ) {
        for request in shortfalls.iter_mut() {
            request.transmutation_possible = false;
        }
    }
}

// ==========================================
// TransmutationRules - 按规则转换库存
// ==========================================

/// 单条转换规则: 1 单位 target 需要 source_per_unit 单位 source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmutationRule {
    pub target: String,
    pub source: String,
    pub source_per_unit: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransmutationRules {
    #[serde(default)]
    pub rules: Vec<TransmutationRule>,
}

impl TransmutationRules {
    pub fn new(rules: Vec<TransmutationRule>) -> Self {
        Self { rules }
    }

    /// 选出第一条来源足够的规则
    fn find_rule(
        &self,
        target: &str,
        shortfall: f64,
        resources: &dyn ResourcePool,
        allow_market: bool,
    ) -> Option<&TransmutationRule> {
        self.rules.iter().filter(|r| r.target == target).find(|rule| {
            resources
                .find_stock(&rule.source)
                .map(|source| {
                    (allow_market || !source.market)
                        && source.amount >= shortfall * rule.source_per_unit
                })
                .unwrap_or(false)
        })
    }
}

impl TransmutationProvider for TransmutationRules {
    fn transmute_shortfall(
        &self,
        shortfalls: &mut [&mut ResourceRequest],
        resources: &mut dyn ResourcePool,
        pass: TransmutationPass,
    ) {
        for request in shortfalls.iter_mut() {
            request.transmutation_possible = false;
            if !request.allow_transmutation {
                continue;
            }
            let Some(target) = request.stock_name().map(str::to_string) else {
                continue;
            };
            let shortfall = request.shortfall();
            if !is_positive(shortfall) {
                continue;
            }

            let allow_market = pass == TransmutationPass::Apply;
            let Some(rule) = self.find_rule(&target, shortfall, &*resources, allow_market) else {
                debug!(target = %target, shortfall, "无可用转换规则");
                continue;
            };
            request.transmutation_possible = true;

            if pass == TransmutationPass::Apply {
                let cost = shortfall * rule.source_per_unit;
                if let Some(source) = resources.find_stock_mut(&rule.source) {
                    source.amount -= cost;
                }
                if let Some(stock) = resources.find_stock_mut(&target) {
                    stock.add(shortfall);
                }
                info!(
                    target = %target,
                    source = %rule.source,
                    quantity = shortfall,
                    cost,
                    "资源转换完成"
                );
            }
        }
    }
}
