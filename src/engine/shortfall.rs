// ==========================================
// 活动资源分配引擎 - 短缺比例计算
// ==========================================
// 职责: 计算 UseAvailableWithImplications 请求的最小可用比例，
//       并为选择按比例缩减的活动提供缩减工具
// 说明: 默认调整钩子只告警，不会自动缩减活动结果
// ==========================================

use crate::domain::request::ResourceRequest;
use crate::domain::types::ShortfallPolicy;
use crate::engine::math::{is_greater_than, is_short};

/// 最小短缺比例
#[derive(Debug, Clone, PartialEq)]
pub struct ShortfallProportion {
    /// 最小可用比例 (available / required)
    pub proportion: f64,
    /// 取得最小比例的请求下标
    pub limiting_request: usize,
    /// 所有按比例影响结果的短缺请求下标
    pub shortfall_requests: Vec<usize>,
}

/// 计算最小短缺比例
///
/// # 参数
/// - `requests`: 本时间步的请求列表
/// - `policies`: 与 requests 一一对应的所属策略
///
/// # 返回
/// - `None`: 不存在 UseAvailableWithImplications 的短缺请求
pub fn minimum_shortfall_proportion(
    requests: &[ResourceRequest],
    policies: &[ShortfallPolicy],
) -> Option<ShortfallProportion> {
    let shortfall_requests: Vec<usize> = requests
        .iter()
        .zip(policies)
        .enumerate()
        .filter(|(_, (request, policy))| {
            is_short(request.available, request.required)
                && **policy == ShortfallPolicy::UseAvailableWithImplications
        })
        .map(|(idx, _)| idx)
        .collect();

    let limiting_request = shortfall_requests.iter().copied().min_by(|&a, &b| {
        requests[a]
            .available_proportion()
            .total_cmp(&requests[b].available_proportion())
    })?;

    Some(ShortfallProportion {
        proportion: requests[limiting_request].available_proportion(),
        limiting_request,
        shortfall_requests,
    })
}

/// 按最小比例缩减其他请求的需求量
///
/// 仅缩减可用比例高于最小比例的请求；返回被缩减的请求数
pub fn scale_to_minimum_shortfall(
    requests: &mut [ResourceRequest],
    proportion: &ShortfallProportion,
) -> usize {
    let mut scaled = 0;
    for (idx, request) in requests.iter_mut().enumerate() {
        if idx == proportion.limiting_request {
            continue;
        }
        if is_greater_than(request.available_proportion(), proportion.proportion) {
            request.required *= proportion.proportion;
            request.available = request.available.min(request.required);
            scaled += 1;
        }
    }
    scaled
}
