// ==========================================
// 活动资源分配引擎 - 引擎错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 可恢复的短缺不走错误通道，只在活动内部处理；
//       这里只有致命错误（编程错误与 ReportErrorAndStop 策略）
// ==========================================

use thiserror::Error;

/// 引擎致命错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ===== 编程错误 =====
    #[error("资源请求缺少所属活动: [a={activity}]")]
    MissingActivityModel { activity: String },

    #[error("资源请求所属对象不支持短缺策略上报: owner={owner}, 活动=[a={activity}]")]
    UnsupportedRequestOwner { activity: String, owner: String },

    #[error("不支持的伴生组件类型: {type_name}")]
    UnsupportedCompanionType { type_name: String },

    #[error("伴生组件类型 [{kind}] 的标识符未配置: [a={activity}]")]
    MissingCompanionLabels { activity: String, kind: String },

    #[error("活动 [a={activity}] 不支持伴生组件")]
    CompanionsNotSupported { activity: String },

    #[error("活动 [a={activity}] 不支持伴生组件 [{kind}] 的标识符 [{identifier}]")]
    UnknownCompanionIdentifier {
        activity: String,
        kind: String,
        identifier: String,
    },

    #[error("伴生组件 [{kind}]-[{identifier}]-[{measure}] 的度量值未由 [a={activity}] 计算")]
    CompanionValueUnset {
        activity: String,
        kind: String,
        identifier: String,
        measure: String,
    },

    #[error("活动节点不存在: {0}")]
    UnknownActivity(usize),

    // ===== 策略致命 (ReportErrorAndStop) =====
    #[error("资源不足: [a={activity}]，短缺时动作为 [Report error and stop]")]
    InsufficientResources { activity: String },

    #[error("[a={activity}] 的组件资源不足，短缺时动作为 [Report error and stop]")]
    ComponentShortfall { activity: String },
}

impl EngineError {
    /// 是否为 ReportErrorAndStop 策略导致的终止
    pub fn is_policy_stop(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientResources { .. } | EngineError::ComponentShortfall { .. }
        )
    }
}

/// 引擎结果类型
pub type EngineResult<T> = Result<T, EngineError>;
