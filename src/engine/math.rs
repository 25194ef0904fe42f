// ==========================================
// 活动资源分配引擎 - 浮点比较工具
// ==========================================
// 职责: 统一的容差比较，避免短缺判定受浮点误差影响
// ==========================================

/// 比较容差
pub const TOLERANCE: f64 = 1e-5;

/// 严格为正（大于容差）
pub fn is_positive(value: f64) -> bool {
    value > TOLERANCE
}

/// 严格为负（小于负容差）
pub fn is_negative(value: f64) -> bool {
    value < -TOLERANCE
}

/// a > b（考虑容差）
pub fn is_greater_than(a: f64, b: f64) -> bool {
    is_positive(a - b)
}

/// 是否存在短缺: available < required
pub fn is_short(available: f64, required: f64) -> bool {
    is_negative(available - required)
}
