// ==========================================
// 活动资源分配引擎 - 劳动力领域模型
// ==========================================
// 职责: 劳动力个体、劳动力池、筛选组链、劳动力上限
// 红线: 个体的 last_request 标记只在单一遍历顺序下成立，
//       同一时间步内不允许并发遍历活动树
// ==========================================

use crate::domain::request::ActivityId;
use crate::domain::types::{LabourLimitStyle, Sex};
use serde::{Deserialize, Serialize};

// ==========================================
// LabourIndividual - 劳动力个体
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabourIndividual {
    pub name: String,
    pub sex: Sex,
    pub age_years: f64,
    #[serde(default)]
    pub hired: bool,

    // ===== 本时间步可用 =====
    pub available_days: f64, // 剩余可用天数
    #[serde(default)]
    pub pay_rate: f64, // 日薪

    // ===== 同活动去重标记 =====
    #[serde(skip)]
    pub last_request_owner: Option<ActivityId>,
    #[serde(skip)]
    pub last_request_amount: f64,
}

impl LabourIndividual {
    pub fn new(name: impl Into<String>, sex: Sex, age_years: f64, available_days: f64) -> Self {
        Self {
            name: name.into(),
            sex,
            age_years,
            hired: false,
            available_days,
            pay_rate: 0.0,
            last_request_owner: None,
            last_request_amount: 0.0,
        }
    }

    pub fn with_pay_rate(mut self, pay_rate: f64) -> Self {
        self.pay_rate = pay_rate;
        self
    }

    /// 对指定活动的当前可用量
    ///
    /// 同一活动在本时间步内已分配的量计入 max_per_person；
    /// 其他活动的分配只体现在 available_days 上
    pub fn capacity_for_activity(&self, activity: ActivityId, max_per_person: f64) -> f64 {
        let cap = if self.last_request_owner == Some(activity) {
            max_per_person - self.last_request_amount
        } else {
            max_per_person
        };
        self.available_days.min(cap).max(0.0)
    }

    /// 该个体是否已达到该活动的人均上限
    pub fn is_capped_for(&self, activity: ActivityId, max_per_person: f64) -> bool {
        self.last_request_owner == Some(activity) && self.last_request_amount >= max_per_person
    }

    /// 记录一次分配（扣减可用天数并更新去重标记）
    pub fn record_allocation(&mut self, activity: ActivityId, amount: f64) {
        if self.last_request_owner != Some(activity) {
            self.last_request_amount = 0.0;
        }
        self.last_request_owner = Some(activity);
        self.last_request_amount += amount;
        self.available_days = (self.available_days - amount).max(0.0);
    }
}

// ==========================================
// LabourPool - 劳动力池
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabourPool {
    pub individuals: Vec<LabourIndividual>,
}

impl LabourPool {
    pub fn new(individuals: Vec<LabourIndividual>) -> Self {
        Self { individuals }
    }

    /// 全部个体剩余天数合计
    pub fn total_available(&self) -> f64 {
        self.individuals.iter().map(|i| i.available_days).sum()
    }
}

// ==========================================
// LabourFilter - 单个筛选条件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum LabourFilter {
    Name(String),
    Sex(Sex),
    MinAge(f64),
    MaxAge(f64),
    Hired(bool),
}

impl LabourFilter {
    pub fn matches(&self, individual: &LabourIndividual) -> bool {
        match self {
            LabourFilter::Name(name) => individual.name == *name,
            LabourFilter::Sex(sex) => individual.sex == *sex,
            LabourFilter::MinAge(age) => individual.age_years >= *age,
            LabourFilter::MaxAge(age) => individual.age_years <= *age,
            LabourFilter::Hired(hired) => individual.hired == *hired,
        }
    }
}

// ==========================================
// LabourGroup - 筛选组（链式，单一后继）
// ==========================================
// 无筛选条件的组匹配全部个体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabourGroup {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<LabourFilter>,
    #[serde(default)]
    pub child: Option<Box<LabourGroup>>,
}

impl LabourGroup {
    pub fn new(name: impl Into<String>, filters: Vec<LabourFilter>) -> Self {
        Self {
            name: name.into(),
            filters,
            child: None,
        }
    }

    /// 匹配全部个体的组
    pub fn any() -> Self {
        Self::new("Any labour", Vec::new())
    }

    pub fn with_child(mut self, child: LabourGroup) -> Self {
        self.child = Some(Box::new(child));
        self
    }

    pub fn matches(&self, individual: &LabourIndividual) -> bool {
        self.filters.iter().all(|f| f.matches(individual))
    }

    /// 按顺序返回本组匹配的个体下标
    pub fn filter_indices(&self, pool: &LabourPool) -> Vec<usize> {
        pool.individuals
            .iter()
            .enumerate()
            .filter(|(_, individual)| self.matches(individual))
            .map(|(idx, _)| idx)
            .collect()
    }
}

// ==========================================
// LabourLimits - 劳动力需求上限
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabourLimits {
    #[serde(default)]
    pub limit_style: LabourLimitStyle,
    pub max_per_person: f64,
    #[serde(default)]
    pub min_per_person: f64,
    pub max_per_group: f64,
}

impl Default for LabourLimits {
    /// 转换请求等无归属需求使用的宽松上限
    fn default() -> Self {
        Self {
            limit_style: LabourLimitStyle::AsDaysRequired,
            max_per_person: 1000.0,
            min_per_person: 0.0,
            max_per_group: 10000.0,
        }
    }
}

/// 按需求量折算后的上限（天）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculatedLimits {
    pub max_days_per_person: f64,
    pub min_days_per_person: f64,
    pub max_days_per_group: f64,
}

impl LabourLimits {
    /// 根据需求天数计算实际上限
    pub fn calculate(&self, amount_needed: f64) -> CalculatedLimits {
        match self.limit_style {
            LabourLimitStyle::AsDaysRequired => CalculatedLimits {
                max_days_per_person: self.max_per_person,
                min_days_per_person: self.min_per_person,
                max_days_per_group: self.max_per_group,
            },
            LabourLimitStyle::AsProportionOfRequired => CalculatedLimits {
                max_days_per_person: amount_needed * self.max_per_person,
                min_days_per_person: amount_needed * self.min_per_person,
                max_days_per_group: amount_needed * self.max_per_group,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_tracks_same_activity_only() {
        let activity_a = ActivityId::new();
        let activity_b = ActivityId::new();
        let mut person = LabourIndividual::new("Ann", Sex::Female, 30.0, 20.0);

        person.record_allocation(activity_a, 6.0);
        assert_eq!(person.available_days, 14.0);
        // 同一活动：人均上限 8，已用 6，剩 2
        assert_eq!(person.capacity_for_activity(activity_a, 8.0), 2.0);
        // 其他活动：仅受剩余天数与人均上限约束
        assert_eq!(person.capacity_for_activity(activity_b, 8.0), 8.0);

        person.record_allocation(activity_b, 3.0);
        assert_eq!(person.last_request_amount, 3.0);
        assert_eq!(person.capacity_for_activity(activity_a, 8.0), 8.0);
    }

    #[test]
    fn test_capped_for_activity() {
        let activity = ActivityId::new();
        let mut person = LabourIndividual::new("Bob", Sex::Male, 40.0, 30.0);
        person.record_allocation(activity, 8.0);
        assert!(person.is_capped_for(activity, 8.0));
        assert!(!person.is_capped_for(ActivityId::new(), 8.0));
    }

    #[test]
    fn test_group_filters() {
        let pool = LabourPool::new(vec![
            LabourIndividual::new("Ann", Sex::Female, 30.0, 20.0),
            LabourIndividual::new("Bob", Sex::Male, 15.0, 20.0),
            LabourIndividual::new("Cat", Sex::Female, 12.0, 20.0),
        ]);
        let adults = LabourGroup::new("Adults", vec![LabourFilter::MinAge(16.0)]);
        assert_eq!(adults.filter_indices(&pool), vec![0]);

        let girls = LabourGroup::new(
            "Girls",
            vec![LabourFilter::Sex(Sex::Female), LabourFilter::MaxAge(15.0)],
        );
        assert_eq!(girls.filter_indices(&pool), vec![2]);
        assert_eq!(LabourGroup::any().filter_indices(&pool).len(), 3);
    }

    #[test]
    fn test_proportional_limits() {
        let limits = LabourLimits {
            limit_style: LabourLimitStyle::AsProportionOfRequired,
            max_per_person: 0.5,
            min_per_person: 0.1,
            max_per_group: 1.0,
        };
        let calculated = limits.calculate(20.0);
        assert_eq!(calculated.max_days_per_person, 10.0);
        assert_eq!(calculated.min_days_per_person, 2.0);
        assert_eq!(calculated.max_days_per_group, 20.0);
    }
}
