// ==========================================
// 活动资源分配引擎 - 活动计时器
// ==========================================
// 职责: 判断活动在给定时间步是否到期
// 说明: 活动树聚合祖先链上全部计时器，全部到期才执行
// ==========================================

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// Trait: ActivityTimer
// ==========================================
pub trait ActivityTimer: Send + Sync {
    fn name(&self) -> &str;

    /// 在给定日期是否到期
    fn is_due(&self, date: NaiveDate) -> bool;
}

/// 月份区间计时器（含首尾，可跨年，如 11 → 2）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRangeTimer {
    pub name: String,
    pub start_month: u32,
    pub end_month: u32,
}

impl MonthRangeTimer {
    pub fn new(name: impl Into<String>, start_month: u32, end_month: u32) -> Self {
        Self {
            name: name.into(),
            start_month,
            end_month,
        }
    }
}

impl ActivityTimer for MonthRangeTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_due(&self, date: NaiveDate) -> bool {
        let month = date.month();
        if self.start_month <= self.end_month {
            (self.start_month..=self.end_month).contains(&month)
        } else {
            month >= self.start_month || month <= self.end_month
        }
    }
}

/// 间隔计时器：自 start 所在月起每 interval_months 个月到期一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalTimer {
    pub name: String,
    pub start: NaiveDate,
    pub interval_months: u32,
}

impl IntervalTimer {
    pub fn new(name: impl Into<String>, start: NaiveDate, interval_months: u32) -> Self {
        Self {
            name: name.into(),
            start,
            interval_months,
        }
    }
}

impl ActivityTimer for IntervalTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_due(&self, date: NaiveDate) -> bool {
        let months = (date.year() - self.start.year()) * 12 + date.month() as i32
            - self.start.month() as i32;
        if months < 0 {
            return false;
        }
        let interval = self.interval_months.max(1) as i32;
        months % interval == 0
    }
}
