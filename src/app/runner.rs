// ==========================================
// 活动资源分配引擎 - 模拟运行器
// ==========================================
// 职责: 按月步进驱动活动树，汇总每个时间步的状态与短缺
// 说明: ReportErrorAndStop 等致命错误终止整个运行
// ==========================================

use crate::config::engine_config::{ConfigError, EngineConfig};
use crate::config::scenario::{Scenario, ScenarioSpec};
use crate::engine::error::EngineError;
use crate::engine::events::{ActivityReporter, RecordingListener, ShortfallEvent};
use crate::engine::tree::TimestepSummary;
use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// 运行器错误
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("第 {step} 个时间步 ({date}) 终止: {source}")]
    Engine {
        step: u32,
        date: NaiveDate,
        #[source]
        source: EngineError,
    },

    #[error("时间步日期越界: 起始 {start}, 第 {step} 步")]
    DateOverflow { start: NaiveDate, step: u32 },
}

/// 单个时间步报告
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    #[serde(flatten)]
    pub summary: TimestepSummary,
    pub shortfalls: Vec<ShortfallEvent>,
}

/// 运行汇总
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub zone: String,
    pub start_date: NaiveDate,
    pub steps: Vec<StepReport>,
    /// 运行结束时的库存
    pub final_stocks: BTreeMap<String, f64>,
}

// ==========================================
// SimulationRunner - 模拟运行器
// ==========================================
pub struct SimulationRunner {
    config: EngineConfig,
    scenario: Scenario,
    listener: Arc<RecordingListener>,
}

impl SimulationRunner {
    /// 由场景定义构建（事件记录到内部监听者）
    pub fn new(spec: ScenarioSpec, config: EngineConfig) -> Result<Self, RunnerError> {
        let listener = Arc::new(RecordingListener::new());
        let scenario = spec.build(&config, ActivityReporter::recording(listener.clone()))?;
        Ok(Self {
            config,
            scenario,
            listener,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// 运行全部时间步
    #[instrument(skip_all, fields(zone = %self.scenario.tree.zone(), timesteps = self.config.timesteps))]
    pub fn run(&mut self) -> Result<RunSummary, RunnerError> {
        let warnings = self
            .scenario
            .tree
            .start_of_simulation()
            .map_err(|source| RunnerError::Engine {
                step: 0,
                date: self.config.start_date,
                source,
            })?;
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "伴生组件标签校验存在告警");
        }

        let mut steps = Vec::with_capacity(self.config.timesteps as usize);
        for step in 0..self.config.timesteps {
            let date = self
                .config
                .start_date
                .checked_add_months(Months::new(step))
                .ok_or(RunnerError::DateOverflow {
                    start: self.config.start_date,
                    step,
                })?;
            steps.push(self.run_step(step, date)?);
        }

        let summary = RunSummary {
            zone: self.scenario.tree.zone().to_string(),
            start_date: self.config.start_date,
            steps,
            final_stocks: self
                .scenario
                .resources
                .stocks
                .iter()
                .map(|(name, stock)| (name.clone(), stock.amount))
                .collect(),
        };
        info!(steps = summary.steps.len(), "模拟运行完成");
        Ok(summary)
    }

    /// 执行单个时间步（劳动力可用天数先恢复）
    pub fn run_step(&mut self, step: u32, date: NaiveDate) -> Result<StepReport, RunnerError> {
        let Scenario {
            tree,
            resources,
            transmutation,
            labour_template,
        } = &mut self.scenario;

        if let Some(template) = labour_template {
            resources.labour = Some(template.clone());
        }

        let summary = tree
            .run_timestep(date, resources, transmutation)
            .map_err(|source| RunnerError::Engine { step, date, source })?;
        let (shortfalls, _) = self.listener.drain();

        Ok(StepReport {
            summary,
            shortfalls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ActivityStatus;

    fn spec(policy: &str, hay: f64) -> ScenarioSpec {
        let raw = format!(
            r#"{{
                "zone": "Farm",
                "stocks": [{{"name": "Hay", "amount": {hay}}}],
                "activities": [{{
                    "name": "Feed",
                    "policy": "{policy}",
                    "demands": [{{"resource": {{"kind": "STOCK", "name": "Hay"}}, "amount": 10.0}}]
                }}]
            }}"#
        );
        ScenarioSpec::from_json_str(&raw).unwrap()
    }

    fn config(timesteps: u32) -> EngineConfig {
        EngineConfig {
            timesteps,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_monthly_steps() {
        let mut runner = SimulationRunner::new(spec("USE_AVAILABLE_RESOURCES", 25.0), config(3)).unwrap();
        let summary = runner.run().unwrap();

        assert_eq!(summary.steps.len(), 3);
        assert_eq!(
            summary.steps[1].summary.date,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert_eq!(summary.steps[0].summary.status_of("Farm.Feed"), Some(ActivityStatus::Success));
        // 第三个月只剩 5
        assert_eq!(summary.steps[2].summary.status_of("Farm.Feed"), Some(ActivityStatus::Partial));
        assert_eq!(summary.steps[2].shortfalls.len(), 1);
        assert_eq!(summary.final_stocks.get("Hay"), Some(&0.0));
    }

    #[test]
    fn test_report_error_and_stop_aborts_run() {
        let mut runner = SimulationRunner::new(spec("REPORT_ERROR_AND_STOP", 15.0), config(3)).unwrap();
        let err = runner.run().unwrap_err();
        match err {
            RunnerError::Engine { step, source, .. } => {
                assert_eq!(step, 1);
                assert!(source.is_policy_stop());
                assert!(source.to_string().contains("Farm.Feed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
