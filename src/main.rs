// ==========================================
// 活动资源分配引擎 - 场景运行入口
// ==========================================
// 用法:
//   activity-resource-engine <scenario.json> [engine.json]
// 运行汇总以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use activity_resource_engine::app::SimulationRunner;
use activity_resource_engine::config::{EngineConfig, ScenarioSpec};
use activity_resource_engine::logging;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let Some(scenario_path) = args.next().map(PathBuf::from) else {
        bail!("缺少场景文件参数: activity-resource-engine <scenario.json> [engine.json]");
    };
    let config_path = args.next().map(PathBuf::from);

    tracing::info!("==================================================");
    tracing::info!("{}", activity_resource_engine::APP_NAME);
    tracing::info!("系统版本: {}", activity_resource_engine::VERSION);
    tracing::info!("==================================================");

    let config = EngineConfig::load(config_path.as_deref()).context("加载引擎配置失败")?;
    let spec = ScenarioSpec::from_file(&scenario_path)
        .with_context(|| format!("加载场景文件失败: {}", scenario_path.display()))?;

    let mut runner = SimulationRunner::new(spec, config).context("构建场景失败")?;
    let summary = runner.run().context("模拟运行终止")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
