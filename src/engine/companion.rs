// ==========================================
// 活动资源分配引擎 - 伴生组件注册表
// ==========================================
// 职责:
// 1) 定义伴生组件接口（随父活动参与请求/执行流程）
// 2) 模拟开始时按类型、标识符归组伴生组件
// 3) 维护每个时间步的伴生度量值（未计算 与 0 区分）
// 4) 校验伴生组件的标识符/度量是否属于父活动声明的集合
// ==========================================

use crate::domain::labour::LabourLimits;
use crate::domain::request::ResourceRequest;
use crate::domain::types::{CompanionKind, ShortfallPolicy};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// 度量值为该哨兵（或任意负数）表示父活动报告了问题而非真实短缺
pub const COMPANION_PROBLEM_VALUE: f64 = -99999.0;

// ==========================================
// Trait: CompanionComponent
// ==========================================
pub trait CompanionComponent: Send + Sync {
    fn name(&self) -> &str;

    /// 组件类型名（按封闭集合解析，不支持的类型在注册时报错）
    fn type_name(&self) -> &str;

    fn identifier(&self) -> &str {
        ""
    }

    fn measure(&self) -> &str {
        ""
    }

    fn enabled(&self) -> bool {
        true
    }

    /// 组件自身的短缺策略（None 表示不支持策略上报）
    fn shortfall_policy(&self) -> Option<ShortfallPolicy> {
        None
    }

    /// 组件携带的劳动力上限（劳动力需求组件）
    fn labour_limits(&self) -> Option<&LabourLimits> {
        None
    }

    fn prepare_for_timestep(&mut self) {}

    /// 根据父活动提供的度量值生成资源请求
    fn request_resources(&mut self, _metric: f64) -> Vec<ResourceRequest> {
        Vec::new()
    }

    fn perform_tasks(&mut self, _metric: f64) {}
}

/// 父活动为某类伴生组件声明的标签
///
/// 空集合表示该字段必须为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanionLabels {
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
}

impl CompanionLabels {
    pub fn new(identifiers: &[&str], measures: &[&str]) -> Self {
        Self {
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
            measures: measures.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ==========================================
// CompanionValues - 伴生度量值
// ==========================================

/// (类型, 标识符, 度量)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompanionKey {
    pub kind: CompanionKind,
    pub identifier: String,
    pub measure: String,
}

impl CompanionKey {
    pub fn new(kind: CompanionKind, identifier: &str, measure: &str) -> Self {
        Self {
            kind,
            identifier: identifier.to_string(),
            measure: measure.to_string(),
        }
    }
}

/// 每个时间步重置为未计算(None)
#[derive(Debug, Clone, Default)]
pub struct CompanionValues {
    values: HashMap<CompanionKey, Option<f64>>,
}

impl CompanionValues {
    /// 登记度量槽位（初始 0）
    pub fn register(&mut self, key: CompanionKey) {
        self.values.entry(key).or_insert(Some(0.0));
    }

    /// 全部重置为未计算
    pub fn reset(&mut self) {
        for value in self.values.values_mut() {
            *value = None;
        }
    }

    pub fn set(&mut self, kind: CompanionKind, identifier: &str, measure: &str, value: f64) {
        self.values
            .insert(CompanionKey::new(kind, identifier, measure), Some(value));
    }

    /// Some(None) 表示已登记但本时间步未计算
    pub fn get(&self, key: &CompanionKey) -> Option<Option<f64>> {
        self.values.get(key).copied()
    }

    /// 是否存在该类型的槽位
    pub fn has_kind(&self, kind: CompanionKind) -> bool {
        self.values.keys().any(|k| k.kind == kind)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompanionKey> {
        self.values.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 校验告警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanionValidationWarning {
    pub companion: String,
    pub kind: CompanionKind,
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

// ==========================================
// CompanionModelRegistry - 伴生组件注册表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CompanionModelRegistry {
    kinds: Vec<CompanionKind>,
    labels: BTreeMap<CompanionKind, CompanionLabels>,
    located: BTreeMap<CompanionKind, BTreeMap<String, Vec<usize>>>,
}

impl CompanionModelRegistry {
    /// 解析全部伴生组件类型（不支持的类型立即报错）
    pub fn resolve_kinds(
        companions: &[Box<dyn CompanionComponent>],
    ) -> EngineResult<Vec<CompanionKind>> {
        companions
            .iter()
            .map(|c| {
                CompanionKind::from_type_name(c.type_name()).ok_or_else(|| {
                    EngineError::UnsupportedCompanionType {
                        type_name: c.type_name().to_string(),
                    }
                })
            })
            .collect()
    }

    /// 模拟开始时构建
    ///
    /// # 参数
    /// - `activity`: 父活动全名（用于错误信息）
    /// - `handles_companions`: 父活动是否支持伴生组件
    /// - `companions`: 直接子级伴生组件
    /// - `define_labels`: 父活动为每种类型声明的标签（None 表示未配置）
    /// - `values`: 父活动的伴生度量值表（登记槽位）
    pub fn build<F>(
        activity: &str,
        handles_companions: bool,
        companions: &[Box<dyn CompanionComponent>],
        define_labels: F,
        values: &mut CompanionValues,
    ) -> EngineResult<Self>
    where
        F: Fn(CompanionKind) -> Option<CompanionLabels>,
    {
        if companions.is_empty() {
            return Ok(Self::default());
        }
        if !handles_companions {
            return Err(EngineError::CompanionsNotSupported {
                activity: activity.to_string(),
            });
        }

        let kinds = Self::resolve_kinds(companions)?;
        let mut registry = Self {
            kinds: kinds.clone(),
            ..Default::default()
        };

        let mut distinct = kinds.clone();
        distinct.sort();
        distinct.dedup();

        for kind in distinct {
            let labels = define_labels(kind).ok_or_else(|| EngineError::MissingCompanionLabels {
                activity: activity.to_string(),
                kind: kind.to_string(),
            })?;

            let mut ids = labels.identifiers.clone();
            if ids.is_empty() {
                ids.push(String::new());
            }
            let measures_provided = !labels.measures.is_empty();

            let mut by_identifier = BTreeMap::new();
            for id in ids {
                let members: Vec<usize> = companions
                    .iter()
                    .enumerate()
                    .filter(|(idx, c)| kinds[*idx] == kind && c.identifier() == id && c.enabled())
                    .map(|(idx, _)| idx)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                if measures_provided {
                    for &idx in &members {
                        values.register(CompanionKey::new(kind, &id, companions[idx].measure()));
                    }
                }
                by_identifier.insert(id, members);
            }

            registry.located.insert(kind, by_identifier);
            registry.labels.insert(kind, labels);
        }

        Ok(registry)
    }

    /// 第 idx 个伴生组件的类型
    pub fn kind_of(&self, idx: usize) -> Option<CompanionKind> {
        self.kinds.get(idx).copied()
    }

    pub fn labels(&self, kind: CompanionKind) -> Option<&CompanionLabels> {
        self.labels.get(&kind)
    }

    /// 按标识符查找已定位的伴生组件
    ///
    /// # 返回
    /// - `Ok(Some(..))`: 找到
    /// - `Ok(None)`: 该类型/标识符下没有组件
    /// - `Err`: 标识符不在父活动声明的集合内
    pub fn by_identifier(
        &self,
        activity: &str,
        kind: CompanionKind,
        identifier: &str,
    ) -> EngineResult<Option<&[usize]>> {
        let Some(found) = self.located.get(&kind) else {
            return Ok(None);
        };
        if let Some(members) = found.get(identifier) {
            return Ok(Some(members.as_slice()));
        }
        let declared = self
            .labels
            .get(&kind)
            .map(|l| l.identifiers.iter().any(|i| i == identifier))
            .unwrap_or(false);
        if !declared {
            return Err(EngineError::UnknownCompanionIdentifier {
                activity: activity.to_string(),
                kind: kind.to_string(),
                identifier: identifier.to_string(),
            });
        }
        Ok(None)
    }

    /// 校验伴生组件的标识符与度量（只告警，不终止）
    pub fn validate<F>(
        activity: &str,
        companions: &[Box<dyn CompanionComponent>],
        define_labels: F,
    ) -> Vec<CompanionValidationWarning>
    where
        F: Fn(CompanionKind) -> Option<CompanionLabels>,
    {
        let mut warnings = Vec::new();
        for companion in companions {
            let Some(kind) = CompanionKind::from_type_name(companion.type_name()) else {
                continue;
            };
            let labels = define_labels(kind).unwrap_or_default();

            for (field, value, valid) in [
                ("identifier", companion.identifier(), &labels.identifiers),
                ("measure", companion.measure(), &labels.measures),
            ] {
                if label_is_valid(value, valid) {
                    continue;
                }
                let shown = if value.is_empty() { "BLANK" } else { value };
                let message = format!(
                    "[{}]:[{}] 的 {} [{}] 对父活动 [a={}] 无效，请从列表中选择",
                    kind, companion.name(), field, shown, activity
                );
                warn!("{}", message);
                warnings.push(CompanionValidationWarning {
                    companion: companion.name().to_string(),
                    kind,
                    field,
                    value: value.to_string(),
                    message,
                });
            }
        }
        warnings
    }
}

/// 标签取值是否有效: 声明集合为空时必须为空，否则必须属于集合
fn label_is_valid(value: &str, valid: &[String]) -> bool {
    if valid.is_empty() {
        value.is_empty()
    } else {
        !value.is_empty() && valid.iter().any(|v| v == value)
    }
}
