// ==========================================
// 活动资源分配引擎 - 资源池领域模型
// ==========================================
// 职责: 通用库存资源、资源持有者、资源池查询接口
// 说明: 资源池如何补充不在本引擎范围内
// ==========================================

use crate::domain::labour::LabourPool;
use crate::domain::request::{ResourceKind, ResourceRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// StockResource - 通用库存资源
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockResource {
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub unit_price: Option<f64>, // 有单价的资源计算 value
    #[serde(default)]
    pub market: bool, // 是否属于市场
}

impl StockResource {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
            unit_price: None,
            market: false,
        }
    }

    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = Some(price);
        self
    }

    pub fn in_market(mut self) -> Self {
        self.market = true;
        self
    }

    /// 按请求扣减库存
    ///
    /// 扣减量为 min(amount, required)，写入 provided 与 value
    pub fn remove(&mut self, request: &mut ResourceRequest) -> f64 {
        let taken = self.amount.min(request.required).max(0.0);
        self.amount -= taken;
        request.provided = taken;
        if let Some(price) = self.unit_price {
            request.value = taken * price;
        }
        taken
    }

    pub fn add(&mut self, quantity: f64) {
        self.amount += quantity.max(0.0);
    }
}

// ==========================================
// Trait: ResourcePool
// ==========================================
// 用途: 引擎消费的资源查询/扣减接口
pub trait ResourcePool {
    fn find_stock(&self, name: &str) -> Option<&StockResource>;

    fn find_stock_mut(&mut self, name: &str) -> Option<&mut StockResource>;

    fn labour(&self) -> Option<&LabourPool>;

    fn labour_mut(&mut self) -> Option<&mut LabourPool>;

    /// 资源类别是否被跟踪（未跟踪的资源永不构成约束）
    fn is_tracked(&self, kind: Option<&ResourceKind>) -> bool {
        match kind {
            None => false,
            Some(ResourceKind::Labour) => self.labour().is_some(),
            Some(ResourceKind::Stock(name)) => self.find_stock(name).is_some(),
        }
    }

    /// 资源是否属于市场（短缺上报到市场监听者）
    fn is_market_resource(&self, kind: Option<&ResourceKind>) -> bool {
        match kind {
            Some(ResourceKind::Stock(name)) => {
                self.find_stock(name).map(|s| s.market).unwrap_or(false)
            }
            _ => false,
        }
    }
}

// ==========================================
// ResourcesHolder - 资源持有者
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesHolder {
    #[serde(default)]
    pub stocks: BTreeMap<String, StockResource>,
    #[serde(default)]
    pub labour: Option<LabourPool>,
}

impl ResourcesHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(mut self, stock: StockResource) -> Self {
        self.stocks.insert(stock.name.clone(), stock);
        self
    }

    pub fn with_labour(mut self, labour: LabourPool) -> Self {
        self.labour = Some(labour);
        self
    }

    /// 库存数量（未跟踪返回 None）
    pub fn stock_amount(&self, name: &str) -> Option<f64> {
        self.stocks.get(name).map(|s| s.amount)
    }
}

impl ResourcePool for ResourcesHolder {
    fn find_stock(&self, name: &str) -> Option<&StockResource> {
        self.stocks.get(name)
    }

    fn find_stock_mut(&mut self, name: &str) -> Option<&mut StockResource> {
        self.stocks.get_mut(name)
    }

    fn labour(&self) -> Option<&LabourPool> {
        self.labour.as_ref()
    }

    fn labour_mut(&mut self) -> Option<&mut LabourPool> {
        self.labour.as_mut()
    }
}
