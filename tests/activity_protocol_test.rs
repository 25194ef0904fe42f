// ==========================================
// 活动资源协议集成测试
// ==========================================
// 测试范围:
// 1. 检查阶段: 未跟踪资源、幂等性、转换
// 2. 短缺策略: ReportErrorAndStop / SkipActivity / UseAvailable*
// 3. 编程错误: 缺少所属活动、外部所属对象、未计算的伴生度量值
// 4. 伴生组件: 问题哨兵值、跟随父活动策略
// ==========================================

mod helpers;

use activity_resource_engine::domain::request::RequestOwner;
use activity_resource_engine::engine::{
    ActivityFee, ActivityFolder, ActivityTree, CompanionLabels, CompanionMetric, FixedDemand,
    FixedDemandBehavior, NoTransmutation, TransmutationRule, TransmutationRules,
};
use activity_resource_engine::{
    Activity, ActivityStatus, CompanionKind, EngineError, ResourceKind, ResourceRequest,
    ResourcesHolder, ShortfallPolicy, StockResource,
};
use helpers::engine_harness::{performed_count, CountingBehavior, Harness};
use uuid::Uuid;

fn hay_holder(amount: f64) -> ResourcesHolder {
    ResourcesHolder::new().with_stock(StockResource::new("Hay", amount))
}

fn fixed(name: &str, demands: Vec<FixedDemand>) -> Activity {
    Activity::new(name, Box::new(FixedDemandBehavior::new(demands)))
}

// ==========================================
// 检查阶段
// ==========================================

#[test]
fn test_untracked_resource_never_constrains() {
    let mut harness = Harness::new(ResourcesHolder::new());
    let (behavior, performed) = CountingBehavior::new(vec![ResourceRequest::new(
        Some(ResourceKind::Stock("Water".to_string())),
        10.0,
    )]);
    let mut activity = Activity::new("Irrigate", Box::new(behavior));

    harness.run(&mut activity, &NoTransmutation).unwrap();

    let request = &activity.resource_requests()[0];
    assert_eq!(request.available, 10.0);
    assert_eq!(request.provided, 10.0);
    assert_eq!(activity.status(), ActivityStatus::Success);
    assert_eq!(performed_count(&performed), 1);
    assert!(harness.listener.shortfalls().is_empty());
}

#[test]
fn test_check_is_idempotent() {
    let mut harness = Harness::new(hay_holder(6.0));
    let mut activity = fixed("Feed", vec![]).with_policy(ShortfallPolicy::UseAvailableResources);
    let owner = RequestOwner::Activity(activity.id());
    let mut requests = vec![ResourceRequest::stock("Hay", 10.0).with_owner(owner)];

    let mut ctx = harness.context(&NoTransmutation);
    activity
        .check_resource_list(&mut requests, &mut ctx, Uuid::new_v4())
        .unwrap();
    let first = requests[0].available;
    activity
        .check_resource_list(&mut requests, &mut ctx, Uuid::new_v4())
        .unwrap();

    assert_eq!(first, 6.0);
    assert_eq!(requests[0].available, first);
    assert_eq!(harness.resources.stock_amount("Hay"), Some(6.0));
}

#[test]
fn test_take_removes_short_requests_that_disallow_partial() {
    let mut harness = Harness::new(hay_holder(4.0));
    let mut activity = fixed("Feed", vec![]).with_policy(ShortfallPolicy::SkipActivity);
    let owner = RequestOwner::Activity(activity.id());
    let mut requests = vec![ResourceRequest::stock("Hay", 10.0).with_owner(owner)];
    requests[0].available = 4.0;
    activity.set_status(ActivityStatus::NotNeeded);

    let mut ctx = harness.context(&NoTransmutation);
    let taken = activity.take_resource_list(&mut requests, &mut ctx).unwrap();

    assert!(taken);
    assert!(requests.is_empty());
    assert_eq!(harness.resources.stock_amount("Hay"), Some(4.0));
}

#[test]
fn test_transmutation_covers_shortfall() {
    let mut harness = Harness::new(
        hay_holder(4.0).with_stock(StockResource::new("Cash", 100.0)),
    );
    let rules = TransmutationRules::new(vec![TransmutationRule {
        target: "Hay".to_string(),
        source: "Cash".to_string(),
        source_per_unit: 2.0,
    }]);
    let mut demand = FixedDemand::stock("Hay", 10.0);
    demand.allow_transmutation = true;
    let mut activity = fixed("Feed", vec![demand]).with_policy(ShortfallPolicy::ReportErrorAndStop);

    harness.run(&mut activity, &rules).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Success);
    assert_eq!(harness.resources.stock_amount("Cash"), Some(88.0));
    assert_eq!(harness.resources.stock_amount("Hay"), Some(0.0));
    assert!(harness.listener.shortfalls().is_empty());
}

// ==========================================
// 短缺策略
// ==========================================

#[test]
fn test_report_error_and_stop_in_check_phase() {
    let mut harness = Harness::new(hay_holder(4.0));
    let mut demand = FixedDemand::stock("Hay", 10.0);
    demand.allow_transmutation = true;
    let mut tree = ActivityTree::new("Farm");
    let herd = tree.add_activity(None, Activity::new("Herd", Box::new(ActivityFolder))).unwrap();
    let feed = tree
        .add_activity(
            Some(herd),
            fixed("Feed", vec![demand]).with_policy(ShortfallPolicy::ReportErrorAndStop),
        )
        .unwrap();
    let activity = tree.activity_mut(feed).unwrap();

    let err = harness.run(activity, &NoTransmutation).unwrap_err();

    assert!(matches!(err, EngineError::InsufficientResources { .. }));
    assert!(err.to_string().contains("Farm.Herd.Feed"));
    assert_eq!(activity.status(), ActivityStatus::Critical);
    // 终止前已上报短缺
    assert_eq!(harness.listener.shortfalls().len(), 1);
    assert_eq!(harness.resources.stock_amount("Hay"), Some(4.0));
}

#[test]
fn test_report_error_and_stop_in_report_phase() {
    let mut harness = Harness::new(hay_holder(4.0));
    let mut activity = fixed("Feed", vec![FixedDemand::stock("Hay", 10.0)])
        .with_policy(ShortfallPolicy::ReportErrorAndStop);

    let err = harness.run(&mut activity, &NoTransmutation).unwrap_err();

    assert!(matches!(err, EngineError::ComponentShortfall { .. }));
    assert!(err.is_policy_stop());
    assert_eq!(activity.status(), ActivityStatus::Critical);
    assert_eq!(harness.listener.shortfalls().len(), 1);
    assert_eq!(harness.resources.stock_amount("Hay"), Some(4.0));
}

#[test]
fn test_skip_activity_takes_nothing_and_does_not_perform() {
    let mut harness = Harness::new(hay_holder(4.0));
    let (behavior, performed) =
        CountingBehavior::new(vec![ResourceRequest::stock("Hay", 10.0)]);
    let mut activity =
        Activity::new("Feed", Box::new(behavior)).with_policy(ShortfallPolicy::SkipActivity);

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Skipped);
    assert_eq!(performed_count(&performed), 0);
    assert_eq!(harness.resources.stock_amount("Hay"), Some(4.0));
    assert_eq!(harness.listener.shortfalls().len(), 1);
}

#[test]
fn test_use_available_resources_is_partial() {
    let mut harness = Harness::new(hay_holder(4.0));
    let (behavior, performed) =
        CountingBehavior::new(vec![ResourceRequest::stock("Hay", 10.0)]);
    let mut activity = Activity::new("Feed", Box::new(behavior))
        .with_policy(ShortfallPolicy::UseAvailableResources);

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Partial);
    assert_eq!(performed_count(&performed), 1);
    assert_eq!(activity.resource_requests()[0].provided, 4.0);
    assert_eq!(harness.resources.stock_amount("Hay"), Some(0.0));
}

#[test]
fn test_unscaled_shortfall_only_warns() {
    let mut harness = Harness::new(hay_holder(5.0).with_stock(StockResource::new("Grain", 100.0)));
    let mut activity = fixed(
        "Feed",
        vec![FixedDemand::stock("Hay", 10.0), FixedDemand::stock("Grain", 10.0)],
    )
    .with_policy(ShortfallPolicy::UseAvailableWithImplications);

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Partial);
    assert!(activity.status_message().contains("0.500"));
    // 未缩减: 其余资源按原需求扣减
    assert_eq!(harness.resources.stock_amount("Grain"), Some(90.0));
}

#[test]
fn test_scaling_behavior_reduces_other_requests() {
    let mut harness = Harness::new(hay_holder(5.0).with_stock(StockResource::new("Grain", 100.0)));
    let behavior = FixedDemandBehavior::new(vec![
        FixedDemand::stock("Hay", 10.0),
        FixedDemand::stock("Grain", 10.0),
    ])
    .scaling();
    let mut activity = Activity::new("Feed", Box::new(behavior))
        .with_policy(ShortfallPolicy::UseAvailableWithImplications);

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert!(activity.status_message().is_empty());
    assert_eq!(harness.resources.stock_amount("Grain"), Some(95.0));
    assert_eq!(harness.resources.stock_amount("Hay"), Some(0.0));
}

// ==========================================
// 编程错误
// ==========================================

#[test]
fn test_request_without_owner_is_fatal() {
    let mut harness = Harness::new(hay_holder(10.0));
    let mut activity = fixed("Feed", vec![]);
    let mut requests = vec![ResourceRequest::stock("Hay", 1.0)];

    let mut ctx = harness.context(&NoTransmutation);
    let err = activity
        .check_resource_list(&mut requests, &mut ctx, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingActivityModel { .. }));
}

#[test]
fn test_foreign_owner_is_fatal() {
    let mut harness = Harness::new(hay_holder(10.0));
    let mut activity = fixed("Feed", vec![]);
    let other = fixed("Other", vec![]);
    let mut requests =
        vec![ResourceRequest::stock("Hay", 1.0).with_owner(RequestOwner::Activity(other.id()))];

    let mut ctx = harness.context(&NoTransmutation);
    let err = activity
        .check_resource_list(&mut requests, &mut ctx, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedRequestOwner { .. }));
}

#[test]
fn test_unset_companion_value_is_fatal() {
    let mut harness = Harness::new(ResourcesHolder::new());
    let behavior = FixedDemandBehavior::default()
        .with_labels(CompanionKind::ActivityFee, CompanionLabels::new(&[], &["fixed"]));
    let mut fee = ActivityFee::new("Levy", "Bank", 5.0);
    fee.measure = "fixed".to_string();
    let mut activity = Activity::new("Sell", Box::new(behavior)).with_companion(Box::new(fee));
    activity.start_of_simulation().unwrap();

    let err = harness.run(&mut activity, &NoTransmutation).unwrap_err();
    assert!(matches!(err, EngineError::CompanionValueUnset { .. }));
}

// ==========================================
// 伴生组件
// ==========================================

fn fee_activity(metric: CompanionMetric, policy: ShortfallPolicy) -> Activity {
    let behavior = FixedDemandBehavior::default()
        .with_labels(CompanionKind::ActivityFee, CompanionLabels::new(&[], &["per head"]))
        .with_metric(metric);
    let mut fee = ActivityFee::new("Levy", "Bank", 5.0);
    fee.measure = "per head".to_string();
    let mut activity = Activity::new("Sell", Box::new(behavior))
        .with_policy(policy)
        .with_companion(Box::new(fee));
    activity.start_of_simulation().unwrap();
    activity
}

#[test]
fn test_companion_problem_value_is_warning() {
    let mut harness = Harness::new(ResourcesHolder::new().with_stock(StockResource::new("Bank", 100.0)));
    let mut activity = fee_activity(
        CompanionMetric::problem(CompanionKind::ActivityFee, "", "per head"),
        ShortfallPolicy::UseAvailableResources,
    );

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Success);
    assert_eq!(activity.companion_status(0), Some(ActivityStatus::Warning));
    assert!(activity.status_message().contains("Levy"));
    assert_eq!(harness.resources.stock_amount("Bank"), Some(100.0));
}

#[test]
fn test_fee_follows_parent_policy() {
    let mut harness = Harness::new(ResourcesHolder::new().with_stock(StockResource::new("Bank", 20.0)));
    let mut activity = fee_activity(
        CompanionMetric::new(CompanionKind::ActivityFee, "", "per head", 10.0),
        ShortfallPolicy::SkipActivity,
    );

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Skipped);
    assert_eq!(harness.resources.stock_amount("Bank"), Some(20.0));
    let shortfalls = harness.listener.shortfalls();
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].required, 50.0);
    assert_eq!(
        shortfalls[0].companion.as_ref().map(|c| c.kind),
        Some(CompanionKind::ActivityFee)
    );
}

#[test]
fn test_fee_paid_from_account() {
    let mut harness = Harness::new(ResourcesHolder::new().with_stock(StockResource::new("Bank", 100.0)));
    let mut activity = fee_activity(
        CompanionMetric::new(CompanionKind::ActivityFee, "", "per head", 4.0),
        ShortfallPolicy::UseAvailableResources,
    );

    harness.run(&mut activity, &NoTransmutation).unwrap();

    assert_eq!(activity.status(), ActivityStatus::Success);
    assert_eq!(activity.companion_status(0), Some(ActivityStatus::Success));
    assert_eq!(harness.resources.stock_amount("Bank"), Some(80.0));
}
