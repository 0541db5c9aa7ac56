//! Safe edit scenarios, end to end through `assess`

use proptest::prelude::*;
use safe_engine::actions::{plan_action, SafeAction};
use safe_engine::{
    assess, AccountStatus, Amount, Balances, CollateralRatio, CurrentPrice, LiquidationData,
    OperationMode, PendingEdit, Rule, SafeState, Snapshot,
};

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

fn data() -> LiquidationData {
    LiquidationData {
        accumulated_rate: amt("1"),
        current_price: CurrentPrice {
            value: amt("300"),
            safety_price: Some(amt("200")),
            liquidation_price: amt("200"),
        },
        current_redemption_price: amt("1"),
        current_redemption_rate: amt("1"),
        debt_floor: amt("20"),
        debt_ceiling: amt("1000000"),
        global_debt: amt("0"),
        global_debt_ceiling: amt("10000000"),
        per_safe_debt_ceiling: amt("100000"),
        liquidation_c_ratio: amt("1.5"),
        safety_c_ratio: amt("1.5"),
        liquidation_penalty: amt("1.1"),
        total_annualized_stability_fee: amt("1.02"),
    }
}

fn existing() -> SafeState {
    SafeState {
        collateral: amt("5"),
        debt: amt("300"),
        accumulated_rate: amt("1"),
    }
}

fn snapshot(safe: Option<SafeState>) -> Snapshot {
    Snapshot {
        safe,
        data: Some(data()),
    }
}

fn balances() -> Balances {
    Balances {
        eth: amt("100"),
        coin: amt("10000"),
    }
}

fn error_of(snapshot: &Snapshot, mode: OperationMode, left: &str, right: &str) -> Option<String> {
    let edit = PendingEdit::parse(left, right).unwrap();
    assess(snapshot, &edit, mode, &balances(), AccountStatus::ready())
        .unwrap()
        .error
        .map(|v| v.message)
}

#[test]
fn test_create_safe_within_ratio() {
    let edit = PendingEdit::parse("2", "100").unwrap();
    let out = assess(
        &snapshot(None),
        &edit,
        OperationMode::Create,
        &balances(),
        AccountStatus::ready(),
    )
    .unwrap();

    assert_eq!(out.valuation.total_collateral, amt("2"));
    assert_eq!(out.valuation.total_debt, amt("100"));
    assert!(out.valuation.is_safe);
    assert!(matches!(out.valuation.collateral_ratio, CollateralRatio::Finite(_)));
    assert_eq!(out.error, None);
}

#[test]
fn test_create_safe_over_ratio() {
    let edit = PendingEdit::parse("2", "500").unwrap();
    let out = assess(
        &snapshot(None),
        &edit,
        OperationMode::Create,
        &balances(),
        AccountStatus::ready(),
    )
    .unwrap();

    assert!(!out.valuation.is_safe);
    let error = out.error.unwrap();
    assert_eq!(error.rule, Rule::SafetyRatio);
    assert_eq!(error.message, "Too much debt, below 150% collateralization ratio");
}

#[test]
fn test_create_ignores_existing_safe() {
    let out = error_of(&snapshot(Some(existing())), OperationMode::Create, "2", "100");
    assert_eq!(out, None);
}

#[test]
fn test_unlock_more_than_locked() {
    let out = error_of(&snapshot(Some(existing())), OperationMode::RepayWithdraw, "6", "");
    assert_eq!(out.as_deref(), Some("ETH to unlock cannot exceed available amount"));
}

#[test]
fn test_debt_below_floor() {
    let out = error_of(&snapshot(None), OperationMode::Create, "2", "10");
    assert_eq!(out.as_deref(), Some("The resulting debt should be at least 20 RAI or zero"));
}

#[test]
fn test_floor_reported_before_ratio() {
    // 0.01 ETH backs at most 2 RAI, and 10 RAI is under the floor
    let out = error_of(&snapshot(None), OperationMode::Create, "0.01", "10");
    assert_eq!(out.as_deref(), Some("The resulting debt should be at least 20 RAI or zero"));
}

#[test]
fn test_full_repay_clears_floor() {
    let out = error_of(&snapshot(Some(existing())), OperationMode::RepayWithdraw, "", "300");
    assert_eq!(out, None);
}

#[test]
fn test_nothing_fetched_yet() {
    let edit = PendingEdit::parse("2", "100").unwrap();
    let out = assess(
        &Snapshot::default(),
        &edit,
        OperationMode::Create,
        &balances(),
        AccountStatus::ready(),
    );
    assert!(out.is_none());
}

#[test]
fn test_disconnected_wallet_wins() {
    let edit = PendingEdit::parse("6", "").unwrap();
    let out = assess(
        &snapshot(Some(existing())),
        &edit,
        OperationMode::RepayWithdraw,
        &balances(),
        AccountStatus::default(),
    )
    .unwrap();
    assert_eq!(out.error.map(|v| v.rule), Some(Rule::WalletConnected));
}

#[test]
fn test_valid_edit_plans_action() {
    let edit = PendingEdit::parse("1", "100").unwrap();
    let out = assess(
        &snapshot(Some(existing())),
        &edit,
        OperationMode::DepositBorrow,
        &balances(),
        AccountStatus::ready(),
    )
    .unwrap();
    assert_eq!(out.error, None);
    assert_eq!(out.valuation.total_debt, amt("400"));

    let action = plan_action(OperationMode::DepositBorrow, Some("7"), &edit, &out.valuation).unwrap();
    assert!(matches!(action, SafeAction::LockEthAndGenerateDebt { ref safe_id, .. } if safe_id == "7"));
}

#[test]
fn test_close_safe_plans_repay_all() {
    let edit = PendingEdit::parse("5", "300").unwrap();
    let out = assess(
        &snapshot(Some(existing())),
        &edit,
        OperationMode::RepayWithdraw,
        &balances(),
        AccountStatus::ready(),
    )
    .unwrap();
    assert_eq!(out.error, None);
    assert_eq!(out.valuation.collateral_ratio, CollateralRatio::Infinite);

    let action = plan_action(OperationMode::RepayWithdraw, Some("7"), &edit, &out.valuation).unwrap();
    assert!(matches!(action, SafeAction::RepayAllDebtAndFreeEth { .. }));
}

proptest! {
    #[test]
    fn prop_create_within_limits_passes(collateral in 1u64..100, debt_per_eth in 20u64..=200) {
        let debt = collateral * debt_per_eth;
        let out = error_of(
            &snapshot(None),
            OperationMode::Create,
            &collateral.to_string(),
            &debt.to_string(),
        );
        prop_assert_eq!(out, None);
    }

    #[test]
    fn prop_assess_is_deterministic(collateral in 0u64..1000, debt in 0u64..100_000) {
        let edit = PendingEdit::new(Amount::from_int(collateral), Amount::from_int(debt));
        let run = || assess(
            &snapshot(Some(existing())),
            &edit,
            OperationMode::DepositBorrow,
            &balances(),
            AccountStatus::ready(),
        );
        prop_assert_eq!(run(), run());
    }
}
