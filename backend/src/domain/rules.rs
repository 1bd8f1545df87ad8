//! Earn→burn merchant redemption rules.
//!
//! A rule authorizes redemptions at one merchant (`burn_merchant_id`) to
//! consume lots earned at another (`earn_merchant_id`) and carries the
//! settlement economics of that arrangement.

use serde::{Deserialize, Serialize};

/// One enabled earn→burn rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantRedemptionRule {
    pub earn_merchant_id: String,
    pub burn_merchant_id: String,
    pub earn_merchant_account: String,
    pub expiry_days_override: Option<i64>,
    pub settlement_adjustment_bps: Option<i32>,
}

/// The enabled rules for one burn merchant, queryable both ways.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<MerchantRedemptionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<MerchantRedemptionRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose earned points settle into `earn_merchant_account`.
    pub fn for_account<'a>(
        &'a self,
        earn_merchant_account: &'a str,
    ) -> impl Iterator<Item = &'a MerchantRedemptionRule> {
        self.rules
            .iter()
            .filter(move |rule| rule.earn_merchant_account == earn_merchant_account)
    }

    /// The rule covering lots earned at `earn_merchant_id`, if any.
    pub fn for_earn_merchant(&self, earn_merchant_id: &str) -> Option<&MerchantRedemptionRule> {
        self.rules
            .iter()
            .find(|rule| rule.earn_merchant_id == earn_merchant_id)
    }
}

/// Tightest of two optional maximum-lot-age bounds (`None` = unbounded).
pub fn combined_expiry_bound(global_days: Option<i64>, override_days: Option<i64>) -> Option<i64> {
    match (global_days, override_days) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (bound @ Some(_), None) | (None, bound @ Some(_)) => bound,
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rule(earn_id: &str, account: &str) -> MerchantRedemptionRule {
        MerchantRedemptionRule {
            earn_merchant_id: earn_id.to_string(),
            burn_merchant_id: "burn-1".to_string(),
            earn_merchant_account: account.to_string(),
            expiry_days_override: None,
            settlement_adjustment_bps: None,
        }
    }

    #[rstest]
    fn rule_set_indexes_both_ways() {
        let set = RuleSet::new(vec![rule("m1", "acct-a"), rule("m2", "acct-b")]);

        assert_eq!(set.for_account("acct-a").count(), 1);
        assert_eq!(
            set.for_earn_merchant("m2").map(|r| r.earn_merchant_account.as_str()),
            Some("acct-b")
        );
        assert!(set.for_earn_merchant("m3").is_none());
    }

    #[rstest]
    #[case(Some(30), Some(90), Some(30))]
    #[case(Some(90), Some(30), Some(30))]
    #[case(None, Some(30), Some(30))]
    #[case(Some(30), None, Some(30))]
    #[case(None, None, None)]
    fn expiry_bounds_take_the_minimum(
        #[case] global: Option<i64>,
        #[case] rule_override: Option<i64>,
        #[case] want: Option<i64>,
    ) {
        assert_eq!(combined_expiry_bound(global, rule_override), want);
    }
}
