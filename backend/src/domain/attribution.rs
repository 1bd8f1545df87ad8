//! Outstanding-balance attribution across partner accounts.
//!
//! Attribution answers "which partner accounts stand behind this customer's
//! redeemable points, and with how much". The queries against lot inventory
//! live in the persistence layer; the assembly logic here is pure so the
//! rule-driven and fallback paths can be tested without a database.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One partner's share of a customer's outstanding balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSlice {
    pub account_id: String,
    pub amount: i64,
    pub settlement_adjustment_bps: Option<i32>,
}

/// Scope for an outstanding-attribution lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributionQuery {
    /// Candidate partner accounts, in allocation-priority order.
    pub partner_accounts: Vec<String>,
    /// Earn merchant id → partner account.
    pub partner_map: HashMap<String, String>,
    /// Global maximum lot age in days.
    pub expiry_days: Option<i64>,
    /// Merchant where the redemption occurs, when cross-brand.
    pub burn_merchant_id: Option<String>,
}

/// Fallback attribution when no earn→burn rules constrain the redemption:
/// group outstanding lots by earn merchant and map each merchant to a
/// partner account.
///
/// A merchant maps through `partner_map`, or to the sole candidate when
/// exactly one exists; unmappable lots are dropped. Slices are emitted in
/// candidate order so priority allocation stays deterministic.
pub fn fallback_attribution(
    lots_by_merchant: &[(Option<String>, i64)],
    partner_map: &HashMap<String, String>,
    candidates: &[String],
) -> Vec<AttributionSlice> {
    let sole_candidate = match candidates {
        [only] => Some(only.as_str()),
        _ => None,
    };

    let mut per_account: HashMap<&str, i64> = HashMap::new();
    for (merchant_id, qty) in lots_by_merchant {
        if *qty <= 0 {
            continue;
        }
        let mapped = merchant_id
            .as_deref()
            .and_then(|id| partner_map.get(id))
            .map(String::as_str)
            .or(sole_candidate);
        let Some(account) = mapped else {
            continue;
        };
        if !candidates.iter().any(|c| c == account) {
            continue;
        }
        *per_account.entry(account).or_default() += qty;
    }

    candidates
        .iter()
        .filter_map(|account| {
            per_account.get(account.as_str()).map(|amount| AttributionSlice {
                account_id: account.clone(),
                amount: *amount,
                settlement_adjustment_bps: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    fn lots_group_through_the_partner_map() {
        let lots = vec![
            (Some("m1".to_string()), 40),
            (Some("m2".to_string()), 10),
            (Some("m1".to_string()), 5),
        ];
        let slices = fallback_attribution(
            &lots,
            &map(&[("m1", "acct-a"), ("m2", "acct-b")]),
            &["acct-a".to_string(), "acct-b".to_string()],
        );

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].account_id, "acct-a");
        assert_eq!(slices[0].amount, 45);
        assert_eq!(slices[1].amount, 10);
    }

    #[rstest]
    fn unmapped_lots_fall_to_a_sole_candidate() {
        let lots = vec![(Some("m9".to_string()), 25), (None, 5)];
        let slices = fallback_attribution(&lots, &HashMap::new(), &["acct-a".to_string()]);

        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].amount, 30);
    }

    #[rstest]
    fn unmapped_lots_are_dropped_with_multiple_candidates() {
        let lots = vec![(Some("m9".to_string()), 25)];
        let slices = fallback_attribution(
            &lots,
            &HashMap::new(),
            &["acct-a".to_string(), "acct-b".to_string()],
        );
        assert!(slices.is_empty());
    }

    #[rstest]
    fn mappings_outside_the_candidate_set_are_dropped() {
        let lots = vec![(Some("m1".to_string()), 25)];
        let slices = fallback_attribution(
            &lots,
            &map(&[("m1", "acct-frozen")]),
            &["acct-a".to_string(), "acct-b".to_string()],
        );
        assert!(slices.is_empty());
    }
}
