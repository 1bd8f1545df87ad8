//! Account identifier conventions.
//!
//! Account ids are purely lexical: a customer account is
//! `{tenant}::acct::{account_ref}` and each tenant has a single merchant
//! liability account `{tenant}::merchant_liability`. Partner accounts in
//! cross-brand arrangements are opaque strings supplied by program config.

/// Unit name for loyalty points.
pub const POINTS_UNIT: &str = "points";

/// Memo prefix marking an entry whose customer credits create point lots.
pub const EARN_MEMO_PREFIX: &str = "earn:";

const CUSTOMER_SEGMENT: &str = "::acct::";
const MERCHANT_LIABILITY_SUFFIX: &str = "::merchant_liability";

/// Build the customer account id for an account reference.
pub fn customer_account(tenant: &str, account_ref: &str) -> String {
    format!("{tenant}{CUSTOMER_SEGMENT}{account_ref}")
}

/// Build the tenant's merchant liability account id.
pub fn merchant_liability(tenant: &str) -> String {
    format!("{tenant}{MERCHANT_LIABILITY_SUFFIX}")
}

/// Whether `account_id` is a customer account of `tenant`.
pub fn is_customer_account(tenant: &str, account_id: &str) -> bool {
    account_id
        .strip_prefix(tenant)
        .is_some_and(|rest| rest.starts_with(CUSTOMER_SEGMENT))
}

/// Resolve a client-supplied balance-query account reference.
///
/// The literals `merchant` and `merchant_liability` address the tenant's
/// merchant liability account; anything else is a customer reference.
pub fn resolve_query_account(tenant: &str, raw: &str) -> String {
    match raw {
        "merchant" | "merchant_liability" => merchant_liability(tenant),
        other => customer_account(tenant, other),
    }
}

/// Extract the merchant id from an `earn:{merchant_id}` memo, if present.
pub fn earn_memo_merchant(memo: &str) -> Option<&str> {
    memo.strip_prefix(EARN_MEMO_PREFIX)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("acme", "c-9", "acme::acct::c-9")]
    #[case("t1", "merchantish", "t1::acct::merchantish")]
    fn customer_accounts_are_lexical(#[case] tenant: &str, #[case] re: &str, #[case] want: &str) {
        assert_eq!(customer_account(tenant, re), want);
        assert!(is_customer_account(tenant, want));
    }

    #[rstest]
    fn merchant_liability_is_not_a_customer_account() {
        let account = merchant_liability("acme");
        assert_eq!(account, "acme::merchant_liability");
        assert!(!is_customer_account("acme", &account));
    }

    #[rstest]
    fn query_account_maps_merchant_aliases() {
        assert_eq!(
            resolve_query_account("acme", "merchant"),
            "acme::merchant_liability"
        );
        assert_eq!(
            resolve_query_account("acme", "merchant_liability"),
            "acme::merchant_liability"
        );
        assert_eq!(resolve_query_account("acme", "u1"), "acme::acct::u1");
    }

    #[rstest]
    fn earn_memo_parsing() {
        assert_eq!(earn_memo_merchant("earn:m-7"), Some("m-7"));
        assert_eq!(earn_memo_merchant("earn:"), None);
        assert_eq!(earn_memo_merchant("redeem"), None);
    }

    #[rstest]
    fn prefix_collision_across_tenants_is_rejected() {
        // "ac" must not claim "acme::acct::u1" by prefix alone.
        assert!(!is_customer_account("ac", "acme::acct::u1"));
    }
}
