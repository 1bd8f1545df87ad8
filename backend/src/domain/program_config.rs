//! Typed views over the free-form program configuration JSON.
//!
//! Program config is an opaque document owned by the tenant; each rule parses
//! the section it cares about at its entry point. Parsing is lenient by
//! contract: unknown fields are ignored and a section with invalid types
//! reads as absent, which makes the owning rule skip its effect rather than
//! abort the job.

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value;

/// Configured earn behaviour for `DefaultEarn`.
#[derive(Debug, Clone, PartialEq)]
pub struct EarnSettings {
    pub points_multiplier: BigDecimal,
}

impl Default for EarnSettings {
    fn default() -> Self {
        Self {
            points_multiplier: BigDecimal::from(1),
        }
    }
}

/// Per-tier overrides inside a stamp program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct StampTierOverride {
    #[serde(default)]
    pub stamps_per_item: Option<i64>,
    #[serde(default)]
    pub threshold: Option<i64>,
}

/// One configured stamp program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StampProgram {
    pub id: String,
    pub skus: Vec<String>,
    #[serde(default)]
    pub stamps_per_item: Option<i64>,
    #[serde(default)]
    pub threshold: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub coupon_unit: Option<String>,
    #[serde(default)]
    pub tier_overrides: HashMap<String, StampTierOverride>,
}

impl StampProgram {
    /// Stamp unit, defaulting to `stamps:{id}`.
    pub fn stamp_unit(&self) -> String {
        self.unit.clone().unwrap_or_else(|| format!("stamps:{}", self.id))
    }

    /// Coupon unit, defaulting to `coupon:{id}`.
    pub fn coupon_unit(&self) -> String {
        self.coupon_unit
            .clone()
            .unwrap_or_else(|| format!("coupon:{}", self.id))
    }

    /// Whether `sku` participates in this program (case-insensitive).
    pub fn matches_sku(&self, sku: &str) -> bool {
        self.skus.iter().any(|s| s.eq_ignore_ascii_case(sku))
    }

    /// Stamps granted per matching item after applying a tier override.
    pub fn effective_stamps_per_item(&self, tier_id: Option<&str>) -> i64 {
        tier_id
            .and_then(|id| self.tier_overrides.get(id))
            .and_then(|o| o.stamps_per_item)
            .or(self.stamps_per_item)
            .unwrap_or(1)
    }

    /// Coupon threshold after applying a tier override; `None` disables
    /// coupon issuance for this program.
    pub fn effective_threshold(&self, tier_id: Option<&str>) -> Option<i64> {
        tier_id
            .and_then(|id| self.tier_overrides.get(id))
            .and_then(|o| o.threshold)
            .or(self.threshold)
            .filter(|n| *n > 0)
    }
}

/// One tier definition for the rolling-spend ladder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TierDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub threshold_cents: i64,
}

/// Rolling-spend tier ladder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoyaltyTierSettings {
    pub window_days: i64,
    pub tiers: Vec<TierDefinition>,
}

impl LoyaltyTierSettings {
    /// Select the highest tier whose threshold the rolling spend meets.
    pub fn select(&self, rolling_spend_cents: i64) -> Option<&TierDefinition> {
        let mut ladder: Vec<&TierDefinition> = self.tiers.iter().collect();
        ladder.sort_by_key(|tier| tier.threshold_cents);
        ladder
            .into_iter()
            .take_while(|tier| tier.threshold_cents <= rolling_spend_cents)
            .last()
    }
}

/// How a redemption's credit leg is split across partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    #[default]
    Priority,
    Proportional,
    SourceProportional,
}

/// One partner in a cross-brand arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartnerShare {
    pub merchant_account: String,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub expiry_days: Option<i64>,
}

/// Cross-brand allocation policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CrossBrandAllocation {
    #[serde(default)]
    pub strategy: AllocationStrategy,
    #[serde(default)]
    pub partners: Vec<PartnerShare>,
    /// Earn merchant id → partner account.
    #[serde(default)]
    pub partner_map: HashMap<String, String>,
    /// Global maximum lot age, in days, considered redeemable.
    #[serde(default)]
    pub expiry_days: Option<i64>,
    #[serde(default)]
    pub partner_hint: Option<String>,
}

impl CrossBrandAllocation {
    pub fn partner_accounts(&self) -> Vec<String> {
        self.partners
            .iter()
            .map(|p| p.merchant_account.clone())
            .collect()
    }

    /// Earn merchant ids that map to `partner_account` (reverse partner map).
    pub fn merchants_for_partner(&self, partner_account: &str) -> Vec<String> {
        let mut merchants: Vec<String> = self
            .partner_map
            .iter()
            .filter(|(_, account)| account.as_str() == partner_account)
            .map(|(merchant, _)| merchant.clone())
            .collect();
        merchants.sort();
        merchants
    }

    fn partner_expiry_days(&self, partner_account: &str) -> Option<i64> {
        self.partners
            .iter()
            .find(|p| p.merchant_account == partner_account)
            .and_then(|p| p.expiry_days)
    }
}

/// Parsed view over one tenant program's configuration document.
#[derive(Debug, Clone, Default)]
pub struct ProgramSettings {
    earn: EarnSettings,
    stamp_programs: Vec<StampProgram>,
    loyalty_tiers: Option<LoyaltyTierSettings>,
    cross_brand: Option<CrossBrandAllocation>,
    earn_expiry_days_default: Option<i64>,
    earn_expiry_overrides: HashMap<String, i64>,
}

impl ProgramSettings {
    /// Parse a configuration document; `None` yields all defaults.
    pub fn parse(config: Option<&Value>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };

        Self {
            earn: parse_earn(config),
            stamp_programs: section(config, "stamp_programs").unwrap_or_default(),
            loyalty_tiers: section(config, "loyalty_tiers"),
            cross_brand: section(config, "cross_brand_allocation"),
            earn_expiry_days_default: section(config, "earn_expiry_days_default"),
            earn_expiry_overrides: section(config, "earn_expiry_overrides").unwrap_or_default(),
        }
    }

    pub fn earn(&self) -> &EarnSettings {
        &self.earn
    }

    pub fn stamp_programs(&self) -> &[StampProgram] {
        &self.stamp_programs
    }

    pub fn loyalty_tiers(&self) -> Option<&LoyaltyTierSettings> {
        self.loyalty_tiers.as_ref()
    }

    pub fn cross_brand(&self) -> Option<&CrossBrandAllocation> {
        self.cross_brand.as_ref()
    }

    /// Expiry horizon for a lot earned at `merchant_id`.
    ///
    /// Precedence: the partner's `expiry_days` (through the partner map),
    /// then a per-merchant override, then the program default. `None` means
    /// the lot never expires.
    pub fn earn_expiry_days(&self, merchant_id: &str) -> Option<i64> {
        if let Some(allocation) = &self.cross_brand {
            if let Some(partner_account) = allocation.partner_map.get(merchant_id) {
                if let Some(days) = allocation.partner_expiry_days(partner_account) {
                    return Some(days);
                }
            }
        }
        if let Some(days) = self.earn_expiry_overrides.get(merchant_id) {
            return Some(*days);
        }
        self.earn_expiry_days_default
    }
}

fn parse_earn(config: &Value) -> EarnSettings {
    let multiplier = match config.get("points_multiplier") {
        Some(Value::Number(num)) => BigDecimal::from_str(&num.to_string()).ok(),
        Some(Value::String(text)) => BigDecimal::from_str(text.trim()).ok(),
        _ => None,
    };
    EarnSettings {
        points_multiplier: multiplier.unwrap_or_else(|| BigDecimal::from(1)),
    }
}

fn section<T: serde::de::DeserializeOwned>(config: &Value, key: &str) -> Option<T> {
    config
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn settings(config: Value) -> ProgramSettings {
        ProgramSettings::parse(Some(&config))
    }

    #[rstest]
    fn missing_config_yields_defaults() {
        let parsed = ProgramSettings::parse(None);
        assert_eq!(parsed.earn().points_multiplier, BigDecimal::from(1));
        assert!(parsed.stamp_programs().is_empty());
        assert!(parsed.loyalty_tiers().is_none());
    }

    #[rstest]
    #[case(json!({"points_multiplier": 1.5}), "1.5")]
    #[case(json!({"points_multiplier": "2"}), "2")]
    #[case(json!({"points_multiplier": [1]}), "1")]
    fn multiplier_parses_leniently(#[case] config: Value, #[case] want: &str) {
        use std::str::FromStr;
        assert_eq!(
            settings(config).earn().points_multiplier,
            BigDecimal::from_str(want).expect("decimal")
        );
    }

    #[rstest]
    fn invalid_section_reads_as_absent() {
        let parsed = settings(json!({"stamp_programs": "nope", "loyalty_tiers": 4}));
        assert!(parsed.stamp_programs().is_empty());
        assert!(parsed.loyalty_tiers().is_none());
    }

    #[rstest]
    fn stamp_program_defaults_and_overrides() {
        let parsed = settings(json!({
            "stamp_programs": [{
                "id": "coffee",
                "skus": ["Latte", "espresso"],
                "threshold": 5,
                "tier_overrides": {"gold": {"stamps_per_item": 2, "threshold": 4}}
            }]
        }));
        let program = &parsed.stamp_programs()[0];

        assert!(program.matches_sku("LATTE"));
        assert!(!program.matches_sku("tea"));
        assert_eq!(program.stamp_unit(), "stamps:coffee");
        assert_eq!(program.coupon_unit(), "coupon:coffee");
        assert_eq!(program.effective_stamps_per_item(None), 1);
        assert_eq!(program.effective_stamps_per_item(Some("gold")), 2);
        assert_eq!(program.effective_threshold(None), Some(5));
        assert_eq!(program.effective_threshold(Some("gold")), Some(4));
        assert_eq!(program.effective_threshold(Some("silver")), Some(5));
    }

    #[rstest]
    #[case(18_000, Some("silver"))]
    #[case(2_000, Some("base"))]
    #[case(-1, None)]
    fn tier_ladder_selects_highest_met_threshold(
        #[case] spend: i64,
        #[case] want: Option<&str>,
    ) {
        let parsed = settings(json!({
            "loyalty_tiers": {
                "window_days": 30,
                "tiers": [
                    {"id": "silver", "threshold_cents": 15_000},
                    {"id": "base", "threshold_cents": 0}
                ]
            }
        }));
        let ladder = parsed.loyalty_tiers().expect("ladder");
        assert_eq!(ladder.select(spend).map(|t| t.id.as_str()), want);
    }

    #[rstest]
    fn expiry_precedence_partner_then_override_then_default() {
        let parsed = settings(json!({
            "earn_expiry_days_default": 365,
            "earn_expiry_overrides": {"m2": 30},
            "cross_brand_allocation": {
                "partners": [{"merchant_account": "acct-a", "expiry_days": 90}],
                "partner_map": {"m1": "acct-a"}
            }
        }));

        assert_eq!(parsed.earn_expiry_days("m1"), Some(90));
        assert_eq!(parsed.earn_expiry_days("m2"), Some(30));
        assert_eq!(parsed.earn_expiry_days("m3"), Some(365));
    }

    #[rstest]
    fn reverse_partner_map_is_sorted() {
        let allocation: CrossBrandAllocation = serde_json::from_value(json!({
            "partner_map": {"m2": "acct-a", "m1": "acct-a", "m3": "acct-b"}
        }))
        .expect("allocation");
        assert_eq!(allocation.merchants_for_partner("acct-a"), vec!["m1", "m2"]);
        assert_eq!(allocation.merchants_for_partner("acct-b"), vec!["m3"]);
    }
}
