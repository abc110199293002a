//! # Tier Pricing Resolution
//!
//! Pure resolution logic for quantity-tiered (volume) pricing rules.
//!
//! ## How Tier Pricing Applies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Tier Price Resolution                                │
//! │                                                                         │
//! │  Organization's active TierRules                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  find_tier(rules, country, product, variation, client)                  │
//! │       │  candidate = active + country match + member match              │
//! │       │  client-targeted beats global, then priority, then id           │
//! │       ▼                                                                 │
//! │  Matched rule's steps: [{min: 1, price: 1000}, {min: 5, price: 800}]    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_for_quantity(steps, cumulative_qty)                              │
//! │       │  highest step whose threshold <= cumulative quantity            │
//! │       ▼                                                                 │
//! │  Some(unit_price) - or None, caller falls back to the base price        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cumulative Quantity
//! The quantity fed to [`price_for_quantity`] is the sum across ALL cart
//! lines covered by the matched rule, not just the mutated line. Computing
//! that sum requires the cart's lines, so it lives in the transaction layer;
//! this module only resolves rules and walks steps.

use crate::types::{TierRule, TierStep};

// =============================================================================
// Rule Selection
// =============================================================================

/// Finds the single applicable tier rule for a line, or `None`.
///
/// ## Candidate Filter
/// - `active == true`
/// - rule's country list contains `country` (case-insensitive)
/// - rule's member lists contain the product id or the variation id
/// - rule is either global or explicitly targets `client_id`
///
/// ## Selection Policy
/// Client-targeted candidates always beat global ones. Within the winning
/// class, the highest `priority` wins; equal priorities fall back to the
/// lexicographically smallest rule id so resolution stays deterministic
/// even with overlapping rule configurations.
pub fn find_tier<'a>(
    rules: &'a [TierRule],
    country: &str,
    catalog_id: &str,
    variation_id: Option<&str>,
    client_id: &str,
) -> Option<&'a TierRule> {
    let candidates = rules.iter().filter(|rule| {
        rule.active
            && rule
                .countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country))
            && rule.covers(catalog_id, variation_id)
    });

    let mut best_targeted: Option<&TierRule> = None;
    let mut best_global: Option<&TierRule> = None;

    for rule in candidates {
        if rule.targets_client(client_id) {
            best_targeted = Some(prefer(best_targeted, rule));
        } else if rule.is_global() {
            best_global = Some(prefer(best_global, rule));
        }
        // Rules targeting only other clients are never candidates here.
    }

    best_targeted.or(best_global)
}

/// Picks the better of the current best and a challenger:
/// higher priority wins, equal priority resolves to the smaller id.
fn prefer<'a>(best: Option<&'a TierRule>, challenger: &'a TierRule) -> &'a TierRule {
    match best {
        None => challenger,
        Some(current) => {
            if challenger.priority > current.priority
                || (challenger.priority == current.priority && challenger.id < current.id)
            {
                challenger
            } else {
                current
            }
        }
    }
}

// =============================================================================
// Step Walk
// =============================================================================

/// Returns the unit price of the highest step whose `min_quantity` threshold
/// is at or below `quantity`, or `None` when no step qualifies (the caller
/// then falls back to the base price).
///
/// The walk does not assume the steps arrive sorted.
///
/// ## Example
/// ```rust
/// use merx_core::tier::price_for_quantity;
/// use merx_core::types::TierStep;
///
/// let steps = vec![
///     TierStep { min_quantity: 1, unit_price: 1000 },
///     TierStep { min_quantity: 5, unit_price: 800 },
/// ];
///
/// assert_eq!(price_for_quantity(&steps, 4), Some(1000));
/// assert_eq!(price_for_quantity(&steps, 5), Some(800));
/// assert_eq!(price_for_quantity(&steps, 0), None);
/// ```
pub fn price_for_quantity(steps: &[TierStep], quantity: i64) -> Option<i64> {
    steps
        .iter()
        .filter(|step| step.min_quantity <= quantity)
        .max_by_key(|step| step.min_quantity)
        .map(|step| step.unit_price)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, priority: i64, client_ids: Vec<&str>) -> TierRule {
        TierRule {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            name: format!("rule {id}"),
            active: true,
            priority,
            countries: vec!["US".to_string()],
            member_product_ids: vec!["p-1".to_string()],
            member_variation_ids: vec!["v-1".to_string()],
            client_ids: client_ids.into_iter().map(String::from).collect(),
            steps: vec![
                TierStep {
                    min_quantity: 1,
                    unit_price: 1000,
                },
                TierStep {
                    min_quantity: 5,
                    unit_price: 800,
                },
            ],
        }
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let mut inactive = rule("t-1", 0, vec![]);
        inactive.active = false;

        assert!(find_tier(&[inactive], "US", "p-1", None, "cl-1").is_none());
    }

    #[test]
    fn test_country_match_is_case_insensitive() {
        let rules = [rule("t-1", 0, vec![])];

        assert!(find_tier(&rules, "us", "p-1", None, "cl-1").is_some());
        assert!(find_tier(&rules, "DE", "p-1", None, "cl-1").is_none());
    }

    #[test]
    fn test_member_match_by_product_or_variation() {
        let rules = [rule("t-1", 0, vec![])];

        assert!(find_tier(&rules, "US", "p-1", None, "cl-1").is_some());
        assert!(find_tier(&rules, "US", "p-2", Some("v-1"), "cl-1").is_some());
        assert!(find_tier(&rules, "US", "p-2", None, "cl-1").is_none());
    }

    #[test]
    fn test_client_targeted_beats_global() {
        // Global rule has the higher priority, but the targeted rule
        // still wins for the targeted client.
        let rules = [rule("t-global", 10, vec![]), rule("t-mine", 0, vec!["cl-1"])];

        let hit = find_tier(&rules, "US", "p-1", None, "cl-1").unwrap();
        assert_eq!(hit.id, "t-mine");

        // A different client falls through to the global rule.
        let hit = find_tier(&rules, "US", "p-1", None, "cl-2").unwrap();
        assert_eq!(hit.id, "t-global");
    }

    #[test]
    fn test_rules_targeting_other_clients_are_excluded() {
        let rules = [rule("t-other", 5, vec!["cl-99"])];

        assert!(find_tier(&rules, "US", "p-1", None, "cl-1").is_none());
    }

    #[test]
    fn test_priority_then_id_tie_break() {
        let rules = [
            rule("t-b", 1, vec![]),
            rule("t-a", 1, vec![]),
            rule("t-c", 0, vec![]),
        ];

        // Equal top priority: smallest id wins.
        let hit = find_tier(&rules, "US", "p-1", None, "cl-1").unwrap();
        assert_eq!(hit.id, "t-a");
    }

    #[test]
    fn test_price_for_quantity_boundaries() {
        let steps = rule("t-1", 0, vec![]).steps;

        assert_eq!(price_for_quantity(&steps, 0), None);
        assert_eq!(price_for_quantity(&steps, 1), Some(1000));
        assert_eq!(price_for_quantity(&steps, 4), Some(1000));
        assert_eq!(price_for_quantity(&steps, 5), Some(800));
        assert_eq!(price_for_quantity(&steps, 50), Some(800));
    }

    #[test]
    fn test_price_for_quantity_unsorted_steps() {
        let steps = vec![
            TierStep {
                min_quantity: 10,
                unit_price: 700,
            },
            TierStep {
                min_quantity: 1,
                unit_price: 1000,
            },
            TierStep {
                min_quantity: 5,
                unit_price: 800,
            },
        ];

        assert_eq!(price_for_quantity(&steps, 7), Some(800));
        assert_eq!(price_for_quantity(&steps, 12), Some(700));
    }

    #[test]
    fn test_empty_steps_yield_no_price() {
        assert_eq!(price_for_quantity(&[], 10), None);
    }
}
