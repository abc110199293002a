//! # Tier Rule Repository
//!
//! Loads the organization's active volume-discount rules - the read-only
//! tier-pricing input of a cart mutation. Selection and step math live in
//! `merx_core::tier`; this module only assembles rule records.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use merx_core::{TierRule, TierStep};

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    organization_id: String,
    name: String,
    active: bool,
    priority: i64,
}

/// Loads all active tier rules for an organization, with their countries,
/// members, client targets, and ordered steps.
///
/// Rules are immutable for the duration of a mutation: the caller loads them
/// once per transaction and resolves against the in-memory set.
pub async fn load_active_rules(
    conn: &mut SqliteConnection,
    organization_id: &str,
) -> DbResult<Vec<TierRule>> {
    let rule_rows = sqlx::query_as::<_, RuleRow>(
        r#"
        SELECT id, organization_id, name, active, priority
        FROM tier_rules
        WHERE organization_id = ?1 AND active = 1
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?;

    if rule_rows.is_empty() {
        return Ok(Vec::new());
    }

    let countries = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT tc.tier_rule_id, tc.country
        FROM tier_rule_countries tc
        INNER JOIN tier_rules t ON t.id = tc.tier_rule_id
        WHERE t.organization_id = ?1 AND t.active = 1
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?;

    let members = sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
        r#"
        SELECT tm.tier_rule_id, tm.product_id, tm.variation_id
        FROM tier_rule_members tm
        INNER JOIN tier_rules t ON t.id = tm.tier_rule_id
        WHERE t.organization_id = ?1 AND t.active = 1
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?;

    let clients = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT tcl.tier_rule_id, tcl.client_id
        FROM tier_rule_clients tcl
        INNER JOIN tier_rules t ON t.id = tcl.tier_rule_id
        WHERE t.organization_id = ?1 AND t.active = 1
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?;

    let steps = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT ts.tier_rule_id, ts.min_quantity, ts.unit_price
        FROM tier_rule_steps ts
        INNER JOIN tier_rules t ON t.id = ts.tier_rule_id
        WHERE t.organization_id = ?1 AND t.active = 1
        ORDER BY ts.min_quantity
        "#,
    )
    .bind(organization_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_rule: HashMap<String, TierRule> = rule_rows
        .into_iter()
        .map(|r| {
            (
                r.id.clone(),
                TierRule {
                    id: r.id,
                    organization_id: r.organization_id,
                    name: r.name,
                    active: r.active,
                    priority: r.priority,
                    countries: Vec::new(),
                    member_product_ids: Vec::new(),
                    member_variation_ids: Vec::new(),
                    client_ids: Vec::new(),
                    steps: Vec::new(),
                },
            )
        })
        .collect();

    for (rule_id, country) in countries {
        if let Some(rule) = by_rule.get_mut(&rule_id) {
            rule.countries.push(country);
        }
    }
    for (rule_id, product_id, variation_id) in members {
        if let Some(rule) = by_rule.get_mut(&rule_id) {
            if let Some(p) = product_id {
                rule.member_product_ids.push(p);
            }
            if let Some(v) = variation_id {
                rule.member_variation_ids.push(v);
            }
        }
    }
    for (rule_id, client_id) in clients {
        if let Some(rule) = by_rule.get_mut(&rule_id) {
            rule.client_ids.push(client_id);
        }
    }
    for (rule_id, min_quantity, unit_price) in steps {
        if let Some(rule) = by_rule.get_mut(&rule_id) {
            rule.steps.push(TierStep {
                min_quantity,
                unit_price,
            });
        }
    }

    let mut rules: Vec<TierRule> = by_rule.into_values().collect();
    // Deterministic order for logs and tests; selection itself never
    // depends on it.
    rules.sort_by(|a, b| a.id.cmp(&b.id));

    debug!(
        organization_id = %organization_id,
        count = rules.len(),
        "Loaded active tier rules"
    );

    Ok(rules)
}
