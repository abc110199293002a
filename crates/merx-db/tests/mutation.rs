//! Integration tests for the cart mutation transaction.
//!
//! Every test runs against a fresh in-memory SQLite database with the real
//! migrations applied, driving the engine through the public
//! [`CartMutator`] API and asserting on committed state.

use chrono::Utc;
use sqlx::SqlitePool;

use merx_core::{cart_fingerprint, CoreError, LineRef, MutationAction};
use merx_db::{CartMutator, Database, DbConfig, MutationError, MutationRequest};

const ORG: &str = "org-1";
const CLIENT: &str = "client-1";
const CART: &str = "cart-1";
const COUNTRY: &str = "US";

// =============================================================================
// Fixtures
// =============================================================================

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn test_db_no_backorder() -> Database {
    Database::new(DbConfig::in_memory().allow_backorder(false))
        .await
        .unwrap()
}

async fn seed_client(pool: &SqlitePool, id: &str, level_id: Option<&str>) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO clients (id, organization_id, country, level_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(ORG)
    .bind(COUNTRY)
    .bind(level_id)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_cart(pool: &SqlitePool, id: &str, client_id: &str, channel: &str) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO carts (id, client_id, organization_id, channel, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(client_id)
    .bind(ORG)
    .bind(channel)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_product(pool: &SqlitePool, id: &str, title: &str) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO products (id, organization_id, title, sku, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(ORG)
    .bind(title)
    .bind(format!("SKU-{id}"))
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_price(
    pool: &SqlitePool,
    product_id: &str,
    variation_id: Option<&str>,
    level_id: Option<&str>,
    price_cents: i64,
) {
    sqlx::query(
        "INSERT INTO product_prices (id, product_id, variation_id, country, level_id, price_cents)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(variation_id)
    .bind(COUNTRY)
    .bind(level_id)
    .bind(price_cents)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_affiliate_product(
    pool: &SqlitePool,
    id: &str,
    organization_id: &str,
    required_level_id: Option<&str>,
) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO affiliate_products (id, organization_id, title, required_level_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(organization_id)
    .bind(format!("Affiliate {id}"))
    .bind(required_level_id)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_affiliate_points(
    pool: &SqlitePool,
    affiliate_product_id: &str,
    level_id: Option<&str>,
    sale_points: Option<i64>,
    regular_points: Option<i64>,
) {
    sqlx::query(
        "INSERT INTO affiliate_product_points
             (id, affiliate_product_id, variation_id, level_id, sale_points, regular_points)
         VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(affiliate_product_id)
    .bind(level_id)
    .bind(sale_points)
    .bind(regular_points)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_balance(pool: &SqlitePool, client_id: &str, points_current: i64) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO affiliate_point_balances
             (client_id, organization_id, points_current, points_spent, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
    )
    .bind(client_id)
    .bind(ORG)
    .bind(points_current)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_stock(pool: &SqlitePool, product_id: &str, quantity: i64) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO stock_records (id, product_id, variation_id, country, quantity, updated_at)
         VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(COUNTRY)
    .bind(quantity)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_tier_rule(
    pool: &SqlitePool,
    id: &str,
    priority: i64,
    product_ids: &[&str],
    client_ids: &[&str],
    steps: &[(i64, i64)],
) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO tier_rules (id, organization_id, name, active, priority, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)",
    )
    .bind(id)
    .bind(ORG)
    .bind(format!("rule {id}"))
    .bind(priority)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO tier_rule_countries (tier_rule_id, country) VALUES (?1, ?2)")
        .bind(id)
        .bind(COUNTRY)
        .execute(pool)
        .await
        .unwrap();

    for product_id in product_ids {
        sqlx::query(
            "INSERT INTO tier_rule_members (tier_rule_id, product_id, variation_id) VALUES (?1, ?2, NULL)",
        )
        .bind(id)
        .bind(product_id)
        .execute(pool)
        .await
        .unwrap();
    }

    for client_id in client_ids {
        sqlx::query("INSERT INTO tier_rule_clients (tier_rule_id, client_id) VALUES (?1, ?2)")
            .bind(id)
            .bind(client_id)
            .execute(pool)
            .await
            .unwrap();
    }

    for (min_quantity, unit_price) in steps {
        sqlx::query(
            "INSERT INTO tier_rule_steps (tier_rule_id, min_quantity, unit_price) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(min_quantity)
        .bind(unit_price)
        .execute(pool)
        .await
        .unwrap();
    }
}

/// The standard scenario: one client, one web cart, one $10.00 product
/// with 10 units of stock.
async fn standard_setup(db: &Database) {
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    seed_stock(pool, "prod-a", 10).await;
}

fn product_request(product_id: &str, action: MutationAction) -> MutationRequest {
    MutationRequest {
        cart_id: CART.to_string(),
        organization_id: ORG.to_string(),
        line: LineRef::Product {
            product_id: product_id.to_string(),
        },
        variation_id: None,
        action,
    }
}

fn affiliate_request(affiliate_product_id: &str, action: MutationAction) -> MutationRequest {
    MutationRequest {
        cart_id: CART.to_string(),
        organization_id: ORG.to_string(),
        line: LineRef::Affiliate {
            affiliate_product_id: affiliate_product_id.to_string(),
        },
        variation_id: None,
        action,
    }
}

// =============================================================================
// State Probes
// =============================================================================

async fn stock_of(pool: &SqlitePool, product_id: &str) -> Option<i64> {
    sqlx::query_scalar("SELECT quantity FROM stock_records WHERE product_id = ?1 AND country = ?2")
        .bind(product_id)
        .bind(COUNTRY)
        .fetch_optional(pool)
        .await
        .unwrap()
}

async fn balance_of(pool: &SqlitePool, client_id: &str) -> Option<(i64, i64)> {
    sqlx::query_as(
        "SELECT points_current, points_spent FROM affiliate_point_balances
         WHERE client_id = ?1 AND organization_id = ?2",
    )
    .bind(client_id)
    .bind(ORG)
    .fetch_optional(pool)
    .await
    .unwrap()
}

async fn cart_hash(pool: &SqlitePool) -> Option<String> {
    sqlx::query_scalar("SELECT cart_updated_hash FROM carts WHERE id = ?1")
        .bind(CART)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn line_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM cart_lines WHERE cart_id = ?1")
        .bind(CART)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn line_of(pool: &SqlitePool, catalog_id: &str) -> Option<(i64, i64)> {
    sqlx::query_as(
        "SELECT quantity, unit_price FROM cart_lines
         WHERE cart_id = ?1 AND COALESCE(product_id, affiliate_product_id) = ?2",
    )
    .bind(CART)
    .bind(catalog_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}

async fn ledger_entries(pool: &SqlitePool) -> Vec<(i64, String)> {
    sqlx::query_as(
        "SELECT points, action FROM affiliate_point_logs
         WHERE client_id = ?1 AND organization_id = ?2
         ORDER BY created_at, id",
    )
    .bind(CLIENT)
    .bind(ORG)
    .fetch_all(pool)
    .await
    .unwrap()
}

fn domain_error(err: MutationError) -> CoreError {
    match err {
        MutationError::Domain(core) => core,
        MutationError::Db(db) => panic!("expected domain error, got db error: {db}"),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn add_creates_line_reserves_stock_and_stamps_hash() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    let snapshot = mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(snapshot.lines.len(), 1);
    let view = &snapshot.lines[0];
    assert_eq!(view.title, "Product A");
    assert_eq!(view.quantity, 1);
    assert_eq!(view.unit_price, 1000);
    assert_eq!(view.subtotal, 1000);
    assert!(!view.is_affiliate);

    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(9));
    assert!(cart_hash(db.pool()).await.is_some());
}

#[tokio::test]
async fn subtract_deletes_line_and_restores_pre_add_state() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();
    let hash_after_add = cart_hash(db.pool()).await.unwrap();

    let snapshot = mutator
        .mutate(&product_request("prod-a", MutationAction::Subtract))
        .await
        .unwrap();

    // Line deleted, not kept at zero.
    assert!(snapshot.lines.is_empty());
    assert_eq!(line_count(db.pool()).await, 0);

    // Stock released back to the pre-add level.
    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(10));

    // The hash changed again and equals the empty-cart fingerprint.
    let hash_after_subtract = cart_hash(db.pool()).await.unwrap();
    assert_ne!(hash_after_add, hash_after_subtract);
    assert_eq!(hash_after_subtract, cart_fingerprint(&[]));
}

#[tokio::test]
async fn add_then_subtract_is_inverse_for_points_too() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, Some("gold")).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    seed_affiliate_points(pool, "aff-a", None, Some(25), None).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Add))
        .await
        .unwrap();
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((75, 25)));

    mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Subtract))
        .await
        .unwrap();

    // Balance and spend counter back to the pre-add state.
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((100, 0)));
    assert_eq!(line_count(db.pool()).await, 0);

    // Both movements were logged, append-only.
    let entries = ledger_entries(db.pool()).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], (-25, "spend".to_string()));
    assert_eq!(entries[1], (25, "refund".to_string()));
}

#[tokio::test]
async fn crossing_tier_boundary_rewrites_all_sibling_lines() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_product(pool, "prod-b", "Product B").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    seed_price(pool, "prod-b", None, None, 1200).await;
    seed_tier_rule(
        pool,
        "tier-1",
        0,
        &["prod-a", "prod-b"],
        &[],
        &[(1, 1000), (5, 800)],
    )
    .await;

    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate_many(&product_request("prod-a", MutationAction::Add), 4)
        .await
        .unwrap();
    assert_eq!(line_of(db.pool(), "prod-a").await, Some((4, 1000)));

    // Adding one unit of B pushes the cumulative tier quantity to 5 -
    // BOTH lines must drop to the 800 step, not just B.
    mutator
        .mutate(&product_request("prod-b", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(line_of(db.pool(), "prod-a").await, Some((4, 800)));
    assert_eq!(line_of(db.pool(), "prod-b").await, Some((1, 800)));
}

#[tokio::test]
async fn dropping_below_every_step_restores_each_base_price() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_product(pool, "prod-b", "Product B").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    seed_price(pool, "prod-b", None, None, 1200).await;
    // Single step at 5: below it, tier pricing does not apply at all.
    seed_tier_rule(pool, "tier-1", 0, &["prod-a", "prod-b"], &[], &[(5, 800)]).await;

    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate_many(&product_request("prod-a", MutationAction::Add), 3)
        .await
        .unwrap();
    mutator
        .mutate_many(&product_request("prod-b", MutationAction::Add), 2)
        .await
        .unwrap();
    assert_eq!(line_of(db.pool(), "prod-a").await, Some((3, 800)));
    assert_eq!(line_of(db.pool(), "prod-b").await, Some((2, 800)));

    // Back under the threshold: each line returns to its OWN base price.
    mutator
        .mutate(&product_request("prod-b", MutationAction::Subtract))
        .await
        .unwrap();

    assert_eq!(line_of(db.pool(), "prod-a").await, Some((3, 1000)));
    assert_eq!(line_of(db.pool(), "prod-b").await, Some((1, 1200)));
}

#[tokio::test]
async fn insufficient_points_aborts_with_untouched_balance() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    seed_affiliate_points(pool, "aff-a", None, Some(10), None).await;
    seed_balance(pool, CLIENT, 5).await;
    seed_stock(pool, "aff-a", 3).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Add))
        .await
        .unwrap_err();

    match domain_error(err) {
        CoreError::InsufficientPoints {
            required,
            available,
        } => {
            assert_eq!(required, 10);
            assert_eq!(available, 5);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Rollback left everything exactly as seeded.
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((5, 0)));
    assert_eq!(stock_of(db.pool(), "aff-a").await, Some(3));
    assert_eq!(line_count(db.pool()).await, 0);
    assert!(ledger_entries(db.pool()).await.is_empty());
}

#[tokio::test]
async fn ineligible_level_rejects_before_any_side_effect() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, Some("silver")).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, Some("gold")).await;
    seed_affiliate_points(pool, "aff-a", None, Some(10), None).await;
    seed_balance(pool, CLIENT, 100).await;
    seed_stock(pool, "aff-a", 3).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Add))
        .await
        .unwrap_err();

    match domain_error(err) {
        CoreError::LevelNotEligible { required_level, .. } => {
            assert_eq!(required_level, "gold");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((100, 0)));
    assert_eq!(stock_of(db.pool(), "aff-a").await, Some(3));
    assert_eq!(line_count(db.pool()).await, 0);
}

#[tokio::test]
async fn pos_cart_rejects_foreign_organization_product() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "pos").await;
    // Shared affiliate product owned by a different organization.
    seed_affiliate_product(pool, "aff-shared", "org-2", None).await;
    seed_affiliate_points(pool, "aff-shared", None, Some(10), None).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&affiliate_request("aff-shared", MutationAction::Add))
        .await
        .unwrap_err();

    assert!(matches!(
        domain_error(err),
        CoreError::SharedProductForbiddenInPos { .. }
    ));
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((100, 0)));
    assert_eq!(line_count(db.pool()).await, 0);
}

#[tokio::test]
async fn same_shared_product_is_allowed_in_web_cart() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-shared", "org-2", None).await;
    seed_affiliate_points(pool, "aff-shared", None, Some(10), None).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    let snapshot = mutator
        .mutate(&affiliate_request("aff-shared", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(snapshot.lines.len(), 1);
    assert!(snapshot.lines[0].is_affiliate);
    assert_eq!(snapshot.lines[0].unit_price, 10);
}

#[tokio::test]
async fn subtract_without_line_is_line_not_found() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&product_request("prod-a", MutationAction::Subtract))
        .await
        .unwrap_err();

    assert!(matches!(
        domain_error(err),
        CoreError::LineNotFound { .. }
    ));
    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(10));
}

#[tokio::test]
async fn unknown_cart_is_cart_not_found() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    let mut request = product_request("prod-a", MutationAction::Add);
    request.cart_id = "cart-missing".to_string();

    let err = mutator.mutate(&request).await.unwrap_err();
    assert!(matches!(domain_error(err), CoreError::CartNotFound(_)));
}

#[tokio::test]
async fn missing_price_row_is_pricing_not_found() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-unpriced", "No Price").await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&product_request("prod-unpriced", MutationAction::Add))
        .await
        .unwrap_err();

    match domain_error(err) {
        CoreError::PricingNotFound { country, .. } => assert_eq!(country, COUNTRY),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_client_country_fails_validation_not_pricing() {
    let db = test_db().await;
    let pool = db.pool();
    let now = Utc::now();
    // A client row with a blank country would match no price or stock
    // record; the mutation must report the bad row, not a missing price.
    sqlx::query(
        "INSERT INTO clients (id, organization_id, country, level_id, created_at, updated_at)
         VALUES (?1, ?2, '', NULL, ?3, ?3)",
    )
    .bind(CLIENT)
    .bind(ORG)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 1000).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap_err();

    assert!(matches!(domain_error(err), CoreError::Validation(_)));
    assert_eq!(line_count(db.pool()).await, 0);
}

#[tokio::test]
async fn zero_points_configuration_is_rejected() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    // A zero value counts as absent for points resolution.
    seed_affiliate_points(pool, "aff-a", None, Some(0), Some(0)).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Add))
        .await
        .unwrap_err();

    assert!(matches!(
        domain_error(err),
        CoreError::NoPointsPriceConfigured { .. }
    ));
}

#[tokio::test]
async fn sale_points_fall_back_through_levels_to_regular_points() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, Some("gold")).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    // No sale points anywhere; gold-level regular points beat the default.
    seed_affiliate_points(pool, "aff-a", None, None, Some(50)).await;
    seed_affiliate_points(pool, "aff-a", Some("gold"), None, Some(30)).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    let snapshot = mutator
        .mutate(&affiliate_request("aff-a", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(snapshot.lines[0].unit_price, 30);
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((70, 30)));
}

#[tokio::test]
async fn variation_price_beats_product_wide_price() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 999).await;
    seed_price(pool, "prod-a", Some("var-1"), None, 500).await;

    let mutator = CartMutator::new(db.clone());

    let mut request = product_request("prod-a", MutationAction::Add);
    request.variation_id = Some("var-1".to_string());

    let snapshot = mutator.mutate(&request).await.unwrap();
    assert_eq!(snapshot.lines[0].unit_price, 500);
    assert_eq!(snapshot.lines[0].variation_id.as_deref(), Some("var-1"));

    // Stock is tracked per variation when one is in play.
    let variation_stock: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_records WHERE variation_id = 'var-1' AND country = ?1",
    )
    .bind(COUNTRY)
    .fetch_optional(db.pool())
    .await
    .unwrap();
    assert_eq!(variation_stock, Some(-1));
}

#[tokio::test]
async fn every_committed_mutation_changes_the_hash() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    assert_eq!(cart_hash(db.pool()).await, None);

    mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();
    let first = cart_hash(db.pool()).await.unwrap();

    mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();
    let second = cart_hash(db.pool()).await.unwrap();

    assert_ne!(first, second);

    // A failed mutation must NOT move the hash.
    let err = mutator
        .mutate(&product_request("prod-missing", MutationAction::Add))
        .await
        .unwrap_err();
    assert!(matches!(
        domain_error(err),
        CoreError::PricingNotFound { .. }
    ));
    assert_eq!(cart_hash(db.pool()).await, Some(second));
}

#[tokio::test]
async fn batch_mutation_applies_n_units_in_one_transaction() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    let snapshot = mutator
        .mutate_many(&product_request("prod-a", MutationAction::Add), 3)
        .await
        .unwrap();

    assert_eq!(snapshot.lines[0].quantity, 3);
    assert_eq!(snapshot.lines[0].subtotal, 3000);
    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(7));
}

#[tokio::test]
async fn batch_mutation_rejects_out_of_range_counts() {
    let db = test_db().await;
    standard_setup(&db).await;
    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate_many(&product_request("prod-a", MutationAction::Add), 0)
        .await
        .unwrap_err();
    assert!(matches!(domain_error(err), CoreError::Validation(_)));

    let err = mutator
        .mutate_many(
            &product_request("prod-a", MutationAction::Add),
            merx_core::MAX_BATCH_QUANTITY + 1,
        )
        .await
        .unwrap_err();
    assert!(matches!(domain_error(err), CoreError::Validation(_)));
}

#[tokio::test]
async fn affiliate_batch_reserves_per_unit_ledger_entries() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    seed_affiliate_points(pool, "aff-a", None, Some(10), None).await;
    seed_balance(pool, CLIENT, 100).await;

    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate_many(&affiliate_request("aff-a", MutationAction::Add), 3)
        .await
        .unwrap();

    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((70, 30)));
    let entries = ledger_entries(db.pool()).await;
    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .all(|(points, action)| *points == -10 && action.as_str() == "spend"));
}

#[tokio::test]
async fn affiliate_batch_rolls_back_wholesale_when_points_run_out() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_affiliate_product(pool, "aff-a", ORG, None).await;
    seed_affiliate_points(pool, "aff-a", None, Some(10), None).await;
    // Enough for 2 units, requested 3: the whole batch must fail.
    seed_balance(pool, CLIENT, 25).await;

    let mutator = CartMutator::new(db.clone());

    let err = mutator
        .mutate_many(&affiliate_request("aff-a", MutationAction::Add), 3)
        .await
        .unwrap_err();

    assert!(matches!(
        domain_error(err),
        CoreError::InsufficientPoints { .. }
    ));
    assert_eq!(balance_of(db.pool(), CLIENT).await, Some((25, 0)));
    assert_eq!(line_count(db.pool()).await, 0);
    assert!(ledger_entries(db.pool()).await.is_empty());
}

#[tokio::test]
async fn disabled_backorder_floors_stock_at_zero() {
    let db = test_db_no_backorder().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    seed_stock(pool, "prod-a", 1).await;

    let mutator = CartMutator::new(db.clone());

    // First unit consumes the last stock.
    mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();
    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(0));

    // Second unit would go negative: rejected, first unit stays committed.
    let err = mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap_err();
    assert!(matches!(
        domain_error(err),
        CoreError::InsufficientStock { .. }
    ));
    assert_eq!(line_of(db.pool(), "prod-a").await, Some((1, 1000)));
    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(0));
}

#[tokio::test]
async fn default_backorder_allows_negative_stock() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    // No stock record at all: lazy creation goes straight negative.

    let mutator = CartMutator::new(db.clone());

    mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(stock_of(db.pool(), "prod-a").await, Some(-1));
}

#[tokio::test]
async fn client_targeted_tier_beats_global_end_to_end() {
    let db = test_db().await;
    let pool = db.pool();
    seed_client(pool, CLIENT, None).await;
    seed_cart(pool, CART, CLIENT, "web").await;
    seed_product(pool, "prod-a", "Product A").await;
    seed_price(pool, "prod-a", None, None, 1000).await;
    // Global rule would price at 900 from qty 1; the client-targeted rule
    // prices at 850 and must win despite the lower priority.
    seed_tier_rule(pool, "tier-global", 10, &["prod-a"], &[], &[(1, 900)]).await;
    seed_tier_rule(pool, "tier-mine", 0, &["prod-a"], &[CLIENT], &[(1, 850)]).await;

    let mutator = CartMutator::new(db.clone());

    let snapshot = mutator
        .mutate(&product_request("prod-a", MutationAction::Add))
        .await
        .unwrap();

    assert_eq!(snapshot.lines[0].unit_price, 850);
}
