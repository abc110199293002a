//! # Seed Data Generator
//!
//! Populates the database with a demo organization for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default development database
//! cargo run -p merx-db --bin seed
//!
//! # Specify database path
//! cargo run -p merx-db --bin seed -- --db ./data/merx.db
//!
//! # Generate more catalog products
//! cargo run -p merx-db --bin seed -- --products 200
//! ```
//!
//! ## Generated Data
//! One organization (`org-demo`) with:
//! - Two clients: a plain web shopper and a gold-level affiliate, each with
//!   an empty cart (one web, one POS)
//! - Catalog products priced in US/DE with stock on hand
//! - Affiliate products priced in points (gold level discounted), with a
//!   starting point balance for the affiliate client
//! - A volume tier rule over the first two products (5+ units drop the price)
//!
//! Idempotent-ish: refuses to run against a database that already has
//! products, so a stale dev file never ends up double-seeded.

use chrono::Utc;
use sqlx::SqlitePool;
use std::env;
use uuid::Uuid;

use merx_db::{Database, DbConfig};

const ORG: &str = "org-demo";
const WEB_CLIENT: &str = "client-web-demo";
const AFFILIATE_CLIENT: &str = "client-affiliate-demo";
const WEB_CART: &str = "cart-web-demo";
const POS_CART: &str = "cart-pos-demo";
const COUNTRIES: &[&str] = &["US", "DE"];

/// Product name fragments for plausible catalog entries.
const ADJECTIVES: &[&str] = &[
    "Classic", "Premium", "Everyday", "Compact", "Deluxe", "Essential", "Studio", "Travel",
    "Heavy-Duty", "Eco",
];
const NOUNS: &[&str] = &[
    "Backpack", "Water Bottle", "Notebook", "Desk Lamp", "Headphones", "Mug", "Charger",
    "Umbrella", "Wallet", "Sneakers",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut product_count: usize = 50;
    let mut db_path = String::from("./merx_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    // The tier rule needs at least two members.
                    product_count = args[i + 1].parse().unwrap_or(50).max(2);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Merx Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Number of catalog products (default: 50)");
                println!("  -d, --db <PATH>     Database file path (default: ./merx_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Merx Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Products: {}", product_count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Refuse to double-seed
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let pool = db.pool();

    seed_clients_and_carts(pool).await?;
    println!("✓ Clients and carts");

    let product_ids = seed_products(pool, product_count).await?;
    println!("✓ {} catalog products with prices and stock", product_ids.len());

    seed_affiliate_catalog(pool).await?;
    println!("✓ Affiliate products, point costs, starting balance");

    seed_tier_rule(pool, &product_ids).await?;
    println!("✓ Volume tier rule over {} and {}", product_ids[0], product_ids[1]);

    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());
    println!();
    println!("Try it:");
    println!("  cargo run -p merx-cart-api");
    println!("  curl -X PATCH localhost:8080/carts/{WEB_CART}/lines \\");
    println!("       -H 'content-type: application/json' -H 'x-organization-id: {ORG}' \\");
    println!("       -d '{{\"productId\":\"{}\",\"action\":\"add\"}}'", product_ids[0]);

    Ok(())
}

async fn seed_clients_and_carts(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let now = Utc::now();

    for (client_id, level) in [(WEB_CLIENT, None), (AFFILIATE_CLIENT, Some("gold"))] {
        sqlx::query(
            "INSERT INTO clients (id, organization_id, country, level_id, created_at, updated_at)
             VALUES (?1, ?2, 'US', ?3, ?4, ?4)",
        )
        .bind(client_id)
        .bind(ORG)
        .bind(level)
        .bind(now)
        .execute(pool)
        .await?;
    }

    for (cart_id, client_id, channel) in [
        (WEB_CART, WEB_CLIENT, "web"),
        (POS_CART, AFFILIATE_CLIENT, "pos"),
    ] {
        sqlx::query(
            "INSERT INTO carts (id, client_id, organization_id, channel, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(cart_id)
        .bind(client_id)
        .bind(ORG)
        .bind(channel)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_products(pool: &SqlitePool, count: usize) -> Result<Vec<String>, sqlx::Error> {
    let now = Utc::now();
    let mut ids = Vec::with_capacity(count);

    for seed in 0..count {
        let adjective = ADJECTIVES[seed % ADJECTIVES.len()];
        let noun = NOUNS[(seed / ADJECTIVES.len()) % NOUNS.len()];
        let id = format!("prod-{:04}", seed + 1);
        let title = format!("{adjective} {noun}");
        let sku = format!("MRX-{:04}", seed + 1);
        // $4.99 - $44.99, deterministic per index
        let price_cents = 499 + ((seed * 73) % 4000) as i64;

        sqlx::query(
            "INSERT INTO products (id, organization_id, title, description, sku, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(&id)
        .bind(ORG)
        .bind(&title)
        .bind(format!("Demo catalog entry: {title}"))
        .bind(&sku)
        .bind(now)
        .execute(pool)
        .await?;

        for country in COUNTRIES {
            sqlx::query(
                "INSERT INTO product_prices (id, product_id, variation_id, country, level_id, price_cents)
                 VALUES (?1, ?2, NULL, ?3, NULL, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(country)
            .bind(price_cents)
            .execute(pool)
            .await?;

            sqlx::query(
                "INSERT INTO stock_records (id, product_id, variation_id, country, quantity, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(country)
            .bind(((seed * 13) % 90 + 10) as i64)
            .bind(now)
            .execute(pool)
            .await?;
        }

        ids.push(id);
    }

    Ok(ids)
}

async fn seed_affiliate_catalog(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let now = Utc::now();

    for (id, title, required_level, default_points, gold_points) in [
        ("aff-0001", "Partner Welcome Kit", None, 40, 30),
        ("aff-0002", "Gold Member Jacket", Some("gold"), 150, 120),
    ] {
        sqlx::query(
            "INSERT INTO affiliate_products
                 (id, organization_id, title, description, sku, required_level_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        )
        .bind(id)
        .bind(ORG)
        .bind(title)
        .bind(format!("Demo affiliate reward: {title}"))
        .bind(format!("MRX-{}", id.to_uppercase()))
        .bind(required_level)
        .bind(now)
        .execute(pool)
        .await?;

        // Default tier plus a discounted gold row.
        for (level, points) in [(None, default_points), (Some("gold"), gold_points)] {
            sqlx::query(
                "INSERT INTO affiliate_product_points
                     (id, affiliate_product_id, variation_id, level_id, sale_points, regular_points)
                 VALUES (?1, ?2, NULL, ?3, NULL, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id)
            .bind(level)
            .bind(points)
            .execute(pool)
            .await?;
        }

        for country in COUNTRIES {
            sqlx::query(
                "INSERT INTO stock_records (id, product_id, variation_id, country, quantity, updated_at)
                 VALUES (?1, ?2, NULL, ?3, 25, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id)
            .bind(country)
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    sqlx::query(
        "INSERT INTO affiliate_point_balances
             (client_id, organization_id, points_current, points_spent, created_at, updated_at)
         VALUES (?1, ?2, 500, 0, ?3, ?3)",
    )
    .bind(AFFILIATE_CLIENT)
    .bind(ORG)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_tier_rule(pool: &SqlitePool, product_ids: &[String]) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let rule_id = "tier-demo-bulk";

    sqlx::query(
        "INSERT INTO tier_rules (id, organization_id, name, active, priority, created_at, updated_at)
         VALUES (?1, ?2, 'Demo bulk discount', 1, 0, ?3, ?3)",
    )
    .bind(rule_id)
    .bind(ORG)
    .bind(now)
    .execute(pool)
    .await?;

    for country in COUNTRIES {
        sqlx::query("INSERT INTO tier_rule_countries (tier_rule_id, country) VALUES (?1, ?2)")
            .bind(rule_id)
            .bind(country)
            .execute(pool)
            .await?;
    }

    for product_id in product_ids.iter().take(2) {
        sqlx::query(
            "INSERT INTO tier_rule_members (tier_rule_id, product_id, variation_id) VALUES (?1, ?2, NULL)",
        )
        .bind(rule_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    }

    for (min_quantity, unit_price) in [(5, 449), (10, 399)] {
        sqlx::query(
            "INSERT INTO tier_rule_steps (tier_rule_id, min_quantity, unit_price) VALUES (?1, ?2, ?3)",
        )
        .bind(rule_id)
        .bind(min_quantity)
        .bind(unit_price)
        .execute(pool)
        .await?;
    }

    Ok(())
}
