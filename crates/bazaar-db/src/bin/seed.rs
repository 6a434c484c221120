//! # Seed Data Generator
//!
//! Populates the database with demo sellers, products and funded buyer
//! wallets for development.
//!
//! ## Usage
//! ```bash
//! # 3 sellers x 20 products, 5 buyers (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # More products per seller
//! cargo run -p bazaar-db --bin seed -- --products 50
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - Sellers `seller-1..N` with products titled `{Kind} {Topic} #{n}`
//! - Buyers `buyer-1..N`, each wallet credited with 1,000,000 VND
//! - `discountRate` system variable at 17 (percent)

use chrono::Utc;
use std::env;

use bazaar_core::{Money, UserProfile, DEFAULT_FEE_RATE_BPS, DISCOUNT_RATE_KEY};
use bazaar_db::{Database, DbConfig};

/// Digital product kinds for realistic titles
const KINDS: &[&str] = &["Ebook", "Course", "Template", "Preset Pack", "Icon Set", "Font"];

const TOPICS: &[&str] = &[
    "Rust Basics",
    "Landing Page",
    "Lightroom",
    "Budget Planner",
    "UI Kit",
    "Photography",
    "Resume",
    "Watercolor",
    "Pitch Deck",
    "Illustrations",
];

const SELLERS: usize = 3;
const BUYERS: usize = 5;
const BUYER_FUNDS_CENTS: i64 = 100_000_000;

/// Parses a count argument, warning and falling back to `default` on bad input.
fn parse_count(flag: &str, value: &str, default: usize) -> usize {
    match value.parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("⚠ Invalid {} value {:?}, using {}", flag, value, default);
            default
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_seller: usize = 20;
    let mut db_path = String::from("./bazaar_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    per_seller = parse_count("--products", &args[i + 1], 20);
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
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Products per seller (default: 20)");
                println!("  -d, --db <PATH>     Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {} per seller, {} sellers", per_seller, SELLERS);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let start = std::time::Instant::now();

    println!();
    println!("Creating sellers and products...");
    let mut generated = 0;
    for s in 1..=SELLERS {
        let seller_id = format!("seller-{s}");
        db.user_profiles()
            .upsert(&profile(&seller_id, &format!("Seller {s}")), now)
            .await?;

        for n in 0..per_seller {
            let seed = s * 1000 + n;
            let title = format!(
                "{} {} #{}",
                KINDS[seed % KINDS.len()],
                TOPICS[(seed / KINDS.len()) % TOPICS.len()],
                n + 1
            );
            // 20,000 - 499,000 VND in 1,000 steps
            let price_cents = (20 + (seed * 37) % 480) as i64 * 100_000;

            if let Err(e) = db.products().create(&seller_id, &title, price_cents, now).await {
                eprintln!("Failed to insert {}: {}", title, e);
                continue;
            }
            generated += 1;
        }
    }
    println!("  Generated {} products", generated);

    println!();
    println!("Funding buyer wallets...");
    for b in 1..=BUYERS {
        let buyer_id = format!("buyer-{b}");
        db.user_profiles()
            .upsert(&profile(&buyer_id, &format!("Buyer {b}")), now)
            .await?;
        let change = db
            .wallets()
            .add_balance(&buyer_id, Money::from_cents(BUYER_FUNDS_CENTS), now)
            .await?;
        println!("  {} balance: {}", buyer_id, change.after);
    }

    db.system_variables()
        .set(DISCOUNT_RATE_KEY, DEFAULT_FEE_RATE_BPS as f64 / 100.0, now)
        .await?;
    println!();
    println!("✓ {} = {}", DISCOUNT_RATE_KEY, DEFAULT_FEE_RATE_BPS as f64 / 100.0);

    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());

    Ok(())
}

fn profile(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email: Some(format!("{id}@bazaar.local")),
        display_name: Some(name.to_string()),
        avatar_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("--products", "50", 20), 50);
        assert_eq!(parse_count("--products", "fifty", 20), 20);
        assert_eq!(parse_count("--products", "-3", 20), 20);
    }
}
