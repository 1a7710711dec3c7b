//! # Seed Data Generator
//!
//! Populates a database with the built-in permission templates, a tier
//! ladder, two users and demo catalogue/customer data for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db with 60 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p tally-db --bin seed -- --products 200 --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Templates: Administrator, Manager, Cashier (system, default for their role)
//! - Tiers: Bronze ≥ 0 (1.0x), Silver ≥ 100 (1.25x), Gold ≥ 500 (1.5x)
//! - Users: `admin` (Admin), `till1` (Cashier)
//! - Products: `{CATEGORY}-{INDEX}` SKUs priced $0.99 - $24.99
//! - A handful of customers

use std::env;
use tally_core::{
    NewCustomer, NewLoyaltyTier, NewPermissionTemplate, NewProduct, NewTemplatePermission, NewUser,
    UserRole,
};
use tally_db::{Database, DbConfig};

const CATEGORIES: &[(&str, &[&str])] = &[
    ("BEV", &["Cola", "Lemonade", "Iced Tea", "Coffee", "Sparkling Water"]),
    ("SNK", &["Potato Chips", "Pretzels", "Trail Mix", "Chocolate Bar"]),
    ("BAK", &["Croissant", "Bagel", "Muffin", "Sourdough Loaf"]),
    ("DEL", &["Turkey Sandwich", "Caesar Salad", "Lunch Special"]),
];

const TIERS: &[(&str, i64, i64)] = &[("Bronze", 0, 10_000), ("Silver", 100, 12_500), ("Gold", 500, 15_000)];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ana Souza", "ana@example.com"),
    ("Ben Okafor", "ben@example.com"),
    ("Chloe Martin", "chloe@example.com"),
    ("Dev Patel", "dev@example.com"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
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
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Number of products to generate (default: 60)");
                println!("  -d, --db <PATH>     Database file path (default: ./tally_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.users().list().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} users", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Templates first so new users pick up their role default.
    for (name, role) in [
        ("Administrator", UserRole::Admin),
        ("Manager", UserRole::Manager),
        ("Cashier", UserRole::Cashier),
    ] {
        let template = db
            .permissions()
            .create_system_template(&NewPermissionTemplate {
                name: name.to_string(),
                description: Some(format!("Built-in {} permissions", role.as_str())),
                is_default: true,
                role: Some(role),
                permissions: role
                    .default_permissions()
                    .into_iter()
                    .map(|p| NewTemplatePermission {
                        resource: p.resource().as_str().to_string(),
                        action: p.action().as_str().to_string(),
                        field: None,
                        allowed: true,
                    })
                    .collect(),
            })
            .await?;
        println!("✓ Template {} ({} rules)", name, template.permissions.len());
    }

    for (name, min_points, bps) in TIERS {
        db.loyalty_tiers()
            .create(&NewLoyaltyTier {
                name: name.to_string(),
                min_points: *min_points,
                points_multiplier_bps: *bps,
            })
            .await?;
    }
    println!("✓ {} loyalty tiers", TIERS.len());

    for (username, display_name, role) in [
        ("admin", "Administrator", UserRole::Admin),
        ("till1", "Till One", UserRole::Cashier),
    ] {
        let user = db
            .users()
            .create(&NewUser {
                username: username.to_string(),
                display_name: display_name.to_string(),
                role,
                permission_template_id: None,
            })
            .await?;
        println!("✓ User {} (id {})", user.username, user.id);
    }

    let start = std::time::Instant::now();
    let mut generated = 0;
    'outer: for (category_code, names) in CATEGORIES {
        for (idx, name) in names.iter().enumerate() {
            for size in 0..count.div_ceil(CATEGORIES.len() * names.len()).max(1) {
                if generated >= count {
                    break 'outer;
                }
                let product = generate_product(category_code, name, idx * 100 + size);
                if let Err(e) = db.products().create(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }
                generated += 1;
            }
        }
    }
    println!("✓ Generated {} products in {:?}", generated, start.elapsed());

    for (name, email) in CUSTOMERS {
        db.customers()
            .create(&NewCustomer {
                name: name.to_string(),
                email: Some(email.to_string()),
                phone: None,
            })
            .await?;
    }
    println!("✓ {} customers", CUSTOMERS.len());

    println!();
    println!("✓ Seed complete!");
    db.close().await;

    Ok(())
}

/// A deterministic product for a category, base name and index.
fn generate_product(category: &str, name: &str, seed: usize) -> NewProduct {
    let sku = format!("{}-{:04}", category, seed);
    let price_cents = 99 + ((seed as i64 * 37) % 2400);
    let name = if seed % 100 == 0 {
        name.to_string()
    } else {
        format!("{} #{}", name, seed % 100 + 1)
    };

    NewProduct {
        sku,
        name,
        price_cents,
    }
}
