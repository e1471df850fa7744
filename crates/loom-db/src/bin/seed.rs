//! # Seed Data Generator
//!
//! Populates a development database with textile items.
//!
//! ## Usage
//! ```bash
//! # Generate 200 items (default)
//! cargo run -p loom-db --bin seed
//!
//! # Generate custom amount into a specific file
//! cargo run -p loom-db --bin seed -- --count 500 --db ./data/loom.db
//! ```
//!
//! Each item gets a unique code `{CATEGORY}-{FABRIC}-{NNN}`, a per-metre
//! price, an opening stock (written through the stock log) and a
//! low-stock threshold.

use chrono::Utc;
use loom_core::validation::{validate_item_code, validate_item_name};
use loom_core::Item;
use loom_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// Fabric categories and the base names stocked in each.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "COT",
        "cotton",
        &[
            "Poplin",
            "Voile",
            "Canvas",
            "Muslin",
            "Jersey Knit",
            "Oxford",
            "Flannel",
            "Gauze",
        ],
    ),
    (
        "SLK",
        "silk",
        &[
            "Charmeuse",
            "Chiffon",
            "Dupioni",
            "Organza",
            "Crepe de Chine",
            "Habotai",
        ],
    ),
    (
        "LIN",
        "linen",
        &["Handkerchief", "Midweight", "Slub", "Washed", "Linen-Cotton Blend"],
    ),
    (
        "DNM",
        "denim",
        &["Raw Selvedge", "Stretch", "Chambray", "Indigo Twill", "Black Denim"],
    ),
    (
        "BTK",
        "batik",
        &[
            "Parang",
            "Kawung",
            "Mega Mendung",
            "Truntum",
            "Sekar Jagad",
            "Sidomukti",
        ],
    ),
];

/// Colourways; each adds to the base price.
const COLOURS: &[(&str, i64)] = &[
    ("Natural", 0),
    ("White", 0),
    ("Navy", 2_500),
    ("Maroon", 2_500),
    ("Forest", 3_000),
    ("Charcoal", 3_000),
    ("Sogan", 5_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./loom_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("Loom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of items to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./loom_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Loom Seed Data Generator");
    println!("========================");
    println!("Database: {}", db_path);
    println!("Items:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating items...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_idx, (prefix, category, fabrics)) in CATEGORIES.iter().enumerate() {
        for (fabric_idx, fabric) in fabrics.iter().enumerate() {
            for (colour_idx, (colour, price_addon)) in COLOURS.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + fabric_idx * 20 + colour_idx;
                let item = generate_item(prefix, category, fabric, colour, *price_addon, seed);

                if let Err(e) = validate_item_code(&item.code).and(validate_item_name(&item.name)) {
                    eprintln!("Skipping {}: {}", item.code, e);
                    continue;
                }

                if let Err(e) = db.items().insert(&item, "seed").await {
                    eprintln!("Failed to insert {}: {}", item.code, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} items...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} items in {:?}", generated, elapsed);

    let low = db.items().list_low_stock().await?;
    println!("  Low-stock items: {}", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one item with deterministic pseudo-random stock and pricing.
fn generate_item(
    prefix: &str,
    category: &str,
    fabric: &str,
    colour: &str,
    price_addon: i64,
    seed: usize,
) -> Item {
    let now = Utc::now();

    let fabric_code: String = fabric
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let code = format!("{}-{}-{:03}", prefix, fabric_code, seed % 1000);

    // Per-metre price: 25,000 - 124,000 plus colourway addon
    let unit_price = 25_000 + ((seed * 37) % 100) as i64 * 1_000 + price_addon;

    // Every third item carries a storefront discount of 5%
    let online_price = (seed % 3 == 0).then(|| unit_price * 95 / 100);

    let quantity = (seed % 61) as i64;
    let min_stock = 5 + (seed % 6) as i64;

    Item {
        id: Uuid::new_v4().to_string(),
        code,
        name: format!("{} {} ({})", colour, fabric, category),
        category: Some(category.to_string()),
        quantity,
        min_stock,
        max_stock: Some(200),
        unit_price,
        online_price,
        // A few items stay off the storefront
        is_active: seed % 17 != 0,
        created_at: now,
        updated_at: now,
    }
}
