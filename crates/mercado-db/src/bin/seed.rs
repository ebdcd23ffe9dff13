//! # Seed Data Generator
//!
//! Populates the database with a catalog, customers and a month of order
//! history for development.
//!
//! ## Usage
//! ```bash
//! # Default: 25 customers, 200 orders
//! cargo run -p mercado-db --bin seed
//!
//! # Custom amounts
//! cargo run -p mercado-db --bin seed -- --customers 50 --orders 1000
//!
//! # Specify database path
//! cargo run -p mercado-db --bin seed -- --db ./data/mercado.db
//! ```
//!
//! ## Generated Data
//! - One category per entry in [`CATEGORIES`], each with a house brand
//! - Products with SKU `{CATEGORY}-{NNN}`, price $1.99 - $19.99, stock 0 - 150
//! - Customers `cliente{N}@external.com`
//! - Orders spread over the last 30 days. Roughly one in eight is cancelled
//!   and the rest are advanced through preparation, shipping and completion.

use chrono::{Duration, Utc};
use mercado_core::{
    Category, NewCustomer, NewOrder, NewOrderItem, NewProduct, OrderStatus, OrderUpdate,
    PaymentMethod, PaymentStatus, Product, ProductStatus,
};
use mercado_db::{Database, DbConfig, DbError};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Catalog categories with their product names
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "BEB",
        "Bebidas",
        &[
            "Agua Mineral",
            "Refresco de Cola",
            "Jugo de Naranja",
            "Jugo de Manzana",
            "Té Helado",
            "Café Molido",
            "Bebida Energética",
            "Agua de Coco",
        ],
    ),
    (
        "BOT",
        "Botanas",
        &[
            "Papas Fritas",
            "Cacahuates",
            "Palomitas",
            "Galletas de Chocolate",
            "Galletas de Avena",
            "Totopos",
            "Chicharrones",
        ],
    ),
    (
        "LAC",
        "Lácteos",
        &[
            "Leche Entera",
            "Leche Deslactosada",
            "Yogur Natural",
            "Queso Fresco",
            "Queso Manchego",
            "Mantequilla",
            "Crema",
        ],
    ),
    (
        "ABA",
        "Abarrotes",
        &[
            "Arroz",
            "Frijol Negro",
            "Pasta Spaghetti",
            "Aceite de Cocina",
            "Azúcar",
            "Harina de Trigo",
            "Atún en Lata",
            "Salsa de Tomate",
        ],
    ),
    (
        "LIM",
        "Limpieza",
        &[
            "Detergente",
            "Jabón de Trastes",
            "Cloro",
            "Suavizante",
            "Limpiador Multiusos",
        ],
    ),
];

const CUSTOMER_NAMES: &[&str] = &[
    "Ana", "Luis", "María", "Carlos", "Sofía", "Jorge", "Lucía", "Diego", "Elena", "Pablo",
];

const PAYMENT_METHODS: &[PaymentMethod] = &[
    PaymentMethod::Card,
    PaymentMethod::Cash,
    PaymentMethod::BankTransfer,
    PaymentMethod::Paypal,
];

/// Days of order history to generate
const HISTORY_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut customer_count: usize = 25;
    let mut order_count: usize = 200;
    let mut db_path = String::from("./mercado.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--customers" => {
                if i + 1 < args.len() {
                    customer_count = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--orders" | "-o" => {
                if i + 1 < args.len() {
                    order_count = args[i + 1].parse().unwrap_or(200);
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
                println!("Mercado Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("      --customers <N>  Number of customers (default: 25)");
                println!("  -o, --orders <N>     Number of orders (default: 200)");
                println!("  -d, --db <PATH>      Database file path (default: ./mercado.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, customer_count, order_count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products, skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Catalog
    let mut products = Vec::new();
    for (category_idx, (code, name, product_names)) in CATEGORIES.iter().enumerate() {
        let category = db.catalog().create_category(name).await?;
        let brand = db.catalog().create_brand(&format!("{name} Selecto")).await?;

        for (product_idx, product_name) in product_names.iter().enumerate() {
            let product = generate_product(
                &category,
                &brand.id,
                code,
                product_name,
                category_idx * 100 + product_idx,
            );
            match db.products().insert(&product).await {
                Ok(product) => products.push(product),
                Err(e) => warn!(sku = %product.sku, error = %e, "Failed to insert product"),
            }
        }
    }
    info!(products = products.len(), "Catalog created");

    // Customers
    let mut customers = Vec::with_capacity(customer_count);
    for n in 1..=customer_count {
        let first = CUSTOMER_NAMES[n % CUSTOMER_NAMES.len()];
        let customer = db
            .customers()
            .create(&NewCustomer {
                email: format!("cliente{n}@external.com"),
                name: format!("{first} Cliente {n}"),
                phone: Some(format!("55{:08}", n * 7919 % 100_000_000)),
                address: Some(format!("Calle {} #{}", first, n * 3)),
            })
            .await?;
        customers.push(customer);
    }
    info!(customers = customers.len(), "Customers created");

    if products.is_empty() || customers.is_empty() {
        warn!("Nothing to order, skipping order history");
        return Ok(());
    }

    // Orders, oldest first so numbers stay chronological
    let now = Utc::now();
    let mut created = 0usize;
    let mut short = 0usize;
    for n in 0..order_count {
        let age = HISTORY_DAYS - 1 - (n as i64 * HISTORY_DAYS / order_count as i64);
        let placed_at = now - Duration::days(age) - Duration::minutes((n % 600) as i64);

        let customer = &customers[(n * 13) % customers.len()];
        let new_order = generate_order(&customer.id, &products, n);

        let detail = match db.orders().create_at(&new_order, placed_at).await {
            Ok(detail) => detail,
            Err(DbError::Domain(e)) => {
                short += 1;
                warn!(error = %e, "Order skipped");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        created += 1;

        advance_order(&db, &detail.order.id, n).await?;
    }

    let elapsed = start.elapsed();
    info!(created, skipped = short, ?elapsed, "Order history generated");

    let overview = db.dashboard().overview().await?;
    info!(
        orders = overview.total_orders,
        revenue_cents = overview.total_revenue_cents,
        inventory_value_cents = overview.inventory_value_cents,
        "Seed complete"
    );

    Ok(())
}

/// Generates a single product with deterministic data.
fn generate_product(
    category: &Category,
    brand_id: &str,
    code: &str,
    name: &str,
    seed: usize,
) -> NewProduct {
    // $1.99 - $19.99
    let price_cents = 199 + ((seed * 37) % 1801) as i64;

    // Every eleventh product starts out of stock
    let stock = if seed % 11 == 0 {
        0
    } else {
        ((seed * 53) % 151) as i64
    };

    NewProduct {
        sku: format!("{}-{:03}", code, seed),
        name: name.to_string(),
        description: Some(format!("{} - {}", name, category.name)),
        price_cents,
        stock,
        status: if seed % 17 == 16 {
            ProductStatus::Inactive
        } else {
            ProductStatus::Active
        },
        category_id: category.id.clone(),
        brand_id: brand_id.to_string(),
        seller_id: None,
    }
}

/// Builds an order of one to four lines at list price.
fn generate_order(customer_id: &str, products: &[Product], seed: usize) -> NewOrder {
    let lines = 1 + seed % 4;
    let items = (0..lines)
        .map(|line| {
            let product = &products[(seed * 7 + line * 5) % products.len()];
            NewOrderItem::new(product.id.clone(), 1 + ((seed + line) % 3) as i64, product.price_cents)
        })
        .collect::<Vec<_>>();

    let subtotal: i64 = items.iter().map(|i| i.quantity * i.unit_price_cents).sum();

    NewOrder::new(customer_id, items)
        .tax(subtotal * 16 / 100)
        .shipping(if subtotal >= 50_000 { 0 } else { 9_900 })
        .payment_method(PAYMENT_METHODS[seed % PAYMENT_METHODS.len()])
}

/// Moves a freshly created order along its lifecycle.
async fn advance_order(db: &Database, order_id: &str, seed: usize) -> Result<(), DbError> {
    if seed % 8 == 3 {
        db.orders().cancel(order_id).await?;
        return Ok(());
    }

    let steps: &[OrderStatus] = match seed % 4 {
        0 => &[],
        1 => &[OrderStatus::InPreparation],
        2 => &[OrderStatus::InPreparation, OrderStatus::Shipped],
        _ => &[
            OrderStatus::InPreparation,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ],
    };

    if !steps.is_empty() {
        db.orders()
            .update(order_id, &OrderUpdate::payment_status(PaymentStatus::Paid))
            .await?;
    }
    for status in steps {
        let mut update = OrderUpdate::status(*status);
        if *status == OrderStatus::Shipped {
            update.tracking_number = Some(format!("MX{:010}", seed * 104_729));
        }
        db.orders().update(order_id, &update).await?;
    }

    Ok(())
}
