use checkout_engine::{
    db_types::{MicroUsdc, NewOrder, OrderItem},
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

/// A fresh, migrated database in a temporary file. [`tear_down`] deletes it.
pub async fn prepare_store() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let path = tempfile::Builder::new()
        .prefix("checkout_test_")
        .suffix(".db")
        .tempfile()
        .expect("Error creating temporary database file")
        .into_temp_path()
        .keep()
        .expect("Error keeping temporary database file");
    let url = format!("sqlite://{}", path.display());
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to database");
    db.run_migrations().await.expect("Error running migrations");
    debug!("🗃️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        warn!("🗃️ Could not drop test database {}: {e}", db.url());
    }
}

pub fn new_order(customer: &str, usdc: f64) -> NewOrder {
    let item = OrderItem {
        product_id: "prod-1".into(),
        name: "Widget".into(),
        price_usdc: MicroUsdc::from_usdc_f64(usdc).unwrap(),
        quantity: 1,
    };
    NewOrder::new(customer.into(), Some(format!("{}@example.com", customer.to_lowercase())), vec![item]).unwrap()
}
