//! Import of an Instacart-style CSV export into the catalog and order tables.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqliteConnection};
use thiserror::Error;
use tracing::info;

use crate::connection::DbPool;

pub const AISLES_FILE: &str = "aisles.csv";
pub const DEPARTMENTS_FILE: &str = "departments.csv";
pub const PRODUCTS_FILE: &str = "products.csv";
pub const ORDERS_FILE: &str = "orders.csv";
pub const ORDER_LINE_FILES: [&str; 2] = ["order_products__prior.csv", "order_products__train.csv"];

/// Child tables first so foreign keys never dangle mid-transaction.
const CLEAR_STATEMENTS: [&str; 7] = [
    "DELETE FROM feat_basket_affinity",
    "DELETE FROM feat_sku_velocity",
    "DELETE FROM order_products",
    "DELETE FROM orders",
    "DELETE FROM products",
    "DELETE FROM aisles",
    "DELETE FROM departments",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing import file: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub departments: u64,
    pub aisles: u64,
    pub products: u64,
    pub orders: u64,
    pub order_lines: u64,
}

trait ImportRow: DeserializeOwned {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>>;
}

#[derive(Debug, Deserialize)]
struct DepartmentRow {
    department_id: i64,
    department: String,
}

impl ImportRow for DepartmentRow {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>> {
        sqlx::query("INSERT INTO departments (department_id, department) VALUES (?, ?)")
            .bind(self.department_id)
            .bind(self.department)
    }
}

#[derive(Debug, Deserialize)]
struct AisleRow {
    aisle_id: i64,
    aisle: String,
}

impl ImportRow for AisleRow {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>> {
        sqlx::query("INSERT INTO aisles (aisle_id, aisle) VALUES (?, ?)")
            .bind(self.aisle_id)
            .bind(self.aisle)
    }
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    product_id: i64,
    product_name: String,
    aisle_id: i64,
    department_id: i64,
}

impl ImportRow for ProductRow {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>> {
        sqlx::query(
            "INSERT INTO products (product_id, product_name, aisle_id, department_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(self.product_id)
        .bind(self.product_name)
        .bind(self.aisle_id)
        .bind(self.department_id)
    }
}

/// `eval_set` and other extra columns are ignored. A customer's first order has
/// no `days_since_prior_order`.
#[derive(Debug, Deserialize)]
struct OrderRow {
    order_id: i64,
    user_id: i64,
    order_number: i64,
    order_dow: Option<i64>,
    order_hour_of_day: Option<i64>,
    days_since_prior_order: Option<f64>,
}

impl ImportRow for OrderRow {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>> {
        sqlx::query(
            "INSERT INTO orders
                 (order_id, user_id, order_number, order_dow, order_hour_of_day, days_since_prior_order)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.order_id)
        .bind(self.user_id)
        .bind(self.order_number)
        .bind(self.order_dow)
        .bind(self.order_hour_of_day)
        .bind(self.days_since_prior_order)
    }
}

#[derive(Debug, Deserialize)]
struct OrderLineRow {
    order_id: i64,
    product_id: i64,
    add_to_cart_order: i64,
    reordered: i64,
}

impl ImportRow for OrderLineRow {
    fn insert(self) -> Query<'static, Sqlite, SqliteArguments<'static>> {
        sqlx::query(
            "INSERT INTO order_products (order_id, product_id, add_to_cart_order, reordered)
             VALUES (?, ?, ?, ?)",
        )
        .bind(self.order_id)
        .bind(self.product_id)
        .bind(self.add_to_cart_order)
        .bind(self.reordered)
    }
}

/// Replaces catalog, orders and features with the export in `dir`, in one
/// transaction. Feature tables are left empty; rebuild them afterwards.
/// Any missing file, unreadable row or constraint failure leaves the database untouched.
pub async fn import_instacart(pool: &DbPool, dir: &Path) -> Result<IngestReport, IngestError> {
    let path = |name: &str| dir.join(name);
    let mut required = vec![path(DEPARTMENTS_FILE), path(AISLES_FILE), path(PRODUCTS_FILE), path(ORDERS_FILE)];
    for name in ORDER_LINE_FILES {
        required.push(path(name));
    }
    if let Some(missing) = required.iter().find(|file| !file.is_file()) {
        return Err(IngestError::MissingFile(missing.clone()));
    }

    let mut tx = pool.begin().await?;
    for statement in CLEAR_STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let mut report = IngestReport {
        departments: load_csv::<DepartmentRow>(&mut tx, &path(DEPARTMENTS_FILE)).await?,
        aisles: load_csv::<AisleRow>(&mut tx, &path(AISLES_FILE)).await?,
        products: load_csv::<ProductRow>(&mut tx, &path(PRODUCTS_FILE)).await?,
        orders: load_csv::<OrderRow>(&mut tx, &path(ORDERS_FILE)).await?,
        order_lines: 0,
    };
    for name in ORDER_LINE_FILES {
        report.order_lines += load_csv::<OrderLineRow>(&mut tx, &path(name)).await?;
    }

    tx.commit().await?;
    info!(
        event_name = "catalog.import.completed",
        directory = %dir.display(),
        products = report.products,
        orders = report.orders,
        order_lines = report.order_lines,
        "instacart export imported"
    );
    Ok(report)
}

async fn load_csv<R: ImportRow>(conn: &mut SqliteConnection, path: &Path) -> Result<u64, IngestError> {
    let mut reader = open_reader(path)?;
    let mut loaded = 0;
    for record in reader.deserialize::<R>() {
        let row = record.map_err(|source| csv_error(path, source))?;
        row.insert().execute(&mut *conn).await?;
        loaded += 1;
    }

    info!(event_name = "catalog.import.file_loaded", file = %path.display(), rows = loaded, "csv file loaded");
    Ok(loaded)
}

/// Header names are matched after trimming and lower-casing.
fn open_reader(path: &Path) -> Result<Reader<File>, IngestError> {
    let mut reader =
        ReaderBuilder::new().trim(Trim::All).from_path(path).map_err(|source| csv_error(path, source))?;
    let headers: StringRecord = reader
        .headers()
        .map_err(|source| csv_error(path, source))?
        .iter()
        .map(str::to_lowercase)
        .collect();
    reader.set_headers(headers);
    Ok(reader)
}

fn csv_error(path: &Path, source: csv::Error) -> IngestError {
    IngestError::Csv { path: path.to_path_buf(), source }
}
