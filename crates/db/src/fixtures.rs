use serde::Serialize;
use tracing::info;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Product row of the demo grocery catalog, velocity features included.
#[derive(Clone, Copy, Debug)]
pub struct DemoProduct {
    pub product_id: i64,
    pub product_name: &'static str,
    pub aisle_id: i64,
    pub department_id: i64,
    pub total_units: i64,
    pub total_orders: i64,
    pub reorder_rate: f64,
}

const fn product(
    product_id: i64,
    product_name: &'static str,
    aisle_id: i64,
    department_id: i64,
    total_units: i64,
    reorder_rate: f64,
) -> DemoProduct {
    DemoProduct {
        product_id,
        product_name,
        aisle_id,
        department_id,
        total_units,
        total_orders: total_units,
        reorder_rate,
    }
}

pub const DEMO_DEPARTMENTS: &[(i64, &str)] =
    &[(3, "bakery"), (4, "produce"), (7, "beverages"), (16, "dairy eggs"), (19, "snacks")];

pub const DEMO_AISLES: &[(i64, &str)] = &[
    (16, "fresh herbs"),
    (24, "fresh fruits"),
    (83, "fresh vegetables"),
    (84, "milk"),
    (86, "eggs"),
    (107, "chips pretzels"),
    (112, "bread"),
    (115, "water seltzer sparkling water"),
    (120, "yogurt"),
    (123, "packaged vegetables fruits"),
];

pub const DEMO_PRODUCTS: &[DemoProduct] = &[
    product(24852, "Banana", 24, 4, 472_565, 0.843),
    product(13176, "Bag of Organic Bananas", 24, 4, 379_450, 0.833),
    product(21137, "Organic Strawberries", 24, 4, 264_683, 0.778),
    product(21903, "Organic Baby Spinach", 123, 4, 241_921, 0.773),
    product(47209, "Organic Hass Avocado", 24, 4, 213_584, 0.796),
    product(47626, "Large Lemon", 24, 4, 152_657, 0.696),
    product(26209, "Limes", 24, 4, 140_627, 0.681),
    product(27845, "Organic Whole Milk", 84, 16, 137_905, 0.830),
    product(22935, "Organic Yellow Onion", 83, 4, 113_426, 0.706),
    product(24964, "Organic Garlic", 83, 4, 109_778, 0.698),
    product(39275, "Organic Blueberries", 123, 4, 100_060, 0.727),
    product(49683, "Cucumber Kirby", 83, 4, 97_315, 0.695),
    product(28204, "Organic Fuji Apple", 24, 4, 89_632, 0.714),
    product(40706, "Organic Grape Tomatoes", 123, 4, 84_255, 0.667),
    product(44632, "Sparkling Water Grapefruit", 115, 7, 75_886, 0.830),
    product(31717, "Organic Cilantro", 16, 4, 64_230, 0.589),
    product(5450, "Small Hass Avocado", 24, 4, 58_000, 0.570),
    product(8518, "Organic Red Onion", 83, 4, 53_000, 0.660),
    product(19660, "Large Grade AA Eggs", 86, 16, 52_000, 0.740),
    product(5077, "100% Whole Wheat Bread", 112, 3, 51_225, 0.733),
    product(33000, "Plain Greek Yogurt", 120, 16, 36_000, 0.710),
    product(1940, "Organic 2% Reduced Fat Milk", 84, 16, 35_663, 0.790),
    product(21709, "Sea Salt Tortilla Chips", 107, 19, 28_000, 0.520),
    product(9076, "Blueberry Greek Yogurt", 120, 16, 22_000, 0.650),
];

/// Co-purchase counts between demo products, in either order.
pub const DEMO_AFFINITIES: &[(i64, i64, i64)] = &[
    (24852, 13176, 41_000),
    (24852, 21137, 31_000),
    (24852, 21903, 26_000),
    (24852, 47209, 24_000),
    (24852, 27845, 22_000),
    (24852, 26209, 15_000),
    (24852, 39275, 14_000),
    (24852, 28204, 12_000),
    (24852, 47626, 11_500),
    (24852, 1940, 9_000),
    (24852, 49683, 8_700),
    (24852, 22935, 7_900),
    (24852, 33000, 7_000),
    (24852, 5077, 6_000),
    (47209, 13176, 19_000),
    (47209, 26209, 16_500),
    (47209, 31717, 12_000),
    (47209, 22935, 10_500),
    (47209, 47626, 9_800),
    (47209, 8518, 7_600),
    (47209, 40706, 6_900),
    (47209, 24964, 6_500),
    (47209, 21709, 4_200),
    (47209, 5450, 3_900),
    (47626, 26209, 8_000),
    (47626, 24964, 5_200),
    (33000, 21137, 6_100),
    (33000, 39275, 5_200),
    (33000, 13176, 4_800),
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub departments: usize,
    pub aisles: usize,
    pub products: usize,
    pub affinity_pairs: usize,
}

/// Affinity rows are stored with the smaller id first.
pub fn ordered_pair(left: i64, right: i64) -> (i64, i64) {
    if left < right {
        (left, right)
    } else {
        (right, left)
    }
}

/// Loads the demo grocery catalog. Re-running overwrites the same rows.
pub async fn seed_demo_catalog(pool: &DbPool) -> Result<SeedReport, RepositoryError> {
    let mut tx = pool.begin().await?;

    for (department_id, department) in DEMO_DEPARTMENTS {
        sqlx::query(
            "INSERT INTO departments (department_id, department) VALUES (?, ?)
             ON CONFLICT(department_id) DO UPDATE SET department = excluded.department",
        )
        .bind(*department_id)
        .bind(*department)
        .execute(&mut *tx)
        .await?;
    }

    for (aisle_id, aisle) in DEMO_AISLES {
        sqlx::query(
            "INSERT INTO aisles (aisle_id, aisle) VALUES (?, ?)
             ON CONFLICT(aisle_id) DO UPDATE SET aisle = excluded.aisle",
        )
        .bind(*aisle_id)
        .bind(*aisle)
        .execute(&mut *tx)
        .await?;
    }

    for product in DEMO_PRODUCTS {
        sqlx::query(
            "INSERT INTO products (product_id, product_name, aisle_id, department_id)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                 product_name = excluded.product_name,
                 aisle_id = excluded.aisle_id,
                 department_id = excluded.department_id",
        )
        .bind(product.product_id)
        .bind(product.product_name)
        .bind(product.aisle_id)
        .bind(product.department_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO feat_sku_velocity (product_id, total_units, total_orders, reorder_rate)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                 total_units = excluded.total_units,
                 total_orders = excluded.total_orders,
                 reorder_rate = excluded.reorder_rate",
        )
        .bind(product.product_id)
        .bind(product.total_units)
        .bind(product.total_orders)
        .bind(product.reorder_rate)
        .execute(&mut *tx)
        .await?;
    }

    for (left, right, count) in DEMO_AFFINITIES {
        let (product_id_a, product_id_b) = ordered_pair(*left, *right);
        sqlx::query(
            "INSERT INTO feat_basket_affinity (product_id_a, product_id_b, co_purchase_count)
             VALUES (?, ?, ?)
             ON CONFLICT(product_id_a, product_id_b) DO UPDATE SET
                 co_purchase_count = excluded.co_purchase_count",
        )
        .bind(product_id_a)
        .bind(product_id_b)
        .bind(*count)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let report = SeedReport {
        departments: DEMO_DEPARTMENTS.len(),
        aisles: DEMO_AISLES.len(),
        products: DEMO_PRODUCTS.len(),
        affinity_pairs: DEMO_AFFINITIES.len(),
    };
    info!(
        event_name = "catalog.seed.completed",
        products = report.products,
        affinity_pairs = report.affinity_pairs,
        "demo catalog seeded"
    );
    Ok(report)
}
