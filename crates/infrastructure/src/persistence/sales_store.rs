//! SQLite sales aggregation store
//!
//! Revenue is `quantity * price_with_tax` of the inventory snapshot matching
//! each sale's product and date. Pharmacy and product filters are pushed into
//! the query; product pages use keyset pagination on the product code, while
//! top-product lists are ranked by revenue.

use application::ports::{AggregationPayload, SalesAggregationPort, StorageError};
use async_trait::async_trait;
use domain::{
    DetailLevel, NormalizedParams, PharmacyId, PharmacyTotals, ProductCode, ProductTotals,
    SalesTotals,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

use super::error::map_sqlx_error;

const SALES_JOINS: &str = "
    FROM data_sales s
    JOIN data_inventorysnapshot inv ON s.product_id = inv.id AND s.date = inv.date
    JOIN data_internalproduct ip ON inv.product_id = ip.id
    JOIN data_pharmacy p ON ip.pharmacy_id = p.id";

const REVENUE: &str = "CAST(COALESCE(SUM(s.quantity * inv.price_with_tax), 0) AS REAL)";

/// Sales store over the pharmacy data schema
#[derive(Debug, Clone)]
pub struct SqliteSalesStore {
    pool: SqlitePool,
}

impl SqliteSalesStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append the date window and list filters shared by every aggregation
    fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, params: &NormalizedParams) {
        query
            .push(" WHERE s.date >= ")
            .push_bind(params.start_date())
            .push(" AND s.date <= ")
            .push_bind(params.end_date());

        if !params.pharmacy_ids().is_empty() {
            query.push(" AND p.id IN (");
            let mut ids = query.separated(", ");
            for id in params.pharmacy_ids() {
                ids.push_bind(id.to_string());
            }
            ids.push_unseparated(")");
        }

        if !params.product_codes().is_empty() {
            query.push(" AND gp.code_13_ref IN (");
            let mut codes = query.separated(", ");
            for code in params.product_codes() {
                codes.push_bind(code.as_str().to_string());
            }
            codes.push_unseparated(")");
        }
    }

    async fn summary(&self, params: &NormalizedParams) -> Result<SalesTotals, StorageError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {REVENUE} AS revenue,
                COUNT(DISTINCT p.id) AS pharmacy_count,
                COUNT(DISTINCT ip.id) AS product_count,
                COUNT(s.id) AS transaction_count
             {SALES_JOINS}
             LEFT JOIN data_globalproduct gp ON ip.code_13_ref_id = gp.code_13_ref"
        ));
        Self::push_filters(&mut query, params);

        let row: SummaryRow = query
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(SalesTotals {
            revenue: row.revenue,
            pharmacy_count: non_negative(row.pharmacy_count),
            product_count: non_negative(row.product_count),
            transaction_count: non_negative(row.transaction_count),
        })
    }

    async fn pharmacies(
        &self,
        params: &NormalizedParams,
    ) -> Result<Vec<PharmacyTotals>, StorageError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT p.id AS pharmacy_id, p.name AS name, p.area AS area,
                {REVENUE} AS revenue,
                COUNT(s.id) AS transaction_count
             {SALES_JOINS}
             LEFT JOIN data_globalproduct gp ON ip.code_13_ref_id = gp.code_13_ref"
        ));
        Self::push_filters(&mut query, params);
        query.push(" GROUP BY p.id, p.name, p.area ORDER BY revenue DESC");

        let rows: Vec<PharmacyRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(PharmacyRow::into_totals).collect()
    }

    /// Per-product totals in the window, before ordering
    fn product_query(params: &NormalizedParams) -> QueryBuilder<'static, Sqlite> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT gp.code_13_ref AS code, gp.name AS name, gp.category AS category,
                {REVENUE} AS revenue,
                CAST(COALESCE(SUM(s.quantity), 0) AS INTEGER) AS quantity,
                CAST(COALESCE(AVG(inv.price_with_tax), 0) AS REAL) AS average_price
             {SALES_JOINS}
             JOIN data_globalproduct gp ON ip.code_13_ref_id = gp.code_13_ref"
        ));
        Self::push_filters(&mut query, params);
        query
    }

    async fn fetch_products(
        &self,
        mut query: QueryBuilder<'_, Sqlite>,
    ) -> Result<Vec<ProductTotals>, StorageError> {
        let rows: Vec<ProductRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(ProductRow::into_totals).collect()
    }

    /// One page of products with codes above the cursor, plus one look-ahead row
    async fn products(&self, params: &NormalizedParams) -> Result<Vec<ProductTotals>, StorageError> {
        let mut query = Self::product_query(params);
        if let Some(cursor) = params.cursor() {
            query
                .push(" AND gp.code_13_ref > ")
                .push_bind(cursor.as_str().to_string());
        }
        query
            .push(" GROUP BY gp.code_13_ref, gp.name, gp.category ORDER BY gp.code_13_ref ASC LIMIT ")
            .push_bind(i64::from(params.limit()) + 1);

        self.fetch_products(query).await
    }

    /// Highest revenue products first, ignoring any cursor
    async fn best_sellers(
        &self,
        params: &NormalizedParams,
        limit: u32,
    ) -> Result<Vec<ProductTotals>, StorageError> {
        let mut query = Self::product_query(params);
        query
            .push(
                " GROUP BY gp.code_13_ref, gp.name, gp.category \
                 ORDER BY revenue DESC, gp.code_13_ref ASC LIMIT ",
            )
            .push_bind(i64::from(limit));

        self.fetch_products(query).await
    }
}

fn non_negative(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    revenue: f64,
    pharmacy_count: i64,
    product_count: i64,
    transaction_count: i64,
}

#[derive(sqlx::FromRow)]
struct PharmacyRow {
    pharmacy_id: String,
    name: Option<String>,
    area: Option<String>,
    revenue: f64,
    transaction_count: i64,
}

impl PharmacyRow {
    fn into_totals(self) -> Result<PharmacyTotals, StorageError> {
        let pharmacy_id = PharmacyId::parse(&self.pharmacy_id)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(PharmacyTotals {
            pharmacy_id,
            name: self.name,
            area: self.area,
            revenue: self.revenue,
            transaction_count: non_negative(self.transaction_count),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    code: String,
    name: Option<String>,
    category: Option<String>,
    revenue: f64,
    quantity: i64,
    average_price: f64,
}

impl ProductRow {
    fn into_totals(self) -> Result<ProductTotals, StorageError> {
        let code =
            ProductCode::new(self.code).map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(ProductTotals {
            code,
            name: self.name,
            category: self.category,
            revenue: self.revenue,
            quantity: self.quantity,
            average_price: self.average_price,
        })
    }
}

#[async_trait]
impl SalesAggregationPort for SqliteSalesStore {
    #[instrument(skip(self, params), fields(start = %params.start_date(), end = %params.end_date()))]
    async fn run_aggregation(
        &self,
        params: &NormalizedParams,
        level: DetailLevel,
    ) -> Result<AggregationPayload, StorageError> {
        let payload = match level {
            DetailLevel::Summary | DetailLevel::Full => {
                AggregationPayload::Summary(self.summary(params).await?)
            },
            DetailLevel::Pharmacy => AggregationPayload::Pharmacies(self.pharmacies(params).await?),
            DetailLevel::Product => AggregationPayload::Products(self.products(params).await?),
        };
        debug!(level = %level, "Aggregation query finished");
        Ok(payload)
    }

    #[instrument(skip(self, params), fields(start = %params.start_date(), end = %params.end_date()))]
    async fn top_products(
        &self,
        params: &NormalizedParams,
        limit: u32,
    ) -> Result<Vec<ProductTotals>, StorageError> {
        let rows = self.best_sellers(params, limit).await?;
        debug!(rows = rows.len(), "Top products query finished");
        Ok(rows)
    }
}
