//! Database service for commerce-service.
//!
//! Every mutating operation runs inside a transaction and locks the parent
//! document row first, so concurrent ledger mutations against the same
//! document serialize and derived totals never observe a torn line set.

use crate::domain::{convert, lifecycle, pricing, totals, weight};
use crate::models::{
    AttachLineItem, CreateDocument, CreateProduct, CreateTaxRate, Document, DocumentKind,
    DocumentStatus, LineItem, ListDocumentsFilter, Product, TaxRate, TransitionDocument,
    UpdateDocument, UpdateLineItem,
};
use crate::services::metrics::{
    CONVERSIONS_TOTAL, DB_QUERY_DURATION, DOCUMENTS_TOTAL, INVOICED_AMOUNT_TOTAL,
    TRANSITIONS_TOTAL,
};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Parse the stored kind, treating an unknown value as data corruption.
fn parse_kind(document: &Document) -> Result<DocumentKind, AppError> {
    document.parsed_kind().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Document {} has unknown kind '{}'",
            document.document_id,
            document.kind
        ))
    })
}

/// Parse the stored status, treating an unknown value as data corruption.
fn parse_status(document: &Document) -> Result<DocumentStatus, AppError> {
    document.parsed_status().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Document {} has unknown status '{}'",
            document.document_id,
            document.status
        ))
    })
}

/// Check that the document's status still allows ledger and header mutation.
fn ensure_ledger_open(document: &Document) -> Result<(DocumentKind, DocumentStatus), AppError> {
    let kind = parse_kind(document)?;
    let status = parse_status(document)?;
    if !lifecycle::is_ledger_open(kind, status) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Line items on a {} cannot be modified in status '{}'",
            kind,
            status
        )));
    }
    Ok((kind, status))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "commerce-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tax Rate Operations
    // -------------------------------------------------------------------------

    /// Create a new tax rate.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn create_tax_rate(&self, input: &CreateTaxRate) -> Result<TaxRate, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_tax_rate"])
            .start_timer();

        if input.rate < Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Tax rate must not be negative"
            )));
        }

        let tax_rate_id = Uuid::new_v4();
        let tax_rate = sqlx::query_as::<_, TaxRate>(
            r#"
            INSERT INTO tax_rates (tax_rate_id, tenant_id, name, rate, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING tax_rate_id, tenant_id, name, rate, active, created_utc
            "#,
        )
        .bind(tax_rate_id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(input.rate)
        .bind(true)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Tax rate '{}' already exists", input.name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create tax rate: {}", e)),
        })?;

        timer.observe_duration();

        info!(tax_rate_id = %tax_rate.tax_rate_id, name = %tax_rate.name, "Tax rate created");

        Ok(tax_rate)
    }

    /// Get a tax rate by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, tax_rate_id = %tax_rate_id))]
    pub async fn get_tax_rate(
        &self,
        tenant_id: Uuid,
        tax_rate_id: Uuid,
    ) -> Result<Option<TaxRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_tax_rate"])
            .start_timer();

        let tax_rate = sqlx::query_as::<_, TaxRate>(
            r#"
            SELECT tax_rate_id, tenant_id, name, rate, active, created_utc
            FROM tax_rates
            WHERE tenant_id = $1 AND tax_rate_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(tax_rate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get tax rate: {}", e)))?;

        timer.observe_duration();

        Ok(tax_rate)
    }

    /// List tax rates for a tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_tax_rates(
        &self,
        tenant_id: Uuid,
        active_only: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<TaxRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tax_rates"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let tax_rates = if let Some(cursor) = page_token {
            sqlx::query_as::<_, TaxRate>(
                r#"
                SELECT tax_rate_id, tenant_id, name, rate, active, created_utc
                FROM tax_rates
                WHERE tenant_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                  AND tax_rate_id > $3
                ORDER BY tax_rate_id
                LIMIT $4
                "#,
            )
            .bind(tenant_id)
            .bind(active_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, TaxRate>(
                r#"
                SELECT tax_rate_id, tenant_id, name, rate, active, created_utc
                FROM tax_rates
                WHERE tenant_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                ORDER BY tax_rate_id
                LIMIT $3
                "#,
            )
            .bind(tenant_id)
            .bind(active_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list tax rates: {}", e)))?;

        timer.observe_duration();

        Ok(tax_rates)
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a new product.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        if input.sku.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!("SKU is required")));
        }
        if input.price < Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Product price must not be negative"
            )));
        }
        if input.weight.is_some_and(|w| w < Decimal::ZERO) {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Product weight must not be negative"
            )));
        }

        let product_id = Uuid::new_v4();
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, tenant_id, sku, name, price, weight, tax_rate_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING product_id, tenant_id, sku, name, price, weight, tax_rate_id, active, created_utc
            "#,
        )
        .bind(product_id)
        .bind(input.tenant_id)
        .bind(&input.sku)
        .bind(&input.name)
        .bind(input.price)
        .bind(input.weight)
        .bind(input.tax_rate_id)
        .bind(true)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Product SKU '{}' already exists", input.sku))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)),
        })?;

        timer.observe_duration();

        info!(product_id = %product.product_id, sku = %product.sku, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, tenant_id, sku, name, price, weight, tax_rate_id, active, created_utc
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products for a tenant.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn list_products(
        &self,
        tenant_id: Uuid,
        active_only: bool,
        page_size: i32,
        page_token: Option<Uuid>,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = page_size.clamp(1, 100) as i64;

        let products = if let Some(cursor) = page_token {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, tenant_id, sku, name, price, weight, tax_rate_id, active, created_utc
                FROM products
                WHERE tenant_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                  AND product_id > $3
                ORDER BY product_id
                LIMIT $4
                "#,
            )
            .bind(tenant_id)
            .bind(active_only)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Product>(
                r#"
                SELECT product_id, tenant_id, sku, name, price, weight, tax_rate_id, active, created_utc
                FROM products
                WHERE tenant_id = $1
                  AND ($2::bool = FALSE OR active = TRUE)
                ORDER BY product_id
                LIMIT $3
                "#,
            )
            .bind(tenant_id)
            .bind(active_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    // -------------------------------------------------------------------------
    // Document Operations
    // -------------------------------------------------------------------------

    /// Create a new document in its kind's initial status.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, kind = %input.kind))]
    pub async fn create_document(&self, input: &CreateDocument) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_document"])
            .start_timer();

        if input.account_id.is_nil() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "A document requires an account"
            )));
        }
        if input.currency.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Currency is required"
            )));
        }
        if input.discount_value < Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Discount value must not be negative"
            )));
        }
        if input.shipping_amount < Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Shipping amount must not be negative"
            )));
        }

        let document_id = Uuid::new_v4();
        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (
                document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, currency, issue_date, due_date,
                delivery_date, return_date, discount_type, discount_value, tax_rate_id,
                shipping_amount, tracking_number, carrier, notes, metadata
            )
            VALUES ($1, $2, $3, next_document_number($2, $3, $4), $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(document_id)
        .bind(input.tenant_id)
        .bind(input.kind.as_str())
        .bind(input.kind.number_prefix())
        .bind(input.kind.initial_status().as_str())
        .bind(input.assignee_id)
        .bind(input.account_id)
        .bind(input.billing_contact_id)
        .bind(input.shipping_contact_id)
        .bind(&input.currency)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.delivery_date)
        .bind(input.return_date)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(input.tax_rate_id)
        .bind(input.shipping_amount)
        .bind(&input.tracking_number)
        .bind(&input.carrier)
        .bind(&input.notes)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create document: {}", e)))?;

        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&[input.kind.as_str()])
            .inc();

        info!(
            document_id = %document.document_id,
            number = %document.number,
            "Document created"
        );

        Ok(document)
    }

    /// Get a document by ID.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn get_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_document"])
            .start_timer();

        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            FROM documents
            WHERE tenant_id = $1 AND document_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get document: {}", e)))?;

        timer.observe_duration();

        Ok(document)
    }

    /// List documents for a tenant.
    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id))]
    pub async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &ListDocumentsFilter,
    ) -> Result<Vec<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_documents"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let kind_str = filter.kind.map(|k| k.as_str().to_string());
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let documents = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Document>(
                r#"
                SELECT document_id, tenant_id, kind, number, status, assignee_id, account_id,
                    billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                    due_date, delivery_date, return_date, discount_type, discount_value,
                    discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                    total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                    notes, metadata, created_utc, updated_utc
                FROM documents
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR kind = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR account_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                  AND document_id > $7
                ORDER BY document_id
                LIMIT $8
                "#,
            )
            .bind(tenant_id)
            .bind(&kind_str)
            .bind(&status_str)
            .bind(filter.account_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Document>(
                r#"
                SELECT document_id, tenant_id, kind, number, status, assignee_id, account_id,
                    billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                    due_date, delivery_date, return_date, discount_type, discount_value,
                    discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                    total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                    notes, metadata, created_utc, updated_utc
                FROM documents
                WHERE tenant_id = $1
                  AND ($2::varchar IS NULL OR kind = $2)
                  AND ($3::varchar IS NULL OR status = $3)
                  AND ($4::uuid IS NULL OR account_id = $4)
                  AND ($5::date IS NULL OR issue_date >= $5)
                  AND ($6::date IS NULL OR issue_date <= $6)
                ORDER BY document_id
                LIMIT $7
                "#,
            )
            .bind(tenant_id)
            .bind(&kind_str)
            .bind(&status_str)
            .bind(filter.account_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list documents: {}", e)))?;

        timer.observe_duration();

        Ok(documents)
    }

    /// Update a document header while its status allows it, then refresh
    /// derived totals in the same transaction.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn update_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &UpdateDocument,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_document"])
            .start_timer();

        if input.discount_value.is_some_and(|v| v < Decimal::ZERO) {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Discount value must not be negative"
            )));
        }
        if input.shipping_amount.is_some_and(|v| v < Decimal::ZERO) {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Shipping amount must not be negative"
            )));
        }

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };
        ensure_ledger_open(&document)?;

        let discount_type_str = input.discount_type.map(|d| d.as_str().to_string());

        let updated = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET assignee_id = COALESCE($3, assignee_id),
                billing_contact_id = COALESCE($4, billing_contact_id),
                shipping_contact_id = COALESCE($5, shipping_contact_id),
                currency = COALESCE($6, currency),
                issue_date = COALESCE($7, issue_date),
                due_date = COALESCE($8, due_date),
                delivery_date = COALESCE($9, delivery_date),
                return_date = COALESCE($10, return_date),
                discount_type = COALESCE($11, discount_type),
                discount_value = COALESCE($12, discount_value),
                tax_rate_id = COALESCE($13, tax_rate_id),
                shipping_amount = COALESCE($14, shipping_amount),
                tracking_number = COALESCE($15, tracking_number),
                carrier = COALESCE($16, carrier),
                notes = COALESCE($17, notes),
                metadata = COALESCE($18, metadata),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND document_id = $2
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(input.assignee_id)
        .bind(input.billing_contact_id)
        .bind(input.shipping_contact_id)
        .bind(&input.currency)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.delivery_date)
        .bind(input.return_date)
        .bind(&discount_type_str)
        .bind(input.discount_value)
        .bind(input.tax_rate_id)
        .bind(input.shipping_amount)
        .bind(&input.tracking_number)
        .bind(&input.carrier)
        .bind(&input.notes)
        .bind(&input.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update document: {}", e)))?;

        let refreshed = self.refresh_derived_fields(&mut tx, &updated).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        info!(document_id = %refreshed.document_id, "Document updated");

        Ok(Some(refreshed))
    }

    /// Delete a document. Refused while any successor references it.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn delete_document(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_document"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        if self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
            .is_none()
        {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let has_successors: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM documents
                WHERE tenant_id = $1 AND predecessor_id = $2
            )
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check successors: {}", e)))?;

        if has_successors {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Document is referenced by successor documents and cannot be deleted"
            )));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE tenant_id = $1 AND document_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete document: {}", e)))?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(document_id = %document_id, "Document deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Line Item Operations
    // -------------------------------------------------------------------------

    /// Attach a line item to a document, snapshotting the product's price,
    /// name, and weight, and refresh the document's derived fields.
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, document_id = %input.document_id))]
    pub async fn attach_line_item(&self, input: &AttachLineItem) -> Result<LineItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["attach_line_item"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = self
            .document_for_update(&mut tx, input.tenant_id, input.document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;
        let (kind, _) = ensure_ledger_open(&document)?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, tenant_id, sku, name, price, weight, tax_rate_id, active, created_utc
            FROM products
            WHERE tenant_id = $1 AND product_id = $2
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        if !product.active {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Product '{}' is inactive",
                product.sku
            )));
        }

        let unit_price = input.unit_price.unwrap_or(product.price);
        let amounts = pricing::line_amounts(
            input.quantity,
            unit_price,
            input.discount_type,
            input.discount_value,
        )?;

        // Weight snapshots only matter on logistics documents.
        let unit_weight = if kind == DocumentKind::DeliveryOrder {
            product.weight
        } else {
            None
        };
        let total_weight = weight::line_total_weight(input.quantity, unit_weight);

        let line_item_id = Uuid::new_v4();
        let line_item = sqlx::query_as::<_, LineItem>(
            r#"
            INSERT INTO line_items (
                line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM line_items
                 WHERE tenant_id = $3 AND document_id = $2))
            RETURNING line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order, created_utc
            "#,
        )
        .bind(line_item_id)
        .bind(input.document_id)
        .bind(input.tenant_id)
        .bind(input.product_id)
        .bind(&product.name)
        .bind(input.quantity)
        .bind(unit_price)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(amounts.discount_amount)
        .bind(amounts.total_price)
        .bind(unit_weight)
        .bind(total_weight)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to attach line item: {}", e)))?;

        self.refresh_derived_fields(&mut tx, &document).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        info!(line_item_id = %line_item.line_item_id, "Line item attached");

        Ok(line_item)
    }

    /// Get line items for a document in insertion order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn list_line_items(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order, created_utc
            FROM line_items
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    /// Update a line item and refresh the document's derived fields.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn update_line_item(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
        input: &UpdateLineItem,
    ) -> Result<Option<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_line_item"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };
        ensure_ledger_open(&document)?;

        let existing = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order, created_utc
            FROM line_items
            WHERE tenant_id = $1 AND document_id = $2 AND line_item_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(line_item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line item: {}", e)))?;

        let existing = match existing {
            Some(line) => line,
            None => return Ok(None),
        };

        let quantity = input.quantity.unwrap_or(existing.quantity);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let discount_type = match input.discount_type {
            Some(discount_type) => discount_type,
            None => existing.parsed_discount_type().ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Line item {} has unknown discount type '{}'",
                    existing.line_item_id,
                    existing.discount_type
                ))
            })?,
        };
        let discount_value = input.discount_value.unwrap_or(existing.discount_value);

        let amounts = pricing::line_amounts(quantity, unit_price, discount_type, discount_value)?;
        let total_weight = weight::line_total_weight(quantity, existing.unit_weight);

        let line_item = sqlx::query_as::<_, LineItem>(
            r#"
            UPDATE line_items
            SET description = COALESCE($4, description),
                quantity = $5,
                unit_price = $6,
                discount_type = $7,
                discount_value = $8,
                discount_amount = $9,
                total_price = $10,
                total_weight = $11
            WHERE tenant_id = $1 AND document_id = $2 AND line_item_id = $3
            RETURNING line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(line_item_id)
        .bind(&input.description)
        .bind(quantity)
        .bind(unit_price)
        .bind(discount_type.as_str())
        .bind(discount_value)
        .bind(amounts.discount_amount)
        .bind(amounts.total_price)
        .bind(total_weight)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update line item: {}", e)))?;

        self.refresh_derived_fields(&mut tx, &document).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        Ok(Some(line_item))
    }

    /// Detach a line item and refresh the document's derived fields.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, line_item_id = %line_item_id))]
    pub async fn detach_line_item(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        line_item_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["detach_line_item"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(false),
        };
        ensure_ledger_open(&document)?;

        let result = sqlx::query(
            r#"
            DELETE FROM line_items
            WHERE tenant_id = $1 AND document_id = $2 AND line_item_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(line_item_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to detach line item: {}", e)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        self.refresh_derived_fields(&mut tx, &document).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        info!(line_item_id = %line_item_id, "Line item detached");

        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Calculation Operations
    // -------------------------------------------------------------------------

    /// Recompute and persist a document's derived totals.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn recalculate_totals(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recalculate_totals"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };

        let refreshed = self.refresh_derived_fields(&mut tx, &document).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        Ok(Some(refreshed))
    }

    /// Recompute and persist a delivery order's total shipment weight.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn recalculate_weight(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recalculate_weight"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };

        if parse_kind(&document)? != DocumentKind::DeliveryOrder {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Weight aggregation applies to delivery orders only"
            )));
        }

        let lines = self.line_items_in_tx(&mut tx, tenant_id, document_id).await?;
        let total_weight = weight::document_total_weight(&lines);

        let updated = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET total_weight = $3,
                updated_utc = NOW()
            WHERE tenant_id = $1 AND document_id = $2
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(total_weight)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update weight: {}", e)))?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        Ok(Some(updated))
    }

    // -------------------------------------------------------------------------
    // Lifecycle Operations
    // -------------------------------------------------------------------------

    /// Transition a document to a new status.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, document_id = %document_id))]
    pub async fn transition_status(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
        input: &TransitionDocument,
    ) -> Result<Option<Document>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_status"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let document = match self
            .document_for_update(&mut tx, tenant_id, document_id)
            .await?
        {
            Some(doc) => doc,
            None => return Ok(None),
        };

        let kind = parse_kind(&document)?;
        let current = parse_status(&document)?;
        let target = input.status;

        lifecycle::check_transition(kind, current, target)?;

        if lifecycle::requires_line_items(kind, target) {
            let line_count: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM line_items
                WHERE tenant_id = $1 AND document_id = $2
                "#,
            )
            .bind(tenant_id)
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to count line items: {}", e))
            })?;

            if line_count == 0 {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Cannot move a {} to '{}' without line items",
                    kind,
                    target
                )));
            }
        }

        let (amount_paid, amount_due) = if kind == DocumentKind::Invoice
            && matches!(target, DocumentStatus::Paid | DocumentStatus::PartiallyPaid)
        {
            lifecycle::apply_invoice_payment(
                document.total_amount,
                document.amount_paid,
                target,
                input.payment_amount,
            )?
        } else {
            (document.amount_paid, document.amount_due)
        };

        // Sending an invoice stamps its issue date if none was set.
        let issue_stamp: Option<NaiveDate> = if kind == DocumentKind::Invoice
            && target == DocumentStatus::Sent
            && document.issue_date.is_none()
        {
            Some(chrono::Utc::now().date_naive())
        } else {
            None
        };

        let updated = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET status = $3,
                amount_paid = $4,
                amount_due = $5,
                issue_date = COALESCE(issue_date, $6),
                updated_utc = NOW()
            WHERE tenant_id = $1 AND document_id = $2
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(target.as_str())
        .bind(amount_paid)
        .bind(amount_due)
        .bind(issue_stamp)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition document: {}", e))
        })?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        TRANSITIONS_TOTAL
            .with_label_values(&[kind.as_str(), target.as_str()])
            .inc();
        if kind == DocumentKind::Invoice && target == DocumentStatus::Sent {
            INVOICED_AMOUNT_TOTAL
                .with_label_values(&[updated.currency.as_str()])
                .inc_by(updated.total_amount.to_f64().unwrap_or(0.0));
        }

        info!(
            document_id = %updated.document_id,
            from = %current,
            to = %target,
            "Document transitioned"
        );

        Ok(Some(updated))
    }

    /// Convert a document into a successor of another kind, snapshotting its
    /// line items. The whole conversion commits or rolls back as a unit.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, source_document_id = %source_document_id, target_kind = %target_kind))]
    pub async fn convert_document(
        &self,
        tenant_id: Uuid,
        source_document_id: Uuid,
        target_kind: DocumentKind,
    ) -> Result<Document, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_document"])
            .start_timer();

        let mut tx = self.begin_tx().await?;

        let source = self
            .document_for_update(&mut tx, tenant_id, source_document_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))?;

        let plan = convert::plan_successor(&source, target_kind)?;
        let source_lines = self
            .line_items_in_tx(&mut tx, tenant_id, source_document_id)
            .await?;

        let successor_id = Uuid::new_v4();
        let successor = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (
                document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency,
                discount_type, discount_value, tax_rate_id, shipping_amount, notes, metadata
            )
            VALUES ($1, $2, $3, next_document_number($2, $3, $4), $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17)
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(successor_id)
        .bind(tenant_id)
        .bind(plan.kind.as_str())
        .bind(plan.kind.number_prefix())
        .bind(plan.status.as_str())
        .bind(plan.assignee_id)
        .bind(plan.account_id)
        .bind(plan.billing_contact_id)
        .bind(plan.shipping_contact_id)
        .bind(plan.predecessor_id)
        .bind(&plan.currency)
        .bind(&plan.discount_type)
        .bind(plan.discount_value)
        .bind(plan.tax_rate_id)
        .bind(plan.shipping_amount)
        .bind(&plan.notes)
        .bind(&plan.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create successor: {}", e))
        })?;

        for line in &source_lines {
            let snapshot = convert::snapshot_line(line, successor_id);
            sqlx::query(
                r#"
                INSERT INTO line_items (
                    line_item_id, document_id, tenant_id, product_id, description, quantity,
                    unit_price, discount_type, discount_value, discount_amount, total_price,
                    unit_weight, total_weight, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(snapshot.line_item_id)
            .bind(snapshot.document_id)
            .bind(snapshot.tenant_id)
            .bind(snapshot.product_id)
            .bind(&snapshot.description)
            .bind(snapshot.quantity)
            .bind(snapshot.unit_price)
            .bind(&snapshot.discount_type)
            .bind(snapshot.discount_value)
            .bind(snapshot.discount_amount)
            .bind(snapshot.total_price)
            .bind(snapshot.unit_weight)
            .bind(snapshot.total_weight)
            .bind(snapshot.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to copy line item: {}", e))
            })?;
        }

        let successor = self.refresh_derived_fields(&mut tx, &successor).await?;

        self.commit_tx(tx).await?;
        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&[target_kind.as_str()])
            .inc();
        CONVERSIONS_TOTAL
            .with_label_values(&[source.kind.as_str(), target_kind.as_str()])
            .inc();

        info!(
            source_document_id = %source.document_id,
            document_id = %successor.document_id,
            number = %successor.number,
            "Document converted"
        );

        Ok(successor)
    }

    /// Reclassify sent invoices past their due date as overdue. Returns the
    /// number of invoices swept.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn sweep_overdue_invoices(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sweep_overdue_invoices"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'overdue',
                updated_utc = NOW()
            WHERE tenant_id = $1
              AND kind = 'invoice'
              AND status = 'sent'
              AND due_date IS NOT NULL
              AND due_date < $2
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sweep invoices: {}", e)))?;

        timer.observe_duration();

        let swept = result.rows_affected();
        if swept > 0 {
            info!(swept = swept, "Invoices reclassified as overdue");
        }

        Ok(swept)
    }

    // -------------------------------------------------------------------------
    // Transaction Helpers
    // -------------------------------------------------------------------------

    async fn begin_tx(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }

    async fn commit_tx(&self, tx: Transaction<'_, Postgres>) -> Result<(), AppError> {
        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })
    }

    /// Lock and fetch a document row for the duration of the transaction.
    async fn document_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            FROM documents
            WHERE tenant_id = $1 AND document_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock document: {}", e)))?;

        Ok(document)
    }

    async fn line_items_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let line_items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, document_id, tenant_id, product_id, description, quantity,
                unit_price, discount_type, discount_value, discount_amount, total_price,
                unit_weight, total_weight, sort_order, created_utc
            FROM line_items
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        Ok(line_items)
    }

    /// Recompute totals (and shipment weight for delivery orders) from the
    /// line items visible inside the transaction, and persist them.
    async fn refresh_derived_fields(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document: &Document,
    ) -> Result<Document, AppError> {
        let lines = self
            .line_items_in_tx(tx, document.tenant_id, document.document_id)
            .await?;

        let tax_rate = match document.tax_rate_id {
            Some(tax_rate_id) => sqlx::query_as::<_, TaxRate>(
                r#"
                SELECT tax_rate_id, tenant_id, name, rate, active, created_utc
                FROM tax_rates
                WHERE tenant_id = $1 AND tax_rate_id = $2
                "#,
            )
            .bind(document.tenant_id)
            .bind(tax_rate_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get tax rate: {}", e))
            })?,
            None => None,
        };

        let discount_type = document.parsed_discount_type().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Document {} has unknown discount type '{}'",
                document.document_id,
                document.discount_type
            ))
        })?;

        let totals = totals::calculate(
            &lines,
            discount_type,
            document.discount_value,
            tax_rate.as_ref(),
            document.shipping_amount,
            document.amount_paid,
        )?;

        let total_weight = if parse_kind(document)? == DocumentKind::DeliveryOrder {
            Some(weight::document_total_weight(&lines))
        } else {
            None
        };

        let updated = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET subtotal = $3,
                discount_amount = $4,
                tax_amount = $5,
                total_amount = $6,
                amount_due = $7,
                total_weight = $8,
                updated_utc = NOW()
            WHERE tenant_id = $1 AND document_id = $2
            RETURNING document_id, tenant_id, kind, number, status, assignee_id, account_id,
                billing_contact_id, shipping_contact_id, predecessor_id, currency, issue_date,
                due_date, delivery_date, return_date, discount_type, discount_value,
                discount_amount, subtotal, tax_rate_id, tax_amount, shipping_amount,
                total_amount, amount_paid, amount_due, tracking_number, carrier, total_weight,
                notes, metadata, created_utc, updated_utc
            "#,
        )
        .bind(document.tenant_id)
        .bind(document.document_id)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .bind(totals.amount_due)
        .bind(total_weight)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update totals: {}", e)))?;

        Ok(updated)
    }
}
