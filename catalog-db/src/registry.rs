//! Explicit model registry
//!
//! Downstream model types describe their table with [`Model`] and are
//! registered on a [`ModelRegistry`] owned by the composition root, which
//! can then create any missing tables.

use tracing::{debug, info};

use crate::error::{DbError, Result};
use crate::pool::Database;

/// A type mapped to one table.
pub trait Model {
    /// Table name, unique within a registry
    const TABLE: &'static str;

    /// Idempotent DDL, e.g. `CREATE TABLE IF NOT EXISTS ...`
    const DDL: &'static str;
}

/// Registered table definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDef {
    pub table: &'static str,
    pub ddl: &'static str,
}

/// Ordered set of registered models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDef>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M`. Tables are created in registration order, so register
    /// referenced tables before the tables that reference them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateModel`] if the table is already taken.
    pub fn register<M: Model>(&mut self) -> Result<&mut Self> {
        if self.get(M::TABLE).is_some() {
            return Err(DbError::DuplicateModel { table: M::TABLE });
        }
        self.models.push(ModelDef {
            table: M::TABLE,
            ddl: M::DDL,
        });
        Ok(self)
    }

    pub fn get(&self, table: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.table == table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|m| m.table)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Create every registered table that does not exist yet, in one
    /// transaction.
    pub async fn create_all(&self, db: &Database) -> Result<()> {
        if self.models.is_empty() {
            return Ok(());
        }

        let mut tx = db.pool().begin().await?;
        for model in &self.models {
            sqlx::query(model.ddl).execute(&mut *tx).await?;
            debug!(table = model.table, "table ensured");
        }
        tx.commit().await?;

        info!(tables = self.models.len(), "database tables ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Category;
    impl Model for Category {
        const TABLE: &'static str = "categories";
        const DDL: &'static str = r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name TEXT UNIQUE NOT NULL
            )
        "#;
    }

    struct Product;
    impl Model for Product {
        const TABLE: &'static str = "products";
        const DDL: &'static str = r#"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                category_id BIGINT REFERENCES categories(id),
                name TEXT NOT NULL
            )
        "#;
    }

    struct ProductAlias;
    impl Model for ProductAlias {
        const TABLE: &'static str = "products";
        const DDL: &'static str = "CREATE TABLE IF NOT EXISTS products (id BIGINT)";
    }

    #[test]
    fn registration_order_is_kept() {
        let mut registry = ModelRegistry::new();
        registry
            .register::<Category>()
            .unwrap()
            .register::<Product>()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.tables().collect::<Vec<_>>(),
            vec!["categories", "products"]
        );
        assert!(registry.get("products").unwrap().ddl.contains("REFERENCES"));
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register::<Product>().unwrap();

        let err = registry.register::<ProductAlias>().unwrap_err();
        assert!(matches!(err, DbError::DuplicateModel { table: "products" }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("products").is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_all_is_idempotent() {
        use crate::config::DatabaseConfig;
        use crate::pool::PoolSettings;

        let config = DatabaseConfig::from_env().expect("DATABASE_URL required");
        let db = Database::connect_lazy(&PoolSettings::from_config(&config)).expect("pool");

        let mut registry = ModelRegistry::new();
        registry
            .register::<Category>()
            .unwrap()
            .register::<Product>()
            .unwrap();

        registry.create_all(&db).await.expect("first create");
        registry.create_all(&db).await.expect("second create");

        let exists: bool = sqlx::query_scalar("SELECT to_regclass('public.products') IS NOT NULL")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(exists);
    }
}
