//! Reads the live shape of the store's tables from the system catalogs.

use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::StoreResult;

pub const STORE_TABLES: [&str; 4] = ["User", "Feedback", "Recipe", "TrainingRecord"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_expr: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub table_name: String,
    pub referenced_table: String,
    /// `r` restrict, `c` cascade, `a` no action, `n` set null, `d` set default.
    pub on_delete: String,
    pub on_update: String,
}

impl ForeignKeyInfo {
    pub fn on_delete_label(&self) -> &'static str {
        action_label(&self.on_delete)
    }

    pub fn on_update_label(&self) -> &'static str {
        action_label(&self.on_update)
    }
}

fn action_label(code: &str) -> &'static str {
    match code {
        "r" => "RESTRICT",
        "c" => "CASCADE",
        "n" => "SET NULL",
        "d" => "SET DEFAULT",
        _ => "NO ACTION",
    }
}

/// Columns of the given tables in the current schema, ordered by table and position.
pub async fn columns(db: &PgPool, tables: &[&str]) -> StoreResult<Vec<ColumnInfo>> {
    let tables: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
    let rows = sqlx::query_as::<_, ColumnInfo>(
        r#"
        SELECT table_name::text   AS table_name,
               column_name::text  AS column_name,
               CASE WHEN data_type = 'ARRAY' THEN udt_name::text ELSE data_type::text END AS data_type,
               is_nullable = 'YES' AS nullable,
               column_default::text AS default_expr
          FROM information_schema.columns
         WHERE table_schema = current_schema()
           AND table_name = ANY($1)
         ORDER BY table_name, ordinal_position
        "#,
    )
    .bind(tables)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn foreign_keys(db: &PgPool) -> StoreResult<Vec<ForeignKeyInfo>> {
    let rows = sqlx::query_as::<_, ForeignKeyInfo>(
        r#"
        SELECT con.conname::text      AS constraint_name,
               src.relname::text      AS table_name,
               dst.relname::text      AS referenced_table,
               con.confdeltype::text  AS on_delete,
               con.confupdtype::text  AS on_update
          FROM pg_catalog.pg_constraint con
          JOIN pg_catalog.pg_class src ON src.oid = con.conrelid
          JOIN pg_catalog.pg_class dst ON dst.oid = con.confrelid
          JOIN pg_catalog.pg_namespace ns ON ns.oid = src.relnamespace
         WHERE con.contype = 'f'
           AND ns.nspname = current_schema()
         ORDER BY con.conname
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_map_to_sql_keywords() {
        let fk = ForeignKeyInfo {
            constraint_name: "Feedback_userId_fkey".into(),
            table_name: "Feedback".into(),
            referenced_table: "User".into(),
            on_delete: "r".into(),
            on_update: "c".into(),
        };
        assert_eq!(fk.on_delete_label(), "RESTRICT");
        assert_eq!(fk.on_update_label(), "CASCADE");
        assert_eq!(action_label("a"), "NO ACTION");
    }
}
