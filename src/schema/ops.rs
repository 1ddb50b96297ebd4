//! Typed schema-altering operations and their PostgreSQL rendering.
//!
//! Every operation renders to exactly one statement. Identifiers are always
//! double-quoted, so camelCase names and reserved words such as `group`
//! survive unchanged.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
    DoublePrecision,
    Jsonb,
    /// `TIMESTAMP(3)`, millisecond precision without time zone.
    Timestamp,
    TextArray,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DoublePrecision => "DOUBLE PRECISION",
            ColumnType::Jsonb => "JSONB",
            ColumnType::Timestamp => "TIMESTAMP(3)",
            ColumnType::TextArray => "TEXT[]",
        }
    }
}

/// A constant SQL value, used for defaults and backfills.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Boolean(bool),
    CurrentTimestamp,
}

impl Literal {
    pub fn text(s: impl Into<String>) -> Self {
        Literal::Text(s.into())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Literal::CurrentTimestamp => f.write_str("CURRENT_TIMESTAMP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<Literal>,
}

impl Column {
    pub fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
        }
    }

    pub fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, ty)
        }
    }

    pub fn default_to(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }

    fn definition(&self) -> String {
        let mut out = format!("{} {}", ident(self.name), self.ty.sql());
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            out.push_str(&format!(" DEFAULT {default}"));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkAction {
    Restrict,
    Cascade,
    SetNull,
    NoAction,
}

impl FkAction {
    pub fn sql(self) -> &'static str {
        match self {
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
    pub on_delete: FkAction,
    pub on_update: FkAction,
}

impl ForeignKey {
    /// Constraint name in the `<table>_<column>_fkey` convention.
    pub fn name(&self) -> String {
        format!("{}_{}_fkey", self.table, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: &'static str,
    pub columns: Vec<Column>,
    pub primary_key: &'static str,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOp {
    CreateTable(Table),
    AddColumn {
        table: &'static str,
        column: Column,
    },
    DropColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Sets `column` to `value` on every row where it is still NULL.
    Backfill {
        table: &'static str,
        column: &'static str,
        value: Literal,
    },
    SetNotNull {
        table: &'static str,
        column: &'static str,
    },
    AddForeignKey(ForeignKey),
    /// `CHECK (column BETWEEN min AND max)`; NULLs pass.
    AddRangeCheck {
        table: &'static str,
        column: &'static str,
        min: i64,
        max: i64,
    },
    CreateIndex {
        table: &'static str,
        columns: Vec<&'static str>,
        unique: bool,
        if_not_exists: bool,
    },
}

impl SchemaOp {
    pub fn table(&self) -> &'static str {
        match self {
            SchemaOp::CreateTable(t) => t.name,
            SchemaOp::AddColumn { table, .. }
            | SchemaOp::DropColumn { table, .. }
            | SchemaOp::Backfill { table, .. }
            | SchemaOp::SetNotNull { table, .. }
            | SchemaOp::AddRangeCheck { table, .. }
            | SchemaOp::CreateIndex { table, .. } => *table,
            SchemaOp::AddForeignKey(fk) => fk.table,
        }
    }

    /// True for operations that only succeed while the table has no rows:
    /// adding a NOT NULL column with no default.
    pub fn requires_empty_table(&self) -> bool {
        matches!(
            self,
            SchemaOp::AddColumn { column, .. } if !column.nullable && column.default.is_none()
        )
    }

    pub fn to_sql(&self) -> String {
        match self {
            SchemaOp::CreateTable(t) => {
                let mut lines: Vec<String> = t
                    .columns
                    .iter()
                    .map(|c| format!("    {}", c.definition()))
                    .collect();
                lines.push(format!(
                    "    CONSTRAINT {} PRIMARY KEY ({})",
                    ident(&format!("{}_pkey", t.name)),
                    ident(t.primary_key)
                ));
                format!(
                    "CREATE TABLE {}{} (\n{}\n)",
                    if t.if_not_exists { "IF NOT EXISTS " } else { "" },
                    ident(t.name),
                    lines.join(",\n")
                )
            }
            SchemaOp::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                ident(table),
                column.definition()
            ),
            SchemaOp::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", ident(table), ident(column))
            }
            SchemaOp::Backfill {
                table,
                column,
                value,
            } => format!(
                "UPDATE {} SET {col} = {value} WHERE {col} IS NULL",
                ident(table),
                col = ident(column),
            ),
            SchemaOp::SetNotNull { table, column } => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
                ident(table),
                ident(column)
            ),
            SchemaOp::AddForeignKey(fk) => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
                ident(fk.table),
                ident(&fk.name()),
                ident(fk.column),
                ident(fk.references_table),
                ident(fk.references_column),
                fk.on_delete.sql(),
                fk.on_update.sql(),
            ),
            SchemaOp::AddRangeCheck {
                table,
                column,
                min,
                max,
            } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({} BETWEEN {min} AND {max})",
                ident(table),
                ident(&format!("{table}_{column}_check")),
                ident(column),
            ),
            SchemaOp::CreateIndex {
                table,
                columns,
                unique,
                if_not_exists,
            } => {
                let suffix = if *unique { "key" } else { "idx" };
                let name = format!("{}_{}_{}", table, columns.join("_"), suffix);
                let cols: Vec<String> = columns.iter().map(|c| ident(c)).collect();
                format!(
                    "CREATE {}INDEX {}{} ON {}({})",
                    if *unique { "UNIQUE " } else { "" },
                    if *if_not_exists { "IF NOT EXISTS " } else { "" },
                    ident(&name),
                    ident(table),
                    cols.join(", ")
                )
            }
        }
    }
}

impl fmt::Display for SchemaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Quotes an identifier for PostgreSQL.
pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(ident("group"), "\"group\"");
        assert_eq!(ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn range_check_is_named_after_table_and_column() {
        let op = SchemaOp::AddRangeCheck {
            table: "Feedback",
            column: "tastinessScore",
            min: 1,
            max: 5,
        };
        assert_eq!(
            op.to_sql(),
            "ALTER TABLE \"Feedback\" ADD CONSTRAINT \"Feedback_tastinessScore_check\" CHECK (\"tastinessScore\" BETWEEN 1 AND 5)"
        );
        assert_eq!(op.table(), "Feedback");
        assert!(!op.requires_empty_table());
    }

    #[test]
    fn text_literals_escape_single_quotes() {
        assert_eq!(Literal::text("it's").to_string(), "'it''s'");
        assert_eq!(Literal::Boolean(false).to_string(), "false");
        assert_eq!(Literal::Integer(-3).to_string(), "-3");
    }

    #[test]
    fn create_table_renders_columns_and_primary_key() {
        let op = SchemaOp::CreateTable(Table {
            name: "Recipe",
            columns: vec![
                Column::required("id", ColumnType::Text),
                Column::required("preferences", ColumnType::Text),
                Column::required("createdAt", ColumnType::Timestamp)
                    .default_to(Literal::CurrentTimestamp),
            ],
            primary_key: "id",
            if_not_exists: false,
        });
        assert_eq!(
            op.to_sql(),
            "CREATE TABLE \"Recipe\" (\n    \"id\" TEXT NOT NULL,\n    \"preferences\" TEXT NOT NULL,\n    \"createdAt\" TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    CONSTRAINT \"Recipe_pkey\" PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn foreign_key_renders_both_actions() {
        let op = SchemaOp::AddForeignKey(ForeignKey {
            table: "Feedback",
            column: "userId",
            references_table: "User",
            references_column: "id",
            on_delete: FkAction::Restrict,
            on_update: FkAction::Cascade,
        });
        assert_eq!(
            op.to_sql(),
            "ALTER TABLE \"Feedback\" ADD CONSTRAINT \"Feedback_userId_fkey\" FOREIGN KEY (\"userId\") REFERENCES \"User\"(\"id\") ON DELETE RESTRICT ON UPDATE CASCADE"
        );
    }

    #[test]
    fn backfill_only_touches_null_rows() {
        let op = SchemaOp::Backfill {
            table: "TrainingRecord",
            column: "explanation",
            value: Literal::text("No explanation provided."),
        };
        assert_eq!(
            op.to_sql(),
            "UPDATE \"TrainingRecord\" SET \"explanation\" = 'No explanation provided.' WHERE \"explanation\" IS NULL"
        );
    }

    #[test]
    fn unique_index_uses_key_suffix() {
        let op = SchemaOp::CreateIndex {
            table: "User",
            columns: vec!["email"],
            unique: true,
            if_not_exists: true,
        };
        assert_eq!(
            op.to_sql(),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"User_email_key\" ON \"User\"(\"email\")"
        );
    }

    #[test]
    fn only_not_null_columns_without_default_need_an_empty_table() {
        let strict = SchemaOp::AddColumn {
            table: "Feedback",
            column: Column::required("tastinessScore", ColumnType::Integer),
        };
        let defaulted = SchemaOp::AddColumn {
            table: "Feedback",
            column: Column::required("flag", ColumnType::Boolean).default_to(Literal::Boolean(false)),
        };
        let loose = SchemaOp::AddColumn {
            table: "Feedback",
            column: Column::optional("note", ColumnType::Text),
        };
        assert!(strict.requires_empty_table());
        assert!(!defaulted.requires_empty_table());
        assert!(!loose.requires_empty_table());
        assert_eq!(strict.table(), "Feedback");
    }
}
