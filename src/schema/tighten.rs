//! Backfill-then-constrain: the way to add a required column to a table that
//! may already hold rows.

use super::ops::{Column, ColumnType, Literal, SchemaOp};

/// Plans a required column as three steps: add it nullable, backfill every
/// existing row with `sentinel`, then set NOT NULL. Run inside one
/// transaction, the constraint check either passes on all rows or the whole
/// change rolls back.
pub fn add_required_column(
    table: &'static str,
    column: &'static str,
    ty: ColumnType,
    sentinel: Literal,
) -> [SchemaOp; 3] {
    [
        SchemaOp::AddColumn {
            table,
            column: Column::optional(column, ty),
        },
        SchemaOp::Backfill {
            table,
            column,
            value: sentinel,
        },
        SchemaOp::SetNotNull { table, column },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_come_in_add_backfill_constrain_order() {
        let plan = add_required_column(
            "TrainingRecord",
            "explanation",
            ColumnType::Text,
            Literal::text("n/a"),
        );
        assert!(matches!(&plan[0], SchemaOp::AddColumn { column, .. } if column.nullable));
        assert!(matches!(&plan[1], SchemaOp::Backfill { value: Literal::Text(v), .. } if v == "n/a"));
        assert!(matches!(&plan[2], SchemaOp::SetNotNull { column: "explanation", .. }));
        assert!(plan.iter().all(|op| !op.requires_empty_table()));
        assert!(plan.iter().all(|op| op.table() == "TrainingRecord"));
    }
}
