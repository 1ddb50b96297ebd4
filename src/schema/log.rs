//! The ordered migration log. Append new migrations at the end; never edit
//! one that has shipped, the migrator rejects a changed checksum.

use sha2::{Digest, Sha256};

use super::ops::{Column, ColumnType::*, FkAction, ForeignKey, Literal, SchemaOp, Table};
use super::tighten::add_required_column;

pub const NO_EXPLANATION: &str = "No explanation provided.";

#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub ops: Vec<SchemaOp>,
}

impl Migration {
    pub fn statements(&self) -> Vec<String> {
        self.ops.iter().map(SchemaOp::to_sql).collect()
    }

    /// Hex SHA-256 over the rendered statements.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for stmt in self.statements() {
            hasher.update(stmt.as_bytes());
            hasher.update(b";\n");
        }
        hex::encode(hasher.finalize())
    }
}

pub fn migrations() -> Vec<Migration> {
    vec![
        baseline_user(),
        add_feedback(),
        feedback_structured_scores(),
        add_recipe_and_training_record(),
        training_record_explanation(),
        score_ranges(),
    ]
}

fn baseline_user() -> Migration {
    Migration {
        version: 1,
        name: "baseline_user",
        ops: vec![
            SchemaOp::CreateTable(Table {
                name: "User",
                columns: vec![
                    Column::required("id", Text),
                    Column::required("email", Text),
                    Column::optional("passwordHash", Text),
                    Column::optional("name", Text),
                    Column::optional("group", Text),
                    Column::required("onboardingCompleted", Boolean)
                        .default_to(Literal::Boolean(false)),
                    Column::optional("age", Integer),
                    Column::optional("gender", Text),
                    Column::optional("height", DoublePrecision),
                    Column::optional("heightUnit", Text),
                    Column::optional("weight", DoublePrecision),
                    Column::optional("weightUnit", Text),
                    Column::optional("activityLevel", Text),
                    Column::optional("dietaryProfile", Jsonb),
                    Column::optional("likedIngredients", TextArray),
                    Column::optional("dislikedIngredients", TextArray),
                    Column::optional("favoriteCuisines", TextArray),
                    Column::optional("otherCuisine", Text),
                    Column::required("createdAt", Timestamp).default_to(Literal::CurrentTimestamp),
                ],
                primary_key: "id",
                if_not_exists: true,
            }),
            SchemaOp::CreateIndex {
                table: "User",
                columns: vec!["email"],
                unique: true,
                if_not_exists: true,
            },
        ],
    }
}

fn add_feedback() -> Migration {
    Migration {
        version: 2,
        name: "add_feedback",
        ops: vec![
            SchemaOp::CreateTable(Table {
                name: "Feedback",
                columns: vec![
                    Column::required("id", Text),
                    Column::required("liked", Boolean),
                    Column::optional("comment", Text),
                    Column::required("recommendationId", Text),
                    Column::required("userId", Text),
                    Column::required("createdAt", Timestamp).default_to(Literal::CurrentTimestamp),
                ],
                primary_key: "id",
                if_not_exists: false,
            }),
            SchemaOp::AddForeignKey(ForeignKey {
                table: "Feedback",
                column: "userId",
                references_table: "User",
                references_column: "id",
                on_delete: FkAction::Restrict,
                on_update: FkAction::Cascade,
            }),
        ],
    }
}

/// Free-text comments give way to three required scores. Existing comments
/// are dropped, and the NOT NULL columns have no default, so this only
/// applies while Feedback is empty.
fn feedback_structured_scores() -> Migration {
    Migration {
        version: 3,
        name: "feedback_structured_scores",
        ops: vec![
            SchemaOp::DropColumn {
                table: "Feedback",
                column: "comment",
            },
            SchemaOp::AddColumn {
                table: "Feedback",
                column: Column::required("healthinessScore", Integer),
            },
            SchemaOp::AddColumn {
                table: "Feedback",
                column: Column::required("tastinessScore", Integer),
            },
            SchemaOp::AddColumn {
                table: "Feedback",
                column: Column::required("intentToTryScore", Integer),
            },
        ],
    }
}

fn add_recipe_and_training_record() -> Migration {
    Migration {
        version: 4,
        name: "add_recipe_and_training_record",
        ops: vec![
            SchemaOp::CreateTable(Table {
                name: "Recipe",
                columns: vec![
                    Column::required("id", Text),
                    Column::required("preferences", Text),
                    Column::required("recommendation", Text),
                    Column::required("createdAt", Timestamp).default_to(Literal::CurrentTimestamp),
                ],
                primary_key: "id",
                if_not_exists: false,
            }),
            // No foreign keys: records are snapshots and outlive the rows they describe.
            SchemaOp::CreateTable(Table {
                name: "TrainingRecord",
                columns: vec![
                    Column::required("id", Text),
                    Column::required("userId", Text),
                    Column::required("userProfileSnapshot", Jsonb),
                    Column::required("recommendationId", Text),
                    Column::required("recommendationName", Text),
                    Column::optional("group", Text),
                    Column::optional("liked", Boolean),
                    Column::optional("healthinessScore", Integer),
                    Column::optional("tastinessScore", Integer),
                    Column::optional("intentToTryScore", Integer),
                    Column::optional("pros", TextArray),
                    Column::optional("cons", TextArray),
                    Column::required("createdAt", Timestamp).default_to(Literal::CurrentTimestamp),
                ],
                primary_key: "id",
                if_not_exists: false,
            }),
        ],
    }
}

fn training_record_explanation() -> Migration {
    let mut ops = vec![
        SchemaOp::DropColumn {
            table: "TrainingRecord",
            column: "pros",
        },
        SchemaOp::DropColumn {
            table: "TrainingRecord",
            column: "cons",
        },
    ];
    ops.extend(add_required_column(
        "TrainingRecord",
        "explanation",
        Text,
        Literal::text(NO_EXPLANATION),
    ));
    Migration {
        version: 5,
        name: "training_record_explanation",
        ops,
    }
}

/// The database enforces the 1..=5 rating scale on every score column.
fn score_ranges() -> Migration {
    let ops = ["Feedback", "TrainingRecord"]
        .into_iter()
        .flat_map(|table| {
            ["healthinessScore", "tastinessScore", "intentToTryScore"]
                .into_iter()
                .map(move |column| SchemaOp::AddRangeCheck {
                    table,
                    column,
                    min: 1,
                    max: 5,
                })
        })
        .collect();
    Migration {
        version: 6,
        name: "score_ranges",
        ops,
    }
}
