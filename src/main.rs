use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use nutrirecom_store::schema::{inspect, MigrationState, Migrator, PgBackend};
use nutrirecom_store::{feedback::Feedback, maintenance, training, users::User, Store};

#[derive(Parser)]
#[command(name = "nutrirecom-store", about = "Schema and data tooling for the NutriRecom store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations.
    Migrate,
    /// Show applied and pending migrations.
    Status,
    /// Print the live columns and foreign keys of the store tables.
    Describe,
    /// List users.
    Users,
    /// List the most recent training records.
    Records {
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },
    /// List a user's feedback, newest first.
    Feedback {
        user_id: String,
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        offset: i64,
    },
    /// Delete all rows from every store table.
    Erase {
        /// Required; confirms the data loss.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutrirecom_store=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    if let Command::Erase { yes: false } = cli.command {
        bail!("erase deletes every row in the store; pass --yes to confirm");
    }

    let store = Store::init().await?;
    let backend = PgBackend::new(store.db.clone());

    match cli.command {
        Command::Migrate => {
            let report = Migrator::new()?
                .run(&backend)
                .await
                .context("run migrations")?;
            if report.newly_applied.is_empty() {
                println!("up to date ({} applied)", report.already_applied);
            } else {
                for version in &report.newly_applied {
                    println!("applied {version}");
                }
            }
        }
        Command::Status => {
            let statuses = Migrator::new()?
                .status(&backend)
                .await
                .context("read migration history")?;
            for s in statuses {
                match s.state {
                    MigrationState::Applied { applied_at } => {
                        println!("{:>4}  {:<40} applied {}", s.version, s.name, applied_at)
                    }
                    MigrationState::Pending => println!("{:>4}  {:<40} pending", s.version, s.name),
                }
            }
        }
        Command::Describe => {
            let columns = inspect::columns(&store.db, &inspect::STORE_TABLES)
                .await
                .context("read columns")?;
            let mut current = "";
            for c in &columns {
                if c.table_name != current {
                    println!("{}", c.table_name);
                    current = c.table_name.as_str();
                }
                let null = if c.nullable { "NULL" } else { "NOT NULL" };
                match &c.default_expr {
                    Some(d) => println!("  {:<24} {:<28} {:<8} DEFAULT {d}", c.column_name, c.data_type, null),
                    None => println!("  {:<24} {:<28} {}", c.column_name, c.data_type, null),
                }
            }
            for fk in inspect::foreign_keys(&store.db)
                .await
                .context("read foreign keys")?
            {
                println!(
                    "{}: {} -> {} ON DELETE {} ON UPDATE {}",
                    fk.constraint_name,
                    fk.table_name,
                    fk.referenced_table,
                    fk.on_delete_label(),
                    fk.on_update_label()
                );
            }
        }
        Command::Users => {
            for user in User::list_all(&store.db).await.context("list users")? {
                println!(
                    "{}  {:<32} {:<12} onboarded={}",
                    user.id,
                    user.email,
                    user.group.as_deref().unwrap_or("-"),
                    user.onboarding_completed
                );
            }
        }
        Command::Records { limit } => {
            let records = training::services::list_recent(&store.db, limit)
                .await
                .context("list training records")?;
            for r in records {
                println!("{}", serde_json::to_string(&r)?);
            }
        }
        Command::Feedback {
            user_id,
            limit,
            offset,
        } => {
            let rows = Feedback::list_by_user(&store.db, &user_id, limit, offset)
                .await
                .context("list feedback")?;
            for f in rows {
                println!("{}", serde_json::to_string(&f)?);
            }
        }
        Command::Erase { .. } => {
            let erased = maintenance::erase_all_data(&store.db)
                .await
                .context("erase store data")?;
            println!(
                "erased {} rows ({} feedback, {} training records, {} recipes, {} users)",
                erased.total(),
                erased.feedback,
                erased.training_records,
                erased.recipes,
                erased.users
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn non_positive_limits_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["nutrirecom-store", "records", "--limit", "-5"]).is_err());
        assert!(Cli::try_parse_from(["nutrirecom-store", "records", "--limit", "0"]).is_err());
        let cli = Cli::try_parse_from(["nutrirecom-store", "records", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Records { limit: 3 }));
    }

    #[test]
    fn feedback_takes_a_user_and_paging() {
        let cli = Cli::try_parse_from(["nutrirecom-store", "feedback", "u1", "--offset", "10"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Feedback { ref user_id, limit: 20, offset: 10 } if user_id == "u1"
        ));
        assert!(Cli::try_parse_from(["nutrirecom-store", "feedback", "u1", "--offset", "-1"]).is_err());
    }
}
