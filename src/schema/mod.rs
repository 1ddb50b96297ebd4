pub mod inspect;
pub mod log;
pub mod migrator;
pub mod ops;
pub mod postgres;
pub mod tighten;

pub use log::{migrations, Migration, NO_EXPLANATION};
pub use migrator::{MigrationBackend, MigrationReport, MigrationState, MigrationStatus, Migrator};
pub use postgres::PgBackend;
