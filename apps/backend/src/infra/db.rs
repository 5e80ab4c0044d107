use migration::{migrate, MigrationCommand};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

use crate::error::AppError;

/// Connect to Postgres and bring the schema up to date.
pub async fn connect_db(database_url: &str) -> Result<DatabaseConnection, AppError> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);

    let conn = Database::connect(options).await?;
    migrate(&conn, MigrationCommand::Up).await?;
    info!("database connected and migrated");
    Ok(conn)
}
