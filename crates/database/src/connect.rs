use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.sqlx_logging(false); // Disable SQLx log

    // An in-memory SQLite database lives inside a single connection.
    if database_url.starts_with("sqlite::memory:") {
        opt.max_connections(1).min_connections(1);
    }

    Database::connect(opt).await
}
