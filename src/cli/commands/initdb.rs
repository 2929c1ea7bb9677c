use anyhow::Result;
use tracing::{info, trace};

use crate::config::connect;

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");

    // Connecting applies all pending migrations
    connect(database_url).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}
