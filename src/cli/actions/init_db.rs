use crate::store;
use anyhow::Result;

/// Drop and recreate the schema.
/// # Errors
/// Returns an error if the database cannot be opened or the schema statements fail.
pub async fn execute(dsn: &str) -> Result<()> {
    let pool = store::connect(dsn).await?;
    store::reset(&pool).await?;
    pool.close().await;

    println!("Initialized the database.");

    Ok(())
}
