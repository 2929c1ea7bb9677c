use anyhow::Result;

use crate::config::connect;

pub async fn add_user(database_url: &str, username: &str, email: Option<&str>) -> Result<()> {
    let db = connect(database_url).await?;
    let user = compute::users::create_user(&db, username, email).await?;
    println!("Created user #{} {}", user.id, user.username);
    Ok(())
}
