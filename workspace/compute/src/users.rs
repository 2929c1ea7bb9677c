use model::entities::user;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};

use crate::error::{ComputeError, Result};

/// Registers a user that recurring expenses can belong to.
#[instrument(skip(db))]
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    email: Option<&str>,
) -> Result<user::Model> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ComputeError::InvalidArgument("username must not be empty".to_string()));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ComputeError::InvalidArgument(format!(
            "user {} already exists",
            username
        )));
    }

    let created = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.map(str::to_string)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = created.id, "Created user");
    Ok(created)
}
