//! Creating, listing and retiring recurring expense templates.

use chrono::NaiveDate;
use model::entities::expense::PaymentMethod;
use model::entities::recurring_expense::{self, RecurrenceUnit};
use model::entities::user;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    Unchanged,
};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError};

use crate::error::{ComputeError, Result};

/// Input for a new recurring expense template.
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_schedule_window"))]
pub struct NewTemplate {
    pub user_id: i32,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub recurrence_unit: RecurrenceUnit,
    #[validate(range(min = 1, max = 1000))]
    pub interval: i32,
    /// Date of the first occurrence; becomes the template's cursor.
    pub first_occurrence: NaiveDate,
    /// Last allowed occurrence, inclusive.
    pub end_date: Option<NaiveDate>,
}

fn validate_positive_amount(amount: &Decimal) -> std::result::Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_not_positive"))
    }
}

fn validate_schedule_window(template: &NewTemplate) -> std::result::Result<(), ValidationError> {
    match template.end_date {
        Some(end) if end < template.first_occurrence => {
            Err(ValidationError::new("end_date_before_first_occurrence"))
        }
        _ => Ok(()),
    }
}

/// Validates and stores a new, active template.
#[instrument(skip(db, template), fields(user_id = template.user_id, category = %template.category))]
pub async fn create_template(
    db: &DatabaseConnection,
    template: NewTemplate,
) -> Result<recurring_expense::Model> {
    template.validate()?;

    if user::Entity::find_by_id(template.user_id).one(db).await?.is_none() {
        warn!("Refusing to create a recurring expense for an unknown user");
        return Err(ComputeError::OwnerNotFound(template.user_id));
    }

    let created = recurring_expense::ActiveModel {
        user_id: Set(template.user_id),
        category: Set(template.category),
        amount: Set(template.amount),
        payment_method: Set(template.payment_method),
        description: Set(template.description),
        recurrence_unit: Set(template.recurrence_unit),
        interval: Set(template.interval),
        next_occurrence_date: Set(Some(template.first_occurrence)),
        end_date: Set(template.end_date),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(template_id = created.id, "Created recurring expense");
    Ok(created)
}

/// All templates ordered by id, optionally only the active ones.
pub async fn list_templates(
    db: &DatabaseConnection,
    only_active: bool,
) -> Result<Vec<recurring_expense::Model>> {
    let mut query = recurring_expense::Entity::find();
    if only_active {
        query = query.filter(recurring_expense::Column::Active.eq(true));
    }
    Ok(query
        .order_by_asc(recurring_expense::Column::Id)
        .all(db)
        .await?)
}

/// Stops a template from generating further expenses. Its history is kept.
#[instrument(skip(db))]
pub async fn deactivate_template(
    db: &DatabaseConnection,
    template_id: i32,
) -> Result<recurring_expense::Model> {
    if recurring_expense::Entity::find_by_id(template_id)
        .one(db)
        .await?
        .is_none()
    {
        return Err(ComputeError::TemplateNotFound(template_id));
    }

    let updated = recurring_expense::ActiveModel {
        id: Unchanged(template_id),
        active: Set(false),
        ..Default::default()
    }
    .update(db)
    .await?;

    info!("Deactivated recurring expense");
    Ok(updated)
}

/// Parses a payment method such as `credit-card` or `BANK_TRANSFER`.
pub fn parse_payment_method(value: &str) -> Result<PaymentMethod> {
    match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
        "CASH" => Ok(PaymentMethod::Cash),
        "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
        "DEBIT_CARD" => Ok(PaymentMethod::DebitCard),
        "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
        "DIGITAL_WALLET" => Ok(PaymentMethod::DigitalWallet),
        "OTHER" => Ok(PaymentMethod::Other),
        _ => Err(ComputeError::InvalidArgument(format!(
            "unknown payment method: {}",
            value
        ))),
    }
}
