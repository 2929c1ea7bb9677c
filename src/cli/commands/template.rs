use anyhow::Result;
use chrono::{Local, NaiveDate};
use compute::occurrence::parse_recurrence_unit;
use compute::template::{self, parse_payment_method, NewTemplate};
use model::entities::recurring_expense;
use rust_decimal::Decimal;

use crate::config::connect;

/// Command line input for a new recurring expense.
#[derive(Debug, Clone)]
pub struct NewTemplateArgs {
    pub user_id: i32,
    pub category: String,
    pub amount: Decimal,
    pub unit: String,
    pub interval: i32,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub description: Option<String>,
}

impl NewTemplateArgs {
    fn into_new_template(self, today: NaiveDate) -> Result<NewTemplate> {
        Ok(NewTemplate {
            user_id: self.user_id,
            category: self.category,
            amount: self.amount,
            payment_method: self
                .payment_method
                .as_deref()
                .map(parse_payment_method)
                .transpose()?,
            description: self.description,
            recurrence_unit: parse_recurrence_unit(&self.unit)?,
            interval: self.interval,
            first_occurrence: self.start.unwrap_or(today),
            end_date: self.end,
        })
    }
}

pub async fn add_template(database_url: &str, args: NewTemplateArgs) -> Result<()> {
    let new_template = args.into_new_template(Local::now().date_naive())?;
    let db = connect(database_url).await?;
    let created = template::create_template(&db, new_template).await?;
    println!("Created recurring expense {}", describe(&created));
    Ok(())
}

pub async fn list_templates(database_url: &str, only_active: bool) -> Result<()> {
    let db = connect(database_url).await?;
    for template in template::list_templates(&db, only_active).await? {
        println!("{}", describe(&template));
    }
    Ok(())
}

pub async fn deactivate(database_url: &str, id: i32) -> Result<()> {
    let db = connect(database_url).await?;
    let template = template::deactivate_template(&db, id).await?;
    println!("Deactivated recurring expense {}", describe(&template));
    Ok(())
}

fn describe(template: &recurring_expense::Model) -> String {
    let next = template
        .next_occurrence_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let end = template
        .end_date
        .map(|d| format!(" until {}", d))
        .unwrap_or_default();
    format!(
        "#{} user {} {} {} every {} {:?}{} next {}{}",
        template.id,
        template.user_id,
        template.category,
        template.amount,
        template.interval,
        template.recurrence_unit,
        end,
        next,
        if template.active { "" } else { " (inactive)" }
    )
}
