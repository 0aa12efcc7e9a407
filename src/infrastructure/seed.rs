use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use crate::domain::Role;
use crate::infrastructure::auth::hash_password;
use crate::infrastructure::config::Config;
use crate::models::{membership_plan, user};

/// (name, description, price in cents, duration in days)
const DEFAULT_PLANS: &[(&str, &str, i64, i32)] = &[
    ("Annual Membership", "Full membership for twelve months", 12_000, 365),
    ("Student Membership", "Discounted yearly membership for students", 3_000, 365),
    ("Quarterly Membership", "Three months of membership", 3_500, 90),
];

/// Creates the configured admin account, and demo plans when `SEED_DEMO` is set.
/// Safe to run on every start: existing rows are left untouched.
pub async fn seed(db: &DatabaseConnection, config: &Config) -> Result<(), DbErr> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        seed_admin(db, email, password).await?;
    } else if config.seed_demo {
        seed_admin(db, "admin@societyhub.local", "admin").await?;
    }

    if config.seed_demo {
        seed_plans(db).await?;
    }

    Ok(())
}

pub async fn seed_admin(db: &DatabaseConnection, email: &str, password: &str) -> Result<(), DbErr> {
    let password_hash = hash_password(password).map_err(DbErr::Custom)?;
    let now = chrono::Utc::now().to_rfc3339();

    let admin = user::ActiveModel {
        email: Set(email.trim().to_lowercase()),
        password_hash: Set(password_hash),
        first_name: Set("Site".to_owned()),
        last_name: Set("Administrator".to_owned()),
        role: Set(Role::Admin.as_str().to_owned()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let inserted = user::Entity::insert(admin)
        .on_conflict(OnConflict::column(user::Column::Email).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    if inserted > 0 {
        tracing::info!("Seeded admin account {}", email);
    }
    Ok(())
}

pub async fn seed_plans(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    for (name, description, price_cents, duration_days) in DEFAULT_PLANS {
        let plan = membership_plan::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            price_cents: Set(*price_cents),
            currency: Set("USD".to_owned()),
            duration_days: Set(*duration_days),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };

        membership_plan::Entity::insert(plan)
            .on_conflict(
                OnConflict::column(membership_plan::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    tracing::debug!("Default membership plans ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::init_db;

    #[tokio::test]
    async fn seeding_twice_is_harmless() {
        let db = init_db("sqlite::memory:").await.unwrap();
        let config = Config {
            seed_demo: true,
            ..Config::default()
        };

        seed(&db, &config).await.unwrap();
        seed(&db, &config).await.unwrap();

        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(
            membership_plan::Entity::find().count(&db).await.unwrap(),
            DEFAULT_PLANS.len() as u64
        );
    }
}
