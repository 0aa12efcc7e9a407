//! Account registration and login.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::domain::{validation, DomainError, FieldErrors, Role, NON_FIELD_ERRORS};
use crate::infrastructure::auth::{create_jwt, hash_password, verify_password};
use crate::models::user::{self, Entity as User, UserDto};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,
    pub user: UserDto,
}

fn issue_token(model: user::Model) -> Result<AuthPayload, DomainError> {
    let token = create_jwt(model.id, &model.email, &model.role).map_err(DomainError::Internal)?;
    Ok(AuthPayload {
        token,
        user: UserDto::from(model),
    })
}

pub async fn register(
    db: &DatabaseConnection,
    request: RegisterRequest,
) -> Result<AuthPayload, DomainError> {
    let email = request.email.trim().to_lowercase();

    let mut errors = FieldErrors::new();
    validation::email(&mut errors, "email", &email);
    validation::required_text(&mut errors, "firstName", &request.first_name, 100);
    validation::required_text(&mut errors, "lastName", &request.last_name, 100);
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters long.", MIN_PASSWORD_LEN),
        );
    }

    if !errors.contains("email")
        && User::find()
            .filter(user::Column::Email.eq(&email))
            .one(db)
            .await?
            .is_some()
    {
        errors.add("email", "A user with this email already exists.");
    }
    errors.into_result()?;

    let password_hash = hash_password(&request.password).map_err(DomainError::Internal)?;
    let now = super::now();

    let model = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(request.first_name.trim().to_string()),
        last_name: Set(request.last_name.trim().to_string()),
        role: Set(Role::Member.as_str().to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Registered user {} ({})", model.id, model.email);
    issue_token(model)
}

pub async fn login(
    db: &DatabaseConnection,
    request: LoginRequest,
) -> Result<AuthPayload, DomainError> {
    let email = request.email.trim().to_lowercase();
    let invalid = || DomainError::field(NON_FIELD_ERRORS, "Invalid email or password.");

    let Some(model) = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
    else {
        return Err(invalid());
    };

    let matches = verify_password(&request.password, &model.password_hash).unwrap_or(false);
    if !matches {
        tracing::debug!("Failed login for {}", email);
        return Err(invalid());
    }
    if !model.is_active {
        return Err(DomainError::field(NON_FIELD_ERRORS, "This account is inactive."));
    }

    issue_token(model)
}

pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model, DomainError> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}
