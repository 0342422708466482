//! Registration, login and self-profile handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::instrument;

use crate::error::ServiceError;
use crate::http::error::{ApiError, Message, SuccessResponse};
use crate::http::middleware::AuthUser;
use crate::http::state::AppState;
use crate::user::validation::{FieldErrors, MIN_PASSWORD_LEN};
use crate::user::User;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

impl CreateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .required("username", &self.username)
            .required("password", &self.password)
            .min_len("password", &self.password, MIN_PASSWORD_LEN)
            .strong_password("password", &self.password)
            .required("display_name", &self.display_name)
            .required("email", &self.email)
            .email("email", &self.email);
        errors.into_result().map_err(ApiError::Validation)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .required("username", &self.username)
            .required("password", &self.password)
            .min_len("password", &self.password, MIN_PASSWORD_LEN);
        errors.into_result().map_err(ApiError::Validation)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .required("display_name", &self.display_name)
            .required("email", &self.email)
            .email("email", &self.email);
        errors.into_result().map_err(ApiError::Validation)
    }
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `POST /v1/users/register`
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse<User>>), ApiError> {
    let input = parse_body(body)?;
    input.validate()?;

    let user = state
        .users
        .create_user(&input.username, &input.password, &input.display_name, &input.email)
        .await
        .map_err(|e| match e {
            ServiceError::Duplicate(_) => {
                ApiError::BadRequest("username or email already exists".to_string())
            }
            other => other.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            data: user,
            message: "Register an user successfully!",
        }),
    ))
}

/// `POST /v1/users/login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse<String>>, ApiError> {
    let input = parse_body(body)?;
    input.validate()?;

    let token = state.users.login(&input.username, &input.password).await?;

    Ok(Json(SuccessResponse {
        data: token,
        message: "Logged in successfully!",
    }))
}

/// `GET /v1/self/info`
#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SuccessResponse<User>>, ApiError> {
    let profile = state
        .users
        .get_user_by_id(&user.user_id)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound => ApiError::Unauthorized,
            other => other.into(),
        })?;

    Ok(Json(SuccessResponse {
        data: profile,
        message: "User profile retrieved successfully!",
    }))
}

/// `PUT /v1/self/info`
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let input = parse_body(body)?;
    input.validate()?;

    state
        .users
        .update_user_by_id(&user.user_id, &input.display_name, &input.email)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound => ApiError::Unauthorized,
            ServiceError::Duplicate(_) => ApiError::BadRequest("email already exists".to_string()),
            other => other.into(),
        })?;

    Ok(Json(Message::new("Edit current user successfully!")))
}
