use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use super::AppState;
use crate::error::ApiError;

/// The user a request acts for. Until real authentication exists this is
/// the configured `DUMMY_USER_ID`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.user_id.clone().map(CurrentUser).ok_or_else(|| {
            ApiError::Internal(
                "DUMMY_USER_ID not set in .env for testing. Please configure it.".to_string(),
            )
        })
    }
}

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let message = rejection.body_text();
    if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
        ApiError::Validation(message)
    } else {
        ApiError::BadRequest(message)
    }
}
