use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use bazaar_types::api::ErrorResponse;

/// Failure taxonomy shared by every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Expired,
    Auth,
    Dependency,
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("password must be at least 8 characters")]
    WeakPassword,

    #[error("government id must be exactly 11 digits")]
    InvalidGovernmentId,

    #[error("birth date must be in the past")]
    FutureBirthDate,

    #[error("message body must not be empty")]
    EmptyBody,

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("government id is already registered")]
    DuplicateGovernmentId,

    #[error("identity already has a seller profile")]
    AlreadySeller,

    #[error("identity is already verified")]
    AlreadyVerified,

    #[error("a chat with this seller already exists")]
    DuplicateChat { chat_id: Uuid },

    #[error("identity is still referenced and cannot be deleted")]
    IdentityInUse,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid or expired confirmation code")]
    Expired,

    #[error("account is not active, confirm your email first")]
    Inactive,

    #[error("invalid credentials")]
    InvalidCredential,

    #[error("missing, invalid or expired token")]
    InvalidToken,

    #[error("not allowed")]
    Forbidden,

    #[error("cannot open a chat with your own seller profile")]
    SelfChat,

    #[error("failed to send confirmation email: {0}")]
    MailDispatch(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable machine-readable kind returned to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::WeakPassword => "weak_password",
            Self::InvalidGovernmentId => "invalid_government_id",
            Self::FutureBirthDate => "future_birth_date",
            Self::EmptyBody => "empty_body",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateGovernmentId => "duplicate_government_id",
            Self::AlreadySeller => "already_seller",
            Self::AlreadyVerified => "already_verified",
            Self::DuplicateChat { .. } => "duplicate_chat",
            Self::IdentityInUse => "identity_in_use",
            Self::NotFound(_) => "not_found",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::InvalidCredential => "invalid_credential",
            Self::InvalidToken => "invalid_token",
            Self::Forbidden => "forbidden",
            Self::SelfChat => "self_chat",
            Self::MailDispatch(_) => "mail_dispatch_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_)
            | Self::WeakPassword
            | Self::InvalidGovernmentId
            | Self::FutureBirthDate
            | Self::EmptyBody => ErrorCategory::Validation,
            Self::DuplicateEmail
            | Self::DuplicateGovernmentId
            | Self::AlreadySeller
            | Self::AlreadyVerified
            | Self::DuplicateChat { .. }
            | Self::IdentityInUse => ErrorCategory::Conflict,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Expired => ErrorCategory::Expired,
            Self::Inactive
            | Self::InvalidCredential
            | Self::InvalidToken
            | Self::Forbidden
            | Self::SelfChat => ErrorCategory::Auth,
            Self::MailDispatch(_) => ErrorCategory::Dependency,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Conflicts, expiry, login failures and mail dispatch all surface as 400.
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        if matches!(self, Self::MailDispatch(_)) {
            warn!("Request failed on mail dispatch: {}", message);
        }

        let chat_id = match &self {
            Self::DuplicateChat { chat_id } => Some(*chat_id),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.kind().to_string(),
                message,
                chat_id,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_boundary_contract() {
        assert_eq!(CoreError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(CoreError::Expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(CoreError::Inactive.status(), StatusCode::BAD_REQUEST);
        assert_eq!(CoreError::NotFound("chat").status(), StatusCode::NOT_FOUND);
        assert_eq!(CoreError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(CoreError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            CoreError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn categories_group_kinds() {
        let chat_id = Uuid::new_v4();
        assert_eq!(CoreError::DuplicateChat { chat_id }.category(), ErrorCategory::Conflict);
        assert_eq!(CoreError::AlreadySeller.category(), ErrorCategory::Conflict);
        assert_eq!(CoreError::WeakPassword.category(), ErrorCategory::Validation);
        assert_eq!(CoreError::MailDispatch("down".into()).category(), ErrorCategory::Dependency);
        assert_eq!(CoreError::Forbidden.category(), ErrorCategory::Auth);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = CoreError::Internal(anyhow::anyhow!("disk full at /var/db"));
        assert_eq!(err.kind(), "internal_error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
