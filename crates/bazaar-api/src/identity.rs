//! Identity lifecycle: Unverified → Verified → (optionally) Seller.
//!
//! The state is persisted as the `active` and `role` flags, but every change
//! goes through [`IdentityState::apply`], which is the only place that
//! decides whether a transition is legal. Each legal transition produces an
//! [`IdentityEvent`] that is written to the audit table in the same
//! transaction as the flags.

use tracing::{error, info, warn};
use uuid::Uuid;

use bazaar_db::models::UserRow;
use bazaar_db::queries::users::{
    delete_user, insert_identity_event, insert_user, query_user_by_email, query_user_by_id,
    update_password, update_user_state,
};
use bazaar_db::rusqlite::Connection;
use bazaar_db::{Database, is_constraint_violation};
use bazaar_types::events::IdentityEvent;
use bazaar_types::models::{Role, User};

use crate::codes;
use crate::convert::{parse_role, user_from_row};
use crate::error::CoreError;
use crate::password::{hash_password, placeholder_credential, validate_password};
use crate::sessions::{Session, SessionIssuer};
use crate::{AppState, run_blocking};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    Unverified,
    Verified,
    Seller,
}

/// A requested change to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Confirm,
    SetPassword,
    Elevate { seller_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<IdentityState>,
    pub to: IdentityState,
    pub event: IdentityEvent,
}

impl IdentityState {
    pub fn from_flags(active: bool, role: Role) -> Self {
        match (active, role) {
            (false, _) => IdentityState::Unverified,
            (true, Role::Normal) => IdentityState::Verified,
            (true, Role::Seller) => IdentityState::Seller,
        }
    }

    pub fn of(user: &UserRow) -> Self {
        let role = parse_role(&user.role);
        if !user.active && role == Role::Seller {
            error!("Identity {} is inactive but holds the seller role", user.id);
        }
        Self::from_flags(user.active, role)
    }

    pub fn flags(self) -> (bool, Role) {
        match self {
            IdentityState::Unverified => (false, Role::Normal),
            IdentityState::Verified => (true, Role::Normal),
            IdentityState::Seller => (true, Role::Seller),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdentityState::Unverified => "unverified",
            IdentityState::Verified => "verified",
            IdentityState::Seller => "seller",
        }
    }

    pub fn ensure_can_login(self) -> Result<(), CoreError> {
        match self {
            IdentityState::Unverified => Err(CoreError::Inactive),
            IdentityState::Verified | IdentityState::Seller => Ok(()),
        }
    }

    /// Decide whether `command` is legal from this state and, if so, which
    /// state and event it produces.
    pub fn apply(self, user_id: Uuid, command: Command) -> Result<Transition, CoreError> {
        let (to, event) = match (self, command) {
            (IdentityState::Unverified, Command::Confirm) => {
                (IdentityState::Verified, IdentityEvent::Confirmed { user_id })
            }
            (_, Command::Confirm) => return Err(CoreError::AlreadyVerified),

            (IdentityState::Unverified, Command::SetPassword) => {
                (IdentityState::Verified, IdentityEvent::PasswordSet { user_id })
            }
            (state, Command::SetPassword) => (state, IdentityEvent::PasswordSet { user_id }),

            (IdentityState::Verified, Command::Elevate { seller_id }) => (
                IdentityState::Seller,
                IdentityEvent::ElevatedToSeller { user_id, seller_id },
            ),
            (IdentityState::Unverified, Command::Elevate { .. }) => return Err(CoreError::Inactive),
            (IdentityState::Seller, Command::Elevate { .. }) => return Err(CoreError::AlreadySeller),
        };

        Ok(Transition {
            from: Some(self),
            to,
            event,
        })
    }
}

/// Persist the target flags and the audit event for a transition.
pub(crate) fn record_transition(conn: &Connection, transition: &Transition) -> anyhow::Result<()> {
    let user_id = transition.event.user_id().to_string();
    let (active, role) = transition.to.flags();

    update_user_state(conn, &user_id, active, role.as_str())?;
    insert_identity_event(
        conn,
        &user_id,
        transition.event.name(),
        transition.from.map(IdentityState::as_str),
        transition.to.as_str(),
    )?;

    info!(
        "Identity {} {}: {} -> {}",
        user_id,
        transition.event.name(),
        transition.from.map(IdentityState::as_str).unwrap_or("none"),
        transition.to.as_str()
    );
    Ok(())
}

/// Apply `command` to the stored identity and persist the outcome.
pub(crate) fn transition(
    conn: &Connection,
    user: &UserRow,
    command: Command,
) -> Result<Transition, CoreError> {
    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt identity id '{}': {}", user.id, e))?;
    let transition = IdentityState::of(user).apply(user_id, command)?;
    record_transition(conn, &transition)?;
    Ok(transition)
}

pub(crate) fn load_user(conn: &Connection, user_id: &str) -> Result<UserRow, CoreError> {
    query_user_by_id(conn, user_id)?.ok_or(CoreError::NotFound("identity"))
}

/// Trim and lowercase, then check the address has a plausible shape.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(CoreError::InvalidInput("a valid email is required".into()));
    }
    Ok(email)
}

// -- Registration --

/// Result of inserting an unverified identity: its id and the code to mail.
#[derive(Debug)]
pub struct PendingRegistration {
    pub user_id: Uuid,
    pub code: String,
}

/// Insert an Unverified identity and its first confirmation code.
pub fn create_unverified(
    db: &Database,
    email: &str,
    name: &str,
    password: Option<&str>,
) -> Result<PendingRegistration, CoreError> {
    let email = normalize_email(email)?;
    let (credential, password_set) = match password {
        Some(p) => {
            validate_password(p)?;
            (hash_password(p)?, true)
        }
        None => (placeholder_credential(), false),
    };

    let user_id = Uuid::new_v4();
    let id = user_id.to_string();

    let code = db.with_tx(|tx| {
        if query_user_by_email(tx, &email)?.is_some() {
            return Err(CoreError::DuplicateEmail);
        }

        insert_user(tx, &id, &email, name, &credential, password_set).map_err(|e| {
            if is_constraint_violation(&e) {
                CoreError::DuplicateEmail
            } else {
                CoreError::Internal(e)
            }
        })?;

        record_transition(
            tx,
            &Transition {
                from: None,
                to: IdentityState::Unverified,
                event: IdentityEvent::Registered { user_id },
            },
        )?;

        Ok::<_, CoreError>(codes::issue(tx, &id)?)
    })?;

    Ok(PendingRegistration { user_id, code })
}

/// Compensating undo for a registration whose code could not be delivered.
/// Codes and audit events cascade with the identity.
pub fn rollback_registration(db: &Database, user_id: Uuid) -> Result<(), CoreError> {
    let deleted = db.with_conn(|conn| delete_user(conn, &user_id.to_string()))?;
    if !deleted {
        warn!("Rollback found no identity {}", user_id);
    }
    Ok(())
}

/// Register an identity and mail its confirmation code. When dispatch fails
/// the identity is removed again and the whole registration fails.
pub async fn register(
    state: &AppState,
    email: &str,
    name: &str,
    password: Option<String>,
) -> Result<Uuid, CoreError> {
    let email = normalize_email(email)?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::InvalidInput("name is required".into()));
    }
    if let Some(p) = &password {
        validate_password(p)?;
    }

    let pending = {
        let state = state.clone();
        let (email, name) = (email.clone(), name.clone());
        run_blocking(move || create_unverified(&state.db, &email, &name, password.as_deref())).await?
    };

    if let Err(e) = state
        .notifier
        .send_confirmation_code(&email, &name, &pending.code)
        .await
    {
        warn!("Mail dispatch failed for {}, rolling back registration: {:#}", email, e);

        let user_id = pending.user_id;
        let st = state.clone();
        if let Err(rollback) = run_blocking(move || rollback_registration(&st.db, user_id)).await {
            error!("Failed to roll back registration {}: {}", user_id, rollback);
        }
        return Err(CoreError::MailDispatch(e.to_string()));
    }

    info!("Registered {} ({})", email, pending.user_id);
    Ok(pending.user_id)
}

// -- Confirmation --

/// Redeem a code and flip the identity to Verified. Runs in one transaction:
/// if the transition is illegal the code stays unused.
pub fn confirm(db: &Database, code: &str, email: &str) -> Result<Uuid, CoreError> {
    let email = normalize_email(email)?;
    let code = code.trim();

    db.with_tx(|tx| {
        let user_id = codes::redeem(tx, code, &email)?;
        let user = load_user(tx, &user_id)?;
        let transition = transition(tx, &user, Command::Confirm)?;
        Ok(transition.event.user_id())
    })
}

// -- Passwords --

/// Set the password and log the identity in.
///
/// A code is needed unless the identity is Verified and never set a real
/// password (the deferred-registration path, whose id comes back from
/// `confirm`). An Unverified identity may redeem its confirmation code here,
/// which verifies it in the same transaction. An identity with a password is
/// resetting it and must redeem a code sent to its email.
pub fn set_password(
    db: &Database,
    issuer: &SessionIssuer,
    user_id: Uuid,
    password: &str,
    confirmation_code: Option<&str>,
) -> Result<Session, CoreError> {
    validate_password(password)?;
    let hash = hash_password(password)?;

    db.with_tx(|tx| {
        let user = load_user(tx, &user_id.to_string())?;

        let needs_code = user.password_set || IdentityState::of(&user) == IdentityState::Unverified;
        if needs_code {
            let Some(code) = confirmation_code else {
                return Err(if user.password_set {
                    CoreError::Forbidden
                } else {
                    CoreError::Inactive
                });
            };
            codes::redeem(tx, code.trim(), &user.email)?;
        }

        update_password(tx, &user.id, &hash)?;
        let transition = transition(tx, &user, Command::SetPassword)?;

        let (_, role) = transition.to.flags();
        issuer.issue(tx, user_id, &user.email, role)
    })
}

/// Issue a reset code for an existing identity and mail it.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), CoreError> {
    let email = normalize_email(email)?;

    let (name, code) = {
        let state = state.clone();
        let email = email.clone();
        run_blocking(move || {
            state.db.with_tx(|tx| {
                let user = query_user_by_email(tx, &email)?.ok_or(CoreError::NotFound("identity"))?;
                let code = codes::issue(tx, &user.id)?;
                Ok::<_, CoreError>((user.name, code))
            })
        })
        .await?
    };

    state
        .notifier
        .send_confirmation_code(&email, &name, &code)
        .await
        .map_err(|e| CoreError::MailDispatch(e.to_string()))?;

    info!("Password reset code issued for {}", email);
    Ok(())
}

// -- Reads and deletion --

pub fn get_identity(db: &Database, user_id: Uuid) -> Result<User, CoreError> {
    let user = db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(CoreError::NotFound("identity"))?;
    Ok(user_from_row(&user))
}

/// Delete an identity. Refused while seller profiles, chats or messages
/// still reference it.
pub fn delete_identity(db: &Database, user_id: Uuid) -> Result<(), CoreError> {
    let deleted = db
        .with_conn(|conn| delete_user(conn, &user_id.to_string()))
        .map_err(|e| {
            if is_constraint_violation(&e) {
                CoreError::IdentityInUse
            } else {
                CoreError::Internal(e)
            }
        })?;

    if !deleted {
        return Err(CoreError::NotFound("identity"));
    }
    info!("Identity {} deleted", user_id);
    Ok(())
}
