use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    claims::Role,
    dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest, UpdateProfileRequest},
    gate::Identity,
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_against_dummy, verify_password_blocking},
    repo::{CredentialStore, StoreError},
    repo_types::{NewUser, User, UserChanges},
};
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

// Same text for unknown email and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated(INVALID_CREDENTIALS.into())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    Ok(username.to_string())
}

fn validate_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Validates, hashes and inserts a credential with the given role.
/// Duplicate username or email is a conflict, whether caught by the
/// pre-check or by the store's unique constraint under a race.
pub(crate) async fn create_user(
    store: &dyn CredentialStore,
    username: &str,
    email: &str,
    password: String,
    role: Role,
) -> Result<User, AppError> {
    let username = validate_username(username)?;
    let email = validate_email(email)?;
    validate_password(&password)?;

    if store.find_conflicting(&username, &email).await?.is_some() {
        warn!(%email, %username, "user already exists");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let digest = hash_password_blocking(password).await?;
    let user = store
        .insert(NewUser {
            username,
            email,
            password: digest,
            role,
        })
        .await?;
    Ok(user)
}

/// Public registration. Always creates a plain `user`.
pub async fn register(
    store: &dyn CredentialStore,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let user = create_user(store, &req.username, &req.email, req.password, Role::User).await?;
    let token = keys.issue(user.id, user.role)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(AuthResponse {
        success: true,
        message: "User registered successfully",
        token,
        user: user.into(),
    })
}

/// Received -> looked up by email -> password verified -> token issued.
/// Every failed step after input validation ends in the same 401.
pub async fn login(
    store: &dyn CredentialStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let user = match store.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(%email, "login unknown email");
            verify_against_dummy(req.password).await;
            return Err(invalid_credentials());
        }
    };

    let ok = verify_password_blocking(req.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let token = keys.issue(user.id, user.role)?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(AuthResponse {
        success: true,
        message: "Login successful",
        token,
        user: user.into(),
    })
}

/// The identity behind a verified token. A token for a deleted user is
/// treated as unauthenticated.
pub async fn current_user(
    store: &dyn CredentialStore,
    identity: &Identity,
) -> Result<PublicUser, AppError> {
    store
        .find_by_id(identity.user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| AppError::Unauthenticated("User not found".into()))
}

pub async fn update_profile(
    store: &dyn CredentialStore,
    identity: &Identity,
    req: UpdateProfileRequest,
) -> Result<PublicUser, AppError> {
    let user = store
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("User not found".into()))?;

    let mut changes = UserChanges {
        username: req.username.as_deref().map(validate_username).transpose()?,
        email: req.email.as_deref().map(validate_email).transpose()?,
        password: None,
    };

    if let Some(new_password) = req.new_password {
        validate_password(&new_password)?;
        let current = req
            .current_password
            .ok_or_else(|| AppError::validation("Current password is required"))?;
        if !verify_password_blocking(current, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "profile update with wrong current password");
            return Err(invalid_credentials());
        }
        changes.password = Some(hash_password_blocking(new_password).await?);
    }

    if changes.is_empty() {
        return Ok(user.into());
    }

    let password_changed = changes.password.is_some();
    let updated = store.update(user.id, changes).await.map_err(|e| match e {
        StoreError::Conflict(field) => AppError::Conflict(format!("That {field} is already taken")),
        other => other.into(),
    })?;
    info!(user_id = %updated.id, password_changed, "profile updated");
    Ok(updated.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::test_keys, repo::memory::MemoryCredentialStore};

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no at sign"));
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[tokio::test]
    async fn register_creates_plain_user_with_token() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        let res = register(&store, &keys, register_req(" alice ", "A@X.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(res.user.username, "alice");
        assert_eq!(res.user.email, "a@x.com");
        assert_eq!(res.user.role, Role::User);
        let claims = keys.verify(&res.token).unwrap();
        assert_eq!(claims.sub, res.user.id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        for req in [
            register_req("", "a@x.com", "secret1"),
            register_req("alice", "not-an-email", "secret1"),
            register_req("alice", "a@x.com", "short"),
        ] {
            let err = register(&store, &keys, req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn register_duplicate_is_conflict() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let err = register(&store, &keys, register_req("alice", "b@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();

        let unknown = login(&store, &keys, login_req("nobody@x.com", "secret1"))
            .await
            .unwrap_err();
        let wrong = login(&store, &keys, login_req("a@x.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(wrong.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn login_succeeds_with_right_password() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let res = login(&store, &keys, login_req("A@x.com ", "secret1")).await.unwrap();
        assert_eq!(res.user.username, "alice");
        assert!(keys.verify(&res.token).is_ok());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let store = MemoryCredentialStore::default();
        let err = login(&store, &test_keys("s"), login_req("", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_user_can_provision_admin() {
        let store = MemoryCredentialStore::default();
        let admin = create_user(&store, "root", "root@x.com", "rootpass".into(), Role::Admin)
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn profile_update_without_new_password_keeps_hash() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        let res = register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let identity = Identity { user_id: res.user.id, role: Role::User };
        let before = store.find_by_id(identity.user_id).await.unwrap().unwrap();

        let updated = update_profile(
            &store,
            &identity,
            UpdateProfileRequest {
                username: Some("alice-b".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.username, "alice-b");

        let after = store.find_by_id(identity.user_id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn profile_password_change_requires_current_password() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        let res = register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let identity = Identity { user_id: res.user.id, role: Role::User };

        let err = update_profile(
            &store,
            &identity,
            UpdateProfileRequest {
                current_password: Some("nope".into()),
                new_password: Some("newsecret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);

        update_profile(
            &store,
            &identity,
            UpdateProfileRequest {
                current_password: Some("secret1".into()),
                new_password: Some("newsecret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(login(&store, &keys, login_req("a@x.com", "secret1")).await.is_err());
        assert!(login(&store, &keys, login_req("a@x.com", "newsecret")).await.is_ok());
    }

    #[tokio::test]
    async fn profile_update_reports_which_field_is_taken() {
        let store = MemoryCredentialStore::default();
        let keys = test_keys("s");
        register(&store, &keys, register_req("alice", "a@x.com", "secret1"))
            .await
            .unwrap();
        let bob = register(&store, &keys, register_req("bob", "b@x.com", "secret1"))
            .await
            .unwrap();
        let identity = Identity { user_id: bob.user.id, role: Role::User };

        let err = update_profile(
            &store,
            &identity,
            UpdateProfileRequest {
                email: Some("a@x.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "That email is already taken");

        let err = update_profile(
            &store,
            &identity,
            UpdateProfileRequest {
                username: Some("alice".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "That username is already taken");
    }

    #[tokio::test]
    async fn current_user_for_deleted_account_is_unauthenticated() {
        let store = MemoryCredentialStore::default();
        let identity = Identity { user_id: uuid::Uuid::new_v4(), role: Role::Admin };
        let err = current_user(&store, &identity).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
