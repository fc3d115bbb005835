use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

/// An Argon2 PHC string. Only constructible by hashing a plaintext, so stores
/// can never be handed an unhashed password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<PasswordDigest> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(PasswordDigest(hash))
}

/// `Ok(false)` on mismatch; errors only when the stored hash can't be parsed.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// Argon2 is CPU-bound; these run it on the blocking pool.

pub async fn hash_password_blocking(plain: String) -> anyhow::Result<PasswordDigest> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task panicked")?
}

pub async fn verify_password_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("verify task panicked")?
}

lazy_static! {
    static ref DUMMY_HASH: Option<String> =
        hash_password("timing-equalizer").ok().map(PasswordDigest::into_inner);
}

/// Builds the dummy hash up front so the first unknown-email login doesn't
/// also pay for hashing. Fails if it can't be built.
pub fn prepare_dummy_hash() -> anyhow::Result<()> {
    anyhow::ensure!(DUMMY_HASH.is_some(), "could not build login timing hash");
    Ok(())
}

/// Burns one verification so an unknown email costs as much as a wrong password.
pub async fn verify_against_dummy(plain: String) {
    if let Some(hash) = DUMMY_HASH.clone() {
        let _ = verify_password_blocking(plain, hash).await;
    }
}
