use crate::db::{AttendanceStore, AuditAction};
use crate::error::AttendanceError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Decides whether an admin credential is acceptable.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, password: &str) -> bool;
}

/// Single shared admin password, compared by SHA-256 digest in constant time.
pub struct PasswordAuthenticator {
    expected: [u8; 32],
}

impl PasswordAuthenticator {
    pub fn new(password: &str) -> Self {
        Self {
            expected: digest(password),
        }
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self, password: &str) -> bool {
        bool::from(digest(password).as_slice().ct_eq(self.expected.as_slice()))
    }
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Login flow: authenticator decision plus audit trail.
#[derive(Clone)]
pub struct AdminAuth {
    authenticator: Arc<dyn Authenticator>,
    store: AttendanceStore,
}

impl AdminAuth {
    pub fn new(authenticator: Arc<dyn Authenticator>, store: AttendanceStore) -> Self {
        Self {
            authenticator,
            store,
        }
    }

    pub async fn login(&self, password: &str) -> Result<(), AttendanceError> {
        if self.authenticator.authenticate(password) {
            self.store
                .log_action(AuditAction::Login, "Admin logged in")
                .await?;
            info!("admin login succeeded");
            Ok(())
        } else {
            self.store
                .log_action(AuditAction::LoginFailed, "Invalid admin password")
                .await?;
            warn!("admin login rejected");
            Err(AttendanceError::AuthFailure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_authenticator_accepts_only_the_configured_password() {
        let auth = PasswordAuthenticator::new("admin123");
        assert!(auth.authenticate("admin123"));
        assert!(!auth.authenticate("admin1234"));
        assert!(!auth.authenticate(""));
    }
}
