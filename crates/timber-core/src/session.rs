//! ============================================================================
//! Session - Identity and role state machine
//! ============================================================================
//! Anonymous ──sign in──▶ RolePending ──select role──▶ RoleAssigned
//!     ▲                                                     │
//!     └────────────────────────logout───────────────────────┘
//!
//! A sign-in that already carries a role (a simulated hunter or landowner,
//! or a returning remote account) lands directly in RoleAssigned.
//! Subscribers receive every change of the current user through a watch
//! channel; dropping the receiver unsubscribes.
//! ============================================================================

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{Backend, RemoteUser};
use crate::config::Connection;
use crate::db::LocalStore;
use crate::repository::random_token;
use crate::types::{AuthError, TimberError, User, UserRole, SIMULATED_ID_PREFIX};

const SIMULATED_SUFFIX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    RolePending,
    RoleAssigned,
}

impl SessionPhase {
    pub fn of(user: Option<&User>) -> Self {
        match user {
            None => SessionPhase::Anonymous,
            Some(user) if user.needs_onboarding() => SessionPhase::RolePending,
            Some(_) => SessionPhase::RoleAssigned,
        }
    }
}

/// Result of an email sign-in attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SignInOutcome {
    /// A simulated identity was created and is now current
    SignedIn(User),
    /// A one-time link was emailed; the session starts when it is followed
    MagicLinkSent { email: String },
    /// The provider's consent page; the session starts after the redirect back
    Redirect { url: String },
}

/// Current-user state shared by the marketplace
pub struct Session {
    connection: Arc<Connection>,
    store: Arc<LocalStore>,
    backend: Option<Arc<dyn Backend>>,
    state: watch::Sender<Option<User>>,
}

impl Session {
    pub fn new(
        connection: Arc<Connection>,
        store: Arc<LocalStore>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            connection,
            store,
            backend,
            state,
        }
    }

    fn live_backend(&self) -> Option<&Arc<dyn Backend>> {
        if self.connection.is_connected() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::of(self.state.borrow().as_ref())
    }

    /// Receive every change of the current user
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }

    fn publish(&self, user: Option<User>) {
        let phase = SessionPhase::of(user.as_ref());
        self.state.send_replace(user);
        debug!("Session phase now {:?}", phase);
    }

    fn require_user(&self) -> Result<User, TimberError> {
        self.current_user().ok_or(TimberError::NotSignedIn)
    }

    /// Restore the session at startup: the remote session when connected,
    /// otherwise (or when there is none) the stored simulated identity
    pub async fn hydrate(&self) -> Option<User> {
        if let Some(backend) = self.live_backend() {
            match backend.current_user().await {
                Ok(Some(remote)) => {
                    let user = remote.into_user();
                    info!("Restored {} session for {}", backend.source_name(), user.id);
                    self.publish(Some(user.clone()));
                    return Some(user);
                }
                Ok(None) => debug!("No remote session, checking local store"),
                Err(e) => warn!("Session lookup failed, checking local store: {}", e),
            }
        }

        let user = self.store.simulated_user();
        match &user {
            Some(u) => info!("Restored simulated session for {}", u.id),
            None => debug!("No stored session"),
        }
        self.publish(user.clone());
        user
    }

    /// Adopt a session reported by the auth service, e.g. after a magic link
    /// was followed
    pub fn apply_remote_session(&self, remote: RemoteUser) -> User {
        let user = remote.into_user();
        info!("Remote session established for {}", user.id);
        self.publish(Some(user.clone()));
        user
    }

    /// Sign in as a locally simulated hunter or landowner
    pub fn sign_in_simulated(&self, role: UserRole) -> Result<User, TimberError> {
        let name = match role {
            UserRole::Hunter => "Travis Hunter",
            UserRole::Landowner => "Bill Landowner",
            UserRole::Admin => {
                return Err(TimberError::InvalidInput(
                    "admin is chosen during onboarding".into(),
                ))
            }
        };
        let user = User {
            id: format!(
                "{}{}-{}",
                SIMULATED_ID_PREFIX,
                role,
                random_token(SIMULATED_SUFFIX_LEN)
            ),
            name: name.to_string(),
            email: format!("{}@example.com", role),
            role: Some(role),
            is_member: role == UserRole::Hunter,
        };
        self.adopt_simulated(user)
    }

    /// Email sign-in. Connected: sends a magic link. Simulated: creates an
    /// identity named after the email's local part, with no role yet.
    pub async fn sign_in_with_email(&self, email: &str) -> Result<SignInOutcome, AuthError> {
        let email = email.trim();
        let local_part = match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => local,
            _ => return Err(AuthError::InvalidEmail(email.to_string())),
        };

        let Some(backend) = self.live_backend() else {
            let user = User {
                id: format!(
                    "{}email-user-{}",
                    SIMULATED_ID_PREFIX,
                    random_token(SIMULATED_SUFFIX_LEN)
                ),
                name: local_part.to_string(),
                email: email.to_string(),
                role: None,
                is_member: false,
            };
            let user = self.adopt_simulated(user)?;
            return Ok(SignInOutcome::SignedIn(user));
        };

        match backend.send_magic_link(email).await {
            Ok(()) => Ok(SignInOutcome::MagicLinkSent {
                email: email.to_string(),
            }),
            Err(e) => {
                let err = AuthError::from(e);
                if err.is_rate_limit() {
                    warn!("Magic link throttled for {}; simulated sign-in is available", email);
                }
                Err(err)
            }
        }
    }

    /// Google sign-in. Connected: the provider's authorize URL. Simulated:
    /// signs in as the simulated hunter.
    pub fn sign_in_with_google(
        &self,
        redirect_to: Option<&str>,
    ) -> Result<SignInOutcome, TimberError> {
        match self.live_backend() {
            Some(backend) => {
                let url = backend.oauth_authorize_url("google", redirect_to)?;
                debug!("Google sign-in via {}", url);
                Ok(SignInOutcome::Redirect { url })
            }
            None => {
                let user = self.sign_in_simulated(UserRole::Hunter)?;
                Ok(SignInOutcome::SignedIn(user))
            }
        }
    }

    fn adopt_simulated(&self, user: User) -> Result<User, TimberError> {
        self.store.save_simulated_user(Some(&user))?;
        info!("Signed in simulated user {} ({})", user.id, user.name);
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Onboarding: only valid while the role is pending
    pub async fn select_role(&self, role: UserRole) -> Result<User, TimberError> {
        let user = self.require_user()?;
        if !user.needs_onboarding() {
            return Err(TimberError::InvalidState(format!(
                "{} already has a role",
                user.id
            )));
        }

        if let Some(backend) = self.live_backend() {
            if !user.is_simulated() {
                if let Err(e) = backend.update_role(&user.id, role).await {
                    warn!("Failed to store role remotely for {}: {}", user.id, e);
                }
            }
        }

        let updated = User {
            role: Some(role),
            ..user
        };
        self.store.save_simulated_user(Some(&updated))?;
        info!("User {} onboarded as {}", updated.id, role);
        self.publish(Some(updated.clone()));
        Ok(updated)
    }

    /// Mark the current user as a paying member
    pub fn upgrade_membership(&self) -> Result<User, TimberError> {
        let user = self.require_user()?;
        let updated = User {
            is_member: true,
            ..user
        };
        self.store.save_simulated_user(Some(&updated))?;
        info!("User {} upgraded to membership", updated.id);
        self.publish(Some(updated.clone()));
        Ok(updated)
    }

    /// Clear the local identity and end the remote session when connected
    pub async fn logout(&self) -> Result<(), TimberError> {
        if let Some(backend) = self.live_backend() {
            if let Err(e) = backend.sign_out().await {
                warn!("Remote sign-out failed: {}", e);
            }
        }
        self.store.save_simulated_user(None)?;
        if let Some(user) = self.current_user() {
            info!("Signed out {}", user.id);
        }
        self.publish(None);
        Ok(())
    }
}
