// Authentication endpoints
//
// Login populates the session store, logout and failed refreshes tear it
// down. Registration, email verification, and password reset happen before
// a session exists and never carry a bearer token.

use secrecy::SecretString;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::Error;
use crate::forms::{
    EmailVerificationForm, LoginForm, PasswordResetConfirm, PasswordResetRequest,
    RegistrationForm, Validate,
};
use crate::models::{Ack, TokenPair};
use crate::session::{AuthState, Session};

impl ApiClient {
    /// Sign in with email and password.
    ///
    /// `POST auth/login/`. On success the token pair and user are persisted
    /// and the auth state becomes [`AuthState::SignedIn`].
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Session, Error> {
        let form = LoginForm {
            email: email.trim().to_owned(),
            password: password.clone(),
        };
        form.validate()?;

        debug!(email = %form.email, "logging in");
        let resp = self.post_public("auth/login/", &form).await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST {
            let message = match self.parse_json::<Ack>(resp).await {
                Err(Error::Api { message, .. }) => message,
                _ => "invalid email or password".into(),
            };
            return Err(Error::Authentication {
                message: format!("login rejected (HTTP {status}): {message}"),
            });
        }

        let pair: TokenPair = self.parse_json(resp).await?;
        let session = Session {
            access_token: Some(SecretString::from(pair.access)),
            refresh_token: pair.refresh.map(SecretString::from),
            user: pair.user,
        };
        self.store().save(&session)?;
        self.set_auth_state(AuthState::SignedIn);

        info!(email = %form.email, "signed in");
        Ok(session)
    }

    /// End the current session.
    ///
    /// `POST auth/logout/` with the refresh token so the backend can revoke
    /// it. The local session is cleared whether or not the backend call
    /// succeeds.
    pub async fn logout(&self) -> Result<(), Error> {
        let refresh = self
            .store()
            .load()?
            .and_then(|s| s.refresh_token().map(String::from));

        if let Some(refresh) = refresh {
            let result: Result<Ack, Error> = self
                .post("auth/logout/", &json!({ "refresh": refresh }))
                .await;
            if let Err(e) = result {
                warn!(error = %e, "backend logout failed, clearing local session anyway");
            }
        }

        self.clear_session();
        self.set_auth_state(AuthState::SignedOut);
        debug!("logout complete");
        Ok(())
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// `POST auth/token/refresh/`. Same teardown rules as the automatic
    /// refresh: a rejected refresh token clears the session.
    pub async fn refresh(&self) -> Result<Session, Error> {
        let session = self.store().load()?.unwrap_or_default();
        if session.refresh_token.is_none() {
            return Err(Error::Unauthorized);
        }
        self.rotate(session).await
    }

    /// Create an account. The backend emails a verification code.
    ///
    /// `POST auth/register/`
    pub async fn register(&self, form: &RegistrationForm) -> Result<Ack, Error> {
        form.validate()?;
        debug!(email = %form.email, "registering account");
        let resp = self.post_public("auth/register/", form).await?;
        self.parse_json(resp).await
    }

    /// Confirm an email address with the emailed code.
    ///
    /// `POST auth/verify-email/`
    pub async fn verify_email(&self, form: &EmailVerificationForm) -> Result<Ack, Error> {
        form.validate()?;
        debug!(email = %form.email, "verifying email");
        let resp = self.post_public("auth/verify-email/", form).await?;
        self.parse_json(resp).await
    }

    /// Ask for a password reset link.
    ///
    /// `POST auth/password-reset/`
    pub async fn request_password_reset(&self, form: &PasswordResetRequest) -> Result<Ack, Error> {
        form.validate()?;
        debug!(email = %form.email, "requesting password reset");
        let resp = self.post_public("auth/password-reset/", form).await?;
        self.parse_json(resp).await
    }

    /// Set a new password with the reset token.
    ///
    /// `POST auth/password-reset/confirm/`
    pub async fn confirm_password_reset(&self, form: &PasswordResetConfirm) -> Result<Ack, Error> {
        form.validate()?;
        debug!("confirming password reset");
        let resp = self.post_public("auth/password-reset/confirm/", form).await?;
        self.parse_json(resp).await
    }
}
