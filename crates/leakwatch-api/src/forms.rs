//! Request bodies with client-side validation.
//!
//! Every form is validated before the request is built; a failure is
//! reported per field as [`Error::Validation`] and nothing reaches the
//! backend.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::models::ValveAction;

const MIN_PASSWORD_LEN: usize = 8;

/// Implemented by every request body that carries user input.
pub trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

// ── Field rules ─────────────────────────────────────────────────────

pub(crate) fn check_email(field: &'static str, email: &str) -> Result<(), Error> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::validation(field, "must be an email address"));
    };
    if local.is_empty() || domain.contains('@') {
        return Err(Error::validation(field, "must be an email address"));
    }
    let dotted: Vec<&str> = domain.split('.').collect();
    if dotted.len() < 2 || dotted.iter().any(|part| part.is_empty()) {
        return Err(Error::validation(field, "email domain is incomplete"));
    }
    Ok(())
}

fn check_password(field: &'static str, password: &SecretString) -> Result<(), Error> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(
            field,
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

fn check_present(field: &'static str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    Ok(())
}

fn check_coordinate(field: &'static str, value: f64, bound: f64) -> Result<(), Error> {
    if !value.is_finite() || value.abs() > bound {
        return Err(Error::validation(
            field,
            format!("must be between -{bound} and {bound}"),
        ));
    }
    Ok(())
}

// ── Auth forms ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginForm {
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

impl Validate for LoginForm {
    fn validate(&self) -> Result<(), Error> {
        check_email("email", &self.email)?;
        if self.password.expose_secret().is_empty() {
            return Err(Error::validation("password", "is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    #[serde(skip)]
    pub password_confirmation: SecretString,
}

impl Validate for RegistrationForm {
    fn validate(&self) -> Result<(), Error> {
        check_email("email", &self.email)?;
        check_present("username", &self.username)?;
        check_password("password", &self.password)?;
        if self.password.expose_secret() != self.password_confirmation.expose_secret() {
            return Err(Error::validation("password_confirmation", "passwords do not match"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct EmailVerificationForm {
    pub email: String,
    pub code: String,
}

impl Validate for EmailVerificationForm {
    fn validate(&self) -> Result<(), Error> {
        check_email("email", &self.email)?;
        let code = self.code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation("code", "must be the numeric code from the email"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

impl Validate for PasswordResetRequest {
    fn validate(&self) -> Result<(), Error> {
        check_email("email", &self.email)
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    #[serde(rename = "password", serialize_with = "expose")]
    pub new_password: SecretString,
}

impl Validate for PasswordResetConfirm {
    fn validate(&self) -> Result<(), Error> {
        check_present("token", &self.token)?;
        check_password("password", &self.new_password)
    }
}

// ── Device forms ────────────────────────────────────────────────────

/// Registration of a new ESP controller board in the field.
#[derive(Debug, Serialize)]
pub struct EspRegistration {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub province: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Validate for EspRegistration {
    fn validate(&self) -> Result<(), Error> {
        check_present("device_id", &self.device_id)?;
        check_present("province", &self.province)?;
        check_present("district", &self.district)?;
        check_coordinate("latitude", self.latitude, 90.0)?;
        check_coordinate("longitude", self.longitude, 180.0)
    }
}

// ── Control forms ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScheduleRequest {
    pub valve_id: String,
    pub action: ValveAction,
    pub start_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

impl Validate for ScheduleRequest {
    fn validate(&self) -> Result<(), Error> {
        check_present("valve_id", &self.valve_id)?;
        if self.duration_minutes == Some(0) {
            return Err(Error::validation("duration_minutes", "must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CommandRequest {
    pub valve_id: String,
    pub action: ValveAction,
}

impl Validate for CommandRequest {
    fn validate(&self) -> Result<(), Error> {
        check_present("valve_id", &self.valve_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn field_of(err: Error) -> &'static str {
        match err {
            Error::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_rules() {
        assert!(check_email("email", "ops@wasac.rw").is_ok());
        for bad in ["", "ops", "@wasac.rw", "ops@", "ops@wasac", "ops@wasac.", "a@b@c.rw"] {
            assert!(check_email("email", bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn registration_requires_matching_passwords() {
        let form = RegistrationForm {
            email: "ops@wasac.rw".into(),
            username: "ops".into(),
            phone: None,
            password: secret("correct-horse"),
            password_confirmation: secret("correct-h0rse"),
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "password_confirmation");
    }

    #[test]
    fn registration_rejects_short_password() {
        let form = RegistrationForm {
            email: "ops@wasac.rw".into(),
            username: "ops".into(),
            phone: None,
            password: secret("short"),
            password_confirmation: secret("short"),
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "password");
    }

    #[test]
    fn registration_body_omits_confirmation() {
        let form = RegistrationForm {
            email: "ops@wasac.rw".into(),
            username: "ops".into(),
            phone: None,
            password: secret("correct-horse"),
            password_confirmation: secret("correct-horse"),
        };
        let body = serde_json::to_value(&form).unwrap();
        assert_eq!(body["password"], "correct-horse");
        assert!(body.get("password_confirmation").is_none());
        assert!(body.get("phone").is_none());
    }

    #[test]
    fn verification_code_must_be_digits() {
        let form = EmailVerificationForm {
            email: "ops@wasac.rw".into(),
            code: "12a4".into(),
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "code");
    }

    #[test]
    fn esp_coordinates_are_bounded() {
        let mut form = EspRegistration {
            device_id: "esp-001".into(),
            name: None,
            province: "Northern".into(),
            district: "Musanze".into(),
            latitude: -1.4996,
            longitude: 29.6344,
        };
        assert!(form.validate().is_ok());

        form.latitude = 91.0;
        assert_eq!(field_of(form.validate().unwrap_err()), "latitude");

        form.latitude = 0.0;
        form.longitude = f64::NAN;
        assert_eq!(field_of(form.validate().unwrap_err()), "longitude");
    }

    #[test]
    fn zero_minute_schedule_is_rejected() {
        let form = ScheduleRequest {
            valve_id: "valve-3".into(),
            action: ValveAction::Close,
            start_at: Utc::now(),
            duration_minutes: Some(0),
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "duration_minutes");
    }
}
