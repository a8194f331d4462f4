//! Account command handlers: sign-in, sign-out, registration, password reset.

use std::io::{BufRead, IsTerminal};

use secrecy::SecretString;
use serde::Serialize;

use leakwatch_api::{
    ApiClient, EmailVerificationForm, PasswordResetConfirm, PasswordResetRequest,
    RegistrationForm, Session,
};

use crate::cli::{GlobalOpts, LoginArgs, PasswordResetArgs, PasswordResetCommand, RegisterArgs};
use crate::config::{self, Target};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WhoamiView {
    signed_in: bool,
    email: Option<String>,
    username: Option<String>,
    role: Option<String>,
}

impl From<&Session> for WhoamiView {
    fn from(session: &Session) -> Self {
        let user = session.user.as_ref();
        Self {
            signed_in: session.is_authenticated(),
            email: user.map(|u| u.email.clone()),
            username: user.and_then(|u| u.username.clone()),
            role: user.and_then(|u| u.role.clone()),
        }
    }
}

fn whoami_detail(v: &WhoamiView) -> String {
    let mut lines = vec![format!(
        "Signed in:  {}",
        if v.signed_in { "yes" } else { "no" }
    )];
    lines.push(format!("Email:      {}", util::or_dash(v.email.as_deref())));
    lines.push(format!("Username:   {}", util::or_dash(v.username.as_deref())));
    lines.push(format!("Role:       {}", util::or_dash(v.role.as_deref())));
    lines.join("\n")
}

// ── Secrets input ───────────────────────────────────────────────────

fn read_stdin_line() -> Result<SecretString, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_owned();
    Ok(SecretString::from(secret))
}

/// A new password: prompted twice on a terminal, one line of stdin otherwise.
fn read_new_password() -> Result<(SecretString, SecretString), CliError> {
    if !std::io::stdin().is_terminal() {
        let pw = read_stdin_line()?;
        return Ok((pw.clone(), pw));
    }
    let first = rpassword::prompt_password("New password: ").map_err(util::prompt_err)?;
    let second = rpassword::prompt_password("Repeat password: ").map_err(util::prompt_err)?;
    Ok((SecretString::from(first), SecretString::from(second)))
}

fn login_password(args: &LoginArgs, target: &Target) -> Result<SecretString, CliError> {
    if args.password_stdin {
        return read_stdin_line();
    }
    let profile = target.profile.clone().unwrap_or_default();
    if let Ok(pw) = config::resolve_password(&profile, &target.profile_name) {
        return Ok(pw);
    }
    let pw = rpassword::prompt_password("Password: ").map_err(util::prompt_err)?;
    Ok(SecretString::from(pw))
}

fn login_email(args: &LoginArgs, target: &Target) -> Result<String, CliError> {
    if let Some(email) = args.email.clone().or_else(|| target.email.clone()) {
        return Ok(email);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "email".into(),
            reason: "pass --email or set email in the profile".into(),
        });
    }
    dialoguer::Input::new()
        .with_prompt("Email")
        .interact_text()
        .map_err(util::prompt_err)
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn login(
    client: &ApiClient,
    target: &Target,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let email = login_email(&args, target)?;
    let password = login_password(&args, target)?;

    let session = util::with_spinner("Signing in", global.quiet, client.login(&email, &password))
        .await?;

    let who = session
        .user
        .as_ref()
        .map_or(email.as_str(), |u| u.email.as_str());
    output::notice(
        &format!("✓ Signed in as {who} (profile '{}')", target.profile_name),
        global.quiet,
    );
    Ok(())
}

pub async fn logout(client: &ApiClient, global: &GlobalOpts) -> Result<(), CliError> {
    if client.session()?.is_none() {
        output::notice("Not signed in", global.quiet);
        return Ok(());
    }
    client.logout().await?;
    output::notice("✓ Signed out", global.quiet);
    Ok(())
}

pub fn whoami(client: &ApiClient, global: &GlobalOpts) -> Result<(), CliError> {
    let session = client.session()?.ok_or(CliError::NotSignedIn)?;
    let view = WhoamiView::from(&session);
    let out = output::render_single(&global.output, &view, whoami_detail, |v| {
        v.email.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    args: RegisterArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (password, password_confirmation) = read_new_password()?;
    let form = RegistrationForm {
        email: args.email,
        username: args.username,
        phone: args.phone,
        password,
        password_confirmation,
    };
    let ack = client.register(&form).await?;
    output::notice(
        &format!(
            "✓ {}",
            ack.message
                .as_deref()
                .unwrap_or("Account created. Check your email for the verification code.")
        ),
        global.quiet,
    );
    Ok(())
}

pub async fn verify_email(
    client: &ApiClient,
    email: String,
    code: String,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ack = client
        .verify_email(&EmailVerificationForm { email, code })
        .await?;
    output::notice(
        &format!("✓ {}", ack.message.as_deref().unwrap_or("Email verified")),
        global.quiet,
    );
    Ok(())
}

pub async fn password_reset(
    client: &ApiClient,
    args: PasswordResetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ack = match args.command {
        PasswordResetCommand::Request { email } => {
            client
                .request_password_reset(&PasswordResetRequest { email })
                .await?
        }
        PasswordResetCommand::Confirm { token } => {
            let (new_password, repeated) = read_new_password()?;
            if secrecy::ExposeSecret::expose_secret(&new_password)
                != secrecy::ExposeSecret::expose_secret(&repeated)
            {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "passwords do not match".into(),
                });
            }
            client
                .confirm_password_reset(&PasswordResetConfirm {
                    token,
                    new_password,
                })
                .await?
        }
    };
    output::notice(
        &format!("✓ {}", ack.message.as_deref().unwrap_or("Done")),
        global.quiet,
    );
    Ok(())
}
