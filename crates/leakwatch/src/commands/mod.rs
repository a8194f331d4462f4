//! Command dispatch: bridges CLI args -> API client calls -> output formatting.

pub mod account;
pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod leaks;
pub mod readings;
pub mod util;
pub mod watch;

use leakwatch_api::ApiClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &ApiClient,
    target: &Target,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => account::login(client, target, args, global).await,
        Command::Logout => account::logout(client, global).await,
        Command::Whoami => account::whoami(client, global),
        Command::Register(args) => account::register(client, args, global).await,
        Command::VerifyEmail { email, code } => {
            account::verify_email(client, email, code, global).await
        }
        Command::PasswordReset(args) => account::password_reset(client, args, global).await,
        Command::Devices(args) => devices::handle(client, args, global).await,
        Command::Control(args) => control::handle(client, args, global).await,
        Command::Readings(args) => readings::handle(client, args, global).await,
        Command::Leaks(args) => leaks::handle(client, args, global).await,
        Command::Watch(args) => watch::handle(client, target, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
