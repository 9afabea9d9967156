use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

use reelmark_api::traits::SignUpOutcome;
use reelmark_runtime::Runtime;

use crate::output::Output;

/// Read by `signup` and `login` before prompting.
const PASSWORD_ENV: &str = "REELMARK_PASSWORD";

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Signup { email: String },
    /// Sign in with email and password
    Login { email: String },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
}

pub async fn run(cmd: AuthCommands, runtime: &Runtime, output: &Output) -> Result<()> {
    match cmd {
        AuthCommands::Signup { email } => {
            let password = read_password()?;
            match runtime.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => output.json(&json!({
                    "status": "signed_in",
                    "user_id": session.user_id,
                    "email": session.email,
                })),
                SignUpOutcome::ConfirmationRequired { user_id, email } => output.json(&json!({
                    "status": "confirmation_required",
                    "user_id": user_id,
                    "email": email,
                })),
            }
            Ok(())
        }
        AuthCommands::Login { email } => {
            let password = read_password()?;
            let session = runtime.sign_in(&email, &password).await?;
            output.json(&json!({
                "user_id": session.user_id,
                "email": session.email,
                "expires_at": session.expires_at,
            }));
            Ok(())
        }
        AuthCommands::Logout => {
            runtime.sign_out().await?;
            Ok(())
        }
        AuthCommands::Whoami => {
            let Some(session) = runtime.current_session().await? else {
                output.info("Not signed in");
                output.json(&json!({"signed_in": false}));
                return Ok(());
            };
            output.println(format!(
                "Signed in as {}",
                session.email.as_deref().unwrap_or("(no email)")
            ));
            output.println(format!("User id: {}", session.user_id));
            if let Some(at) = session.expires_at {
                output.println(format!("Token expires: {}", at.format("%Y-%m-%d %H:%M UTC")));
            }
            output.json(&json!({
                "signed_in": true,
                "user_id": session.user_id,
                "email": session.email,
                "expires_at": session.expires_at,
            }));
            Ok(())
        }
    }
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("failed to read password")
}
