use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;

use reelmark_core::models::{Profile, ProfilePatch};
use reelmark_runtime::Runtime;

use crate::output::{Output, NOT_AVAILABLE};

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show your profile
    Show,
    /// Change profile fields
    Set {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Upload a profile picture (png, jpg, gif or webp)
    Avatar { file: PathBuf },
}

pub async fn run(cmd: ProfileCommands, runtime: &Runtime, output: &Output) -> Result<()> {
    let profile = match cmd {
        ProfileCommands::Show => runtime.profile().await?,
        ProfileCommands::Set {
            username,
            full_name,
        } => {
            let patch = ProfilePatch {
                username,
                full_name,
                avatar_url: None,
            };
            if patch.is_empty() {
                bail!("nothing to change (pass --username or --full-name)");
            }
            runtime.update_profile(&patch).await?
        }
        ProfileCommands::Avatar { file } => runtime.upload_avatar(&file).await?,
    };
    print_profile(&profile, output);
    Ok(())
}

fn print_profile(profile: &Profile, output: &Output) {
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_AVAILABLE.into());
    output.println(format!("Email:     {}", field(&profile.email)));
    output.println(format!("Username:  {}", field(&profile.username)));
    output.println(format!("Full name: {}", field(&profile.full_name)));
    output.println(format!("Avatar:    {}", field(&profile.avatar_url)));
    output.json(profile);
}
