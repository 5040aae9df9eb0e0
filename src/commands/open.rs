use anyhow::Result;
use clap::Args as ClapArgs;

use crate::commands::git::TargetArgs;
use crate::git::{open_in, OpenApp};

#[derive(ClapArgs)]
pub struct Args {
    #[command(flatten)]
    pub target: TargetArgs,

    /// vscode, cursor or finder
    #[arg(short, long, default_value = "vscode")]
    pub app: OpenApp,
}

pub async fn execute(args: Args) -> Result<()> {
    let path = args.target.resolve().await?;
    open_in(&path, args.app)?;
    println!("Opened {}", path.display());
    Ok(())
}
