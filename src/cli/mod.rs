pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "franchisectl")]
#[command(about = "Operator CLI for the Franchise API backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run pending database migrations")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Health,

    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Migrate => commands::migrate().await,
        Commands::Health => commands::health().await,
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => commands::create_admin(&name, &email, &password).await,
    }
}
