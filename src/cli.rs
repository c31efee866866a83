use clap::{Parser, Subcommand};

/// SBIR Portal: staff dashboard and API gateway for the JTB tax registry
#[derive(Parser)]
#[command(name = "sbir-portal", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the portal server
    Serve {
        /// Port to bind (defaults to SBIR_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage API client apps
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Manage staff accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Talk to the JTB registry directly
    Jtb {
        #[command(subcommand)]
        command: JtbCommands,
    },
}

#[derive(Subcommand)]
pub enum AppCommands {
    /// Register an app and print its token
    Create {
        #[arg(long)]
        name: String,
        /// Comma-separated caller IPs
        #[arg(long, value_delimiter = ',', required = true)]
        ips: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List registered apps
    List,
    /// Activate or deactivate an app
    Toggle {
        #[arg(long)]
        id: i64,
    },
    /// Delete an app
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a staff account, or reset its password
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SBIR_USER_PASSWORD")]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum JtbCommands {
    /// Request a token with the configured credentials
    Token,
}
