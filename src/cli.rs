use clap::{Parser, Subcommand};

/// GHLink — GoHighLevel task bridge
#[derive(Parser)]
#[command(name = "ghlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bridge server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage the vendor OAuth session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// List the tenant's pipelines
    Pipelines {
        #[arg(long)]
        location_id: Option<String>,
    },

    /// Fetch and render tasks for a pipeline
    Tasks {
        /// Pipeline name (case-insensitive, substring tolerated)
        #[arg(long)]
        pipeline: Option<String>,
        /// Opportunity status filter: open, won, lost, abandoned, all
        #[arg(long, default_value = "open")]
        status: String,
        /// Max opportunities per search page
        #[arg(long, default_value = "100")]
        limit: u32,
        #[arg(long)]
        location_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Interactive flow: print the authorization URL, then exchange the
    /// code pasted back from the redirect URL
    Init,
    /// Show whether the stored token is still valid
    Status {
        #[arg(long)]
        location_id: Option<String>,
    },
    /// Exchange the stored refresh token for a new one
    Refresh {
        #[arg(long)]
        location_id: Option<String>,
    },
}
