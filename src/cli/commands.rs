use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedwall")]
#[command(about = "Polls news, image and microblog sources into one filtered feed wall")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start every configured source and print events as they arrive
    Run {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(short, long)]
        duration: Option<u64>,

        /// Print the valid items on every cache purge
        #[arg(long)]
        show_purges: bool,
    },

    /// Poll one source once and print what it returned
    Fetch {
        /// Source to poll (news, flickr, twitter, mastodon)
        source: String,

        /// Search terms for this poll instead of the configured ones
        #[arg(short, long = "query")]
        queries: Vec<String>,
    },

    /// List configured sources with their intervals and query terms
    Sources,

    /// Print the effective configuration as JSON (credentials omitted)
    Config,
}
