use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "feedline",
    author,
    version,
    about = "Command line client for the Feedline social network",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, env = "FEEDLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API root, e.g. http://localhost:8000/api/
    #[arg(long, global = true, env = "FEEDLINE_API_URL")]
    pub api_url: Option<String>,

    /// Where the session (tokens, username, avatar) is persisted
    #[arg(long, global = true, env = "FEEDLINE_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        username: String,
        /// Prompted for when omitted
        #[arg(long, env = "FEEDLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and log it in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// National id (CPF), e.g. 529.982.247-25
        #[arg(long)]
        cpf: String,
        /// Prompted for (with confirmation) when omitted
        #[arg(long, hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show the feed
    Feed {
        /// Only posts from users you follow
        #[arg(long)]
        following: bool,
    },

    /// Publish a post
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },

    /// Like a post
    Like { post_id: u64 },

    /// Remove a like
    Unlike { post_id: u64 },

    /// List comments on a post
    Comments { post_id: u64 },

    /// Comment on a post
    Comment { post_id: u64, content: String },

    /// Show a profile. Without a username, your own
    Profile {
        username: Option<String>,
        /// Also list the user's posts
        #[arg(long)]
        posts: bool,
        /// Upload FILE (jpeg, png, gif or webp) as your profile picture
        #[arg(long, value_name = "FILE", conflicts_with_all = ["username", "posts"])]
        picture: Option<PathBuf>,
    },

    /// Change your username, email or password
    #[command(group(
        ArgGroup::new("change")
            .required(true)
            .multiple(true)
            .args(["username", "email", "new_password"])
    ))]
    Account {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, hide_env_values = true)]
        new_password: Option<String>,
        /// Required for email or password changes; prompted for when omitted
        #[arg(long, env = "FEEDLINE_PASSWORD", hide_env_values = true)]
        current_password: Option<String>,
    },

    /// Follow a user
    Follow { username: String },

    /// Unfollow a user
    Unfollow { username: String },

    /// List a user's followers
    Followers { username: String },

    /// List who you follow, or who `username` follows
    Following { username: Option<String> },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}
