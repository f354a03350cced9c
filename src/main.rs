use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::EnvFilter;

use choreboard::commands::*;

#[derive(Parser)]
#[command(name = "choreboard")]
#[command(about = "Shared household chore tracker", long_about = None)]
struct Cli {
    /// Act as this user (defaults to CHORES_USER)
    #[arg(short, long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage your member profile
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Create, join or leave a household
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Add a new chore (proposed if your household has other members)
    Add {
        /// Chore name (quoted if it has spaces)
        name: String,
        /// Date in YYYY-MM-DD, defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// Priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,
        /// Expected duration in minutes
        #[arg(short, long)]
        minutes: Option<u32>,
        /// Repetition (none, daily, weekly, monthly, yearly)
        #[arg(short, long)]
        repeat: Option<String>,
        /// Assign to a user id
        #[arg(short, long)]
        assign: Vec<String>,
        /// Chore is a checklist
        #[arg(long)]
        checklist: bool,
    },
    /// List chores in house order
    List {
        /// Include completed chores
        #[arg(short, long)]
        all: bool,
        /// Show proposals awaiting approval instead
        #[arg(short, long)]
        proposals: bool,
    },
    /// Show every field of a chore
    Show { id: String },
    /// Edit a chore
    Edit {
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New date
        #[arg(short, long)]
        date: Option<String>,
        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,
        /// New priority
        #[arg(short, long)]
        priority: Option<String>,
        /// New duration in minutes
        #[arg(short, long)]
        minutes: Option<u32>,
        /// Replace assignees
        #[arg(short, long)]
        assign: Option<Vec<String>>,
    },
    /// Remove a single chore
    Remove { id: String },
    /// Vote on a proposed chore
    Vote {
        id: String,
        /// Vote against instead of for
        #[arg(long)]
        reject: bool,
    },
    /// Approve a proposed chore directly
    Approve { id: String },
    /// Reject a proposed chore (deletes it)
    Reject { id: String },
    /// Toggle completion of a chore
    Complete { id: String },
    /// Delete this and later occurrences of a repeating chore
    DeleteSeries {
        id: String,
        /// First date to delete, defaults to the chore's own date
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Completion rates per member and for the household
    Stats,
    /// Completion log
    History,
    /// Reset the local database (delete all chores, members and logs)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register or update a profile
    Register {
        /// User id
        id: String,
        /// Display name
        name: String,
        /// Display color (red, orange, yellow, green, blue, purple, pink, teal, brown, gray)
        #[arg(short, long)]
        color: Option<String>,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Start a new household
    Create,
    /// Join a household by key
    Join { key: String },
    /// Leave your household
    Leave,
    /// List household members
    Members,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let user = cli.user.as_deref();
    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Register { id, name, color } => cmd_register(id, name, color, false),
        },
        Commands::Group { command } => match command {
            GroupCommands::Create => cmd_group_create(user, false),
            GroupCommands::Join { key } => cmd_group_join(user, key, false),
            GroupCommands::Leave => cmd_group_leave(user, false),
            GroupCommands::Members => cmd_members(user),
        },
        Commands::Add { name, date, description, priority, minutes, repeat, assign, checklist } => {
            cmd_add(user, name, date, description, priority, minutes, repeat, assign, checklist, false)
        }
        Commands::List { all, proposals } => cmd_list(user, all, proposals),
        Commands::Show { id } => cmd_show(user, id),
        Commands::Edit { id, name, date, description, priority, minutes, assign } => {
            cmd_edit(user, id, name, date, description, priority, minutes, assign, false)
        }
        Commands::Remove { id } => cmd_remove(user, id, false),
        Commands::Vote { id, reject } => cmd_vote(user, id, reject, false),
        Commands::Approve { id } => cmd_approve(user, id, false),
        Commands::Reject { id } => cmd_reject(user, id, false),
        Commands::Complete { id } => cmd_complete(user, id, false),
        Commands::DeleteSeries { id, from } => cmd_delete_series(user, id, from, false),
        Commands::Stats => cmd_stats(user),
        Commands::History => cmd_history(user),
        Commands::Reset { force } => cmd_reset(force),
        Commands::Completions { shell } => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return;
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "choreboard", &mut io::stdout());
        }
    }
}
