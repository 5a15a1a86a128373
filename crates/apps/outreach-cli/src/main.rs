//! Outreach - command-line client for the personalized outreach service
//!
//! This is the main entry point for the `outreach` binary.

use clap::{Parser, Subcommand};
use log::error;
use outreach::{RequestDecision, Stage};
use std::path::PathBuf;

mod app;
mod prompt;

use app::App;

/// Command-line client for the outreach service
#[derive(Parser, Debug)]
#[command(name = "outreach", version, about, long_about = None)]
struct Cli {
    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Read client settings from this file instead of the config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with a one-time code sent by email
    Login { email: String },
    /// Forget the remembered sign-in
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// List generated emails, optionally for one stage
    Emails { stage: Option<Stage> },
    /// Mark an email as sent
    MarkSent { id: i64 },
    /// Put a sent email back to draft
    Unmark { id: i64 },
    /// Permanently delete an email
    Delete { id: i64 },
    /// Send an email through the connected Gmail account
    Send { id: i64 },
    /// Print a mailto: link for an email and mark it as sent
    Mailto { id: i64 },
    /// Write a stage's emails to a text file
    Export {
        stage: Stage,
        /// Output file; defaults to "<stage>-emails.txt"
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate emails from a CSV contact list
    Generate {
        file: PathBuf,
        #[arg(short, long, default_value = "outreach")]
        stage: Stage,
        /// Use this template instead of AI generation
        #[arg(short, long)]
        template: Option<i64>,
        /// Use the stage's default template
        #[arg(long, conflicts_with = "template")]
        default_template: bool,
        /// Skip contacts that already have an email in this stage
        #[arg(long)]
        avoid_duplicates: bool,
    },
    /// Connect a Gmail account for sending
    ConnectGmail,
    /// Manage email templates
    #[command(subcommand)]
    Templates(TemplateCommand),
    /// Manage friends and contact sharing
    #[command(subcommand)]
    Friends(FriendCommand),
    /// Update profile fields; omitted fields stay as they are
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Set the follow-up and last-chance delays in days
    Intervals { followup: u32, lastchance: u32 },
    /// Inspect or clear the generation cache
    Cache {
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// List templates, optionally for one stage
    List { stage: Option<Stage> },
    /// Create a template
    Create {
        stage: Stage,
        name: String,
        /// Template body; placeholders look like {name}
        content: String,
        #[arg(long)]
        default: bool,
    },
    /// Replace a template's name and content
    Update {
        id: i64,
        name: String,
        content: String,
    },
    /// Make a template its stage's default
    SetDefault { id: i64 },
    /// Delete a template
    Delete { id: i64 },
    /// Render a template with sample values
    Preview { id: i64 },
}

#[derive(Subcommand, Debug)]
enum FriendCommand {
    /// List friends and incoming requests
    List,
    /// Send a friend request
    Add { email: String },
    /// Accept an incoming request
    Accept { id: i64 },
    /// Reject an incoming request
    Reject { id: i64 },
    /// Share contact caches with a friend
    Share { id: i64 },
    /// Stop sharing contact caches with a friend
    Unshare { id: i64 },
    /// Remove a friend
    Remove { id: i64 },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("outreach: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut app = App::open(cli.config.as_deref(), cli.yes)?;

    match cli.command {
        Commands::Login { email } => app.login(&email),
        Commands::Logout => app.logout(),
        Commands::Whoami => app.whoami(),
        Commands::Emails { stage } => app.list_emails(stage),
        Commands::MarkSent { id } => app.mark_sent(id),
        Commands::Unmark { id } => app.unmark(id),
        Commands::Delete { id } => app.delete_email(id),
        Commands::Send { id } => app.send(id),
        Commands::Mailto { id } => app.mailto(id),
        Commands::Export { stage, output } => app.export(stage, output),
        Commands::Generate {
            file,
            stage,
            template,
            default_template,
            avoid_duplicates,
        } => app.generate(&file, stage, template, default_template, avoid_duplicates),
        Commands::ConnectGmail => app.connect_gmail(),
        Commands::Templates(command) => match command {
            TemplateCommand::List { stage } => app.list_templates(stage),
            TemplateCommand::Create {
                stage,
                name,
                content,
                default,
            } => app.create_template(stage, name, content, default),
            TemplateCommand::Update { id, name, content } => {
                app.update_template(id, name, content)
            }
            TemplateCommand::SetDefault { id } => app.set_default_template(id),
            TemplateCommand::Delete { id } => app.delete_template(id),
            TemplateCommand::Preview { id } => app.preview_template(id),
        },
        Commands::Friends(command) => match command {
            FriendCommand::List => app.list_friends(),
            FriendCommand::Add { email } => app.add_friend(&email),
            FriendCommand::Accept { id } => app.respond(id, RequestDecision::Accepted),
            FriendCommand::Reject { id } => app.respond(id, RequestDecision::Rejected),
            FriendCommand::Share { id } => app.share(id, true),
            FriendCommand::Unshare { id } => app.share(id, false),
            FriendCommand::Remove { id } => app.remove_friend(id),
        },
        Commands::Profile {
            name,
            position,
            company,
            description,
        } => app.update_profile(name, position, company, description),
        Commands::Intervals {
            followup,
            lastchance,
        } => app.set_intervals(followup, lastchance),
        Commands::Cache { clear } => app.cache(clear),
    }
}
