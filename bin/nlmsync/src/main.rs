mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nlmsync")]
#[command(about = "Sync Zotero attachments into NotebookLM notebooks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one project now
    Sync {
        /// Project name (prefix match)
        project: String,
    },

    /// Sync every configured project, sequentially
    SyncAll,

    /// Manage sync projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommands,
    },

    /// Show or change auto-sync settings (Pro)
    Autosync {
        #[command(subcommand)]
        command: AutosyncCommands,
    },

    /// Show tier, daily usage, and the last duplicate report
    Status,

    /// Run the long-lived auto-sync daemon
    Daemon,

    /// Check Zotero, browser, and entitlement connectivity
    Doctor,

    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum ProjectsCommands {
    /// List configured projects
    List,
    /// Add a project
    Add {
        /// Project name
        name: String,
        /// Only sync items carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Zotero library id (see `doctor` for the list)
        #[arg(long)]
        library: Option<i64>,
        /// Zotero collection id within the library
        #[arg(long)]
        collection: Option<i64>,
        /// Target notebook id (from the notebook URL)
        #[arg(long)]
        notebook: Option<String>,
        /// Display name for the notebook
        #[arg(long)]
        notebook_name: Option<String>,
    },
    /// Remove a project by name
    Remove {
        /// Project name (prefix match)
        name: String,
    },
}

#[derive(Subcommand)]
enum AutosyncCommands {
    /// Show current auto-sync settings
    Show,
    /// Change auto-sync settings
    Set {
        /// Sync when a notebook page finishes loading
        #[arg(long)]
        on_page_visit: Option<bool>,
        /// Enable the interval trigger
        #[arg(long)]
        interval_enabled: Option<bool>,
        /// Interval in minutes
        #[arg(long)]
        interval_minutes: Option<u32>,
    },
}

pub(crate) fn build_cli() -> clap::Command {
    use clap::CommandFactory;
    Cli::command()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Sync { project } => {
            commands::sync::run(&project).await?;
        }
        Commands::SyncAll => {
            commands::sync::run_all().await?;
        }
        Commands::Projects { command } => match command {
            ProjectsCommands::List => commands::projects::list().await?,
            ProjectsCommands::Add {
                name,
                tag,
                library,
                collection,
                notebook,
                notebook_name,
            } => {
                commands::projects::add(name, tag, library, collection, notebook, notebook_name)
                    .await?
            }
            ProjectsCommands::Remove { name } => commands::projects::remove(&name).await?,
        },
        Commands::Autosync { command } => match command {
            AutosyncCommands::Show => commands::autosync::show().await?,
            AutosyncCommands::Set {
                on_page_visit,
                interval_enabled,
                interval_minutes,
            } => {
                commands::autosync::set(on_page_visit, interval_enabled, interval_minutes).await?
            }
        },
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Daemon => {
            commands::daemon::run().await?;
        }
        Commands::Doctor => {
            commands::doctor::run().await?;
        }
        Commands::Completions { shell } => {
            commands::completions::run(&shell)?;
        }
    }

    Ok(())
}
