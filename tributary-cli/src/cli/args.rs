use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

/// Bidirectional source sync between remote repositories and the local
/// workspace.
#[derive(Parser, Debug)]
#[command(
    name = "tributary",
    version,
    about,
    disable_help_subcommand = true,
    arg_required_else_help = true,
    propagate_version = true
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalOpts,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(ClapArgs, Debug, Default)]
pub(crate) struct GlobalOpts {
    /// Increase stderr verbosity (`-v` = info, `-vv` = debug); quiet wins over verbose
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    /// Silence progress; only errors and explicit output remain
    #[arg(short = 'q', long, global = true)]
    pub(crate) quiet: bool,

    /// Disable ANSI control sequences even on TTYs; useful for CI/log scrapers
    #[arg(long = "no-ansi", global = true)]
    pub(crate) no_ansi: bool,

    /// Answer prompts without asking: deletion review keeps everything
    #[arg(short = 'y', long = "yes", global = true)]
    pub(crate) yes: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Pull the workflow's declared repo subtrees into the workspace
    Ingest {
        /// Workflow file declaring the sync tasks
        workflow: String,

        /// Re-copy every file regardless of tracker state
        #[arg(long)]
        force: bool,
    },

    /// Mirror local edits back into each repo's fork and open or update a PR
    Contribute {
        /// Print the would-be operations without mutating the fork
        #[arg(long = "dry-run")]
        dry_run: bool,
    },

    /// Like ingest, but interactively pick which of the workflow's tasks run
    ChooseWorkflow {
        /// Workflow file declaring the tasks
        workflow: String,
    },
}
