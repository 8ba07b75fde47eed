use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Board;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::reveal::IntervalScheduler;
use crate::storage;

pub mod commands;

use self::commands::{
    CommentArgs, EditArgs, IdArgs, ListArgs, NewArgs, RestoreArgs, ShowArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "letterboard",
    version,
    about = "A board of letters with comments, favorites and a trash"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over LETTERBOARD_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over LETTERBOARD_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List letters on the board (default)
    List(ListArgs),
    /// Write a new letter
    New(NewArgs),
    /// Open a letter, type its body out and print its comments
    Show(ShowArgs),
    /// Change a letter's title, date or body
    Edit(EditArgs),
    /// Toggle a letter's favorite mark
    Favorite(IdArgs),
    /// Move a letter to the trash
    Trash(IdArgs),
    /// Bring a letter (or the whole trash) back to the board
    Restore(RestoreArgs),
    /// Permanently delete a letter and its comments
    Destroy(IdArgs),
    /// Permanently delete everything in the trash
    EmptyTrash,
    /// Add a comment to a letter
    Comment(CommentArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(&config.storage)?;

    let config = Arc::new(config);
    let mut board = Board::new(config, store, IntervalScheduler::new());
    board.connect().context("loading letters")?;

    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));
    let outcome = match command {
        Commands::List(args) => commands::list_letters(&mut board, args),
        Commands::New(args) => commands::new_letter(&mut board, args),
        Commands::Show(args) => commands::show_letter(&mut board, args),
        Commands::Edit(args) => commands::edit_letter(&mut board, args),
        Commands::Favorite(args) => commands::toggle_favorite(&mut board, args),
        Commands::Trash(args) => commands::trash_letter(&mut board, args),
        Commands::Restore(args) => commands::restore_letters(&mut board, args),
        Commands::Destroy(args) => commands::destroy_letter(&mut board, args),
        Commands::EmptyTrash => commands::empty_trash(&mut board),
        Commands::Comment(args) => commands::add_comment(&mut board, args),
    };
    board.disconnect();
    outcome
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow::anyhow!("{err}"))
    })
    .map(|_| ())
}
