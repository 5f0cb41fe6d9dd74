use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive the portal catalog for offline use.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Output directory for the archive.
    #[arg(long)]
    pub out: String,

    /// Portal home URL (login entry point).
    #[arg(long)]
    pub portal_url: String,

    /// Catalog root URL (the page listing groups and items).
    #[arg(long)]
    pub catalog_url: String,

    /// Also render each archived page as a PDF (best-effort).
    #[arg(long, default_value_t = false)]
    pub pdf: bool,

    /// Walk the alternate catalog view after the default one.
    #[arg(long, default_value_t = false)]
    pub both_views: bool,

    /// Label of the alternate view in the curriculum switcher.
    #[arg(long, default_value = "Specializations")]
    pub alt_view_label: String,

    /// Seconds to wait for page loads before skipping an item.
    #[arg(long, default_value_t = crate::config::DEFAULT_WAIT_SECS)]
    pub wait_secs: u64,
}
