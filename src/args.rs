use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "site-clone")]
#[command(about = "Clone a website into rendered, self-contained page snapshots")]
#[command(version)]
pub struct Args {
    /// Seed URL to clone (http or https)
    pub url: String,

    /// Maximum number of pages to clone, seed included
    #[arg(short = 'p', long)]
    pub max_pages: Option<usize>,

    /// Maximum link distance from the seed
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,

    /// Number of pages rendered at the same time
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebDriver endpoint (overrides WEBDRIVER_URL and the config file)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Deadline for the whole clone in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print only the seed page's HTML instead of the JSON result
    #[arg(long)]
    pub html: bool,
}
