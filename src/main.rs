use clap::Parser;
use site_clone::{CloneResponse, SiteCloner};
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    ::log::info!("Starting clone of {}", args.url);

    let mut cloner = SiteCloner::new();
    if let Some(path) = &args.config {
        cloner = match cloner.with_config_file(path) {
            Ok(cloner) => cloner,
            Err(e) => {
                ::log::error!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
    }
    if let Some(webdriver_url) = args.webdriver_url {
        cloner = cloner.with_webdriver_url(webdriver_url);
    }
    if let Some(concurrency) = args.concurrency {
        cloner = cloner.with_max_concurrency(concurrency);
    }
    if let Some(timeout) = args.timeout {
        cloner = cloner.with_request_timeout(timeout);
    }

    ::log::debug!("Using WebDriver at {}", cloner.config().webdriver_url);

    let start_time = std::time::Instant::now();
    let result = cloner
        .clone_site(&args.url, args.max_pages, args.max_depth)
        .await;
    let failed = result.is_err();

    match &result {
        Ok(pages) => ::log::info!(
            "Clone complete - {} pages in {:.2} seconds",
            pages.len(),
            start_time.elapsed().as_secs_f64()
        ),
        Err(e) => ::log::error!("Clone failed: {}", e),
    }

    let response = CloneResponse::from(result);
    let output = match (&response, args.html) {
        (CloneResponse::Pages { pages }, true) => pages
            .first()
            .map(|seed| seed.html.clone())
            .unwrap_or_default(),
        _ => match serde_json::to_string_pretty(&response) {
            Ok(json) => json,
            Err(e) => {
                ::log::error!("Failed to serialize result: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    println!("{}", output);

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
