//! Workflow harness entry point
//!
//! This binary runs the admin publish workflow against a live instance of
//! the application. Run with: cargo test --package blog-e2e --test e2e
//!
//! Exit codes: 0 scenario passed, 1 scenario failed, 2 engine error.

use std::path::PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use blog_e2e::{Config, Runner, WorkflowResult};

#[derive(Parser, Debug)]
#[command(name = "blog-e2e")]
#[command(about = "Admin publish workflow verification for the blog")]
struct Args {
    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base origin of the application under test
    #[arg(long)]
    base_url: Option<String>,

    /// Administrator username
    #[arg(long)]
    username: Option<String>,

    /// Administrator password
    #[arg(long)]
    password: Option<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Timeout for a navigation to settle, in milliseconds
    #[arg(long)]
    navigation_timeout_ms: Option<u64>,

    /// Timeout for a single assertion, in milliseconds
    #[arg(long)]
    assertion_timeout_ms: Option<u64>,

    /// Timeout for the target origin to become reachable, in milliseconds
    #[arg(long)]
    startup_timeout_ms: Option<u64>,

    /// Output directory for the JSON report
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> WorkflowResult<bool> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(username) = args.username {
        config.credentials.username = username;
    }
    if let Some(password) = args.password {
        config.credentials.password = password;
    }
    if args.headed {
        config.headless = false;
    }
    if let Some(ms) = args.navigation_timeout_ms {
        config.navigation_timeout_ms = ms;
    }
    if let Some(ms) = args.assertion_timeout_ms {
        config.assertion_timeout_ms = ms;
    }
    if let Some(ms) = args.startup_timeout_ms {
        config.startup_timeout_ms = ms;
    }

    let mut runner = Runner::new(config, args.output);
    let report = runner.run().await?;
    runner.write_report(&report)?;

    Ok(report.success)
}
