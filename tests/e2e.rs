//! E2E test harness entry point
//!
//! This file is the test binary that runs browser scenarios from YAML files.
//! Run with: cargo test --package promptlib-e2e --test e2e
//!
//! The app under test must either be spawnable from --app-binary or already
//! running at --base-url.

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use promptlib_e2e::playwright::{Browser, PlaywrightConfig};
use promptlib_e2e::runner::RunnerConfig;
use promptlib_e2e::server::ServerConfig;
use promptlib_e2e::{E2eResult, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "promptlib-e2e")]
#[command(about = "E2E test runner for the Promptlib web app")]
struct Args {
    /// Path to the scenarios directory
    #[arg(short, long, default_value = "scenarios")]
    scenarios: PathBuf,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Path to the app server binary
    #[arg(long, default_value = "target/debug/promptlib-web")]
    app_binary: PathBuf,

    /// Attach to an already running app instead of spawning one
    #[arg(long)]
    base_url: Option<String>,

    /// Port to run the app on (0 = auto)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Path polled until the app answers 2xx
    #[arg(long, default_value = "/prompts")]
    health_path: String,

    /// Seconds to wait for the app to become healthy
    #[arg(long, default_value = "30")]
    startup_timeout: u64,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Run in headless mode
    #[arg(long, default_value = "true")]
    headless: bool,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    viewport_height: u32,

    /// Output directory for results and screenshots
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    // Run async main
    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(success) => {
            if success {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let browser = match args.browser.as_str() {
        "firefox" => Browser::Firefox,
        "webkit" => Browser::Webkit,
        _ => Browser::Chromium,
    };

    let attach = args.base_url.is_some();
    let config = RunnerConfig {
        server: ServerConfig {
            command: if attach { None } else { Some(args.app_binary) },
            base_url: args.base_url,
            port: if args.port == 0 { None } else { Some(args.port) },
            health_path: args.health_path,
            startup_timeout: Duration::from_secs(args.startup_timeout),
            ..Default::default()
        },
        playwright: PlaywrightConfig {
            screenshot_dir: args.output.join("screenshots"),
            viewport_width: args.viewport_width,
            viewport_height: args.viewport_height,
            browser,
            headless: args.headless,
            ..Default::default()
        },
        scenarios_dir: args.scenarios,
        output_dir: args.output,
    };

    let mut runner = TestRunner::with_config(config);

    // Start (or attach to) the app
    runner.start_server().await?;

    // Run scenarios
    let results = if let Some(name) = args.name {
        let result = runner.run_named(&name).await?;
        promptlib_e2e::runner::SuiteResult {
            total: 1,
            passed: if result.success { 1 } else { 0 },
            failed: if result.success { 0 } else { 1 },
            duration_ms: result.duration_ms,
            results: vec![result],
        }
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    // Write results
    runner.write_results(&results)?;

    Ok(results.failed == 0)
}
