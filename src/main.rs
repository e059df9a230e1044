use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::runtime::{Builder, Runtime};

mod config;
mod engine;
mod env;
mod listing;
mod networking;
mod pattern;
mod process;
mod storage;
mod ui;
mod updater;

use crate::config::{LauncherConfig, Overrides};
use crate::engine::state::FailurePrompt;
use crate::engine::{LaunchOutcome, LauncherEngine};
use crate::ui::{AutoPrompt, DialogPrompt, PhaseRenderer};

#[derive(Parser, Debug)]
#[command(
    name = "splashup",
    author,
    version,
    about = "Splash launcher that keeps a timestamped application package fresh and runs it"
)]
struct Cli {
    /// Path to the configuration file (defaults to splashup.json next to the launcher).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Product name prefix of the package files.
    #[arg(long)]
    product: Option<String>,

    /// Directory-listing URL the packages are published under.
    #[arg(long)]
    url: Option<String>,

    /// Package file extension, with or without the leading dot.
    #[arg(long)]
    ext: Option<String>,

    /// Directory packages are stored in (defaults to the launcher's own directory).
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Comma-separated program prefix the package is run through, e.g. "java,-jar".
    #[arg(long)]
    runner: Option<String>,

    /// Rule for picking the newest remote package: by-name or last-listed.
    #[arg(long)]
    pick: Option<String>,

    /// Never show dialogs; a failed update falls back to the newest local package.
    #[arg(long)]
    non_interactive: bool,

    /// Print launcher version and exit.
    #[arg(long)]
    version_only: bool,

    /// Activation arguments forwarded to the launched package (prefix with -- to pass flags).
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.version_only {
        println!("splashup {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let overrides = Overrides {
        product: cli.product,
        url: cli.url,
        ext: cli.ext,
        dir: cli.dir,
        runner: cli.runner,
        pick: cli.pick,
    };
    let config = match config::load(cli.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(err) => {
            error!("config: {err}");
            std::process::exit(2);
        }
    };

    let runtime = build_runtime();
    let code = runtime.block_on(run(config, cli.non_interactive, cli.args));
    std::process::exit(code);
}

async fn run(config: LauncherConfig, non_interactive: bool, args: Vec<String>) -> i32 {
    info!(
        "splashup {} starting for {} ({})",
        env!("CARGO_PKG_VERSION"),
        config.product,
        config.listing_url
    );

    let product = config.product.clone();
    let engine = LauncherEngine::new(config);
    let prompt: Box<dyn FailurePrompt> = if non_interactive {
        Box::new(AutoPrompt::cancel())
    } else {
        Box::new(DialogPrompt::new(product))
    };

    let mut renderer = PhaseRenderer::new();
    let mut on_phase = move |phase| renderer.render(phase);
    match engine.run(&args, prompt.as_ref(), Some(&mut on_phase)).await {
        Ok(LaunchOutcome::Launched { filename, exit_code }) => {
            info!("done: {filename} exited with code {exit_code}");
            exit_code
        }
        Ok(LaunchOutcome::Aborted { failure }) => {
            error!("done: nothing was launched after: {failure}");
            1
        }
        Err(err) => {
            error!("done: {err}");
            1
        }
    }
}

fn build_runtime() -> Runtime {
    match Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            warn!(
                "runtime: failed to create multithreaded runtime ({}); trying single-threaded runtime",
                err
            );
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(fallback_err) => {
                    error!(
                        "runtime: failed to create any Tokio runtime ({}); terminating launcher",
                        fallback_err
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}
