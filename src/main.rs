use std::{path::PathBuf, process::ExitCode, str::FromStr};

use clap::Parser;
use log::error;
use tkrec::{
    config::{OptionKey, Options, Overrides, Paths},
    progress::ConsoleCountdown,
    quality::Quality,
    recorder::Recorder,
    wait::WaitOutcome,
    ytdlp::YtDlp,
};

const CLI_DEFAULT_TIMEOUT_SECS: u64 = 30;

/// tkrec - A TikTok live downloader
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// The username to be used for recording live stream
    username: String,

    /// Quality of the video to download [default: original]
    #[arg(short, long, value_parser = Quality::TOKENS, ignore_case = true)]
    quality: Option<String>,

    /// Proxy server to use, e.g. 127.0.0.1:8080
    #[arg(long)]
    proxy: Option<String>,

    /// Wait until the user goes live to start downloading
    #[arg(long = "wait_until_live")]
    wait_until_live: bool,

    /// Seconds to wait before checking again if the user is live [default: 30]
    #[arg(long)]
    timeout: Option<u64>,

    /// Logging level
    #[arg(long = "log_level", value_parser = ["debug", "info", "warn", "error"], ignore_case = true)]
    log_level: Option<String>,

    /// Program data directory holding config.toml and downloads
    #[arg(long = "data_dir")]
    data_dir: Option<PathBuf>,
}

fn init_logger(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level.and_then(|l| log::LevelFilter::from_str(l).ok()) {
        builder.filter_level(level);
    }
    builder.init();
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler, never cancel
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level.as_deref());

    let paths = Paths::new(args.data_dir.as_deref());
    if let Err(e) = paths.initialize() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let overrides = Overrides {
        proxy: args.proxy.clone(),
        quality: args.quality.clone(),
        wait_until_live: args.wait_until_live.then_some(true),
        timeout: args.timeout,
    };
    let mut options = match Options::load(&paths.config_file, overrides) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if options.get_option(OptionKey::Timeout).is_none() {
        options.overrides.timeout = Some(CLI_DEFAULT_TIMEOUT_SECS);
    }

    let mut recorder = match Recorder::new(options, paths, Box::new(YtDlp::default())) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match recorder
        .download(&args.username, &mut ConsoleCountdown, interrupted())
        .await
    {
        Ok(WaitOutcome::Live) => {
            println!("Finished downloading @{}", args.username);
            ExitCode::SUCCESS
        }
        Ok(WaitOutcome::Cancelled) => {
            println!("\nChecking cancelled by user. Exiting...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Recording @{} failed: {:?}", args.username, e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
