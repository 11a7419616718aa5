use anyhow::Context as _;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use inlama::{Args, OllamaClient, config, metrics, session};

fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    if let Some(shell) = args.completion {
        let mut cmd = Args::command();
        generate(shell, &mut cmd, "inlama", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&args);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(run(&args));
    // a blocked stdin read never returns on its own, don't wait for it
    runtime.shutdown_background();

    if args.metrics {
        match metrics::render() {
            Ok(text) => eprint!("{text}"),
            Err(e) => tracing::warn!(error = %e, "failed to render metrics"),
        }
    }

    result
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = config::load(args).context("failed to load configuration")?;
    tracing::info!(
        model = %config.model,
        url = %config.url,
        follow = config.stream,
        "starting"
    );

    let client = OllamaClient::new(reqwest::Client::new(), &config.url);
    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    if config.stream {
        session::stream(&config, input, output, client)
            .await
            .context("streaming session failed")?;
    } else {
        session::oneshot(&config, input, output, &client)
            .await
            .context("request failed")?;
    }
    Ok(())
}

// logs go to stderr, stdout only carries the model's answer
fn init_tracing(args: &Args) {
    let level = match args.verbose {
        0 if args.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
