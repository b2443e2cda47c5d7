use chopsticks_cli::{run_cli, Cli};
use clap::Parser;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run_cli(cli).await {
        error!(error = %e, "chopsticks CLI exited with an error");
        std::process::exit(e.exit_code());
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chopsticks_cli=info,chopsticks_coordinator=info"));
    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
