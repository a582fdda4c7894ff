use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taski-mock-server", about = "In-memory Taski backend for local development")]
struct Cli {
    #[arg(long, env = "TASKI_MOCK_BIND", default_value = "127.0.0.1")]
    bind: String,

    #[arg(long, env = "TASKI_MOCK_PORT", default_value_t = 8000)]
    port: u16,

    /// Create this user (password = username) on startup
    #[arg(long, default_value = "demo")]
    demo_user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let state = taski_mock_server::new_state();
    if !cli.demo_user.is_empty() {
        let email = format!("{}@example.com", cli.demo_user);
        state
            .data()
            .create_user(&cli.demo_user, &email, &cli.demo_user)
            .map_err(|e| anyhow::anyhow!("seed demo user: {e:?}"))?;
        info!("seeded user {0} (password {0})", cli.demo_user);
    }

    let addr = SocketAddr::new(cli.bind.parse()?, cli.port);
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}/api");
    taski_mock_server::serve(listener, state).await
}
