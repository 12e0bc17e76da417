use clap::Parser;
use std::sync::Arc;

mod auth;
mod cli;
mod config;
mod error;
mod handlers;
mod http;
mod logger;
mod middleware;
mod models;
mod routing;
mod server;
mod store;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse();
    let mut cfg = config::Config::load_from(&cli.config)?;
    cli.apply(&mut cfg);

    if cli.dump_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    logger::init(&cfg)?;

    // Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        tracing::debug!(workers, "using configured worker threads");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let listener = server::bind_reusable(addr)?;

    let state = config::AppState::new(cfg)?;
    logger::log_server_start(&addr, &state.config);
    let app = Arc::new(handlers::App::new(state));

    // LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local.run_until(server::serve(listener, app)).await?;

    tracing::info!("server stopped");
    Ok(())
}
