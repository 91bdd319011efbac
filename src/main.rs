use chconn::args::AppArgs;
use chconn::bridge::bridge;
use chconn::logging::init_logging;
use chconn::ssh::SshClient;
use chconn::types::AppResult;
use clap::Parser;
use std::sync::Arc;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AppResult<()> {
    let args = AppArgs::parse();
    init_logging(args.log_level)?;

    let config = args.conn_config()?;
    let client = SshClient::connect(&args.ssh_settings()?).await?;
    let conn = Arc::new(
        client
            .open_direct(&args.target_host, args.target_port, config)
            .await?,
    );

    let mut stdout = tokio::io::stdout();
    let result = bridge(conn.clone(), tokio::io::stdin(), &mut stdout, args.idle_timeout()).await;

    if let Err(e) = conn.close().await {
        log::warn!("Failed to close connection to {}: {e}", conn.remote_addr());
    }

    let stats = result?;
    log::info!(
        "Sent {} bytes, received {} bytes from {}:{}",
        stats.sent,
        stats.received,
        args.target_host,
        args.target_port
    );
    Ok(())
}
