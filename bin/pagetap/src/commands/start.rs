use pagetap_core::ServerOptions;
use tokio::sync::broadcast;
use tracing::info;

pub async fn run(options: ServerOptions) -> anyhow::Result<()> {
    let options = options.with_env_fallbacks();
    let addr = format!("{}:{}", options.host, options.port);

    println!("Starting pagetap on {}", addr);
    println!("Point your instrumented app at ws://{}/ws", addr);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut server = tokio::spawn(pagetap_server::run(options, shutdown_tx.clone()));

    tokio::select! {
        // Server ended on its own: bind failure or fatal serve error.
        res = &mut server => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(());
            server.await??;
        }
    }

    Ok(())
}
