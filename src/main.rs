use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use padlink::{spawn_pad_source, AppConfig, LinkEvent, LinkHandle};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load_or_init().await?;
    info!(
        "Streaming to {}:{} as {}",
        config.server.host, config.server.port, config.device.device_name
    );

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let link = LinkHandle::new(config.device.clone(), event_tx);

    // The event logger doubles as the shutdown watcher: Closed fires once
    // per session, whichever side ended it.
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut closed_tx = Some(closed_tx);
        while let Some(event) = event_rx.recv().await {
            match event {
                LinkEvent::Status { text, pad_id } => match pad_id {
                    Some(id) => info!("{} (pad {})", text, id),
                    None => info!("{}", text),
                },
                LinkEvent::Vibration {
                    left_motor,
                    right_motor,
                } => {
                    info!(
                        "Rumble request: left={:.2} right={:.2}",
                        left_motor, right_motor
                    );
                }
                LinkEvent::Closed => {
                    if let Some(tx) = closed_tx.take() {
                        let _ = tx.send(());
                    }
                }
            }
        }
    });

    link.connect(&config.server.host, config.server.port)
        .await
        .map_err(|e| eyre!("Could not reach server: {}", e))?;

    let _pad_source = spawn_pad_source(link.clone(), config.source);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            link.disconnect().await;
        }
        _ = closed_rx => {
            warn!("Session ended by server");
        }
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
