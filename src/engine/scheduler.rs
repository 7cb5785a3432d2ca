use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{Engine, local_now};

/// Poll every deployed form on a fixed interval for the lifetime of the server.
/// Passes are skipped while no identity file exists.
pub fn spawn_scheduler(engine: Arc<Engine>, every: Duration, identity_file: PathBuf) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if !identity_file.exists() {
                log::debug!("Slot engine idle: no cloud identity connected");
                continue;
            }
            log::info!("Running slot engine");
            engine.run_all(local_now()).await;
        }
    });
}
