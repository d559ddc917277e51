// Lease expiry recovery
use crate::application::worker::constants::DEFAULT_REAPER_INTERVAL;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::JobBroker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Periodically hands jobs whose worker lease ran out back to the queue.
///
/// A worker that crashes mid-job never acknowledges it; once the lease
/// expires the job is `waiting` again and another worker picks it up.
pub struct LeaseReaper {
    broker: Arc<dyn JobBroker>,
    interval: Duration,
}

impl LeaseReaper {
    pub fn new(broker: Arc<dyn JobBroker>, interval: Option<Duration>) -> Self {
        Self {
            broker,
            interval: interval.unwrap_or(DEFAULT_REAPER_INTERVAL),
        }
    }

    /// One sweep. Returns the number of jobs handed back.
    pub async fn reap_once(&self) -> Result<usize> {
        let reclaimed = self.broker.reclaim_expired_leases().await?;
        for job_id in &reclaimed {
            warn!(job_id = %job_id, "Lease expired, job returned to waiting");
        }
        Ok(reclaimed.len())
    }

    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(interval_ms = self.interval.as_millis() as u64, "Lease reaper started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.reap_once().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Expired leases reclaimed"),
                Err(e) => error!(error = %e, "Lease sweep failed"),
            }
            tokio::select! {
                _ = sleep(self.interval) => {},
                _ = shutdown.wait() => break,
            }
        }
        info!("Lease reaper stopped");
        Ok(())
    }
}
