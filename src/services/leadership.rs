use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::db::lease_repo;
use crate::engine::{EngineConfig, LifecycleEngine};
use crate::services::{ingestor, mirror, monitor};
use crate::Service;

/// Run the leadership supervisor. Repeats forever: wait for the lease, raise
/// the fence, spawn the writer tasks, renew on a fixed cadence, and on the
/// first failed renewal drop the fence and drain the tasks before competing
/// for the lease again.
///
/// Renewal denial and renewal error are treated the same. Ownership that
/// cannot be confirmed does not authorize writes.
pub async fn run_supervisor(service: Service) {
    let owner = owner_id();
    let ttl_secs = service.config.lease_ttl_secs;
    let renew_secs = service.config.lease_renew_secs;

    tracing::info!(
        owner = %owner,
        ttl_secs = ttl_secs,
        renew_secs = renew_secs,
        "leadership supervisor started"
    );

    // One cadence for both acquisition polling and renewal.
    let mut ticker = interval(Duration::from_secs(renew_secs));

    loop {
        ticker.tick().await;

        match lease_repo::try_acquire_or_renew(&service.pool, &owner, ttl_secs, Utc::now()).await
        {
            Ok(true) => {}
            Ok(false) => {
                gauge!("is_leader").set(0.0);
                tracing::debug!("lease held elsewhere, standing by");
                continue;
            }
            Err(e) => {
                gauge!("is_leader").set(0.0);
                tracing::error!(error = %e, "lease acquisition failed");
                continue;
            }
        }

        tracing::info!(owner = %owner, "leadership acquired");
        gauge!("is_leader").set(1.0);

        let fence = Arc::new(AtomicBool::new(true));
        let writers = spawn_writers(&service, &fence);

        loop {
            ticker.tick().await;

            match lease_repo::try_acquire_or_renew(&service.pool, &owner, ttl_secs, Utc::now())
                .await
            {
                Ok(true) => {
                    tracing::debug!("lease renewed");
                }
                Ok(false) => {
                    counter!("lease_renewal_failures_total").increment(1);
                    tracing::warn!(owner = %owner, "lease renewal denied, stepping down");
                    break;
                }
                Err(e) => {
                    counter!("lease_renewal_failures_total").increment(1);
                    tracing::error!(error = %e, "lease renewal errored, stepping down");
                    break;
                }
            }
        }

        gauge!("is_leader").set(0.0);
        fence.store(false, Ordering::Relaxed);

        for handle in writers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "writer task panicked");
            }
        }
        tracing::info!(owner = %owner, "writer tasks drained after step-down");
    }
}

/// Spawn the tasks that write under the lease: the lifecycle monitor, the
/// draft ingestor when a source is configured, and the snapshot mirror.
fn spawn_writers(service: &Service, fence: &Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
    let engine = Arc::new(LifecycleEngine::new(
        service.pool.clone(),
        service.oracle.clone(),
        service.sink.clone(),
        EngineConfig::from(&service.config),
    ));

    let mut handles = vec![tokio::spawn(monitor::run_monitor(
        engine,
        service.config.tick_interval_secs,
        fence.clone(),
    ))];

    if let Some(source) = &service.source {
        handles.push(tokio::spawn(ingestor::run_ingestor(
            service.pool.clone(),
            source.clone(),
            service.oracle.clone(),
            service.sink.clone(),
            service.config.poll_interval_secs,
            fence.clone(),
        )));
    }

    handles.push(tokio::spawn(mirror::run_mirror(
        service.pool.clone(),
        service.sink.clone(),
        service.config.mirror_interval_secs,
        service.config.dashboard_rows,
        fence.clone(),
    )));

    handles
}

/// Stable-enough identity for one process: host name plus a random suffix,
/// so restarts compete as new owners instead of inheriting a stale lease.
fn owner_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "sigwatch".to_string());
    format!("{}-{}", host, Uuid::new_v4())
}
