mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use sigwatch::config::AppConfig;
use sigwatch::db::lease_repo;
use sigwatch::models::{Mode, Side, Zone};
use sigwatch::services::run_supervisor;
use sigwatch::Service;

use common::{
    activate_signal, get_signal, make_draft, seed_signal, setup_test_db, MockOracle, RecordingSink,
};

const TTL: u64 = 30;

// ---------------------------------------------------------------------------
// Acquire / renew CAS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_only_one_owner_holds_a_valid_lease() {
    let (pool, _dir) = setup_test_db().await;
    let now = Utc::now();

    assert!(lease_repo::try_acquire_or_renew(&pool, "node-a", TTL, now)
        .await
        .unwrap());
    assert!(!lease_repo::try_acquire_or_renew(&pool, "node-b", TTL, now)
        .await
        .unwrap());

    let (owner, _) = lease_repo::current(&pool).await.unwrap().unwrap();
    assert_eq!(owner, "node-a");
}

#[tokio::test]
async fn test_owner_renewal_extends_the_lease() {
    let (pool, _dir) = setup_test_db().await;
    let t0 = Utc::now();

    assert!(lease_repo::try_acquire_or_renew(&pool, "node-a", TTL, t0)
        .await
        .unwrap());

    // Renew shortly before expiry; the challenger right after the original
    // expiry instant still loses, because the expiry moved.
    let t1 = t0 + Duration::seconds(TTL as i64 - 5);
    assert!(lease_repo::try_acquire_or_renew(&pool, "node-a", TTL, t1)
        .await
        .unwrap());

    let t2 = t0 + Duration::seconds(TTL as i64 + 1);
    assert!(!lease_repo::try_acquire_or_renew(&pool, "node-b", TTL, t2)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_expired_lease_can_be_taken_over() {
    let (pool, _dir) = setup_test_db().await;
    let t0 = Utc::now();

    assert!(lease_repo::try_acquire_or_renew(&pool, "node-a", TTL, t0)
        .await
        .unwrap());

    let after_expiry = t0 + Duration::seconds(TTL as i64 + 1);
    assert!(
        lease_repo::try_acquire_or_renew(&pool, "node-b", TTL, after_expiry)
            .await
            .unwrap()
    );

    let (owner, _) = lease_repo::current(&pool).await.unwrap().unwrap();
    assert_eq!(owner, "node-b");

    // The ousted owner's own renewal now fails.
    assert!(
        !lease_repo::try_acquire_or_renew(&pool, "node-a", TTL, after_expiry)
            .await
            .unwrap()
    );
}

// ---------------------------------------------------------------------------
// Supervisor: renewal failure halts mutation
// ---------------------------------------------------------------------------

fn test_config() -> AppConfig {
    AppConfig {
        database_path: String::new(),
        price_proxy_url: String::new(),
        bot_token: None,
        source_chat_id: None,
        target_chat_id: None,
        activation_window_days: 5,
        reporting_window_days: 30,
        entry2_disable_profit_pct: Decimal::from(15),
        leverage_multiplier: Decimal::from(10),
        tick_interval_secs: 1,
        poll_interval_secs: 1,
        mirror_interval_secs: 60,
        dashboard_rows: 30,
        lease_ttl_secs: 2,
        lease_renew_secs: 1,
        metrics_addr: None,
    }
}

#[tokio::test]
async fn test_renewal_failure_halts_all_writes() {
    let (pool, _dir) = setup_test_db().await;
    let oracle = Arc::new(MockOracle::new());
    let sink = Arc::new(RecordingSink::new());

    // An activated signal one tick away from a target hit, but with no
    // price yet, so the running monitor cannot write anything.
    let now = Utc::now();
    let draft = make_draft(
        1,
        "BTCUSDT",
        Side::Long,
        Mode::Wait,
        Zone::new(dec!(99), dec!(101)),
        None,
        vec![dec!(105)],
    );
    let id = seed_signal(&pool, &draft, now).await;
    activate_signal(&pool, id, dec!(100), now).await;

    let service = Service {
        pool: pool.clone(),
        config: test_config(),
        oracle: oracle.clone(),
        sink: sink.clone(),
        source: None,
    };
    let supervisor = tokio::spawn(run_supervisor(service));

    // Wait for leadership.
    let mut leader = None;
    for _ in 0..50 {
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        if let Some((owner, _)) = lease_repo::current(&pool).await.unwrap() {
            leader = Some(owner);
            break;
        }
    }
    let leader = leader.expect("supervisor never acquired the lease");

    // Steal the lease out from under it with a far-future expiry. The next
    // renewal is denied and the fence must drop.
    let far = (Utc::now() + Duration::hours(1)).timestamp_millis();
    sqlx::query("UPDATE leader_lease SET owner = 'intruder', expires_at = ?1")
        .bind(far)
        .execute(&pool)
        .await
        .unwrap();

    // Give the supervisor time to fail a renewal and drain its writers.
    tokio::time::sleep(StdDuration::from_millis(2500)).await;

    // Only now does a price appear that would hit the target. A live
    // monitor would consume it within a tick; a fenced one writes nothing.
    oracle.set("BTCUSDT", dec!(106));
    tokio::time::sleep(StdDuration::from_millis(2500)).await;

    let signal = get_signal(&pool, id).await;
    assert_eq!(signal.tp_hits, 0, "fenced leader must not write");
    assert!(sink
        .events()
        .iter()
        .all(|e| e.kind != sigwatch::models::EventKind::TargetHit));

    // The intruder still owns the lease; the old leader never re-acquired.
    let (owner, _) = lease_repo::current(&pool).await.unwrap().unwrap();
    assert_eq!(owner, "intruder");
    assert_ne!(owner, leader);

    supervisor.abort();
}
