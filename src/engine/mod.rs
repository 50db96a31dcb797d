pub mod rules;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::db::signal_repo;
use crate::errors::EngineError;
use crate::models::event::{EventKind, SignalEvent};
use crate::models::signal::Signal;
use crate::models::Mode;
use crate::oracle::PriceOracle;
use crate::sink::EventSink;

/// Lifecycle tunables, copied out of the app config at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub activation_window_days: i64,
    pub reporting_window_days: i64,
    pub entry2_disable_profit_pct: Decimal,
    pub leverage_multiplier: Decimal,
}

impl From<&AppConfig> for EngineConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            activation_window_days: cfg.activation_window_days,
            reporting_window_days: cfg.reporting_window_days,
            entry2_disable_profit_pct: cfg.entry2_disable_profit_pct,
            leverage_multiplier: cfg.leverage_multiplier,
        }
    }
}

/// What one tick did, for the monitor loop's log line.
#[derive(Debug, Default)]
pub struct TickReport {
    pub signals: usize,
    pub processed: u32,
    pub events: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Advances every live signal one step against the current price. All state
/// changes go through the store before the matching event is published, so a
/// crash between the two loses the emission but never un-persists the change.
pub struct LifecycleEngine {
    pool: SqlitePool,
    oracle: Arc<dyn PriceOracle>,
    sink: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl LifecycleEngine {
    pub fn new(
        pool: SqlitePool,
        oracle: Arc<dyn PriceOracle>,
        sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            pool,
            oracle,
            sink,
            config,
        }
    }

    /// One pass over all live signals. Prices are looked up once per symbol;
    /// a failed lookup skips that symbol's signals until the next tick. The
    /// fence is re-checked between signals so a revoked leader finishes the
    /// signal in hand and stops.
    pub async fn tick(
        &self,
        now: DateTime<Utc>,
        fence: &AtomicBool,
    ) -> Result<TickReport, EngineError> {
        let start = Instant::now();

        let signals = signal_repo::list_active(&self.pool).await?;
        gauge!("active_signals").set(signals.len() as f64);

        let mut report = TickReport {
            signals: signals.len(),
            ..TickReport::default()
        };
        let mut prices: HashMap<String, Option<Decimal>> = HashMap::new();

        for signal in &signals {
            if !fence.load(Ordering::Relaxed) {
                tracing::info!("leadership fence dropped mid-tick, stopping early");
                break;
            }

            let cached = match prices.get(&signal.symbol) {
                Some(p) => *p,
                None => {
                    let fetched = match self.oracle.price(&signal.symbol).await {
                        Ok(p) => Some(p),
                        Err(e) => {
                            counter!("price_lookup_failures_total").increment(1);
                            tracing::warn!(
                                symbol = %signal.symbol,
                                error = %e,
                                "price unavailable this tick"
                            );
                            None
                        }
                    };
                    prices.insert(signal.symbol.clone(), fetched);
                    fetched
                }
            };

            let price = match cached {
                Some(p) => p,
                None => {
                    report.skipped += 1;
                    continue;
                }
            };

            match self.process_signal(signal, price, now).await {
                Ok(events) => {
                    report.processed += 1;
                    report.events += events;
                }
                Err(EngineError::InvariantViolation { signal_id, detail }) => {
                    tracing::error!(
                        signal_id,
                        symbol = %signal.symbol,
                        detail = %detail,
                        "invariant violation, signal left untouched this tick"
                    );
                    report.failed += 1;
                }
                Err(EngineError::Store(e)) => {
                    tracing::error!(
                        signal_id = signal.id,
                        error = %e,
                        "store write failed, state re-derives next tick"
                    );
                    report.failed += 1;
                }
            }
        }

        histogram!("tick_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Advance a single signal. Steps, in order: expiry, entry activation,
    /// high-water tracking, secondary-entry activation, one-shot notices,
    /// target scan. Returns the number of events published.
    async fn process_signal(
        &self,
        signal: &Signal,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<u32, EngineError> {
        let cfg = &self.config;
        let mut emitted = 0u32;

        // Not yet activated: WAIT signals activate on a zone touch, MARKET
        // signals belong to ingestion and are left alone here.
        if !signal.activated {
            if signal.mode != Mode::Wait {
                return Ok(0);
            }
            if !rules::within_days(now, signal.created_at, cfg.activation_window_days) {
                return Ok(0);
            }

            let into_entry2 = if signal.entry1.contains(price) {
                Some(false)
            } else if signal.entry2.is_some_and(|z| z.contains(price)) {
                Some(true)
            } else {
                None
            };

            if let Some(into_entry2) = into_entry2 {
                signal_repo::mark_activated(&self.pool, signal.id, price, now, into_entry2)
                    .await?;
                counter!("activations_total").increment(1);
                tracing::info!(
                    signal_id = signal.id,
                    symbol = %signal.symbol,
                    price = %price,
                    into_entry2,
                    "wait signal activated"
                );
                self.sink
                    .publish(&SignalEvent::with_price(
                        signal,
                        EventKind::Activated,
                        price,
                        now,
                    ))
                    .await;
                emitted += 1;

                if into_entry2 {
                    counter!("entry2_activations_total").increment(1);
                    self.sink
                        .publish(&SignalEvent::with_price(
                            signal,
                            EventKind::Entry2Activated,
                            price,
                            now,
                        ))
                        .await;
                    emitted += 1;
                }
            }

            // Activation consumes the signal's tick; targets start next tick.
            return Ok(emitted);
        }

        let activated_price = signal.activated_price.ok_or(EngineError::InvariantViolation {
            signal_id: signal.id,
            detail: "activated signal has no activation price".to_string(),
        })?;
        let activated_at = signal.activated_at.ok_or(EngineError::InvariantViolation {
            signal_id: signal.id,
            detail: "activated signal has no activation time".to_string(),
        })?;

        // Reporting window runs from activation, not creation.
        if !rules::within_days(now, activated_at, cfg.reporting_window_days) {
            signal_repo::mark_expired(&self.pool, signal.id).await?;
            counter!("expiries_total").increment(1);
            tracing::info!(
                signal_id = signal.id,
                symbol = %signal.symbol,
                "reporting window over, signal expired"
            );
            self.sink
                .publish(&SignalEvent::plain(signal, EventKind::Expired, now))
                .await;
            return Ok(emitted + 1);
        }

        // High-water profit, measured from the first entry. Once it has ever
        // cleared the disable threshold the secondary entry stays off for
        // good, even after price falls back.
        let profit = rules::signed_profit_pct(price, activated_price, signal.side);
        let high_water = match signal.high_water_pct {
            Some(hw) => hw.max(profit),
            None => profit,
        };
        if signal.high_water_pct != Some(high_water) {
            signal_repo::set_high_water(&self.pool, signal.id, high_water).await?;
        }

        let mut entry2_active = signal.entry2_activated;
        let mut entry2_price = signal.entry2_activated_price;
        let mut tp1_armed = signal.tp1_refire_armed;

        if !entry2_active {
            if let Some(zone) = signal.entry2 {
                let in_window =
                    rules::within_days(now, signal.created_at, cfg.activation_window_days);
                if in_window
                    && high_water < cfg.entry2_disable_profit_pct
                    && zone.contains(price)
                {
                    // The refire notice only makes sense when a target was
                    // already hit from the first entry.
                    let arm = signal.tp_hits >= 1;
                    signal_repo::mark_entry2_activated(&self.pool, signal.id, price, now, arm)
                        .await?;
                    counter!("entry2_activations_total").increment(1);
                    tracing::info!(
                        signal_id = signal.id,
                        symbol = %signal.symbol,
                        price = %price,
                        arm_tp1_refire = arm,
                        "secondary entry activated"
                    );
                    self.sink
                        .publish(&SignalEvent::with_price(
                            signal,
                            EventKind::Entry2Activated,
                            price,
                            now,
                        ))
                        .await;
                    emitted += 1;

                    entry2_active = true;
                    entry2_price = Some(price);
                    tp1_armed = arm;
                }
            }
        }

        // One-shot: price back at the average of both fills.
        if entry2_active && !signal.avg_reclaimed {
            if let Some(e2) = entry2_price {
                let mean = (activated_price + e2) / Decimal::from(2);
                if rules::reached(price, mean, signal.side) {
                    signal_repo::mark_avg_reclaimed(&self.pool, signal.id).await?;
                    self.sink
                        .publish(&SignalEvent::with_price(
                            signal,
                            EventKind::AvgReclaimed,
                            mean,
                            now,
                        ))
                        .await;
                    emitted += 1;
                }
            }
        }

        // One-shot: first target touched again after the secondary fill.
        if entry2_active && tp1_armed && !signal.tp1_refired {
            if let Some(&tp1) = signal.targets.first() {
                if rules::reached(price, tp1, signal.side) {
                    signal_repo::mark_tp1_refired(&self.pool, signal.id).await?;

                    let e2_profit = entry2_price
                        .map(|e2| rules::signed_profit_pct(tp1, e2, signal.side));
                    let event = SignalEvent {
                        index: Some(1),
                        price: Some(tp1),
                        entry2_profit_pct: e2_profit,
                        entry2_leveraged_profit_pct: e2_profit
                            .map(|p| p * cfg.leverage_multiplier),
                        ..SignalEvent::plain(signal, EventKind::Tp1Refire, now)
                    };
                    self.sink.publish(&event).await;
                    emitted += 1;
                }
            }
        }

        // Target scan. tp_hits only ever grows, and one tick may consume
        // several consecutive targets when price gapped past them.
        let total = signal.targets.len() as u32;
        if signal.tp_hits > total {
            return Err(EngineError::InvariantViolation {
                signal_id: signal.id,
                detail: format!("tp_hits {} exceeds {} targets", signal.tp_hits, total),
            });
        }

        let mut tp_hits = signal.tp_hits;
        while (tp_hits as usize) < signal.targets.len() {
            let level = signal.targets[tp_hits as usize];
            if !rules::reached(price, level, signal.side) {
                break;
            }

            tp_hits += 1;
            signal_repo::set_tp_hits(&self.pool, signal.id, tp_hits).await?;
            counter!("target_hits_total").increment(1);
            tracing::info!(
                signal_id = signal.id,
                symbol = %signal.symbol,
                index = tp_hits,
                level = %level,
                "target hit"
            );

            // Profit is measured at the target level, not the live price
            // that overshot it.
            let tp_profit = rules::signed_profit_pct(level, activated_price, signal.side);
            let e2_profit = if entry2_active {
                entry2_price.map(|e2| rules::signed_profit_pct(level, e2, signal.side))
            } else {
                None
            };

            let event = SignalEvent {
                index: Some(tp_hits),
                price: Some(level),
                profit_pct: Some(tp_profit),
                leveraged_profit_pct: Some(tp_profit * cfg.leverage_multiplier),
                entry2_profit_pct: e2_profit,
                entry2_leveraged_profit_pct: e2_profit.map(|p| p * cfg.leverage_multiplier),
                ..SignalEvent::plain(signal, EventKind::TargetHit, now)
            };
            self.sink.publish(&event).await;
            emitted += 1;
        }

        Ok(emitted)
    }
}
