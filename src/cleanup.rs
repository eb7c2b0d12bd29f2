//! Liveness monitor: shared periodic sweeps over the realm.
//!
//! One expiry task and one queue task per server, never per client. Both are
//! owned by the server lifecycle and aborted at shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::realm::client::now_millis;
use crate::realm::Realm;
use crate::ws::CLOSE_EXPIRED;

/// Spawn the expiry sweep: every sweep period, close and remove clients
/// whose last activity predates the alive timeout. Evicted peers get a
/// close frame but no error frame — they are presumed unreachable.
pub fn spawn_liveness_sweep(realm: Arc<Realm>, config: &Config) -> JoinHandle<()> {
    let alive_timeout = config.alive_timeout as i64;
    let period = Duration::from_millis(config.sweep_interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let cutoff = now_millis() - alive_timeout;
            for client in realm.stale_clients(cutoff) {
                tracing::info!(client_id = %client.id(), "closing expired connection");
                client.close(CLOSE_EXPIRED, "connection expired");
                // direct removal is the fallback for half-open sockets whose
                // close never surfaces at the transport layer
                realm.remove_if_same(client.id(), &client);
            }
        }
    })
}

/// Spawn the queue sweep: every sweep period, drop buffered messages older
/// than the retention window — notifying each dropped message's sender with
/// EXPIRE if it is still connected — and re-enforce the per-destination
/// buffer bound.
pub fn spawn_queue_sweep(realm: Arc<Realm>, config: &Config) -> JoinHandle<()> {
    let retention = config.expire_timeout as i64;
    let period = Duration::from_millis(config.sweep_interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let cutoff = now_millis() - retention;
            for notice in realm.sweep_queues(cutoff) {
                let Some(recipient) = notice.dst.as_deref() else {
                    continue;
                };
                if let Some(sender) = realm.lookup(recipient) {
                    sender.send(&notice);
                }
            }
        }
    })
}
