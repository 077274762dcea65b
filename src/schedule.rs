//! Timers that feed control events into the update engine.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::EngineEvent;

/// Enable alerts once the broker has connected and the grace period is over,
/// then send the first digest if `motd_on_start` is set.
///
/// The grace period starts at the first `ConnAck` so retained messages
/// delivered right after subscribing never fire alerts. If `connected` is
/// dropped before signalling, alerts stay disabled.
pub async fn schedule_startup(
    connected: oneshot::Receiver<()>,
    tx: mpsc::Sender<EngineEvent>,
    grace_period: Duration,
    motd_on_start: bool,
    cancel: CancellationToken,
) {
    tokio::select! {
        result = connected => {
            if result.is_err() {
                debug!("Transport stopped before connecting, alerts stay disabled");
                return;
            }
        }
        _ = cancel.cancelled() => return,
    }

    debug!(grace_secs = grace_period.as_secs(), "Broker connected, grace period started");

    tokio::select! {
        _ = tokio::time::sleep(grace_period) => {}
        _ = cancel.cancelled() => return,
    }

    info!("Grace period over, enabling alerts");
    let _ = tx.send(EngineEvent::EnableAlerts).await;
    if motd_on_start {
        let _ = tx.send(EngineEvent::SendStatus).await;
    }
}

/// Send the status digest every `period`.
pub async fn schedule_status(
    tx: mpsc::Sender<EngineEvent>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tx.send(EngineEvent::SendStatus).await.is_err() {
                    return;
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn grace_period_starts_at_connection() {
        let (connected_tx, connected_rx) = oneshot::channel();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tokio::spawn(schedule_startup(
            connected_rx,
            tx,
            GRACE,
            true,
            cancel.clone(),
        ));

        // Broker slower than the grace period.
        tokio::time::sleep(GRACE * 3).await;
        assert!(rx.try_recv().is_err());

        connected_tx.send(()).unwrap();
        tokio::time::sleep(GRACE - Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await, Some(EngineEvent::EnableAlerts));
        assert_eq!(rx.recv().await, Some(EngineEvent::SendStatus));
    }

    #[tokio::test(start_paused = true)]
    async fn no_digest_without_motd_on_start() {
        let (connected_tx, connected_rx) = oneshot::channel();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(schedule_startup(
            connected_rx,
            tx,
            GRACE,
            false,
            CancellationToken::new(),
        ));

        connected_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(rx.recv().await, Some(EngineEvent::EnableAlerts));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_stay_disabled_when_transport_never_connects() {
        let (connected_tx, connected_rx) = oneshot::channel::<()>();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(schedule_startup(
            connected_rx,
            tx,
            GRACE,
            true,
            CancellationToken::new(),
        ));

        drop(connected_tx);
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_connection_stops_startup() {
        let (_connected_tx, connected_rx) = oneshot::channel();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(schedule_startup(
            connected_rx,
            tx,
            GRACE,
            true,
            cancel.clone(),
        ));

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn status_ticks_after_each_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tokio::spawn(schedule_status(tx, Duration::from_secs(60), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(rx.recv().await, Some(EngineEvent::SendStatus));

        cancel.cancel();
    }
}
