//! WebSocket write pump: serialises outbound frames and keeps an idle
//! connection alive.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Writes queued frames to the WebSocket.
///
/// A ping goes out only after `keepalive` without any outbound frame: while
/// segments are streaming they already prove the link is alive to the
/// service's read deadline.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    keepalive: Duration,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let mut idle = tokio::time::interval(keepalive);
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
    idle.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            break;
                        }
                        idle.reset();
                    }
                    None => break,
                }
            }
            _ = idle.tick() => {
                if let Err(e) = write.send(tungstenite::Message::Ping(Vec::new().into())).await {
                    error!("WebSocket ping error: {e}");
                    break;
                }
            }
        }
    }

    let _ = write.send(tungstenite::Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink;

    const LONG: Duration = Duration::from_secs(60);

    fn channel_sink(
        tx: mpsc::Sender<tungstenite::Message>,
    ) -> impl SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin {
        Box::pin(sink::unfold(tx, |tx, msg: tungstenite::Message| async move {
            let _ = tx.send(msg).await;
            Ok::<_, tungstenite::Error>(tx)
        }))
    }

    #[tokio::test]
    async fn write_pump_forwards_then_closes() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let (write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(write_pump(channel_sink(sink_tx), write_rx, LONG, cancel));

        write_tx
            .send(tungstenite::Message::Binary(b"frame".to_vec().into()))
            .await
            .unwrap();
        drop(write_tx);
        handle.await.unwrap();

        assert!(matches!(
            sink_rx.recv().await,
            Some(tungstenite::Message::Binary(b)) if b.as_ref() == b"frame"
        ));
        assert!(matches!(
            sink_rx.recv().await,
            Some(tungstenite::Message::Close(None))
        ));
    }

    #[tokio::test]
    async fn idle_connection_gets_pinged() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let (_write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(write_pump(
            channel_sink(sink_tx),
            write_rx,
            Duration::from_millis(20),
            cancel.clone(),
        ));

        let first = tokio::time::timeout(Duration::from_secs(2), sink_rx.recv())
            .await
            .expect("ping expected")
            .unwrap();
        assert!(matches!(first, tungstenite::Message::Ping(_)));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn write_pump_stops_on_cancel() {
        let (sink_tx, _sink_rx) = mpsc::channel::<tungstenite::Message>(16);
        let (_write_tx, write_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(write_pump(channel_sink(sink_tx), write_rx, LONG, c));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }
}
