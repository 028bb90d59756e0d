//! Outbound pump: queue -> link.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use parley_types::message::ChatMessage;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::Frame;

/// Drain `queue` onto `sink` as JSON text frames until the queue closes or
/// a write fails.
///
/// A ping is sent whenever `ping_interval` passes without an application
/// message. When the queue closes a close frame is written. The sink is
/// always closed on exit.
pub async fn write_pump<K>(mut queue: mpsc::Receiver<ChatMessage>, sink: K, ping_interval: Duration)
where
    K: Sink<Frame>,
    K::Error: Display,
{
    let mut sink = std::pin::pin!(sink);
    let mut keepalive = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(message) = next else {
                    if let Err(e) = sink.send(Frame::Close).await {
                        debug!(error = %e, "close frame not sent");
                    }
                    break;
                };

                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, room_id = %message.room_id, "failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(text)).await {
                    debug!(error = %e, "outbound write failed");
                    break;
                }
                keepalive.reset();
            }
            _ = keepalive.tick() => {
                if let Err(e) = sink.send(Frame::Ping(Vec::new())).await {
                    debug!(error = %e, "keepalive ping failed");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::message::MessageType;
    use tokio_util::sync::PollSender;

    fn channel_sink() -> (PollSender<Frame>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        (PollSender::new(tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_written_as_json_text() {
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (sink, mut frames) = channel_sink();
        let pump = tokio::spawn(write_pump(queue_rx, sink, Duration::from_secs(30)));

        queue_tx
            .send(ChatMessage::chat("lobby", "alice", "hello"))
            .await
            .unwrap();

        match frames.recv().await.unwrap() {
            Frame::Text(text) => {
                let msg: ChatMessage = serde_json::from_str(&text).unwrap();
                assert_eq!(msg.content, "hello");
                assert_eq!(msg.message_type, MessageType::Chat);
            }
            other => panic!("expected text frame, got {other:?}"),
        }

        drop(queue_tx);
        pump.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_sends_close_and_closes_sink() {
        let (queue_tx, queue_rx) = mpsc::channel::<ChatMessage>(4);
        let (sink, mut frames) = channel_sink();
        drop(queue_tx);

        write_pump(queue_rx, sink, Duration::from_secs(30)).await;

        assert_eq!(frames.recv().await, Some(Frame::Close));
        assert_eq!(frames.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_ping_when_idle() {
        let (queue_tx, queue_rx) = mpsc::channel::<ChatMessage>(4);
        let (sink, mut frames) = channel_sink();
        let pump = tokio::spawn(write_pump(queue_rx, sink, Duration::from_secs(30)));

        let started = Instant::now();
        assert_eq!(frames.recv().await, Some(Frame::Ping(Vec::new())));
        assert!(started.elapsed() >= Duration::from_secs(30));

        drop(queue_tx);
        pump.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_application_message_postpones_ping() {
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (sink, mut frames) = channel_sink();
        let pump = tokio::spawn(write_pump(queue_rx, sink, Duration::from_secs(30)));
        let started = Instant::now();

        tokio::time::sleep(Duration::from_secs(20)).await;
        queue_tx
            .send(ChatMessage::chat("lobby", "alice", "still here"))
            .await
            .unwrap();
        assert!(matches!(frames.recv().await, Some(Frame::Text(_))));

        // Next ping is 30s after the message, not 30s after start.
        assert_eq!(frames.recv().await, Some(Frame::Ping(Vec::new())));
        assert!(started.elapsed() >= Duration::from_secs(50));

        drop(queue_tx);
        pump.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_stops_pump() {
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (sink, frames) = channel_sink();
        drop(frames);

        queue_tx
            .send(ChatMessage::chat("lobby", "alice", "lost"))
            .await
            .unwrap();

        // Returns even though the queue sender is still alive.
        write_pump(queue_rx, sink, Duration::from_secs(30)).await;
        assert!(queue_tx.is_closed());
    }
}
