//! Per-user workers driven through the bot server's event loop.
mod common;

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use common::{harness, wait_for, Harness};
use rconbot::bot::{BotServer, InboundEvent};

struct Running {
    tx: mpsc::UnboundedSender<InboundEvent>,
    stop: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<anyhow::Result<()>>,
}

fn start(h: &Harness, ttl: Option<Duration>) -> Running {
    let (tx, rx) = mpsc::unbounded_channel();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = BotServer::new(h.router.clone(), rx, ttl);
    let server = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));
    Running { tx, stop, server }
}

fn text(user: i64, t: &str) -> InboundEvent {
    InboundEvent::from_text(user, t)
}

fn press(user: i64, data: &str) -> InboundEvent {
    InboundEvent::callback(user, format!("cb-{}", data), data)
}

#[tokio::test]
async fn idle_flow_expires_and_user_starts_over() {
    let h = harness();
    let run = start(&h, Some(Duration::from_millis(200)));

    run.tx.send(press(7, "add_server")).unwrap();
    run.tx.send(text(7, "Alpha")).unwrap();
    assert!(
        wait_for(
            || h.transport.any_text_contains("session expired"),
            Duration::from_secs(3)
        )
        .await
    );

    // The wizard is gone: this text is no longer taken as a host.
    run.tx.send(text(7, "example.org")).unwrap();
    assert!(
        wait_for(
            || h.transport.any_text_contains("Send /start to see your servers."),
            Duration::from_secs(3)
        )
        .await
    );
    assert!(h.registry.list(7).await.unwrap().is_empty());

    run.stop.send(()).unwrap();
    run.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_session_without_flow_expires_silently() {
    let h = harness();
    let run = start(&h, Some(Duration::from_millis(100)));

    run.tx.send(text(7, "/help")).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!h.transport.any_text_contains("session expired"));

    run.stop.send(()).unwrap();
    run.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn events_for_one_user_keep_their_order() {
    let h = harness();
    let id = h.add_server(7, "Alpha").await;
    h.console.set_delay(Duration::from_millis(5));
    let run = start(&h, None);

    run.tx.send(press(7, &format!("open_console_{}", id))).unwrap();
    let expected: Vec<String> = (0..20).map(|i| format!("say {}", i)).collect();
    for cmd in &expected {
        run.tx.send(text(7, cmd)).unwrap();
    }
    assert!(wait_for(|| h.console.commands().len() == 20, Duration::from_secs(5)).await);
    assert_eq!(h.console.commands(), expected);

    run.stop.send(()).unwrap();
    run.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn slow_server_does_not_block_other_users() {
    let h = harness();
    let a = h.add_server(1, "A").await;
    let b = h.add_server(2, "B").await;
    h.console.set_delay(Duration::from_millis(400));
    let run = start(&h, None);

    let started = Instant::now();
    run.tx.send(press(1, &format!("server_status_{}", a))).unwrap();
    run.tx.send(press(2, &format!("server_status_{}", b))).unwrap();
    assert!(
        wait_for(
            || h.transport.texts_for(1).len() == 1 && h.transport.texts_for(2).len() == 1,
            Duration::from_secs(3)
        )
        .await
    );
    // Run serially the two calls would need at least 800ms.
    assert!(started.elapsed() < Duration::from_millis(750));

    run.stop.send(()).unwrap();
    run.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn closing_the_channel_drains_queued_events() {
    let h = harness();
    let run = start(&h, None);
    for _ in 0..3 {
        run.tx.send(text(9, "/help")).unwrap();
    }
    drop(run.tx);
    run.server.await.unwrap().unwrap();
    assert_eq!(h.transport.texts_for(9).len(), 3);
    drop(run.stop);
}
