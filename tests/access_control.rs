mod common;

use common::{harness, harness_with, Outbound};
use rconbot::bot::Session;
use rconbot::config::Config;

fn restricted() -> Config {
    let mut config = Config::default();
    config.bot.admin_ids = vec![1, 2];
    config
}

#[tokio::test]
async fn strangers_are_turned_away_everywhere() {
    let h = harness_with(restricted());
    let id = h.add_server(1, "Ops").await;
    let mut s = Session::new(999);

    h.text(&mut s, "/start").await;
    h.text(&mut s, "list").await;
    h.press(&mut s, "add_server").await;
    h.press(&mut s, &format!("delete_server_{}", id)).await;
    h.press(&mut s, &format!("server_status_{}", id)).await;

    assert!(s.flow.is_idle());
    assert!(h.console.commands().is_empty());
    assert!(h.registry.list(999).await.unwrap().is_empty());
    assert_eq!(h.registry.list(1).await.unwrap().len(), 1);

    let sent = h.transport.all();
    assert_eq!(sent.len(), 5);
    assert!(sent.iter().all(|o| o.text() == Some("⛔ Access denied.")));
    // Button presses get a toast, not a chat message.
    assert!(matches!(sent[2], Outbound::Answer { .. }));
}

#[tokio::test]
async fn listed_admins_get_through() {
    let h = harness_with(restricted());
    let mut s = Session::new(2);
    h.text(&mut s, "/help").await;
    assert!(h.transport.any_text_contains("/start - show your servers"));
    assert!(!h.transport.any_text_contains("Access denied"));
}

#[tokio::test]
async fn empty_allow_list_admits_everyone() {
    let h = harness();
    let mut s = Session::new(123456);
    h.press(&mut s, "add_server").await;
    assert!(!s.flow.is_idle());
    assert!(!h.transport.any_text_contains("Access denied"));
}
