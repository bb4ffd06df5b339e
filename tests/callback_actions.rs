mod common;

use common::{harness, Outbound};
use rconbot::bot::{Action, Flow, FlowTag, Session, WizardStep};
use rconbot::profile::ProfileId;

#[tokio::test]
async fn start_lists_servers_with_add_button() {
    let h = harness();
    let a = h.add_server(100, "Alpha").await;
    let b = h.add_server(100, "Beta").await;
    let mut s = Session::new(100);

    h.text(&mut s, "/start").await;
    let sent = h.transport.take();
    let Some(Outbound::Send { text, keyboard: Some(kb), .. }) = sent.first() else {
        panic!("expected a menu, got {:?}", sent);
    };
    assert!(text.contains("Welcome"));
    let labels: Vec<&str> = kb.buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Alpha (127.0.0.1)", "Beta (127.0.0.1)", "➕ Add server"]);
    assert!(kb.contains(Action::SelectServer(a)));
    assert!(kb.contains(Action::SelectServer(b)));
}

#[tokio::test]
async fn select_shows_card_and_actions() {
    let h = harness();
    let id = h.add_server(100, "Alpha").await;
    let mut s = Session::new(100);

    h.press(&mut s, &format!("select_server_{}", id)).await;
    let sent = h.transport.take();
    assert_eq!(
        sent[0],
        Outbound::Answer {
            callback_id: format!("cb-select_server_{}", id),
            toast: None
        }
    );
    match &sent[1] {
        Outbound::Edit { text, keyboard: Some(kb), .. } => {
            assert!(text.contains("Server: Alpha"));
            assert!(text.contains("Port: 25575"));
            assert!(kb.contains(Action::DeleteServer(id)));
            assert!(kb.contains(Action::BackToServers));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn stale_ids_answer_not_found() {
    let h = harness();
    let mut s = Session::new(100);
    for data in ["select_server_42", "server_status_42", "server_cmd_42", "open_console_42", "delete_server_42"] {
        h.press(&mut s, data).await;
        let sent = h.transport.take();
        assert_eq!(
            sent,
            vec![Outbound::Answer {
                callback_id: format!("cb-{}", data),
                toast: Some("Server not found.".into())
            }],
            "{}",
            data
        );
        assert!(s.flow.is_idle());
    }
    assert!(h.console.commands().is_empty());
}

#[tokio::test]
async fn other_users_servers_are_not_reachable() {
    let h = harness();
    let id = h.add_server(200, "Theirs").await;
    let mut s = Session::new(100);
    h.press(&mut s, &format!("delete_server_{}", id)).await;
    assert!(h.transport.any_text_contains("Server not found."));
    assert_eq!(h.registry.list(200).await.unwrap().len(), 1);
}

#[tokio::test]
async fn status_and_players_run_list() {
    let h = harness();
    let id = h.add_server(100, "Alpha").await;
    let mut s = Session::new(100);

    h.press(&mut s, &format!("server_status_{}", id)).await;
    h.press(&mut s, &format!("server_players_{}", id)).await;
    assert_eq!(h.console.commands(), vec!["list", "list"]);

    let edits: Vec<Outbound> = h
        .transport
        .all()
        .into_iter()
        .filter(|o| matches!(o, Outbound::Edit { .. }))
        .collect();
    assert_eq!(edits.len(), 2);
    match &edits[0] {
        Outbound::Edit { text, keyboard: Some(kb), .. } => {
            assert_eq!(text, "Server status:\nran: list");
            assert!(kb.contains(Action::SelectServer(id)));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(edits[1].text().unwrap().starts_with("Online players:"));
    assert!(s.flow.is_idle());
}

#[tokio::test]
async fn delete_removes_and_refreshes_menu() {
    let h = harness();
    let keep = h.add_server(100, "Keep").await;
    let gone = h.add_server(100, "Gone").await;
    let mut s = Session::new(100);

    h.press(&mut s, &format!("delete_server_{}", gone)).await;
    assert_eq!(h.registry.list(100).await.unwrap().len(), 1);
    assert!(h.transport.any_text_contains("Server 'Gone' deleted."));
    match h.transport.all().last() {
        Some(Outbound::Edit { keyboard: Some(kb), .. }) => {
            assert!(kb.contains(Action::SelectServer(keep)));
            assert!(!kb.contains(Action::SelectServer(gone)));
        }
        other => panic!("unexpected {:?}", other),
    }

    // Pressing it again is harmless.
    h.press(&mut s, &format!("delete_server_{}", gone)).await;
    assert_eq!(h.registry.list(100).await.unwrap().len(), 1);
}

#[tokio::test]
async fn flow_starting_buttons_wait_for_the_active_flow() {
    let h = harness();
    let id = h.add_server(100, "Alpha").await;
    let mut s = Session::new(100);
    h.press(&mut s, &format!("open_console_{}", id)).await;
    h.transport.take();

    h.press(&mut s, "add_server").await;
    h.press(&mut s, &format!("server_cmd_{}", id)).await;
    h.press(&mut s, "cancel_add").await;
    assert_eq!(s.flow, Flow::ConsoleMode { profile_id: id });
    let toasts = h.transport.texts();
    assert_eq!(toasts.len(), 3);
    assert!(toasts
        .iter()
        .all(|t| t == "Finish console mode first (/cancel or /close)."));

    // Plain navigation still works.
    h.press(&mut s, "back_to_servers").await;
    assert_eq!(s.flow, Flow::ConsoleMode { profile_id: id });
    assert!(matches!(h.transport.all().last(), Some(Outbound::Edit { .. })));
}

#[tokio::test]
async fn start_during_wizard_keeps_progress() {
    let h = harness();
    let mut s = Session::new(100);
    h.press(&mut s, "add_server").await;
    h.text(&mut s, "Alpha").await;
    h.text(&mut s, "/start").await;
    assert_eq!(s.flow.tag(), FlowTag::Adding(WizardStep::Host));
    assert!(h.transport.any_text_contains("Finish adding a server first"));
}

#[tokio::test]
async fn unknown_selector_is_ignored() {
    let h = harness();
    let mut s = Session::new(100);
    h.press(&mut s, "reboot_everything").await;
    h.press(&mut s, "select_server_abc").await;
    assert_eq!(
        h.transport.texts(),
        vec!["Unknown action.".to_string(), "Unknown action.".to_string()]
    );
    assert!(s.flow.is_idle());
    assert!(h.registry.get(100, ProfileId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn rejected_acks_do_not_strand_the_user() {
    let h = harness();
    let id = h.add_server(100, "Alpha").await;
    h.transport.reject_answers();
    let mut s = Session::new(100);

    h.press(&mut s, "add_server").await;
    assert_eq!(s.flow.tag(), FlowTag::Adding(WizardStep::Name));
    assert!(h.transport.any_text_contains("Enter a name for the server:"));
    h.text(&mut s, "/cancel").await;

    h.press(&mut s, &format!("open_console_{}", id)).await;
    assert_eq!(s.flow, Flow::ConsoleMode { profile_id: id });
    assert!(h.transport.any_text_contains("Console for Alpha is open"));

    h.text(&mut s, "/close").await;
    h.press(&mut s, &format!("server_status_{}", id)).await;
    assert!(h.transport.any_text_contains("Server status:\nran: list"));
    assert!(!h.transport.texts().iter().any(|t| t.starts_with('❌')));
}
