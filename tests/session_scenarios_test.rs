//! End-to-end session scenarios against a real store and a scripted model

use threadchat::engine::{fallback_summary, ConversationEngine};
use threadchat::providers::{Message, Role};
use threadchat::session::{Session, ThreadPhase};
use threadchat::storage::ThreadId;

mod common;

#[tokio::test]
async fn test_first_message_creates_titled_thread() {
    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(
        common::ScriptedProvider::boxed(vec![Some("Simple Greeting"), Some("Hello! How can I help?")]),
        storage.clone(),
    );
    let mut session = Session::new(engine, true).unwrap();
    let id = session.thread_id().clone();

    // Draft threads leave no trace
    assert_eq!(session.phase(), ThreadPhase::Draft);
    assert!(storage.list_thread_ids().unwrap().is_empty());

    let mut streamed = String::new();
    let reply = session
        .submit("Hello", |d| streamed.push_str(d))
        .await
        .unwrap();

    assert_eq!(streamed, reply.content);
    assert_eq!(session.phase(), ThreadPhase::Committed);

    let record = storage.get_summary_record(&id).unwrap().unwrap();
    assert_eq!(record.summary, "Simple Greeting");
    assert_eq!(record.first_message.as_deref(), Some("Hello"));
    assert!(storage.list_thread_ids().unwrap().contains(&id));

    let log = storage.load_messages(&id, None).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], Message::user("Hello"));
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].content, "Hello! How can I help?");
}

#[tokio::test]
async fn test_deleting_summary_keeps_history() {
    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(
        common::ScriptedProvider::boxed(vec![Some("Title"), Some("Reply")]),
        storage.clone(),
    );
    let mut session = Session::new(engine, false).unwrap();
    session.submit("Keep this", |_| {}).await.unwrap();
    let id = session.thread_id().clone();

    session.delete_thread(&id, false).unwrap();

    assert!(storage.get_summary(&id).unwrap().is_none());
    assert_eq!(
        storage.load_messages(&id, None).unwrap(),
        vec![Message::user("Keep this"), Message::assistant("Reply")]
    );
}

#[tokio::test]
async fn test_reselect_in_fresh_session_reproduces_history() {
    let (storage, _dir) = common::create_temp_storage();
    let id = ThreadId::generate();
    storage.append_message(&id, &Message::user("ping")).unwrap();
    storage
        .append_message(&id, &Message::assistant("pong"))
        .unwrap();

    let engine = ConversationEngine::new(common::ScriptedProvider::boxed(vec![]), storage.clone());
    let mut session = Session::new(engine, true).unwrap();
    assert!(session.chat_threads().contains(&id));

    session.select_thread(&id).unwrap();
    assert_eq!(
        session.messages(),
        &[Message::user("ping"), Message::assistant("pong")]
    );
    assert_eq!(session.messages(), storage.load_messages(&id, None).unwrap().as_slice());
}

#[tokio::test]
async fn test_resumed_thread_sends_full_history() {
    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(
        common::ScriptedProvider::boxed(vec![Some("first reply"), Some("second reply")]),
        storage.clone(),
    );
    let id = ThreadId::generate();

    engine.send(&id, "one").await.unwrap();
    engine.send(&id, "two").await.unwrap();

    let log = storage.load_messages(&id, None).unwrap();
    let roles: Vec<Role> = log.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn test_summarize_failures_use_short_fallback() {
    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(
        common::ScriptedProvider::boxed(vec![None, None, None]),
        storage,
    );

    for input in [
        "",
        "hi",
        "please explain the borrow checker in great detail",
        "a_very_long_single_token_without_any_spaces_at_all",
    ] {
        let summary = engine.summarize(input).await;
        assert_eq!(summary, fallback_summary(input));
        assert!(summary.split_whitespace().count() <= 5);
        assert!(summary.ends_with("..."));
    }
}

#[tokio::test]
async fn test_failed_send_leaves_user_message_only() {
    let (storage, _dir) = common::create_temp_storage();
    let engine = ConversationEngine::new(
        common::ScriptedProvider::boxed(vec![Some("Title"), None]),
        storage.clone(),
    );
    let mut session = Session::new(engine, true).unwrap();
    let id = session.thread_id().clone();

    assert!(session.submit("Hello", |_| {}).await.is_err());
    assert_eq!(session.messages(), &[Message::user("Hello")]);
    assert_eq!(
        storage.load_messages(&id, None).unwrap(),
        vec![Message::user("Hello")]
    );
}
