//! End-to-end runtime tests against a mock transport

use super::executor::BotRuntime;
use super::traits::{SendError, Transport};
use crate::db::Directory;
use crate::dialog::catalog::{BTN_CONFIRM, BTN_NEW_TICKET};
use crate::dialog::{Command, ConversationState, DialogContext, Event, KeyboardSet, Stage};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ADMIN: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
struct SentMessage {
    recipient: i64,
    text: String,
    keyboard: KeyboardSet,
}

/// Records every outbound send; failures are injected per recipient.
#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    unreachable: HashSet<i64>,
    failing: HashSet<i64>,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_unreachable(ids: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            unreachable: ids.iter().copied().collect(),
            ..Self::default()
        })
    }

    fn with_failing(ids: &[i64]) -> Arc<Self> {
        Arc::new(Self {
            failing: ids.iter().copied().collect(),
            ..Self::default()
        })
    }

    fn sent_to(&self, recipient: i64) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        recipient: i64,
        text: &str,
        keyboard: KeyboardSet,
    ) -> Result<(), SendError> {
        if self.unreachable.contains(&recipient) {
            return Err(SendError::RecipientUnreachable);
        }
        if self.failing.contains(&recipient) {
            return Err(SendError::Other("injected".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            recipient,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }
}

fn runtime(transport: &Arc<MockTransport>) -> (BotRuntime<MockTransport>, Directory) {
    let db = Directory::open_in_memory().unwrap();
    let rt = BotRuntime::new(db.clone(), Arc::clone(transport), DialogContext::new(ADMIN))
        .with_broadcast_delay(Duration::ZERO);
    (rt, db)
}

async fn register(rt: &mut BotRuntime<MockTransport>, user: i64, name: &str, workplace: &str) {
    rt.process(user, Event::Command(Command::Start)).await;
    rt.process(user, Event::Text(name.to_string())).await;
    rt.process(user, Event::Text(BTN_CONFIRM.to_string())).await;
    rt.process(user, Event::Text(workplace.to_string())).await;
    rt.process(user, Event::Text(BTN_CONFIRM.to_string())).await;
}

#[tokio::test]
async fn registration_walk_persists_record_and_reaches_menu() {
    let transport = MockTransport::new();
    let (mut rt, db) = runtime(&transport);

    register(&mut rt, 7, "Ivan", "Office1").await;

    let rec = db.get(7).unwrap().unwrap();
    assert_eq!(rec.name, "Ivan");
    assert_eq!(rec.workplace, "Office1");
    assert!(!rec.is_blocked);
    assert_eq!(rt.conversation_state(7).stage, Some(Stage::MainMenu));

    // The user was greeted, prompted, and welcomed along the way.
    assert!(!transport.sent_to(7).is_empty());
}

#[tokio::test]
async fn ticket_submission_sends_exactly_one_admin_notification() {
    let transport = MockTransport::new();
    let (mut rt, _db) = runtime(&transport);
    register(&mut rt, 7, "Ivan", "Office1").await;

    rt.process(7, Event::Text(BTN_NEW_TICKET.to_string())).await;
    rt.process(7, Event::Text("Printer".to_string())).await;

    let to_admin = transport.sent_to(ADMIN);
    assert_eq!(to_admin.len(), 1);
    let text = &to_admin[0].text;
    assert!(text.contains("Ivan"));
    assert!(text.contains("Office1"));
    assert!(text.contains("Printer"));
    assert!(text.contains('7'));

    // The submitter is back in the menu, ready for another ticket.
    assert_eq!(rt.conversation_state(7).stage, Some(Stage::MainMenu));
}

#[tokio::test]
async fn failed_admin_delivery_informs_submitter_and_resets_dialog() {
    let transport = MockTransport::with_failing(&[ADMIN]);
    let (mut rt, _db) = runtime(&transport);
    register(&mut rt, 7, "Ivan", "Office1").await;

    rt.process(7, Event::Text(BTN_NEW_TICKET.to_string())).await;
    rt.process(7, Event::Text("Printer".to_string())).await;

    let to_user = transport.sent_to(7);
    let last = to_user.last().unwrap();
    assert!(last.text.contains("may not have reached"));
    assert_eq!(rt.conversation_state(7), ConversationState::cleared());
}

#[tokio::test]
async fn failed_persist_reports_and_keeps_the_dialog_retryable() {
    let transport = MockTransport::new();
    let (mut rt, db) = runtime(&transport);

    rt.process(7, Event::Command(Command::Start)).await;
    rt.process(7, Event::Text("Ivan".to_string())).await;
    rt.process(7, Event::Text(BTN_CONFIRM.to_string())).await;
    rt.process(7, Event::Text("Office1".to_string())).await;

    db.drop_tables().unwrap();
    rt.process(7, Event::Text(BTN_CONFIRM.to_string())).await;

    // The confirmation stage is restored so resending the button retries
    // the write, and no success message follows the failed save.
    assert_eq!(
        rt.conversation_state(7).stage,
        Some(Stage::AwaitingWorkplaceConfirmation)
    );
    let to_user = transport.sent_to(7);
    assert!(to_user.last().unwrap().text.contains("Could not save"));
    assert!(!to_user.iter().any(|m| m.text.contains("registered")));
}

#[tokio::test]
async fn broadcast_marks_unreachable_recipients_and_reports_to_admin() {
    let transport = MockTransport::with_unreachable(&[2]);
    let (mut rt, db) = runtime(&transport);
    for (id, name) in [(1, "A"), (2, "B"), (3, "C")] {
        db.upsert(id, name, "Office1").unwrap();
    }

    rt.process(
        ADMIN,
        Event::Command(Command::Broadcast("Maintenance at noon".to_string())),
    )
    .await;
    let report = rt.finish_broadcast().await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.newly_unreachable, 1);
    assert!(!report.cancelled);

    assert!(db.get(2).unwrap().unwrap().is_blocked);
    assert!(!db.get(1).unwrap().unwrap().is_blocked);

    assert!(transport
        .sent_to(1)
        .iter()
        .any(|m| m.text == "Maintenance at noon"));
    assert!(transport
        .sent_to(ADMIN)
        .iter()
        .any(|m| m.text.contains("2/3 delivered")));
}

#[tokio::test]
async fn broadcast_skips_already_blocked_recipients() {
    let transport = MockTransport::new();
    let (mut rt, db) = runtime(&transport);
    db.upsert(1, "A", "Office1").unwrap();
    db.upsert(2, "B", "Office2").unwrap();
    db.mark_unreachable(2).unwrap();

    rt.process(ADMIN, Event::Command(Command::Broadcast("hi".to_string())))
        .await;
    let report = rt.finish_broadcast().await.unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.delivered, 1);
    assert!(transport.sent_to(2).is_empty());
}

#[tokio::test]
async fn cancelling_a_broadcast_yields_a_partial_report() {
    let transport = MockTransport::new();
    let db = Directory::open_in_memory().unwrap();
    for id in 1..=3 {
        db.upsert(id, "E", "Office1").unwrap();
    }
    // A long inter-send pause keeps the fan-out parked between recipients.
    let mut rt = BotRuntime::new(db, Arc::clone(&transport), DialogContext::new(ADMIN))
        .with_broadcast_delay(Duration::from_secs(5));

    rt.process(ADMIN, Event::Command(Command::Broadcast("drill".to_string())))
        .await;

    // Let the first send go out, then cancel during the pause.
    tokio::time::sleep(Duration::from_millis(50)).await;
    rt.cancel_broadcast();
    let report = rt.finish_broadcast().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.total, 3);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 0);
    assert!(transport
        .sent_to(ADMIN)
        .iter()
        .any(|m| m.text.contains("partial")));
}

#[tokio::test]
async fn contact_revocation_and_restoration_toggle_the_liveness_flag() {
    let transport = MockTransport::new();
    let (mut rt, db) = runtime(&transport);
    db.upsert(7, "Ivan", "Office1").unwrap();

    rt.process(7, Event::ContactRevoked).await;
    assert!(db.get(7).unwrap().unwrap().is_blocked);

    rt.process(7, Event::ContactRestored).await;
    assert!(!db.get(7).unwrap().unwrap().is_blocked);
}

#[tokio::test]
async fn purge_reports_removed_count() {
    let transport = MockTransport::new();
    let (mut rt, db) = runtime(&transport);
    db.upsert(1, "A", "Office1").unwrap();
    db.upsert(2, "B", "Office2").unwrap();
    db.mark_unreachable(2).unwrap();

    rt.process(ADMIN, Event::Command(Command::PurgeUnreachable))
        .await;

    assert!(transport
        .sent_to(ADMIN)
        .iter()
        .any(|m| m.text.contains("Removed 1")));
    assert_eq!(db.stats().unwrap().total, 1);
}
