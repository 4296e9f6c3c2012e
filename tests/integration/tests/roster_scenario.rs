use std::sync::Arc;

use async_trait::async_trait;
use roster_engine::{
    ButtonPress, ChatIdentity, DispatchOutcome, Engine, EngineConfig, InMemoryRecordStore,
    InboundEvent, InboundMessage, Keyboard, MessageRef, Messenger, MessengerError, RowMarker,
    Stage,
};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    Sent {
        chat_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edited {
        message: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Acknowledged {
        press_id: String,
    },
}

#[derive(Default)]
struct RecordingMessenger {
    deliveries: AsyncMutex<Vec<Delivery>>,
}

impl RecordingMessenger {
    async fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock().await)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        let mut deliveries = self.deliveries.lock().await;
        deliveries.push(Delivery::Sent {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(MessageRef {
            chat_id,
            message_id: deliveries.len() as i64,
        })
    }

    async fn edit_message(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        self.deliveries.lock().await.push(Delivery::Edited {
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn acknowledge(&self, press_id: &str, _notice: Option<&str>) -> Result<(), MessengerError> {
        self.deliveries.lock().await.push(Delivery::Acknowledged {
            press_id: press_id.to_string(),
        });
        Ok(())
    }
}

fn participant(id: i64, handle: &str) -> ChatIdentity {
    ChatIdentity {
        id,
        handle: Some(handle.to_string()),
        display_name: handle.to_string(),
    }
}

fn text_from(sender: &ChatIdentity, text: &str) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        chat_id: sender.id,
        message_id: 1,
        sender: sender.clone(),
        text: Some(text.to_string()),
        caption: None,
        forward_origin: None,
    })
}

fn press(sender: &ChatIdentity, message: MessageRef, text: &str, payload: &str) -> InboundEvent {
    InboundEvent::ButtonPress(ButtonPress {
        press_id: format!("press-{payload}"),
        sender: sender.clone(),
        message: Some(message),
        message_text: text.to_string(),
        payload: payload.to_string(),
    })
}

fn roster() -> Vec<Vec<&'static str>> {
    let blank = "";
    vec![
        vec!["#", "Full name", "Phone", blank, blank, blank, "Telegram ID", "Handle", "Stage", "Batch"],
        vec!["1", "Иван Петров", "+7 900", blank, blank, blank, blank, blank, blank, blank],
        vec!["2", "Anna Smirnova", "+7 901", blank, blank, blank, blank, blank, blank, "3"],
        vec!["3", "Oleg Ivanov", "+7 902", blank, blank, blank, blank, blank, blank, "3"],
        vec!["4", "Maria Volkova", "+7 903", blank, blank, blank, blank, blank, blank, "1"],
    ]
}

fn engine_with(store: Arc<InMemoryRecordStore>) -> (Engine, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let engine = Engine::new(EngineConfig::default(), store, messenger.clone());
    (engine, messenger)
}

#[tokio::test]
async fn integration_full_stage_walkthrough_for_one_participant() {
    let store = Arc::new(InMemoryRecordStore::from_rows(roster()));
    let (engine, messenger) = engine_with(store.clone());
    let ivan = participant(700, "ivan");

    // A single short token never reaches the table.
    let outcome = engine.dispatch(text_from(&ivan, "ив")).await;
    assert!(matches!(outcome, DispatchOutcome::Unresolved { .. }));
    assert_eq!(store.snapshot_calls(), 0);
    messenger.take().await;

    let outcome = engine.dispatch(text_from(&ivan, "петров иван")).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Bound {
            identity: 700,
            row: 2
        }
    );
    let sent = messenger.take().await;
    let Delivery::Sent { text, keyboard, .. } = &sent[0] else {
        panic!("expected reply, got {sent:?}");
    };
    assert_eq!(text, "Row 2 | saved @ivan");
    let stage_buttons: Vec<&str> = keyboard
        .as_ref()
        .expect("stage keyboard")
        .iter()
        .flatten()
        .map(|button| button.payload.as_str())
        .collect();
    assert_eq!(stage_buttons, ["s1_2", "s2_2", "s3_2"]);
    assert_eq!(store.cell(2, 7).await, "700");
    assert_eq!(store.cell(2, 8).await, "@ivan");

    let card = MessageRef {
        chat_id: 700,
        message_id: 1,
    };
    let outcome = engine
        .dispatch(press(&ivan, card, "Row 2 | saved @ivan", "s2_2"))
        .await;
    assert_eq!(outcome, DispatchOutcome::BatchMenuShown { row: 2 });
    let deliveries = messenger.take().await;
    let Delivery::Edited {
        keyboard: Some(menu),
        text,
        ..
    } = &deliveries[0]
    else {
        panic!("expected batch menu edit, got {deliveries:?}");
    };
    assert_eq!(text, "Row 2 | saved @ivan");
    let labels: Vec<&str> = menu.iter().flatten().map(|button| button.label.as_str()).collect();
    assert_eq!(labels.len(), 8);
    assert_eq!(labels[0], "Batch 1 · 1/15");
    assert_eq!(labels[2], "Batch 3 · 2/15");
    assert_eq!(labels[7], "Batch 8 · 0/15");
    assert_eq!(
        deliveries[1],
        Delivery::Acknowledged {
            press_id: "press-s2_2".to_string()
        }
    );
    // Opening the menu writes nothing.
    assert_eq!(store.cell(2, 9).await, "");

    let outcome = engine
        .dispatch(press(&ivan, card, "Row 2 | saved @ivan", "b3_2"))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::StageCommitted {
            row: 2,
            stage: Stage::CredentialsIssued,
            batch: Some(3)
        }
    );
    assert_eq!(store.cell(2, 9).await, "credentials-issued");
    assert_eq!(store.cell(2, 10).await, "3");
    assert_eq!(
        store.marker(2).await,
        Some(RowMarker::parse_hex("#FFA500").expect("hex"))
    );
    let deliveries = messenger.take().await;
    assert_eq!(
        deliveries[0],
        Delivery::Edited {
            message: card,
            text: "Row 2 | saved @ivan\n\n→ credentials issued ✓ (batch 3)".to_string(),
            keyboard: None,
        }
    );

    // Moving backwards is allowed and the marker follows the latest stage.
    engine
        .dispatch(press(&ivan, card, "Row 2 | saved @ivan", "s3_2"))
        .await;
    engine
        .dispatch(press(&ivan, card, "Row 2 | saved @ivan", "s1_2"))
        .await;
    assert_eq!(store.cell(2, 9).await, "registered");
    assert_eq!(
        store.marker(2).await,
        Some(RowMarker::parse_hex("#ADD8E6").expect("hex"))
    );
}

#[tokio::test]
async fn integration_second_contact_reuses_binding_without_writes() {
    let store = Arc::new(InMemoryRecordStore::from_rows(roster()));
    let (engine, messenger) = engine_with(store.clone());
    let anna = participant(55, "anna");

    engine.dispatch(text_from(&anna, "Anna Smirnova")).await;
    let writes_after_first = store.cell_writes();
    let snapshots_after_first = store.snapshot_calls();

    let outcome = engine
        .dispatch(text_from(&anna, "completely different words"))
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::AlreadyBound {
            identity: 55,
            row: 3
        }
    );
    assert_eq!(store.cell_writes(), writes_after_first);
    assert_eq!(store.snapshot_calls(), snapshots_after_first);
    let sent = messenger.take().await;
    assert!(matches!(
        sent.last(),
        Some(Delivery::Sent { text, .. }) if text == "Row 3 | @anna"
    ));
}

#[tokio::test]
async fn integration_concurrent_first_contacts_write_through_once() {
    let store = Arc::new(InMemoryRecordStore::from_rows(roster()));
    let (engine, _messenger) = engine_with(store.clone());
    let engine = Arc::new(engine);
    let oleg = participant(99, "oleg");

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = engine.clone();
        let event = text_from(&oleg, "Ivanov Oleg");
        handles.push(tokio::spawn(async move { engine.dispatch(event).await }));
    }
    let mut fresh = 0;
    for handle in handles {
        if matches!(handle.await.expect("join"), DispatchOutcome::Bound { .. }) {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(store.snapshot_calls(), 1);
    assert_eq!(store.cell_writes(), 2);
}

#[tokio::test]
async fn integration_stats_dedup_people_and_count_stages() {
    let store = Arc::new(InMemoryRecordStore::from_rows(vec![
        vec!["#", "Full name", "", "", "", "", "", "", "Stage", "Batch"],
        vec!["1", "Ivan Petrov Sidorov Jr", "", "", "", "", "", "", "paid", "2"],
        vec!["2", "ivan petrov sidorov", "", "", "", "", "", "", "registered", "2"],
        vec!["3", "Anna Smirnova", "", "", "", "", "", "", "credentials-issued", "2"],
        vec!["4", "", "", "", "", "", "", "", "paid", ""],
    ]));
    let (engine, messenger) = engine_with(store);
    let admin = participant(1, "admin");

    let outcome = engine.dispatch(text_from(&admin, "/stats")).await;
    assert_eq!(outcome, DispatchOutcome::StatsReported);
    let sent = messenger.take().await;
    let Some(Delivery::Sent { text, .. }) = sent.first() else {
        panic!("expected stats reply");
    };
    assert!(text.starts_with("Participants: 2\n"));
    assert!(text.contains("1 • registered: 0"));
    assert!(text.contains("2 • credentials issued: 1"));
    assert!(text.contains("3 • paid: 1"));
    assert!(text.contains("\n2: 2/15"));
}
