use std::sync::Arc;

use bouquet_core::catalog::CatalogImport;
use bouquet_core::config::BotConfig;
use bouquet_core::flow::{Command, FlowEngine, FlowError, Inbound, OutboundMessage, Outbox};
use bouquet_core::repository::{BouquetRepository, NewBouquet};
use bouquet_core::session::{Draft, InMemorySessionStore, SessionState, Stage};
use bouquet_core::test_utils::InMemoryUploader;
use bouquet_core::types::{BatchId, ConversationId, ItemRef, UserId};
use tokio::sync::mpsc::UnboundedReceiver;

const CHAT: ConversationId = ConversationId(42);

struct Harness {
    engine: FlowEngine,
    repo: Arc<BouquetRepository>,
    uploader: Arc<InMemoryUploader>,
    rx: UnboundedReceiver<OutboundMessage>,
}

impl Harness {
    async fn new() -> Self {
        let mut config = BotConfig::default();
        config.media.quiet_window_ms = 30;
        config.bouquets.page_size = 2;

        let repo = Arc::new(BouquetRepository::new_in_memory().await.unwrap());
        let uploader = Arc::new(InMemoryUploader::new("https://cdn.test").failing_on("bad"));
        let (outbox, rx) = Outbox::channel();
        let engine = FlowEngine::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            repo.clone(),
            uploader.clone(),
            outbox,
        );
        Self {
            engine,
            repo,
            uploader,
            rx,
        }
    }

    async fn send(&mut self, event: Inbound) -> Vec<OutboundMessage> {
        self.engine.handle(event).await.unwrap();
        self.drain()
    }

    fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }

    async fn command(&mut self, command: Command) -> Vec<OutboundMessage> {
        self.send(Inbound::Command {
            conversation_id: CHAT,
            user_id: None,
            command,
        })
        .await
    }

    async fn text(&mut self, text: &str) -> Vec<OutboundMessage> {
        self.send(Inbound::Text {
            conversation_id: CHAT,
            user_id: None,
            text: text.to_string(),
        })
        .await
    }

    async fn press(&mut self, data: &str) -> Vec<OutboundMessage> {
        self.send(Inbound::Action {
            conversation_id: CHAT,
            user_id: None,
            data: data.to_string(),
        })
        .await
    }

    async fn photo(&mut self, item: &str, batch: Option<&str>) -> Vec<OutboundMessage> {
        self.send(Inbound::Attachment {
            conversation_id: CHAT,
            user_id: None,
            item_ref: ItemRef::from(item),
            batch_id: batch.map(BatchId::from),
            mime: None,
            video: false,
        })
        .await
    }

    async fn state(&self) -> SessionState {
        self.engine.sessions().get(CHAT).await.unwrap()
    }

    async fn put_state(&self, state: SessionState) {
        self.engine.sessions().set(CHAT, state).await.unwrap();
    }
}

fn last_text(messages: &[OutboundMessage]) -> &str {
    messages.last().map(|m| m.text.as_str()).unwrap_or_default()
}

#[tokio::test]
async fn bouquet_is_created_end_to_end() {
    let mut h = Harness::new().await;

    let out = h.command(Command::NewBouquet).await;
    assert!(last_text(&out).contains("№0201"));

    let out = h.text("  Spring  ").await;
    assert!(out[0].actions().contains(&"flow:next".to_string()));

    let out = h.press("flow:next").await;
    assert!(last_text(&out).contains("up to 6 photos"));

    h.photo("p1", None).await;
    h.photo("p2", Some("g1")).await;
    h.photo("p3", Some("g1")).await;
    h.photo("bad", Some("g1")).await;
    h.engine.wait_idle().await;
    let notes: Vec<String> = h.drain().into_iter().map(|m| m.text).collect();
    assert_eq!(
        notes,
        vec!["Added 3 photo(s). Total: 4/6.".to_string()],
        "album reported once after the quiet window"
    );
    assert_eq!(h.state().await.items.len(), 4);

    let out = h.press("media:done").await;
    assert!(last_text(&out).contains("description"));
    assert_eq!(h.state().await.stage, Stage::WaitingDescription);

    let out = h.text("Soft pink roses").await;
    assert!(out[0].actions().contains(&"comp:pick".to_string()));

    let out = h.text("Red rose - 5\nEustoma: 3").await;
    assert!(last_text(&out).contains("• red rose — 5 pcs"));

    let out = h.text("3 500").await;
    let preview = last_text(&out);
    assert!(preview.starts_with("Spring №0201"));
    assert!(preview.contains("3 500 ₽"));
    assert!(out[0].actions().contains(&"preview:save".to_string()));

    let out = h.press("preview:save").await;
    assert_eq!(last_text(&out), "Saved: Spring №0201");

    let saved = h.repo.get_bouquet("0201").await.unwrap().unwrap();
    assert_eq!(saved.price_minor, 350_000);
    assert_eq!(saved.description, "Soft pink roses");
    assert_eq!(saved.composition.len(), 2);
    assert_eq!(saved.photos.len(), 4);
    assert!(saved.photos.contains(&"bad".to_string()));
    assert_eq!(h.uploader.uploaded().len(), 3);
    assert_eq!(h.state().await, SessionState::default());
}

#[tokio::test]
async fn single_photo_is_acknowledged_immediately() {
    let mut h = Harness::new().await;
    h.command(Command::NewBouquet).await;
    h.text("Spring").await;
    h.press("flow:next").await;

    let out = h.photo("p1", None).await;
    assert_eq!(last_text(&out), "Added 1 photo(s). Total: 1/6.");
}

#[tokio::test]
async fn invalid_input_reprompts_without_moving() {
    let mut h = Harness::new().await;
    h.command(Command::NewBouquet).await;

    let out = h.text("ab").await;
    assert!(last_text(&out).contains("3-40"));
    assert_eq!(h.state().await.stage, Stage::WaitingTitle);

    h.text("Spring").await;
    h.press("flow:next").await;
    let out = h.press("media:done").await;
    assert_eq!(last_text(&out), "Send at least one photo first.");
    assert_eq!(h.state().await.stage, Stage::WaitingMedia);
}

#[tokio::test]
async fn stale_and_unknown_buttons_are_answered() {
    let mut h = Harness::new().await;

    let out = h.press("something:odd").await;
    assert_eq!(last_text(&out), "This button is no longer active.");

    let out = h.press("preview:save").await;
    assert_eq!(last_text(&out), "This button is no longer active.");
}

#[tokio::test]
async fn unsupported_documents_are_rejected() {
    let mut h = Harness::new().await;
    let out = h
        .send(Inbound::Attachment {
            conversation_id: CHAT,
            user_id: None,
            item_ref: ItemRef::from("doc"),
            batch_id: None,
            mime: Some("application/pdf".into()),
            video: false,
        })
        .await;
    assert!(last_text(&out).contains("application/pdf"));
}

#[tokio::test]
async fn video_is_uploaded_and_media_stage_resumes() {
    let mut h = Harness::new().await;
    h.command(Command::NewBouquet).await;
    h.text("Spring").await;
    h.press("flow:next").await;
    h.press("media:video").await;
    assert_eq!(h.state().await.stage, Stage::WaitingVideo);

    let out = h
        .send(Inbound::Attachment {
            conversation_id: CHAT,
            user_id: None,
            item_ref: ItemRef::from("v1"),
            batch_id: None,
            mime: Some("video/mp4".into()),
            video: false,
        })
        .await;

    assert_eq!(
        last_text(&out),
        "Video saved: https://cdn.test/bouquets/0201/v1.mp4"
    );
    let state = h.state().await;
    assert_eq!(state.stage, Stage::WaitingMedia);
    assert_eq!(
        state.draft.video.as_deref(),
        Some("https://cdn.test/bouquets/0201/v1.mp4")
    );
}

#[tokio::test]
async fn composition_can_be_picked_from_the_catalog() {
    let mut h = Harness::new().await;
    let catalog = CatalogImport::from_toml_str(
        r#"
        [[products]]
        category = "Roses"
        name = "Rose Explorer"
        color = "red"
        kind = "rose"
        "#,
    )
    .unwrap()
    .normalize()
    .unwrap();
    h.repo.replace_catalog(&catalog).await.unwrap();

    h.put_state(SessionState {
        stage: Stage::WaitingComposition,
        ..SessionState::default()
    })
    .await;

    let out = h.press("comp:pick").await;
    let category = out[0]
        .actions()
        .into_iter()
        .find(|a| a.starts_with("cat:") && !a.starts_with("cat:page"))
        .unwrap();

    let out = h.press(&category).await;
    assert!(last_text(&out).starts_with("Roses"));
    let product = out[0]
        .actions()
        .into_iter()
        .find(|a| a.starts_with("prod:") && !a.starts_with("prod:page"))
        .unwrap();

    let out = h.press(&product).await;
    assert!(last_text(&out).contains("Rose Explorer (red)"));
    assert_eq!(h.state().await.stage, Stage::EnteringQuantity);

    let out = h.text("0").await;
    assert!(last_text(&out).contains("quantity"));

    let out = h.text("7").await;
    assert_eq!(out[0].text, "Added • Rose Explorer — 7 pcs");
    assert_eq!(h.state().await.stage, Stage::ChoosingCategory);

    let out = h.press("picker:done").await;
    assert!(last_text(&out).contains("Now send the price"));

    let state = h.state().await;
    assert_eq!(state.stage, Stage::WaitingPrice);
    let item = &state.draft.composition[0];
    assert_eq!(item.qty, 7);
    assert_eq!(item.category.as_deref(), Some("Roses"));
    assert!(item.product_id.is_some());
}

#[tokio::test]
async fn empty_catalog_points_at_import() {
    let mut h = Harness::new().await;
    h.put_state(SessionState {
        stage: Stage::WaitingComposition,
        ..SessionState::default()
    })
    .await;

    let out = h.press("comp:pick").await;
    assert!(last_text(&out).contains("catalog import"));
    assert_eq!(out[0].actions(), vec!["picker:done".to_string()]);
}

async fn seed_bouquet(repo: &BouquetRepository, id: &str, title: &str) {
    let owner = repo.get_or_create_user(UserId(CHAT.0), 6).await.unwrap();
    repo.create_bouquet(&NewBouquet {
        bouquet_id: id.to_string(),
        owner_id: owner.id,
        short_title: title.to_string(),
        description: String::new(),
        composition: Vec::new(),
        photos: vec!["p1".into()],
        video: None,
        price_minor: 100_000,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn bouquets_are_listed_edited_and_deleted() {
    let mut h = Harness::new().await;
    for (id, title) in [("0201", "One"), ("0202", "Two"), ("0203", "Three")] {
        seed_bouquet(&h.repo, id, title).await;
    }

    let out = h.command(Command::ListBouquets).await;
    assert_eq!(last_text(&out), "Your bouquets (3):");
    let actions = out[0].actions();
    assert!(actions.contains(&"list:page:1".to_string()));
    assert_eq!(
        actions.iter().filter(|a| a.starts_with("bouquet:")).count(),
        2
    );

    let out = h.press("list:page:9").await;
    assert_eq!(
        out[0]
            .actions()
            .iter()
            .filter(|a| a.starts_with("bouquet:"))
            .count(),
        1,
        "page is clamped to the last one"
    );

    let out = h.press("bouquet:0202").await;
    assert!(last_text(&out).starts_with("Two №0202\nPrice: 1 000 ₽"));

    h.press("bouquet:field:price:0202").await;
    assert_eq!(h.state().await.stage, Stage::EditingPrice);
    let out = h.text("abc").await;
    assert!(last_text(&out).contains("price"));
    assert_eq!(h.state().await.stage, Stage::EditingPrice);

    let out = h.text("4200").await;
    assert_eq!(last_text(&out), "Updated the price.");
    assert_eq!(h.state().await.stage, Stage::Idle);
    let edited = h.repo.get_bouquet("0202").await.unwrap().unwrap();
    assert_eq!(edited.price_minor, 420_000);

    h.press("bouquet:field:title:0202").await;
    h.text("Renamed").await;
    let edited = h.repo.get_bouquet("0202").await.unwrap().unwrap();
    assert_eq!(edited.title_display, "Renamed №0202");

    let out = h.press("bouquet:delete:0202").await;
    assert_eq!(last_text(&out), "Bouquet №0202 deleted.");
    assert!(h.repo.get_bouquet("0202").await.unwrap().is_none());

    let out = h.press("bouquet:0202").await;
    assert_eq!(last_text(&out), "Bouquet №0202 not found.");
}

#[tokio::test]
async fn photo_limit_setting_applies_to_new_bouquets() {
    let mut h = Harness::new().await;

    let out = h.command(Command::Settings).await;
    assert_eq!(last_text(&out), "Photo limit per bouquet: 6.");

    h.press("settings:limit").await;
    let out = h.text("11").await;
    assert!(last_text(&out).contains("1 to 10"));
    assert_eq!(h.state().await.stage, Stage::WaitingPhotoLimit);

    let out = h.text("3").await;
    assert_eq!(last_text(&out), "Photo limit set to 3.");

    h.command(Command::NewBouquet).await;
    assert_eq!(h.state().await.capacity, 3);
}

#[tokio::test]
async fn numbering_skips_ids_taken_since_the_draft_started() {
    let mut h = Harness::new().await;
    h.command(Command::NewBouquet).await;
    seed_bouquet(&h.repo, "0201", "Taken").await;

    h.put_state(SessionState {
        stage: Stage::WaitingPrice,
        items: vec![ItemRef::from("p1")],
        draft: Draft {
            price: Some(10),
            title: Some("Late".into()),
            ..h.state().await.draft
        },
        ..SessionState::default()
    })
    .await;

    let out = h.press("preview:save").await;
    assert_eq!(last_text(&out), "Saved: Late №0202");
}

#[tokio::test]
async fn repository_failure_becomes_an_apology() {
    let mut h = Harness::new().await;
    h.repo.close().await;

    let out = h.command(Command::NewBouquet).await;
    assert_eq!(
        last_text(&out),
        "Something went wrong on our side. Please try again."
    );
}

#[tokio::test]
async fn closed_outbox_is_the_only_error() {
    let Harness {
        engine, rx, ..
    } = Harness::new().await;
    drop(rx);

    let result = engine
        .handle(Inbound::Command {
            conversation_id: CHAT,
            user_id: None,
            command: Command::Help,
        })
        .await;
    assert!(matches!(result, Err(FlowError::OutboxClosed)));
}

#[tokio::test]
async fn slash_text_is_treated_as_a_command() {
    let mut h = Harness::new().await;
    let out = h.text("/help").await;
    assert!(last_text(&out).starts_with("Commands:"));
}

#[tokio::test]
async fn album_sent_before_add_video_is_kept() {
    let mut h = Harness::new().await;
    h.command(Command::NewBouquet).await;
    h.text("Spring").await;
    h.press("flow:next").await;

    for item in ["a1", "a2", "a3"] {
        h.photo(item, Some("g")).await;
    }
    h.press("media:video").await;
    h.engine.wait_idle().await;

    let state = h.state().await;
    assert_eq!(state.stage, Stage::WaitingVideo);
    assert_eq!(state.items.len(), 3);

    let notes: Vec<String> = h.drain().into_iter().map(|m| m.text).collect();
    assert_eq!(notes, vec!["Added 3 photo(s). Total: 3/6.".to_string()]);
}
