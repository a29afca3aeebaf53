use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use super::callback::CallbackAction;
use super::inbound::{Command, Inbound, MediaRoute, classify_attachment};
use super::keyboards::{self, Keyboard};
use super::outbox::{OutboundMessage, Outbox};
use super::FlowError;
use crate::config::BotConfig;
use crate::media::MediaIngestor;
use crate::repository::{BouquetRepository, RepositoryError};
use crate::session::{SessionState, SessionStore, SessionStoreError, Stage, update_with};
use crate::types::{ConversationId, UserId};
use crate::upload::MediaUploader;

const APOLOGY: &str = "Something went wrong on our side. Please try again.";

const STALE_BUTTON: &str = "This button is no longer active.";

const HELP: &str = "Commands:\n\
    /new - create a bouquet\n\
    /list - your bouquets\n\
    /settings - photo limit\n\
    /help - this message";

/// Failure inside one handler step.
#[derive(Debug, Error)]
pub(crate) enum StepError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub(crate) type StepResult = Result<(), StepError>;

/// Who an event came from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

/// Per-message handler for the bouquet conversation.
///
/// Every reply goes to the [`Outbox`]. Album outcomes reach the outbox
/// through the [`MediaIngestor`], which uses the same outbox as its sink.
pub struct FlowEngine {
    pub(crate) config: BotConfig,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) repo: Arc<BouquetRepository>,
    pub(crate) uploader: Arc<dyn MediaUploader>,
    pub(crate) ingestor: MediaIngestor,
    pub(crate) outbox: Outbox,
}

impl FlowEngine {
    pub fn new(
        config: BotConfig,
        sessions: Arc<dyn SessionStore>,
        repo: Arc<BouquetRepository>,
        uploader: Arc<dyn MediaUploader>,
        outbox: Outbox,
    ) -> Self {
        let ingestor = MediaIngestor::new(
            sessions.clone(),
            Arc::new(outbox.clone()),
            config.quiet_window(),
        );
        Self {
            config,
            sessions,
            repo,
            uploader,
            ingestor,
            outbox,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Waits until every pending album has been merged.
    pub async fn wait_idle(&self) {
        self.ingestor.wait_idle().await;
    }

    /// Handles one inbound event.
    ///
    /// Only fails when the outbox is closed. Storage failures are logged and
    /// answered with an apology.
    pub async fn handle(&self, event: Inbound) -> Result<(), FlowError> {
        let ctx = Ctx {
            conversation_id: event.conversation_id(),
            user_id: event.user_id(),
        };

        match self.dispatch(ctx, event).await {
            Ok(()) => Ok(()),
            Err(StepError::Flow(FlowError::OutboxClosed)) => Err(FlowError::OutboxClosed),
            Err(e) => {
                error!(
                    target: "bouquet::flow",
                    conversation_id = %ctx.conversation_id,
                    error = %e,
                    "Handler failed"
                );
                self.outbox
                    .send(OutboundMessage::text(ctx.conversation_id, APOLOGY))
            }
        }
    }

    async fn dispatch(&self, ctx: Ctx, event: Inbound) -> StepResult {
        match event {
            Inbound::Command { command, .. } => self.on_command(ctx, command).await,
            Inbound::Text { text, .. } => match Command::from_slash(&text) {
                Some(command) => self.on_command(ctx, command).await,
                None => self.on_text(ctx, &text).await,
            },
            Inbound::Attachment {
                item_ref,
                batch_id,
                mime,
                video,
                ..
            } => {
                let route = classify_attachment(
                    ctx.conversation_id,
                    item_ref,
                    batch_id,
                    mime.as_deref(),
                    video,
                );
                self.on_attachment(ctx, route).await
            }
            Inbound::Action { data, .. } => match data.parse::<CallbackAction>() {
                Ok(action) => self.on_action(ctx, action).await,
                Err(e) => {
                    warn!(
                        target: "bouquet::flow",
                        conversation_id = %ctx.conversation_id,
                        error = %e,
                        "Ignoring unknown button"
                    );
                    self.stale(ctx)
                }
            },
        }
    }

    async fn on_command(&self, ctx: Ctx, command: Command) -> StepResult {
        debug!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            command = %command,
            "Command"
        );
        match command {
            Command::Start => {
                self.sessions.clear(ctx.conversation_id).await?;
                self.reply(
                    ctx,
                    "Hi! I help you put bouquets into the catalog. What would you like to do?",
                    keyboards::main_menu(),
                )
            }
            Command::Help => self.say(ctx, HELP),
            Command::NewBouquet => self.start_bouquet(ctx).await,
            Command::ListBouquets => self.show_bouquet_list(ctx, 0).await,
            Command::Settings => self.show_settings(ctx).await,
        }
    }

    async fn on_text(&self, ctx: Ctx, text: &str) -> StepResult {
        let state = self.sessions.get(ctx.conversation_id).await?;
        match state.stage {
            Stage::Idle => self.reply(ctx, "Choose an action:", keyboards::main_menu()),
            Stage::WaitingTitle => self.on_title(ctx, text).await,
            Stage::WaitingMedia => self.reply(
                ctx,
                "Send photos, or press \"Done\" when finished.",
                keyboards::media_controls(),
            ),
            Stage::WaitingVideo => self.say(ctx, "Send a video file."),
            Stage::WaitingDescription => self.on_description(ctx, text).await,
            Stage::WaitingComposition => self.on_composition_text(ctx, text).await,
            Stage::WaitingPrice => self.on_price(ctx, text).await,
            Stage::ChoosingCategory | Stage::ChoosingProduct => {
                self.say(ctx, "Use the buttons to pick a flower.")
            }
            Stage::EnteringQuantity => self.on_quantity(ctx, &state, text).await,
            Stage::EditingTitle
            | Stage::EditingDescription
            | Stage::EditingComposition
            | Stage::EditingPrice => self.on_edit_value(ctx, &state, text).await,
            Stage::WaitingPhotoLimit => self.on_photo_limit(ctx, text).await,
        }
    }

    async fn on_attachment(&self, ctx: Ctx, route: MediaRoute) -> StepResult {
        match route {
            MediaRoute::Unsupported { mime } => self.say(
                ctx,
                format!("Files of type {mime} are not supported. Send photos or a video."),
            ),
            MediaRoute::Video(item) => self.on_video(ctx, item).await,
            MediaRoute::Image(event) => {
                let state = self.sessions.get(ctx.conversation_id).await?;
                if !state.stage.accepts_media() {
                    if event.batch_id.is_none() {
                        return self.say(ctx, "I'm not collecting photos right now.");
                    }
                    debug!(
                        target: "bouquet::flow",
                        conversation_id = %ctx.conversation_id,
                        "Dropping album item outside media stage"
                    );
                    return Ok(());
                }
                self.ingestor.handle_arrival(event).await?;
                Ok(())
            }
        }
    }

    async fn on_action(&self, ctx: Ctx, action: CallbackAction) -> StepResult {
        debug!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            action = %action,
            "Action"
        );
        match action {
            CallbackAction::NewBouquet => self.start_bouquet(ctx).await,
            CallbackAction::Settings => self.show_settings(ctx).await,
            CallbackAction::Next => self.on_next(ctx).await,
            CallbackAction::ChangeTitle => self.on_change_title(ctx).await,
            CallbackAction::AddVideo => self.on_add_video(ctx).await,
            CallbackAction::MediaDone => self.on_media_done(ctx).await,
            CallbackAction::SkipComposition => self.on_skip_composition(ctx).await,
            CallbackAction::PickComposition => self.start_picker(ctx).await,
            CallbackAction::CategoryPage(page) => self.show_categories(ctx, page).await,
            CallbackAction::Category(category_id) => {
                self.show_products(ctx, category_id, 0).await
            }
            CallbackAction::ProductPage { category_id, page } => {
                self.show_products(ctx, category_id, page).await
            }
            CallbackAction::Product(product_id) => self.select_product(ctx, product_id).await,
            CallbackAction::PickerDone => self.finish_picker(ctx).await,
            CallbackAction::Save => self.save_bouquet(ctx).await,
            CallbackAction::EditPrice => self.on_edit_price(ctx).await,
            CallbackAction::BouquetPage(page) => self.show_bouquet_list(ctx, page).await,
            CallbackAction::BouquetDetail(id) => self.show_bouquet_detail(ctx, &id).await,
            CallbackAction::EditBouquet(id) => self.show_edit_fields(ctx, &id).await,
            CallbackAction::EditField { field, bouquet_id } => {
                self.start_field_edit(ctx, field, bouquet_id).await
            }
            CallbackAction::DeleteBouquet(id) => self.delete_bouquet(ctx, &id).await,
            CallbackAction::SetPhotoLimit => self.start_photo_limit(ctx).await,
            CallbackAction::Noop => Ok(()),
        }
    }

    pub(crate) fn say(&self, ctx: Ctx, text: impl Into<String>) -> StepResult {
        self.outbox
            .send(OutboundMessage::text(ctx.conversation_id, text))?;
        Ok(())
    }

    /// Answer for a button that no longer matches the conversation's stage.
    pub(crate) fn stale(&self, ctx: Ctx) -> StepResult {
        self.say(ctx, STALE_BUTTON)
    }

    pub(crate) fn reply(&self, ctx: Ctx, text: impl Into<String>, buttons: Keyboard) -> StepResult {
        self.outbox
            .send(OutboundMessage::text(ctx.conversation_id, text).with_buttons(buttons))?;
        Ok(())
    }

    /// Applies `f` to the conversation's state and returns its result.
    pub(crate) async fn with_state<F, R>(&self, ctx: Ctx, f: F) -> Result<R, StepError>
    where
        F: FnOnce(&mut SessionState) -> R + Send,
        R: Send,
    {
        Ok(update_with(self.sessions.as_ref(), ctx.conversation_id, f).await?)
    }
}
