use tracing::{info, warn};

use super::callback::{CallbackAction, EditField};
use super::engine::{Ctx, FlowEngine, StepResult};
use super::keyboards::{self, Keyboard};
use super::outbox::Button;
use super::validate;
use crate::catalog::{Page, format_composition};
use crate::repository::{Bouquet, BouquetUpdate, RepositoryError};
use crate::session::{SessionState, Stage};
use crate::utils::{format_price, truncate_chars};

/// Longest caption a detail card may carry.
const CAPTION_MAX: usize = 1024;

fn caption(bouquet: &Bouquet) -> String {
    let mut text = format!(
        "{}\nPrice: {}\nPhotos: {}",
        bouquet.title_display,
        format_price(bouquet.price_minor),
        bouquet.photos.len()
    );
    if bouquet.video.is_some() {
        text.push_str(", video attached");
    }
    if !bouquet.description.is_empty() {
        text.push_str("\n\n");
        text.push_str(&bouquet.description);
    }
    if !bouquet.composition.is_empty() {
        text.push_str("\n\nComposition:\n");
        text.push_str(&format_composition(&bouquet.composition));
    }
    truncate_chars(&text, CAPTION_MAX)
}

fn editing_stage(field: EditField) -> Stage {
    match field {
        EditField::Title => Stage::EditingTitle,
        EditField::Description => Stage::EditingDescription,
        EditField::Composition => Stage::EditingComposition,
        EditField::Price => Stage::EditingPrice,
    }
}

fn edit_prompt(field: EditField) -> &'static str {
    match field {
        EditField::Title => "Send the new title (3-40 characters).",
        EditField::Description => "Send the new description (up to 800 characters).",
        EditField::Composition => "Send the new composition, one flower per line (Rose - 5).",
        EditField::Price => "Send the new price in rubles.",
    }
}

impl FlowEngine {
    pub(crate) async fn show_bouquet_list(&self, ctx: Ctx, requested: usize) -> StepResult {
        let user = self
            .repo
            .get_or_create_user(ctx.user_id, self.config.media.default_limit)
            .await?;
        let total = self.repo.count_bouquets(user.id).await?;
        if total == 0 {
            return self.reply(ctx, "You have no bouquets yet.", keyboards::main_menu());
        }

        let page = Page::clamp(total, self.config.bouquets.page_size, requested);
        let bouquets = self.repo.list_bouquets(user.id, page).await?;

        let mut buttons: Keyboard = bouquets
            .iter()
            .map(|bouquet| {
                vec![Button::new(
                    &bouquet.title_display,
                    &CallbackAction::BouquetDetail(bouquet.bouquet_id.clone()),
                )]
            })
            .collect();
        let nav = keyboards::nav_row(&page, CallbackAction::BouquetPage);
        if !nav.is_empty() {
            buttons.push(nav);
        }

        self.reply(ctx, format!("Your bouquets ({total}):"), buttons)
    }

    pub(crate) async fn show_bouquet_detail(&self, ctx: Ctx, bouquet_id: &str) -> StepResult {
        match self.repo.get_bouquet(bouquet_id).await? {
            Some(bouquet) => self.reply(
                ctx,
                caption(&bouquet),
                keyboards::bouquet_detail(&bouquet.bouquet_id),
            ),
            None => self.say(ctx, format!("Bouquet №{bouquet_id} not found.")),
        }
    }

    pub(crate) async fn show_edit_fields(&self, ctx: Ctx, bouquet_id: &str) -> StepResult {
        if self.repo.get_bouquet(bouquet_id).await?.is_none() {
            return self.say(ctx, format!("Bouquet №{bouquet_id} not found."));
        }
        self.reply(
            ctx,
            "What do you want to change?",
            keyboards::edit_fields(bouquet_id),
        )
    }

    pub(crate) async fn start_field_edit(
        &self,
        ctx: Ctx,
        field: EditField,
        bouquet_id: String,
    ) -> StepResult {
        if self.repo.get_bouquet(&bouquet_id).await?.is_none() {
            return self.say(ctx, format!("Bouquet №{bouquet_id} not found."));
        }

        self.with_state(ctx, move |state| {
            state.stage = editing_stage(field);
            state.editing = Some(bouquet_id);
        })
        .await?;

        self.say(ctx, edit_prompt(field))
    }

    pub(crate) async fn on_edit_value(
        &self,
        ctx: Ctx,
        state: &SessionState,
        text: &str,
    ) -> StepResult {
        let Some(bouquet_id) = state.editing.clone() else {
            self.with_state(ctx, |state| state.stage = Stage::Idle).await?;
            return self.reply(ctx, "Choose an action:", keyboards::main_menu());
        };

        let parsed = match state.stage {
            Stage::EditingTitle => validate::title(text).map(BouquetUpdate::Title),
            Stage::EditingDescription => validate::description(text).map(BouquetUpdate::Description),
            Stage::EditingComposition => validate::composition(text).map(BouquetUpdate::Composition),
            Stage::EditingPrice => validate::price(text).map(BouquetUpdate::Price),
            _ => return self.stale(ctx),
        };
        let update = match parsed {
            Ok(update) => update,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let result = self.repo.update_bouquet_field(&bouquet_id, &update).await;
        self.with_state(ctx, |state| {
            state.stage = Stage::Idle;
            state.editing = None;
        })
        .await?;

        match result {
            Ok(()) => {
                info!(
                    target: "bouquet::flow",
                    conversation_id = %ctx.conversation_id,
                    bouquet_id = %bouquet_id,
                    field = update.field_name(),
                    "Updated bouquet"
                );
                self.reply(
                    ctx,
                    format!("Updated the {}.", update.field_name()),
                    keyboards::bouquet_detail(&bouquet_id),
                )
            }
            Err(RepositoryError::NotFound { .. }) => {
                self.say(ctx, format!("Bouquet №{bouquet_id} not found."))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn delete_bouquet(&self, ctx: Ctx, bouquet_id: &str) -> StepResult {
        if !self.repo.delete_bouquet(bouquet_id).await? {
            return self.say(ctx, format!("Bouquet №{bouquet_id} not found."));
        }

        if let Err(e) = self.uploader.delete_bouquet_files(bouquet_id).await {
            warn!(
                target: "bouquet::flow",
                bouquet_id,
                error = %e,
                "Failed to delete stored files"
            );
        }
        info!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            bouquet_id,
            "Deleted bouquet"
        );
        self.reply(
            ctx,
            format!("Bouquet №{bouquet_id} deleted."),
            keyboards::main_menu(),
        )
    }
}
