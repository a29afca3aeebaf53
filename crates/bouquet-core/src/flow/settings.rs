use tracing::info;

use super::engine::{Ctx, FlowEngine, StepResult};
use super::keyboards;
use super::validate;
use crate::session::Stage;

impl FlowEngine {
    pub(crate) async fn show_settings(&self, ctx: Ctx) -> StepResult {
        let user = self
            .repo
            .get_or_create_user(ctx.user_id, self.config.media.default_limit)
            .await?;
        self.reply(
            ctx,
            format!("Photo limit per bouquet: {}.", user.media_limit),
            keyboards::settings(),
        )
    }

    pub(crate) async fn start_photo_limit(&self, ctx: Ctx) -> StepResult {
        self.with_state(ctx, |state| state.stage = Stage::WaitingPhotoLimit)
            .await?;
        let media = &self.config.media;
        self.say(
            ctx,
            format!(
                "Send a number from {} to {}.",
                media.min_limit, media.max_limit
            ),
        )
    }

    pub(crate) async fn on_photo_limit(&self, ctx: Ctx, text: &str) -> StepResult {
        let media = &self.config.media;
        let limit = match validate::photo_limit(text, media.min_limit, media.max_limit) {
            Ok(limit) => limit,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let user = self
            .repo
            .get_or_create_user(ctx.user_id, media.default_limit)
            .await?;
        self.repo.set_media_limit(user.id, limit).await?;
        self.with_state(ctx, |state| state.stage = Stage::Idle)
            .await?;

        info!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            user_id = user.id,
            limit,
            "Photo limit changed"
        );
        self.reply(
            ctx,
            format!("Photo limit set to {limit}."),
            keyboards::main_menu(),
        )
    }
}
