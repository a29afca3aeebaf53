//! Creating a bouquet, from the first title prompt to the saved record.

use tracing::{info, warn};

use super::engine::{Ctx, FlowEngine, StepResult};
use super::keyboards;
use super::validate;
use crate::catalog::format_composition;
use crate::repository::{NewBouquet, RepositoryError, title_display};
use crate::session::{Draft, SessionState, Stage};
use crate::types::ItemRef;
use crate::upload::upload_all;
use crate::utils::format_price;

/// Preview shown before saving.
fn preview(draft: &Draft, photos: usize) -> String {
    let id = draft.bouquet_id.as_deref().unwrap_or_default();
    let title = draft.title.as_deref().unwrap_or_default();
    let price = draft.price.map_or(0, i64::from) * 100;

    let mut text = format!(
        "{}\nPrice: {}\nPhotos: {photos}",
        title_display(title, id),
        format_price(price)
    );
    if draft.video.is_some() {
        text.push_str(", video attached");
    }
    if let Some(description) = draft.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str("\n\n");
        text.push_str(description);
    }
    if !draft.composition.is_empty() {
        text.push_str("\n\nComposition:\n");
        text.push_str(&format_composition(&draft.composition));
    }
    text
}

impl FlowEngine {
    pub(crate) async fn start_bouquet(&self, ctx: Ctx) -> StepResult {
        let media = &self.config.media;
        let user = self
            .repo
            .get_or_create_user(ctx.user_id, media.default_limit)
            .await?;
        let bouquet_id = self
            .repo
            .next_bouquet_number(self.config.bouquets.first_number)
            .await?;

        let state = SessionState {
            stage: Stage::WaitingTitle,
            capacity: user.media_limit.max(media.min_limit).min(media.max_limit),
            draft: Draft {
                bouquet_id: Some(bouquet_id.clone()),
                owner_id: Some(user.id),
                ..Draft::default()
            },
            ..SessionState::default()
        };
        self.sessions.set(ctx.conversation_id, state).await?;

        info!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            bouquet_id = %bouquet_id,
            "Started bouquet"
        );
        self.say(
            ctx,
            format!("Bouquet №{bouquet_id}. Send a short title (3-40 characters)."),
        )
    }

    pub(crate) async fn on_title(&self, ctx: Ctx, text: &str) -> StepResult {
        let title = match validate::title(text) {
            Ok(title) => title,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let stored = title.clone();
        let applied = self
            .with_state(ctx, move |state| {
                if state.stage != Stage::WaitingTitle {
                    return false;
                }
                state.draft.title = Some(stored);
                true
            })
            .await?;
        if !applied {
            return self.stale(ctx);
        }

        self.reply(
            ctx,
            format!("Title: «{title}». Continue?"),
            keyboards::title_confirm(),
        )
    }

    pub(crate) async fn on_next(&self, ctx: Ctx) -> StepResult {
        let capacity = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingTitle || state.draft.title.is_none() {
                    return None;
                }
                state.stage = Stage::WaitingMedia;
                Some(state.capacity)
            })
            .await?;

        match capacity {
            Some(limit) => self.reply(
                ctx,
                format!("Send up to {limit} photos. Albums are welcome."),
                keyboards::media_controls(),
            ),
            None => self.stale(ctx),
        }
    }

    pub(crate) async fn on_change_title(&self, ctx: Ctx) -> StepResult {
        let applied = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingTitle {
                    return false;
                }
                state.draft.title = None;
                true
            })
            .await?;

        if applied {
            self.say(ctx, "Send a new title.")
        } else {
            self.stale(ctx)
        }
    }

    pub(crate) async fn on_add_video(&self, ctx: Ctx) -> StepResult {
        let applied = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingMedia {
                    return false;
                }
                state.stage = Stage::WaitingVideo;
                true
            })
            .await?;

        if applied {
            self.say(ctx, "Send one video.")
        } else {
            self.stale(ctx)
        }
    }

    pub(crate) async fn on_video(&self, ctx: Ctx, item: ItemRef) -> StepResult {
        let state = self.sessions.get(ctx.conversation_id).await?;
        match state.stage {
            Stage::WaitingVideo => {}
            Stage::WaitingMedia => {
                return self.reply(
                    ctx,
                    "Press \"Add video\" first.",
                    keyboards::media_controls(),
                );
            }
            _ => return self.say(ctx, "I'm not collecting videos right now."),
        }
        let bouquet_id = state.draft.bouquet_id.unwrap_or_default();

        let (video, message) = match self.uploader.upload_video(&item, &bouquet_id).await {
            Ok(Some(url)) => (Some(url.clone()), format!("Video saved: {url}")),
            Ok(None) => (Some(item.to_string()), "Video saved.".to_string()),
            Err(e) => {
                warn!(
                    target: "bouquet::flow",
                    conversation_id = %ctx.conversation_id,
                    bouquet_id = %bouquet_id,
                    error = %e,
                    "Video upload failed"
                );
                (None, format!("Could not upload the video: {e}"))
            }
        };

        self.with_state(ctx, move |state| {
            if state.stage != Stage::WaitingVideo {
                return;
            }
            if video.is_some() {
                state.draft.video = video;
            }
            state.stage = Stage::WaitingMedia;
        })
        .await?;

        self.reply(ctx, message, keyboards::media_controls())
    }

    pub(crate) async fn on_media_done(&self, ctx: Ctx) -> StepResult {
        let collected = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingMedia {
                    return None;
                }
                if !state.items.is_empty() {
                    state.stage = Stage::WaitingDescription;
                }
                Some(state.items.len())
            })
            .await?;

        match collected {
            None => self.stale(ctx),
            Some(0) => self.reply(
                ctx,
                "Send at least one photo first.",
                keyboards::media_controls(),
            ),
            Some(count) => self.say(
                ctx,
                format!("{count} photo(s) saved. Now send a description (up to 800 characters)."),
            ),
        }
    }

    pub(crate) async fn on_description(&self, ctx: Ctx, text: &str) -> StepResult {
        let description = match validate::description(text) {
            Ok(description) => description,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let applied = self
            .with_state(ctx, move |state| {
                if state.stage != Stage::WaitingDescription {
                    return false;
                }
                state.draft.description = Some(description);
                state.stage = Stage::WaitingComposition;
                true
            })
            .await?;
        if !applied {
            return self.stale(ctx);
        }

        self.reply(
            ctx,
            "Send the composition, one flower per line (Rose - 5), or pick it from the catalog.",
            keyboards::composition_choice(),
        )
    }

    pub(crate) async fn on_composition_text(&self, ctx: Ctx, text: &str) -> StepResult {
        let items = match validate::composition(text) {
            Ok(items) => items,
            Err(e) => return self.say(ctx, e.to_string()),
        };
        let listing = format_composition(&items);

        let applied = self
            .with_state(ctx, move |state| {
                if state.stage != Stage::WaitingComposition {
                    return false;
                }
                state.draft.composition = items;
                state.stage = Stage::WaitingPrice;
                true
            })
            .await?;
        if !applied {
            return self.stale(ctx);
        }

        self.say(
            ctx,
            format!("Composition:\n{listing}\n\nNow send the price in rubles."),
        )
    }

    pub(crate) async fn on_skip_composition(&self, ctx: Ctx) -> StepResult {
        let applied = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingComposition {
                    return false;
                }
                state.stage = Stage::WaitingPrice;
                true
            })
            .await?;

        if applied {
            self.say(ctx, "Send the price in rubles.")
        } else {
            self.stale(ctx)
        }
    }

    pub(crate) async fn on_price(&self, ctx: Ctx, text: &str) -> StepResult {
        let price = match validate::price(text) {
            Ok(price) => price,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let snapshot = self
            .with_state(ctx, move |state| {
                if state.stage != Stage::WaitingPrice {
                    return None;
                }
                state.draft.price = Some(price);
                Some((state.draft.clone(), state.items.len()))
            })
            .await?;

        match snapshot {
            Some((draft, photos)) => {
                self.reply(ctx, preview(&draft, photos), keyboards::preview_actions())
            }
            None => self.stale(ctx),
        }
    }

    pub(crate) async fn on_edit_price(&self, ctx: Ctx) -> StepResult {
        let applied = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingPrice || state.draft.price.is_none() {
                    return false;
                }
                state.draft.price = None;
                true
            })
            .await?;

        if applied {
            self.say(ctx, "Send the new price.")
        } else {
            self.stale(ctx)
        }
    }

    pub(crate) async fn save_bouquet(&self, ctx: Ctx) -> StepResult {
        let state = self.sessions.get(ctx.conversation_id).await?;
        if state.stage != Stage::WaitingPrice {
            return self.stale(ctx);
        }
        let SessionState { items, draft, .. } = state;
        let (Some(bouquet_id), Some(owner_id), Some(title), Some(price)) =
            (draft.bouquet_id, draft.owner_id, draft.title, draft.price)
        else {
            return self.stale(ctx);
        };

        let photos = upload_all(self.uploader.as_ref(), &items, &bouquet_id).await;
        let mut new = NewBouquet {
            bouquet_id,
            owner_id,
            short_title: title,
            description: draft.description.unwrap_or_default(),
            composition: draft.composition,
            photos,
            video: draft.video,
            price_minor: i64::from(price) * 100,
        };

        let bouquet = match self.repo.create_bouquet(&new).await {
            Err(RepositoryError::Conflict { .. }) => {
                let taken = std::mem::take(&mut new.bouquet_id);
                new.bouquet_id = self
                    .repo
                    .next_bouquet_number(self.config.bouquets.first_number)
                    .await?;
                warn!(
                    target: "bouquet::flow",
                    conversation_id = %ctx.conversation_id,
                    taken = %taken,
                    bouquet_id = %new.bouquet_id,
                    "Bouquet number taken, renumbering"
                );
                self.repo.create_bouquet(&new).await?
            }
            other => other?,
        };

        self.sessions.clear(ctx.conversation_id).await?;
        info!(
            target: "bouquet::flow",
            conversation_id = %ctx.conversation_id,
            bouquet_id = %bouquet.bouquet_id,
            photos = bouquet.photos.len(),
            "Saved bouquet"
        );
        self.reply(
            ctx,
            format!("Saved: {}", bouquet.title_display),
            keyboards::main_menu(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CompositionItem;

    #[test]
    fn preview_lists_every_filled_field() {
        let draft = Draft {
            bouquet_id: Some("0201".into()),
            owner_id: Some(1),
            title: Some("Spring".into()),
            description: Some("Soft pink".into()),
            composition: vec![CompositionItem {
                name: "rose".into(),
                qty: 5,
                color: None,
                kind: "rose".into(),
                category: None,
                product_id: None,
            }],
            price: Some(3500),
            video: Some("vid".into()),
        };

        let text = preview(&draft, 3);
        assert!(text.starts_with("Spring №0201"));
        assert!(text.contains("3 500 ₽"));
        assert!(text.contains("Photos: 3, video attached"));
        assert!(text.contains("Soft pink"));
        assert!(text.contains("• rose — 5 pcs"));
    }

    #[test]
    fn preview_skips_empty_sections() {
        let draft = Draft {
            bouquet_id: Some("0202".into()),
            title: Some("Plain".into()),
            price: Some(10),
            ..Draft::default()
        };
        let text = preview(&draft, 1);
        assert!(!text.contains("Composition"));
        assert!(!text.contains("video"));
    }
}
