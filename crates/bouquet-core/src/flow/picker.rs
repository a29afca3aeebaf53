//! Building a composition from catalog buttons.

use tracing::debug;

use super::callback::CallbackAction;
use super::engine::{Ctx, FlowEngine, StepError, StepResult};
use super::keyboards::{self, Keyboard};
use super::outbox::Button;
use super::validate;
use crate::catalog::{CompositionItem, Page, format_composition};
use crate::session::{SessionState, Stage};

fn in_picker(stage: Stage) -> bool {
    matches!(
        stage,
        Stage::ChoosingCategory | Stage::ChoosingProduct | Stage::EnteringQuantity
    )
}

fn done_button() -> Button {
    Button::new("Done", &CallbackAction::PickerDone)
}

impl FlowEngine {
    pub(crate) async fn start_picker(&self, ctx: Ctx) -> StepResult {
        let applied = self
            .with_state(ctx, |state| {
                if state.stage != Stage::WaitingComposition {
                    return false;
                }
                state.stage = Stage::ChoosingCategory;
                state.selected_product = None;
                true
            })
            .await?;

        if !applied {
            return self.stale(ctx);
        }
        self.render_categories(ctx, 0).await
    }

    pub(crate) async fn show_categories(&self, ctx: Ctx, page: usize) -> StepResult {
        if !self.enter_picker_stage(ctx, Stage::ChoosingCategory).await? {
            return self.stale(ctx);
        }
        self.render_categories(ctx, page).await
    }

    /// Moves to `stage` if the conversation is inside the picker.
    async fn enter_picker_stage(&self, ctx: Ctx, stage: Stage) -> Result<bool, StepError> {
        self.with_state(ctx, move |state| {
            if !in_picker(state.stage) {
                return false;
            }
            state.stage = stage;
            if stage == Stage::ChoosingCategory {
                state.selected_product = None;
            }
            true
        })
        .await
    }

    async fn render_categories(&self, ctx: Ctx, requested: usize) -> StepResult {
        let categories = self.repo.list_categories().await?;
        if categories.is_empty() {
            return self.reply(
                ctx,
                "The catalog is empty. Load one with `bouquet catalog import <FILE>`, or press \"Done\".",
                vec![vec![done_button()]],
            );
        }

        let page = Page::clamp(categories.len(), self.config.catalog.page_size, requested);
        let mut buttons: Keyboard = page
            .slice(&categories)
            .iter()
            .map(|category| vec![Button::new(&category.name, &CallbackAction::Category(category.id))])
            .collect();
        let nav = keyboards::nav_row(&page, CallbackAction::CategoryPage);
        if !nav.is_empty() {
            buttons.push(nav);
        }
        buttons.push(vec![done_button()]);

        self.reply(ctx, "Choose a category:", buttons)
    }

    pub(crate) async fn show_products(
        &self,
        ctx: Ctx,
        category_id: i64,
        requested: usize,
    ) -> StepResult {
        if !self.enter_picker_stage(ctx, Stage::ChoosingProduct).await? {
            return self.stale(ctx);
        }

        let Some(category) = self.repo.get_category(category_id).await? else {
            self.enter_picker_stage(ctx, Stage::ChoosingCategory).await?;
            self.say(ctx, "That category no longer exists.")?;
            return self.render_categories(ctx, 0).await;
        };

        let products = self.repo.list_products(category_id).await?;
        let page = Page::clamp(products.len(), self.config.catalog.page_size, requested);

        let mut buttons: Keyboard = page
            .slice(&products)
            .iter()
            .map(|product| vec![Button::new(product.label(), &CallbackAction::Product(product.id))])
            .collect();
        let nav = keyboards::nav_row(&page, |page| CallbackAction::ProductPage { category_id, page });
        if !nav.is_empty() {
            buttons.push(nav);
        }
        buttons.push(vec![
            Button::new("Back to categories", &CallbackAction::CategoryPage(0)),
            done_button(),
        ]);

        let text = if products.is_empty() {
            format!("No flowers in {} yet.", category.name)
        } else {
            format!("{}: choose a flower.", category.name)
        };
        self.reply(ctx, text, buttons)
    }

    pub(crate) async fn select_product(&self, ctx: Ctx, product_id: i64) -> StepResult {
        let state = self.sessions.get(ctx.conversation_id).await?;
        if !in_picker(state.stage) {
            return self.stale(ctx);
        }

        let product = self
            .repo
            .get_product(product_id)
            .await?
            .filter(|product| product.active);
        let Some(product) = product else {
            self.enter_picker_stage(ctx, Stage::ChoosingCategory).await?;
            self.say(ctx, "That flower is no longer available.")?;
            return self.render_categories(ctx, 0).await;
        };

        let applied = self
            .with_state(ctx, move |state| {
                if !in_picker(state.stage) {
                    return false;
                }
                state.stage = Stage::EnteringQuantity;
                state.selected_product = Some(product_id);
                true
            })
            .await?;
        if !applied {
            return self.stale(ctx);
        }

        self.say(ctx, format!("How many «{}»? (1-9999)", product.label()))
    }

    pub(crate) async fn on_quantity(&self, ctx: Ctx, state: &SessionState, text: &str) -> StepResult {
        let qty = match validate::quantity(text) {
            Ok(qty) => qty,
            Err(e) => return self.say(ctx, e.to_string()),
        };

        let product = match state.selected_product {
            Some(id) => self.repo.get_product(id).await?,
            None => None,
        };
        let Some(product) = product else {
            self.enter_picker_stage(ctx, Stage::ChoosingCategory).await?;
            self.say(ctx, "That flower is no longer available.")?;
            return self.render_categories(ctx, 0).await;
        };
        let category = self
            .repo
            .get_category(product.category_id)
            .await?
            .map(|category| category.name);

        let item = CompositionItem {
            name: product.name.clone(),
            qty,
            color: product.color.clone(),
            kind: product.kind.clone(),
            category,
            product_id: Some(product.id),
        };
        let line = item.display_line();

        let applied = self
            .with_state(ctx, move |state| {
                if state.stage != Stage::EnteringQuantity {
                    return false;
                }
                state.draft.composition.push(item);
                state.stage = Stage::ChoosingCategory;
                state.selected_product = None;
                true
            })
            .await?;
        if !applied {
            return self.stale(ctx);
        }

        debug!(
            target: "bouquet::flow::picker",
            conversation_id = %ctx.conversation_id,
            product_id = product.id,
            qty,
            "Added composition item"
        );
        self.say(ctx, format!("Added {line}"))?;
        self.render_categories(ctx, 0).await
    }

    pub(crate) async fn finish_picker(&self, ctx: Ctx) -> StepResult {
        let composition = self
            .with_state(ctx, |state| {
                if !in_picker(state.stage) {
                    return None;
                }
                state.stage = Stage::WaitingPrice;
                state.selected_product = None;
                Some(state.draft.composition.clone())
            })
            .await?;

        let Some(composition) = composition else {
            return self.stale(ctx);
        };
        let summary = if composition.is_empty() {
            "The composition is empty.".to_string()
        } else {
            format!("Composition:\n{}", format_composition(&composition))
        };
        self.say(ctx, format!("{summary}\n\nNow send the price in rubles."))
    }
}
