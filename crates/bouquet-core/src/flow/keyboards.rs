use super::callback::{CallbackAction, EditField};
use super::outbox::Button;
use crate::catalog::Page;

pub type Keyboard = Vec<Vec<Button>>;

pub fn main_menu() -> Keyboard {
    vec![
        vec![Button::new("New bouquet", &CallbackAction::NewBouquet)],
        vec![Button::new("My bouquets", &CallbackAction::BouquetPage(0))],
        vec![Button::new("Settings", &CallbackAction::Settings)],
    ]
}

pub fn title_confirm() -> Keyboard {
    vec![vec![
        Button::new("Next", &CallbackAction::Next),
        Button::new("Change title", &CallbackAction::ChangeTitle),
    ]]
}

pub fn media_controls() -> Keyboard {
    vec![vec![
        Button::new("Add video", &CallbackAction::AddVideo),
        Button::new("Done", &CallbackAction::MediaDone),
    ]]
}

pub fn composition_choice() -> Keyboard {
    vec![vec![
        Button::new("Skip", &CallbackAction::SkipComposition),
        Button::new("Pick composition", &CallbackAction::PickComposition),
    ]]
}

pub fn preview_actions() -> Keyboard {
    vec![vec![
        Button::new("Save", &CallbackAction::Save),
        Button::new("Edit price", &CallbackAction::EditPrice),
    ]]
}

pub fn settings() -> Keyboard {
    vec![vec![Button::new(
        "Change photo limit",
        &CallbackAction::SetPhotoLimit,
    )]]
}

/// `« Prev | i/n | Next »`, with the arrows only where they lead somewhere.
pub fn nav_row(page: &Page, to_page: impl Fn(usize) -> CallbackAction) -> Vec<Button> {
    let mut row = Vec::new();
    if page.has_prev() {
        row.push(Button::new("« Prev", &to_page(page.index - 1)));
    }
    if page.pages > 1 {
        row.push(Button::new(
            format!("{}/{}", page.index + 1, page.pages),
            &CallbackAction::Noop,
        ));
    }
    if page.has_next() {
        row.push(Button::new("Next »", &to_page(page.index + 1)));
    }
    row
}

pub fn bouquet_detail(bouquet_id: &str) -> Keyboard {
    vec![
        vec![
            Button::new("Edit", &CallbackAction::EditBouquet(bouquet_id.to_string())),
            Button::new(
                "Delete",
                &CallbackAction::DeleteBouquet(bouquet_id.to_string()),
            ),
        ],
        vec![Button::new("Back to list", &CallbackAction::BouquetPage(0))],
    ]
}

pub fn edit_fields(bouquet_id: &str) -> Keyboard {
    let field = |label: &str, field: EditField| {
        Button::new(
            label,
            &CallbackAction::EditField {
                field,
                bouquet_id: bouquet_id.to_string(),
            },
        )
    };
    vec![
        vec![
            field("Title", EditField::Title),
            field("Description", EditField::Description),
        ],
        vec![
            field("Composition", EditField::Composition),
            field("Price", EditField::Price),
        ],
        vec![Button::new(
            "Back",
            &CallbackAction::BouquetDetail(bouquet_id.to_string()),
        )],
    ]
}
