//! Button payloads.
//!
//! Every button carries a short colon-separated string. [`CallbackAction`]
//! parses those strings and renders them back through `Display`, so the
//! keyboards and the dispatcher cannot drift apart.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumString};

use super::FlowError;

/// Bouquet field that can be edited after saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EditField {
    Title,
    Description,
    Composition,
    Price,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    NewBouquet,
    Settings,
    Next,
    ChangeTitle,
    AddVideo,
    MediaDone,
    SkipComposition,
    PickComposition,
    CategoryPage(usize),
    Category(i64),
    ProductPage { category_id: i64, page: usize },
    Product(i64),
    PickerDone,
    Save,
    EditPrice,
    BouquetPage(usize),
    BouquetDetail(String),
    EditBouquet(String),
    EditField { field: EditField, bouquet_id: String },
    DeleteBouquet(String),
    SetPhotoLimit,
    Noop,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewBouquet => f.write_str("menu:new"),
            Self::Settings => f.write_str("menu:settings"),
            Self::Next => f.write_str("flow:next"),
            Self::ChangeTitle => f.write_str("flow:change_title"),
            Self::AddVideo => f.write_str("media:video"),
            Self::MediaDone => f.write_str("media:done"),
            Self::SkipComposition => f.write_str("comp:skip"),
            Self::PickComposition => f.write_str("comp:pick"),
            Self::CategoryPage(page) => write!(f, "cat:page:{page}"),
            Self::Category(id) => write!(f, "cat:{id}"),
            Self::ProductPage { category_id, page } => write!(f, "prod:page:{category_id}:{page}"),
            Self::Product(id) => write!(f, "prod:{id}"),
            Self::PickerDone => f.write_str("picker:done"),
            Self::Save => f.write_str("preview:save"),
            Self::EditPrice => f.write_str("preview:edit_price"),
            Self::BouquetPage(page) => write!(f, "list:page:{page}"),
            Self::BouquetDetail(id) => write!(f, "bouquet:{id}"),
            Self::EditBouquet(id) => write!(f, "bouquet:edit:{id}"),
            Self::EditField { field, bouquet_id } => write!(f, "bouquet:field:{field}:{bouquet_id}"),
            Self::DeleteBouquet(id) => write!(f, "bouquet:delete:{id}"),
            Self::SetPhotoLimit => f.write_str("settings:limit"),
            Self::Noop => f.write_str("noop"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = FlowError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || FlowError::UnknownAction(data.to_string());
        let number = |s: &str| s.parse::<usize>().map_err(|_| unknown());
        let id = |s: &str| s.parse::<i64>().map_err(|_| unknown());

        let parts: Vec<&str> = data.trim().split(':').collect();
        let action = match parts.as_slice() {
            ["menu", "new"] => Self::NewBouquet,
            ["menu", "settings"] => Self::Settings,
            ["flow", "next"] => Self::Next,
            ["flow", "change_title"] => Self::ChangeTitle,
            ["media", "video"] => Self::AddVideo,
            ["media", "done"] => Self::MediaDone,
            ["comp", "skip"] => Self::SkipComposition,
            ["comp", "pick"] => Self::PickComposition,
            ["cat", "page", page] => Self::CategoryPage(number(page)?),
            ["cat", category] => Self::Category(id(category)?),
            ["prod", "page", category, page] => Self::ProductPage {
                category_id: id(category)?,
                page: number(page)?,
            },
            ["prod", product] => Self::Product(id(product)?),
            ["picker", "done"] => Self::PickerDone,
            ["preview", "save"] => Self::Save,
            ["preview", "edit_price"] => Self::EditPrice,
            ["list", "page", page] => Self::BouquetPage(number(page)?),
            ["bouquet", "edit", bouquet] => Self::EditBouquet((*bouquet).to_string()),
            ["bouquet", "delete", bouquet] => Self::DeleteBouquet((*bouquet).to_string()),
            ["bouquet", "field", field, bouquet] => Self::EditField {
                field: field.parse().map_err(|_| unknown())?,
                bouquet_id: (*bouquet).to_string(),
            },
            ["bouquet", bouquet] if !bouquet.is_empty() => {
                Self::BouquetDetail((*bouquet).to_string())
            }
            ["settings", "limit"] => Self::SetPhotoLimit,
            ["noop"] => Self::Noop,
            _ => return Err(unknown()),
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CallbackAction::Next)]
    #[case(CallbackAction::CategoryPage(3))]
    #[case(CallbackAction::Category(12))]
    #[case(CallbackAction::ProductPage { category_id: 4, page: 2 })]
    #[case(CallbackAction::BouquetDetail("0201".into()))]
    #[case(CallbackAction::EditField { field: EditField::Price, bouquet_id: "0201".into() })]
    #[case(CallbackAction::DeleteBouquet("0203".into()))]
    fn wire_form_parses_back(#[case] action: CallbackAction) {
        assert_eq!(action.to_string().parse::<CallbackAction>().unwrap(), action);
    }

    #[rstest]
    #[case("")]
    #[case("cat:page:x")]
    #[case("bouquet:field:colour:0201")]
    #[case("weird")]
    fn rejects_unknown_payloads(#[case] data: &str) {
        assert!(matches!(
            data.parse::<CallbackAction>(),
            Err(FlowError::UnknownAction(_))
        ));
    }
}
