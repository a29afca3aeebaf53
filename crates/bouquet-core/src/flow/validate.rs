//! Field rules for user input. The `Display` of each error is the re-prompt
//! shown to the user.

use thiserror::Error;

use crate::catalog::{CompositionItem, parse_composition};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 40;
pub const DESCRIPTION_MAX: usize = 800;
pub const PRICE_MIN: u32 = 1;
pub const PRICE_MAX: u32 = 999_999;
pub const QUANTITY_MIN: u32 = 1;
pub const QUANTITY_MAX: u32 = 9_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The title must be 3-40 characters long (got {actual}).")]
    TitleLength { actual: usize },

    #[error("The description must be at most 800 characters (got {actual}).")]
    DescriptionTooLong { actual: usize },

    #[error("The price must be a whole number from 1 to 999 999.")]
    Price,

    #[error("The quantity must be a whole number from 1 to 9 999.")]
    Quantity,

    #[error("The photo limit must be a whole number from {min} to {max}.")]
    PhotoLimit { min: usize, max: usize },

    #[error("Could not read the composition. Send one flower per line, like: Rose - 5")]
    Composition,
}

pub fn title(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    let actual = trimmed.chars().count();
    if (TITLE_MIN..=TITLE_MAX).contains(&actual) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::TitleLength { actual })
    }
}

pub fn description(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    let actual = trimmed.chars().count();
    if actual <= DESCRIPTION_MAX {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::DescriptionTooLong { actual })
    }
}

fn whole_number(text: &str) -> Option<u64> {
    let digits: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    digits.parse().ok()
}

/// Accepts `"3500"` and `"3 500"`.
pub fn price(text: &str) -> Result<u32, ValidationError> {
    whole_number(text)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (PRICE_MIN..=PRICE_MAX).contains(n))
        .ok_or(ValidationError::Price)
}

pub fn quantity(text: &str) -> Result<u32, ValidationError> {
    whole_number(text)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (QUANTITY_MIN..=QUANTITY_MAX).contains(n))
        .ok_or(ValidationError::Quantity)
}

pub fn photo_limit(text: &str, min: usize, max: usize) -> Result<usize, ValidationError> {
    whole_number(text)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| (min..=max).contains(n))
        .ok_or(ValidationError::PhotoLimit { min, max })
}

pub fn composition(text: &str) -> Result<Vec<CompositionItem>, ValidationError> {
    parse_composition(text).ok_or(ValidationError::Composition)
}
