use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind assigned when no keyword matches.
pub const DEFAULT_KIND: &str = "other";

#[expect(clippy::unwrap_used)]
static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?)[-—:]\s*(\d+)").unwrap());

// Stems matched against the lower-cased name; first hit wins.
const COLOR_STEMS: &[&str] = &[
    "бел", "розов", "красн", "кремов", "бордов", "лилов", "жёлт", "желт", "white", "pink", "red",
    "cream", "burgundy", "lilac", "yellow",
];

const KIND_STEMS: &[(&str, &str)] = &[
    ("роза", "rose"),
    ("rose", "rose"),
    ("эустом", "eustoma"),
    ("eustoma", "eustoma"),
    ("пион", "peony"),
    ("peony", "peony"),
    ("ранункулюс", "ranunculus"),
    ("ranunculus", "ranunculus"),
    ("тюльпан", "tulip"),
    ("tulip", "tulip"),
];

/// One line of a bouquet's composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionItem {
    pub name: String,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
}

impl CompositionItem {
    /// Search tags: the kind, plus `kind:color` when a colour is known.
    pub fn tags(&self) -> Vec<String> {
        match &self.color {
            Some(color) => vec![self.kind.clone(), format!("{}:{}", self.kind, color)],
            None => vec![self.kind.clone()],
        }
    }

    pub fn display_line(&self) -> String {
        format!("• {} — {} pcs", self.name, self.qty)
    }
}

pub fn detect_color(name: &str) -> Option<String> {
    COLOR_STEMS
        .iter()
        .find(|stem| name.contains(*stem))
        .map(|stem| (*stem).to_string())
}

pub fn detect_kind(name: &str) -> String {
    KIND_STEMS
        .iter()
        .find(|(stem, _)| name.contains(stem))
        .map_or(DEFAULT_KIND, |(_, kind)| *kind)
        .to_string()
}

/// Parses free text such as `"Red rose - 5\nEustoma: 3"` line by line.
///
/// Lines that do not match `<name> <sep> <qty>` are skipped. Returns `None`
/// when no line parses.
pub fn parse_composition(text: &str) -> Option<Vec<CompositionItem>> {
    let items: Vec<CompositionItem> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = LINE_RE.captures(line)?;
            let name = caps.get(1)?.as_str().trim().to_lowercase();
            let qty = caps.get(2)?.as_str().parse::<u32>().ok()?;
            if name.is_empty() {
                return None;
            }
            Some(CompositionItem {
                color: detect_color(&name),
                kind: detect_kind(&name),
                name,
                qty,
                category: None,
                product_id: None,
            })
        })
        .collect();

    if items.is_empty() { None } else { Some(items) }
}

/// Multi-line listing used in previews and detail cards.
pub fn format_composition(items: &[CompositionItem]) -> String {
    items
        .iter()
        .map(CompositionItem::display_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-line form used by exports: `"name x3; other x1"`.
pub fn flatten_composition(items: &[CompositionItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} x{}", item.name, item.qty))
        .collect::<Vec<_>>()
        .join("; ")
}
