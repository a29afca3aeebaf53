pub mod composition;
pub mod import;
pub mod page;

pub use composition::{
    CompositionItem, DEFAULT_KIND, flatten_composition, format_composition, parse_composition,
};
pub use import::{
    CatalogError, CatalogImport, CategoryRow, ImportProduct, NormalizedCatalog, ProductRow,
};
pub use page::Page;
