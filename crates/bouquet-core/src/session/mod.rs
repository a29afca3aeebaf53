pub mod sqlite_store;
pub mod state;
pub mod store;

pub use sqlite_store::SqliteSessionStore;
pub use state::{DEFAULT_MEDIA_LIMIT, Draft, SessionState, Stage};
pub use store::{InMemorySessionStore, Mutator, SessionStore, SessionStoreError, update_with};
