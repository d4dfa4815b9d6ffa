// Database module
// SQLite holds the article store, the chunk table and its FTS5 index

pub mod sqlite;

pub use sqlite::*;
