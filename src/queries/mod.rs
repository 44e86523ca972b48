pub mod codec;
pub mod listing;
pub mod schema;
pub mod sql;
