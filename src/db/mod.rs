mod models;
mod schema;

pub use models::{Link, LinkSummary};
pub use schema::Database;
