pub mod audio;
pub mod conversation;
pub mod database;
pub mod search;
pub mod summary;
pub mod translation;

pub use database::Database;
pub use summary::SummaryGateway;
pub use translation::TranslationGateway;
