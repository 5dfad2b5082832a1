/// Live match document storage.
pub mod live_store;
/// Relational match records (status codes, schedule, history).
pub mod match_records;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
