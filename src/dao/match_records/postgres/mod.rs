mod error;
pub mod store;

pub use error::PgDaoError;
pub use store::PgMatchRecords;

use crate::dao::storage::StorageError;

impl From<PgDaoError> for StorageError {
    fn from(err: PgDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
