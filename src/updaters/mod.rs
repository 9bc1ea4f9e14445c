pub mod query;

use async_trait::async_trait;

use crate::models::{UpdateInfo, UpdateQueryRequest};
use crate::utils::QueryError;

pub use query::{parse_update_response, HttpUpdateChecker};

#[async_trait]
pub trait UpdateChecker: Send + Sync {
    async fn check_for_update(&self, request: &UpdateQueryRequest) -> Result<UpdateInfo, QueryError>;
}
