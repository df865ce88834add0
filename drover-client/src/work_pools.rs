//! Work pool API endpoints

use crate::SchedulerClient;
use crate::error::Result;
use drover_core::domain::work_pool::WorkPool;

impl SchedulerClient {
    /// Get a work pool by name, including its base job template.
    ///
    /// Workers call this once per poll cycle to keep their cached pool
    /// fresh.
    pub async fn get_work_pool(&self, work_pool_name: &str) -> Result<WorkPool> {
        let url = format!("{}/api/work_pools/{}", self.base_url, work_pool_name);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
