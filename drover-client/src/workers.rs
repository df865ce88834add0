//! Worker API endpoints

use crate::SchedulerClient;
use crate::error::Result;
use drover_core::dto::worker::WorkerHeartbeat;

impl SchedulerClient {
    /// Send a worker heartbeat to the scheduler.
    ///
    /// Keeps the worker listed as online for its pool. Should be called
    /// periodically (e.g., every 30 seconds).
    pub async fn send_worker_heartbeat(
        &self,
        work_pool_name: &str,
        heartbeat: &WorkerHeartbeat,
    ) -> Result<()> {
        let url = format!(
            "{}/api/work_pools/{}/workers/heartbeat",
            self.base_url, work_pool_name
        );
        let response = self.client.post(&url).json(heartbeat).send().await?;

        self.handle_empty_response(response).await
    }
}
