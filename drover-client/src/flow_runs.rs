//! Flow run API endpoints

use crate::SchedulerClient;
use crate::error::Result;
use drover_core::domain::flow_run::FlowRun;
use drover_core::dto::flow_run::{RunOutcome, ScheduledRunsFilter};
use uuid::Uuid;

impl SchedulerClient {
    /// Fetch the flow runs scheduled on a work pool that are ready to
    /// dispatch.
    ///
    /// # Arguments
    /// * `work_pool_name` - The pool this worker polls
    /// * `filter` - Queue restriction and prefetch window
    ///
    /// # Returns
    /// Runs the scheduler considers runnable now, in scheduler order
    pub async fn get_scheduled_flow_runs(
        &self,
        work_pool_name: &str,
        filter: &ScheduledRunsFilter,
    ) -> Result<Vec<FlowRun>> {
        let url = format!(
            "{}/api/work_pools/{}/get_scheduled_flow_runs",
            self.base_url, work_pool_name
        );
        let response = self.client.post(&url).json(filter).send().await?;

        self.handle_response(response).await
    }

    /// Get a flow run by ID
    pub async fn get_flow_run(&self, flow_run_id: Uuid) -> Result<FlowRun> {
        let url = format!("{}/api/flow_runs/{}", self.base_url, flow_run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Report a terminal outcome for a flow run this worker could not see
    /// through to a healthy hand-off.
    ///
    /// # Arguments
    /// * `flow_run_id` - The run the outcome belongs to
    /// * `outcome` - Failed, crashed, or cancelled, with a message
    pub async fn report_flow_run_outcome(
        &self,
        flow_run_id: Uuid,
        outcome: &RunOutcome,
    ) -> Result<()> {
        let url = format!("{}/api/flow_runs/{}/outcome", self.base_url, flow_run_id);
        let response = self.client.post(&url).json(outcome).send().await?;

        self.handle_empty_response(response).await
    }
}
