//! Deployment and flow API endpoints

use crate::SchedulerClient;
use crate::error::Result;
use drover_core::domain::deployment::{Deployment, Flow};
use uuid::Uuid;

impl SchedulerClient {
    /// Get a deployment by ID.
    ///
    /// Needed per dispatch: a run's deployment carries job variable
    /// overrides and the identity that ends up in job labels.
    pub async fn get_deployment(&self, deployment_id: Uuid) -> Result<Deployment> {
        let url = format!("{}/api/deployments/{}", self.base_url, deployment_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a flow definition by ID
    pub async fn get_flow(&self, flow_id: Uuid) -> Result<Flow> {
        let url = format!("{}/api/flows/{}", self.base_url, flow_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
