//! Flow run poller
//!
//! The central control loop: polls the scheduler for flow runs scheduled on
//! this worker's pool, renders each into a job configuration, and submits
//! it to the execution backend inside the capacity limiter.
//!
//! Each run's dispatch is independent: a bad template, a failed validation,
//! or a launch error fails that run only, never the batch and never the
//! loop. Transient scheduler failures are retried by the next scheduled
//! poll, not immediately.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use drover_client::{ClientError, SchedulerClient};
use drover_core::domain::deployment::{Deployment, Flow};
use drover_core::domain::flow_run::FlowRun;
use drover_core::domain::work_pool::WorkPool;
use drover_core::dto::flow_run::{RunOutcome, ScheduledRunsFilter};
use drover_core::dto::worker::WorkerHeartbeat;
use tokio_util::sync::CancellationToken;

use crate::backend::{ExecutionBackend, ExitResult, LaunchError};
use crate::config::WorkerConfig;
use crate::configuration::{ConfigurationError, JobConfiguration};
use crate::limiter::CapacityLimiter;
use crate::status::{PollState, WorkerSettings, WorkerStatus};

/// The scheduler operations the poller consumes.
///
/// A seam over [`SchedulerClient`] so the loop can be driven against a mock
/// scheduler in tests.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn get_work_pool(&self, work_pool_name: &str) -> Result<WorkPool, ClientError>;

    async fn get_scheduled_flow_runs(
        &self,
        work_pool_name: &str,
        filter: &ScheduledRunsFilter,
    ) -> Result<Vec<FlowRun>, ClientError>;

    async fn get_deployment(&self, deployment_id: Uuid) -> Result<Deployment, ClientError>;

    async fn get_flow(&self, flow_id: Uuid) -> Result<Flow, ClientError>;

    async fn report_flow_run_outcome(
        &self,
        flow_run_id: Uuid,
        outcome: &RunOutcome,
    ) -> Result<(), ClientError>;

    async fn send_worker_heartbeat(
        &self,
        work_pool_name: &str,
        heartbeat: &WorkerHeartbeat,
    ) -> Result<(), ClientError>;
}

#[async_trait]
impl SchedulerApi for SchedulerClient {
    async fn get_work_pool(&self, work_pool_name: &str) -> Result<WorkPool, ClientError> {
        SchedulerClient::get_work_pool(self, work_pool_name).await
    }

    async fn get_scheduled_flow_runs(
        &self,
        work_pool_name: &str,
        filter: &ScheduledRunsFilter,
    ) -> Result<Vec<FlowRun>, ClientError> {
        SchedulerClient::get_scheduled_flow_runs(self, work_pool_name, filter).await
    }

    async fn get_deployment(&self, deployment_id: Uuid) -> Result<Deployment, ClientError> {
        SchedulerClient::get_deployment(self, deployment_id).await
    }

    async fn get_flow(&self, flow_id: Uuid) -> Result<Flow, ClientError> {
        SchedulerClient::get_flow(self, flow_id).await
    }

    async fn report_flow_run_outcome(
        &self,
        flow_run_id: Uuid,
        outcome: &RunOutcome,
    ) -> Result<(), ClientError> {
        SchedulerClient::report_flow_run_outcome(self, flow_run_id, outcome).await
    }

    async fn send_worker_heartbeat(
        &self,
        work_pool_name: &str,
        heartbeat: &WorkerHeartbeat,
    ) -> Result<(), ClientError> {
        SchedulerClient::send_worker_heartbeat(self, work_pool_name, heartbeat).await
    }
}

/// Errors local to one flow run's dispatch. Caught at the dispatch
/// boundary, logged with the run's identity, reported to the scheduler, and
/// never allowed to escape into the poll loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A per-run scheduler read (deployment, flow) failed.
    #[error("scheduler request failed: {0}")]
    Scheduler(#[from] ClientError),

    /// Rendering, validation, or finalize failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The execution backend could not start or monitor the job.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The dispatch was abandoned when the shutdown grace period elapsed.
    #[error("dispatch abandoned during worker shutdown")]
    Cancelled,
}

/// Poller that continuously polls for and dispatches scheduled flow runs.
pub struct FlowRunPoller {
    config: WorkerConfig,
    scheduler: Arc<dyn SchedulerApi>,
    backend: Arc<dyn ExecutionBackend>,
    limiter: Arc<CapacityLimiter>,
    poll_state: Arc<PollState>,
    work_pool: RwLock<Option<WorkPool>>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    shutdown: CancellationToken,
}

impl FlowRunPoller {
    /// Creates a new poller.
    pub fn new(
        config: WorkerConfig,
        scheduler: Arc<dyn SchedulerApi>,
        backend: Arc<dyn ExecutionBackend>,
        shutdown: CancellationToken,
    ) -> Self {
        let limiter = Arc::new(CapacityLimiter::new(config.concurrency_limit));
        Self {
            config,
            scheduler,
            backend,
            limiter,
            poll_state: Arc::new(PollState::new()),
            work_pool: RwLock::new(None),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            shutdown,
        }
    }

    /// Point-in-time status snapshot, safe to call while the loop runs.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            name: self.config.name.clone(),
            work_pool_name: self.config.work_pool_name.clone(),
            queue_names: self.config.work_queue_names.clone(),
            settings: WorkerSettings {
                poll_interval_seconds: self.config.poll_interval.as_secs(),
                prefetch_seconds: self.config.prefetch.as_secs(),
                concurrency_limit: self.config.concurrency_limit,
            },
        }
    }

    /// Runs the poll loop until the shutdown token is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!(
            "starting flow run poller (interval: {:?}, pool: {}, limit: {:?})",
            self.config.poll_interval,
            self.config.work_pool_name,
            self.limiter.limit()
        );

        let heartbeat = self.start_heartbeat_loop();

        let mut interval = time::interval(self.config.poll_interval);
        let mut dispatches: JoinSet<Uuid> = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested; no further polls");
                    break;
                }
                _ = interval.tick() => {}
            }

            // reap finished dispatches without waiting on the rest
            while let Some(joined) = dispatches.try_join_next() {
                if let Err(e) = joined {
                    warn!("dispatch task panicked: {}", e);
                }
            }

            match self.poll_once(&mut dispatches).await {
                Ok(submitted) if submitted > 0 => {
                    info!("dispatched {} flow run(s) this cycle", submitted);
                }
                Ok(_) => {}
                // transient scheduler trouble: the next scheduled poll is
                // the retry, never a hot loop against a degraded scheduler
                Err(e) => error!("poll cycle failed: {}", e),
            }
        }

        heartbeat.abort();
        self.drain(dispatches).await;

        Ok(())
    }

    /// Performs a single poll cycle, spawning one dispatch task per
    /// prepared run.
    async fn poll_once(&self, dispatches: &mut JoinSet<Uuid>) -> Result<usize, ClientError> {
        // Recorded before the request: a failing scheduler still counts as
        // an attempt. Liveness is tied to poll initiation, not dispatch
        // completion; a worker stuck dispatching still reports healthy.
        self.poll_state.record_poll(Utc::now());

        self.refresh_work_pool().await;
        let pool = self.work_pool.read().await.clone();
        let Some(pool) = pool else {
            warn!(
                "work pool '{}' has never been fetched; skipping this cycle",
                self.config.work_pool_name
            );
            return Ok(0);
        };

        let prefetch = chrono::Duration::from_std(self.config.prefetch)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let filter = ScheduledRunsFilter {
            work_queue_names: self.config.work_queue_names.clone(),
            scheduled_before: Some(Utc::now() + prefetch),
        };

        let runs = self
            .scheduler
            .get_scheduled_flow_runs(&self.config.work_pool_name, &filter)
            .await?;

        if runs.is_empty() {
            debug!("no scheduled flow runs");
            return Ok(0);
        }

        info!("found {} scheduled flow run(s)", runs.len());

        let mut submitted = 0;
        for run in runs {
            let run_id = run.id;
            match self.prepare_configuration(&pool, &run).await {
                Ok(configuration) => {
                    self.spawn_dispatch(dispatches, run_id, configuration);
                    submitted += 1;
                }
                Err(e) => {
                    // one bad run must not take the rest of the batch with it
                    error!(flow_run = %run_id, "failed to prepare job configuration: {}", e);
                    Self::report_outcome(
                        self.scheduler.as_ref(),
                        run_id,
                        RunOutcome::Failed {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }

        Ok(submitted)
    }

    /// Refreshes the cached work pool, keeping the stale copy on failure.
    async fn refresh_work_pool(&self) {
        match self
            .scheduler
            .get_work_pool(&self.config.work_pool_name)
            .await
        {
            Ok(pool) => {
                *self.work_pool.write().await = Some(pool);
            }
            Err(e) => warn!(
                "failed to refresh work pool '{}': {}",
                self.config.work_pool_name, e
            ),
        }
    }

    /// Renders, validates, and finalizes one run's job configuration.
    ///
    /// Rendering is cheap and happens before the capacity limiter; only the
    /// launch/monitor phase in [`Self::dispatch`] holds a slot.
    async fn prepare_configuration(
        &self,
        pool: &WorkPool,
        run: &FlowRun,
    ) -> Result<JobConfiguration, DispatchError> {
        let deployment = match run.deployment_id {
            Some(id) => Some(self.scheduler.get_deployment(id).await?),
            None => None,
        };
        let flow = self.scheduler.get_flow(run.flow_id).await?;

        // pool defaults under deployment overrides under run overrides
        let mut bindings = pool.base_job_template.variable_defaults.clone();
        if let Some(deployment) = &deployment {
            bindings.extend(deployment.job_variables.clone());
        }
        bindings.extend(run.job_variables.clone());

        let schema = self.backend.config_schema();
        let mut configuration = JobConfiguration::from_template(
            &schema,
            &pool.base_job_template.job_configuration,
            &bindings,
        )?;
        configuration.finalize(
            run,
            deployment.as_ref(),
            Some(&flow),
            Some(pool),
            Some(&self.config.name),
        )?;

        Ok(configuration)
    }

    /// Spawns the launch/monitor phase of one dispatch as its own task.
    fn spawn_dispatch(
        &self,
        dispatches: &mut JoinSet<Uuid>,
        run_id: Uuid,
        configuration: JobConfiguration,
    ) {
        debug_assert!(configuration.is_finalized());

        let scheduler = Arc::clone(&self.scheduler);
        let backend = Arc::clone(&self.backend);
        let limiter = Arc::clone(&self.limiter);
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.lock().unwrap().insert(run_id);
        dispatches.spawn(async move {
            Self::dispatch(scheduler, backend, limiter, run_id, configuration).await;
            in_flight.lock().unwrap().remove(&run_id);
            run_id
        });
    }

    /// Launches one run and sees it through to completion.
    async fn dispatch(
        scheduler: Arc<dyn SchedulerApi>,
        backend: Arc<dyn ExecutionBackend>,
        limiter: Arc<CapacityLimiter>,
        run_id: Uuid,
        configuration: JobConfiguration,
    ) {
        let delegated = configuration.delegates_to_runner();

        // may block until a running job finishes; runs beyond capacity
        // wait here, they are not dropped
        let _token = limiter.acquire().await;

        match Self::execute(backend.as_ref(), run_id, &configuration).await {
            Ok(exit) if exit.success => {
                info!(flow_run = %run_id, "job completed");
            }
            Ok(exit) => {
                if delegated {
                    // the external runner owns this run's state; its exit
                    // code is not the worker's story to tell
                    debug!(
                        flow_run = %run_id,
                        exit_code = ?exit.exit_code,
                        "runner-delegated job exited unsuccessfully"
                    );
                } else {
                    warn!(
                        flow_run = %run_id,
                        exit_code = ?exit.exit_code,
                        "job exited without reporting state"
                    );
                    Self::report_outcome(
                        scheduler.as_ref(),
                        run_id,
                        RunOutcome::Crashed {
                            message: format!("job exited with status {:?}", exit.exit_code),
                        },
                    )
                    .await;
                }
            }
            Err(e) => {
                error!(flow_run = %run_id, "job launch failed: {}", e);
                Self::report_outcome(
                    scheduler.as_ref(),
                    run_id,
                    RunOutcome::Failed {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    async fn execute(
        backend: &dyn ExecutionBackend,
        run_id: Uuid,
        configuration: &JobConfiguration,
    ) -> Result<ExitResult, DispatchError> {
        let handle = backend.submit(configuration).await?;
        debug!(flow_run = %run_id, job = handle.identifier(), "job submitted");
        Ok(backend.await_completion(handle).await?)
    }

    async fn report_outcome(scheduler: &dyn SchedulerApi, run_id: Uuid, outcome: RunOutcome) {
        if let Err(e) = scheduler.report_flow_run_outcome(run_id, &outcome).await {
            warn!(flow_run = %run_id, "failed to report run outcome: {}", e);
        }
    }

    /// Lets in-flight dispatches finish within the grace period, then
    /// abandons the rest and reports them cancelled.
    async fn drain(&self, mut dispatches: JoinSet<Uuid>) {
        if dispatches.is_empty() {
            return;
        }

        info!(
            "draining {} in-flight dispatch(es) (grace: {:?})",
            dispatches.len(),
            self.config.shutdown_grace
        );

        let drained = time::timeout(self.config.shutdown_grace, async {
            while dispatches.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            info!("all dispatches finished");
            return;
        }

        let abandoned: Vec<Uuid> = self.in_flight.lock().unwrap().iter().copied().collect();
        warn!(
            "grace period elapsed; abandoning {} dispatch(es)",
            abandoned.len()
        );
        dispatches.abort_all();
        while dispatches.join_next().await.is_some() {}

        for run_id in abandoned {
            Self::report_outcome(
                self.scheduler.as_ref(),
                run_id,
                RunOutcome::Cancelled {
                    message: DispatchError::Cancelled.to_string(),
                },
            )
            .await;
        }
    }

    /// Starts the background heartbeat task.
    fn start_heartbeat_loop(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let poll_state = Arc::clone(&self.poll_state);
        let name = self.config.name.clone();
        let work_pool_name = self.config.work_pool_name.clone();
        let queue_names = self.config.work_queue_names.clone();
        let heartbeat_interval = self.config.heartbeat_interval;
        let poll_interval_seconds = self.config.poll_interval.as_secs();

        tokio::spawn(async move {
            let mut ticker = time::interval(heartbeat_interval);

            loop {
                ticker.tick().await;

                debug!("sending worker heartbeat");

                // per-run errors never show up here, but a loop that has
                // silently stopped polling does
                if poll_state.last_polled().is_some()
                    && !poll_state.is_still_polling(poll_interval_seconds)
                {
                    warn!("worker has not started a poll within its liveness window");
                }

                let heartbeat = WorkerHeartbeat {
                    name: name.clone(),
                    work_pool_name: work_pool_name.clone(),
                    queue_names: queue_names.clone(),
                    last_polled: poll_state.last_polled(),
                };

                if let Err(e) = scheduler
                    .send_worker_heartbeat(&work_pool_name, &heartbeat)
                    .await
                {
                    warn!("failed to send heartbeat: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LaunchHandle;
    use crate::configuration::{ConfigSchema, FieldKind, FieldSpec};
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn success_exit() -> ExitResult {
        ExitResult {
            success: true,
            exit_code: Some(0),
        }
    }

    fn failed_exit(exit_code: i32) -> ExitResult {
        ExitResult {
            success: false,
            exit_code: Some(exit_code),
        }
    }

    struct MockScheduler {
        pool: WorkPool,
        runs: Mutex<Vec<FlowRun>>,
        outcomes: Mutex<Vec<(Uuid, RunOutcome)>>,
        poll_count: AtomicUsize,
        failing_polls: usize,
    }

    impl MockScheduler {
        fn new(pool: WorkPool, runs: Vec<FlowRun>) -> Self {
            Self {
                pool,
                runs: Mutex::new(runs),
                outcomes: Mutex::new(Vec::new()),
                poll_count: AtomicUsize::new(0),
                failing_polls: 0,
            }
        }

        fn failing_first(mut self, polls: usize) -> Self {
            self.failing_polls = polls;
            self
        }

        fn outcomes(&self) -> Vec<(Uuid, RunOutcome)> {
            self.outcomes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SchedulerApi for MockScheduler {
        async fn get_work_pool(&self, _work_pool_name: &str) -> Result<WorkPool, ClientError> {
            Ok(self.pool.clone())
        }

        async fn get_scheduled_flow_runs(
            &self,
            _work_pool_name: &str,
            _filter: &ScheduledRunsFilter,
        ) -> Result<Vec<FlowRun>, ClientError> {
            let polls = self.poll_count.fetch_add(1, Ordering::SeqCst);
            if polls < self.failing_polls {
                return Err(ClientError::api_error(503, "scheduler unavailable"));
            }
            Ok(std::mem::take(&mut *self.runs.lock().unwrap()))
        }

        async fn get_deployment(&self, deployment_id: Uuid) -> Result<Deployment, ClientError> {
            Ok(Deployment {
                id: deployment_id,
                name: "test-deployment".to_string(),
                job_variables: Map::new(),
            })
        }

        async fn get_flow(&self, flow_id: Uuid) -> Result<Flow, ClientError> {
            Ok(Flow {
                id: flow_id,
                name: "test-flow".to_string(),
            })
        }

        async fn report_flow_run_outcome(
            &self,
            flow_run_id: Uuid,
            outcome: &RunOutcome,
        ) -> Result<(), ClientError> {
            self.outcomes
                .lock()
                .unwrap()
                .push((flow_run_id, outcome.clone()));
            Ok(())
        }

        async fn send_worker_heartbeat(
            &self,
            _work_pool_name: &str,
            _heartbeat: &WorkerHeartbeat,
        ) -> Result<(), ClientError> {
            Ok(())
        }
    }

    struct MockBackend {
        schema: ConfigSchema,
        exit: ExitResult,
        submitted: Mutex<Vec<Option<String>>>,
        hang: bool,
    }

    impl MockBackend {
        fn new(schema: ConfigSchema, exit: ExitResult) -> Self {
            Self {
                schema,
                exit,
                submitted: Mutex::new(Vec::new()),
                hang: false,
            }
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        fn submitted_commands(&self) -> Vec<Option<String>> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionBackend for MockBackend {
        fn kind(&self) -> &'static str {
            "mock"
        }

        fn config_schema(&self) -> ConfigSchema {
            self.schema.clone()
        }

        async fn submit(&self, config: &JobConfiguration) -> Result<LaunchHandle, LaunchError> {
            self.submitted
                .lock()
                .unwrap()
                .push(config.command().map(str::to_string));
            let exit = self.exit.clone();
            let hang = self.hang;
            let monitor = tokio::spawn(async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                Ok(exit)
            });
            Ok(LaunchHandle::new("mock-job".to_string(), monitor))
        }
    }

    fn strict_command_schema() -> ConfigSchema {
        ConfigSchema::new(vec![
            FieldSpec::required("command", FieldKind::String),
            FieldSpec::optional("env", FieldKind::Object),
            FieldSpec::optional("labels", FieldKind::Object),
            FieldSpec::optional("name", FieldKind::String),
        ])
    }

    fn lenient_schema() -> ConfigSchema {
        ConfigSchema::new(vec![
            FieldSpec::optional("command", FieldKind::String),
            FieldSpec::optional("env", FieldKind::Object),
            FieldSpec::optional("labels", FieldKind::Object),
            FieldSpec::optional("name", FieldKind::String),
        ])
    }

    fn test_pool(job_configuration: Value) -> WorkPool {
        WorkPool {
            name: "test-pool".to_string(),
            pool_type: "mock".to_string(),
            base_job_template: drover_core::domain::work_pool::JobTemplate {
                job_configuration: job_configuration
                    .as_object()
                    .expect("template is an object")
                    .clone(),
                variable_defaults: Map::new(),
            },
        }
    }

    fn test_run(job_variables: Value) -> FlowRun {
        FlowRun {
            id: Uuid::new_v4(),
            name: "test-run".to_string(),
            flow_id: Uuid::new_v4(),
            deployment_id: None,
            work_queue_name: None,
            parameters: Default::default(),
            job_variables: job_variables
                .as_object()
                .expect("variables are an object")
                .clone(),
            tags: Vec::new(),
        }
    }

    fn test_config() -> WorkerConfig {
        let mut config = WorkerConfig::new(
            "test-worker".to_string(),
            "http://localhost:4200".to_string(),
            "test-pool".to_string(),
        );
        config.worker_type = "mock".to_string();
        config.concurrency_limit = Some(2);
        config.shutdown_grace = Duration::from_secs(1);
        config
    }

    fn poller(
        scheduler: &Arc<MockScheduler>,
        backend: &Arc<MockBackend>,
        shutdown: CancellationToken,
    ) -> FlowRunPoller {
        FlowRunPoller::new(
            test_config(),
            Arc::clone(scheduler) as Arc<dyn SchedulerApi>,
            Arc::clone(backend) as Arc<dyn ExecutionBackend>,
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_one_failing_run_does_not_stop_the_batch() {
        let pool = test_pool(json!({"command": "{{ launch_command }}"}));
        let good_one = test_run(json!({"launch_command": "run-a"}));
        let bad = test_run(json!({}));
        let good_two = test_run(json!({"launch_command": "run-c"}));
        let bad_id = bad.id;

        let scheduler = Arc::new(MockScheduler::new(
            pool,
            vec![good_one, bad, good_two],
        ));
        let backend = Arc::new(MockBackend::new(
            strict_command_schema(),
            success_exit(),
        ));
        let poller = poller(&scheduler, &backend, CancellationToken::new());

        let mut dispatches = JoinSet::new();
        let submitted = poller.poll_once(&mut dispatches).await.unwrap();
        assert_eq!(submitted, 2);

        while dispatches.join_next().await.is_some() {}

        let mut commands = backend.submitted_commands();
        commands.sort();
        assert_eq!(
            commands,
            vec![Some("run-a".to_string()), Some("run-c".to_string())]
        );

        let outcomes = scheduler.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, bad_id);
        assert!(matches!(outcomes[0].1, RunOutcome::Failed { .. }));
        assert!(outcomes[0].1.message().contains("launch_command"));
    }

    #[tokio::test]
    async fn test_supervised_exit_failure_is_reported_crashed() {
        let pool = test_pool(json!({"command": "python run.py"}));
        let run = test_run(json!({}));
        let run_id = run.id;

        let scheduler = Arc::new(MockScheduler::new(pool, vec![run]));
        let backend = Arc::new(MockBackend::new(
            lenient_schema(),
            failed_exit(3),
        ));
        let poller = poller(&scheduler, &backend, CancellationToken::new());

        let mut dispatches = JoinSet::new();
        poller.poll_once(&mut dispatches).await.unwrap();
        while dispatches.join_next().await.is_some() {}

        let outcomes = scheduler.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, run_id);
        assert!(matches!(outcomes[0].1, RunOutcome::Crashed { .. }));
        assert!(outcomes[0].1.message().contains('3'));
    }

    #[tokio::test]
    async fn test_runner_delegated_exit_failure_is_not_reported() {
        // no command in the template: finalize injects the runner
        // entrypoint, so supervision is delegated
        let pool = test_pool(json!({}));
        let run = test_run(json!({}));

        let scheduler = Arc::new(MockScheduler::new(pool, vec![run]));
        let backend = Arc::new(MockBackend::new(
            lenient_schema(),
            failed_exit(1),
        ));
        let poller = poller(&scheduler, &backend, CancellationToken::new());

        let mut dispatches = JoinSet::new();
        poller.poll_once(&mut dispatches).await.unwrap();
        while dispatches.join_next().await.is_some() {}

        assert!(scheduler.outcomes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_poll_still_records_the_attempt() {
        let pool = test_pool(json!({}));
        let scheduler = Arc::new(MockScheduler::new(pool, Vec::new()).failing_first(1));
        let backend = Arc::new(MockBackend::new(lenient_schema(), success_exit()));
        let poller = poller(&scheduler, &backend, CancellationToken::new());

        let mut dispatches = JoinSet::new();
        let err = poller.poll_once(&mut dispatches).await.unwrap_err();
        assert!(err.is_transient());

        // the attempt was recorded before the request went out
        assert!(poller.poll_state.last_polled().is_some());
        assert!(poller.poll_state.is_still_polling(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_a_transient_poll_failure() {
        let pool = test_pool(json!({}));
        let scheduler = Arc::new(MockScheduler::new(pool, Vec::new()).failing_first(1));
        let backend = Arc::new(MockBackend::new(lenient_schema(), success_exit()));
        let shutdown = CancellationToken::new();
        let poller = Arc::new(poller(&scheduler, &backend, shutdown.clone()));

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run().await })
        };

        // three more cycles after the failing first one
        time::sleep(Duration::from_secs(35)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let polls = scheduler.poll_count.load(Ordering::SeqCst);
        assert!(polls >= 2, "loop should keep polling after a failure: {polls}");
        assert!(polls <= 5, "no immediate retries between cycles: {polls}");
        assert!(scheduler.outcomes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_dispatches_are_reported_cancelled() {
        let pool = test_pool(json!({"command": "sleep forever"}));
        let run = test_run(json!({}));
        let run_id = run.id;

        let scheduler = Arc::new(MockScheduler::new(pool, vec![run]));
        let backend = Arc::new(
            MockBackend::new(lenient_schema(), success_exit()).hanging(),
        );
        let shutdown = CancellationToken::new();
        let poller = Arc::new(poller(&scheduler, &backend, shutdown.clone()));

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run().await })
        };

        // let the first cycle dispatch the hanging job
        time::sleep(Duration::from_secs(2)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let outcomes = scheduler.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, run_id);
        assert!(matches!(outcomes[0].1, RunOutcome::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let pool = test_pool(json!({}));
        let scheduler = Arc::new(MockScheduler::new(pool, Vec::new()));
        let backend = Arc::new(MockBackend::new(lenient_schema(), success_exit()));
        let poller = poller(&scheduler, &backend, CancellationToken::new());

        let status = poller.status();
        assert_eq!(status.name, "test-worker");
        assert_eq!(status.work_pool_name, "test-pool");
        assert!(status.queue_names.is_empty());
        assert_eq!(status.settings.poll_interval_seconds, 10);
        assert_eq!(status.settings.concurrency_limit, Some(2));
    }
}
