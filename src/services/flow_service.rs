//! Flow Service
//!
//! Keeps the configuration flows that are in progress and routes step input to
//! them by flow id. Called by whatever presentation layer drives the wizard.

use crate::error::{AppError, Result};
use crate::flow::form::{FlowResult, StepInput};
use crate::flow::steps::FlowState;
use crate::flow::{ConfigFlow, FlowContext};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of one step, tagged with its flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowStep {
    pub flow_id: Uuid,
    pub state: FlowState,
    pub result: FlowResult,
}

/// Summary of a flow in progress
#[derive(Debug, Clone, Serialize)]
pub struct FlowInfo {
    pub flow_id: Uuid,
    pub state: FlowState,
    pub started_at: DateTime<Utc>,
}

struct FlowSlot {
    flow: ConfigFlow,
    started_at: DateTime<Utc>,
}

/// Flow manager for business logic
pub struct FlowManager {
    ctx: FlowContext,
    flows: DashMap<Uuid, FlowSlot>,
}

impl FlowManager {
    pub fn new(ctx: FlowContext) -> Self {
        Self {
            ctx,
            flows: DashMap::new(),
        }
    }

    /// Start a flow that creates a new record
    pub async fn start_user(&self) -> Result<FlowStep> {
        info!("FlowManager::start_user");
        let flow = ConfigFlow::new(self.ctx.clone());
        self.begin(flow).await
    }

    /// Start a flow that reconfigures an existing catalog record
    pub async fn start_reconfigure(&self, entry_id: &str) -> Result<FlowStep> {
        info!("FlowManager::start_reconfigure - entry_id={}", entry_id);
        let flow = ConfigFlow::reconfigure(self.ctx.clone(), entry_id)?;
        self.begin(flow).await
    }

    async fn begin(&self, mut flow: ConfigFlow) -> Result<FlowStep> {
        let flow_id = Uuid::new_v4();
        let result = flow.handle(None).await?;
        Ok(self.settle(flow_id, flow, Utc::now(), result))
    }

    /// Submit input for the current step of a flow.
    ///
    /// The flow is taken out of the map while the step runs, so concurrent
    /// input for the same flow is rejected instead of interleaved.
    pub async fn configure(&self, flow_id: Uuid, input: StepInput) -> Result<FlowStep> {
        let (_, slot) = self
            .flows
            .remove(&flow_id)
            .ok_or_else(|| AppError::NotFound(format!("No flow in progress with id {}", flow_id)))?;
        let FlowSlot { mut flow, started_at } = slot;

        match flow.handle(Some(input)).await {
            Ok(result) => Ok(self.settle(flow_id, flow, started_at, result)),
            Err(e) => {
                if !flow.is_finished() {
                    self.flows.insert(flow_id, FlowSlot { flow, started_at });
                }
                Err(e)
            }
        }
    }

    /// Keep the flow if it is still running and wrap its result
    fn settle(&self, flow_id: Uuid, flow: ConfigFlow, started_at: DateTime<Utc>, result: FlowResult) -> FlowStep {
        let state = flow.state();
        if state.is_terminal() {
            debug!("Flow {} finished as {:?}", flow_id, state);
        } else {
            self.flows.insert(flow_id, FlowSlot { flow, started_at });
        }

        FlowStep {
            flow_id,
            state,
            result,
        }
    }

    /// Discard a flow. Nothing it collected is persisted.
    pub fn abort(&self, flow_id: Uuid) -> bool {
        let removed = self.flows.remove(&flow_id).is_some();
        if removed {
            info!("Flow {} aborted", flow_id);
        }
        removed
    }

    /// Discard flows started more than `max_age` ago. Returns how many were dropped.
    pub fn expire_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.flows.len();
        self.flows.retain(|_, slot| slot.started_at >= cutoff);
        let expired = before.saturating_sub(self.flows.len());
        if expired > 0 {
            info!("Expired {} abandoned flows", expired);
        }
        expired
    }

    pub fn in_progress(&self) -> Vec<FlowInfo> {
        self.flows
            .iter()
            .map(|entry| FlowInfo {
                flow_id: *entry.key(),
                state: entry.value().flow.state(),
                started_at: entry.value().started_at,
            })
            .collect()
    }
}
