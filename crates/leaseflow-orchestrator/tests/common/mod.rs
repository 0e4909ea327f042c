//! In-process fakes of the authority, ledger, relay and push transport.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use leaseflow_core::deployment::{DeploymentCreated, LeaseCreated};
use leaseflow_core::{
    ApiError, Config, Deployment, DeploymentId, DeploymentParams, DeploymentState, PushMessage,
    StateHistory, Tier,
};
use leaseflow_crypto::CertificateMaterial;
use leaseflow_orchestrator::channel::{ConnectionHandle, PushSink, PushTransport, TransportEvent};
use leaseflow_orchestrator::{
    Authority, BlockIndex, CallerIdentity, Collaborators, Dashboard, HttpRelay, Ledger,
    LedgerError, RelayError, RelayRequest, RelayResponse, User, UserRole,
};
use tokio::time::Instant;

pub const PROVIDER_URL: &str = "https://provider.test:8443";
pub const DSEQ: u64 = 123;
pub const MANIFEST: &str = r#"[{"services":{"db":{"image":"postgres:16","count":1}},"name":"dcloud"}]"#;
pub const LEASE_MISSING: &str = "no lease for deployment 123";

pub fn created() -> DeploymentState {
    DeploymentState::DeploymentCreated(DeploymentCreated {
        manifest: MANIFEST.to_string(),
        dseq: DSEQ,
        tx_hash: "TX-CREATE".to_string(),
    })
}

pub fn lease() -> DeploymentState {
    DeploymentState::LeaseCreated(LeaseCreated {
        provider_url: PROVIDER_URL.to_string(),
        tx_hash: "TX-LEASE".to_string(),
    })
}

pub fn postgres() -> DeploymentParams {
    DeploymentParams::new("db", "postgres:16", Tier::Small)
}

/// A stored deployment whose history holds `states` after the seed.
pub fn deployment(id: &str, created_at: u64, states: &[DeploymentState]) -> Deployment {
    let mut history = StateHistory::new(created_at);
    for (i, state) in states.iter().enumerate() {
        history.append(created_at + 1 + i as u64, state.clone()).unwrap();
    }
    Deployment {
        id: id.into(),
        owner: "alice".to_string(),
        params: postgres(),
        icp_price: 10.0,
        state_history: history,
    }
}

// =========================================================================
// Push transport
// =========================================================================

/// Sends `Open` on connect and lets the authority push messages.
#[derive(Default)]
pub struct ScriptedTransport {
    sinks: Mutex<Vec<PushSink>>,
}

impl ScriptedTransport {
    pub fn connects(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn push(&self, event: TransportEvent) {
        if let Some(sink) = self.sinks.lock().unwrap().last() {
            sink.send(event);
        }
    }
}

impl PushTransport for ScriptedTransport {
    fn connect(&self, _identity: &CallerIdentity, sink: PushSink) -> ConnectionHandle {
        sink.send(TransportEvent::Open);
        self.sinks.lock().unwrap().push(sink);
        ConnectionHandle::detached()
    }
}

// =========================================================================
// Authority
// =========================================================================

#[derive(Default)]
struct AuthorityState {
    deployments: Vec<Deployment>,
    user: Option<User>,
    address: String,
    price: f64,
    credited_balance: f64,
    create_results: VecDeque<Result<(), ApiError>>,
    script: Vec<DeploymentState>,
    next_id: usize,
    fail_updates: bool,
    create_calls: usize,
    create_certificate_calls: usize,
    get_deployments_calls: usize,
    credited_blocks: Vec<BlockIndex>,
    updates: Vec<(DeploymentId, DeploymentState)>,
    closed: Vec<DeploymentId>,
}

/// Authority holding deployments in memory.
///
/// On `create_deployment` it records a fresh deployment and pushes the
/// scripted transitions through the transport, the way the real
/// authority's workers would.
pub struct FakeAuthority {
    state: Mutex<AuthorityState>,
    transport: Arc<ScriptedTransport>,
}

impl FakeAuthority {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            state: Mutex::new(AuthorityState {
                address: "akash1testaddress".to_string(),
                price: 10.0,
                credited_balance: 30.0,
                ..Default::default()
            }),
            transport,
        }
    }

    pub fn set_script(&self, script: Vec<DeploymentState>) {
        self.state.lock().unwrap().script = script;
    }

    pub fn push_create_result(&self, result: Result<(), ApiError>) {
        self.state.lock().unwrap().create_results.push_back(result);
    }

    pub fn insert(&self, deployment: Deployment) {
        self.state.lock().unwrap().deployments.push(deployment);
    }

    pub fn set_user(&self, user: Option<User>) {
        self.state.lock().unwrap().user = user;
    }

    pub fn fail_updates(&self) {
        self.state.lock().unwrap().fail_updates = true;
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn create_certificate_calls(&self) -> usize {
        self.state.lock().unwrap().create_certificate_calls
    }

    pub fn get_deployments_calls(&self) -> usize {
        self.state.lock().unwrap().get_deployments_calls
    }

    pub fn credited_blocks(&self) -> Vec<BlockIndex> {
        self.state.lock().unwrap().credited_blocks.clone()
    }

    pub fn updates(&self) -> Vec<(DeploymentId, DeploymentState)> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn closed(&self) -> Vec<DeploymentId> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn stored(&self, id: &str) -> Option<Deployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .find(|d| d.id.as_str() == id)
            .cloned()
    }
}

#[async_trait]
impl Authority for FakeAuthority {
    async fn address(&self) -> Result<String, ApiError> {
        Ok(self.state.lock().unwrap().address.clone())
    }

    async fn get_my_user(&self) -> Result<User, ApiError> {
        self.state
            .lock()
            .unwrap()
            .user
            .clone()
            .ok_or_else(|| ApiError::not_found("user not found"))
    }

    async fn create_user(&self) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.user = Some(User {
            role: UserRole::Deployer,
            created_at: 1,
            mtls_certificate: None,
        });
        Ok("alice".to_string())
    }

    async fn create_certificate(&self, material: &CertificateMaterial) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.create_certificate_calls += 1;
        let user = state
            .user
            .as_mut()
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        user.mtls_certificate = Some(material.clone());
        Ok("TX-CERT".to_string())
    }

    async fn get_deployment_icp_price(&self) -> Result<f64, ApiError> {
        Ok(self.state.lock().unwrap().price)
    }

    async fn update_icp_balance(&self, block_index: BlockIndex) -> Result<f64, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.credited_blocks.push(block_index);
        Ok(state.credited_balance)
    }

    async fn create_deployment(&self, params: &DeploymentParams) -> Result<DeploymentId, ApiError> {
        let (id, script) = {
            let mut state = self.state.lock().unwrap();
            state.create_calls += 1;
            if let Some(Err(e)) = state.create_results.pop_front() {
                return Err(e);
            }
            state.next_id += 1;
            let id = DeploymentId::new(format!("dep-{}", state.next_id));
            let mut history = StateHistory::new(1_000);
            for (i, update) in state.script.iter().enumerate() {
                // Keep the stored history valid even when the push is not.
                let _ = history.append(1_001 + i as u64, update.clone());
            }
            let icp_price = state.price;
            state.deployments.push(Deployment {
                id: id.clone(),
                owner: "alice".to_string(),
                params: params.clone(),
                icp_price,
                state_history: history,
            });
            (id, state.script.clone())
        };

        for update in script {
            self.transport.push(TransportEvent::Message(PushMessage {
                id: id.clone(),
                update,
            }));
        }
        Ok(id)
    }

    async fn update_deployment_state(
        &self,
        id: &DeploymentId,
        update: &DeploymentState,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_updates {
            return Err(ApiError::internal("authority unavailable"));
        }
        state.updates.push((id.clone(), update.clone()));
        let deployment = state
            .deployments
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or_else(|| ApiError::not_found("deployment not found"))?;
        deployment
            .state_history
            .append(2_000, update.clone())
            .map_err(|e| ApiError::new(400, e.to_string()))
    }

    async fn get_deployments(&self) -> Result<Vec<Deployment>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.get_deployments_calls += 1;
        Ok(state.deployments.clone())
    }

    async fn close_deployment(&self, id: &DeploymentId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.closed.push(id.clone());
        let deployment = state
            .deployments
            .iter_mut()
            .find(|d| d.id == *id)
            .ok_or_else(|| ApiError::not_found("deployment not found"))?;
        deployment
            .state_history
            .append(3_000, DeploymentState::Closed)
            .map_err(|e| ApiError::new(400, e.to_string()))
    }
}

// =========================================================================
// Ledger
// =========================================================================

#[derive(Default)]
pub struct FakeLedger {
    transfers: Mutex<Vec<u64>>,
    reject: Mutex<Option<String>>,
}

impl FakeLedger {
    pub fn transfers(&self) -> Vec<u64> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn reject_with(&self, reason: &str) {
        *self.reject.lock().unwrap() = Some(reason.to_string());
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn transfer(&self, amount_e8s: u64) -> Result<BlockIndex, LedgerError> {
        if let Some(reason) = self.reject.lock().unwrap().clone() {
            return Err(LedgerError::Rejected(reason));
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(amount_e8s);
        Ok(100 + transfers.len() as u64)
    }
}

// =========================================================================
// Relay
// =========================================================================

/// Answers with scripted responses, then `200` once the script runs out.
#[derive(Default)]
pub struct FakeRelay {
    responses: Mutex<VecDeque<Result<RelayResponse, RelayError>>>,
    requests: Mutex<Vec<(Instant, RelayRequest)>>,
}

impl FakeRelay {
    pub fn respond(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(RelayResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn requests(&self) -> Vec<RelayRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl HttpRelay for FakeRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(RelayResponse {
                    status: 200,
                    body: "{}".to_string(),
                })
            })
    }
}

// =========================================================================
// Harness
// =========================================================================

pub struct Harness {
    pub authority: Arc<FakeAuthority>,
    pub ledger: Arc<FakeLedger>,
    pub relay: Arc<FakeRelay>,
    pub transport: Arc<ScriptedTransport>,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        Self {
            authority: Arc::new(FakeAuthority::new(transport.clone())),
            ledger: Arc::new(FakeLedger::default()),
            relay: Arc::new(FakeRelay::default()),
            transport,
            config: Config::default(),
        }
    }

    pub fn dashboard(&self) -> Dashboard {
        self.dashboard_as(CallerIdentity::authenticated("alice", "token"))
    }

    pub fn dashboard_as(&self, identity: CallerIdentity) -> Dashboard {
        let collaborators = Collaborators {
            authority: self.authority.clone(),
            ledger: self.ledger.clone(),
            relay: self.relay.clone(),
            transport: self.transport.clone(),
            certificate_store: None,
        };
        Dashboard::new(identity, collaborators, &self.config).unwrap()
    }
}
