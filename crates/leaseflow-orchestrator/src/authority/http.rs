//! HTTP gateway client for the authority.
//!
//! Every method is a `POST {base}/api/{method}` with a JSON argument object
//! and an `{"Ok": ..}` / `{"Err": {code, message}}` JSON answer.

use async_trait::async_trait;
use leaseflow_core::api::ApiResult;
use leaseflow_core::{
    ApiError, Deployment, DeploymentId, DeploymentParams, DeploymentState, StateHistory,
};
use leaseflow_crypto::CertificateMaterial;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{Authority, User};
use crate::http::{HttpClientError, build_client, join_url};
use crate::identity::CallerIdentity;
use crate::ledger::BlockIndex;

/// Authority client over the JSON gateway.
#[derive(Debug)]
pub struct HttpAuthority {
    http: reqwest::Client,
    base_url: String,
}

/// Wire shape of one `get_deployments` entry.
#[derive(serde::Deserialize)]
struct DeploymentEntry {
    id: DeploymentId,
    deployment: DeploymentBody,
}

#[derive(serde::Deserialize)]
struct DeploymentBody {
    user_id: String,
    params: DeploymentParams,
    icp_price: f64,
    state_history: StateHistory,
}

impl From<DeploymentEntry> for Deployment {
    fn from(entry: DeploymentEntry) -> Self {
        Self {
            id: entry.id,
            owner: entry.deployment.user_id,
            params: entry.deployment.params,
            icp_price: entry.deployment.icp_price,
            state_history: entry.deployment.state_history,
        }
    }
}

impl HttpAuthority {
    pub fn new(base_url: &str, identity: &CallerIdentity) -> Result<Self, HttpClientError> {
        if base_url.is_empty() {
            return Err(HttpClientError::Config("authority url is empty".into()));
        }
        let http = build_client(identity.access_token(), None)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        join_url(&self.base_url, &format!("api/{method}"))
    }

    async fn call<A, T>(&self, method: &str, args: &A) -> Result<T, ApiError>
    where
        A: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.api_url(method))
            .json(args)
            .send()
            .await
            .map_err(|e| ApiError::unavailable(format!("{method}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(gateway_error(method, status.as_u16(), &body));
        }

        let result: ApiResult<T> = resp
            .json()
            .await
            .map_err(|e| ApiError::unavailable(format!("{method}: invalid response: {e}")))?;
        tracing::debug!(method, "authority call completed");
        result.into()
    }
}

/// A non-2xx answer from the gateway itself.
///
/// Never the 404 sentinel; only `{"Err": {"code": 404}}` bodies are.
fn gateway_error(method: &str, status: u16, body: &str) -> ApiError {
    ApiError::unavailable(format!("{method}: gateway returned HTTP {status}: {body}"))
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn address(&self) -> Result<String, ApiError> {
        self.call("address", &json!({})).await
    }

    async fn get_my_user(&self) -> Result<User, ApiError> {
        self.call("get_user", &json!({})).await
    }

    async fn create_user(&self) -> Result<String, ApiError> {
        self.call("create_user", &json!({})).await
    }

    async fn create_certificate(&self, material: &CertificateMaterial) -> Result<String, ApiError> {
        self.call("create_certificate", &json!({ "certificate": material }))
            .await
    }

    async fn get_deployment_icp_price(&self) -> Result<f64, ApiError> {
        self.call("get_deployment_icp_price", &json!({})).await
    }

    async fn update_icp_balance(&self, block_index: BlockIndex) -> Result<f64, ApiError> {
        self.call(
            "update_icp_balance",
            &json!({ "payment_block_height": block_index }),
        )
        .await
    }

    async fn create_deployment(&self, params: &DeploymentParams) -> Result<DeploymentId, ApiError> {
        self.call("create_deployment", &json!({ "params": params }))
            .await
    }

    async fn update_deployment_state(
        &self,
        id: &DeploymentId,
        state: &DeploymentState,
    ) -> Result<(), ApiError> {
        self.call(
            "update_deployment_state",
            &json!({ "deployment_id": id, "update": state }),
        )
        .await
    }

    async fn get_deployments(&self) -> Result<Vec<Deployment>, ApiError> {
        let entries: Vec<DeploymentEntry> = self.call("get_deployments", &json!({})).await?;
        Ok(entries.into_iter().map(Deployment::from).collect())
    }

    async fn close_deployment(&self, id: &DeploymentId) -> Result<(), ApiError> {
        self.call("close_deployment", &json!({ "deployment_id": id }))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_uses_method_name() {
        let authority =
            HttpAuthority::new("https://authority.example/", &CallerIdentity::anonymous()).unwrap();
        assert_eq!(
            authority.api_url("get_deployments"),
            "https://authority.example/api/get_deployments"
        );
    }

    #[test]
    fn empty_url_rejected() {
        assert!(HttpAuthority::new("", &CallerIdentity::anonymous()).is_err());
    }

    #[test]
    fn deployment_entry_maps_to_deployment() {
        let raw = r#"[{
            "id": "dep-1",
            "deployment": {
                "user_id": "alice",
                "params": {"name": "db", "image": "postgres:16", "tier": "Small"},
                "icp_price": 2.5,
                "state_history": [[1, "Initialized"], [2, "Active"]]
            }
        }]"#;
        let entries: Vec<DeploymentEntry> = serde_json::from_str(raw).unwrap();
        let deployment = Deployment::from(entries.into_iter().next().unwrap());
        assert_eq!(deployment.id.as_str(), "dep-1");
        assert_eq!(deployment.owner, "alice");
        assert!(deployment.state_history.is_active());
    }

    #[test]
    fn odd_stored_history_does_not_sink_the_list() {
        let raw = r#"{"Ok": [
            {
                "id": "dep-good",
                "deployment": {
                    "user_id": "alice",
                    "params": {"name": "db", "image": "postgres:16", "tier": "Small"},
                    "icp_price": 2.5,
                    "state_history": [[1, "Initialized"], [2, "Active"]]
                }
            },
            {
                "id": "dep-raced",
                "deployment": {
                    "user_id": "alice",
                    "params": {"name": "web", "image": "nginx:1", "tier": "Small"},
                    "icp_price": 2.5,
                    "state_history": [
                        [1, "Initialized"],
                        [2, {"FailedOnClient": {"reason": "provider unreachable"}}],
                        [3, {"FailedOnCanister": {"reason": "lease closed"}}]
                    ]
                }
            }
        ]}"#;
        let result: ApiResult<Vec<DeploymentEntry>> = serde_json::from_str(raw).unwrap();
        let deployments: Vec<Deployment> = Result::<_, ApiError>::from(result)
            .unwrap()
            .into_iter()
            .map(Deployment::from)
            .collect();

        assert_eq!(deployments.len(), 2);
        assert!(deployments[0].state_history.is_active());
        assert!(deployments[1].state_history.is_failed());
        assert!(!deployments[1].needs_completion());
    }

    #[test]
    fn gateway_404_is_not_the_not_found_sentinel() {
        let err = gateway_error("get_user", 404, "no route");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn err_result_becomes_api_error() {
        let raw = r#"{"Err": {"code": 404, "message": "user not found"}}"#;
        let result: ApiResult<User> = serde_json::from_str(raw).unwrap();
        let err = Result::<User, ApiError>::from(result).unwrap_err();
        assert!(err.is_not_found());
    }
}
