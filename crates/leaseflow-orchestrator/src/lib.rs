//! `leaseflow` Orchestrator
//!
//! Drives a deployment from payment to a running workload on a leased
//! provider, and repairs deployments an interrupted run left behind.
//!
//! - [`authority`], [`ledger`], [`relay`], [`channel`]: seams to the
//!   external services, each with an HTTP adapter
//! - [`certificate`]: get-or-create of the user's mTLS certificate
//! - [`payment`]: price quotes, ledger payment and the top-up retry
//! - [`provider`]: manifest delivery and lease status through the relay
//! - [`saga`], [`completion`], [`reconcile`]: the deployment state machine
//! - [`dashboard`]: the per-session controller

pub mod authority;
pub mod certificate;
pub mod channel;
pub mod completion;
pub mod dashboard;
pub mod http;
pub mod identity;
pub mod ledger;
pub mod payment;
pub mod provider;
pub mod reconcile;
pub mod relay;
pub mod saga;

pub use authority::{Authority, HttpAuthority, User, UserRole};
pub use certificate::{CertificateProvisioner, ProvisionError};
pub use channel::{ChannelError, ChannelEvent, ChannelEventKind, ChannelManager, ChannelState};
pub use completion::{CompletionError, FailureReport, complete_lease};
pub use dashboard::{Collaborators, Dashboard, DashboardError};
pub use identity::CallerIdentity;
pub use ledger::{BlockIndex, Ledger, LedgerError};
pub use payment::{Payment, PaymentCoordinator, PaymentError, PriceQuote, PriceQuoter};
pub use provider::{ManifestClient, ManifestPolicy, ProviderError};
pub use reconcile::{ReconcileError, ReconcileReport, Reconciler};
pub use relay::{HttpRelay, RelayError, RelayRequest, RelayResponse};
pub use saga::{DeploymentSaga, SagaError, SagaOutcome};
