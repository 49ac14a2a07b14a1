//! Adapter seam between the governance client and the ledger that hosts the
//! governance contract.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{Address, ProposalId},
    protocol::{LedgerEvent, RawProposal},
};
use tokio::sync::broadcast;
use url::Url;

mod memory;

pub use memory::{InMemoryGateway, InMemoryLedger, DEFAULT_CONTRACT_ADDRESS};

/// Where the governance contract lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTarget {
    pub rpc_url: Url,
    pub address: Address,
}

/// A submitted write awaiting inclusion in the ledger.
#[async_trait]
pub trait PendingTransaction: Send {
    fn hash(&self) -> &str;
    /// Resolves once the ledger has accepted the transaction; fails if it
    /// reverted or the network rejected it.
    async fn await_confirmation(self: Box<Self>) -> anyhow::Result<()>;
}

#[async_trait]
pub trait GovernanceContract: Send + Sync {
    async fn get_proposals(&self) -> anyhow::Result<Vec<RawProposal>>;
    async fn votes(&self, voter: &Address, id: ProposalId) -> anyhow::Result<bool>;
    async fn create_proposal(
        &self,
        description: &str,
    ) -> anyhow::Result<Box<dyn PendingTransaction>>;
    async fn vote(&self, id: ProposalId) -> anyhow::Result<Box<dyn PendingTransaction>>;
    async fn execute_proposal(&self, id: ProposalId)
        -> anyhow::Result<Box<dyn PendingTransaction>>;
    /// Delivery is at-least-once and may be reordered.
    fn subscribe_events(&self) -> broadcast::Receiver<LedgerEvent>;
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Asks the wallet for the signing identity.
    async fn request_identity(&self) -> anyhow::Result<Address>;
    async fn bind_contract(
        &self,
        signer: &Address,
        target: &ContractTarget,
    ) -> anyhow::Result<Arc<dyn GovernanceContract>>;
}

pub struct MissingLedgerGateway;

#[async_trait]
impl LedgerGateway for MissingLedgerGateway {
    async fn request_identity(&self) -> anyhow::Result<Address> {
        Err(anyhow!("no wallet provider available"))
    }

    async fn bind_contract(
        &self,
        _signer: &Address,
        target: &ContractTarget,
    ) -> anyhow::Result<Arc<dyn GovernanceContract>> {
        Err(anyhow!(
            "ledger gateway unavailable for contract {} at {}",
            target.address,
            target.rpc_url
        ))
    }
}
