use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Address, ProposalId},
    error::ContractRevert,
    protocol::{LedgerEvent, RawProposal},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{ContractTarget, GovernanceContract, LedgerGateway, PendingTransaction};

/// Address the local development chain assigns to the first deployment.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

const EVENT_CAPACITY: usize = 256;

/// Deterministic in-process governance contract.
///
/// Writes are validated and applied when their transaction is confirmed,
/// which is also when the corresponding event is emitted.
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<LedgerInner>,
}

struct LedgerInner {
    contract_address: Address,
    state: Mutex<ContractState>,
    events: broadcast::Sender<LedgerEvent>,
    tx_counter: AtomicU64,
}

#[derive(Default)]
struct ContractState {
    proposals: Vec<RawProposal>,
    votes: HashSet<(String, ProposalId)>,
}

#[derive(Debug, Clone)]
enum ContractCall {
    CreateProposal { description: String },
    Vote { id: ProposalId },
    ExecuteProposal { id: ProposalId },
}

fn vote_key(voter: &Address, id: ProposalId) -> (String, ProposalId) {
    (voter.as_str().to_ascii_lowercase(), id)
}

impl ContractState {
    fn apply(&mut self, sender: &Address, call: &ContractCall) -> Result<LedgerEvent, ContractRevert> {
        match call {
            ContractCall::CreateProposal { description } => {
                if description.trim().is_empty() {
                    return Err(ContractRevert::EmptyDescription);
                }
                let id = ProposalId(self.proposals.len() as u64 + 1);
                self.proposals.push(RawProposal {
                    id,
                    description: description.clone(),
                    vote_count: 0,
                    executed: false,
                });
                Ok(LedgerEvent::ProposalCreated {
                    id,
                    description: description.clone(),
                })
            }
            ContractCall::Vote { id } => {
                let key = vote_key(sender, *id);
                let already_voted = self.votes.contains(&key);
                let proposal = self.proposal_mut(*id)?;
                if proposal.executed {
                    return Err(ContractRevert::AlreadyExecuted { id: *id });
                }
                if already_voted {
                    return Err(ContractRevert::AlreadyVoted { id: *id });
                }
                proposal.vote_count += 1;
                self.votes.insert(key);
                Ok(LedgerEvent::Voted {
                    proposal_id: *id,
                    voter: sender.clone(),
                })
            }
            ContractCall::ExecuteProposal { id } => {
                let proposal = self.proposal_mut(*id)?;
                if proposal.executed {
                    return Err(ContractRevert::AlreadyExecuted { id: *id });
                }
                if proposal.vote_count == 0 {
                    return Err(ContractRevert::NoVotes { id: *id });
                }
                proposal.executed = true;
                Ok(LedgerEvent::ProposalExecuted { id: *id })
            }
        }
    }

    fn proposal_mut(&mut self, id: ProposalId) -> Result<&mut RawProposal, ContractRevert> {
        self.proposals
            .iter_mut()
            .find(|proposal| proposal.id == id)
            .ok_or(ContractRevert::UnknownProposal { id })
    }
}

impl InMemoryLedger {
    pub fn deploy(contract_address: Address) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(contract = %contract_address, "ledger: in-memory governance contract deployed");
        Self {
            inner: Arc::new(LedgerInner {
                contract_address,
                state: Mutex::new(ContractState::default()),
                events,
                tx_counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn contract_address(&self) -> &Address {
        &self.inner.contract_address
    }

    /// Gateway whose wallet signs as `signer`; `None` models a provider
    /// without any unlocked account.
    pub fn gateway(&self, signer: Option<Address>) -> InMemoryGateway {
        InMemoryGateway {
            ledger: self.clone(),
            signer,
        }
    }

    pub async fn proposals(&self) -> Vec<RawProposal> {
        self.inner.state.lock().await.proposals.clone()
    }

    pub async fn has_voted(&self, voter: &Address, id: ProposalId) -> bool {
        self.inner
            .state
            .lock()
            .await
            .votes
            .contains(&vote_key(voter, id))
    }

    fn next_tx_hash(&self) -> String {
        let n = self.inner.tx_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("0x{n:064x}")
    }

    async fn mine(&self, sender: &Address, call: &ContractCall) -> Result<LedgerEvent, ContractRevert> {
        let event = self.inner.state.lock().await.apply(sender, call)?;
        // Nobody listening is fine.
        let _ = self.inner.events.send(event.clone());
        Ok(event)
    }

    fn submit(&self, sender: &Address, call: ContractCall) -> Box<dyn PendingTransaction> {
        let hash = self.next_tx_hash();
        debug!(tx = %hash, sender = %sender, ?call, "ledger: transaction submitted");
        Box::new(InMemoryTransaction {
            ledger: self.clone(),
            sender: sender.clone(),
            call,
            hash,
        })
    }
}

pub struct InMemoryGateway {
    ledger: InMemoryLedger,
    signer: Option<Address>,
}

#[async_trait]
impl LedgerGateway for InMemoryGateway {
    async fn request_identity(&self) -> Result<Address> {
        self.signer
            .clone()
            .ok_or_else(|| anyhow!("no signer available from provider"))
    }

    async fn bind_contract(
        &self,
        signer: &Address,
        target: &ContractTarget,
    ) -> Result<Arc<dyn GovernanceContract>> {
        if !target.address.matches(self.ledger.contract_address()) {
            return Err(anyhow!(
                "no governance contract deployed at {} on {}",
                target.address,
                target.rpc_url
            ));
        }
        Ok(Arc::new(InMemoryContract {
            ledger: self.ledger.clone(),
            signer: signer.clone(),
        }))
    }
}

struct InMemoryContract {
    ledger: InMemoryLedger,
    signer: Address,
}

#[async_trait]
impl GovernanceContract for InMemoryContract {
    async fn get_proposals(&self) -> Result<Vec<RawProposal>> {
        Ok(self.ledger.proposals().await)
    }

    async fn votes(&self, voter: &Address, id: ProposalId) -> Result<bool> {
        Ok(self.ledger.has_voted(voter, id).await)
    }

    async fn create_proposal(&self, description: &str) -> Result<Box<dyn PendingTransaction>> {
        Ok(self.ledger.submit(
            &self.signer,
            ContractCall::CreateProposal {
                description: description.to_string(),
            },
        ))
    }

    async fn vote(&self, id: ProposalId) -> Result<Box<dyn PendingTransaction>> {
        Ok(self.ledger.submit(&self.signer, ContractCall::Vote { id }))
    }

    async fn execute_proposal(&self, id: ProposalId) -> Result<Box<dyn PendingTransaction>> {
        Ok(self
            .ledger
            .submit(&self.signer, ContractCall::ExecuteProposal { id }))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ledger.inner.events.subscribe()
    }
}

struct InMemoryTransaction {
    ledger: InMemoryLedger,
    sender: Address,
    call: ContractCall,
    hash: String,
}

#[async_trait]
impl PendingTransaction for InMemoryTransaction {
    fn hash(&self) -> &str {
        &self.hash
    }

    async fn await_confirmation(self: Box<Self>) -> Result<()> {
        match self.ledger.mine(&self.sender, &self.call).await {
            Ok(event) => {
                debug!(tx = %self.hash, ?event, "ledger: transaction mined");
                Ok(())
            }
            Err(revert) => Err(anyhow!("transaction {} reverted: {revert}", self.hash)),
        }
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
