use serde::{Deserialize, Serialize};

use crate::domain::{Address, ProposalId};

/// Proposal record as returned by the contract's `getProposals` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProposal {
    pub id: ProposalId,
    pub description: String,
    pub vote_count: u64,
    pub executed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ProposalCreated,
    Voted,
    ProposalExecuted,
}

impl LedgerEventKind {
    pub const ALL: [LedgerEventKind; 3] = [
        LedgerEventKind::ProposalCreated,
        LedgerEventKind::Voted,
        LedgerEventKind::ProposalExecuted,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LedgerEvent {
    ProposalCreated {
        id: ProposalId,
        description: String,
    },
    Voted {
        proposal_id: ProposalId,
        voter: Address,
    },
    ProposalExecuted {
        id: ProposalId,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> LedgerEventKind {
        match self {
            LedgerEvent::ProposalCreated { .. } => LedgerEventKind::ProposalCreated,
            LedgerEvent::Voted { .. } => LedgerEventKind::Voted,
            LedgerEvent::ProposalExecuted { .. } => LedgerEventKind::ProposalExecuted,
        }
    }

    pub fn proposal_id(&self) -> ProposalId {
        match self {
            LedgerEvent::ProposalCreated { id, .. } => *id,
            LedgerEvent::Voted { proposal_id, .. } => *proposal_id,
            LedgerEvent::ProposalExecuted { id } => *id,
        }
    }
}
