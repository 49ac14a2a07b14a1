use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ProposalId;

/// Reasons the governance contract rejects a transaction at confirmation time.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ContractRevert {
    #[error("proposal {id} does not exist")]
    UnknownProposal { id: ProposalId },
    #[error("already voted on proposal {id}")]
    AlreadyVoted { id: ProposalId },
    #[error("proposal {id} already executed")]
    AlreadyExecuted { id: ProposalId },
    #[error("proposal {id} has no votes")]
    NoVotes { id: ProposalId },
    #[error("proposal description must not be empty")]
    EmptyDescription,
}
