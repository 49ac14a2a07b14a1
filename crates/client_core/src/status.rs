use shared::{
    domain::{ProposalStatus, ACTIVE_VOTE_THRESHOLD},
    protocol::RawProposal,
};

/// Presentation status of a ledger record. Execution overrides vote count.
pub fn derive_status(proposal: &RawProposal) -> ProposalStatus {
    if proposal.executed {
        ProposalStatus::Executed
    } else if proposal.vote_count >= ACTIVE_VOTE_THRESHOLD {
        ProposalStatus::Active
    } else {
        ProposalStatus::Pending
    }
}
