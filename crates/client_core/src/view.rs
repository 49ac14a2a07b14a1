use serde::Serialize;
use shared::{
    domain::{ProposalId, ProposalStatus},
    protocol::RawProposal,
};

use crate::{
    session::Session,
    status::derive_status,
    tracker::{BusySnapshot, OperationKind},
};

/// Snapshot entry: a ledger record plus the fields derived for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalView {
    pub id: ProposalId,
    pub description: String,
    pub vote_count: u64,
    pub executed: bool,
    pub status: ProposalStatus,
    pub has_voted: bool,
}

impl ProposalView {
    pub fn from_raw(raw: RawProposal, has_voted: bool) -> Self {
        let status = derive_status(&raw);
        Self {
            id: raw.id,
            description: raw.description,
            vote_count: raw.vote_count,
            executed: raw.executed,
            status,
            has_voted,
        }
    }

    pub fn can_vote(&self, session: &Session, busy: &BusySnapshot) -> bool {
        session.is_connected()
            && !self.executed
            && !self.has_voted
            && !busy.is_active(OperationKind::Vote, self.id)
    }

    pub fn can_execute(&self, session: &Session, busy: &BusySnapshot) -> bool {
        session.is_connected()
            && !self.executed
            && self.vote_count >= 1
            && !busy.is_active(OperationKind::Execute, self.id)
    }
}
