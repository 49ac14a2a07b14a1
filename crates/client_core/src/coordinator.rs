use std::sync::{Arc, Weak};

use futures::future::try_join_all;
use ledger_gateway::{GovernanceContract, LedgerGateway, MissingLedgerGateway};
use shared::{
    domain::{Address, ProposalId},
    protocol::{LedgerEvent, LedgerEventKind},
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    config::ClientSettings,
    error::ClientError,
    events::{ClientEvent, Notification, AWAITING_CONFIRMATION},
    session::Session,
    subscription::{Delivery, EventSubscription},
    tracker::{BusySlot, BusySnapshot, OperationKind, SharedTracker},
    view::ProposalView,
};

const EVENT_PREVIEW_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
    BlankDescription,
    AlreadyInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Vote,
    Execute,
}

/// Why a refresh ran. These are the only paths that re-read the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Requested,
    Connected,
    WriteConfirmed(WriteKind),
    LedgerEvent(LedgerEventKind),
    MissedEvents,
}

enum WriteRequest {
    Create { description: String },
    Vote(ProposalId),
    Execute(ProposalId),
}

impl WriteRequest {
    fn kind(&self) -> WriteKind {
        match self {
            WriteRequest::Create { .. } => WriteKind::Create,
            WriteRequest::Vote(_) => WriteKind::Vote,
            WriteRequest::Execute(_) => WriteKind::Execute,
        }
    }

    fn slot(&self) -> BusySlot {
        match self {
            WriteRequest::Create { .. } => BusySlot::Creating,
            WriteRequest::Vote(id) => BusySlot::Operation(OperationKind::Vote, *id),
            WriteRequest::Execute(id) => BusySlot::Operation(OperationKind::Execute, *id),
        }
    }

    fn pending_title(&self) -> &'static str {
        match self {
            WriteRequest::Create { .. } => "Creating Proposal",
            WriteRequest::Vote(_) => "Submitting Vote",
            WriteRequest::Execute(_) => "Executing Proposal",
        }
    }

    fn success_notice(&self) -> (&'static str, &'static str) {
        match self {
            WriteRequest::Create { .. } => (
                "Proposal Created",
                "Your proposal has been successfully created!",
            ),
            WriteRequest::Vote(_) => ("Vote Submitted", "Your vote has been recorded successfully!"),
            WriteRequest::Execute(_) => (
                "Proposal Executed",
                "The proposal has been successfully executed!",
            ),
        }
    }

    fn failure_title(&self) -> &'static str {
        match self {
            WriteRequest::Create { .. } => "Failed to Create Proposal",
            WriteRequest::Vote(_) => "Failed to Submit Vote",
            WriteRequest::Execute(_) => "Failed to Execute Proposal",
        }
    }
}

struct ContractBinding {
    contract: Arc<dyn GovernanceContract>,
    subscription: EventSubscription,
}

/// Keeps a local read model of the governance contract in step with the
/// ledger and coordinates the caller's writes against it.
///
/// The snapshot is only ever replaced wholesale by a completed read; writes
/// never patch it optimistically. Concurrent refreshes are not serialized and
/// the last one to finish wins.
pub struct SyncCoordinator {
    gateway: Arc<dyn LedgerGateway>,
    settings: ClientSettings,
    session: RwLock<Session>,
    binding: Mutex<Option<ContractBinding>>,
    snapshot: RwLock<Arc<Vec<ProposalView>>>,
    tracker: SharedTracker,
    events: broadcast::Sender<ClientEvent>,
}

fn query_error(err: anyhow::Error) -> ClientError {
    ClientError::Query(format!("{err:#}"))
}

fn submission_error(err: anyhow::Error) -> ClientError {
    ClientError::Submission(format!("{err:#}"))
}

impl SyncCoordinator {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        Self::new_with_gateway(settings, Arc::new(MissingLedgerGateway))
    }

    pub fn new_with_gateway(settings: ClientSettings, gateway: Arc<dyn LedgerGateway>) -> Arc<Self> {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Arc::new(Self {
            gateway,
            settings,
            session: RwLock::new(Session::default()),
            binding: Mutex::new(None),
            snapshot: RwLock::new(Arc::new(Vec::new())),
            tracker: SharedTracker::new(events.clone()),
            events,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Arc<Vec<ProposalView>> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub fn busy(&self) -> BusySnapshot {
        self.tracker.snapshot()
    }

    pub fn is_in_flight(&self, kind: OperationKind, id: ProposalId) -> bool {
        self.tracker.is_active(kind, id)
    }

    /// No operation of any kind is outstanding.
    pub fn is_idle(&self) -> bool {
        self.tracker.is_idle()
    }

    pub async fn can_create(&self, description: &str) -> bool {
        self.session.read().await.is_connected()
            && !description.trim().is_empty()
            && !self.tracker.snapshot().creating
    }

    /// Event kinds currently listened to on the bound contract.
    pub async fn active_subscriptions(&self) -> Vec<LedgerEventKind> {
        self.binding
            .lock()
            .await
            .as_ref()
            .filter(|binding| binding.subscription.is_active())
            .map(|binding| binding.subscription.kinds().to_vec())
            .unwrap_or_default()
    }

    /// Acquires the wallet identity and binds the contract. Calling this
    /// while connected starts a fresh cycle: the old binding is released
    /// before the session enters `Connecting`.
    pub async fn connect(self: &Arc<Self>) -> Result<Outcome, ClientError> {
        let Some(connecting) = self.tracker.acquire(BusySlot::Connecting) else {
            debug!("sync: connect skipped, attempt already in progress");
            return Ok(Outcome::Skipped(SkipReason::AlreadyInFlight));
        };
        let previous = self.binding.lock().await.take();
        if previous.is_some() {
            debug!("sync: previous contract binding released for reconnect");
        }
        drop(previous);
        self.update_session(Session::begin_connect).await;

        let address = match self.establish_binding().await {
            Ok(address) => address,
            Err(err) => {
                self.update_session(Session::disconnected).await;
                warn!("sync: connect failed: {err}");
                let title = match err {
                    ClientError::ContractSetup(_) => "Contract Setup Failed",
                    _ => "Connection Failed",
                };
                self.notify(Notification::error(title, err.message()));
                return Err(err);
            }
        };

        info!(address = %address, "sync: wallet connected");
        self.notify(Notification::info(
            "Wallet Connected",
            format!("Connected with {}", address.short()),
        ));
        self.update_session(|session| session.connected(address))
            .await;
        drop(connecting);

        self.on_connected().await;
        Ok(Outcome::Applied)
    }

    /// Releases the contract binding, which unsubscribes every ledger event
    /// listener. The snapshot is kept as last seen.
    pub async fn disconnect(&self) {
        let released = self.binding.lock().await.take();
        if released.is_some() {
            info!("sync: contract binding released");
        }
        drop(released);
        self.update_session(Session::disconnected).await;
    }

    pub async fn refresh(&self) -> Result<Outcome, ClientError> {
        self.refresh_with(RefreshTrigger::Requested).await
    }

    pub async fn create_proposal(&self, description: &str) -> Result<Outcome, ClientError> {
        if description.trim().is_empty() {
            return Ok(Outcome::Skipped(SkipReason::BlankDescription));
        }
        self.run_write(WriteRequest::Create {
            description: description.to_string(),
        })
        .await
    }

    pub async fn vote(&self, id: ProposalId) -> Result<Outcome, ClientError> {
        self.run_write(WriteRequest::Vote(id)).await
    }

    pub async fn execute_proposal(&self, id: ProposalId) -> Result<Outcome, ClientError> {
        self.run_write(WriteRequest::Execute(id)).await
    }

    async fn establish_binding(self: &Arc<Self>) -> Result<Address, ClientError> {
        let address = self
            .gateway
            .request_identity()
            .await
            .map_err(|err| ClientError::Connection(format!("{err:#}")))?;
        let target = self.settings.contract_target()?;
        let contract = self
            .gateway
            .bind_contract(&address, &target)
            .await
            .map_err(|err| ClientError::ContractSetup(format!("{err:#}")))?;

        let subscription = self.subscribe_ledger_events(&contract);
        *self.binding.lock().await = Some(ContractBinding {
            contract,
            subscription,
        });
        Ok(address)
    }

    fn subscribe_ledger_events(
        self: &Arc<Self>,
        contract: &Arc<dyn GovernanceContract>,
    ) -> EventSubscription {
        let coordinator: Weak<Self> = Arc::downgrade(self);
        EventSubscription::spawn(
            &LedgerEventKind::ALL,
            contract.subscribe_events(),
            move |delivery| {
                let coordinator = Weak::clone(&coordinator);
                async move {
                    if let Some(coordinator) = coordinator.upgrade() {
                        coordinator.handle_delivery(delivery).await;
                    }
                }
            },
        )
    }

    async fn on_connected(&self) {
        // The connection itself succeeded; a failed first read was already
        // reported and leaves the empty snapshot in place.
        let _ = self.refresh_with(RefreshTrigger::Connected).await;
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let trigger = match delivery {
            Delivery::Event(event) => {
                debug!(
                    kind = ?event.kind(),
                    proposal_id = event.proposal_id().0,
                    "sync: ledger event received"
                );
                if let Some(notification) = self.notification_for(&event).await {
                    self.notify(notification);
                }
                RefreshTrigger::LedgerEvent(event.kind())
            }
            Delivery::Lagged { .. } => RefreshTrigger::MissedEvents,
        };
        // Failures were already reported by the refresh itself.
        let _ = self.refresh_with(trigger).await;
    }

    async fn notification_for(&self, event: &LedgerEvent) -> Option<Notification> {
        match event {
            LedgerEvent::ProposalCreated { id, description } => {
                let preview: String = description.chars().take(EVENT_PREVIEW_CHARS).collect();
                Some(Notification::info(
                    "New Proposal Created",
                    format!("Proposal #{id}: {preview}..."),
                ))
            }
            LedgerEvent::Voted { proposal_id, voter } => {
                let own_vote = self
                    .session
                    .read()
                    .await
                    .address()
                    .is_some_and(|address| address.matches(voter));
                if own_vote {
                    debug!(proposal_id = proposal_id.0, "sync: own vote event, notification suppressed");
                    return None;
                }
                Some(Notification::info(
                    "New Vote Cast",
                    format!("New vote on Proposal #{proposal_id}"),
                ))
            }
            LedgerEvent::ProposalExecuted { id } => Some(Notification::info(
                "Proposal Executed",
                format!("Proposal #{id} has been executed"),
            )),
        }
    }

    async fn refresh_with(&self, trigger: RefreshTrigger) -> Result<Outcome, ClientError> {
        let Some(contract) = self.connected_contract().await else {
            debug!(?trigger, "sync: refresh skipped, not connected");
            return Ok(Outcome::Skipped(SkipReason::NotConnected));
        };
        let _loading = self.tracker.acquire(BusySlot::Loading);
        debug!(?trigger, "sync: refreshing proposals");

        let identity = self.session.read().await.identity().cloned();
        match read_proposals(contract.as_ref(), identity.as_ref()).await {
            Ok(proposals) => {
                let proposals = Arc::new(proposals);
                *self.snapshot.write().await = Arc::clone(&proposals);
                info!(?trigger, count = proposals.len(), "sync: snapshot replaced");
                let _ = self.events.send(ClientEvent::SnapshotUpdated(proposals));
                Ok(Outcome::Applied)
            }
            Err(err) => {
                warn!(?trigger, "sync: refresh failed, keeping last snapshot: {err}");
                self.notify(Notification::error(
                    "Failed to Load Proposals",
                    "Please check your connection and try again.",
                ));
                Err(err)
            }
        }
    }

    async fn run_write(&self, request: WriteRequest) -> Result<Outcome, ClientError> {
        let Some(contract) = self.connected_contract().await else {
            debug!(kind = ?request.kind(), "sync: write skipped, not connected");
            return Ok(Outcome::Skipped(SkipReason::NotConnected));
        };
        let Some(_busy) = self.tracker.acquire(request.slot()) else {
            debug!(kind = ?request.kind(), "sync: write skipped, already in flight");
            return Ok(Outcome::Skipped(SkipReason::AlreadyInFlight));
        };

        if let Err(err) = self.submit_and_confirm(contract.as_ref(), &request).await {
            warn!(kind = ?request.kind(), "sync: write failed: {err}");
            self.notify(Notification::error(request.failure_title(), err.message()));
            return Err(err);
        }

        let (title, description) = request.success_notice();
        self.notify(Notification::info(title, description));
        let _ = self
            .refresh_with(RefreshTrigger::WriteConfirmed(request.kind()))
            .await;
        Ok(Outcome::Applied)
    }

    async fn submit_and_confirm(
        &self,
        contract: &dyn GovernanceContract,
        request: &WriteRequest,
    ) -> Result<(), ClientError> {
        let submitted = match request {
            WriteRequest::Create { description } => contract.create_proposal(description).await,
            WriteRequest::Vote(id) => contract.vote(*id).await,
            WriteRequest::Execute(id) => contract.execute_proposal(*id).await,
        };
        let pending = submitted.map_err(submission_error)?;
        let tx = pending.hash().to_string();
        info!(kind = ?request.kind(), tx = %tx, "sync: transaction submitted");
        self.notify(Notification::info(request.pending_title(), AWAITING_CONFIRMATION));

        let confirmation = pending.await_confirmation();
        let confirmed = match self.settings.confirmation_timeout {
            Some(limit) => match tokio::time::timeout(limit, confirmation).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ClientError::Submission(format!(
                        "transaction {tx} not confirmed within {}ms",
                        limit.as_millis()
                    )))
                }
            },
            None => confirmation.await,
        };
        confirmed.map_err(submission_error)?;
        info!(kind = ?request.kind(), tx = %tx, "sync: transaction confirmed");
        Ok(())
    }

    /// The bound contract, only while the session is `Connected`.
    async fn connected_contract(&self) -> Option<Arc<dyn GovernanceContract>> {
        if !self.session.read().await.is_connected() {
            return None;
        }
        self.binding
            .lock()
            .await
            .as_ref()
            .map(|binding| Arc::clone(&binding.contract))
    }

    async fn update_session(&self, transition: impl FnOnce(&mut Session)) {
        let session = {
            let mut guard = self.session.write().await;
            transition(&mut *guard);
            guard.clone()
        };
        let _ = self.events.send(ClientEvent::SessionChanged(session));
    }

    fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, "sync: notification");
        let _ = self.events.send(ClientEvent::Notification(notification));
    }
}

/// Reads every proposal and, for a connected caller, their vote flags. Any
/// failed sub-read fails the whole read.
async fn read_proposals(
    contract: &dyn GovernanceContract,
    identity: Option<&Address>,
) -> Result<Vec<ProposalView>, ClientError> {
    let raw = contract.get_proposals().await.map_err(query_error)?;
    try_join_all(raw.into_iter().map(|proposal| async move {
        let has_voted = match identity {
            Some(voter) => contract
                .votes(voter, proposal.id)
                .await
                .map_err(query_error)?,
            None => false,
        };
        Ok::<_, ClientError>(ProposalView::from_raw(proposal, has_voted))
    }))
    .await
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
