use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    load_settings, ClientEvent, ClientSettings, NotificationLevel, Outcome, SyncCoordinator,
};
use ledger_gateway::InMemoryLedger;
use shared::domain::{Address, ProposalId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{parse_line, CliCommand, HELP};

/// First account of the local development chain.
const DEV_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

#[derive(Parser, Debug)]
struct Args {
    /// Account the wallet signs as.
    #[arg(long, default_value = DEV_ACCOUNT)]
    account: String,
    /// Simulate a wallet provider without an unlocked account.
    #[arg(long)]
    no_signer: bool,
}

struct Shell {
    ledger: InMemoryLedger,
    settings: ClientSettings,
    primary: Arc<SyncCoordinator>,
    others: HashMap<String, Arc<SyncCoordinator>>,
}

impl Shell {
    async fn run(&mut self, command: CliCommand) -> Result<bool> {
        let primary = Arc::clone(&self.primary);
        let outcome = match command {
            CliCommand::Connect => primary.connect().await?,
            CliCommand::Disconnect => {
                primary.disconnect().await;
                Outcome::Applied
            }
            CliCommand::Propose { description } => primary.create_proposal(&description).await?,
            CliCommand::Vote { id } => primary.vote(id).await?,
            CliCommand::Execute { id } => primary.execute_proposal(id).await?,
            CliCommand::Refresh => primary.refresh().await?,
            CliCommand::List => {
                self.print_snapshot().await;
                return Ok(true);
            }
            CliCommand::Busy => {
                println!("{}", serde_json::to_string(&primary.busy())?);
                return Ok(true);
            }
            CliCommand::VoteAs { voter, id } => self.vote_as(voter, id).await?,
            CliCommand::Help => {
                println!("{HELP}");
                return Ok(true);
            }
            CliCommand::Quit => return Ok(false),
        };
        if let Outcome::Skipped(reason) = outcome {
            println!("skipped: {reason:?}");
        }
        Ok(true)
    }

    async fn vote_as(&mut self, voter: Address, id: ProposalId) -> Result<Outcome> {
        let key = voter.as_str().to_ascii_lowercase();
        let coordinator = match self.others.get(&key) {
            Some(coordinator) => Arc::clone(coordinator),
            None => {
                let coordinator = SyncCoordinator::new_with_gateway(
                    self.settings.clone(),
                    Arc::new(self.ledger.gateway(Some(voter))),
                );
                coordinator.connect().await?;
                self.others.insert(key, Arc::clone(&coordinator));
                coordinator
            }
        };
        Ok(coordinator.vote(id).await?)
    }

    async fn print_snapshot(&self) {
        let session = self.primary.session().await;
        let busy = self.primary.busy();
        let snapshot = self.primary.snapshot().await;
        if snapshot.is_empty() {
            println!("no proposals");
            return;
        }
        for proposal in snapshot.iter() {
            let mut actions = Vec::new();
            if proposal.can_vote(&session, &busy) {
                actions.push("vote");
            }
            if proposal.can_execute(&session, &busy) {
                actions.push("execute");
            }
            println!(
                "#{:<3} {:<8} votes={:<3} voted={:<5} [{}] {}",
                proposal.id,
                proposal.status.label(),
                proposal.vote_count,
                proposal.has_voted,
                actions.join(","),
                proposal.description
            );
        }
    }
}

fn spawn_notification_printer(coordinator: &SyncCoordinator) {
    let mut events = coordinator.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Notification(notification)) => {
                    let marker = match notification.level {
                        NotificationLevel::Info => "*",
                        NotificationLevel::Error => "!",
                    };
                    println!("{marker} {}: {}", notification.title, notification.description);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "cli: notifications dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings();
    let ledger = InMemoryLedger::deploy(settings.contract_address.clone());
    let signer = (!args.no_signer).then(|| Address::new(args.account));
    let primary = SyncCoordinator::new_with_gateway(
        settings.clone(),
        Arc::new(ledger.gateway(signer)),
    );
    spawn_notification_printer(&primary);

    println!(
        "governance contract {} via {} (type 'help')",
        settings.contract_address, settings.rpc_url
    );
    let mut shell = Shell {
        ledger,
        settings,
        primary,
        others: HashMap::new(),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match shell.run(command).await {
            Ok(true) => {}
            Ok(false) => break,
            // Already reported through a notification.
            Err(err) => warn!("cli: command failed: {err}"),
        }
    }

    Ok(())
}
