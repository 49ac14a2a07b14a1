//! Commands read line by line from stdin.

use anyhow::{anyhow, bail, Result};
use shared::domain::{Address, ProposalId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Connect,
    Disconnect,
    Propose { description: String },
    Vote { id: ProposalId },
    Execute { id: ProposalId },
    List,
    Refresh,
    Busy,
    VoteAs { voter: Address, id: ProposalId },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  connect                 acquire the wallet identity and bind the contract
  disconnect              release the contract binding
  propose <text>          create a proposal
  vote <id>               vote on a proposal
  execute <id>            execute a proposal
  list                    print the current snapshot
  refresh                 re-read every proposal
  busy                    print in-flight operations
  as <address> vote <id>  vote from another account
  quit";

fn parse_id(raw: Option<&str>) -> Result<ProposalId> {
    let raw = raw.ok_or_else(|| anyhow!("missing proposal id"))?;
    raw.trim_start_matches('#')
        .parse::<u64>()
        .map(ProposalId)
        .map_err(|_| anyhow!("invalid proposal id '{raw}'"))
}

/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<CliCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map(|(head, rest)| (head, rest.trim()))
        .unwrap_or((line, ""));
    let mut args = rest.split_whitespace();

    let command = match head.to_ascii_lowercase().as_str() {
        "connect" => CliCommand::Connect,
        "disconnect" => CliCommand::Disconnect,
        "propose" => CliCommand::Propose {
            description: rest.to_string(),
        },
        "vote" => CliCommand::Vote {
            id: parse_id(args.next())?,
        },
        "execute" => CliCommand::Execute {
            id: parse_id(args.next())?,
        },
        "list" | "ls" => CliCommand::List,
        "refresh" => CliCommand::Refresh,
        "busy" => CliCommand::Busy,
        "as" => {
            let voter = args
                .next()
                .map(Address::new)
                .ok_or_else(|| anyhow!("usage: as <address> vote <id>"))?;
            if !args.next().is_some_and(|verb| verb.eq_ignore_ascii_case("vote")) {
                bail!("usage: as <address> vote <id>");
            }
            CliCommand::VoteAs {
                voter,
                id: parse_id(args.next())?,
            }
        }
        "help" | "?" => CliCommand::Help,
        "quit" | "exit" => CliCommand::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}
