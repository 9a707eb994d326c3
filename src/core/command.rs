//! Text command protocol.
//!
//! A line is `<sender> COMMAND <VERB> [args...]`. Data arguments name keys in
//! the sender's namespace: argument `x` from sender `cam` addresses key
//! `"cam x"`. Any line whose second token is not `COMMAND` is a pattern.

use tracing::info;

use crate::error::CommandError;
use crate::network::Network;
use crate::policy::Policy;
use crate::state::UnitState;
use crate::unit::DataKey;

pub const COMMAND_TOKEN: &str = "COMMAND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintTarget<K> {
    Units,
    Unit(K),
    Associations,
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<K> {
    Pause,
    Resume,
    /// Drop every unit and association.
    ClearNetwork,
    JoinData { keep: K, delete: K },
    SplitData { old: K, new: K },
    DeleteData { key: K },
    Print(PrintTarget<K>),
}

/// Whether `line` is addressed to the command interpreter.
pub fn is_command(line: &str) -> bool {
    line.split_whitespace().nth(1) == Some(COMMAND_TOKEN)
}

impl Command<String> {
    /// Parse a command line. Returns `Ok(None)` when the line is a pattern.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(sender) = tokens.first() else {
            return Err(CommandError::Empty);
        };
        if tokens.get(1) != Some(&COMMAND_TOKEN) {
            return Ok(None);
        }
        let verb = tokens.get(2).ok_or(CommandError::MissingVerb)?;
        let args = &tokens[3..];
        let scoped = |arg: &str| format!("{sender} {arg}");

        let command = match *verb {
            "PAUSE" => {
                arity("PAUSE", args, 0)?;
                Command::Pause
            }
            "RESUME" => {
                arity("RESUME", args, 0)?;
                Command::Resume
            }
            "CLEARNETWORK" => {
                arity("CLEARNETWORK", args, 0)?;
                Command::ClearNetwork
            }
            "JOINDATA" => {
                arity("JOINDATA", args, 2)?;
                Command::JoinData {
                    keep: scoped(args[0]),
                    delete: scoped(args[1]),
                }
            }
            "SPLITDATA" => {
                arity("SPLITDATA", args, 2)?;
                Command::SplitData {
                    old: scoped(args[0]),
                    new: scoped(args[1]),
                }
            }
            "DELETEDATA" => {
                arity("DELETEDATA", args, 1)?;
                Command::DeleteData {
                    key: scoped(args[0]),
                }
            }
            "PRINT" => Command::Print(parse_print(line, args, &scoped)?),
            other => return Err(CommandError::UnknownVerb(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn arity(verb: &'static str, args: &[&str], expected: usize) -> Result<(), CommandError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CommandError::Arity {
            verb,
            expected,
            got: args.len(),
        })
    }
}

fn parse_print(
    line: &str,
    args: &[&str],
    scoped: &dyn Fn(&str) -> String,
) -> Result<PrintTarget<String>, CommandError> {
    let target = args.first().ok_or(CommandError::Arity {
        verb: "PRINT",
        expected: 1,
        got: 0,
    })?;
    match *target {
        "UNITS" => Ok(PrintTarget::Units),
        "ASSOCIATIONS" => Ok(PrintTarget::Associations),
        "UNIT" => {
            arity("PRINT UNIT", &args[1..], 1)?;
            Ok(PrintTarget::Unit(scoped(args[1])))
        }
        "MESSAGE" => {
            // Sender, COMMAND, PRINT, MESSAGE; the rest keeps its spacing.
            Ok(PrintTarget::Message(after_tokens(line, 4).to_string()))
        }
        other => Err(CommandError::UnknownPrintTarget(other.to_string())),
    }
}

/// `line` with its first `count` whitespace-separated tokens removed.
fn after_tokens(line: &str, count: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..count {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

impl<K: DataKey> Command<K> {
    /// Apply a network command. `Pause` and `Resume` belong to the driver and
    /// do nothing here.
    pub fn apply<P: Policy>(&self, network: &mut Network<K, P>) {
        match self {
            Command::Pause | Command::Resume => {}
            Command::ClearNetwork => network.clear(),
            Command::JoinData { keep, delete } => {
                let kept = network.join_data(keep, delete);
                info!(?keep, ?delete, found = kept.is_some(), "JOINDATA");
            }
            Command::SplitData { old, new } => {
                let created = network.split_data(old, new.clone());
                info!(?old, ?new, found = created.is_some(), "SPLITDATA");
            }
            Command::DeleteData { key } => {
                let removed = network.delete_data(key);
                info!(?key, removed, "DELETEDATA");
            }
            Command::Print(target) => print(network, target),
        }
    }
}

fn print<K: DataKey, P: Policy>(network: &Network<K, P>, target: &PrintTarget<K>) {
    match target {
        PrintTarget::Units => {
            for unit in network.units().iter() {
                info!(id = %unit.id, key = ?unit.key, state = ?unit.state.fields(), "unit");
            }
        }
        PrintTarget::Unit(key) => match network.get_unit(key) {
            Some(unit) => {
                info!(id = %unit.id, key = ?unit.key, state = ?unit.state.fields(), "unit")
            }
            None => info!(?key, "no such unit"),
        },
        PrintTarget::Associations => {
            for a in network.associations().iter() {
                info!(
                    id = %a.id,
                    src = %a.src,
                    dst = %a.dst,
                    weight = a.weight(),
                    signal = a.signal,
                    learning_rate = a.learning_rate,
                    "association"
                );
            }
        }
        PrintTarget::Message(message) => info!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkConfig;
    use crate::topology::TopologyPolicy;

    #[test]
    fn patterns_are_not_commands() {
        assert_eq!(Command::parse("cam red ball").unwrap(), None);
        assert_eq!(Command::parse("cam").unwrap(), None);
        assert!(!is_command("cam red ball"));
        assert!(is_command("cam COMMAND PAUSE"));
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
    }

    #[test]
    fn data_arguments_are_scoped_by_sender() {
        assert_eq!(
            Command::parse("cam COMMAND JOINDATA a b").unwrap(),
            Some(Command::JoinData {
                keep: "cam a".to_string(),
                delete: "cam b".to_string(),
            })
        );
        assert_eq!(
            Command::parse("mic COMMAND DELETEDATA x").unwrap(),
            Some(Command::DeleteData {
                key: "mic x".to_string()
            })
        );
        assert_eq!(
            Command::parse("mic COMMAND PRINT UNIT x").unwrap(),
            Some(Command::Print(PrintTarget::Unit("mic x".to_string())))
        );
    }

    #[test]
    fn message_keeps_its_text() {
        assert_eq!(
            Command::parse("ui COMMAND PRINT MESSAGE trial 3 done").unwrap(),
            Some(Command::Print(PrintTarget::Message(
                "trial 3 done".to_string()
            )))
        );
    }

    #[test]
    fn message_survives_irregular_spacing() {
        assert_eq!(
            Command::parse("ui COMMAND PRINT  MESSAGE hi").unwrap(),
            Some(Command::Print(PrintTarget::Message("hi".to_string())))
        );
        assert_eq!(
            Command::parse("  ui\tCOMMAND PRINT MESSAGE   a  b  ").unwrap(),
            Some(Command::Print(PrintTarget::Message("a  b".to_string())))
        );
        assert_eq!(
            Command::parse("ui COMMAND PRINT MESSAGE").unwrap(),
            Some(Command::Print(PrintTarget::Message(String::new())))
        );
    }

    #[test]
    fn malformed_commands_are_rejected() {
        assert_eq!(Command::parse("cam COMMAND"), Err(CommandError::MissingVerb));
        assert_eq!(
            Command::parse("cam COMMAND FLY"),
            Err(CommandError::UnknownVerb("FLY".to_string()))
        );
        assert_eq!(
            Command::parse("cam COMMAND SPLITDATA a"),
            Err(CommandError::Arity {
                verb: "SPLITDATA",
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            Command::parse("cam COMMAND PRINT NOTHING"),
            Err(CommandError::UnknownPrintTarget("NOTHING".to_string()))
        );
    }

    #[test]
    fn structural_commands_reach_the_network() {
        let mut net = Network::new(TopologyPolicy::default(), NetworkConfig::topology());
        net.ingest("cam a".to_string(), 1.0);

        let split = Command::parse("cam COMMAND SPLITDATA a b").unwrap().unwrap();
        split.apply(&mut net);
        assert_eq!(net.unit_count(), 2);

        let join = Command::parse("cam COMMAND JOINDATA b a").unwrap().unwrap();
        join.apply(&mut net);
        assert!(net.get_unit(&"cam a".to_string()).is_none());
        assert!(net.get_unit(&"cam b".to_string()).is_some());

        Command::parse("cam COMMAND PRINT UNITS")
            .unwrap()
            .unwrap()
            .apply(&mut net);

        let delete = Command::parse("cam COMMAND DELETEDATA b").unwrap().unwrap();
        delete.apply(&mut net);
        assert_eq!(net.unit_count(), 0);

        net.ingest("cam c".to_string(), 1.0);
        Command::ClearNetwork.apply(&mut net);
        assert_eq!(net.unit_count(), 0);
    }
}
