//! Line console for the simulator.
//!
//! Parses operator input into [`ConsoleCommand`] values; the main loop
//! applies them to the mock peripherals. Parsing is separated from the
//! loop so it can be tested without a running kiosk.

use cardvend_core::types::{Denomination, DispenserHealth, UnitId};
use cardvend_hardware::Key;

/// Console help text, printed for `help` and on startup.
pub const HELP: &str = "\
console commands:
  bill <1-7>         insert a stacked bill (1=2000 .. 7=200000)
  key <keys...>      tap keypad keys, e.g. `key 1234` or `key enter`
  menu               hold Enter+Cancel to open the operator menu
  card <a|b>         a card arrives at that unit's gate
  take <a|b>         the customer takes the card from the gate
  refill <a|b>       mark the unit healthy and full
  low <a|b>          mark the unit low on cards
  empty <a|b>        mark the unit out of cards
  fault <a|b>        fault the unit
  remote <json>      inject a remote command payload
  config <json>      inject a remote config payload
  show               print the control core's current state
  quit               exit the simulator";

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Show,
    /// Insert a stacked bill of this denomination.
    Bill(Denomination),
    /// Tap these keys one after another, debounce-safe.
    Keys(Vec<Key>),
    /// Hold the Enter+Cancel chord past the long-press threshold.
    Menu,
    /// Raise the card-at-gate sensor of one unit.
    CardAtGate(UnitId),
    /// Drop the card-at-gate sensor of one unit.
    TakeCard(UnitId),
    /// Overwrite one unit's health sensors.
    SetHealth(UnitId, DispenserHealth),
    /// Raw payload for the remote command topic.
    RemoteCommand(String),
    /// Raw payload for the remote config topic.
    RemoteConfig(String),
    Quit,
}

/// Parse one console line.
///
/// Returns `Ok(None)` for blank input and `Err` with a printable message
/// for anything malformed.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word.to_ascii_lowercase().as_str() {
        "help" => ConsoleCommand::Help,
        "show" | "status" => ConsoleCommand::Show,
        "bill" => ConsoleCommand::Bill(parse_bill(rest)?),
        "key" => ConsoleCommand::Keys(parse_keys(rest)?),
        "menu" => ConsoleCommand::Menu,
        "card" => ConsoleCommand::CardAtGate(parse_unit(rest)?),
        "take" => ConsoleCommand::TakeCard(parse_unit(rest)?),
        "refill" => ConsoleCommand::SetHealth(parse_unit(rest)?, DispenserHealth::OK),
        "low" => ConsoleCommand::SetHealth(
            parse_unit(rest)?,
            DispenserHealth {
                error: false,
                low: true,
                empty: false,
            },
        ),
        "empty" => ConsoleCommand::SetHealth(
            parse_unit(rest)?,
            DispenserHealth {
                error: false,
                low: true,
                empty: true,
            },
        ),
        "fault" => ConsoleCommand::SetHealth(
            parse_unit(rest)?,
            DispenserHealth {
                error: true,
                low: false,
                empty: false,
            },
        ),
        "remote" => ConsoleCommand::RemoteCommand(require_payload(rest)?),
        "config" => ConsoleCommand::RemoteConfig(require_payload(rest)?),
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command {other:?}; type `help`")),
    };
    Ok(Some(command))
}

fn parse_bill(arg: &str) -> Result<Denomination, String> {
    let code: u8 = arg
        .parse()
        .map_err(|_| format!("expected a denomination code 1-7, got {arg:?}"))?;
    Denomination::from_code(code).map_err(|e| e.to_string())
}

fn parse_unit(arg: &str) -> Result<UnitId, String> {
    match arg.to_ascii_lowercase().as_str() {
        "a" => Ok(UnitId::A),
        "b" => Ok(UnitId::B),
        _ => Err(format!("expected a unit `a` or `b`, got {arg:?}")),
    }
}

/// Expand key tokens: `enter`, `cancel`, or runs of digits (`1234`).
fn parse_keys(args: &str) -> Result<Vec<Key>, String> {
    let mut keys = Vec::new();
    for token in args.split_whitespace() {
        match token.to_ascii_lowercase().as_str() {
            "enter" => keys.push(Key::Enter),
            "cancel" => keys.push(Key::Cancel),
            digits => {
                for c in digits.chars() {
                    let d = c
                        .to_digit(10)
                        .ok_or_else(|| format!("expected digits, `enter` or `cancel`, got {token:?}"))?;
                    keys.push(Key::Digit(d as u8));
                }
            }
        }
    }
    if keys.is_empty() {
        return Err("expected at least one key".to_string());
    }
    Ok(keys)
}

fn require_payload(arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        return Err("expected a JSON payload".to_string());
    }
    Ok(arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_bill_parses_denomination() {
        let command = parse("bill 4").unwrap().unwrap();
        match command {
            ConsoleCommand::Bill(denomination) => assert_eq!(denomination.value(), 20_000),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[rstest]
    #[case("bill")]
    #[case("bill 0")]
    #[case("bill 8")]
    #[case("bill x")]
    fn test_bad_bill_is_rejected(#[case] line: &str) {
        assert!(parse(line).is_err());
    }

    #[test]
    fn test_key_run_expands_digits() {
        let command = parse("key 1234").unwrap().unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Keys(vec![
                Key::Digit(1),
                Key::Digit(2),
                Key::Digit(3),
                Key::Digit(4),
            ])
        );
    }

    #[test]
    fn test_key_words_and_digits_mix() {
        let command = parse("key 5 enter").unwrap().unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Keys(vec![Key::Digit(5), Key::Enter])
        );
    }

    #[test]
    fn test_key_without_arguments_is_rejected() {
        assert!(parse("key").is_err());
        assert!(parse("key q").is_err());
    }

    #[rstest]
    #[case("card a", ConsoleCommand::CardAtGate(UnitId::A))]
    #[case("take B", ConsoleCommand::TakeCard(UnitId::B))]
    #[case("refill b", ConsoleCommand::SetHealth(UnitId::B, DispenserHealth::OK))]
    #[case("quit", ConsoleCommand::Quit)]
    #[case("exit", ConsoleCommand::Quit)]
    fn test_simple_commands(#[case] line: &str, #[case] expected: ConsoleCommand) {
        assert_eq!(parse(line).unwrap().unwrap(), expected);
    }

    #[test]
    fn test_empty_marks_both_stock_sensors() {
        let command = parse("empty a").unwrap().unwrap();
        match command {
            ConsoleCommand::SetHealth(unit, health) => {
                assert_eq!(unit, UnitId::A);
                assert!(health.low);
                assert!(health.empty);
                assert!(!health.error);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_remote_payload_passes_through_verbatim() {
        let command = parse(r#"remote {"cmd": 0}"#).unwrap().unwrap();
        assert_eq!(
            command,
            ConsoleCommand::RemoteCommand(r#"{"cmd": 0}"#.to_string())
        );
    }

    #[test]
    fn test_unknown_word_points_at_help() {
        let message = parse("frobnicate").unwrap_err();
        assert!(message.contains("help"));
    }
}
