//! Command-line parser for the control protocol.

use faultline_engine::FaultFlags;
use thiserror::Error;

use super::command::Command;

/// Failures local to one request line.
///
/// Over the wire every variant reports as a bare `-1`; the descriptive
/// text exists for local logging only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line held no command token.
    #[error("cannot get command")]
    MissingCommand,
    /// The line held no parameter blob after the command.
    #[error("cannot get parameters")]
    MissingParameters,
    /// A parameter key outside the recognised set.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    /// A command name outside the recognised set.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// Parameter values collected from the comma-separated blob.
///
/// All commands share one parameter grammar; unused keys are simply not
/// read when the command is built.
#[derive(Debug, Clone, PartialEq)]
struct ParameterSet {
    name: Option<String>,
    startnum: i32,
    failnum: i32,
    failinfo: u64,
    probability: Option<f64>,
    func_name: Option<String>,
    pos_in_stack: i32,
    flags: FaultFlags,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            name: None,
            startnum: 0,
            failnum: 1,
            failinfo: 0,
            probability: None,
            func_name: None,
            pos_in_stack: -1,
            flags: FaultFlags::empty(),
        }
    }
}

/// Parses one command line into a [`Command`].
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let command = tokens.next().ok_or(ParseError::MissingCommand)?;
    let parameters = tokens.next().ok_or(ParseError::MissingParameters)?;
    let set = parse_parameters(parameters)?;
    build_command(command, set)
}

fn parse_parameters(blob: &str) -> Result<ParameterSet, ParseError> {
    let mut set = ParameterSet::default();
    for entry in blob.split(',') {
        match entry.split_once('=') {
            Some(("name", value)) => set.name = Some(value.to_string()),
            Some(("startnum", value)) => set.startnum = parse_int(value),
            Some(("failnum", value)) => set.failnum = parse_int(value),
            Some(("failinfo", value)) => set.failinfo = value.parse().unwrap_or(0),
            Some(("probability", value)) => set.probability = Some(value.parse().unwrap_or(0.0)),
            Some(("func_name", value)) => set.func_name = Some(value.to_string()),
            Some(("pos_in_stack", value)) => set.pos_in_stack = parse_int(value),
            // `onetime` is a presence flag but tolerates a value.
            Some(("onetime", _)) | None if is_onetime(entry) => set.flags |= FaultFlags::ONETIME,
            Some((key, _)) => return Err(ParseError::UnknownParameter(key.to_string())),
            None => return Err(ParseError::UnknownParameter(entry.to_string())),
        }
    }
    Ok(set)
}

fn is_onetime(entry: &str) -> bool {
    entry == "onetime" || entry.starts_with("onetime=")
}

/// Permissive integer parse: unparseable input reads as `0`.
fn parse_int(value: &str) -> i32 {
    value.parse().unwrap_or(0)
}

fn build_command(command: &str, set: ParameterSet) -> Result<Command, ParseError> {
    let name = set.name.unwrap_or_default();
    match command {
        "disable" => Ok(Command::Disable { name }),
        "enable" => Ok(Command::Enable {
            name,
            startnum: set.startnum,
            failnum: set.failnum,
            failinfo: set.failinfo,
            flags: set.flags,
        }),
        "enable_random" => Ok(Command::EnableRandom {
            name,
            startnum: set.startnum,
            failnum: set.failnum,
            failinfo: set.failinfo,
            flags: set.flags,
            // -1.0 is the unset sentinel; the engine owns validation.
            probability: set.probability.unwrap_or(-1.0),
        }),
        "enable_stack_by_name" => Ok(Command::EnableStackByName {
            name,
            startnum: set.startnum,
            failnum: set.failnum,
            failinfo: set.failinfo,
            flags: set.flags,
            func_name: set.func_name.unwrap_or_default(),
            pos_in_stack: set.pos_in_stack,
        }),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use faultline_engine::FaultFlags;
    use rstest::rstest;

    use super::{Command, ParseError, parse};

    /// Test-side encoder matching the wire grammar, for round-trips.
    fn serialize(command: &Command) -> String {
        fn flags_suffix(flags: FaultFlags) -> &'static str {
            if flags.contains(FaultFlags::ONETIME) {
                ",onetime"
            } else {
                ""
            }
        }

        match command {
            Command::Disable { name } => format!("disable name={name}"),
            Command::Enable {
                name,
                startnum,
                failnum,
                failinfo,
                flags,
            } => format!(
                "enable name={name},startnum={startnum},failnum={failnum},failinfo={failinfo}{}",
                flags_suffix(*flags)
            ),
            Command::EnableRandom {
                name,
                startnum,
                failnum,
                failinfo,
                flags,
                probability,
            } => format!(
                "enable_random name={name},startnum={startnum},failnum={failnum},\
                 failinfo={failinfo},probability={probability}{}",
                flags_suffix(*flags)
            ),
            Command::EnableStackByName {
                name,
                startnum,
                failnum,
                failinfo,
                flags,
                func_name,
                pos_in_stack,
            } => format!(
                "enable_stack_by_name name={name},startnum={startnum},failnum={failnum},\
                 failinfo={failinfo},func_name={func_name},pos_in_stack={pos_in_stack}{}",
                flags_suffix(*flags)
            ),
        }
    }

    #[test]
    fn disable_parses_the_point_name() {
        assert_eq!(
            parse("disable name=write_fail"),
            Ok(Command::Disable {
                name: "write_fail".to_string()
            })
        );
    }

    #[test]
    fn enable_applies_defaults_for_absent_keys() {
        assert_eq!(
            parse("enable name=write_fail"),
            Ok(Command::Enable {
                name: "write_fail".to_string(),
                startnum: 0,
                failnum: 1,
                failinfo: 0,
                flags: FaultFlags::empty(),
            })
        );
    }

    #[test]
    fn enable_reads_every_recognised_key() {
        assert_eq!(
            parse("enable name=write_fail,startnum=4,failnum=3,failinfo=7,onetime"),
            Ok(Command::Enable {
                name: "write_fail".to_string(),
                startnum: 4,
                failnum: 3,
                failinfo: 7,
                flags: FaultFlags::ONETIME,
            })
        );
    }

    #[rstest]
    #[case("enable onetime,name=x,failnum=2")]
    #[case("enable name=x,onetime,failnum=2")]
    #[case("enable name=x,failnum=2,onetime")]
    fn onetime_sets_exactly_the_fail_once_bit_in_any_position(#[case] line: &str) {
        let Ok(Command::Enable { flags, failnum, .. }) = parse(line) else {
            panic!("expected enable command from {line:?}");
        };
        assert_eq!(flags, FaultFlags::ONETIME);
        assert_eq!(failnum, 2);
    }

    #[test]
    fn enable_random_carries_the_probability() {
        assert_eq!(
            parse("enable_random name=x,probability=0.5"),
            Ok(Command::EnableRandom {
                name: "x".to_string(),
                startnum: 0,
                failnum: 1,
                failinfo: 0,
                flags: FaultFlags::empty(),
                probability: 0.5,
            })
        );
    }

    #[test]
    fn enable_random_without_probability_uses_the_sentinel() {
        let Ok(Command::EnableRandom { probability, .. }) = parse("enable_random name=x") else {
            panic!("expected enable_random command");
        };
        assert!((probability - -1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn enable_stack_by_name_reads_stack_keys() {
        assert_eq!(
            parse("enable_stack_by_name name=x,func_name=do_write,pos_in_stack=2"),
            Ok(Command::EnableStackByName {
                name: "x".to_string(),
                startnum: 0,
                failnum: 1,
                failinfo: 0,
                flags: FaultFlags::empty(),
                func_name: "do_write".to_string(),
                pos_in_stack: 2,
            })
        );
    }

    #[test]
    fn stack_position_defaults_to_unset() {
        let Ok(Command::EnableStackByName { pos_in_stack, .. }) =
            parse("enable_stack_by_name name=x,func_name=f")
        else {
            panic!("expected enable_stack_by_name command");
        };
        assert_eq!(pos_in_stack, -1);
    }

    #[rstest]
    #[case("", ParseError::MissingCommand)]
    #[case("   ", ParseError::MissingCommand)]
    #[case("enable", ParseError::MissingParameters)]
    #[case("enable ", ParseError::MissingParameters)]
    #[case(
        "enable name=x,bogus=1",
        ParseError::UnknownParameter("bogus".to_string())
    )]
    #[case(
        "enable name=x,,failnum=2",
        ParseError::UnknownParameter(String::new())
    )]
    #[case(
        "enable name=x,verbose",
        ParseError::UnknownParameter("verbose".to_string())
    )]
    #[case(
        "explode name=x",
        ParseError::UnknownCommand("explode".to_string())
    )]
    fn malformed_lines_are_rejected(#[case] line: &str, #[case] expected: ParseError) {
        assert_eq!(parse(line), Err(expected));
    }

    #[rstest]
    #[case("enable name=x,startnum=abc", 0)]
    #[case("enable name=x,startnum=2.5", 0)]
    #[case("enable name=x,startnum=12", 12)]
    fn unparseable_integers_default_to_zero(#[case] line: &str, #[case] expected: i32) {
        let Ok(Command::Enable { startnum, .. }) = parse(line) else {
            panic!("expected enable command from {line:?}");
        };
        assert_eq!(startnum, expected);
    }

    #[test]
    fn disable_tolerates_foreign_recognised_keys() {
        // The parameter set is parsed whole before the command is built.
        assert_eq!(
            parse("disable name=x,failnum=3"),
            Ok(Command::Disable {
                name: "x".to_string()
            })
        );
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        let Ok(Command::Enable { failnum, .. }) = parse("enable name=x,failnum=2,failnum=5") else {
            panic!("expected enable command");
        };
        assert_eq!(failnum, 5);
    }

    #[test]
    fn extra_whitespace_separated_tokens_are_ignored() {
        // Only the first two whitespace-separated tokens matter.
        assert_eq!(
            parse("disable name=x trailing junk"),
            Ok(Command::Disable {
                name: "x".to_string()
            })
        );
    }

    #[test]
    fn round_trip_holds_for_every_variant() {
        let commands = [
            Command::Disable {
                name: "write_fail".to_string(),
            },
            Command::Enable {
                name: "write_fail".to_string(),
                startnum: 2,
                failnum: 3,
                failinfo: 9000,
                flags: FaultFlags::ONETIME,
            },
            Command::EnableRandom {
                name: "read_fail".to_string(),
                startnum: 0,
                failnum: 1,
                failinfo: 0,
                flags: FaultFlags::empty(),
                probability: 0.25,
            },
            Command::EnableStackByName {
                name: "open_fail".to_string(),
                startnum: 1,
                failnum: 4,
                failinfo: 7,
                flags: FaultFlags::ONETIME,
                func_name: "do_open".to_string(),
                pos_in_stack: 3,
            },
        ];
        for command in commands {
            assert_eq!(parse(&serialize(&command)), Ok(command));
        }
    }
}
