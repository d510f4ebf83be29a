//! Maps parsed commands onto the fault-engine operations.

use faultline_engine::FaultEngine;

use crate::protocol::Command;

/// Invokes the engine operation for `command` and returns the engine's
/// result code unchanged.
///
/// No retry, no interpretation: `0` means success and negative means
/// failure by the engine's own convention, and the caller renders the
/// code onto the wire as-is.
pub fn dispatch(engine: &dyn FaultEngine, command: &Command) -> i32 {
    match command {
        Command::Disable { name } => engine.disable(name),
        Command::Enable {
            name,
            startnum,
            failnum,
            failinfo,
            flags,
        } => engine.enable(name, *startnum, *failnum, *failinfo, *flags),
        Command::EnableRandom {
            name,
            startnum,
            failnum,
            failinfo,
            flags,
            probability,
        } => engine.enable_random(name, *startnum, *failnum, *failinfo, *flags, *probability),
        Command::EnableStackByName {
            name,
            startnum,
            failnum,
            failinfo,
            flags,
            func_name,
            pos_in_stack,
        } => engine.enable_stack_by_name(
            name,
            *startnum,
            *failnum,
            *failinfo,
            *flags,
            func_name,
            *pos_in_stack,
        ),
    }
}

#[cfg(test)]
mod tests {
    use faultline_engine::FaultFlags;
    use faultline_engine::stub::{EngineCall, StubEngine};

    use crate::protocol::parse;

    use super::dispatch;

    #[test]
    fn enable_forwards_every_field() {
        let engine = StubEngine::new();
        let command = parse("enable name=write_fail,failnum=3").expect("parse");
        assert_eq!(dispatch(&engine, &command), 0);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::Enable {
                name: "write_fail".to_string(),
                startnum: 0,
                failnum: 3,
                failinfo: 0,
                flags: FaultFlags::empty(),
            }]
        );
    }

    #[test]
    fn engine_result_code_passes_through() {
        let engine = StubEngine::with_result(-3);
        let command = parse("disable name=missing").expect("parse");
        assert_eq!(dispatch(&engine, &command), -3);
    }

    #[test]
    fn stack_command_reaches_the_stack_operation() {
        let engine = StubEngine::new();
        let command =
            parse("enable_stack_by_name name=x,func_name=do_write,pos_in_stack=1,onetime")
                .expect("parse");
        dispatch(&engine, &command);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::EnableStackByName {
                name: "x".to_string(),
                startnum: 0,
                failnum: 1,
                failinfo: 0,
                flags: FaultFlags::ONETIME,
                func_name: "do_write".to_string(),
                pos_in_stack: 1,
            }]
        );
    }

    #[test]
    fn random_command_reaches_the_random_operation() {
        let engine = StubEngine::new();
        let command = parse("enable_random name=x,probability=0.75").expect("parse");
        dispatch(&engine, &command);
        assert!(matches!(
            engine.calls().as_slice(),
            [EngineCall::EnableRandom { probability, .. }]
                if (probability - 0.75).abs() < f64::EPSILON
        ));
    }
}
