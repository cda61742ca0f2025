// SPDX-License-Identifier: AGPL-3.0

//! The bundled instrumented programs.
//!
//! Each program is an ordinary function over concolic values: comparisons
//! go through `branch()`, loops run over concrete lengths, and helpers may
//! branch internally. The registry at the bottom exposes them to the CLI
//! and to the exploration tests.

use crate::registry::{Oracle, ProgramSpec};
use crate::{Args, FunctionInvocation, RunValue};
use cpex_exceptions::ProgramError;
use cpex_symbolic::{SymBool, SymInt, SymStr, SymValue};
use std::collections::BTreeSet;

const ROMAN_DIGITS: [(&str, i64); 8] = [
    ("I", 1),
    ("V", 5),
    ("X", 10),
    ("L", 50),
    ("C", 100),
    ("D", 500),
    ("M", 1000),
    ("E", 0),
];

/// Membership of `c` in the digit alphabet, as a single disjunction so the
/// rejection path is one negated predicate.
fn roman_digit(c: &SymStr) -> SymBool {
    let mut member = c.eq(&SymStr::lit(ROMAN_DIGITS[0].0));
    for (digit, _) in &ROMAN_DIGITS[1..] {
        member = member.or(&c.eq(&SymStr::lit(digit)));
    }
    member
}

fn roman_value(c: &SymStr) -> SymInt {
    for (digit, value) in ROMAN_DIGITS {
        if c.eq(&SymStr::lit(digit)).branch() {
            return SymInt::lit(value);
        }
    }
    SymInt::lit(0)
}

fn roman_to_int(args: &Args) -> Result<RunValue, ProgramError> {
    let in1 = args.string("in1")?;

    let length = in1.len().concrete();
    for i in 0..length {
        let c = in1.char_at_index(i);
        if (!&roman_digit(&c)).branch() {
            return Ok(RunValue::Int(-1));
        }
    }

    // Pad with the zero digit so the lookahead below never falls off the end.
    let padded = in1.concat(&SymStr::lit("E"));
    let mut sum = SymInt::lit(0);
    for i in 0..length {
        let current = roman_value(&padded.char_at_index(i));
        let next = roman_value(&padded.char_at_index(i + 1));
        if current.ge(&next).branch() {
            sum = sum.add(&current);
        } else {
            sum = sum.sub(&current);
        }
    }

    Ok(RunValue::Int(sum.concrete()))
}

fn escape(args: &Args) -> Result<RunValue, ProgramError> {
    let string = args.string("string")?;

    if string.truthy().branch()
        && (!&string.contains(&SymStr::lit("\\"))).branch()
        && string.find(&SymStr::lit(":")).gt(&SymInt::lit(0)).branch()
    {
        return Ok(RunValue::Int(0));
    }
    if string.contains(&SymStr::lit("\"")).branch() {
        return Ok(RunValue::Int(1));
    }
    Ok(RunValue::Int(2))
}

fn strlower(args: &Args) -> Result<RunValue, ProgramError> {
    let s = args.string("s")?;

    if s.lower().eq(&SymStr::lit("hello")).branch() {
        return Ok(RunValue::Int(0));
    }
    if s.contains(&SymStr::lit("X")).branch() && s.lower().contains(&SymStr::lit("x")).branch() {
        return Ok(RunValue::Int(1));
    }
    Ok(RunValue::Int(2))
}

fn strsplit(args: &Args) -> Result<RunValue, ProgramError> {
    let s = args.string("s")?;

    // Split at the first space and compare the two halves.
    let sep = SymStr::lit(" ");
    let idx = s.find(&sep);
    if idx.ge(&SymInt::lit(0)).branch()
        && s.substr(&SymInt::lit(0), &idx).eq(&SymStr::lit("a")).branch()
        && s.substr(&idx.add(&SymInt::lit(1)), &s.len()).eq(&SymStr::lit("b")).branch()
    {
        return Ok(RunValue::Int(0));
    }
    Ok(RunValue::Int(1))
}

fn policy_sum(args: &Args) -> Result<RunValue, ProgramError> {
    let a = args.int("a")?;
    let b = args.int("b")?;
    let c = args.int("c")?;

    if a.add(&b).add(&c).eq(&SymInt::lit(6)).branch() {
        Ok(RunValue::Int(0))
    } else {
        Ok(RunValue::Int(1))
    }
}

fn result_is_zero(result: &RunValue) -> bool {
    matches!(result, RunValue::Int(0))
}

fn precondition_sum(args: &Args) -> Result<RunValue, ProgramError> {
    let a = args.int("a")?;
    let b = args.int("b")?;
    let c = args.int("c")?;

    let sum = a.add(&b).add(&c);
    if sum.eq(&SymInt::lit(0)).branch() {
        Ok(RunValue::Int(0))
    } else if sum.eq(&SymInt::lit(6)).branch() {
        Ok(RunValue::Int(1))
    } else if a.eq(&SymInt::lit(1)).branch()
        && b.eq(&SymInt::lit(1)).branch()
        && c.eq(&SymInt::lit(1)).branch()
    {
        Ok(RunValue::Int(2))
    } else {
        Ok(RunValue::Int(3))
    }
}

fn arg_is_two(arg: &SymValue) -> bool {
    arg.as_int() == Some(2)
}

fn counter(args: &Args) -> Result<RunValue, ProgramError> {
    let n = args.int("n")?;

    if n.eq(&SymInt::lit(7)).branch() {
        Ok(RunValue::Int(1))
    } else {
        Ok(RunValue::Int(0))
    }
}

fn sysexit(args: &Args) -> Result<RunValue, ProgramError> {
    let n = args.int("n")?;

    if n.eq(&SymInt::lit(2)).branch() {
        return Err(ProgramError::exit(2));
    }
    Ok(RunValue::Int(0))
}

fn build_roman_to_int() -> FunctionInvocation {
    FunctionInvocation::new("roman_to_int", roman_to_int).symbolic_str("in1", "XIV")
}

fn build_escape() -> FunctionInvocation {
    FunctionInvocation::new("escape", escape).symbolic_str("string", "foo")
}

fn build_strlower() -> FunctionInvocation {
    FunctionInvocation::new("strlower", strlower).symbolic_str("s", "foo")
}

fn build_strsplit() -> FunctionInvocation {
    FunctionInvocation::new("strsplit", strsplit).symbolic_str("s", "foo")
}

fn build_policy() -> FunctionInvocation {
    FunctionInvocation::new("policy", policy_sum)
        .symbolic_int("a", 0)
        .symbolic_int("b", 0)
        .symbolic_int("c", 3)
        .with_policy(result_is_zero)
}

fn build_precondition() -> FunctionInvocation {
    FunctionInvocation::new("precondition", precondition_sum)
        .symbolic_int("a", 0)
        .symbolic_int("b", 2)
        .symbolic_int("c", 3)
        .with_precondition(arg_is_two)
}

fn build_counter() -> FunctionInvocation {
    FunctionInvocation::new("counter", counter).symbolic_int("n", 0)
}

fn build_sysexit() -> FunctionInvocation {
    FunctionInvocation::new("sysexit", sysexit).symbolic_int("n", 0)
}

fn expected_escape() -> BTreeSet<RunValue> {
    [RunValue::Int(0), RunValue::Int(1), RunValue::Int(2)]
        .into_iter()
        .collect()
}

fn expected_strlower() -> BTreeSet<RunValue> {
    [RunValue::Int(0), RunValue::Int(1), RunValue::Int(2)]
        .into_iter()
        .collect()
}

fn expected_strsplit() -> BTreeSet<RunValue> {
    [RunValue::Int(0), RunValue::Int(1)].into_iter().collect()
}

fn expected_policy() -> BTreeSet<RunValue> {
    [RunValue::Int(0), RunValue::Int(1)].into_iter().collect()
}

fn expected_precondition() -> BTreeSet<RunValue> {
    [
        RunValue::Int(0),
        RunValue::Int(1),
        RunValue::Int(3),
        RunValue::Bool(false),
    ]
    .into_iter()
    .collect()
}

fn expected_counter() -> BTreeSet<RunValue> {
    [RunValue::Int(0), RunValue::Int(1)].into_iter().collect()
}

/// All bundled programs, in CLI listing order.
pub static PROGRAMS: &[ProgramSpec] = &[
    ProgramSpec {
        name: "roman_to_int",
        build: build_roman_to_int,
        oracle: None,
    },
    ProgramSpec {
        name: "escape",
        build: build_escape,
        oracle: Some(Oracle::Set(expected_escape)),
    },
    ProgramSpec {
        name: "strlower",
        build: build_strlower,
        oracle: Some(Oracle::Set(expected_strlower)),
    },
    ProgramSpec {
        name: "strsplit",
        build: build_strsplit,
        oracle: Some(Oracle::Set(expected_strsplit)),
    },
    ProgramSpec {
        name: "policy",
        build: build_policy,
        oracle: Some(Oracle::Set(expected_policy)),
    },
    ProgramSpec {
        name: "precondition",
        build: build_precondition,
        oracle: Some(Oracle::Set(expected_precondition)),
    },
    ProgramSpec {
        name: "counter",
        build: build_counter,
        oracle: Some(Oracle::Set(expected_counter)),
    },
    ProgramSpec {
        name: "sysexit",
        build: build_sysexit,
        oracle: None,
    },
];
