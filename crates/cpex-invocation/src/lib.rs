// SPDX-License-Identifier: AGPL-3.0

//! Invocations of programs under test.
//!
//! A [`FunctionInvocation`] bundles an entry point with per-argument
//! constructors (symbolic or concrete), optional policy and precondition
//! predicates, and knows how to rebuild argument values from a solver
//! model. The program registry is the compile-time replacement for a
//! source-file loader: it maps names to invocation builders and result
//! oracles.

mod programs;
mod registry;

pub use programs::PROGRAMS;
pub use registry::{find_program, oracle_passed, Oracle, ProgramSpec};

use cpex_exceptions::{ProgramError, SetupError, SetupResult};
use cpex_logs::WarningCode;
use cpex_symbolic::{SymInt, SymStr, SymValue};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// A value returned by a program under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RunValue {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for RunValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunValue::Unit => write!(f, "None"),
            RunValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            RunValue::Int(v) => write!(f, "{}", v),
            RunValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Outcome of one execution: either a returned value or a captured
/// program failure with its triage site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecutionResult {
    Value(RunValue),
    Exception { message: String, site: String },
}

impl ExecutionResult {
    pub fn value(&self) -> Option<&RunValue> {
        match self {
            ExecutionResult::Value(v) => Some(v),
            ExecutionResult::Exception { .. } => None,
        }
    }

    pub fn exception_site(&self) -> Option<&str> {
        match self {
            ExecutionResult::Value(_) => None,
            ExecutionResult::Exception { site, .. } => Some(site),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Value(v) => write!(f, "{}", v),
            ExecutionResult::Exception { message, site } => write!(f, "{} [{}]", message, site),
        }
    }
}

/// A constructed argument value handed to the program.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Int(SymInt),
    Str(SymStr),
}

impl ArgValue {
    pub fn concrete(&self) -> SymValue {
        match self {
            ArgValue::Int(v) => SymValue::Int(v.concrete()),
            ArgValue::Str(s) => SymValue::Str(s.concrete().to_string()),
        }
    }
}

/// The argument map as declared, in declaration order.
pub type InputValues = IndexMap<String, ArgValue>;

/// View of the argument map passed to a program under test.
pub struct Args<'a> {
    values: &'a InputValues,
}

impl Args<'_> {
    pub fn int(&self, name: &str) -> Result<SymInt, ProgramError> {
        match self.values.get(name) {
            Some(ArgValue::Int(v)) => Ok(v.clone()),
            Some(ArgValue::Str(_)) => Err(ProgramError::raise(format!(
                "argument {} is a string, expected an integer",
                name
            ))),
            None => Err(ProgramError::raise(format!("no argument named {}", name))),
        }
    }

    pub fn string(&self, name: &str) -> Result<SymStr, ProgramError> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Ok(s.clone()),
            Some(ArgValue::Int(_)) => Err(ProgramError::raise(format!(
                "argument {} is an integer, expected a string",
                name
            ))),
            None => Err(ProgramError::raise(format!("no argument named {}", name))),
        }
    }
}

/// Entry-point signature for programs under test.
pub type ProgramFn = fn(&Args) -> Result<RunValue, ProgramError>;

/// Policy predicate over results; a failing result is logged, not fatal.
pub type PolicyFn = fn(&RunValue) -> bool;

/// Precondition predicate over concrete argument values.
pub type PreconditionFn = fn(&SymValue) -> bool;

#[derive(Debug, Clone)]
enum ArgSpec {
    SymbolicInt { initial: i64 },
    SymbolicStr { initial: String },
    Concrete { value: SymValue },
}

/// The entry-point callable together with everything needed to re-invoke
/// it on fresh inputs.
pub struct FunctionInvocation {
    name: String,
    function: ProgramFn,
    specs: IndexMap<String, ArgSpec>,
    policy: Option<PolicyFn>,
    precondition: Option<PreconditionFn>,
}

impl FunctionInvocation {
    pub fn new(name: &str, function: ProgramFn) -> Self {
        FunctionInvocation {
            name: name.to_string(),
            function,
            specs: IndexMap::new(),
            policy: None,
            precondition: None,
        }
    }

    pub fn symbolic_int(mut self, name: &str, initial: i64) -> Self {
        self.specs
            .insert(name.to_string(), ArgSpec::SymbolicInt { initial });
        self
    }

    pub fn symbolic_str(mut self, name: &str, initial: &str) -> Self {
        self.specs.insert(
            name.to_string(),
            ArgSpec::SymbolicStr {
                initial: initial.to_string(),
            },
        );
        self
    }

    pub fn concrete(mut self, name: &str, value: SymValue) -> Self {
        self.specs
            .insert(name.to_string(), ArgSpec::Concrete { value });
        self
    }

    pub fn with_policy(mut self, policy: PolicyFn) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_precondition(mut self, precondition: PreconditionFn) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Whether any symbolic argument is string-sorted. Drives the solver
    /// pairing in multi mode.
    pub fn has_string_inputs(&self) -> bool {
        self.specs
            .values()
            .any(|spec| matches!(spec, ArgSpec::SymbolicStr { .. }))
    }

    /// Construct the value for `name`, from `value` when a model supplied
    /// one, otherwise from the declared initial. Concrete arguments ignore
    /// model values entirely.
    pub fn create_argument_value(
        &self,
        name: &str,
        value: Option<SymValue>,
    ) -> SetupResult<ArgValue> {
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| SetupError::InvalidArgument {
                name: name.to_string(),
                reason: "not declared by the entry point".to_string(),
            })?;

        match spec {
            ArgSpec::SymbolicInt { initial } => {
                let concrete = match value {
                    None => *initial,
                    Some(SymValue::Int(v)) => v,
                    Some(SymValue::Str(_)) => {
                        return Err(SetupError::InvalidArgument {
                            name: name.to_string(),
                            reason: "expected an integer value".to_string(),
                        })
                    }
                };
                Ok(ArgValue::Int(SymInt::variable(name, concrete)))
            }
            ArgSpec::SymbolicStr { initial } => {
                let concrete = match value {
                    None => initial.clone(),
                    Some(SymValue::Str(s)) => s,
                    Some(SymValue::Int(_)) => {
                        return Err(SetupError::InvalidArgument {
                            name: name.to_string(),
                            reason: "expected a string value".to_string(),
                        })
                    }
                };
                Ok(ArgValue::Str(SymStr::variable(name, &concrete)))
            }
            ArgSpec::Concrete { value } => Ok(match value {
                SymValue::Int(v) => ArgValue::Int(SymInt::lit(*v)),
                SymValue::Str(s) => ArgValue::Str(SymStr::lit(s)),
            }),
        }
    }

    /// Build the full initial argument map.
    pub fn initial_inputs(&self) -> SetupResult<InputValues> {
        let mut inputs = InputValues::new();
        for name in self.specs.keys() {
            inputs.insert(name.clone(), self.create_argument_value(name, None)?);
        }
        Ok(inputs)
    }

    /// Run the entry point once on the given arguments. Program failures
    /// are captured, never propagated.
    pub fn call(&self, inputs: &InputValues) -> ExecutionResult {
        if let Some(precondition) = self.precondition {
            let satisfied = inputs.values().any(|arg| precondition(&arg.concrete()));
            if !satisfied {
                cpex_logs::warn_code(
                    WarningCode::PreconditionViolation,
                    "Precondition Violation",
                    true,
                );
                return ExecutionResult::Value(RunValue::Bool(false));
            }
        }

        match (self.function)(&Args { values: inputs }) {
            Ok(value) => {
                if let Some(policy) = self.policy {
                    if !policy(&value) {
                        cpex_logs::warn_code(
                            WarningCode::PolicyViolation,
                            &format!("Policy Violation: {}", value),
                            true,
                        );
                    }
                }
                ExecutionResult::Value(value)
            }
            Err(error) => ExecutionResult::Exception {
                message: error.to_string(),
                site: error.site().to_string(),
            },
        }
    }
}
