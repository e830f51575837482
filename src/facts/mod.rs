//! Facts extraction: normalizing compiler output into a `facts.v1` record.

pub mod arm;
pub mod assembler;
pub mod capabilities;
pub mod model;
pub mod modules;
pub mod parameters;
pub mod scope;

pub use assembler::{assemble_facts, build_facts, FactsContext, FactsInputs, GENERATOR};
pub use model::{
    Capabilities, Category, ComponentIdSource, Constraints, DefaultKind, Facts, Meta, Module,
    ModuleCondition, Output, ParamType, Parameter, Scope, Scopes, Source, SCHEMA_VERSION,
};
