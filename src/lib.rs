//! Deterministic facts extraction for Bicep templates.
//!
//! Sources are compiled through the Bicep CLI's JSON-RPC server
//! ([`rpc::RpcSession`]), normalized into a versioned facts record
//! ([`facts::assemble_facts`]), checked against the bundled contract
//! ([`schema::FactsSchema`]) and written as canonical JSON
//! ([`canonical::to_canonical_string`]).

pub mod canonical;
pub mod cli;
pub mod config;
pub mod error;
pub mod facts;
pub mod rpc;
pub mod scan;
pub mod schema;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::{FactsError, Result};
pub use facts::{assemble_facts, build_facts, Facts, FactsContext, FactsInputs};
pub use rpc::{CompilerClient, RpcSession, SessionOptions};
pub use schema::FactsSchema;
