//! ABOUTME: Template Engine Adapter, the default Jig engine, the two-pass AI protocol,
//! ABOUTME: and the `add`/`inject` Operations primitives used by the Template tool.

pub mod ai;
pub mod engine;
pub mod jig;
pub mod operations;

pub use ai::assembler::{assemble, AssembledPrompt};
pub use ai::collector::{AiBlockEntry, AiCollector};
pub use ai::transport::{
    AiTransport, CommandMode, CommandTransport, LlmClient, ApiTransport, StdoutTransport,
    TransportOutcome,
};
pub use engine::{GlobalFn, RenderState, TemplateEngine, TemplateError};
pub use jig::JigEngine;
pub use operations::{add, inject, InjectMode, InjectOutcome, WriteOutcome};
