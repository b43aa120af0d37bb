//! Orchestration: the strict, ordered validator pipelines for the two hook
//! events this sidecar handles, plus the process-wide services, wire
//! shapes, and tool-classification helpers they're built from.

pub mod background;
pub mod hook;
pub mod pre_tool;
pub mod services;
pub mod stop;
pub mod telemetry;
pub mod trust;

pub use background::{BACKGROUND_VALIDATE_FLAG, BackgroundValidateArgs, run_background_validation, spawn_background_validator};
pub use hook::{HookDecision, HookInput, HookSpecificOutput, PRE_TOOL_USE_EVENT, STOP_EVENT};
pub use pre_tool::PreToolRequest;
pub use services::PipelineServices;
pub use stop::StopRequest;
