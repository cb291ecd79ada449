//! Text moderation pipeline for short videos.
//!
//! Every short flows through:
//! 1. `normalize`: redaction, demojizing, context building
//! 2. `guardrails`: absolute-override patterns (no classifier)
//! 3. `scorer`: zero-shot classifier scores plus keyword boost
//! 4. `risk`: LOW/MEDIUM/HIGH bins and the primary violation
//! 5. `policy`: first-match-wins decision rules
//! 6. `assembler`: the final `ModerationResult`
//!
//! `processor::ModerationPipeline` wires the stages together and adds batch
//! mode; `batch` and `review` handle the files around it.

pub mod assembler;
pub mod batch;
pub mod guardrails;
pub mod normalize;
pub mod policy;
pub mod processor;
pub mod review;
pub mod risk;
pub mod scorer;
pub mod types;

pub use processor::ModerationPipeline;
