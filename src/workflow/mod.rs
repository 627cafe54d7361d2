pub mod builder_ctx;
pub mod create_flow;

pub use builder_ctx::BuilderCtx;
pub use create_flow::{CreateFlow, CreateOutcome, SeedReport};
