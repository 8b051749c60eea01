//! Domain types shared by every narrate crate.

mod chunk;
mod diagnostics;
mod render;
mod status;

pub use chunk::{Chunk, Manifest};
pub use diagnostics::{BreakHistogram, Diagnostics, JoinSpike};
pub use render::{InvalidRenderId, RenderId, RenderRequest};
pub use status::{Progress, RenderState, RenderStatus, StatusError, StepName, StepStatus};
