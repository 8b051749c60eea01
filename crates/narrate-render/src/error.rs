//! Errors raised by the render pipeline.

use std::error::Error as _;
use std::time::Duration;

use narrate_audio::AudioError;
use narrate_core::{
    MediaError, RenderId, RenderState, SettingsError, StatusError, StorageError, SynthesisError,
};
use thiserror::Error;

use crate::fetcher::FetchError;

/// Errors from the audio assembly stages.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Nothing to stitch: no chunk audio")]
    NoInput,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Top-level error of a render job.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),

    #[error("Script is empty")]
    EmptyScript,

    #[error("Script produced no speakable chunks")]
    NoChunks,

    #[error("Render {0} not found")]
    NotFound(RenderId),

    #[error("Render {render_id} is already {state}")]
    Terminal {
        render_id: RenderId,
        state: RenderState,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Storage write failed")]
    Storage(#[from] StorageError),

    #[error("Synthesis failed for chunk {index}")]
    Synthesis {
        index: u32,
        #[source]
        source: SynthesisError,
    },

    #[error("Audio assembly failed")]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Failed to serialize {what}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Render exceeded its {0:?} time limit")]
    Timeout(Duration),
}

impl RenderError {
    pub(crate) fn serialize(what: &'static str, source: serde_json::Error) -> Self {
        Self::Serialize { what, source }
    }

    /// The error and all of its causes joined with `": "`.
    ///
    /// This is the message persisted in a failed status.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.ends_with(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }

    /// Whether the render does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Fetch(e) => e.is_not_found(),
            _ => false,
        }
    }
}
