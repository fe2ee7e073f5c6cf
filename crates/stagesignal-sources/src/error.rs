use thiserror::Error;

use stagesignal_fetch::FetchError;
use stagesignal_panel::PanelError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed {collector} payload: {reason}")]
    Payload { collector: String, reason: String },

    #[error(transparent)]
    Panel(#[from] PanelError),
}

impl SourceError {
    pub(crate) fn payload(collector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Payload {
            collector: collector.into(),
            reason: reason.into(),
        }
    }
}
