use crate::reports::{DispatchJob, DispatchOutcome, Dispatcher, ReportRegistry};
use crate::slack::{messages, ImmediateResponse, InteractionPayload};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Interaction payload is missing {0}")]
    MissingField(&'static str),

    #[error("Interaction payload is not valid JSON: {0}")]
    Malformed(String),
}

/// Turns a report selection into an immediate reply plus a background dispatch.
pub struct RequestHandler {
    registry: Arc<ReportRegistry>,
    dispatcher: Dispatcher,
    files_dir: PathBuf,
}

impl RequestHandler {
    pub fn new(registry: Arc<ReportRegistry>, dispatcher: Dispatcher, files_dir: PathBuf) -> Self {
        Self {
            registry,
            dispatcher,
            files_dir,
        }
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Parse the form-encoded `payload` field Slack posts to the actions URL.
    pub fn parse_payload(raw: &str) -> Result<InteractionPayload, PayloadError> {
        serde_json::from_str(raw).map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    /// Reply immediately; the report itself is produced in the background.
    pub fn handle(&self, payload: &InteractionPayload) -> Result<ImmediateResponse, PayloadError> {
        self.handle_tracked(payload).map(|(response, _)| response)
    }

    /// Same as [`handle`](Self::handle), also returning the dispatch task when one was started.
    pub fn handle_tracked(
        &self,
        payload: &InteractionPayload,
    ) -> Result<(ImmediateResponse, Option<JoinHandle<DispatchOutcome>>), PayloadError> {
        let report_key = payload
            .actions
            .first()
            .ok_or(PayloadError::MissingField("actions[0]"))?
            .selected_options
            .first()
            .ok_or(PayloadError::MissingField("actions[0].selected_options[0]"))?
            .value
            .as_str();
        let response_url = payload
            .response_url
            .as_deref()
            .ok_or(PayloadError::MissingField("response_url"))?;

        let Some(descriptor) = self.registry.resolve(report_key) else {
            debug!("Requested report '{}' is not registered", report_key);
            return Ok((messages::not_available(), None));
        };

        let response = messages::generating(&descriptor.display_name);
        let target = descriptor.target_in(&self.files_dir);
        let job = DispatchJob::new(descriptor, target, response_url.to_string());
        info!(
            "Dispatching report {} as {} (dispatch {})",
            job.descriptor.key, job.target.tmp_name, job.id
        );

        let task = self.dispatcher.spawn(job);
        Ok((response, Some(task)))
    }
}
