//! Plumbing shared by the three controllers: staging, rejection reporting,
//! progress wiring, and terminal transitions.

use super::state::{Stage, WorkflowState};
use super::WorkflowKind;
use crate::config::ClientConfig;
use crate::error::{TransportFailure, ValidationError};
use crate::notify::{Notification, SharedNotifier};
use crate::progress::{ProgressCallback, ProgressFn, ProgressGauge};
use crate::staging::{FileStagingArea, StageReport, StagedFile, StagingPolicy};
use crate::transport::SharedTransport;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) struct WorkflowDriver<R> {
    pub(crate) kind: WorkflowKind,
    pub(crate) staging: FileStagingArea,
    pub(crate) state: WorkflowState<R>,
    pub(crate) transport: SharedTransport,
    notifier: SharedNotifier,
    gauge: Arc<ProgressGauge>,
    progress_callback: Option<ProgressCallback>,
}

impl<R> WorkflowDriver<R> {
    pub(crate) fn new(
        kind: WorkflowKind,
        policy: StagingPolicy,
        transport: SharedTransport,
        notifier: SharedNotifier,
        config: &ClientConfig,
    ) -> Self {
        Self {
            kind,
            staging: FileStagingArea::new(policy),
            state: WorkflowState::Idle,
            transport,
            notifier,
            gauge: Arc::new(ProgressGauge::new()),
            progress_callback: config.progress_callback.clone(),
        }
    }

    /// Report a local rejection and hand the error back.
    pub(crate) fn reject(&self, err: ValidationError) -> ValidationError {
        warn!("[{}] rejected: {}", self.kind, err);
        self.notifier.notify(Notification::warning(err.to_string()));
        err
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    pub(crate) fn stage(&mut self, files: Vec<StagedFile>) -> Result<StageReport, ValidationError> {
        if self.state.is_in_flight() {
            return Err(self.reject(ValidationError::InFlight));
        }
        let report = self.staging.stage(files).map_err(|e| self.reject(e))?;
        for rejected in &report.rejected {
            self.notify(Notification::warning(rejected.to_string()));
        }
        self.state.mark_staged().map_err(|e| self.reject(e))?;
        debug!(
            "[{}] staged {} file(s), {} total",
            self.kind,
            report.staged,
            self.staging.len()
        );
        Ok(report)
    }

    pub(crate) fn reset(&mut self) -> Result<(), ValidationError> {
        self.state.reset().map_err(|e| self.reject(e))?;
        self.staging.clear();
        self.gauge.reset();
        debug!("[{}] reset to idle", self.kind);
        Ok(())
    }

    /// Refuse if a request is already in flight.
    pub(crate) fn ensure_not_in_flight(&self) -> Result<(), ValidationError> {
        if self.state.is_in_flight() {
            Err(self.reject(ValidationError::InFlight))
        } else {
            Ok(())
        }
    }

    /// Move to `Submitting` for a request to `endpoint`.
    pub(crate) fn begin(&mut self, endpoint: &str) -> Result<(), ValidationError> {
        self.state.begin_submit().map_err(|e| self.reject(e))?;
        self.gauge.reset();
        if let Some(ref cb) = self.progress_callback {
            cb.on_request_start(endpoint);
        }
        info!("[{}] submitting to {}", self.kind, endpoint);
        Ok(())
    }

    /// Sink for the transport's percentages: advances the gauge and forwards
    /// each advance to the configured callback.
    pub(crate) fn progress_fn(&self, endpoint: &'static str) -> ProgressFn {
        let gauge = Arc::clone(&self.gauge);
        let callback = self.progress_callback.clone();
        Arc::new(move |percent: u8| {
            if let Some(now) = gauge.advance(percent) {
                if let Some(ref cb) = callback {
                    cb.on_progress(endpoint, now);
                }
            }
        })
    }

    pub(crate) fn progress(&self) -> u8 {
        self.gauge.get()
    }

    /// Apply the terminal transition.
    ///
    /// On success the staged files are released; on failure they are kept so
    /// the user can retry without selecting them again.
    pub(crate) fn finish(
        &mut self,
        endpoint: &str,
        result: Result<R, TransportFailure>,
        success: Notification,
        failure_title: &str,
    ) -> Stage {
        let ok = result.is_ok();
        let failure = result.as_ref().err().cloned();

        let Some(stage) = self.state.settle(result) else {
            warn!("[{}] outcome arrived with nothing in flight; ignored", self.kind);
            return self.state.stage();
        };

        if self.gauge.get() < 100 {
            self.gauge.complete();
            if let Some(ref cb) = self.progress_callback {
                cb.on_progress(endpoint, 100);
            }
        }
        if let Some(ref cb) = self.progress_callback {
            cb.on_request_complete(endpoint, ok);
        }

        match failure {
            None => {
                self.staging.clear();
                info!("[{}] succeeded", self.kind);
                self.notify(success);
            }
            Some(f) => {
                warn!("[{}] failed: {} ({:?})", self.kind, f.message, f.kind);
                self.notify(Notification::error(failure_title).with_description(f.message));
            }
        }
        stage
    }
}
