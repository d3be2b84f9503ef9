//! Entry point that wires a transport and a notifier into the controllers.

use crate::config::ClientConfig;
use crate::error::DocflowError;
use crate::notify::{SharedNotifier, TracingNotifier};
use crate::transport::{HttpTransport, SharedTransport};
use crate::workflow::convert::ConvertController;
use crate::workflow::ocr::OcrController;
use crate::workflow::research::ResearchController;
use std::sync::Arc;
use tracing::debug;

/// Factory for workflow controllers sharing one backend.
///
/// Each call to [`research`](Self::research), [`convert`](Self::convert) or
/// [`ocr`](Self::ocr) returns a fresh, independent controller.
///
/// ```no_run
/// use edgequake_docflow::{ClientConfig, DocflowClient, StagedFile, Workflow};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::builder().base_url("http://localhost:8000").build()?;
/// let client = DocflowClient::new(config)?;
///
/// let mut ocr = client.ocr();
/// ocr.stage(vec![StagedFile::from_path("scan.png").await?])?;
/// ocr.submit().await?;
/// if let Some(text) = ocr.state().result() {
///     println!("{}", text.text);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocflowClient {
    config: ClientConfig,
    transport: SharedTransport,
    notifier: SharedNotifier,
}

impl DocflowClient {
    /// HTTP transport and tracing-backed notifications.
    pub fn new(config: ClientConfig) -> Result<Self, DocflowError> {
        let transport: SharedTransport = Arc::new(HttpTransport::new(&config)?);
        debug!("Client ready for {}", config.base_url);
        Ok(Self {
            config,
            transport,
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Use a caller-supplied transport and notifier.
    pub fn with_parts(config: ClientConfig, transport: SharedTransport, notifier: SharedNotifier) -> Self {
        Self {
            config,
            transport,
            notifier,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn research(&self) -> ResearchController {
        ResearchController::new(Arc::clone(&self.transport), Arc::clone(&self.notifier), &self.config)
    }

    pub fn convert(&self) -> ConvertController {
        ConvertController::new(Arc::clone(&self.transport), Arc::clone(&self.notifier), &self.config)
    }

    pub fn ocr(&self) -> OcrController {
        OcrController::new(Arc::clone(&self.transport), Arc::clone(&self.notifier), &self.config)
    }
}
