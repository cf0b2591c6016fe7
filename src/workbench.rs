//! Async driver that owns a [`Session`] and runs its suspension points.
//!
//! Decode and analysis run as spawned tasks. Each task reports back through
//! an mpsc channel with the [`Generation`] it started under; the driver
//! feeds completions to [`Session::dispatch`], which drops stale ones. The
//! driver is the single writer of the session, so no lock is needed.
//!
//! Every spawned operation reports exactly one completion, even when the
//! work inside it panics.
//!
//! ```rust,no_run
//! use edgequake_image_insights::{AnalysisConfig, RawImageFile, Workbench};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalysisConfig::default();
//! let mut bench = Workbench::from_config(config)?;
//!
//! bench.select(RawImageFile::from_path("question.jpg").await?);
//! bench.settle().await;
//! bench.analyze()?;
//! bench.settle().await;
//! println!("{:?}", bench.session().state());
//! # Ok(())
//! # }
//! ```

use crate::analyze::AnalysisClient;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, GENERIC_ANALYSIS_MESSAGE};
use crate::pipeline::load::{load_image, RawImageFile};
use crate::pipeline::normalize::{normalize, JpegSurface, RenderSurface};
use crate::session::{Generation, Outcome, Session, SessionEvent, TransitionError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

pub struct Workbench {
    session: Session,
    config: Arc<AnalysisConfig>,
    client: AnalysisClient,
    surface: Arc<dyn RenderSurface>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    pending: usize,
}

impl Workbench {
    pub fn new(client: AnalysisClient, config: AnalysisConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(),
            config: Arc::new(config),
            client,
            surface: Arc::new(JpegSurface),
            tx,
            rx,
            pending: 0,
        }
    }

    /// Workbench backed by the provider `config` resolves to.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let client = AnalysisClient::from_config(&config)?;
        Ok(Self::new(client, config))
    }

    pub fn with_surface(mut self, surface: Arc<dyn RenderSurface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Number of spawned operations whose completion has not been received.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Select a new file; starts decode + normalisation in the background.
    pub fn select(&mut self, file: RawImageFile) -> Generation {
        let generation = self.session.select(file.name.clone());
        let config = Arc::clone(&self.config);
        let surface = Arc::clone(&self.surface);
        let tx = self.tx.clone();

        self.pending += 1;
        tokio::spawn(async move {
            // Inner task so a panic still produces a completion.
            let work = tokio::spawn(async move {
                let bitmap = load_image(file, &config).await?;
                tokio::task::spawn_blocking(move || normalize(&bitmap, surface.as_ref(), &config))
                    .await
                    .map_err(|e| AnalysisError::Decode {
                        detail: format!("normalisation task panicked: {e}"),
                    })
            });
            let event = match work.await {
                Ok(Ok(normalized)) => SessionEvent::DecodeOk {
                    generation,
                    normalized,
                },
                Ok(Err(error)) => SessionEvent::DecodeFail { generation, error },
                Err(e) => SessionEvent::DecodeFail {
                    generation,
                    error: AnalysisError::Decode {
                        detail: format!("decode task failed: {e}"),
                    },
                },
            };
            // The receiver only goes away with the workbench.
            let _ = tx.send(event);
        });

        generation
    }

    /// Start analysing the current image in the background.
    ///
    /// # Errors
    /// - [`TransitionError::Rejected`] with [`AnalysisError::NoImageSelected`]
    ///   when nothing is selected
    /// - [`TransitionError::Invalid`] while a decode or analysis is in flight
    pub fn analyze(&mut self) -> Result<Generation, TransitionError> {
        let (generation, request) = self.session.begin_analysis()?;
        let client = self.client.clone();
        let tx = self.tx.clone();

        self.pending += 1;
        tokio::spawn(async move {
            let work = tokio::spawn(async move { client.analyze(&request).await });
            let event = match work.await {
                Ok(Ok(result)) => SessionEvent::AnalyzeOk { generation, result },
                Ok(Err(error)) => SessionEvent::AnalyzeFail { generation, error },
                Err(e) => {
                    warn!("Analysis task {} failed: {}", generation, e);
                    SessionEvent::AnalyzeFail {
                        generation,
                        error: AnalysisError::GenericAnalysis {
                            message: GENERIC_ANALYSIS_MESSAGE.to_string(),
                        },
                    }
                }
            };
            let _ = tx.send(event);
        });

        Ok(generation)
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` when nothing is pending.
    pub async fn next(&mut self) -> Option<Result<Outcome, TransitionError>> {
        if self.pending == 0 {
            return None;
        }
        let event = self.rx.recv().await?;
        self.pending -= 1;
        Some(self.session.dispatch(event))
    }

    /// Apply completions until nothing is pending.
    pub async fn settle(&mut self) {
        while let Some(applied) = self.next().await {
            if let Err(e) = applied {
                warn!("Dropping completion: {}", e);
            }
        }
    }
}
