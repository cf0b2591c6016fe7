//! Selection lifecycle as an explicit state machine.
//!
//! ```text
//!            Select            DecodeOk          AnalyzeStart        AnalyzeOk / AnalyzeFail
//!   Idle ───────────▶ Loading ──────────▶ Selected ────────────▶ Analyzing ─────────────▶ Resolved
//!                        │ DecodeFail                                                         │
//!                        └──────────────────────────▶ Resolved(Err) ◀─────────────────────────┘
//! ```
//!
//! `Select` is accepted from every state and bumps the [`Generation`]. Every
//! asynchronous completion carries the generation it was started under and
//! is dropped if a newer selection has happened since, so a slow decode or
//! analysis can never overwrite a fresher selection.

use crate::error::{AnalysisError, CompressionDegraded};
use crate::output::AnalysisResult;
use crate::pipeline::classify::Notice;
use crate::pipeline::normalize::{Normalized, NormalizedImage};
use crate::pipeline::request::AnalysisRequest;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Monotonically increasing selection id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A file was selected and is being decoded/normalised.
    Loading,
    /// A normalised image is ready to analyse.
    Selected,
    Analyzing,
    Resolved(Result<AnalysisResult, AnalysisError>),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Loading => "Loading",
            SessionState::Selected => "Selected",
            SessionState::Analyzing => "Analyzing",
            SessionState::Resolved(Ok(_)) => "Resolved(Ok)",
            SessionState::Resolved(Err(_)) => "Resolved(Err)",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Select {
        name: Option<String>,
    },
    DecodeOk {
        generation: Generation,
        normalized: Normalized,
    },
    DecodeFail {
        generation: Generation,
        error: AnalysisError,
    },
    AnalyzeStart,
    AnalyzeOk {
        generation: Generation,
        result: AnalysisResult,
    },
    AnalyzeFail {
        generation: Generation,
        error: AnalysisError,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Select { .. } => "Select",
            SessionEvent::DecodeOk { .. } => "DecodeOk",
            SessionEvent::DecodeFail { .. } => "DecodeFail",
            SessionEvent::AnalyzeStart => "AnalyzeStart",
            SessionEvent::AnalyzeOk { .. } => "AnalyzeOk",
            SessionEvent::AnalyzeFail { .. } => "AnalyzeFail",
        }
    }

    fn generation(&self) -> Option<Generation> {
        match self {
            SessionEvent::Select { .. } | SessionEvent::AnalyzeStart => None,
            SessionEvent::DecodeOk { generation, .. }
            | SessionEvent::DecodeFail { generation, .. }
            | SessionEvent::AnalyzeOk { generation, .. }
            | SessionEvent::AnalyzeFail { generation, .. } => Some(*generation),
        }
    }
}

/// What [`Session::dispatch`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new selection is current.
    Selected(Generation),
    /// Analysis may start; submit `request` and report back under `generation`.
    AnalysisStarted {
        generation: Generation,
        request: AnalysisRequest,
    },
    /// A completion was applied.
    Applied,
    /// A completion from an older selection was discarded.
    Stale { event: &'static str, generation: Generation },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event '{event}' is not valid in state '{state}'")]
    Invalid {
        state: &'static str,
        event: &'static str,
    },

    /// The event was valid but the pipeline refused it; the error is also
    /// recorded as the session outcome.
    #[error(transparent)]
    Rejected(#[from] AnalysisError),
}

/// Single-writer owner of the current selection.
#[derive(Debug, Clone)]
pub struct Session {
    generation: Generation,
    state: SessionState,
    file_name: Option<String>,
    image: Option<NormalizedImage>,
    warning: Option<CompressionDegraded>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            generation: Generation::default(),
            state: SessionState::Idle,
            file_name: None,
            image: None,
            warning: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The current normalised image, for preview rendering.
    pub fn preview(&self) -> Option<&NormalizedImage> {
        self.image.as_ref()
    }

    pub fn warning(&self) -> Option<&CompressionDegraded> {
        self.warning.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::Analyzing)
    }

    /// The message a presentation layer should show right now, if any.
    ///
    /// Errors take precedence over the compression warning, which takes
    /// precedence over the "compressed" info shown once an image is ready.
    pub fn notice(&self) -> Option<Notice> {
        match &self.state {
            SessionState::Resolved(Err(e)) => Some(Notice::from(e)),
            _ if self.warning.is_some() => self.warning.as_ref().map(Notice::from),
            SessionState::Selected => self
                .image
                .as_ref()
                .filter(|img| img.is_smaller_than_original())
                .map(|_| Notice::compressed()),
            _ => None,
        }
    }

    /// Start a new selection, invalidating everything in flight.
    pub fn select(&mut self, name: Option<String>) -> Generation {
        self.generation = self.generation.next();
        self.state = SessionState::Loading;
        self.file_name = name;
        self.image = None;
        self.warning = None;
        info!(
            "Selected {} as {}",
            self.file_name.as_deref().unwrap_or("<unnamed>"),
            self.generation
        );
        self.generation
    }

    /// Move to `Analyzing` and hand out the validated request.
    pub fn begin_analysis(&mut self) -> Result<(Generation, AnalysisRequest), TransitionError> {
        if self.is_busy() {
            return Err(self.invalid("AnalyzeStart"));
        }
        self.start_analysis()
    }

    /// Apply one event.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Outcome, TransitionError> {
        if let Some(generation) = event.generation() {
            if generation != self.generation {
                debug!(
                    "Discarding stale {} from {} (current {})",
                    event.name(),
                    generation,
                    self.generation
                );
                return Ok(Outcome::Stale {
                    event: event.name(),
                    generation,
                });
            }
        }

        let event_name = event.name();
        let loading = matches!(self.state, SessionState::Loading);
        let analyzing = matches!(self.state, SessionState::Analyzing);

        match event {
            SessionEvent::Select { name } => Ok(Outcome::Selected(self.select(name))),

            SessionEvent::DecodeOk { normalized, .. } if loading => {
                self.image = Some(normalized.image);
                self.warning = normalized.degraded;
                self.state = SessionState::Selected;
                Ok(Outcome::Applied)
            }
            SessionEvent::DecodeFail { error, .. } if loading => {
                self.image = None;
                self.file_name = None;
                self.state = SessionState::Resolved(Err(error));
                Ok(Outcome::Applied)
            }

            SessionEvent::AnalyzeStart if !(loading || analyzing) => {
                let (generation, request) = self.start_analysis()?;
                Ok(Outcome::AnalysisStarted {
                    generation,
                    request,
                })
            }

            SessionEvent::AnalyzeOk { result, .. } if analyzing => {
                self.state = SessionState::Resolved(Ok(result));
                Ok(Outcome::Applied)
            }
            SessionEvent::AnalyzeFail { error, .. } if analyzing => {
                self.state = SessionState::Resolved(Err(error));
                Ok(Outcome::Applied)
            }

            _ => Err(self.invalid(event_name)),
        }
    }

    fn start_analysis(&mut self) -> Result<(Generation, AnalysisRequest), TransitionError> {
        let request = self
            .image
            .as_ref()
            .ok_or(AnalysisError::NoImageSelected)
            .and_then(AnalysisRequest::from_normalized);

        match request {
            Ok(request) => {
                self.state = SessionState::Analyzing;
                Ok((self.generation, request))
            }
            Err(error) => {
                self.state = SessionState::Resolved(Err(error.clone()));
                Err(TransitionError::Rejected(error))
            }
        }
    }

    fn invalid(&self, event: &'static str) -> TransitionError {
        TransitionError::Invalid {
            state: self.state.name(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::error::ErrorKind;
    use crate::pipeline::load::{DecodedBitmap, RawImageFile};
    use crate::pipeline::normalize::{normalize, JpegSurface};
    use image::{DynamicImage, RgbImage};

    fn normalized(w: u32, h: u32) -> Normalized {
        let bitmap = DecodedBitmap {
            image: DynamicImage::ImageRgb8(RgbImage::new(w, h)),
            width: w,
            height: h,
            source: RawImageFile::new(vec![0u8; 8], "image/png"),
        };
        normalize(&bitmap, &JpegSurface, &AnalysisConfig::default())
    }

    fn result(text: &str) -> AnalysisResult {
        AnalysisResult {
            text: text.into(),
            duration_ms: 1,
        }
    }

    #[test]
    fn happy_path() {
        let mut s = Session::new();
        assert_eq!(s.state(), &SessionState::Idle);

        let g = s.select(Some("mcq.jpg".into()));
        assert_eq!(s.state(), &SessionState::Loading);
        assert!(s.is_busy());

        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalized(20, 10),
        })
        .unwrap();
        assert_eq!(s.state(), &SessionState::Selected);
        assert_eq!(s.preview().unwrap().width(), 20);

        let (ag, request) = s.begin_analysis().unwrap();
        assert_eq!(ag, g);
        assert_eq!(request.mime(), "image/jpeg");
        assert_eq!(s.state(), &SessionState::Analyzing);

        s.dispatch(SessionEvent::AnalyzeOk {
            generation: g,
            result: result("Answer: B"),
        })
        .unwrap();
        assert_eq!(s.state(), &SessionState::Resolved(Ok(result("Answer: B"))));
        assert!(s.notice().is_none());
    }

    #[test]
    fn analyze_without_image_is_no_image_selected() {
        let mut s = Session::new();
        let err = s.begin_analysis().unwrap_err();
        assert_eq!(err, TransitionError::Rejected(AnalysisError::NoImageSelected));
        assert_eq!(s.notice().unwrap().kind, Some(ErrorKind::NoImageSelected));
    }

    #[test]
    fn decode_failure_resolves_with_error() {
        let mut s = Session::new();
        let g = s.select(Some("broken.jpg".into()));
        s.dispatch(SessionEvent::DecodeFail {
            generation: g,
            error: AnalysisError::Decode {
                detail: "bad".into(),
            },
        })
        .unwrap();
        assert!(s.preview().is_none());
        assert!(s.file_name().is_none());
        assert_eq!(s.state().name(), "Resolved(Err)");
        assert_eq!(
            s.begin_analysis().unwrap_err(),
            TransitionError::Rejected(AnalysisError::NoImageSelected)
        );
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut s = Session::new();
        let a = s.select(Some("a.png".into()));
        s.dispatch(SessionEvent::DecodeOk {
            generation: a,
            normalized: normalized(10, 10),
        })
        .unwrap();
        s.begin_analysis().unwrap();

        let b = s.select(Some("b.png".into()));
        assert!(b > a);

        let outcome = s
            .dispatch(SessionEvent::AnalyzeOk {
                generation: a,
                result: result("from A"),
            })
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Stale {
                event: "AnalyzeOk",
                generation: a
            }
        );
        assert_eq!(s.state(), &SessionState::Loading);
        assert_eq!(s.file_name(), Some("b.png"));
    }

    #[test]
    fn second_analyze_while_in_flight_is_invalid() {
        let mut s = Session::new();
        let g = s.select(None);
        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalized(5, 5),
        })
        .unwrap();
        s.begin_analysis().unwrap();
        assert_eq!(
            s.begin_analysis().unwrap_err(),
            TransitionError::Invalid {
                state: "Analyzing",
                event: "AnalyzeStart"
            }
        );
    }

    #[test]
    fn analyze_while_loading_is_invalid() {
        let mut s = Session::new();
        let g = s.select(None);
        assert_eq!(
            s.begin_analysis().unwrap_err(),
            TransitionError::Invalid {
                state: "Loading",
                event: "AnalyzeStart"
            }
        );
        assert_eq!(s.state(), &SessionState::Loading);

        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalized(5, 5),
        })
        .unwrap();
        match s.dispatch(SessionEvent::AnalyzeStart).unwrap() {
            Outcome::AnalysisStarted { generation, .. } => assert_eq!(generation, g),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(s.state(), &SessionState::Analyzing);
    }

    #[test]
    fn reanalyze_after_resolution() {
        let mut s = Session::new();
        let g = s.select(None);
        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalized(5, 5),
        })
        .unwrap();
        s.begin_analysis().unwrap();
        s.dispatch(SessionEvent::AnalyzeFail {
            generation: g,
            error: AnalysisError::EmptyResult,
        })
        .unwrap();
        assert!(s.begin_analysis().is_ok());
    }

    #[test]
    fn completion_in_wrong_state_is_invalid() {
        let mut s = Session::new();
        let g = s.select(None);
        let err = s
            .dispatch(SessionEvent::AnalyzeOk {
                generation: g,
                result: result("x"),
            })
            .unwrap_err();
        assert!(err.to_string().contains("Loading"));
    }

    #[test]
    fn compressed_notice_only_when_payload_shrank() {
        let mut s = Session::new();
        let g = s.select(None);
        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalized(5, 5),
        })
        .unwrap();
        // 8 source bytes cannot be beaten by a JPEG.
        assert!(s.notice().is_none());

        let bitmap = DecodedBitmap {
            image: DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
            width: 8,
            height: 8,
            source: RawImageFile::new(vec![0u8; 200_000], "image/png"),
        };
        let g = s.select(None);
        s.dispatch(SessionEvent::DecodeOk {
            generation: g,
            normalized: normalize(&bitmap, &JpegSurface, &AnalysisConfig::default()),
        })
        .unwrap();
        let notice = s.notice().expect("compressed notice");
        assert_eq!(notice.title, "Image Compressed");
    }

    #[test]
    fn select_clears_previous_outcome() {
        let mut s = Session::new();
        let g = s.select(None);
        s.dispatch(SessionEvent::DecodeFail {
            generation: g,
            error: AnalysisError::Decode { detail: "x".into() },
        })
        .unwrap();
        let outcome = s.dispatch(SessionEvent::Select { name: None }).unwrap();
        assert_eq!(outcome, Outcome::Selected(g.next()));
        assert!(s.notice().is_none());
    }
}
