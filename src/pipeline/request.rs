//! Request building: validate a data URI before anything touches the network.
//!
//! The accepted grammar is `data:<type>/<subtype>;base64,<encoded_data>`.
//! Each part is checked in order so the error names the first thing that is
//! wrong instead of a generic "does not match".

use crate::error::AnalysisError;
use crate::pipeline::normalize::NormalizedImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// RFC 6838 restricted-name characters for type and subtype.
static RE_MIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*$").unwrap()
});

/// Whether `mime` is a well-formed `type/subtype` with no parameters.
pub(crate) fn is_valid_mime(mime: &str) -> bool {
    RE_MIME.is_match(mime)
}

static RE_BASE64: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").unwrap());

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// A validated request for one photo.
#[derive(Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    data_uri: String,
    mime_end: usize,
    payload_start: usize,
}

impl AnalysisRequest {
    /// Validate `data_uri` against the data-URI grammar.
    ///
    /// # Errors
    /// [`AnalysisError::InvalidRequest`] naming the missing or malformed part.
    pub fn parse(data_uri: impl Into<String>) -> Result<Self, AnalysisError> {
        let data_uri = data_uri.into();

        let rest = data_uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("missing 'data:' prefix"))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid("missing ',' before the encoded data"))?;

        let mime = header
            .strip_suffix(BASE64_MARKER)
            .ok_or_else(|| invalid("missing ';base64' marker"))?;

        if mime.is_empty() {
            return Err(invalid("missing mime type"));
        }
        if !is_valid_mime(mime) {
            return Err(invalid(format!("malformed mime type '{mime}'")));
        }
        if payload.is_empty() {
            return Err(invalid("missing encoded data"));
        }
        if payload.len() % 4 != 0 || !RE_BASE64.is_match(payload) {
            return Err(invalid("encoded data is not valid base64"));
        }

        let mime_end = SCHEME.len() + mime.len();
        let payload_start = data_uri.len() - payload.len();
        Ok(Self {
            data_uri,
            mime_end,
            payload_start,
        })
    }

    /// Build a request from a normalised image.
    pub fn from_normalized(image: &NormalizedImage) -> Result<Self, AnalysisError> {
        Self::parse(image.data_uri())
    }

    pub fn mime(&self) -> &str {
        &self.data_uri[SCHEME.len()..self.mime_end]
    }

    /// The base64 section, without the header.
    pub fn payload(&self) -> &str {
        &self.data_uri[self.payload_start..]
    }

    pub fn as_data_uri(&self) -> &str {
        &self.data_uri
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("mime", &self.mime())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

fn invalid(reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidRequest {
        reason: reason.into(),
    }
}
