//! Parser for the `/news` command payload.
//!
//! Grammar: `"<title>" "<body>" <image reference>`. Quote boundaries are found
//! by a left-to-right scan; a `"` directly preceded by `\` does not close a
//! field. Escapes are not removed from the output.

use serde::Serialize;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("title must start with a double quote")]
    MissingTitleOpenQuote,
    #[error("title is missing its closing double quote")]
    MissingTitleCloseQuote,
    #[error("body must start with a double quote")]
    MissingBodyOpenQuote,
    #[error("body is missing its closing double quote")]
    MissingBodyCloseQuote,
    #[error("image reference is missing after the body")]
    MissingImageRef,
}

impl ParseError {
    /// Stable machine-readable code, used by the HTTP API.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::MissingTitleOpenQuote => "missing_title_open_quote",
            ParseError::MissingTitleCloseQuote => "missing_title_close_quote",
            ParseError::MissingBodyOpenQuote => "missing_body_open_quote",
            ParseError::MissingBodyCloseQuote => "missing_body_close_quote",
            ParseError::MissingImageRef => "missing_image_ref",
        }
    }
}

/// A successfully decoded update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedNews {
    pub title: String,
    pub body: String,
    pub image_ref: String,
}

/// Scanner position; the byte offsets point just past an opening quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeTitle,
    InTitle { start: usize },
    BetweenTitleAndBody,
    InBody { start: usize },
    AfterBody { start: usize },
}

/// Decode a raw `/news` payload into title, body and image reference.
pub fn parse(raw: &str) -> Result<ParsedNews, ParseError> {
    let mut state = ScanState::BeforeTitle;
    let mut title = "";
    let mut body = "";
    let mut prev: Option<char> = None;

    for (idx, ch) in raw.char_indices() {
        let unescaped_quote = ch == '"' && prev != Some('\\');

        state = match state {
            ScanState::BeforeTitle if unescaped_quote => ScanState::InTitle { start: idx + 1 },
            ScanState::InTitle { start } if unescaped_quote => {
                title = &raw[start..idx];
                ScanState::BetweenTitleAndBody
            }
            // the body's opening quote has no escape lookback
            ScanState::BetweenTitleAndBody if ch == '"' => ScanState::InBody { start: idx + 1 },
            ScanState::InBody { start } if unescaped_quote => {
                body = &raw[start..idx];
                ScanState::AfterBody { start: idx + 1 }
            }
            other => other,
        };

        if let ScanState::AfterBody { .. } = state {
            break;
        }
        prev = Some(ch);
    }

    match state {
        ScanState::BeforeTitle => Err(ParseError::MissingTitleOpenQuote),
        ScanState::InTitle { .. } => Err(ParseError::MissingTitleCloseQuote),
        ScanState::BetweenTitleAndBody => Err(ParseError::MissingBodyOpenQuote),
        ScanState::InBody { .. } => Err(ParseError::MissingBodyCloseQuote),
        ScanState::AfterBody { start } => {
            let image_ref = raw[start..].trim();
            if image_ref.is_empty() {
                return Err(ParseError::MissingImageRef);
            }
            Ok(ParsedNews {
                title: title.to_string(),
                body: body.to_string(),
                image_ref: image_ref.to_string(),
            })
        }
    }
}
