use thiserror::Error;

use super::models::SearchParams;

/// Longest accepted search term, in characters
pub const MAX_TERM_CHARS: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum QueryValidationError {
    #[error("term must not be empty")]
    EmptyTerm,
    #[error("term exceeds 256 characters")]
    TermTooLong,
    #[error("limit must be greater than zero")]
    ZeroLimit,
    #[error("timestamps must not be negative")]
    NegativeTimestamp,
    #[error("start ({start}) is after end ({end})")]
    InvertedWindow { start: i64, end: i64 },
}

pub fn validate_search(params: &SearchParams) -> Result<(), QueryValidationError> {
    let term = params.term.trim();
    if term.is_empty() {
        return Err(QueryValidationError::EmptyTerm);
    }
    if term.chars().count() > MAX_TERM_CHARS {
        return Err(QueryValidationError::TermTooLong);
    }

    if params.limit == Some(0) {
        return Err(QueryValidationError::ZeroLimit);
    }

    if params.start.is_some_and(|t| t < 0) || params.end.is_some_and(|t| t < 0) {
        return Err(QueryValidationError::NegativeTimestamp);
    }

    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start > end {
            return Err(QueryValidationError::InvertedWindow { start, end });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(term: &str) -> SearchParams {
        SearchParams {
            category: "ERROR".into(),
            term: term.into(),
            start: None,
            end: None,
            limit: None,
            cursor: None,
            merge: false,
        }
    }

    #[test]
    fn test_valid_params() {
        assert!(validate_search(&params("database timeout")).is_ok());
    }

    #[test]
    fn test_term_bounds() {
        assert_eq!(
            validate_search(&params("  ")),
            Err(QueryValidationError::EmptyTerm)
        );
        assert_eq!(
            validate_search(&params(&"x".repeat(MAX_TERM_CHARS + 1))),
            Err(QueryValidationError::TermTooLong)
        );
    }

    #[test]
    fn test_limit_and_window() {
        let mut p = params("quota");
        p.limit = Some(0);
        assert_eq!(validate_search(&p), Err(QueryValidationError::ZeroLimit));

        let mut p = params("quota");
        p.start = Some(-5);
        assert_eq!(
            validate_search(&p),
            Err(QueryValidationError::NegativeTimestamp)
        );

        let mut p = params("quota");
        p.start = Some(2000);
        p.end = Some(1000);
        assert_eq!(
            validate_search(&p),
            Err(QueryValidationError::InvertedWindow {
                start: 2000,
                end: 1000
            })
        );
    }
}
