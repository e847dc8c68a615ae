//! Error taxonomy for the retrieval core.
//!
//! Every failure a view can observe is one of the four kinds below. The
//! type is `Clone` because one in-flight computation may be awaited by
//! several callers, and each of them gets its own copy of the outcome.

use crate::compute::ComputeError;

/// A tagged failure returned to the view that initiated the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsightsError {
    /// Malformed key inputs. The caller's fault; never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The key was listed but its payload is gone.
    #[error("Analysis {0} is no longer available")]
    NotFound(String),

    /// The durable store could not be reached or returned garbage.
    #[error("Analysis store unavailable: {0}")]
    StoreUnavailable(String),

    /// The external compute service failed, timed out, or sent a bad payload.
    #[error("Analysis computation failed: {0}")]
    ComputeFailed(#[from] ComputeError),
}

pub type InsightsResult<T> = Result<T, InsightsError>;

impl InsightsError {
    /// Whether repeating the same request can succeed.
    ///
    /// A retryable compute failure is still only ever retried by the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InsightsError::StoreUnavailable(_) | InsightsError::ComputeFailed(_)
        )
    }

    /// Short hint telling the user what to do next.
    pub fn next_action(&self) -> &'static str {
        match self {
            InsightsError::InvalidRequest(_) => "Check the app id and region and try again.",
            InsightsError::NotFound(_) => "Nothing to do; run a new analysis if you still need it.",
            InsightsError::StoreUnavailable(_) => "Storage is temporarily unavailable; retry shortly.",
            InsightsError::ComputeFailed(_) => "The analysis service failed; you can retry now.",
        }
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            InsightsError::InvalidRequest(_) => 2,
            InsightsError::NotFound(_) => 3,
            InsightsError::StoreUnavailable(_) => 4,
            InsightsError::ComputeFailed(_) => 5,
        }
    }

    pub(crate) fn store(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        InsightsError::StoreUnavailable(format!("{}: {}", context, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(!InsightsError::InvalidRequest("x".into()).is_retryable());
        assert!(!InsightsError::NotFound("x".into()).is_retryable());
        assert!(InsightsError::StoreUnavailable("x".into()).is_retryable());
        assert!(InsightsError::ComputeFailed(ComputeError::Transport("x".into())).is_retryable());
    }

    #[test]
    fn test_next_action_distinguishes_kinds() {
        let not_found = InsightsError::NotFound("com.ghost;de".into());
        let unavailable = InsightsError::StoreUnavailable("io".into());
        let failed = InsightsError::ComputeFailed(ComputeError::Timeout { seconds: 300 });

        assert_ne!(not_found.next_action(), unavailable.next_action());
        assert_ne!(unavailable.next_action(), failed.next_action());
        assert_eq!(
            not_found.to_string(),
            "Analysis com.ghost;de is no longer available"
        );
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            InsightsError::InvalidRequest(String::new()).exit_code(),
            InsightsError::NotFound(String::new()).exit_code(),
            InsightsError::StoreUnavailable(String::new()).exit_code(),
            InsightsError::ComputeFailed(ComputeError::Malformed(String::new())).exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
