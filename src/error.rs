//! Error taxonomy shared by every engine module.
//!
//! Limiting results such as an infinite NNT or a median survival that is
//! never reached are not errors; they are modelled as explicit variants of
//! the result types that produce them.

/// Errors returned by the statistics engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatError {
    /// Input outside the mathematically valid range, e.g. a probability
    /// outside (0, 1) or a negative odds ratio.
    #[error("domain error: {0}")]
    Domain(String),

    /// Insufficient or inconsistent data for the requested computation,
    /// e.g. fewer than two studies or no discordant pairs.
    #[error("insufficient data: {0}")]
    Data(String),
}

impl StatError {
    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Returns `true` for [`StatError::Domain`].
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    /// Returns `true` for [`StatError::Data`].
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = StatError::domain("p = 1.5 is outside (0, 1)");
        assert_eq!(e.to_string(), "domain error: p = 1.5 is outside (0, 1)");
        assert!(e.is_domain());
        assert!(!e.is_data());

        let e = StatError::data("need at least 2 studies, got 1");
        assert_eq!(e.to_string(), "insufficient data: need at least 2 studies, got 1");
        assert!(e.is_data());
    }
}
