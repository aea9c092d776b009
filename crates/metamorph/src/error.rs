//! Errors raised while configuring mappers and converting values.

/// Errors that can occur while configuring a mapper or converting a value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MapError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no conversion from `{from}` to `{to}`: {reason}")]
    Unsupported {
        from: String,
        to: String,
        reason: String,
    },

    #[error("cannot parse {input:?} as `{shape}`: {message}")]
    Parse {
        shape: String,
        input: String,
        message: String,
    },

    #[error("conversion from `{from}` to `{to}` failed: {message}")]
    Conversion {
        from: String,
        to: String,
        message: String,
    },

    #[error("expected a value of shape `{expected}`, found {found}")]
    ValueMismatch { expected: String, found: String },

    #[error("member `{member}`: {inner}")]
    Member {
        member: String,
        #[source]
        inner: Box<MapError>,
    },

    #[error("failed to load profile: {0}")]
    Profile(String),
}

impl MapError {
    pub fn configuration(message: impl Into<String>) -> Self {
        MapError::Configuration(message.into())
    }

    pub fn unsupported(
        from: impl ToString,
        to: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        MapError::Unsupported {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conversion(from: impl ToString, to: impl ToString, message: impl Into<String>) -> Self {
        MapError::Conversion {
            from: from.to_string(),
            to: to.to_string(),
            message: message.into(),
        }
    }

    pub fn mismatch(expected: impl ToString, found: &crate::Value) -> Self {
        MapError::ValueMismatch {
            expected: expected.to_string(),
            found: found.describe(),
        }
    }

    /// Attach a member name to an error raised while copying that member.
    pub fn in_member(self, member: impl Into<String>) -> Self {
        MapError::Member {
            member: member.into(),
            inner: Box::new(self),
        }
    }

    /// Innermost error, skipping member context.
    pub fn root(&self) -> &MapError {
        match self {
            MapError::Member { inner, .. } => inner.root(),
            other => other,
        }
    }
}

pub type Result<T, E = MapError> = std::result::Result<T, E>;
