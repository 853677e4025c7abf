// Copyright @yucwang 2026

use std::fmt;

/// Coarse failure category consumed by the host UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Resource,
    Io,
}

#[derive(Debug)]
pub enum RenderError {
    /// Invalid or out-of-range parameter combination.
    Config { parameter: String, value: String, reason: String },
    /// Photon map budget exhausted, acceleration structure failure, ...
    Resource(String),
    /// Output sink or scene file failure.
    Io { path: String, source: std::io::Error },
}

pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    pub fn config<P: Into<String>, V: ToString, R: Into<String>>(parameter: P, value: V, reason: R) -> Self {
        RenderError::Config { parameter: parameter.into(), value: value.to_string(), reason: reason.into() }
    }

    pub fn resource<S: Into<String>>(reason: S) -> Self {
        RenderError::Resource(reason.into())
    }

    pub fn io<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        RenderError::Io { path: path.into(), source }
    }

    /// Wraps foreign encoder errors (image, exr, quick-xml) as an IO failure.
    pub fn io_message<P: Into<String>, M: ToString>(path: P, message: M) -> Self {
        RenderError::Io {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, message.to_string()),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::Config { .. } => ErrorCategory::Config,
            RenderError::Resource(_) => ErrorCategory::Resource,
            RenderError::Io { .. } => ErrorCategory::Io,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config { parameter, value, reason } => {
                write!(f, "config error: {} = '{}': {}", parameter, value, reason)
            }
            RenderError::Resource(reason) => write!(f, "resource error: {}", reason),
            RenderError::Io { path, source } => write!(f, "io error: {}: {}", path, source),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io { path: String::new(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_parameter() {
        let err = RenderError::config("gs_threads", 0, "thread count resolved to zero");
        assert_eq!(err.category(), ErrorCategory::Config);
        let text = err.to_string();
        assert!(text.contains("gs_threads"));
        assert!(text.contains("'0'"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;
        let err = RenderError::io("out.png", std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert_eq!(err.category(), ErrorCategory::Io);
        assert!(err.source().is_some());
    }
}
