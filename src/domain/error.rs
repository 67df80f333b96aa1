//! Domain error types.

/// Top-level error type for adaptrader.
///
/// Per-candidate numerical problems during an optimization sweep are not
/// errors; the optimizer records them as rejections. Only data-level and
/// space-level failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum AdaptraderError {
    #[error("insufficient data: have {bars} bars, need at least {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("invalid parameter set: {reason}")]
    InvalidParameterSet { reason: String },

    #[error("parameter space too large: {combinations} combinations exceeds ceiling of {ceiling}")]
    ParameterSpaceTooLarge { combinations: u64, ceiling: u64 },

    #[error("unknown strategy '{name}'")]
    UnknownStrategy { name: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AdaptraderError {
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        AdaptraderError::InvalidParameterSet {
            reason: reason.into(),
        }
    }
}

impl From<&AdaptraderError> for std::process::ExitCode {
    fn from(err: &AdaptraderError) -> Self {
        let code: u8 = match err {
            AdaptraderError::Io(_) => 1,
            AdaptraderError::ConfigParse { .. }
            | AdaptraderError::ConfigMissing { .. }
            | AdaptraderError::ConfigInvalid { .. } => 2,
            AdaptraderError::Data { .. } => 3,
            AdaptraderError::InvalidParameterSet { .. }
            | AdaptraderError::ParameterSpaceTooLarge { .. }
            | AdaptraderError::UnknownStrategy { .. } => 4,
            AdaptraderError::InsufficientData { .. } => 5,
            AdaptraderError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
