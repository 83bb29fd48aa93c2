use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    /// The run was deliberately aborted from inside the step loop or a
    /// listener hook. Carries the user-facing cause.
    #[error("Simulation aborted: {cause}")]
    Abort { cause: AbortCause },

    /// A numerical problem made further stepping meaningless.
    #[error("Calculation error at t={time:.3}s: {message}")]
    Calculation { time: f64, message: String },

    /// A listener failed in a way that must stop the run.
    #[error("Listener '{name}' failed: {message}")]
    Listener { name: String, message: String },

    /// The run was cancelled cooperatively between steps.
    #[error("Simulation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Why a run refused to simulate or stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortCause {
    NoActiveStages,
    NoMotorsDefined,
    NoIgnition,
    TooManySteps,
}

impl std::fmt::Display for AbortCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoActiveStages => "no active stages in configuration",
            Self::NoMotorsDefined => "no motors defined",
            Self::NoIgnition => "no motor ignited",
            Self::TooManySteps => "step limit exceeded",
        };
        f.write_str(s)
    }
}
