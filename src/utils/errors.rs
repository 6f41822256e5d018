use thiserror::Error;

/// `SimulationError` enumerates all possible errors returned by desim
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Represents a configuration parameter that must be positive, but is not
    #[error("parameter `{0}` must be positive")]
    NonPositiveParameter(&'static str),

    /// Represents a supermarket sample size larger than the number of servers
    #[error("the supermarket sample size cannot exceed the number of servers")]
    SampleExceedsServers,

    /// Represents a completion fired for a job that is not running on its queue
    #[error("a completion fired for a job that is not running on its queue")]
    CompletionMismatch,

    /// Represents an invalid model state encountered during event dispatch
    #[error("an invalid model state was encountered")]
    InvalidModelState,

    /// Represents a node class whose reconstruction threshold exceeds its block count
    #[error("node `{0}` was configured with k greater than n")]
    CodingExceedsBlocks(String),

    /// Represents a node without enough storage to hold its own encoded data
    #[error("node `{0}` does not have enough storage for its own data")]
    StorageTooSmall(String),

    /// Represents a transfer that completed while one of its endpoints was offline
    #[error("a transfer completed while one of its endpoints was offline")]
    EndpointOffline,

    /// Represents free-space accounting that went negative on a node
    #[error("free space accounting went negative on node `{0}`")]
    FreeSpaceExhausted(String),

    /// Represents a size string that could not be parsed
    #[error("`{0}` is not a valid size")]
    InvalidSize(String),

    /// Represents a timespan string that could not be parsed
    #[error("`{0}` is not a valid timespan")]
    InvalidTimespan(String),

    /// Represents an attempt to analyze an empty sample
    #[error("cannot analyze an empty sample")]
    EmptySample,

    /// Represents a failed conversion to num-traits Float
    #[error("failed to convert to a Float value")]
    FloatConvError,

    /// Transparent Exponential distribution errors
    #[error(transparent)]
    ExpError(#[from] rand_distr::ExpError),

    /// Transparent Weibull distribution errors
    #[error(transparent)]
    WeibullError(#[from] rand_distr::WeibullError),

    /// Transparent node configuration file errors
    #[error(transparent)]
    ConfigError(#[from] toml::de::Error),
}
