/// Result alias used by every engine operation and callback.
pub type MissionResult<T> = Result<T, MissionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissionError {
    #[error("another mission operation is in progress")]
    Busy,
    #[error("mission operation failed")]
    Error,
    #[error("too many mission items for the vehicle")]
    TooManyMissionItems,
    #[error("mission operation timed out")]
    Timeout,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("unsupported mission item or parameter")]
    Unsupported,
    #[error("no mission available on the vehicle")]
    NoMissionAvailable,
    #[error("failed to open mission plan file")]
    FailedToOpenPlan,
    #[error("failed to parse mission plan file")]
    FailedToParsePlan,
}
