use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("Invalid time '{0}', expected format %Y-%m-%d %H:%M:%S")]
    InvalidTime(String, #[source] chrono::ParseError),

    #[error("Hour {0} is outside the range 0-23")]
    HourOutOfRange(u32),
}
