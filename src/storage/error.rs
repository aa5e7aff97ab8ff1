use thiserror::Error;

/// 存储单元的调用错误。
///
/// 容量不足、类型未被分区允许都不是错误，只会体现为接受量变小（0 也是合法结果）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("unknown aspect: {0}")]
    InvalidKind(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("partition of a {0} cell cannot be changed")]
    PartitionLocked(&'static str),
}

impl CellError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable(reason.to_string())
    }
}
