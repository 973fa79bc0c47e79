use crate::inventory::SeatId;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("seat {seat_id} is not available")]
    SeatUnavailable { seat_id: SeatId },

    #[error("{0} not found")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("invalid payment notification signature")]
    InvalidSignature,

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BookingError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BookingError::Internal(msg.into())
    }
}
