use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Hardware code mapping errors
    #[error("Unknown denomination code: {0}")]
    UnknownDenomination(u8),

    #[error("Unknown bill routing code: {0}")]
    UnknownRouting(u8),

    #[error("Unknown acceptor status code: {0}")]
    UnknownStatus(u8),

    // Operator input errors
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
