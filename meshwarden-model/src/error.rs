use thiserror::Error;

/// Validation-class failures surfaced to callers at the boundary (HTTP 400,
/// config rejection). Never produced by the background loops themselves.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("address is not a valid IPv4/IPv6 literal: {0}")]
    NotAnAddress(String),

    #[error("address {0} is a loopback address and cannot be a member")]
    Loopback(String),

    #[error("address {0} is a link-local address and cannot be a member")]
    LinkLocal(String),

    #[error("address {0} is a multicast address and cannot be a member")]
    Multicast(String),

    #[error("address {0} is unspecified and cannot be a member")]
    Unspecified(String),

    #[error("address {0} is reserved and cannot be a member")]
    Reserved(String),

    #[error("address list must contain between 1 and {max} entries")]
    TooManyAddresses { max: usize },

    #[error("address exceeds maximum length of {max} characters")]
    AddressTooLong { max: usize },
}
