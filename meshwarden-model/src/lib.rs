pub mod address;
pub mod client;
pub mod error;

pub use address::validate_member_address;
pub use client::{ClientRecord, ClientStats, Classification, StoredClient};
pub use error::ModelError;
