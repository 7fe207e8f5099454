pub mod request;
pub mod response;

use serde::{Deserialize, Serialize};

/// Value of the `type` field shared by outbound and inbound chat frames.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    /// Help-desk staff answering a user
    Reply,
    /// A user writing to the help desk
    Help,
    /// One user writing to another
    Direct,
    /// Any type this crate does not know about
    #[serde(other)]
    Unknown,
}
