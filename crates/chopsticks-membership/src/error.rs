use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("only the leader may write to the peer databag")]
    NotLeader,

    #[error("unknown peer databag key: {key}")]
    UnknownKey { key: String },
}
