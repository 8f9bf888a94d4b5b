/// The error returned by strict lookups when the requested key is not present.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("key not found")]
pub struct KeyError;
