use thiserror::Error;

/// Errors surfaced by the event pipeline. The projection itself has no error
/// path; everything here happens before an event reaches the store.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("rpc transport error: {0}")]
    Rpc(#[from] reqwest::Error),

    #[error("rpc error response: {0}")]
    RpcResponse(String),

    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),

    /// A log carried a recognized event signature but its payload did not
    /// decode. Unknown signatures are skipped, this is not that case.
    #[error("malformed log data: {0}")]
    Decode(String),

    #[error("pipeline channel closed: {0}")]
    ChannelClosed(String),

    #[error("config error: {0}")]
    Config(String),
}
