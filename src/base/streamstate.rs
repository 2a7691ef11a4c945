/// Lifecycle of a single exchange, as observed by the adapter.
///
/// Transitions only move forward:
/// `Created -> Activated -> HeadersReceived -> Receiving* -> Completed`.
/// Status arrives while the stream is `Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum StreamState {
    /// The record exists but the engine has not been asked to start it.
    #[default]
    Created,

    /// The engine owns the exchange; no response headers yet.
    Activated,

    /// Status and headers are available.
    HeadersReceived,

    /// At least one body chunk has arrived.
    Receiving,

    /// Completion resolved. Terminal.
    Completed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        self == StreamState::Completed
    }
}
