// ref: https://tokio.rs/tokio/topics/shutdown
use tokio::sync::watch;

/// Requests cancellation of a running document (held by the caller)
#[derive(Debug)]
pub struct CancelSignal {
    sender: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn cancel(&self) {
        // no receivers left means nothing is running anymore
        let _ = self.sender.send(true);
        tracing::debug!("cancellation requested");
    }
}

/// Observes cancellation between pages (cloned into each run)
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // receiver keeps the last value after the sender is gone
        drop(sender);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

pub fn create_cancel_pair() -> (CancelSignal, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelSignal { sender }, CancelToken { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let (signal, token) = create_cancel_pair();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        signal.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn test_cancel_after_token_dropped() {
        let (signal, token) = create_cancel_pair();
        drop(token);
        signal.cancel();
    }
}
