//! Two-phase optimistic projection.

/// Local projection of one record with explicit reconciliation.
///
/// A UI applies its own write immediately (`apply_local`), then reconciles
/// when the authoritative echo comes back through the subscription
/// (`observe_echo`). Divergence resolves by last-writer-wins on the store
/// timestamp, the same rule the store itself applies, so the projection can
/// never disagree with what the store will converge to.
#[derive(Debug, Clone, Default)]
pub struct OptimisticCell<T> {
    confirmed: Option<(u64, T)>,
    pending: Option<(u64, T)>,
}

impl<T: Clone> OptimisticCell<T> {
    /// Empty cell.
    pub fn new() -> Self {
        Self {
            confirmed: None,
            pending: None,
        }
    }

    /// Phase one: apply a local write before the store confirms it.
    pub fn apply_local(&mut self, timestamp_ms: u64, value: T) {
        self.pending = Some((timestamp_ms, value));
    }

    /// Phase two: reconcile with a write observed through the subscription.
    ///
    /// The echo settles into the confirmed state by last-writer-wins; a
    /// pending local write is released once an echo at or past its
    /// timestamp arrives - either its own echo, or a remote write that
    /// out-timestamped it and won.
    pub fn observe_echo(&mut self, timestamp_ms: u64, value: T) {
        match &self.confirmed {
            Some((confirmed_ts, _)) if *confirmed_ts >= timestamp_ms => {}
            _ => self.confirmed = Some((timestamp_ms, value)),
        }
        if let Some((pending_ts, _)) = &self.pending {
            if timestamp_ms >= *pending_ts {
                self.pending = None;
            }
        }
    }

    /// The value to render: the pending local write while it is newer than
    /// anything confirmed, the confirmed value otherwise.
    pub fn current(&self) -> Option<&T> {
        match (&self.pending, &self.confirmed) {
            (Some((pending_ts, pending)), Some((confirmed_ts, _))) => {
                if pending_ts > confirmed_ts {
                    Some(pending)
                } else {
                    self.confirmed.as_ref().map(|(_, v)| v)
                }
            }
            (Some((_, pending)), None) => Some(pending),
            (None, Some((_, confirmed))) => Some(confirmed),
            (None, None) => None,
        }
    }

    /// Whether a local write is still awaiting its echo.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
