//! Configuration consumed by [`crate::handler::Handler`]. The core does not
//! load this from a file or CLI flags -- an outer process supervisor (out of
//! scope) is expected to populate it.

use std::time::Duration;

/// Tunables for the server core. Defaults match spec.md §3's stated values.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    /// Whether this server advertises/requires message signing. Signing
    /// itself (computing/verifying signatures) is out of scope for this
    /// core; this only gates the `security_mode`/flag bits it reports.
    pub signing_required: bool,
    /// How long a [`crate::session::PendingAuth`] record may live before the
    /// sweep task evicts it (Open Question #1 in spec.md §9).
    pub pending_auth_ttl: Duration,
    pub pending_auth_sweep_interval: Duration,
    /// Upper bound on requests a single connection worker may have
    /// in flight at once (spec.md §5's "bounded semaphore per connection").
    pub max_inflight_per_connection: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            max_transact_size: 65536,
            max_read_size: 65536,
            max_write_size: 65536,
            signing_required: false,
            pending_auth_ttl: Duration::from_secs(60),
            pending_auth_sweep_interval: Duration::from_secs(15),
            max_inflight_per_connection: 32,
        }
    }
}
