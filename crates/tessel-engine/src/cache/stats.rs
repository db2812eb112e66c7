use std::fmt;

/// Snapshot of cache occupancy and loader activity.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Number of cached textures.
    pub textures: usize,
    /// Sum of the cached textures' pixel data, in bytes.
    pub bytes: usize,
    /// Cached textures referenced from outside the cache.
    pub in_use: usize,
    /// Async requests issued but not yet dispatched.
    pub outstanding: usize,
    /// Requests waiting for the decode worker.
    pub queued: usize,
    /// Decoded results waiting for the dispatcher.
    pub ready: usize,
    /// Whether the dispatcher is registered with the scheduler.
    pub dispatching: bool,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} textures ({} in use), {:.2} MiB, {} outstanding ({} queued, {} ready)",
            self.textures,
            self.in_use,
            self.bytes as f64 / (1024.0 * 1024.0),
            self.outstanding,
            self.queued,
            self.ready,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_summarizes() {
        let stats = CacheStats {
            textures: 2,
            bytes: 3 * 1024 * 1024,
            in_use: 1,
            outstanding: 4,
            queued: 3,
            ready: 1,
            dispatching: true,
        };
        assert_eq!(
            stats.to_string(),
            "2 textures (1 in use), 3.00 MiB, 4 outstanding (3 queued, 1 ready)"
        );
    }
}
