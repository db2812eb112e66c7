/// Texture cache configuration.
#[derive(Debug, Clone)]
pub struct TextureCacheConfig {
    /// OS thread name of the decode worker.
    pub worker_name: String,

    /// Decoded results uploaded per scheduler tick.
    ///
    /// Each upload stalls the frame it runs in, so the default spreads them
    /// one per tick. Zero is treated as one.
    pub results_per_tick: usize,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            worker_name: "tessel-texture-loader".to_string(),
            results_per_tick: 1,
        }
    }
}
