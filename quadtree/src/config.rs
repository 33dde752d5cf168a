#[derive(Debug, Clone)]
pub struct Config {
    /// How many payloads a leaf holds before it splits.
    pub node_capacity: usize,
    /// Seed for the pools' probe-start generator. `None` seeds from
    /// entropy; fix it for reproducible layouts in tests.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_capacity: 32,
            seed: None,
        }
    }
}
