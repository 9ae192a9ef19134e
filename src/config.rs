use serde::{Deserialize, Serialize};

/// Default window radius (`r` in the spec): offsets and the inside region
/// are derived from this.
pub const DEFAULT_WINDOW_RADIUS: u32 = 4;
pub const DEFAULT_MAX_TREE_DEPTH: u16 = 8;
pub const DEFAULT_TESTOBJECT_TRIES: u32 = 200;
pub const DEFAULT_FOREST_SIZE: u16 = 20;
pub const DEFAULT_PAIRWISE_ENERGY: f64 = 10.0;
pub const DEFAULT_THREAD_COUNT: usize = 1;

/// Side of a structuring element used for hard-negative-mining dilation.
pub const DILATION_SIZE: i32 = 15;

/// Number of Gibbs sweeps to accumulate statistics over, after burn-in.
pub const GIBBS_SWEEPS: u32 = 2000;
/// Number of initial sweeps discarded before accumulating statistics.
pub const GIBBS_BURN_IN: u32 = 10;

/// Cap on split-proposal retries inside `build_inner_node` before falling
/// back to a leaf (the §9 "SplitRetryLimit" redesign: the original has no
/// bound and can spin forever on indistinguishable samples).
pub const SPLIT_RETRY_MULTIPLIER: u32 = 10;

/// Cap on background-draw retries during hard-negative mining (§9, last open
/// question) before falling back to marking every background pixel.
pub const BACKGROUND_DRAW_RETRY_LIMIT: u32 = 100_000;

/// Which exact-vs-approximate MRF inference method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceMethod {
    MaxFlow,
    Gibbs,
}

impl std::str::FromStr for InferenceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maxflow" => Ok(InferenceMethod::MaxFlow),
            "gibbs" => Ok(InferenceMethod::Gibbs),
            other => Err(format!("unknown inference method {other:?}, expected \"maxflow\" or \"gibbs\"")),
        }
    }
}

/// Hyperparameters threaded explicitly through training and inference,
/// replacing the original's process-wide globals (see DESIGN.md: "Process-
/// wide state").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub forest_size: u16,
    pub max_tree_depth: u16,
    pub testobject_tries: u32,
    pub window_radius: u32,
    pub thread_count: usize,
    /// Seed for per-worker PRNGs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            forest_size: DEFAULT_FOREST_SIZE,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            testobject_tries: DEFAULT_TESTOBJECT_TRIES,
            window_radius: DEFAULT_WINDOW_RADIUS,
            thread_count: DEFAULT_THREAD_COUNT,
            seed: None,
        }
    }
}

/// Parameters specific to a single inference call. The remaining
/// hyperparameters (tree depth, window radius, ...) are recovered from the
/// forest file's header, per §6.
#[derive(Debug, Clone, Copy)]
pub struct InferenceConfig {
    pub pairwise_energy: f64,
    pub method: InferenceMethod,
}

impl InferenceConfig {
    pub fn pairwise_factor(&self) -> f64 {
        (-self.pairwise_energy).exp()
    }
}
