use log::warn;

/// Stride of the nearest-feature transform in coarse mode.
pub const DEFAULT_COARSE_STRIDE: u32 = 8;
/// Vertex spacing used when the region map is coarse.
pub const DEFAULT_COARSE_VECTORIZE_DISTANCE: u32 = 4;
/// Vertex spacing used when the region map is full resolution.
pub const DEFAULT_FINE_VECTORIZE_DISTANCE: u32 = 20;
/// Smallest vertex spacing the vectorizer accepts from configuration.
pub const MIN_VECTORIZE_DISTANCE: u32 = 4;

/// Options for the phase 1 stochastic relocation of seam vertices.
#[derive(Debug, Clone)]
pub struct AnnealOptions {
    /// Number of temperature steps.
    pub kmax: u32,
    /// Maximum distance, in cost-field pixels, a vertex may travel from where it started.
    pub radius: u32,
    /// Random candidate positions offered to each vertex per step.
    pub candidates: u32,
    /// Starting temperature; it falls linearly to zero over `kmax` steps.
    pub initial_temperature: f64,
    /// Seed for the random number generator.
    pub seed: u64,
}

impl Default for AnnealOptions {
    fn default() -> Self {
        Self {
            kmax: 32,
            radius: 4,
            candidates: 8,
            initial_temperature: 64.0,
            seed: 0,
        }
    }
}

impl AnnealOptions {
    /// Set the number of temperature steps.
    pub fn with_kmax(mut self, kmax: u32) -> Self {
        self.kmax = kmax;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Options describing how the seam between two footprints is found.
#[derive(Debug, Clone)]
pub struct SeamOptions {
    /// Run the nearest-feature transform on a subsampled grid.
    pub coarse: bool,
    /// Sampling stride used when `coarse` is set.
    pub coarse_stride: u32,
    /// Relocate and reconnect seam vertices on the mismatch cost field.
    pub optimize: bool,
    /// Arc length between moveable vertices; `None` picks a default for the grid.
    pub vectorize_distance: Option<u32>,
    /// Search margin around each vertex pair for the shortest path.
    pub path_radius: u32,
    pub anneal: AnnealOptions,
}

impl Default for SeamOptions {
    fn default() -> Self {
        Self {
            coarse: true,
            coarse_stride: DEFAULT_COARSE_STRIDE,
            optimize: true,
            vectorize_distance: None,
            path_radius: 25,
            anneal: AnnealOptions::default(),
        }
    }
}

impl SeamOptions {
    /// Enable or disable the coarse nearest-feature transform.
    pub fn with_coarse(mut self, coarse: bool) -> Self {
        self.coarse = coarse;
        self
    }

    /// Enable or disable seam optimization.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Set the vertex spacing.
    pub fn with_vectorize_distance(mut self, distance: Option<u32>) -> Self {
        self.vectorize_distance = distance;
        self
    }

    /// Set the shortest-path search margin.
    pub fn with_path_radius(mut self, radius: u32) -> Self {
        self.path_radius = radius;
        self
    }

    /// Set the annealing options.
    pub fn with_anneal(mut self, anneal: AnnealOptions) -> Self {
        self.anneal = anneal;
        self
    }

    /// Grid stride of the region map.
    pub fn stride(&self) -> u32 {
        if self.coarse {
            self.coarse_stride.max(1)
        } else {
            1
        }
    }

    /// Grid stride of the mismatch cost field.
    pub fn cost_stride(&self) -> u32 {
        if self.coarse { 2 } else { 1 }
    }

    /// Vertex spacing after applying defaults and the lower bound.
    pub fn resolved_vectorize_distance(&self) -> u32 {
        let distance = self.vectorize_distance.unwrap_or(if self.coarse {
            DEFAULT_COARSE_VECTORIZE_DISTANCE
        } else {
            DEFAULT_FINE_VECTORIZE_DISTANCE
        });
        if distance < MIN_VECTORIZE_DISTANCE {
            warn!(
                "vectorize distance {distance} is too small, using {MIN_VECTORIZE_DISTANCE} instead"
            );
            MIN_VECTORIZE_DISTANCE
        } else {
            distance
        }
    }
}

/// Options for a whole compositing run.
#[derive(Debug, Clone)]
pub struct BlendOptions {
    /// Treat the left and right edges of the working area as adjacent.
    pub wraparound: bool,
    /// Requested number of pyramid levels; `None` uses the deepest allowed.
    pub levels: Option<usize>,
    /// Blend every image separately instead of merging non-overlapping images first.
    pub one_at_a_time: bool,
    /// Give each pixel entirely to its highest-weighted image when fusing.
    pub hard_mask: bool,
    /// Worker threads for row-parallel raster work.
    pub threads: Option<usize>,
    pub seam: SeamOptions,
}

impl Default for BlendOptions {
    fn default() -> Self {
        Self {
            wraparound: false,
            levels: None,
            one_at_a_time: true,
            hard_mask: false,
            threads: None,
            seam: SeamOptions::default(),
        }
    }
}

impl BlendOptions {
    /// Create options with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable horizontal wrap-around.
    pub fn with_wraparound(mut self, wraparound: bool) -> Self {
        self.wraparound = wraparound;
        self
    }

    /// Request a number of pyramid levels.
    pub fn with_levels(mut self, levels: Option<usize>) -> Self {
        self.levels = levels;
        self
    }

    /// Blend images one at a time or merge non-overlapping ones first.
    pub fn with_one_at_a_time(mut self, one_at_a_time: bool) -> Self {
        self.one_at_a_time = one_at_a_time;
        self
    }

    /// Enable or disable winner-take-all weights.
    pub fn with_hard_mask(mut self, hard_mask: bool) -> Self {
        self.hard_mask = hard_mask;
        self
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Set the seam options.
    pub fn with_seam(mut self, seam: SeamOptions) -> Self {
        self.seam = seam;
        self
    }
}
