use std::{sync::Arc, time::Duration};

use bevy::{
    log::debug,
    math::Vec3,
    platform::time::Instant,
    prelude::*,
    tasks::{
        AsyncComputeTaskPool,
        Task,
        TaskPool,
        block_on,
        futures_lite::future,
    },
};
use static_assertions::assert_cfg;

use crate::camera::CameraPose;


#[cfg(feature = "sort_counting")]
pub mod counting;

#[cfg(feature = "sort_rayon")]
pub mod rayon;

#[cfg(feature = "sort_std")]
pub mod std_sort;


pub const DEFAULT_BUCKET_COUNT: usize = 65_536;


assert_cfg!(
    any(
        feature = "sort_counting",
        feature = "sort_std",
    ),
    "no sort mode enabled",
);


#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Reflect,
)]
pub enum SortMode {
    None,

    #[cfg(feature = "sort_counting")]
    Counting,

    #[cfg(feature = "sort_std")]
    Std,
}

impl Default for SortMode {
    #[allow(unreachable_code)]
    fn default() -> Self {
        #[cfg(feature = "sort_counting")]
        return Self::Counting;

        #[cfg(feature = "sort_std")]
        return Self::Std;

        Self::None
    }
}


/// Where a sort runs once it is due.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Reflect)]
pub enum SortExecution {
    #[default]
    Background,
    Inline,
}


#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct SortConfig {
    pub mode: SortMode,
    pub execution: SortExecution,
    pub bucket_count: usize,
    pub translation_epsilon: f32,
    pub rotation_epsilon: f32,
    /// lower bound of the adaptive period between two sorts
    pub min_period: Duration,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            mode: SortMode::default(),
            execution: SortExecution::default(),
            bucket_count: DEFAULT_BUCKET_COUNT,
            translation_epsilon: 1e-3,
            rotation_epsilon: 1e-3,
            min_period: Duration::ZERO,
        }
    }
}


/// A far-to-near draw order over `[0, len)`. Never mutated after publication.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortOrder {
    indices: Vec<u32>,
    version: u64,
    pose: Option<CameraPose>,
}

impl SortOrder {
    pub fn identity(count: usize) -> Self {
        Self {
            indices: (0..count as u32).collect(),
            ..Default::default()
        }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pose(&self) -> Option<&CameraPose> {
        self.pose.as_ref()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.indices.as_slice())
    }

    pub fn is_permutation_of(&self, count: usize) -> bool {
        if self.indices.len() != count {
            return false;
        }

        let mut seen = vec![false; count];
        self.indices.iter().all(|&index| {
            let index = index as usize;
            index < count && !std::mem::replace(&mut seen[index], true)
        })
    }
}


pub fn compute_sort_order(
    centers: &[Vec3],
    pose: &CameraPose,
    config: &SortConfig,
) -> Vec<u32> {
    #[cfg(feature = "sort_rayon")]
    let depths = self::rayon::par_depth_keys(centers, pose);

    #[cfg(not(feature = "sort_rayon"))]
    let depths: Vec<f32> = centers.iter().map(|center| pose.depth_of(*center)).collect();

    match config.mode {
        SortMode::None => (0..centers.len() as u32).collect(),

        #[cfg(feature = "sort_counting")]
        SortMode::Counting => self::counting::counting_sort_far_to_near(&depths, config.bucket_count),

        #[cfg(feature = "sort_std")]
        SortMode::Std => self::std_sort::std_sort_far_to_near(&depths),
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Reflect)]
pub enum SortState {
    #[default]
    Idle,
    Sorting,
    Ready,
}


struct InFlightSort {
    task: Task<Vec<u32>>,
    pose: CameraPose,
    count: usize,
    started: Instant,
}


/// Keeps one entry's draw order current with the camera.
///
/// The published order is replaced wholesale, so readers holding an `Arc` to the
/// previous order are never disturbed. A sort already running when a newer pose
/// arrives finishes, publishes, and is then superseded by the next tick.
pub struct DepthSortEngine {
    config: SortConfig,
    state: SortState,
    order: Arc<SortOrder>,
    requested_pose: Option<CameraPose>,
    sorted_for: Option<(CameraPose, usize)>,
    in_flight: Option<InFlightSort>,
    last_sort_time: Option<Instant>,
    period: Duration,
    next_version: u64,
}

impl std::fmt::Debug for DepthSortEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthSortEngine")
            .field("state", &self.state)
            .field("order_len", &self.order.len())
            .field("order_version", &self.order.version)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

impl DepthSortEngine {
    pub fn new(config: SortConfig) -> Self {
        let period = config.min_period;

        Self {
            config,
            state: SortState::Idle,
            order: Arc::new(SortOrder::default()),
            requested_pose: None,
            sorted_for: None,
            in_flight: None,
            last_sort_time: None,
            period,
            next_version: 1,
        }
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    pub fn current_order(&self) -> Arc<SortOrder> {
        Arc::clone(&self.order)
    }

    /// Records the latest camera pose; only the most recent one is ever sorted for.
    pub fn submit_pose(&mut self, pose: CameraPose) {
        self.requested_pose = Some(pose);
    }

    pub fn needs_sort(&self, pose: &CameraPose, count: usize) -> bool {
        match &self.sorted_for {
            None => true,
            Some((sorted_pose, sorted_count)) => {
                *sorted_count != count
                    || pose.moved_beyond(
                        sorted_pose,
                        self.config.translation_epsilon,
                        self.config.rotation_epsilon,
                    )
            }
        }
    }

    /// Runs once per frame. Collects a finished background sort, keeps the published
    /// order covering `count` splats, and starts a new sort when the pose or count
    /// moved. Returns true when a new order was published.
    pub fn tick(
        &mut self,
        count: usize,
        centers: impl FnOnce() -> Vec<Vec3>,
    ) -> bool {
        let mut published = self.poll_in_flight(count);

        if self.order.len() < count {
            let indices = self.order.indices.clone();
            let pose = self.order.pose;
            self.publish(indices, pose, count);
            published = true;
        }

        if self.in_flight.is_some() {
            return published;
        }

        let Some(pose) = self.requested_pose else {
            return published;
        };

        if !self.needs_sort(&pose, count) {
            return published;
        }

        if let Some(last_sort_time) = self.last_sort_time {
            if last_sort_time.elapsed() < self.period {
                return published;
            }
        }

        let started = Instant::now();
        self.last_sort_time = Some(started);

        if count == 0 {
            self.sorted_for = Some((pose, 0));
            self.publish(Vec::new(), Some(pose), 0);
            return true;
        }

        let centers = centers();
        let config = self.config.clone();

        match self.config.execution {
            SortExecution::Inline => {
                self.state = SortState::Sorting;
                let indices = compute_sort_order(&centers, &pose, &config);
                self.sorted_for = Some((pose, count));
                self.publish(indices, Some(pose), count);
                self.adapt_period(started.elapsed());
                true
            }
            SortExecution::Background => {
                let pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
                let task = pool.spawn(async move {
                    compute_sort_order(&centers, &pose, &config)
                });

                self.state = SortState::Sorting;
                self.in_flight = Some(InFlightSort {
                    task,
                    pose,
                    count,
                    started,
                });
                published
            }
        }
    }

    /// Drops any running sort and the published order.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.sorted_for = None;
        self.last_sort_time = None;
        self.publish(Vec::new(), None, 0);
        self.state = SortState::Idle;
    }

    fn poll_in_flight(&mut self, count: usize) -> bool {
        let finished = self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.task.is_finished());
        if !finished {
            return false;
        }

        let Some(mut in_flight) = self.in_flight.take() else {
            return false;
        };
        let Some(indices) = block_on(future::poll_once(&mut in_flight.task)) else {
            return false;
        };

        if in_flight.count > count {
            // sorted against a longer asset than the current one
            self.state = SortState::Idle;
            return false;
        }

        self.sorted_for = Some((in_flight.pose, in_flight.count));
        self.publish(indices, Some(in_flight.pose), count);
        self.adapt_period(in_flight.started.elapsed());
        true
    }

    fn publish(
        &mut self,
        mut indices: Vec<u32>,
        pose: Option<CameraPose>,
        count: usize,
    ) {
        // splats decoded after the sort started draw last until the next sort
        let sorted = indices.len();
        indices.extend(sorted as u32..count as u32);

        self.order = Arc::new(SortOrder {
            indices,
            version: self.next_version,
            pose,
        });
        self.next_version += 1;
        self.state = if self.in_flight.is_some() {
            SortState::Sorting
        } else {
            SortState::Ready
        };
    }

    fn adapt_period(&mut self, elapsed: Duration) {
        self.period = (self.period * 4 / 5)
            .max(elapsed * 4)
            .max(self.config.min_period);

        debug!("sort took {:?}, next sort period {:?}", elapsed, self.period);
    }
}


#[derive(Default)]
pub struct SortPlugin;

impl Plugin for SortPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SortMode>();
        app.register_type::<SortState>();
    }
}
