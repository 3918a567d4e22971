use std::{collections::VecDeque, path::PathBuf};

#[cfg(feature = "headless")]
use hello_ngin::{
    data_structures::handle::AnyHandle,
    headless::{LifecycleEvent, LifecycleLog},
};
use hello_ngin::{
    config::AppConfig, flow::FramePlatform, input::InputState, resources::AssetLoader,
    window::WindowConfig,
};

/// A [`FramePlatform`] replaying a fixed list of framebuffer sizes, one per
/// poll. The close flag is raised by the poll that consumes the last size, so
/// `n` sizes give exactly `n` loop iterations.
pub struct ScriptedPlatform {
    sizes: VecDeque<(u32, u32)>,
    current: (u32, u32),
    close: bool,
    polls: usize,
    input: InputState,
    pixels_per_point: f32,
}

impl ScriptedPlatform {
    pub fn new(sizes: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let sizes: VecDeque<_> = sizes.into_iter().collect();
        let close = sizes.is_empty();
        Self {
            sizes,
            current: (0, 0),
            close,
            polls: 0,
            input: InputState::new(),
            pixels_per_point: 1.0,
        }
    }

    /// Closed before the first iteration.
    pub fn closed() -> Self {
        Self::new([])
    }

    pub fn frames(count: usize, size: (u32, u32)) -> Self {
        Self::new(std::iter::repeat_n(size, count))
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }
}

impl FramePlatform for ScriptedPlatform {
    fn poll_events(&mut self) {
        self.polls += 1;
        if let Some(size) = self.sizes.pop_front() {
            self.current = size;
        }
        if self.sizes.is_empty() {
            self.close = true;
        }
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.current
    }

    fn pixels_per_point(&self) -> f32 {
        self.pixels_per_point
    }

    fn input(&self) -> &InputState {
        &self.input
    }
}

pub fn assets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets")
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::new(WindowConfig::new("test", 960, 540));
    config.assets = assets_dir();
    config
}

pub fn loader() -> AssetLoader {
    AssetLoader::new(assets_dir())
}

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(feature = "headless")]
/// Handles in creation order.
pub fn created(log: &LifecycleLog) -> Vec<AnyHandle> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            LifecycleEvent::Created { handle, .. } => Some(*handle),
            _ => None,
        })
        .collect()
}

#[cfg(feature = "headless")]
/// Handles in destruction order.
pub fn destroyed(log: &LifecycleLog) -> Vec<AnyHandle> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            LifecycleEvent::Destroyed { handle, .. } => Some(*handle),
            _ => None,
        })
        .collect()
}

#[cfg(feature = "headless")]
/// Bytes recorded at creation of the resource called `name`.
pub fn created_bytes(log: &LifecycleLog, name: &str) -> Option<u64> {
    log.borrow().iter().find_map(|event| match event {
        LifecycleEvent::Created {
            name: created, bytes, ..
        } if created == name => Some(*bytes),
        _ => None,
    })
}

#[cfg(feature = "headless")]
/// Every destruction is logged before the context itself goes away, and
/// nothing is left alive.
pub fn assert_all_destroyed_before_context(log: &LifecycleLog) {
    let events = log.borrow();
    let context_at = events
        .iter()
        .position(|e| *e == LifecycleEvent::ContextDestroyed)
        .expect("context was not destroyed");
    assert_eq!(context_at, events.len() - 1, "events after context destruction");
    drop(events);

    let mut created = created(log);
    let mut destroyed = destroyed(log);
    created.sort_by_key(|h| format!("{h:?}"));
    destroyed.sort_by_key(|h| format!("{h:?}"));
    assert_eq!(created, destroyed, "leaked or double-destroyed resources");
}
