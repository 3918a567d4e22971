//! Typed generational handles and the pool that owns what they point to.
//!
//! Every GPU object handed out by a [`RenderContext`](crate::context::RenderContext)
//! is identified by a [`Handle<K>`]: a slot index plus a generation counter. When
//! a slot is freed its generation is bumped, so an old handle to the same slot
//! becomes stale and every lookup through it fails instead of silently aliasing
//! the new occupant.
//!
//! # Key types
//!
//! - [`Handle<K>`] is a copyable, typed reference into a [`Pool`]
//! - [`Pool<K, T>`] is the slot arena owning the actual resources
//! - [`AnyHandle`] erases the kind so heterogeneous resources can be destroyed
//!   through one entry point

use std::{fmt, hash, marker::PhantomData};

/// Marker trait for resource kinds.
pub trait Kind: Sized + 'static {
    /// Human readable kind name used in log and error messages.
    const NAME: &'static str;

    fn wrap(handle: Handle<Self>) -> AnyHandle;
}

#[derive(Debug)]
pub enum BufferKind {}
#[derive(Debug)]
pub enum TextureKind {}
#[derive(Debug)]
pub enum ShaderModuleKind {}
#[derive(Debug)]
pub enum RenderPipelineKind {}

impl Kind for BufferKind {
    const NAME: &'static str = "buffer";
    fn wrap(handle: Handle<Self>) -> AnyHandle {
        AnyHandle::Buffer(handle)
    }
}

impl Kind for TextureKind {
    const NAME: &'static str = "texture";
    fn wrap(handle: Handle<Self>) -> AnyHandle {
        AnyHandle::Texture(handle)
    }
}

impl Kind for ShaderModuleKind {
    const NAME: &'static str = "shader module";
    fn wrap(handle: Handle<Self>) -> AnyHandle {
        AnyHandle::ShaderModule(handle)
    }
}

impl Kind for RenderPipelineKind {
    const NAME: &'static str = "render pipeline";
    fn wrap(handle: Handle<Self>) -> AnyHandle {
        AnyHandle::RenderPipeline(handle)
    }
}

pub type BufferHandle = Handle<BufferKind>;
pub type TextureHandle = Handle<TextureKind>;
pub type ShaderModuleHandle = Handle<ShaderModuleKind>;
pub type RenderPipelineHandle = Handle<RenderPipelineKind>;

/// A typed index into a [`Pool`].
///
/// Generation `0` is never handed out, so `Handle::null()` can never be live.
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub const fn null() -> Self {
        Self {
            index: 0,
            generation: 0,
            _kind: PhantomData,
        }
    }

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        self.generation == 0
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> hash::Hash for Handle<K> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K> Default for Handle<K> {
    fn default() -> Self {
        Self::null()
    }
}

impl<K: Kind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}v{}", K::NAME, self.index, self.generation)
    }
}

/// A handle of any resource kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    ShaderModule(ShaderModuleHandle),
    RenderPipeline(RenderPipelineHandle),
}

impl AnyHandle {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnyHandle::Buffer(_) => BufferKind::NAME,
            AnyHandle::Texture(_) => TextureKind::NAME,
            AnyHandle::ShaderModule(_) => ShaderModuleKind::NAME,
            AnyHandle::RenderPipeline(_) => RenderPipelineKind::NAME,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            AnyHandle::Buffer(h) => h.is_null(),
            AnyHandle::Texture(h) => h.is_null(),
            AnyHandle::ShaderModule(h) => h.is_null(),
            AnyHandle::RenderPipeline(h) => h.is_null(),
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with generation-checked access.
pub struct Pool<K, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, T> Default for Pool<K, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _kind: PhantomData,
        }
    }
}

impl<K, T> Pool<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> Handle<K> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Handle::new(index, 1)
    }

    fn live_slot(&self, handle: Handle<K>) -> Option<&Slot<T>> {
        if handle.is_null() {
            return None;
        }
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.live_slot(handle).is_some()
    }

    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        self.live_slot(handle).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        if !self.contains(handle) {
            return None;
        }
        self.slots[handle.index as usize].value.as_mut()
    }

    /// Frees the slot and invalidates every outstanding copy of `handle`.
    pub fn remove(&mut self, handle: Handle<K>) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let slot = &mut self.slots[handle.index as usize];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index);
        value
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<K>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(index as u32, generation), value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_never_resolves() {
        let mut pool: Pool<BufferKind, &str> = Pool::new();
        let first = pool.insert("first");
        assert_eq!(first.index(), 0);
        assert!(!first.is_null());
        assert!(pool.get(BufferHandle::null()).is_none());
    }

    #[test]
    fn removed_handle_goes_stale_when_slot_is_reused() {
        let mut pool: Pool<TextureKind, u32> = Pool::new();
        let old = pool.insert(7);
        assert_eq!(pool.remove(old), Some(7));
        assert_eq!(pool.remove(old), None);

        let new = pool.insert(9);
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(pool.get(old).is_none());
        assert_eq!(pool.get(new), Some(&9));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn iteration_skips_free_slots() {
        let mut pool: Pool<ShaderModuleKind, char> = Pool::new();
        let a = pool.insert('a');
        let b = pool.insert('b');
        pool.insert('c');
        pool.remove(b);
        let live: Vec<_> = pool.iter().map(|(h, v)| (h.index(), *v)).collect();
        assert_eq!(live, vec![(a.index(), 'a'), (2, 'c')]);
    }
}
