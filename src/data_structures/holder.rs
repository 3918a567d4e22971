//! Scope guards for context-owned resources.

use std::fmt;

use crate::{
    context::RenderContext,
    data_structures::handle::{Handle, Kind},
};

/// Owns one resource of a [`RenderContext`] and destroys it when dropped.
///
/// A `Holder` borrows its context, so it can never outlive it. Structs holding
/// several of them should declare the fields in reverse creation order to get
/// reverse-order destruction.
pub struct Holder<'ctx, K: Kind> {
    ctx: &'ctx dyn RenderContext,
    handle: Handle<K>,
}

impl<'ctx, K: Kind> Holder<'ctx, K> {
    pub fn new(ctx: &'ctx dyn RenderContext, handle: Handle<K>) -> Self {
        Self { ctx, handle }
    }

    pub fn handle(&self) -> Handle<K> {
        self.handle
    }

    pub fn index(&self) -> u32 {
        self.handle.index()
    }

    pub fn is_valid(&self) -> bool {
        !self.handle.is_null()
    }
}

impl<K: Kind> Drop for Holder<'_, K> {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            self.ctx.destroy(K::wrap(self.handle));
        }
    }
}

impl<K: Kind> fmt::Debug for Holder<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Holder").field(&self.handle).finish()
    }
}
