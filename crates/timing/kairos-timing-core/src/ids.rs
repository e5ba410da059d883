//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SpecId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstanceTimeId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IntervalId(pub u32);

/// Monotonic allocator for element, specifier, instance-time, and interval ids.
/// Dense indices improve cache locality; ids are opaque externally.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_element: u32,
    next_spec: u32,
    next_instance: u32,
    next_interval: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_element(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element = self.next_element.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_spec(&mut self) -> SpecId {
        let id = SpecId(self.next_spec);
        self.next_spec = self.next_spec.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_instance_time(&mut self) -> InstanceTimeId {
        let id = InstanceTimeId(self.next_instance);
        self.next_instance = self.next_instance.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_interval(&mut self) -> IntervalId {
        let id = IntervalId(self.next_interval);
        self.next_interval = self.next_interval.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
