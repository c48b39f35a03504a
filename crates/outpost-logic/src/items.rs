//! Items and item stacks.
//!
//! Items of one type are interchangeable, so a stack is just a type, a count
//! and the per-type maximum. Merging a stack into another moves as many items
//! as fit and hands back the rest; stacks of different types never merge.

use serde::{Deserialize, Serialize};

pub const TOMATO: &str = "Tomato";

/// An item prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub max_stack_size: u32,
}

impl Item {
    pub fn new(name: impl Into<String>, max_stack_size: u32) -> Self {
        Self {
            name: name.into(),
            max_stack_size: max_stack_size.max(1),
        }
    }

    pub fn tomato(max_stack_size: u32) -> Self {
        Self::new(TOMATO, max_stack_size)
    }
}

/// A non-empty pile of identical items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    item_type: String,
    count: u32,
    max_size: u32,
}

impl ItemStack {
    /// A stack holding a single `item`.
    pub fn new(item: &Item) -> Self {
        Self {
            item_type: item.name.clone(),
            count: 1,
            max_size: item.max_stack_size,
        }
    }

    /// A stack of `count` items, clamped to `1..=max_stack_size`.
    pub fn with_count(item: &Item, count: u32) -> Self {
        Self {
            item_type: item.name.clone(),
            count: count.clamp(1, item.max_stack_size),
            max_size: item.max_stack_size,
        }
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.max_size
    }

    pub fn space_left(&self) -> u32 {
        self.max_size.saturating_sub(self.count)
    }

    pub fn same_type(&self, other: &ItemStack) -> bool {
        self.item_type == other.item_type
    }

    /// Add one item; false when the type differs or the stack is full.
    pub fn add_item(&mut self, item: &Item) -> bool {
        if item.name != self.item_type || self.is_full() {
            return false;
        }
        self.count += 1;
        true
    }

    /// Take one item off the stack. Returns the item and whether the stack
    /// is now depleted.
    pub fn take(&mut self) -> Option<(Item, bool)> {
        if self.count == 0 {
            return None;
        }
        self.count -= 1;
        Some((
            Item::new(self.item_type.clone(), self.max_size),
            self.count == 0,
        ))
    }

    /// Merge `other` into this stack. Returns what did not fit, or `other`
    /// unchanged when the types differ.
    pub fn merge_into(&mut self, mut other: ItemStack) -> Option<ItemStack> {
        if !self.same_type(&other) {
            return Some(other);
        }
        let moved = other.count.min(self.space_left());
        self.count += moved;
        other.count -= moved;
        if other.count == 0 {
            None
        } else {
            Some(other)
        }
    }

    /// What [`merge_into`](Self::merge_into) would return, without mutating
    /// either stack.
    pub fn merge_result(&self, other: &ItemStack) -> Option<ItemStack> {
        self.clone().merge_into(other.clone())
    }
}
