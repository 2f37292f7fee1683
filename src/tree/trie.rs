// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The sparse page tree (spec [MODULE: tree]).
//!
//! A radix-2 trie keyed on a 32-bit page-id, 32 levels deep, with pages
//! allocated lazily the first time a sector within them is written.
//! `PageTree` owns the root behind one [`RwLock`]: lookups that don't
//! need to allocate take the shared side; anything that might need to
//! publish a new [`Link`] takes the exclusive side (spec §5). Once a
//! leaf [`Page`] is reached its own interior [`Mutex`] (see
//! [`crate::tree::page::Page`]) takes over, so the tree lock is never
//! held for the data copy itself.

use crate::concurrent::Shared;
use crate::error::HammingResult;
use crate::tree::cursor::SubtreeCursor;
use crate::tree::node::{Link, Node, PAGE_DEPTH};
use crate::tree::page::Page;
use std::sync::Arc;

pub struct PageTree {
    root: Shared<Node>,
}

impl PageTree {
    pub fn new() -> Self {
        PageTree {
            root: Shared::new(Node::empty()),
        }
    }

    /// Resolve (spec §4.2.2): always walks from the root consuming bits
    /// of `cursor.id` until a page is reached (or a missing link is,
    /// when `create` is false). `cursor.depth` is not a starting point
    /// to resume from — it is asserted equal to [`PAGE_DEPTH`] below as
    /// a precondition, since this crate's one caller, sector addressing,
    /// never needs anything but a full, from-the-root resolution (see
    /// [`SubtreeCursor`]'s doc comment).
    ///
    /// Takes the read lock first even when `create` is true: if the page
    /// already exists (the common case for a page under repeated
    /// writes), the whole call completes without ever taking the write
    /// lock. Only a genuinely missing subtree pays for the exclusive
    /// lock, held just long enough to publish the new links (spec §5).
    pub fn resolve(&self, cursor: SubtreeCursor, create: bool) -> HammingResult<Option<Arc<Page>>> {
        debug_assert_eq!(cursor.depth, PAGE_DEPTH, "this tree only resolves full-depth page lookups");

        if !create {
            let guard = self.root.read();
            return Ok(resolve_readonly(&guard, cursor.id));
        }

        if let Some(page) = {
            let guard = self.root.read();
            resolve_readonly(&guard, cursor.id)
        } {
            return Ok(Some(page));
        }

        let mut guard = self.root.write();
        Ok(Some(resolve_create(&mut guard, cursor.id)))
    }

    /// Batched resolve (spec §4.2.3): resolves up to 8 targets sharing a
    /// starting cursor. This implementation is semantically equal to 8
    /// independent [`PageTree::resolve`] calls but does not additionally
    /// share the physical prefix-walk the original optimizes for —
    /// aliasing into the same subtree from several independent targets
    /// at once is expensive to express safely in Rust, and the payoff is
    /// small for an in-memory trie where every step is a pointer chase
    /// rather than a disk seek.
    pub fn resolve_batch(
        &self,
        targets: &[(SubtreeCursor, bool)],
    ) -> HammingResult<Vec<Option<Arc<Page>>>> {
        debug_assert!(targets.len() <= 8, "batched resolve caps at 8 targets");
        targets
            .iter()
            .map(|&(cursor, create)| self.resolve(cursor, create))
            .collect()
    }
}

impl Default for PageTree {
    fn default() -> Self {
        PageTree::new()
    }
}

fn resolve_readonly(root: &Node, id: u32) -> Option<Arc<Page>> {
    let mut node = root;
    let mut depth = 0u8;
    loop {
        let bit = ((id >> (31 - depth)) & 1) as usize;
        match &node.child[bit] {
            Link::Empty => return None,
            Link::Page(page) => return Some(Arc::clone(page)),
            Link::Node(next) => {
                node = next.as_ref();
                depth += 1;
            }
        }
    }
}

fn resolve_create(root: &mut Node, id: u32) -> Arc<Page> {
    let mut node = root;
    let mut depth = 0u8;
    loop {
        let bit = ((id >> (31 - depth)) & 1) as usize;
        let is_leaf = depth + 1 == PAGE_DEPTH;
        let slot = &mut node.child[bit];
        if slot.is_empty() {
            *slot = if is_leaf {
                Link::Page(Arc::new(Page::new_zeroed()))
            } else {
                Link::Node(Box::new(Node::empty()))
            };
        }
        match slot {
            Link::Page(page) => return Arc::clone(page),
            Link::Node(next) => {
                node = next.as_mut();
                depth += 1;
            }
            Link::Empty => unreachable!("slot was just populated above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_of_unallocated_page_is_none() {
        let tree = PageTree::new();
        let found = tree.resolve(SubtreeCursor::for_page(42), false).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn create_then_lookup_returns_same_page() {
        let tree = PageTree::new();
        let created = tree.resolve(SubtreeCursor::for_page(42), true).unwrap().unwrap();
        let found = tree.resolve(SubtreeCursor::for_page(42), false).unwrap().unwrap();
        assert!(Arc::ptr_eq(&created, &found));
    }

    #[test]
    fn distinct_page_ids_get_distinct_pages() {
        let tree = PageTree::new();
        let a = tree.resolve(SubtreeCursor::for_page(1), true).unwrap().unwrap();
        let b = tree.resolve(SubtreeCursor::for_page(2), true).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn batched_resolve_matches_independent_resolves() {
        let tree = PageTree::new();
        let targets: Vec<_> = (0..8u32)
            .map(|id| (SubtreeCursor::for_page(id), true))
            .collect();
        let batched = tree.resolve_batch(&targets).unwrap();
        assert_eq!(batched.len(), 8);
        for (id, page) in batched.into_iter().enumerate() {
            let individual = tree
                .resolve(SubtreeCursor::for_page(id as u32), false)
                .unwrap()
                .unwrap();
            assert!(Arc::ptr_eq(&page.unwrap(), &individual));
        }
    }

    #[test]
    fn sparse_pages_share_no_siblings() {
        // page-ids that diverge at the very first bit must not allocate
        // through each other's subtree.
        let tree = PageTree::new();
        tree.resolve(SubtreeCursor::for_page(0), true).unwrap();
        let still_missing = tree
            .resolve(SubtreeCursor::for_page(0x8000_0000), false)
            .unwrap();
        assert!(still_missing.is_none());
    }
}
