// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! A generational arena - a contiguous growable array type which allows removing
//! from the middle without shifting and therefore without invalidating other indices.
//!
//! A [`Handle`] is a lightweight, `Copy` reference into a [`Pool`]. It carries a
//! generation counter alongside its index so that a stale handle (pointing at a
//! slot that has since been freed and reused) can always be told apart from a
//! handle to the object it was originally created for.

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

const INVALID_GENERATION: u32 = 0;

/// Non-owning reference to an object stored in a [`Pool`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    type_marker: PhantomData<T>,
}

impl<T> Handle<T> {
    pub const NONE: Self = Self {
        index: 0,
        generation: INVALID_GENERATION,
        type_marker: PhantomData,
    };

    pub fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            type_marker: PhantomData,
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn is_none(self) -> bool {
        self.generation == INVALID_GENERATION
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    pub fn transmute<U>(self) -> Handle<U> {
        Handle {
            index: self.index,
            generation: self.generation,
            type_marker: PhantomData,
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NONE
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl<T> Display for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

struct PoolRecord<T> {
    generation: u32,
    payload: Option<T>,
}

/// Contiguous block of fixed-size slots, each either vacant or occupied. Objects
/// are accessed only through a [`Handle`], never through a raw index, so that a
/// handle into a freed-and-reused slot can be detected rather than silently
/// aliasing an unrelated object.
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(free_index) = self.free_stack.pop() {
            let record = &mut self.records[free_index as usize];
            record.payload = Some(payload);
            Handle::new(free_index, record.generation)
        } else {
            let generation = 1;
            self.records.push(PoolRecord {
                generation,
                payload: Some(payload),
            });
            Handle::new((self.records.len() - 1) as u32, generation)
        }
    }

    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        match self.records.get(handle.index() as usize) {
            Some(record) => record.generation == handle.generation() && record.payload.is_some(),
            None => false,
        }
    }

    pub fn borrow(&self, handle: Handle<T>) -> &T {
        self.try_borrow(handle)
            .expect("attempt to borrow an object with an invalid handle")
    }

    pub fn borrow_mut(&mut self, handle: Handle<T>) -> &mut T {
        self.try_borrow_mut(handle)
            .expect("attempt to borrow an object with an invalid handle")
    }

    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        self.records.get(handle.index() as usize).and_then(|r| {
            if r.generation == handle.generation() {
                r.payload.as_ref()
            } else {
                None
            }
        })
    }

    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records.get_mut(handle.index() as usize).and_then(|r| {
            if r.generation == handle.generation() {
                r.payload.as_mut()
            } else {
                None
            }
        })
    }

    /// Frees the object behind the handle. Panics if the handle is stale - callers
    /// that aren't sure should check [`Self::is_valid_handle`] first.
    pub fn free(&mut self, handle: Handle<T>) -> T {
        let index = handle.index() as usize;
        let record = &mut self.records[index];
        assert_eq!(
            record.generation,
            handle.generation(),
            "attempt to free an object with a stale handle"
        );
        let payload = record
            .payload
            .take()
            .expect("attempt to double-free a pool slot");
        record.generation = record.generation.wrapping_add(1).max(1);
        self.free_stack.push(index as u32);
        payload
    }

    pub fn alive_count(&self) -> u32 {
        self.records.iter().filter(|r| r.payload.is_some()).count() as u32
    }

    pub fn total_capacity(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|r| r.payload.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter_map(|r| r.payload.as_mut())
    }

    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|p| (Handle::new(i as u32, r.generation), p))
        })
    }

    pub fn handle_of(&self, predicate: impl Fn(&T) -> bool) -> Option<Handle<T>> {
        self.pair_iter()
            .find(|(_, payload)| predicate(payload))
            .map(|(handle, _)| handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spawn_and_borrow() {
        let mut pool = Pool::new();
        let a = pool.spawn("a");
        let b = pool.spawn("b");
        assert_eq!(*pool.borrow(a), "a");
        assert_eq!(*pool.borrow(b), "b");
    }

    #[test]
    fn stale_handle_detected_after_reuse() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        pool.free(a);
        let b = pool.spawn(2);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(!pool.is_valid_handle(a));
        assert!(pool.is_valid_handle(b));
    }

    #[test]
    fn none_handle_is_never_valid() {
        let pool: Pool<i32> = Pool::new();
        assert!(Handle::<i32>::NONE.is_none());
        assert!(!pool.is_valid_handle(Handle::NONE));
    }
}
