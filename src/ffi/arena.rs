//! Output buffers handed to C callers. A buffer stays owned by this library until the caller
//! gives it back through the matching release function.

use std::{
    collections::HashMap,
    ffi::c_int,
    ptr,
    sync::{LazyLock, Mutex, PoisonError},
};

pub static INT_ARRAYS: LazyLock<Arena<c_int>> = LazyLock::new(Arena::default);
pub static DOUBLE_ARRAYS: LazyLock<Arena<f64>> = LazyLock::new(Arena::default);

/// Live buffers keyed by their address.
#[derive(Debug)]
pub struct Arena<T> {
    buffers: Mutex<HashMap<usize, Box<[T]>>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena {
            buffers: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Arena<T> {
    /// Keeps the data alive and returns a pointer to it. Empty data gives a null pointer.
    pub fn store(&self, data: Vec<T>) -> *mut T {
        if data.is_empty() {
            return ptr::null_mut();
        }
        let mut data = data.into_boxed_slice();
        let pointer = data.as_mut_ptr();
        self.lock().insert(pointer as usize, data);
        pointer
    }

    /// Frees a buffer previously returned by `store`.
    /// Returns false for pointers this arena doesn't own.
    pub fn release(&self, pointer: *mut T) -> bool {
        self.lock().remove(&(pointer as usize)).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Box<[T]>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl<T> Arena<T> {
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
