//! Single-slot mailboxes between interrupt contexts.
//!
//! A mailbox hands out exactly one [`Writer`], so each slot has a single
//! producer no matter how many [`Reader`]s copy out of it. Readers always see
//! the last complete value; nothing is queued.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub struct Mailbox<T> {
    slot: Mutex<CriticalSectionRawMutex, Cell<T>>,
    split: AtomicBool,
}

impl<T: Copy> Mailbox<T> {
    pub const fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(Cell::new(initial)),
            split: AtomicBool::new(false),
        }
    }

    /// Returns the writer and a reader. Only the first call succeeds.
    pub fn split(&self) -> Option<(Writer<'_, T>, Reader<'_, T>)> {
        if self.split.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((Writer { mailbox: self }, Reader { mailbox: self }))
    }

    fn load(&self) -> T {
        self.slot.lock(Cell::get)
    }
}

pub struct Writer<'a, T> {
    mailbox: &'a Mailbox<T>,
}

impl<T: Copy> Writer<'_, T> {
    pub fn publish(&mut self, value: T) {
        self.mailbox.slot.lock(|slot| slot.set(value));
    }

    pub fn latest(&self) -> T {
        self.mailbox.load()
    }
}

pub struct Reader<'a, T> {
    mailbox: &'a Mailbox<T>,
}

impl<T> Clone for Reader<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Reader<'_, T> {}

impl<T: Copy> Reader<'_, T> {
    pub fn latest(&self) -> T {
        self.mailbox.load()
    }
}
