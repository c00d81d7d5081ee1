//! Ordered endpoint 0 request handlers.
//!
//! Each entry matches `bmRequestType & mask == pattern`. Entries are offered
//! the request in registration order until one handles or rejects it; a
//! deferred request falls through to the next entry and finally to the
//! standard requests.

use crate::config::MAX_HANDLERS;
use crate::usb::SetupPacket;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Handled,
    /// Not this handler's request after all; try the next one.
    Defer,
    /// Request understood but invalid. Stalls the pipe.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry<H> {
    pattern: u8,
    mask: u8,
    handler: H,
}

pub struct Registry<H> {
    entries: [Option<Entry<H>>; MAX_HANDLERS],
}

impl<H: Copy> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy> Registry<H> {
    pub const fn new() -> Self {
        Self {
            entries: [None; MAX_HANDLERS],
        }
    }

    pub fn register(&mut self, pattern: u8, mask: u8, handler: H) -> Result<(), Error> {
        let slot = self
            .entries
            .iter_mut()
            .find(|entry| entry.is_none())
            .ok_or(Error::RegistryFull)?;
        *slot = Some(Entry {
            pattern,
            mask,
            handler,
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries = [None; MAX_HANDLERS];
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offers `req` to the matching handlers in order. `None` means every
    /// match deferred, or nothing matched.
    pub fn dispatch(
        &self,
        req: &SetupPacket,
        mut call: impl FnMut(H, &SetupPacket) -> Outcome,
    ) -> Option<Outcome> {
        self.entries
            .iter()
            .map_while(|entry| entry.as_ref())
            .filter(|entry| req.request_type & entry.mask == entry.pattern)
            .map(|entry| call(entry.handler, req))
            .find(|outcome| *outcome != Outcome::Defer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::setup::request_type::*;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        A,
        B,
        C,
        D,
    }

    fn vendor_in() -> SetupPacket {
        SetupPacket {
            request_type: IN | VENDOR | DEVICE,
            request: 1,
            value: 0,
            index: 0,
            length: 1,
        }
    }

    #[test]
    fn first_decisive_handler_wins() {
        let mut registry = Registry::new();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::A).unwrap();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::B).unwrap();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::C).unwrap();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::D).unwrap();

        let mut called = Vec::new();
        let outcome = registry.dispatch(&vendor_in(), |tag, _| {
            called.push(tag);
            if tag == Tag::C {
                Outcome::Handled
            } else {
                Outcome::Defer
            }
        });
        assert_eq!(outcome, Some(Outcome::Handled));
        assert_eq!(called, [Tag::A, Tag::B, Tag::C]);
    }

    #[test]
    fn only_matching_masks_are_offered() {
        let mut registry = Registry::new();
        registry.register(OUT | VENDOR | DEVICE, ALL, Tag::A).unwrap();
        registry.register(IN | STANDARD | INTERFACE, ALL, Tag::B).unwrap();
        registry.register(IN | VENDOR, DIRECTION | TYPE, Tag::C).unwrap();

        let mut called = Vec::new();
        let outcome = registry.dispatch(&vendor_in(), |tag, _| {
            called.push(tag);
            Outcome::Error
        });
        assert_eq!(outcome, Some(Outcome::Error));
        assert_eq!(called, [Tag::C]);
    }

    #[test]
    fn deferred_chain_falls_through() {
        let mut registry = Registry::new();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::A).unwrap();
        registry.register(IN | VENDOR | DEVICE, ALL, Tag::B).unwrap();

        let mut calls = 0;
        let outcome = registry.dispatch(&vendor_in(), |_, _| {
            calls += 1;
            Outcome::Defer
        });
        assert_eq!(outcome, None);
        assert_eq!(calls, 2);
        assert_eq!(Registry::<Tag>::new().dispatch(&vendor_in(), |_, _| Outcome::Handled), None);
    }

    #[test]
    fn full_registry_refuses() {
        let mut registry = Registry::new();
        for _ in 0..MAX_HANDLERS {
            registry.register(0, 0, Tag::A).unwrap();
        }
        assert_eq!(registry.register(0, 0, Tag::B), Err(Error::RegistryFull));
        assert_eq!(registry.len(), MAX_HANDLERS);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.register(0, 0, Tag::B), Ok(()));
    }
}
