//! Two-pin debounce for SPDT micro switches.
//!
//! Only one contact is watched at a time. A falling edge on the normally-open
//! contact means the switch closed; from then on only the normally-closed
//! contact is armed, so bounce on the contact that just fired can't toggle
//! the state again.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Contact {
    NormallyOpen,
    NormallyClosed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpdtSwitch {
    pressed: bool,
}

impl SpdtSwitch {
    pub const fn new() -> Self {
        Self { pressed: false }
    }

    /// Contact whose falling edge is expected next.
    pub const fn armed(&self) -> Contact {
        if self.pressed {
            Contact::NormallyClosed
        } else {
            Contact::NormallyOpen
        }
    }

    /// Falling edge on `contact`. Returns the contact to arm next, or `None`
    /// if the edge came from the disarmed contact.
    pub fn edge(&mut self, contact: Contact) -> Option<Contact> {
        if contact != self.armed() {
            return None;
        }
        self.pressed = contact == Contact::NormallyOpen;
        Some(self.armed())
    }

    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut sw = SpdtSwitch::new();
        assert_eq!(sw.armed(), Contact::NormallyOpen);
        assert_eq!(sw.edge(Contact::NormallyOpen), Some(Contact::NormallyClosed));
        assert!(sw.is_pressed());
        assert_eq!(sw.edge(Contact::NormallyClosed), Some(Contact::NormallyOpen));
        assert!(!sw.is_pressed());
    }

    #[test]
    fn bounce_ignored() {
        let mut sw = SpdtSwitch::new();
        sw.edge(Contact::NormallyOpen);
        assert_eq!(sw.edge(Contact::NormallyOpen), None);
        assert!(sw.is_pressed());
        sw.edge(Contact::NormallyClosed);
        assert_eq!(sw.edge(Contact::NormallyClosed), None);
        assert!(!sw.is_pressed());
    }
}
