//! Chapter 9 requests to the device recipient.
//!
//! Feature selectors, interface and endpoint requests, SET_DESCRIPTOR and
//! GET_CONFIGURATION are not supported and stall.

use crate::usb::control::Reply;
use crate::usb::descriptor::{Descriptors, CONFIGURATION_VALUE};
use crate::usb::setup::{descriptor_type, request, request_type, SetupPacket};

/// Probe length some hosts use for the device descriptor before they know
/// bMaxPacketSize0.
const DEVICE_PROBE_LEN: u16 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Standard {
    /// Handled, the reply holds any data.
    Done,
    /// Apply once the status stage completes.
    SetAddress(u8),
    /// Enter configuration `0` (address state) or [`CONFIGURATION_VALUE`].
    Configure(u8),
    Stall,
}

pub fn handle(
    req: &SetupPacket,
    descriptors: &Descriptors,
    configured: bool,
    reply: &mut Reply<'_>,
) -> Standard {
    if req.kind() != request_type::STANDARD || req.recipient() != request_type::DEVICE {
        return Standard::Stall;
    }

    match req.request {
        request::GET_STATUS => {
            let status = descriptors.self_powered() as u16;
            reply.send(&status.to_le_bytes());
            Standard::Done
        }
        request::SET_ADDRESS => Standard::SetAddress((req.value & 0x7F) as u8),
        request::GET_DESCRIPTOR => get_descriptor(req, descriptors, configured, reply),
        request::SET_CONFIGURATION => match req.value {
            0 => Standard::Configure(0),
            v if v == CONFIGURATION_VALUE as u16 => Standard::Configure(CONFIGURATION_VALUE),
            v => {
                debug!("unknown configuration {}", v);
                Standard::Stall
            }
        },
        _ => Standard::Stall,
    }
}

fn get_descriptor(
    req: &SetupPacket,
    descriptors: &Descriptors,
    configured: bool,
    reply: &mut Reply<'_>,
) -> Standard {
    match req.descriptor_type() {
        descriptor_type::DEVICE => {
            // answer the probe in one packet, the host sends its status
            // stage right after the first one
            if reply.requested() == DEVICE_PROBE_LEN && !configured {
                reply.clamp_requested(descriptors.max_packet_size0() as u16);
            }
            reply.send(&descriptors.device());
            Standard::Done
        }
        descriptor_type::CONFIGURATION => {
            reply.send(&descriptors.configuration());
            Standard::Done
        }
        descriptor_type::STRING => match descriptors.string(req.descriptor_index()) {
            Some(string) => {
                reply.send(string);
                Standard::Done
            }
            None => Standard::Stall,
        },
        _ => Standard::Stall,
    }
}
