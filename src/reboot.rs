//! The device-restart side effect of the `UpdateReboot` handler, abstracted
//! behind a trait so this crate never assumes a particular MCU's reset
//! path.

// SPDX-License-Identifier: AGPL-3.0-or-later

/// Performs the irreversible act of restarting the device.
///
/// Concrete implementations on real hardware typically disable interrupts,
/// stop any secondary core, and arm a watchdog reset (optionally into a USB
/// bootloader instead of user firmware) — none of which has a portable
/// meaning outside that hardware, so it's kept behind this trait rather
/// than implemented here.
pub trait RebootTrigger: Send {
    /// Triggers a restart. `to_bootloader` requests a bootloader-mode
    /// restart instead of a normal one, when the platform supports it.
    fn reboot(&mut self, to_bootloader: bool);
}

/// A [`RebootTrigger`] for hosts with no real reset path (tests, the demo
/// binary run outside actual hardware). Records the request instead of
/// acting on it.
#[derive(Default)]
pub struct NoopRebootTrigger {
    pub requested: Option<bool>,
}

impl RebootTrigger for NoopRebootTrigger {
    fn reboot(&mut self, to_bootloader: bool) {
        self.requested = Some(to_bootloader);
        tracing::warn!(to_bootloader, "reboot requested, no-op trigger installed");
    }
}
