//! Blocking waits used by the multi-step sequences.

use fugit::MicrosDurationU64;

/// Something that can block the calling thread for a given time.
pub trait Delay {
    fn delay(&mut self, duration: MicrosDurationU64);
}

/// [`Delay`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: MicrosDurationU64) {
        std::thread::sleep(std::time::Duration::from_micros(duration.to_micros()));
    }
}
