//! Hardware state sources.
//!
//! A backend captures the display server's raw records into a
//! [`ScreenSnapshot`]; the [`randr`] decoder then turns the snapshot into the
//! typed [`Gpu`](crate::gpu::Gpu) model the manager consumes.

use anyhow::Result;
use madori_state::ScreenSnapshot;

pub mod headless;
pub mod randr;

pub trait Backend {
    fn name(&self) -> &str;

    /// Captures the current hardware state. Called again whenever the caller
    /// learns the state may have changed.
    fn read_state(&mut self) -> Result<ScreenSnapshot>;
}
