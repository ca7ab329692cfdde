pub mod memory;

use anyhow::Result;
use tracing::{error, info};

pub use memory::{DoorCommand, MemoryDoor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Locked,
    Unlocked,
}

/// Hardware door driver. The driver is authoritative for the door state.
pub trait DoorDriver: Send {
    fn state(&self) -> DoorState;
    fn lock(&mut self) -> Result<()>;
    fn unlock(&mut self) -> Result<()>;
}

/// Facade over a [`DoorDriver`]. Driver failures are logged here and never
/// reach the caller.
pub struct DoorController {
    driver: Box<dyn DoorDriver>,
}

impl DoorController {
    pub fn new(driver: impl DoorDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
        }
    }

    pub fn state(&self) -> DoorState {
        self.driver.state()
    }

    pub fn lock(&mut self) {
        match self.driver.lock() {
            Ok(()) => info!("door lock command issued"),
            Err(e) => error!(error = %e, "door driver failed to lock"),
        }
    }

    pub fn unlock(&mut self) {
        match self.driver.unlock() {
            Ok(()) => info!("door unlock command issued"),
            Err(e) => error!(error = %e, "door driver failed to unlock"),
        }
    }
}
