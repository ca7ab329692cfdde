use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};

use super::{DoorDriver, DoorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    Lock,
    Unlock,
}

#[derive(Debug)]
struct Inner {
    state: DoorState,
    commands: Vec<DoorCommand>,
    failing: bool,
}

/// In-process door driver. Clones share state so a test can observe the
/// commands issued through a [`super::DoorController`].
#[derive(Debug, Clone)]
pub struct MemoryDoor {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDoor {
    pub fn new(state: DoorState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                commands: Vec::new(),
                failing: false,
            })),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }

    /// Every command received, including ones that failed.
    pub fn commands(&self) -> Vec<DoorCommand> {
        self.inner().commands.clone()
    }

    pub fn set_state(&self, state: DoorState) {
        self.inner().state = state;
    }

    /// Make subsequent commands fail without changing state.
    pub fn set_failing(&self, failing: bool) {
        self.inner().failing = failing;
    }

    fn command(&self, command: DoorCommand, target: DoorState) -> Result<()> {
        let mut inner = self.inner();
        inner.commands.push(command);
        if inner.failing {
            bail!("door hardware did not acknowledge {:?}", command);
        }
        inner.state = target;
        Ok(())
    }
}

impl DoorDriver for MemoryDoor {
    fn state(&self) -> DoorState {
        self.inner().state
    }

    fn lock(&mut self) -> Result<()> {
        self.command(DoorCommand::Lock, DoorState::Locked)
    }

    fn unlock(&mut self) -> Result<()> {
        self.command(DoorCommand::Unlock, DoorState::Unlocked)
    }
}
