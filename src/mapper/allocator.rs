//! Random id allocation for conferences seen for the first time.

use crate::config::Config;
use crate::registry::{Column, Registry, RegistryError};
use crate::util::id::{new_conference_id, IdSpace};

#[derive(thiserror::Error, Debug)]
pub enum AllocateError {
    #[error("no free conference id found after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("conference name already registered")]
    NameTaken,
    #[error(transparent)]
    Registry(RegistryError),
}

#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    space: IdSpace,
    max_attempts: u32,
}

impl IdAllocator {
    pub fn new(space: IdSpace, max_attempts: u32) -> Self { Self { space, max_attempts } }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.id_space, config.max_alloc_attempts)
    }

    pub fn space(&self) -> IdSpace { self.space }

    /// Register `name` under a fresh random id and return that id.
    ///
    /// Colliding ids are redrawn up to `max_attempts` times. A name that is
    /// already registered or a storage failure ends the allocation at once.
    pub fn allocate<R>(&self, registry: &R, name: &str) -> Result<u64, AllocateError>
    where
        R: Registry + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = new_conference_id(self.space);
            match registry.insert(name, candidate) {
                Ok(()) => return Ok(candidate),
                Err(RegistryError::Conflict(Column::Id)) => {
                    tracing::debug!(
                        conference = %name,
                        id = candidate,
                        attempt,
                        "conference id taken, redrawing"
                    );
                }
                Err(RegistryError::Conflict(Column::Name)) => return Err(AllocateError::NameTaken),
                Err(err) => return Err(AllocateError::Registry(err)),
            }
        }
        Err(AllocateError::Exhausted { attempts: self.max_attempts })
    }
}
