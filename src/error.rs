use thiserror::Error;

use crate::{
    parallel::BatchError,
    scene::{MeshError, device::DeviceError},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
