//! C ABI.
//!
//! Scenes are addressed by opaque handles, 0 means "no scene". Every function that can fail
//! returns an [`RtStatus`]; rejected calls are also logged as warnings.
//! Arrays returned through out-pointers must be given back with `ReleaseIntArray` /
//! `ReleaseDoubleArray`.
#![allow(non_snake_case)]

mod arena;
mod registry;

use std::{
    ffi::{CStr, c_char, c_int},
    ptr, slice,
};

use crate::{
    batch,
    error::Error,
    marshal::{Hit, Ray},
    scene::{
        Scene,
        device::{Device, DeviceConfig},
    },
};

pub use registry::{NULL_HANDLE, SceneHandle};
use registry::SceneSlot;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RtStatus {
    Ok = 0,
    NullPointer,
    InvalidHandle,
    InvalidArgument,
    NotCommitted,
    AlreadyCommitted,
    DeviceError,
    InternalError,
}

impl From<&Error> for RtStatus {
    fn from(value: &Error) -> Self {
        match value {
            Error::Device(_) => RtStatus::DeviceError,
            Error::Mesh(_) => RtStatus::InvalidArgument,
            Error::Batch(_) => RtStatus::InternalError,
        }
    }
}

/// Creates an empty scene with the default device configuration.
/// Returns 0 if the device can't be created.
#[unsafe(no_mangle)]
pub extern "C" fn InitScene() -> SceneHandle {
    init_scene(DeviceConfig::default())
}

/// Creates an empty scene, configuring its device from a string like
/// `threads=4,pin_threads=1,leaf_size=16,chunk_size=64`.
/// Returns 0 if the configuration is invalid or the device can't be created.
///
/// # Safety
/// `config` must be null or point to a NUL terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn InitSceneWithConfig(config: *const c_char) -> SceneHandle {
    if config.is_null() {
        log::warn!("InitSceneWithConfig: null config string");
        return NULL_HANDLE;
    }
    let config = unsafe { CStr::from_ptr(config) };

    match config.to_str().map(str::parse::<DeviceConfig>) {
        Ok(Ok(config)) => init_scene(config),
        Ok(Err(e)) => {
            log::warn!("InitSceneWithConfig: {e}");
            NULL_HANDLE
        }
        Err(e) => {
            log::warn!("InitSceneWithConfig: config string is not UTF-8: {e}");
            NULL_HANDLE
        }
    }
}

fn init_scene(config: DeviceConfig) -> SceneHandle {
    // Device errors are logged by the device itself
    match Device::new(config) {
        Ok(device) => registry::insert(Scene::new(device)),
        Err(_) => NULL_HANDLE,
    }
}

/// Copies a triangle mesh into a scene that hasn't been finalized yet.
/// `vertices` holds `vertex_count` x, y, z triples, `indices` holds `index_count` vertex
/// indices, three per triangle.
/// Returns the id of the new geometry, or -1 on error.
///
/// # Safety
/// The arrays must be valid for reads of the given lengths.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AddTriangleMesh(
    scene: SceneHandle,
    vertices: *const f32,
    vertex_count: c_int,
    indices: *const c_int,
    index_count: c_int,
) -> c_int {
    let result = (|| {
        let vertices = unsafe { borrow_array(vertices, vertex_count, 3)? };
        let indices = unsafe { borrow_array(indices, index_count, 1)? };
        // Negative indices turn into huge ones and are rejected as out of range
        let indices: &[u32] = bytemuck::cast_slice(indices);

        registry::with_scene_mut(scene, |slot| match slot {
            SceneSlot::Building(scene) => add_mesh_as::<c_int>(scene, vertices, indices),
            SceneSlot::Committed(_) => Err(RtStatus::AlreadyCommitted),
        })
    })();

    result.unwrap_or_else(|status| {
        log::warn!("AddTriangleMesh failed: {status:?}");
        -1
    })
}

/// Adds a mesh, but only if its id is representable as `Id`.
/// A rejected mesh leaves the scene unchanged.
fn add_mesh_as<Id: TryFrom<usize>>(
    scene: &mut Scene,
    vertices: &[f32],
    indices: &[u32],
) -> Result<Id, RtStatus> {
    // Ids are assigned in insertion order
    let next = scene.geometry_count();
    let id = Id::try_from(next).map_err(|_| RtStatus::InvalidArgument)?;

    let added = scene.add_mesh_flat(vertices, indices).map_err(|e| {
        log::warn!("AddTriangleMesh: {e}");
        RtStatus::InvalidArgument
    })?;
    debug_assert!(added.raw() as usize == next);
    Ok(id)
}

/// Builds the acceleration structure. No meshes can be added afterwards.
#[unsafe(no_mangle)]
pub extern "C" fn FinalizeScene(scene: SceneHandle) -> RtStatus {
    report("FinalizeScene", registry::commit(scene))
}

/// Finds the nearest hit along the ray and writes it to `hit`
/// ([`Hit::MISS`] if nothing is hit).
///
/// # Safety
/// `ray` must be null or valid for reads, `hit` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn TraceSingle(
    scene: SceneHandle,
    ray: *const Ray,
    hit: *mut Hit,
) -> RtStatus {
    let result = (|| {
        let ray = unsafe { ray.as_ref() }.ok_or(RtStatus::NullPointer)?;
        if hit.is_null() {
            return Err(RtStatus::NullPointer);
        }

        let result = registry::with_scene(scene, |slot| match slot {
            SceneSlot::Committed(scene) => Ok(scene.intersect(ray)),
            SceneSlot::Building(_) => Err(RtStatus::NotCommitted),
        })?;
        unsafe { hit.write(result) };
        Ok(())
    })();

    report("TraceSingle", result)
}

/// Writes to `occluded` whether anything is hit at a distance in
/// `[ray.min_distance, max_distance)`.
///
/// # Safety
/// `ray` must be null or valid for reads, `occluded` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn IsOccluded(
    scene: SceneHandle,
    ray: *const Ray,
    max_distance: f32,
    occluded: *mut bool,
) -> RtStatus {
    let result = (|| {
        let ray = unsafe { ray.as_ref() }.ok_or(RtStatus::NullPointer)?;
        if occluded.is_null() {
            return Err(RtStatus::NullPointer);
        }

        let result = registry::with_scene(scene, |slot| match slot {
            SceneSlot::Committed(scene) => Ok(scene.is_occluded(ray, max_distance)),
            SceneSlot::Building(_) => Err(RtStatus::NotCommitted),
        })?;
        unsafe { occluded.write(result) };
        Ok(())
    })();

    report("IsOccluded", result)
}

/// Releases the scene and everything it owns. The handle is invalid afterwards.
#[unsafe(no_mangle)]
pub extern "C" fn DeleteScene(scene: SceneHandle) -> RtStatus {
    report("DeleteScene", registry::remove(scene))
}

/// Traces all rays against a single mesh and returns the primitive id of the nearest hit
/// for every ray (-1 for a miss) in `*hit_ids`.
/// `vertices` holds `vertex_count` x, y, z triples, `faces` holds `face_count` index triples.
/// The result must be released with `ReleaseIntArray`. It is null when there are no rays.
///
/// # Safety
/// The arrays must be valid for reads of the given lengths, `hit_ids` must be null or valid
/// for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn RayTracing(
    vertices: *const f32,
    vertex_count: c_int,
    faces: *const c_int,
    face_count: c_int,
    rays: *const Ray,
    ray_count: c_int,
    hit_ids: *mut *mut c_int,
) -> RtStatus {
    let result = (|| {
        if hit_ids.is_null() {
            return Err(RtStatus::NullPointer);
        }
        unsafe { hit_ids.write(ptr::null_mut()) };

        let (vertices, faces, rays) = unsafe {
            (
                borrow_array(vertices, vertex_count, 3)?,
                borrow_array(faces, face_count, 3)?,
                borrow_array(rays, ray_count, 1)?,
            )
        };

        let ids = batch::trace_batch(
            DeviceConfig::default(),
            vertices,
            bytemuck::cast_slice(faces),
            rays,
        )
        .map_err(|e| report_error("RayTracing", &e))?;

        // INVALID_ID doesn't fit and becomes -1
        let ids = ids
            .into_iter()
            .map(|id| c_int::try_from(id).unwrap_or(-1))
            .collect();
        unsafe { hit_ids.write(arena::INT_ARRAYS.store(ids)) };
        Ok(())
    })();

    report("RayTracing", result)
}

/// Like `RayTracing`, but returns the distances of the nearest hits (infinity for a miss)
/// in `*distances`. The result must be released with `ReleaseDoubleArray`.
///
/// # Safety
/// Same as `RayTracing`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn RayTracingDistances(
    vertices: *const f32,
    vertex_count: c_int,
    faces: *const c_int,
    face_count: c_int,
    rays: *const Ray,
    ray_count: c_int,
    distances: *mut *mut f64,
) -> RtStatus {
    let result = (|| {
        if distances.is_null() {
            return Err(RtStatus::NullPointer);
        }
        unsafe { distances.write(ptr::null_mut()) };

        let (vertices, faces, rays) = unsafe {
            (
                borrow_array(vertices, vertex_count, 3)?,
                borrow_array(faces, face_count, 3)?,
                borrow_array(rays, ray_count, 1)?,
            )
        };

        let result = batch::trace_batch_distances(
            DeviceConfig::default(),
            vertices,
            bytemuck::cast_slice(faces),
            rays,
        )
        .map_err(|e| report_error("RayTracingDistances", &e))?;

        unsafe { distances.write(arena::DOUBLE_ARRAYS.store(result)) };
        Ok(())
    })();

    report("RayTracingDistances", result)
}

/// Releases an array returned by `RayTracing`. Null is accepted and ignored,
/// pointers that didn't come from this library are rejected.
#[unsafe(no_mangle)]
pub extern "C" fn ReleaseIntArray(array: *mut c_int) -> RtStatus {
    report("ReleaseIntArray", release(&arena::INT_ARRAYS, array))
}

/// Releases an array returned by `RayTracingDistances`. Null is accepted and ignored,
/// pointers that didn't come from this library are rejected.
#[unsafe(no_mangle)]
pub extern "C" fn ReleaseDoubleArray(array: *mut f64) -> RtStatus {
    report("ReleaseDoubleArray", release(&arena::DOUBLE_ARRAYS, array))
}

fn release<T>(arena: &arena::Arena<T>, array: *mut T) -> Result<(), RtStatus> {
    if array.is_null() || arena.release(array) {
        Ok(())
    } else {
        Err(RtStatus::InvalidArgument)
    }
}

/// Borrows `count * stride` elements.
/// Null is accepted only for an empty array.
///
/// # Safety
/// Non-null pointers must be valid for reads of `count * stride` elements.
unsafe fn borrow_array<'a, T>(
    pointer: *const T,
    count: c_int,
    stride: usize,
) -> Result<&'a [T], RtStatus> {
    let len = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(stride))
        .ok_or(RtStatus::InvalidArgument)?;
    if len == 0 {
        return Ok(&[]);
    }
    if pointer.is_null() {
        return Err(RtStatus::NullPointer);
    }
    if !pointer.is_aligned() {
        return Err(RtStatus::InvalidArgument);
    }
    Ok(unsafe { slice::from_raw_parts(pointer, len) })
}

fn report_error(function: &str, error: &Error) -> RtStatus {
    log::warn!("{function}: {error}");
    error.into()
}

fn report(function: &str, result: Result<(), RtStatus>) -> RtStatus {
    match result {
        Ok(()) => RtStatus::Ok,
        Err(status) => {
            log::warn!("{function} failed: {status:?}");
            status
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};

    const TRIANGLE_VERTICES: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

    #[test]
    fn ids_follow_insertion_order() {
        let_assert!(Ok(device) = Device::new(DeviceConfig::default()));
        let mut scene = Scene::new(device);
        for expected in 0..3 {
            let id = add_mesh_as::<c_int>(&mut scene, &TRIANGLE_VERTICES, &TRIANGLE_INDICES);
            assert!(id == Ok(expected));
        }
    }

    #[test]
    fn id_overflow_leaves_scene_unchanged() {
        let_assert!(Ok(device) = Device::new(DeviceConfig::default()));
        let mut scene = Scene::new(device);
        for _ in 0..=u8::MAX {
            let_assert!(Ok(_) = add_mesh_as::<u8>(&mut scene, &TRIANGLE_VERTICES, &TRIANGLE_INDICES));
        }

        let result = add_mesh_as::<u8>(&mut scene, &TRIANGLE_VERTICES, &TRIANGLE_INDICES);
        assert!(result == Err(RtStatus::InvalidArgument));
        assert!(scene.geometry_count() == 256);
    }

    #[test]
    fn invalid_mesh_consumes_no_id() {
        let_assert!(Ok(device) = Device::new(DeviceConfig::default()));
        let mut scene = Scene::new(device);

        let result = add_mesh_as::<c_int>(&mut scene, &TRIANGLE_VERTICES, &[0, 1, 3]);
        assert!(result == Err(RtStatus::InvalidArgument));
        assert!(scene.geometry_count() == 0);
        assert!(add_mesh_as::<c_int>(&mut scene, &TRIANGLE_VERTICES, &TRIANGLE_INDICES) == Ok(0));
    }
}
