//! Scenes owned on behalf of C callers, addressed by opaque 64 bit handles.
//!
//! The handle table is locked only for lookups, insertion and removal. Each scene has its
//! own lock, so committing one scene never blocks queries on another.

use std::{
    mem,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use slotmap::{Key as _, KeyData, SlotMap, new_key_type};

use super::RtStatus;
use crate::scene::{CommittedScene, Scene};

/// Opaque scene handle, 0 is never a valid handle.
pub type SceneHandle = u64;
pub const NULL_HANDLE: SceneHandle = 0;

new_key_type! {
    struct SceneKey;
}

pub enum SceneSlot {
    Building(Scene),
    Committed(CommittedScene),
}

type SharedSlot = Arc<RwLock<SceneSlot>>;

static SCENES: LazyLock<RwLock<SlotMap<SceneKey, SharedSlot>>> = LazyLock::new(Default::default);

fn key(handle: SceneHandle) -> Option<SceneKey> {
    (handle != NULL_HANDLE).then(|| KeyData::from_ffi(handle).into())
}

fn lookup(handle: SceneHandle) -> Result<SharedSlot, RtStatus> {
    let key = key(handle).ok_or(RtStatus::InvalidHandle)?;
    SCENES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
        .ok_or(RtStatus::InvalidHandle)
}

pub fn insert(scene: Scene) -> SceneHandle {
    SCENES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(Arc::new(RwLock::new(SceneSlot::Building(scene))))
        .data()
        .as_ffi()
}

/// Runs `f` with shared access to the scene. Concurrent calls don't block each other.
pub fn with_scene<R>(
    handle: SceneHandle,
    f: impl FnOnce(&SceneSlot) -> Result<R, RtStatus>,
) -> Result<R, RtStatus> {
    let slot = lookup(handle)?;
    let slot = slot.read().unwrap_or_else(PoisonError::into_inner);
    f(&slot)
}

pub fn with_scene_mut<R>(
    handle: SceneHandle,
    f: impl FnOnce(&mut SceneSlot) -> Result<R, RtStatus>,
) -> Result<R, RtStatus> {
    let slot = lookup(handle)?;
    let mut slot = slot.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut slot)
}

/// Builds the acceleration structure of a scene that is still accepting meshes.
pub fn commit(handle: SceneHandle) -> Result<(), RtStatus> {
    with_scene_mut(handle, |slot| {
        let SceneSlot::Building(scene) = slot else {
            return Err(RtStatus::AlreadyCommitted);
        };
        let empty = Scene::new(scene.device().clone());
        let scene = mem::replace(scene, empty);
        *slot = SceneSlot::Committed(scene.commit());
        Ok(())
    })
}

/// Drops the scene, releasing everything it owns.
/// Queries already running on the scene finish first.
pub fn remove(handle: SceneHandle) -> Result<(), RtStatus> {
    let key = key(handle).ok_or(RtStatus::InvalidHandle)?;
    SCENES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key)
        .map(drop)
        .ok_or(RtStatus::InvalidHandle)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::device::{Device, DeviceConfig};

    use std::{sync::mpsc, thread, time::Duration};

    use assert2::assert;

    fn new_handle() -> SceneHandle {
        insert(Scene::new(Device::new(DeviceConfig::default()).unwrap()))
    }

    #[test]
    fn handles_are_never_null() {
        let handle = new_handle();
        assert!(handle != NULL_HANDLE);
        assert!(remove(handle) == Ok(()));
    }

    fn is_committed(handle: SceneHandle) -> Result<bool, RtStatus> {
        with_scene(handle, |slot| Ok(matches!(slot, SceneSlot::Committed(_))))
    }

    #[test]
    fn lifecycle() {
        let handle = new_handle();
        assert!(is_committed(handle) == Ok(false));
        assert!(commit(handle) == Ok(()));
        assert!(commit(handle) == Err(RtStatus::AlreadyCommitted));
        assert!(is_committed(handle) == Ok(true));
        assert!(remove(handle) == Ok(()));
        assert!(remove(handle) == Err(RtStatus::InvalidHandle));
        assert!(commit(handle) == Err(RtStatus::InvalidHandle));
    }

    #[test]
    fn null_and_garbage_handles() {
        assert!(remove(NULL_HANDLE) == Err(RtStatus::InvalidHandle));
        assert!(with_scene(0xdead_beef_0000_0001, |_| Ok(())) == Err(RtStatus::InvalidHandle));
    }

    #[test]
    fn locked_scene_does_not_block_others() {
        let building = new_handle();
        let committed = new_handle();
        assert!(commit(committed) == Ok(()));

        // Holds the same lock a running commit holds
        let result = with_scene_mut(building, |_| {
            let (sender, receiver) = mpsc::channel();
            thread::scope(|s| {
                s.spawn(move || {
                    let _ = sender.send(is_committed(committed));
                });
                Ok(receiver.recv_timeout(Duration::from_secs(10)))
            })
        });

        assert!(result == Ok(Ok(Ok(true))));
        assert!(remove(building) == Ok(()));
        assert!(remove(committed) == Ok(()));
    }

    #[test]
    fn commit_runs_alongside_queries() {
        let vertices: Vec<[f32; 3]> = (0..20_000)
            .map(|i| [(i % 100) as f32, (i / 100) as f32, 0.0])
            .collect();
        let triangles: Vec<[u32; 3]> = (0..19_000u32).map(|i| [i, i + 1, i + 100]).collect();

        let big = new_handle();
        with_scene_mut(big, |slot| match slot {
            SceneSlot::Building(scene) => scene
                .add_mesh(&vertices, &triangles)
                .map(drop)
                .map_err(|_| RtStatus::InvalidArgument),
            SceneSlot::Committed(_) => Err(RtStatus::AlreadyCommitted),
        })
        .unwrap();
        let small = new_handle();
        assert!(commit(small) == Ok(()));

        thread::scope(|s| {
            let committing = s.spawn(|| commit(big));
            for _ in 0..100 {
                assert!(is_committed(small) == Ok(true));
            }
            assert!(committing.join().unwrap() == Ok(()));
        });

        assert!(is_committed(big) == Ok(true));
        assert!(remove(big) == Ok(()));
        assert!(remove(small) == Ok(()));
    }
}
