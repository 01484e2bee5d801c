use std::{
    panic,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use thiserror::Error;

use crate::scene::device::Device;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Computes `output[i] = worker_fun(state, &items[i])` for every item on the device's worker threads.
///
/// Items are handed out in chunks of the device's chunk size from a shared counter, so faster
/// workers take more chunks. Every worker creates its own state with `init_fun(worker_id)`.
/// Blocks until all items are processed, a panic in a worker is propagated to the caller.
pub fn parallel_for_each_chunk<T, R, S, Fi, Fw>(
    device: &Device,
    items: &[T],
    output: &mut [R],
    init_fun: Fi,
    worker_fun: Fw,
) -> Result<(), BatchError>
where
    T: Sync,
    R: Send,
    Fi: Fn(usize) -> S + Sync,
    Fw: Fn(&mut S, &T) -> R + Sync,
{
    assert!(items.len() == output.len());

    let chunk_size = device.config().chunk_size.get();
    let chunks: Vec<Mutex<Option<(&[T], &mut [R])>>> = items
        .chunks(chunk_size)
        .zip(output.chunks_mut(chunk_size))
        .map(|chunk| Mutex::new(Some(chunk)))
        .collect();
    let next_chunk_index = AtomicUsize::new(0);

    let worker_count = device.worker_count().min(chunks.len());

    let chunks = &chunks;
    let next_chunk_index = &next_chunk_index;
    let init_fun = &init_fun;
    let worker_fun = &worker_fun;

    thread::scope(|scope| {
        let threads = (0..worker_count)
            .map(|worker_id| {
                thread::Builder::new()
                    .name(format!("worker{worker_id}"))
                    .spawn_scoped(scope, move || {
                        if let Some(core) = device.core_for_worker(worker_id) {
                            core_affinity::set_for_current(core);
                        }

                        let mut state = init_fun(worker_id);

                        loop {
                            let index = next_chunk_index.fetch_add(1, Ordering::AcqRel);
                            let Some(chunk) = chunks.get(index) else {
                                break;
                            };
                            let taken = chunk
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .take();
                            let Some((inputs, outputs)) = taken else {
                                continue;
                            };

                            for (item, out) in inputs.iter().zip(outputs.iter_mut()) {
                                *out = worker_fun(&mut state, item);
                            }
                        }
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for handle in threads {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }

        Ok(())
    })
}
