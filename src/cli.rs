use std::{path::PathBuf, time::Instant};

use anyhow::Context as _;
use clap::Parser;
use rayhit::{Device, DeviceConfig, Ray, Scene, TriangleMesh};

/// Loads a mesh and shoots a grid of rays straight down onto it.
#[derive(Debug, Parser)]
struct Args {
    /// Wavefront OBJ file to load
    mesh: PathBuf,

    /// Number of rays along each side of the grid
    #[arg(long, default_value_t = 512)]
    resolution: usize,

    /// Device configuration, e.g. `threads=4,leaf_size=16`
    #[arg(long)]
    config: Option<String>,

    /// Print hierarchy statistics after building
    #[arg(long)]
    statistics: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(config) => config.parse().context("Invalid device configuration")?,
        None => DeviceConfig::default(),
    };
    let device = Device::new(config)?;

    let mesh = TriangleMesh::from_obj(&args.mesh)
        .with_context(|| format!("Loading {}", args.mesh.display()))?;
    log::info!(
        "Loaded {} vertices, {} triangles",
        mesh.vertices.len(),
        mesh.triangles.len()
    );

    let mut scene = Scene::new(device);
    scene.add_triangle_mesh(&mesh)?;
    let scene = scene.commit();
    if args.statistics {
        scene.log_statistics();
    }

    let Some(bounding_box) = scene.bounding_box() else {
        log::warn!("Mesh is empty, nothing to trace");
        return Ok(());
    };

    let size = bounding_box.size();
    let step = 1.0 / args.resolution as f32;
    let height = bounding_box.max.z + 1.0;
    let rays: Vec<Ray> = (0..args.resolution * args.resolution)
        .map(|i| {
            let x = ((i % args.resolution) as f32 + 0.5) * step;
            let y = ((i / args.resolution) as f32 + 0.5) * step;
            Ray::new(
                [
                    bounding_box.min.x + x * size.x,
                    bounding_box.min.y + y * size.y,
                    height,
                ],
                [0.0, 0.0, -1.0],
            )
        })
        .collect();

    let start = Instant::now();
    let hits = scene.intersect_batch(&rays)?;
    let elapsed = start.elapsed();

    let hit_count = hits.iter().filter(|hit| hit.is_hit()).count();
    println!(
        "{hit_count} of {} rays hit, traced in {elapsed:?} ({:.2} Mrays/s)",
        rays.len(),
        rays.len() as f64 / elapsed.as_secs_f64() / 1e6
    );

    Ok(())
}
