//! lumen CLI - collider benchmarks and self-checks
//!
//! Builds colliders over generated meshes, times tree construction and ray
//! queries, and cross-checks every build technique against brute force.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use lumen_collider::{Collider, ColliderConfig, Ray, Technique};
use lumen_math::{Aabb3, Real, Vec3};
use lumen_mesh::shapes::{self, ShapeMesh};
use lumen_mesh::{IndexedMesh, Mesh};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Ray/triangle-mesh collision benchmarks and checks", long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug); RUST_LOG still applies
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads for batch queries (default: one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one collider and print its tree statistics
    Info {
        #[command(flatten)]
        scene: SceneArgs,
        /// Build technique
        #[arg(short, long, default_value_t = Technique::BspFast)]
        technique: Technique,
    },
    /// Time tree builds and ray queries
    Bench {
        #[command(flatten)]
        scene: SceneArgs,
        /// Only this technique (default: all)
        #[arg(short, long)]
        technique: Option<Technique>,
        /// Rays per measurement
        #[arg(long, default_value_t = 100_000)]
        rays: usize,
        /// Seed for the ray generator
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Compare every technique against the linear reference
    Verify {
        #[command(flatten)]
        scene: SceneArgs,
        /// Rays to compare
        #[arg(long, default_value_t = 20_000)]
        rays: usize,
        /// Seed for the ray generator
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

#[derive(Args)]
struct SceneArgs {
    /// Generated test mesh
    #[arg(long, value_enum, default_value_t = ShapeKind::Sphere)]
    shape: ShapeKind,
    /// Tessellation detail of the mesh
    #[arg(long, default_value_t = 64)]
    detail: u32,
    /// Collider configuration (TOML); its technique is replaced by the command's
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeKind {
    /// Flat square grid
    Grid,
    /// Latitude/longitude sphere
    Sphere,
    /// Lattice of separate cubes
    Cubes,
}

impl SceneArgs {
    fn shape(&self) -> ShapeMesh {
        let detail = self.detail.max(1);
        match self.shape {
            ShapeKind::Grid => shapes::grid(detail, 10.0),
            ShapeKind::Sphere => shapes::uv_sphere(1.0, detail.max(3), (detail / 2).max(2)),
            ShapeKind::Cubes => shapes::cube_field((detail / 4).max(1), 1.5, 1.0),
        }
    }

    fn config(&self, technique: Technique) -> Result<ColliderConfig> {
        let mut config = match &self.config {
            Some(path) => ColliderConfig::from_toml_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => ColliderConfig::default(),
        };
        config.technique = technique;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring the thread pool")?;
    }

    match cli.command {
        Commands::Info { scene, technique } => show_info(&scene, technique),
        Commands::Bench {
            scene,
            technique,
            rays,
            seed,
        } => run_bench(&scene, technique, rays, seed),
        Commands::Verify { scene, rays, seed } => run_verify(&scene, rays, seed),
    }
}

fn show_info(scene: &SceneArgs, technique: Technique) -> Result<()> {
    let shape = scene.shape();
    let mesh = shape.as_mesh()?;
    let start = Instant::now();
    let collider = Collider::build(&mesh, &scene.config(technique)?)?;
    let elapsed = start.elapsed();

    println!("Mesh: {} vertices, {} triangles", mesh.num_vertices(), mesh.num_triangles());
    let aabb = mesh.aabb();
    if !aabb.is_empty() {
        println!(
            "Bounds: [{:.3}, {:.3}, {:.3}] - [{:.3}, {:.3}, {:.3}]",
            aabb.min.x, aabb.min.y, aabb.min.z, aabb.max.x, aabb.max.y, aabb.max.z
        );
    }
    println!("Technique: {}", collider.technique());
    println!("Build time: {}", millis(elapsed));
    println!("Delta: {:e}", collider.delta());
    println!("Tree: {}", collider.tree().stats());
    println!("Memory: {:.1} KiB", collider.memory_usage() as f64 / 1024.0);
    Ok(())
}

fn run_bench(scene: &SceneArgs, only: Option<Technique>, count: usize, seed: u64) -> Result<()> {
    let shape = scene.shape();
    let mesh = shape.as_mesh()?;
    let rays = scene_rays(&mesh, count, seed)?;
    let techniques: Vec<Technique> = match only {
        Some(technique) => vec![technique],
        None => Technique::ALL.to_vec(),
    };

    println!(
        "{} triangles, {} rays, {} threads",
        mesh.num_triangles(),
        rays.len(),
        rayon::current_num_threads()
    );
    println!(
        "{:<12} {:>10} {:>8} {:>6} {:>11} {:>12} {:>12} {:>8}",
        "technique", "build", "nodes", "depth", "memory KiB", "serial Mr/s", "batch Mr/s", "hits"
    );
    for technique in techniques {
        let start = Instant::now();
        let collider = Collider::build(&mesh, &scene.config(technique)?)?;
        let build = start.elapsed();
        let stats = collider.tree().stats();

        let mut serial = rays.clone();
        let start = Instant::now();
        let hits = serial.iter_mut().map(|ray| collider.intersect(ray)).filter(|&hit| hit).count();
        let serial_time = start.elapsed();

        let mut batch = rays.clone();
        let start = Instant::now();
        let batch_hits = collider.intersect_batch(&mut batch);
        let batch_time = start.elapsed();
        if batch_hits != hits {
            warn!("{technique}: batch found {batch_hits} hits, serial {hits}");
        }

        println!(
            "{:<12} {:>10} {:>8} {:>6} {:>11.1} {:>12.3} {:>12.3} {:>8}",
            technique.name(),
            millis(build),
            stats.kd_nodes + stats.bsp_nodes + stats.leaves,
            stats.depth,
            collider.memory_usage() as f64 / 1024.0,
            mrays_per_second(rays.len(), serial_time),
            mrays_per_second(rays.len(), batch_time),
            hits
        );
    }
    Ok(())
}

fn run_verify(scene: &SceneArgs, count: usize, seed: u64) -> Result<()> {
    let shape = scene.shape();
    let mesh = shape.as_mesh()?;
    let rays = scene_rays(&mesh, count, seed)?;
    let tolerance = 1e-4 * mesh.aabb().diagonal().max(1.0);

    let reference = Collider::build(&mesh, &scene.config(Technique::Linear)?)?;
    let mut expected = rays.clone();
    let hits = reference.intersect_batch(&mut expected);
    info!("reference: {hits} hits out of {}", rays.len());

    let mut failed = 0;
    for technique in Technique::ALL.into_iter().filter(|t| *t != Technique::Linear) {
        let collider = Collider::build(&mesh, &scene.config(technique)?)?;
        let mut actual = rays.clone();
        collider.intersect_batch(&mut actual);

        let mismatches = expected
            .iter()
            .zip(&actual)
            .filter(|(e, a)| !same_hit(e, a, tolerance))
            .inspect(|(e, a)| {
                warn!(
                    "{technique}: origin {:?} direction {:?}: expected {:?} at {}, got {:?} at {}",
                    e.origin.as_slice(),
                    e.direction.as_slice(),
                    e.hit_triangle,
                    e.hit_distance,
                    a.hit_triangle,
                    a.hit_distance
                )
            })
            .count();
        println!("{:<12} {} mismatches", technique.name(), mismatches);
        failed += mismatches;
    }

    if failed > 0 {
        bail!("{failed} rays disagree with the linear reference");
    }
    println!("All techniques agree on {} rays ({hits} hits)", rays.len());
    Ok(())
}

/// Hit or miss must agree; hit distances must agree within `tolerance`.
/// The triangle may differ where several lie at the same distance.
fn same_hit(expected: &Ray, actual: &Ray, tolerance: Real) -> bool {
    match (expected.hit_triangle, actual.hit_triangle) {
        (None, None) => true,
        (Some(_), Some(_)) => (expected.hit_distance - actual.hit_distance).abs() <= tolerance,
        _ => false,
    }
}

/// Rays from a shell around the mesh towards random points in its bounds.
fn scene_rays(mesh: &IndexedMesh<'_, u32>, count: usize, seed: u64) -> Result<Vec<Ray>> {
    let aabb = mesh.aabb();
    if aabb.is_empty() {
        bail!("mesh has no triangles");
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let center = (aabb.min + aabb.max) * 0.5;
    let radius = aabb.diagonal().max(1e-3);
    Ok((0..count)
        .map(|_| {
            let origin = center + random_unit(&mut rng) * radius;
            let target = random_point(&mut rng, &aabb);
            Ray::new(origin, (target - origin).normalize())
        })
        .collect())
}

fn random_unit(rng: &mut StdRng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n = v.norm();
        if n > 1e-3 && n <= 1.0 {
            return v / n;
        }
    }
}

fn random_point(rng: &mut StdRng, aabb: &Aabb3) -> Vec3 {
    let mut p = aabb.min;
    for axis in 0..3 {
        if aabb.max[axis] > aabb.min[axis] {
            p[axis] = rng.gen_range(aabb.min[axis]..=aabb.max[axis]);
        }
    }
    p
}

fn millis(d: Duration) -> String {
    format!("{:.1} ms", d.as_secs_f64() * 1e3)
}

fn mrays_per_second(count: usize, d: Duration) -> f64 {
    count as f64 / d.as_secs_f64().max(1e-9) / 1e6
}
