//! Headless single-frame composite: frame + pose JSON + garment → PNG.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use tryon_overlay::config::Config;
use tryon_overlay::garment::{GarmentAsset, GarmentCategory, SubTag};
use tryon_overlay::pose::{NamedKeypoint, Pose};
use tryon_overlay::session::{ActiveGarment, OverlayPipeline};

#[derive(Parser, Debug)]
#[command(name = "tryon", version = env!("GIT_VERSION"), about = "Overlay a garment on one camera frame")]
struct Args {
    /// Camera frame (PNG)
    #[arg(long)]
    frame: PathBuf,

    /// Keypoints as JSON: one person `[{name,x,y,score},..]` or a list of people
    #[arg(long)]
    pose: PathBuf,

    /// Garment image with alpha
    #[arg(long)]
    garment: PathBuf,

    /// upperwear | outerwear | lowerwear
    #[arg(long, default_value = "upperwear")]
    category: GarmentCategory,

    /// e.g. shorts
    #[arg(long)]
    sub_tag: Option<SubTag>,

    #[arg(long, short, default_value = "tryon.toml")]
    config: PathBuf,

    #[arg(long, short, default_value = "tryon_out.png")]
    output: PathBuf,

    /// Canvas size in logical pixels; defaults to the frame size
    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    dpr: Option<f32>,

    /// Selfie view on/off; overrides `viewport.mirror_x`
    #[arg(long)]
    mirror: Option<bool>,

    #[arg(long)]
    debug_skeleton: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoseFile {
    Single(Vec<NamedKeypoint>),
    Multi(Vec<Vec<NamedKeypoint>>),
}

impl PoseFile {
    fn into_poses(self) -> Vec<Pose> {
        match self {
            Self::Single(kps) => vec![Pose::from_named(&kps)],
            Self::Multi(people) => people.iter().map(|kps| Pose::from_named(kps)).collect(),
        }
    }
}

/// CLI flags win over the config file; the canvas defaults to the frame size.
fn apply_overrides(args: &Args, config: &mut Config, frame_size: (u32, u32)) {
    config.viewport.canvas_width = args.width.unwrap_or(frame_size.0);
    config.viewport.canvas_height = args.height.unwrap_or(frame_size.1);
    if let Some(dpr) = args.dpr {
        config.viewport.device_pixel_ratio = dpr;
    }
    if let Some(mirror) = args.mirror {
        config.viewport.mirror_x = mirror;
    }
    config.compositor.debug_skeleton |= args.debug_skeleton;
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = tryon_overlay::logging::init("tryon")?;
    info!(version = env!("GIT_VERSION"), log = %log_path, "tryon");

    let mut config = Config::load_or_default(&args.config);

    let frame = image::open(&args.frame)
        .with_context(|| format!("Failed to open frame {}", args.frame.display()))?
        .into_rgba8();
    apply_overrides(&args, &mut config, frame.dimensions());
    config.validate()?;

    let pose_json = fs::read_to_string(&args.pose)
        .with_context(|| format!("Failed to read {}", args.pose.display()))?;
    let poses = serde_json::from_str::<PoseFile>(&pose_json)
        .with_context(|| format!("Failed to parse {}", args.pose.display()))?
        .into_poses();

    let asset = GarmentAsset::load(&args.garment)?;

    let mut pipeline = OverlayPipeline::new(&config);
    pipeline.set_garment(ActiveGarment::new(asset, args.category, args.sub_tag));
    let outcome = pipeline.render(&frame, &poses);

    pipeline
        .canvas()
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    match outcome.overlay {
        Some(r) => info!(
            x = r.x,
            y = r.y,
            width = r.width,
            height = r.height,
            rotation = r.rotation,
            "overlay placed"
        ),
        None => info!("no overlay drawn"),
    }
    println!("{}", outcome.status);
    println!("Output: {}", args.output.display());
    Ok(())
}
