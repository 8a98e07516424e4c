use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tryon_overlay::camera::ThreadedCamera;
use tryon_overlay::config::Config;
use tryon_overlay::garment::{GarmentCategory, SubTag};
use tryon_overlay::pose::MoveNetExtractor;
use tryon_overlay::render::{Key, MinifbPresenter};
use tryon_overlay::session::{FrameScheduler, TryOnSession};

#[derive(Parser, Debug)]
#[command(name = "tryon_viewer", version = env!("GIT_VERSION"), about = "Live virtual try-on window")]
struct Args {
    #[arg(long, short, default_value = "tryon.toml")]
    config: PathBuf,

    /// Garment image with alpha; without it only the camera is shown
    #[arg(long)]
    garment: Option<PathBuf>,

    #[arg(long, default_value = "upperwear")]
    category: GarmentCategory,

    #[arg(long)]
    sub_tag: Option<SubTag>,

    /// Override the camera index from the config
    #[arg(long)]
    camera: Option<i32>,

    /// Selfie view
    #[arg(long)]
    mirror: bool,
}

struct Snapshot {
    canvas: RgbaImage,
    status: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = tryon_overlay::logging::init("viewer")?;
    info!(version = env!("GIT_VERSION"), log = %log_path, "Try-on Viewer");
    println!("操作: [R] 再試行  [Esc] 終了");

    let mut config = Config::load_or_default(&args.config);
    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    config.viewport.mirror_x |= args.mirror;

    let mut presenter = MinifbPresenter::new(
        "Try-on Viewer",
        config.viewport.canvas_width as usize,
        config.viewport.canvas_height as usize,
    )?;

    let cancel = CancellationToken::new();
    let retry = Arc::new(Notify::new());
    let (tx, rx) = mpsc::sync_channel::<Snapshot>(1);

    let worker = {
        let cancel = cancel.clone();
        let retry = retry.clone();
        thread::Builder::new()
            .name("tryon-session".into())
            .spawn(move || run_session(config, args, cancel, retry, tx))
            .context("Failed to spawn session thread")?
    };

    while presenter.is_open() {
        if presenter.is_key_pressed(Key::R) {
            info!("retry requested");
            retry.notify_one();
        }

        match recv_latest(&rx) {
            Ok(Some(snapshot)) => {
                presenter.set_status(&snapshot.status);
                presenter.present(&snapshot.canvas)?;
            }
            Ok(None) => {
                // ウィンドウイベントだけ処理する
                thread::sleep(Duration::from_millis(5));
            }
            Err(()) => break,
        }
    }

    cancel.cancel();
    match worker.join() {
        Ok(result) => result?,
        Err(_) => error!("session thread panicked"),
    }
    info!("Shutting down...");
    Ok(())
}

/// 溜まっているスナップショットのうち最新のものだけ返す
fn recv_latest(rx: &Receiver<Snapshot>) -> Result<Option<Snapshot>, ()> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(s) => latest = Some(s),
            Err(TryRecvError::Empty) => return Ok(latest),
            Err(TryRecvError::Disconnected) => return if latest.is_some() { Ok(latest) } else { Err(()) },
        }
    }
}

fn run_session(
    config: Config,
    args: Args,
    cancel: CancellationToken,
    retry: Arc<Notify>,
    tx: SyncSender<Snapshot>,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async move {
        let mut session = TryOnSession::new(
            &config,
            ThreadedCamera::new(),
            MoveNetExtractor::new(&config.model.path),
        );
        if let Some(path) = &args.garment {
            // 読めなければ「服なし」で続行する
            let _ = session.load_garment(path, args.category, args.sub_tag);
        }

        let scheduler = FrameScheduler::with_token(config.scheduler.clone(), cancel.clone());
        let publish = |s: &TryOnSession<ThreadedCamera, MoveNetExtractor>| {
            let _ = tx.try_send(Snapshot {
                canvas: s.canvas().clone(),
                status: s.status().to_string(),
            });
        };

        loop {
            match scheduler.run_with(&mut session, publish).await {
                Ok(()) => break,
                Err(e) => {
                    error!("{e}");
                    publish(&session);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = retry.notified() => info!("retrying session start"),
                    }
                }
            }
        }
        Ok(())
    })
}
