use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tessel_engine::cache::TextureCacheConfig;
use tessel_engine::device::{GpuContext, GpuInit};
use tessel_engine::logging::{LoggingConfig, init_logging};
use tessel_engine::source::DiskSource;
use tessel_engine::time::Scheduler;
use tessel_engine::upload::{CpuUploader, TextureUploader, UploadConfig};
use tessel_engine::{CacheKey, TextureCache};

/// Loads every image in a directory through the texture cache and reports
/// what ended up cached.
#[derive(Debug, Parser)]
#[command(name = "tessel-studio")]
#[command(about = "Exercise the tessel texture cache on a directory of images")]
struct Args {
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Give up after this many frames.
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Load on the main thread instead of the decode worker.
    #[arg(long)]
    sync: bool,

    /// Skip the GPU and upload into system memory.
    #[arg(long)]
    cpu: bool,

    /// Uploads performed per frame.
    #[arg(long, default_value_t = 4)]
    per_frame: usize,

    /// Log filter, `env_logger` syntax.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(match &args.log {
        Some(filter) => LoggingConfig::with_filter(filter.clone()),
        None => LoggingConfig::default(),
    });

    let keys = list_images(&args.dir)?;
    if keys.is_empty() {
        bail!("no files in {}", args.dir.display());
    }
    log::info!("{} file(s) in {}", keys.len(), args.dir.display());

    if args.cpu {
        return run(&args, &keys, CpuUploader::new());
    }

    match GpuContext::blocking(GpuInit::default()) {
        Ok(gpu) => {
            log::info!("using adapter {}", gpu.adapter_info().name);
            run(&args, &keys, gpu.uploader(UploadConfig::default()))?;
            gpu.flush();
            Ok(())
        }
        Err(e) => {
            log::warn!("no GPU available ({e:#}); uploading to system memory");
            run(&args, &keys, CpuUploader::new())
        }
    }
}

/// Files directly inside `dir`, as keys relative to it, sorted.
fn list_images(dir: &Path) -> Result<Vec<CacheKey>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        if entry.file_type()?.is_file() {
            keys.push(CacheKey::from_path(entry.file_name()));
        }
    }
    keys.sort();
    Ok(keys)
}

fn run<U: TextureUploader + 'static>(args: &Args, keys: &[CacheKey], uploader: U) -> Result<()> {
    let scheduler = Scheduler::new();
    let cache = TextureCache::builder(uploader)
        .source(DiskSource::new(&args.dir))
        .config(TextureCacheConfig {
            results_per_tick: args.per_frame.max(1),
            ..TextureCacheConfig::default()
        })
        .build(&scheduler);

    let started = Instant::now();
    let (loaded, failed) = if args.sync {
        load_sync(&cache, keys)
    } else {
        load_async(&cache, &scheduler, keys, args.frames)?
    };

    println!(
        "loaded {loaded}, failed {failed} in {:.1} ms",
        started.elapsed().as_secs_f64() * 1000.0
    );
    println!("{}", cache.stats());
    for key in cache.keys() {
        if let Some(tex) = cache.get(&key) {
            println!("  {:<40} {:>5} x {:<5}", key.as_str(), tex.width(), tex.height());
        }
    }

    let evicted = cache.evict_unused();
    log::info!("evicted {evicted} texture(s)");
    cache.shutdown();
    Ok(())
}

fn load_sync<U: TextureUploader + 'static>(cache: &TextureCache<U>, keys: &[CacheKey]) -> (usize, usize) {
    let loaded = keys.iter().filter(|key| cache.load_sync(*key).is_some()).count();
    (loaded, keys.len() - loaded)
}

fn load_async<U: TextureUploader + 'static>(
    cache: &TextureCache<U>,
    scheduler: &Scheduler,
    keys: &[CacheKey],
    max_frames: u64,
) -> Result<(usize, usize)> {
    let (tx, rx) = mpsc::channel();
    for key in keys {
        let tx = tx.clone();
        let name = key.clone();
        cache.load_async(key, move |handle| {
            let _ = tx.send((name, handle.is_some()));
        });
    }
    drop(tx);

    let mut frames = 0;
    while cache.outstanding() > 0 {
        if frames == max_frames {
            let dropped = cache.cancel_all();
            bail!("gave up after {frames} frames; {dropped} request(s) cancelled");
        }
        let ft = scheduler.tick();
        log::debug!("frame {} ({} outstanding)", ft.frame_index, cache.outstanding());
        frames += 1;
        thread::sleep(FRAME);
    }

    let mut loaded = 0;
    let mut failed = 0;
    for (key, ok) in rx.try_iter() {
        if ok {
            loaded += 1;
        } else {
            log::warn!("{key} did not load");
            failed += 1;
        }
    }
    log::info!("async loads finished after {frames} frame(s)");
    Ok((loaded, failed))
}
