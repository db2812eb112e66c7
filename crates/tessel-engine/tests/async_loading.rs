//! End-to-end loading through the real image decoder and a directory on disk.

use std::io::Cursor;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tessel_engine::source::DiskSource;
use tessel_engine::time::Scheduler;
use tessel_engine::upload::{CpuTexture, CpuUploader};
use tessel_engine::{LoadError, LoadStatus, TextureCache, TextureHandle};

fn write_png(dir: &Path, name: &str, w: u32, h: u32, rgba: [u8; 4]) {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, out.into_inner()).unwrap();
}

fn pump(sched: &Scheduler, cache: &TextureCache<CpuUploader>) {
    let start = Instant::now();
    while cache.outstanding() > 0 {
        assert!(start.elapsed() < Duration::from_secs(10), "loads never finished");
        sched.tick();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn loads_directory_of_pngs_in_background() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", 4, 4, [255, 0, 0, 255]);
    write_png(dir.path(), "ui/b.png", 8, 2, [0, 255, 0, 255]);
    std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

    let sched = Scheduler::new();
    let cache = TextureCache::new(CpuUploader::new(), DiskSource::new(dir.path()), &sched);
    let (tx, rx) = mpsc::channel::<(String, Option<TextureHandle<CpuTexture>>)>();

    for name in ["a.png", "ui/b.png", "broken.png", "a.png"] {
        let tx = tx.clone();
        let status = cache.load_async(name, move |handle| {
            let _ = tx.send((name.to_string(), handle));
        });
        assert_eq!(status, LoadStatus::Queued);
    }
    pump(&sched, &cache);

    let delivered: Vec<_> = rx.try_iter().collect();
    assert_eq!(delivered.len(), 4);

    let a = delivered[0].1.as_ref().expect("a.png");
    assert_eq!((a.width(), a.height()), (4, 4));
    assert_eq!(&a.gpu().pixels[..4], &[255, 0, 0, 255]);

    let b = delivered[1].1.as_ref().expect("ui/b.png");
    assert_eq!((b.width(), b.height()), (8, 2));
    assert_eq!(b.byte_len(), 64);

    assert_eq!(delivered[2].0, "broken.png");
    assert!(delivered[2].1.is_none());

    // The second a.png request shares the first one's texture.
    let again = delivered[3].1.as_ref().expect("a.png again");
    assert!(std::sync::Arc::ptr_eq(a, again));

    let stats = cache.stats();
    assert_eq!(stats.textures, 2);
    assert_eq!(stats.outstanding, 0);
    assert!(!stats.dispatching);

    cache.shutdown();
}

#[test]
fn missing_file_is_answered_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let sched = Scheduler::new();
    let cache = TextureCache::new(CpuUploader::new(), DiskSource::new(dir.path()), &sched);

    let (tx, rx) = mpsc::channel();
    let status = cache.load_async("missing.png", move |handle| {
        let _ = tx.send(handle.is_none());
    });

    assert_eq!(status, LoadStatus::Unavailable);
    assert_eq!(rx.try_recv(), Ok(true));
    assert!(cache.worker_state().is_none());
    assert!(matches!(
        cache.try_load_sync("missing.png"),
        Err(LoadError::NotFound(_))
    ));
}

#[test]
fn sync_and_async_share_entries() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "tile.png", 2, 2, [1, 2, 3, 255]);

    let sched = Scheduler::new();
    let cache = TextureCache::new(CpuUploader::new(), DiskSource::new(dir.path()), &sched);

    let sync = cache.load_sync("./tile.png").expect("sync load");
    let (tx, rx) = mpsc::channel();
    let status = cache.load_async("tile.png", move |handle| {
        let _ = tx.send(handle);
    });

    assert_eq!(status, LoadStatus::Cached);
    let delivered = rx.try_recv().unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(&sync, &delivered));

    drop(sync);
    drop(delivered);
    assert_eq!(cache.evict_unused(), 1);
    assert!(cache.is_empty());
}

#[test]
fn dropping_cache_mid_load_joins_worker() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..16 {
        write_png(dir.path(), &format!("t{i}.png"), 16, 16, [i as u8, 0, 0, 255]);
    }

    let sched = Scheduler::new();
    {
        let cache = TextureCache::new(CpuUploader::new(), DiskSource::new(dir.path()), &sched);
        for i in 0..16 {
            cache.load_async(format!("t{i}.png"), |_| {});
        }
        sched.tick();
    }

    assert!(sched.is_empty());
}
