use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use viewfinder::{
    CircleProcessor, GpuContext, GpuSettings, ImageSize, Point, PreviewProcessor,
    RecolorProcessor,
};

const PREVIEW_MAX: u32 = 256;

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

fn time_runs(count: usize, mut run: impl FnMut() -> Result<()>) -> Result<f64> {
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        let t0 = Instant::now();
        run()?;
        samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(median_ms(&samples))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let _bin = args.next();
    let path = args
        .next()
        .map(PathBuf::from)
        .context("usage: kernel_probe <image> [count]")?;
    let count = args
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(20);

    let img = image::open(&path).with_context(|| format!("open failed for {}", path.display()))?;
    eprintln!(
        "Using {} ({}x{}), {} iterations per kernel",
        path.display(),
        img.width(),
        img.height(),
        count
    );

    let gpu = GpuContext::new(&GpuSettings::load())
        .context("no compute-capable GPU adapter available")?;
    eprintln!(
        "Adapter: {} ({})",
        gpu.adapter_name(),
        gpu.adapter_backend()
    );

    let recolor = RecolorProcessor::new(&img, gpu.clone())?;
    recolor.set_red(0.5);
    let recolor_ms = time_runs(count, || {
        recolor.processed_image()?;
        Ok(())
    })?;
    eprintln!("channel-scale   median: {recolor_ms:.2} ms");

    let circle = CircleProcessor::new(&img, gpu.clone())?;
    circle.scale_radius(0.75);
    let circle_ms = time_runs(count, || {
        circle.processed_image()?;
        Ok(())
    })?;
    eprintln!("circular-mask   median: {circle_ms:.2} ms");

    let preview_size = ImageSize::new(
        img.width().min(PREVIEW_MAX),
        img.height().min(PREVIEW_MAX),
    );
    let preview = PreviewProcessor::new(&img, gpu, preview_size)?;
    preview.set_region_centered(Point::new(
        img.width() as f32 / 2.0,
        img.height() as f32 / 2.0,
    ));
    let preview_ms = time_runs(count, || {
        preview.processed_image()?;
        Ok(())
    })?;
    eprintln!("region-extract  median: {preview_ms:.2} ms");

    Ok(())
}
