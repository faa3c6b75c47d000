use anyhow::{bail, Context, Result};
use matchvision::insights::FsSink;
use matchvision::video::{OpenCvVideoSource, OpenCvVideoWriter};
use matchvision::{Config, Pipeline, RecordedTracks};
use tracing::info;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(video), Some(tracks)) = (args.next(), args.next()) else {
        bail!("usage: matchvision <video> <tracks.json> [config.yaml]");
    };

    let config = match args.next() {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };

    matchvision::logging::init(&config).context("setting up logging")?;

    let pipeline = Pipeline::new(config)?;
    info!(
        "tracking {:?}, statistics overlay {}",
        pipeline.selection().categories,
        if pipeline.selection().show_statistics { "on" } else { "off" }
    );

    let mut source = OpenCvVideoSource::new(&video);
    let mut tracker = RecordedTracks::load(&tracks).with_context(|| format!("loading tracks {}", tracks))?;
    let mut writer = OpenCvVideoWriter::new();
    let mut sink = FsSink::new(pipeline.insights_dir());

    let report = pipeline.run(&mut source, &mut tracker, &mut writer, &mut sink)?;

    for (key, pct) in &report.insights.ball_possession {
        info!("{}: {:.1}%", key, pct);
    }
    info!("insights written to {}", sink.dir().display());

    Ok(())
}
