mod args;

use args::{Args, Mode};
use clap::Parser;
use feature_locator::annotate::Overlay;
use feature_locator::blob_detection::{
    BlobDetector, ConfigError, LocationConfigStore, PercentRect, ScanRegion, StabilityConfig,
    create_default_config, create_strict_config,
};
use feature_locator::capture::{CaptureBackend, CaptureError, FrameSource, ImageFileSource};
use feature_locator::element_cache::{
    CoordinateStore, ELEMENTS_FILE, ElementLocator, LOCATIONS_FILE, LocateError, TEMPLATES_DIR,
    TemplateLibrary, create_single_shot_config, resolve_data_dir,
};
use feature_locator::frame::{Frame, Point};
use feature_locator::template_matching::{SearchControl, Template, TemplateMatcher};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to open image {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

type CliResult = Result<(), CliError>;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let data_dir = resolve_data_dir(args.data_dir);
    log::debug!("Data directory: {:?}", data_dir);

    match run(args.mode, &data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            if let CliError::Locate(err) = &e
                && err.is_transient()
            {
                eprintln!("🔁 This can succeed on a later frame, try again");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(mode: Mode, data_dir: &Path) -> CliResult {
    match mode {
        Mode::Match {
            frame,
            template,
            threshold,
            all,
            min_distance,
            wait_ms,
            annotate,
        } => match wait_ms {
            Some(wait_ms) => run_wait(&frame, &template, threshold, Duration::from_millis(wait_ms)).await,
            None => run_match(&frame, &template, threshold, all, min_distance, annotate.as_deref()),
        },
        Mode::Blob {
            frame,
            location,
            region,
            strict,
            annotate,
        } => {
            let frame = open_frame(&frame)?;
            let detector = detector_for(data_dir, &location, strict)?;
            let region = region.unwrap_or_else(|| detector.region_for(&frame));
            let report = detector.scan(&frame, region);
            println!(
                "🔍 Region {} mean={} threshold={} points={} blobs={}",
                report.region,
                report.mean_brightness,
                report.dark_threshold,
                report.candidate_points,
                report.blobs.len()
            );
            let mut overlay = Overlay::new(&frame);
            overlay.blobs(report.region, &report.blobs, report.best.as_ref());
            match &report.best {
                Some(best) => {
                    let cast = detector.casting_result(best.centroid, frame.width(), frame.height());
                    let confirmed = if report.best_confirmed { ", bubbles above" } else { "" };
                    println!("✅ Feature at {} (~{} px{})", best.centroid, best.size, confirmed);
                    println!("🎣 Drag {} -> {}", cast.anchor, cast.target);
                    overlay.cast(&cast);
                }
                None => match report.fallback {
                    Some(hit) => println!("🎨 No blob, location color at {}", hit),
                    None => println!("❌ No feature in region"),
                },
            }
            save_overlay(&overlay, annotate.as_deref())
        }
        Mode::Settle {
            frames,
            location,
            interval_ms,
            max_wait_ms,
            required,
            tolerance,
            strict,
            annotate,
        } => {
            let source = CaptureBackend::from_paths(&frames)?;
            let detector = detector_for(data_dir, &location, strict)?;
            let stability = StabilityConfig {
                required_stable_scans: required,
                position_tolerance: tolerance,
                scan_interval: Duration::from_millis(interval_ms),
                max_wait: Duration::from_millis(max_wait_ms),
            };
            println!("⏳ Waiting for '{}' feature to settle...", location);
            match detector.settle(&source, &stability, None).await {
                Some(settled) => {
                    let cast = detector.casting_result(settled.position, settled.frame_width, settled.frame_height);
                    println!("✅ Settled at {} after {} scans", settled.position, settled.scans);
                    println!("🎣 Drag {} -> {}", cast.anchor, cast.target);
                    if annotate.is_some() {
                        let frame = source.capture_frame().await?;
                        let mut overlay = Overlay::new(&frame);
                        overlay.cast(&cast);
                        save_overlay(&overlay, annotate.as_deref())?;
                    }
                }
                None => println!("❌ Feature did not settle"),
            }
            Ok(())
        }
        Mode::Locate {
            name,
            frame,
            description,
            force,
            annotate,
        } => {
            let mut locator = ElementLocator::open(ImageFileSource::new(frame.clone()), data_dir)
                .with_config(create_single_shot_config());
            let located = match locator.locate(&name, &description, force).await {
                Ok(located) => located,
                Err(LocateError::AcquisitionDenied { name }) => {
                    println!("💡 Register a template first: feature-locator register \"{name}\" --frame <png> --rect x,y,w,h");
                    return Err(LocateError::AcquisitionDenied { name }.into());
                }
                Err(e) => return Err(e.into()),
            };
            let confidence = located
                .confidence
                .map(|c| format!(" {:.0}%", c * 100.0))
                .unwrap_or_default();
            println!("✅ '{}' at {} ({:?}{})", name, located.point, located.source, confidence);
            if annotate.is_some() {
                let frame = open_frame(&frame)?;
                let mut overlay = Overlay::new(&frame);
                overlay.marker(located.point, feature_locator::annotate::MATCH_COLOR);
                save_overlay(&overlay, annotate.as_deref())?;
            }
            Ok(())
        }
        Mode::Register { name, frame, rect } => {
            let mut locator = ElementLocator::open(ImageFileSource::new(frame), data_dir);
            let path = locator.register_from_frame(&name, rect).await?;
            println!("✅ Template for '{}' saved to {}", name, path.display());
            Ok(())
        }
        Mode::SetManual { name, x, y, clear } => {
            let mut store = CoordinateStore::load(data_dir.join(ELEMENTS_FILE));
            let point = match (clear, x, y) {
                (false, Some(x), Some(y)) => Some(Point::new(x, y)),
                _ => None,
            };
            store.set_manual(&name, point);
            store.save()?;
            match point {
                Some(p) => println!("📌 Manual coordinate for '{}' set to {}", name, p),
                None => println!("🧹 Manual coordinate for '{}' cleared", name),
            }
            Ok(())
        }
        Mode::ClearCache { name } => {
            let mut store = CoordinateStore::load(data_dir.join(ELEMENTS_FILE));
            match name {
                Some(name) => {
                    if store.clear_cache(&name) {
                        println!("🧹 Cleared cached position of '{}'", name);
                    } else {
                        println!("❓ No record for '{}'", name);
                    }
                }
                None => {
                    store.clear_all();
                    println!("🧹 Cleared all cached positions");
                }
            }
            store.save()?;
            Ok(())
        }
        Mode::Forget { name } => {
            let library = TemplateLibrary::new(data_dir.join(TEMPLATES_DIR));
            let mut store = CoordinateStore::load(data_dir.join(ELEMENTS_FILE));
            let had_template = library.remove(&name)?;
            let had_record = store.remove(&name).is_some();
            if had_record {
                store.save()?;
            }
            if had_template || had_record {
                println!("🗑️  Forgot '{}' (template: {}, coordinates: {})", name, had_template, had_record);
            } else {
                println!("❓ Nothing stored for '{}'", name);
            }
            Ok(())
        }
        Mode::SetRegion {
            location,
            percent,
            reset,
        } => {
            let mut store = LocationConfigStore::load(data_dir.join(LOCATIONS_FILE))?;
            match percent {
                Some([x, y, w, h]) if !reset => {
                    store.set_scan_region(&location, ScanRegion::Percent(PercentRect::new(x, y, w, h)));
                    println!("📐 Scan region of '{}' set to {}%,{}%,{}%,{}%", location, x, y, w, h);
                }
                _ => {
                    if store.reset(&location) {
                        println!("🧹 '{}' uses its preset again", location);
                    } else {
                        println!("❓ '{}' had no override", location);
                    }
                }
            }
            store.save()?;
            Ok(())
        }
        Mode::List => {
            let store = CoordinateStore::load(data_dir.join(ELEMENTS_FILE));
            let library = TemplateLibrary::new(data_dir.join(TEMPLATES_DIR));
            let locations = LocationConfigStore::load(data_dir.join(LOCATIONS_FILE))?;

            println!("📋 Elements ({}):", store.records().len());
            for (name, record) in store.records() {
                let show = |p: Option<Point>| p.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "    {:<24} template={} cached={} manual={}",
                    name,
                    if library.exists(name) { "yes" } else { "no" },
                    show(record.cached_center),
                    show(record.manual)
                );
            }
            println!("🖼️  Templates in {}: {}", library.dir().display(), library.names().join(", "));
            println!("🌊 Locations:");
            for name in locations.names() {
                let marker = if locations.has_override(&name) { " (custom)" } else { "" };
                println!("    {}{}", name, marker);
            }
            Ok(())
        }
    }
}

fn run_match(
    frame: &Path,
    template: &Path,
    threshold: f32,
    all: bool,
    min_distance: u32,
    annotate: Option<&Path>,
) -> CliResult {
    let frame = open_frame(frame)?;
    let template = Template::open(template).map_err(|source| CliError::Image {
        path: template.to_path_buf(),
        source,
    })?;
    let matcher = TemplateMatcher::new();

    let results = if all {
        let matches = matcher.find_all_templates(&frame, &template, threshold, min_distance);
        println!("🔍 {} placements of {}", matches.len(), template.display_name());
        matches
    } else {
        let mut control = SearchControl::new().with_progress(|pct| {
            if pct % 25 == 0 {
                log::debug!("  ⏳ Template scanning: {}%", pct);
            }
        });
        vec![matcher.find_template_with(&frame, &template, threshold, &mut control)]
    };
    for result in &results {
        let icon = if result.found { "✅" } else { "❌" };
        println!("{} {} center={}", icon, result.describe(&template), result.center);
    }

    let mut overlay = Overlay::new(&frame);
    overlay.matches(&results);
    save_overlay(&overlay, annotate)
}

async fn run_wait(frame: &Path, template: &Path, threshold: f32, timeout: Duration) -> CliResult {
    let template = Template::open(template).map_err(|source| CliError::Image {
        path: template.to_path_buf(),
        source,
    })?;
    let source = ImageFileSource::new(frame.to_path_buf());
    println!("⏳ Waiting up to {:?} for {}...", timeout, template.display_name());
    let result = TemplateMatcher::new()
        .wait_for_template(&source, &template, threshold, timeout, Duration::from_millis(100), None)
        .await;
    if result.found {
        println!("✅ {} center={}", result.describe(&template), result.center);
    } else {
        println!("❌ {} did not appear", template.display_name());
    }
    Ok(())
}

fn open_frame(path: &Path) -> Result<Frame, CliError> {
    Frame::open(path).map_err(|source| CliError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn detector_for(data_dir: &Path, location: &str, strict: bool) -> Result<BlobDetector, CliError> {
    let store = LocationConfigStore::load(data_dir.join(LOCATIONS_FILE))?;
    let config = if strict { create_strict_config() } else { create_default_config() };
    Ok(BlobDetector::new(config, store.get(location)))
}

fn save_overlay(overlay: &Overlay, path: Option<&Path>) -> CliResult {
    let Some(path) = path else {
        return Ok(());
    };
    overlay.save(path).map_err(|source| CliError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    println!("🖍️  Overlay written to {}", path.display());
    Ok(())
}
