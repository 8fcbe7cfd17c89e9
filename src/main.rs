use std::{error::Error, path::PathBuf};

use clap::Parser;
use log::info;
use mpr_volume::{
    Interpolation, JsonFileSource, Layout, MeasurementEngine, MeasurementKind, Orientation, Point,
    Preset, SliceController, ViewerConfig, WindowLevel,
};

#[derive(Debug, clap::ValueEnum, Clone, Copy)]
enum ArgOrientation {
    Axial,
    Sagittal,
    Coronal,
    All,
}

#[derive(Debug, clap::ValueEnum, Clone, Copy)]
enum ArgPreset {
    Brain,
    Bone,
    Lung,
    SoftTissue,
}

impl From<ArgPreset> for Preset {
    fn from(preset: ArgPreset) -> Self {
        match preset {
            ArgPreset::Brain => Preset::Brain,
            ArgPreset::Bone => Preset::Bone,
            ArgPreset::Lung => Preset::Lung,
            ArgPreset::SoftTissue => Preset::SoftTissue,
        }
    }
}

/// Render MPR slices of a volume to PNG files.
#[derive(Parser, Debug)]
struct Args {
    /// Series to load from the volume directory
    series: String,
    /// Directory holding `<series>.json` volume files
    #[arg(long)]
    dir: Option<PathBuf>,
    /// JSON viewer configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "all")]
    orientation: ArgOrientation,
    /// Slice index, mid-volume if not given
    #[arg(long, allow_negative_numbers = true)]
    slice: Option<i64>,
    #[arg(long, value_enum, conflicts_with_all = ["center", "width"])]
    preset: Option<ArgPreset>,
    #[arg(long, allow_negative_numbers = true, requires = "width")]
    center: Option<f32>,
    #[arg(long, requires = "center")]
    width: Option<f32>,
    /// Resample sagittal and coronal planes to physical proportions
    #[arg(long)]
    bilinear: bool,
    /// Distance to measure on each rendered plane: x0 y0 x1 y1
    #[arg(long, num_args = 4, value_names = ["X0", "Y0", "X1", "Y1"])]
    measure: Option<Vec<f32>>,
    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Sync + Send>> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(dir) = &args.dir {
        config.volume_dir = dir.clone();
    }
    config.layout = match args.orientation {
        ArgOrientation::Axial => Layout::Single(Orientation::Axial),
        ArgOrientation::Sagittal => Layout::Single(Orientation::Sagittal),
        ArgOrientation::Coronal => Layout::Single(Orientation::Coronal),
        ArgOrientation::All => Layout::MultiPlanar,
    };
    if args.bilinear {
        config.interpolation = Interpolation::Bilinear;
    }

    let mut controller = SliceController::new(&config);
    let source = JsonFileSource::new(&config.volume_dir);
    controller.load_series(&source, &args.series).await?;

    if let Some(preset) = args.preset {
        controller.apply_preset(preset.into());
    }
    if let (Some(center), Some(width)) = (args.center, args.width) {
        controller.set_window_level(WindowLevel::new(center, width));
    }

    for &orientation in config.layout.orientations() {
        if let Some(index) = args.slice {
            controller.set_slice(orientation, index);
        }
        let Some(frame) = controller.frame(orientation) else {
            continue;
        };
        let out_path = args.out.join(format!(
            "{}_{}_{:04}.png",
            args.series,
            orientation.name(),
            frame.slice_index
        ));
        frame.image.save(&out_path)?;
        info!(
            "wrote {out_path:?} ({}x{}, slice {}/{})",
            frame.width(),
            frame.height(),
            frame.slice_index,
            frame.max_slice
        );

        if let Some(coords) = &args.measure {
            let mut engine = MeasurementEngine::new(controller.measurement_spacing(orientation));
            engine.select_tool(Some(MeasurementKind::Distance));
            engine.add_point(Point::new(coords[0], coords[1]));
            if let Some(measurement) = engine.add_point(Point::new(coords[2], coords[3])) {
                println!(
                    "{} distance: {:.2} {}",
                    orientation.name(),
                    measurement.value,
                    measurement.unit
                );
            }
        }
    }

    Ok(())
}
