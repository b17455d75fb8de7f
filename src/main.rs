use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use terrain_forge::config::ForgeConfig;
use terrain_forge::curve::TerraceBands;
use terrain_forge::derived::{
    aspect_map, curvature_map, flow_map, normal_map, slope_map, AspectEncoding, AspectParams,
    CurvatureKind, CurvatureParams, FlowParams, NormalParams, NormalSpace, PostProcess, SlopeParams,
};
use terrain_forge::erosion::{self, ErosionPreset, HydraulicParams, RainMap, ThermalParams};
use terrain_forge::export::{
    export_channel, export_heightfield, export_normal_map, import_heightfield,
};
use terrain_forge::mask::{MaskCompositor, MaskLayer, MergeOperator};
use terrain_forge::synth::{NoiseKind, NoiseSynthesizer};
use terrain_forge::world::{ImageTerrain, LiveTerrain, TileWorldManager};
use terrain_forge::HeightField;

#[derive(Parser, Debug)]
#[command(name = "terrain_forge")]
#[command(about = "Heightfield filters, erosion and terrain synthesis")]
struct Args {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize a fractal noise height field
    Noise {
        output: PathBuf,
        #[arg(short = 'W', long, default_value = "513")]
        width: usize,
        #[arg(short = 'D', long, default_value = "513")]
        depth: usize,
        /// Random seed (uses the config seed if not specified)
        #[arg(short, long)]
        seed: Option<u64>,
        /// perlin, billow or ridged
        #[arg(short, long)]
        kind: Option<NoiseKind>,
        #[arg(long)]
        octaves: Option<usize>,
        #[arg(long)]
        zoom: Option<f64>,
        #[arg(long)]
        offset: Option<f32>,
    },

    /// Thermal (talus) erosion
    Thermal {
        input: PathBuf,
        output: PathBuf,
        /// gentle, normal or dramatic
        #[arg(short, long)]
        preset: Option<ErosionPreset>,
        #[arg(short, long)]
        iterations: Option<usize>,
        /// Hardness image (white resists erosion)
        #[arg(long)]
        hardness: Option<PathBuf>,
        /// Mask image gating the effect
        #[arg(long)]
        mask: Option<PathBuf>,
    },

    /// Grid-based hydraulic erosion
    Hydraulic {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        preset: Option<ErosionPreset>,
        #[arg(short, long)]
        iterations: Option<usize>,
        /// Iterations between rainfalls
        #[arg(long)]
        rain_frequency: Option<usize>,
        #[arg(long, value_enum)]
        rain: Option<RainArg>,
        #[arg(long)]
        hardness: Option<PathBuf>,
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Write the dissolved-material map here
        #[arg(long)]
        sediment: Option<PathBuf>,
    },

    /// Curve-shaped terracing
    Terrace {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "8")]
        bands: usize,
        /// 0 = soft ramps, towards 1 = flat treads with steep risers
        #[arg(short, long, default_value = "0.5")]
        sharpness: f32,
    },

    /// Export a map derived from a height field
    Derive {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum)]
        map: DerivedArg,
        /// Flow routing iterations
        #[arg(long, default_value = "64")]
        iterations: usize,
        #[arg(long)]
        normalise: bool,
        #[arg(long)]
        invert: bool,
        #[arg(long)]
        flip: bool,
    },

    /// Combine one or two mask images
    Mask {
        first: PathBuf,
        output: PathBuf,
        second: Option<PathBuf>,
        #[arg(long, value_enum)]
        op: Option<MergeArg>,
    },

    /// Operate on a directory of tile_<x>_<z>.png tiles
    World {
        dir: PathBuf,
        #[command(subcommand)]
        action: WorldAction,
    },
}

#[derive(Subcommand, Debug)]
enum WorldAction {
    /// Print the tile grid
    Info,
    Flatten {
        #[arg(default_value = "0.0")]
        height: f32,
    },
    Smooth {
        #[arg(default_value = "1")]
        passes: usize,
    },
    /// Fill all tiles from the configured noise
    Synthesize {
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Stitch every tile into one image
    Export { output: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RainArg {
    Constant,
    Peak,
    Valley,
    Slope,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DerivedArg {
    Slope,
    Aspect,
    AspectNs,
    AspectEw,
    AspectOctant,
    Curvature,
    Profile,
    Plan,
    Flow,
    Normal,
    WorldNormal,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MergeArg {
    Max,
    Min,
    Add,
    Multiply,
    Subtract,
}

impl From<RainArg> for RainMap {
    fn from(arg: RainArg) -> Self {
        match arg {
            RainArg::Constant => RainMap::Constant,
            RainArg::Peak => RainMap::PeakWeighted,
            RainArg::Valley => RainMap::ValleyWeighted,
            RainArg::Slope => RainMap::SlopeWeighted,
        }
    }
}

impl From<MergeArg> for MergeOperator {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Max => MergeOperator::AssignIfGreaterThan,
            MergeArg::Min => MergeOperator::AssignIfLessThan,
            MergeArg::Add => MergeOperator::Add,
            MergeArg::Multiply => MergeOperator::Multiply,
            MergeArg::Subtract => MergeOperator::Subtract,
        }
    }
}

fn load_field(path: &Path, config: &ForgeConfig) -> Result<HeightField, Box<dyn Error>> {
    let field = import_heightfield(path)?.with_scale(config.scale);
    let stats = field.stats();
    println!(
        "Loaded {} ({}x{}, range {:.3}-{:.3})",
        path.display(),
        field.width(),
        field.depth(),
        stats.min,
        stats.max
    );
    Ok(field)
}

fn load_optional(path: Option<&PathBuf>, config: &ForgeConfig) -> Result<Option<HeightField>, Box<dyn Error>> {
    path.map(|p| load_field(p, config)).transpose()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::default(),
    };

    match args.command {
        Command::Noise {
            output,
            width,
            depth,
            seed,
            kind,
            octaves,
            zoom,
            offset,
        } => {
            if width == 0 || depth == 0 {
                return Err("width and depth must be positive".into());
            }
            let noise = &mut config.noise;
            if let Some(seed) = seed {
                noise.seed = seed;
            }
            if let Some(kind) = kind {
                noise.kind = kind;
            }
            if let Some(octaves) = octaves {
                noise.octaves = octaves;
            }
            if let Some(zoom) = zoom {
                noise.zoom = zoom;
            }
            if let Some(offset) = offset {
                noise.offset = offset;
            }

            println!("Generating {:?} noise with seed: {}", noise.kind, noise.seed);
            let synth = NoiseSynthesizer::new(noise.clone())?;
            let field = synth.generate(width, depth).with_scale(config.scale);
            let stats = field.stats();
            println!("Range {:.3}-{:.3}, mean {:.3}", stats.min, stats.max, stats.mean);
            export_heightfield(&field, &output)?;
        }

        Command::Thermal {
            input,
            output,
            preset,
            iterations,
            hardness,
            mask,
        } => {
            let mut params = match preset {
                Some(p) => ThermalParams::from_preset(p),
                None => config.thermal.clone(),
            };
            if let Some(n) = iterations {
                params.iterations = n;
            }
            let mut field = load_field(&input, &config)?;
            let hardness = load_optional(hardness.as_ref(), &config)?;
            let mask = load_optional(mask.as_ref(), &config)?;

            println!(
                "Thermal erosion: {} passes, talus {}-{} degrees",
                params.iterations, params.talus_min, params.talus_max
            );
            let start = Instant::now();
            let outcome = erosion::erode_thermal(
                &mut field,
                &params,
                hardness.as_ref(),
                mask.as_ref(),
                &mut (),
            );
            println!("{} in {:.2?}", outcome.stats.summary(), start.elapsed());
            export_heightfield(&field, &output)?;
        }

        Command::Hydraulic {
            input,
            output,
            preset,
            iterations,
            rain_frequency,
            rain,
            hardness,
            mask,
            sediment,
        } => {
            let mut params = match preset {
                Some(p) => HydraulicParams::from_preset(p),
                None => config.hydraulic.clone(),
            };
            if let Some(n) = iterations {
                params.iterations = n;
            }
            if let Some(f) = rain_frequency {
                params.rain_frequency = f;
            }
            if let Some(r) = rain {
                params.rain_map = r.into();
            }
            let mut field = load_field(&input, &config)?;
            let hardness = load_optional(hardness.as_ref(), &config)?;
            let mask = load_optional(mask.as_ref(), &config)?;

            println!(
                "Hydraulic erosion: {} steps, rain every {} ({:?})",
                params.iterations, params.rain_frequency, params.rain_map
            );
            let start = Instant::now();
            let (outcome, dissolved) = erosion::erode_hydraulic(
                &mut field,
                &params,
                hardness.as_ref(),
                mask.as_ref(),
                &mut (),
            );
            println!("{} in {:.2?}", outcome.stats.summary(), start.elapsed());
            println!("Dissolved material: {:.4}", dissolved.total());
            export_heightfield(&field, &output)?;
            if let Some(path) = sediment {
                export_heightfield(&dissolved.normalized(), &path)?;
            }
        }

        Command::Terrace {
            input,
            output,
            bands,
            sharpness,
        } => {
            let mut field = load_field(&input, &config)?;
            let terraces = TerraceBands::uniform(bands, sharpness)?;
            terraces.apply(&mut field)?;
            println!("Terraced into {} bands", terraces.len());
            export_heightfield(&field, &output)?;
        }

        Command::Derive {
            input,
            output,
            map,
            iterations,
            normalise,
            invert,
            flip,
        } => {
            let field = load_field(&input, &config)?;
            let post = PostProcess {
                flip,
                invert,
                normalise,
            };
            let aspect = |encoding| AspectParams {
                encoding,
                post,
                ..Default::default()
            };
            let curvature = |kind| CurvatureParams {
                kind,
                post,
                ..Default::default()
            };
            let normal = |space| NormalParams {
                space,
                post,
                ..Default::default()
            };

            match map {
                DerivedArg::Slope => export_heightfield(
                    &slope_map(&field, &SlopeParams { post, ..Default::default() }),
                    &output,
                )?,
                DerivedArg::Aspect => {
                    export_heightfield(&aspect_map(&field, &aspect(AspectEncoding::Degrees)), &output)?
                }
                DerivedArg::AspectNs => export_heightfield(
                    &aspect_map(&field, &aspect(AspectEncoding::NorthSouth)),
                    &output,
                )?,
                DerivedArg::AspectEw => export_heightfield(
                    &aspect_map(&field, &aspect(AspectEncoding::EastWest)),
                    &output,
                )?,
                DerivedArg::AspectOctant => export_heightfield(
                    &aspect_map(&field, &aspect(AspectEncoding::Octant)),
                    &output,
                )?,
                DerivedArg::Curvature => export_heightfield(
                    &curvature_map(&field, &curvature(CurvatureKind::Mean)),
                    &output,
                )?,
                DerivedArg::Profile => export_heightfield(
                    &curvature_map(&field, &curvature(CurvatureKind::Profile)),
                    &output,
                )?,
                DerivedArg::Plan => export_heightfield(
                    &curvature_map(&field, &curvature(CurvatureKind::Plan)),
                    &output,
                )?,
                DerivedArg::Flow => {
                    let params = FlowParams {
                        iterations,
                        log_scale: true,
                        post,
                    };
                    let result = flow_map(&field, &params, &mut ());
                    println!("Flow routed for {} iterations", result.completed_iterations);
                    export_channel(result.map.tilemap(), &output)?;
                }
                DerivedArg::Normal => {
                    export_normal_map(&normal_map(&field, &normal(NormalSpace::Tangent)), &output)?
                }
                DerivedArg::WorldNormal => {
                    export_normal_map(&normal_map(&field, &normal(NormalSpace::World)), &output)?
                }
            }
        }

        Command::Mask {
            first,
            output,
            second,
            op,
        } => {
            let operator = op.map(MergeOperator::from).unwrap_or(config.merge);
            let mut compositor = MaskCompositor::new();
            let first = MaskLayer::image(first);
            let second = second.map(MaskLayer::image);
            match compositor.compose(Some(&first), second.as_ref(), operator)? {
                Some(mask) => {
                    println!("Mask {}x{} ({:?})", mask.width(), mask.depth(), operator);
                    export_heightfield(&mask, &output)?;
                }
                None => println!("No active mask layers"),
            }
        }

        Command::World { dir, action } => {
            let terrains: Vec<Box<dyn LiveTerrain>> = ImageTerrain::discover(&dir, config.scale)?
                .into_iter()
                .map(|t| Box::new(t) as Box<dyn LiveTerrain>)
                .collect();
            let mut world = TileWorldManager::new(terrains, config.max_snapshots)?;
            world.load_from_world()?;
            let (gw, gd) = world.grid_size();
            let (w, d) = world.tile_resolution();
            println!("World: {}x{} tiles of {}x{} samples", gw, gd, w, d);

            match action {
                WorldAction::Info => {
                    for tile in world.tiles() {
                        let stats = tile.field.stats();
                        println!(
                            "  tile {}: range {:.3}-{:.3}, mean {:.3}",
                            tile.coord, stats.min, stats.max, stats.mean
                        );
                    }
                }
                WorldAction::Flatten { height } => {
                    world.flatten_world(height)?;
                    println!("Flattened to {:.3}", height);
                }
                WorldAction::Smooth { passes } => {
                    world.smooth_world(passes)?;
                    println!("Smoothed with {} passes", passes);
                }
                WorldAction::Synthesize { seed } => {
                    if let Some(seed) = seed {
                        config.noise.seed = seed;
                    }
                    world.synthesize_world(&config.noise)?;
                    println!("Synthesized with seed: {}", config.noise.seed);
                }
                WorldAction::Export { output } => {
                    world.export_world_as_image(&output)?;
                    println!("Exported to {}", output.display());
                }
            }
        }
    }

    Ok(())
}
