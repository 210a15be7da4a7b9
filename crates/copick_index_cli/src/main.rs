//! `copick-index` command-line browser.
//!
//! # Responsibility
//! - Open one project from its configuration document.
//! - Walk exactly the levels a subcommand asks for and print them.
//! - `take` is the only subcommand that writes to the project.
//!
//! Exit code is `2` for configuration failures and `1` for storage failures.

use clap::{Parser, Subcommand};
use copick_index_core::{
    default_log_level, init_logging, NodeId, ProjectIndex, PyramidLevel, RunRef, SpacingRef,
    StorageError, TomogramRef, VoxelSize,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "copick-index", version, about = "Browse a copick project lazily")]
struct Cli {
    /// Path to the project configuration JSON.
    config: PathBuf,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for rolling log files. Logging stays off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List runs (default).
    Runs,
    /// List voxel spacings of one run.
    Spacings { run: String },
    /// List tomograms of one run at one voxel spacing.
    Tomograms { run: String, spacing: String },
    /// List annotation files of one run.
    Picks { run: String },
    /// List segmentation groups of one run.
    Segmentations { run: String },
    /// List mesh files of one run.
    Meshes { run: String },
    /// Copy one annotation file's points into the configured user's picks.
    Take {
        run: String,
        /// Annotation file name, e.g. `pytom_0_ribosome.json`.
        file: String,
    },
    /// Resolve a tomogram pyramid level and print its array metadata.
    Resolve {
        run: String,
        spacing: String,
        tomo_type: String,
        #[arg(long, default_value = "full")]
        level: PyramidLevel,
    },
    /// List pickable objects and try their reference maps.
    Objects,
    /// List runs and spacings, then report what loaded and what failed.
    Summary,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Runs => "runs",
            Self::Spacings { .. } => "spacings",
            Self::Tomograms { .. } => "tomograms",
            Self::Picks { .. } => "picks",
            Self::Segmentations { .. } => "segmentations",
            Self::Meshes { .. } => "meshes",
            Self::Take { .. } => "take",
            Self::Resolve { .. } => "resolve",
            Self::Objects => "objects",
            Self::Summary => "summary",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    let index = match ProjectIndex::open_path(&cli.config) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let command = cli.command.unwrap_or(Command::Runs);
    info!(
        "event=cli_command module=cli status=start project_id={} command={}",
        index.instance_id(),
        command.name()
    );
    match run(&index, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(index: &ProjectIndex, command: Command) -> Result<(), StorageError> {
    match command {
        Command::Runs => {
            for run in index.list_runs()? {
                println!("{}", run.name);
            }
        }
        Command::Spacings { run } => {
            for spacing in index.list_voxel_spacings(&RunRef::new(run))? {
                println!("{}", spacing.voxel_size);
            }
        }
        Command::Tomograms { run, spacing } => {
            let spacing = spacing_ref(index, run, &spacing)?;
            for tomogram in index.list_tomograms(&spacing)? {
                println!("{}\t{}", tomogram.tomo_type, tomogram.path);
            }
        }
        Command::Picks { run } => {
            for annotation in index.list_annotations(&RunRef::new(run))? {
                let origin = if annotation.from_tool() { "tool" } else { "user" };
                println!(
                    "{}\t{}\t{}\t{}",
                    annotation.key.object_name,
                    annotation.key.user_id,
                    annotation.key.session_id,
                    origin
                );
            }
        }
        Command::Segmentations { run } => {
            for segmentation in index.list_segmentations(&RunRef::new(run))? {
                let kind = if segmentation.is_multilabel { "multilabel" } else { "binary" };
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    segmentation.name(),
                    segmentation.voxel_size,
                    segmentation.key.user_id,
                    segmentation.key.session_id,
                    kind
                );
            }
        }
        Command::Meshes { run } => {
            for mesh in index.list_meshes(&RunRef::new(run))? {
                println!(
                    "{}\t{}\t{}\t{}",
                    mesh.object_name(),
                    mesh.key.user_id,
                    mesh.key.session_id,
                    mesh.path
                );
            }
        }
        Command::Take { run, file } => {
            let run = RunRef::new(run);
            let source = index
                .list_annotations(&run)?
                .into_iter()
                .find(|annotation| annotation.path.ends_with(&format!("/{file}")))
                .ok_or_else(|| {
                    StorageError::not_found(
                        NodeId::annotations(run.name.as_str()),
                        format!("no annotation file `{file}`"),
                    )
                })?;
            let stored = index.take_picks(&source)?;
            println!("{}", stored.path);
        }
        Command::Resolve {
            run,
            spacing,
            tomo_type,
            level,
        } => {
            let spacing = spacing_ref(index, run, &spacing)?;
            let tomogram = find_tomogram(index, &spacing, &tomo_type)?;
            let handle = index.resolve_tomogram(&tomogram, level)?;
            let metadata = handle.metadata();
            println!("path\t{}", handle.path());
            println!("level\t{}", handle.level());
            println!("shape\t{:?}", handle.shape());
            println!("chunks\t{:?}", metadata.chunks);
            println!("dtype\t{}", metadata.dtype);
        }
        Command::Objects => {
            for object in index.pickable_objects() {
                let map = match index.resolve_object_volume(object.name.as_str()) {
                    Ok(volume) => format!("{:?}", volume.header.dims),
                    Err(err) => format!("unavailable ({})", err.kind),
                };
                let label = object
                    .label
                    .map_or_else(|| "-".to_string(), |label| label.to_string());
                println!("{}\t{}\t{}", object.name, label, map);
            }
        }
        Command::Summary => print_summary(index)?,
    }
    Ok(())
}

fn spacing_ref(
    index: &ProjectIndex,
    run: String,
    spacing: &str,
) -> Result<SpacingRef, StorageError> {
    let run = RunRef::new(run);
    let voxel_size = VoxelSize::parse(spacing).ok_or_else(|| {
        StorageError::invalid_data(
            run.node_id(),
            format!("`{spacing}` is not a voxel spacing in angstrom"),
        )
    })?;
    // Matched by value so `10`, `10.0` and `10.000` find the listed directory.
    index
        .list_voxel_spacings(&run)?
        .into_iter()
        .find(|known| known.voxel_size == voxel_size)
        .ok_or_else(|| {
            StorageError::not_found(
                NodeId::voxel_spacing(run.name.as_str(), voxel_size),
                "voxel spacing not present in run",
            )
        })
}

fn find_tomogram(
    index: &ProjectIndex,
    spacing: &SpacingRef,
    tomo_type: &str,
) -> Result<TomogramRef, StorageError> {
    index
        .list_tomograms(spacing)?
        .into_iter()
        .find(|tomogram| tomogram.tomo_type == tomo_type)
        .ok_or_else(|| {
            StorageError::not_found(
                spacing.node_id(),
                format!("no tomogram of type `{tomo_type}`"),
            )
        })
}

fn print_summary(index: &ProjectIndex) -> Result<(), StorageError> {
    for run in index.list_runs()? {
        // Per-run failures are reported below, not fatal.
        let _ = index.list_voxel_spacings(&run);
    }
    let summary = index.summary();
    match summary.runs_total() {
        Some(total) => println!("runs\t{} of {} loaded", summary.runs_loaded, total),
        None => println!("runs\tunresolved"),
    }
    for failure in &summary.failures {
        println!("failed\t{}\t{}\t{}", failure.node, failure.kind, failure.message);
    }
    Ok(())
}
