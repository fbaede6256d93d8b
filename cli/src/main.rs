use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tu_post_core::{
    file::Run,
    formats::{
        da::{DirectAccessFile, Timestamps},
        inp::InpFile,
        pli::CompanionKind,
        plot::CurveSet,
    },
    plotter::{check_executable, OutputFiles},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe a run from its .pli manifest
    Manifest {
        /// Path to the .pli file
        #[arg(value_name = "FILE")]
        pli: PathBuf,
    },
    /// Decode one of the direct-access files of a run and print its time axis
    Decode {
        /// Path to the .pli file
        #[arg(value_name = "FILE")]
        pli: PathBuf,
        #[arg(value_enum)]
        companion: Companion,
        /// Float width of the .sta file, overrides IBYTE
        #[arg(long)]
        byte_width: Option<usize>,
    },
    /// List the diagrams of a plot configuration
    Inp {
        /// Path to the .inp file
        #[arg(value_name = "FILE")]
        inp: PathBuf,
        /// Check the referenced runs and save under TuPlot.inp or TuStat.inp
        #[arg(long)]
        normalize: bool,
    },
    /// Read the curves of a .plt/.dat pair
    Curves {
        plt: PathBuf,
        dat: PathBuf,
        /// The .out report of the run, if any
        #[arg(long)]
        out: Option<PathBuf>,
        /// Export the curves as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
    /// Move the files left by a plotting run into an output directory
    Collect {
        /// Path to the .inp file that was run
        #[arg(value_name = "FILE")]
        inp: PathBuf,
        /// Defaults to the directory of the .inp file
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Plotting executable to check
        #[arg(long)]
        executable: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Companion {
    Mic,
    Mac,
    Sta,
}

impl From<Companion> for CompanionKind {
    fn from(companion: Companion) -> Self {
        match companion {
            Companion::Mic => Self::Micro,
            Companion::Mac => Self::Macro,
            Companion::Sta => Self::Statistics,
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    match args.command {
        Command::Manifest { pli } => manifest(&pli, args.json),
        Command::Decode {
            pli,
            companion,
            byte_width,
        } => decode(&pli, companion.into(), byte_width, args.json),
        Command::Inp { inp, normalize } => inp_file(&inp, normalize, args.json),
        Command::Curves { plt, dat, out, csv } => {
            curves(&plt, &dat, out.as_deref(), csv.as_deref(), args.json)
        }
        Command::Collect {
            inp,
            output_dir,
            executable,
        } => collect(&inp, output_dir, executable.as_deref(), args.json),
    }
}

fn print_json(value: &impl Serialize) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn manifest(path: &Path, json: bool) -> color_eyre::Result<()> {
    let run = Run::from_manifest(path)?;
    run.check_companions()?;
    if json {
        return print_json(&run);
    }

    for (key, value) in &run.pli.options {
        println!("{key} = {value}");
    }
    for kind in [
        CompanionKind::Micro,
        CompanionKind::Macro,
        CompanionKind::Statistics,
    ] {
        if let (Some(companion), Some(path)) = (run.pli.companion(kind), run.companion_path(kind)) {
            println!(
                "{}: {} ({} values per record)",
                kind.extension(),
                path.display(),
                companion.record_length
            );
        }
    }
    println!("{} axial slices", run.pli.axial_steps);
    Ok(())
}

fn decode(
    path: &Path,
    kind: CompanionKind,
    byte_width: Option<usize>,
    json: bool,
) -> color_eyre::Result<()> {
    let run = Run::from_manifest(path)?;
    let file: DirectAccessFile = match (kind, byte_width) {
        (CompanionKind::Micro, _) => run.micro_file(),
        (CompanionKind::Macro, _) => run.macro_file(),
        (CompanionKind::Statistics, Some(width)) => run.statistics_file_with_width(width)?,
        (CompanionKind::Statistics, None) => run.statistics_file()?,
    };
    let (records, times) = file.decode_with_timestamps()?;
    info!(shape = ?records.shape(), "Decoded {}", file.path().display());

    if json {
        #[derive(Serialize)]
        struct Decoded<'a> {
            shape: &'a [usize],
            times: &'a Timestamps,
        }
        return print_json(&Decoded {
            shape: records.shape(),
            times: &times,
        });
    }
    println!("shape {:?}", records.shape());
    for label in times.labels() {
        println!("{label}");
    }
    Ok(())
}

fn inp_file(path: &Path, normalize: bool, json: bool) -> color_eyre::Result<()> {
    let mut inp = InpFile::from_path(path)?;
    if normalize {
        let saved = inp.save_loaded()?;
        info!("Configuration ready at {}", saved.display());
    }
    if json {
        return print_json(&inp.diagrams);
    }

    for diagram in &inp.diagrams {
        println!(
            "{} {} {} ({})",
            diagram.plot_index,
            diagram.kind.stem(),
            diagram.kind.number(),
            diagram.manifest
        );
    }
    Ok(())
}

fn curves(
    plt: &Path,
    dat: &Path,
    out: Option<&Path>,
    csv: Option<&Path>,
    json: bool,
) -> color_eyre::Result<()> {
    let set = CurveSet::from_files(plt, dat, out)?;
    if let Some(csv) = csv {
        for written in set.export_csv(csv)? {
            info!("Wrote {}", written.display());
        }
    }
    if json {
        return print_json(&set);
    }

    println!("{}", set.title);
    println!("x: {}, y: {}", set.x_title, set.y_title);
    for curve in set.curves() {
        println!("{}: {} points", curve.label, curve.points.len());
    }
    Ok(())
}

fn collect(
    inp: &Path,
    output_dir: Option<PathBuf>,
    executable: Option<&Path>,
    json: bool,
) -> color_eyre::Result<()> {
    if let Some(executable) = executable {
        check_executable(executable)?;
    }
    let inp = InpFile::from_path(inp)?;
    let files = OutputFiles::for_inp(&inp)
        .ok_or_else(|| eyre::eyre!("{} has no diagrams", inp.path.display()))?;
    let output_dir = output_dir.unwrap_or_else(|| inp.directory().to_path_buf());
    let outputs = files.collect(&output_dir)?;

    if json {
        return print_json(&outputs);
    }
    for output in outputs {
        println!("{} {}", output.metadata.display(), output.data.display());
    }
    Ok(())
}
