//! Files on either side of a TuPlot/TuStat run.
//!
//! The executables are started elsewhere. They read the configuration from the
//! directory of the `.inp` file and leave one `.plt`/`.dat` pair per diagram there,
//! plus an optional `.out` report.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use derive_more::Constructor;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::formats::{inp::InpFile, plot};

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("File {} does not exist", .path.display())]
    #[diagnostic(
        code(tu_post::plotter::missing_file),
        help("The plotting executable did not produce all of its output files")
    )]
    MissingFile { path: PathBuf },
    #[error("{} is not executable", .path.display())]
    #[diagnostic(code(tu_post::plotter::permission), help("Set the execute permission bits"))]
    Permission { path: PathBuf },
    #[error("Output directory {} does not exist", .path.display())]
    #[diagnostic(code(tu_post::plotter::missing_directory))]
    MissingDirectory { path: PathBuf },
    #[error("Failed to move {}", .path.display())]
    #[diagnostic(code(tu_post::plotter::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Checks that a plotting executable exists and may be run.
pub fn check_executable(path: &Path) -> Result<(), Error> {
    let metadata = fs::metadata(path).map_err(|_| Error::MissingFile {
        path: path.to_path_buf(),
    })?;
    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(Error::Permission {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

/// The files written for one diagram.
#[derive(Debug, Clone, PartialEq, Eq, Constructor, Serialize, Deserialize)]
pub struct PlotOutput {
    pub data: PathBuf,
    pub metadata: PathBuf,
    pub report: Option<PathBuf>,
}

impl PlotOutput {
    pub fn read(&self) -> Result<plot::CurveSet, plot::Error> {
        plot::CurveSet::from_files(&self.metadata, &self.data, self.report.as_deref())
    }
}

/// Where a run is expected to leave its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub outputs: Vec<PlotOutput>,
}

impl OutputFiles {
    /// Predicts the output of a run over `count` diagrams of a configuration in `inp_dir`.
    ///
    /// The unix builds number their pairs `<stem>01`, `<stem>02`, ... while the Windows
    /// builds write a single unnumbered pair. Every diagram shares the `<stem>.out` report.
    pub fn predict(inp_dir: &Path, stem: &str, count: usize) -> Self {
        let report = inp_dir.join(format!("{stem}.out"));
        let outputs = (1..=count)
            .map(|n| {
                let name = if cfg!(windows) {
                    stem.to_string()
                } else {
                    format!("{stem}{n:02}")
                };
                PlotOutput::new(
                    inp_dir.join(format!("{name}.dat")),
                    inp_dir.join(format!("{name}.plt")),
                    Some(report.clone()),
                )
            })
            .collect();
        Self { outputs }
    }

    /// The output of running a loaded configuration, `None` if it has no diagrams.
    pub fn for_inp(inp: &InpFile) -> Option<Self> {
        let kind = inp.kind()?;
        Some(Self::predict(inp.directory(), kind.stem(), inp.diagrams.len()))
    }

    /// Moves the files of a finished run into `output_dir` and returns their new paths.
    ///
    /// Every data and metadata file must exist. A missing report is recorded as `None`.
    #[instrument(skip(self), fields(output_dir = %output_dir.display()))]
    pub fn collect(self, output_dir: &Path) -> Result<Vec<PlotOutput>, Error> {
        if !output_dir.is_dir() {
            return Err(Error::MissingDirectory {
                path: output_dir.to_path_buf(),
            });
        }

        let mut collected = Vec::with_capacity(self.outputs.len());
        let mut moved_reports: Vec<(PathBuf, PathBuf)> = Vec::new();
        for output in self.outputs {
            for path in [&output.data, &output.metadata] {
                if !path.is_file() {
                    return Err(Error::MissingFile { path: path.clone() });
                }
            }
            let data = move_into(&output.data, output_dir)?;
            let metadata = move_into(&output.metadata, output_dir)?;

            let report = match output.report {
                Some(report) if report.is_file() => {
                    let moved = move_into(&report, output_dir)?;
                    moved_reports.push((report, moved.clone()));
                    Some(moved)
                }
                // Shared with an earlier diagram and already moved
                Some(report) => moved_reports
                    .iter()
                    .find(|(from, _)| *from == report)
                    .map(|(_, to)| to.clone()),
                None => None,
            };
            collected.push(PlotOutput::new(data, metadata, report));
        }
        Ok(collected)
    }
}

fn target(path: &Path, dir: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}

fn move_into(path: &Path, dir: &Path) -> Result<PathBuf, Error> {
    let to = target(path, dir);
    if to == path {
        return Ok(to);
    }
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    if fs::rename(path, &to).is_err() {
        // Across filesystems
        fs::copy(path, &to).map_err(io_err)?;
        fs::remove_file(path).map_err(io_err)?;
    }
    debug!(from = %path.display(), to = %to.display(), "Moved output file");
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUPLOT01_PLT: &str = include_str!("../../demo-rod/TuPlot01.plt");
    const TUPLOT01_DAT: &str = include_str!("../../demo-rod/TuPlot01.dat");
    const TUPLOT_INP: &str = include_str!("../../demo-rod/TuPlot.inp");

    #[cfg(unix)]
    #[test]
    fn executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tuplotgui");
        assert!(matches!(check_executable(&exe), Err(Error::MissingFile { .. })));

        fs::write(&exe, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(check_executable(&exe), Err(Error::Permission { .. })));

        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        check_executable(&exe).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn predicted_names() {
        let files = OutputFiles::predict(Path::new("/runs/rodcd"), "TuPlot", 2);
        assert_eq!(
            files.outputs,
            vec![
                PlotOutput::new(
                    "/runs/rodcd/TuPlot01.dat".into(),
                    "/runs/rodcd/TuPlot01.plt".into(),
                    Some("/runs/rodcd/TuPlot.out".into()),
                ),
                PlotOutput::new(
                    "/runs/rodcd/TuPlot02.dat".into(),
                    "/runs/rodcd/TuPlot02.plt".into(),
                    Some("/runs/rodcd/TuPlot.out".into()),
                ),
            ]
        );

        let inp = InpFile::parse("/runs/rodcd/TuPlot.inp", TUPLOT_INP).unwrap();
        assert_eq!(OutputFiles::for_inp(&inp), Some(files));
        assert_eq!(OutputFiles::for_inp(&InpFile::new("TuPlot.inp", vec![])), None);
    }

    #[cfg(unix)]
    #[test]
    fn collect_moves_files() {
        let run = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(run.path().join("TuPlot01.plt"), TUPLOT01_PLT).unwrap();
        fs::write(run.path().join("TuPlot01.dat"), TUPLOT01_DAT).unwrap();
        fs::write(run.path().join("TuPlot.out"), "report").unwrap();

        let collected = OutputFiles::predict(run.path(), "TuPlot", 1)
            .collect(out.path())
            .unwrap();
        assert_eq!(collected.len(), 1);
        let output = &collected[0];
        assert_eq!(output.data, out.path().join("TuPlot01.dat"));
        assert_eq!(output.report, Some(out.path().join("TuPlot.out")));
        assert!(!run.path().join("TuPlot01.dat").exists());

        let curves = output.read().unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves.report.as_deref(), Some("report"));
    }

    #[cfg(unix)]
    #[test]
    fn report_is_optional() {
        let run = tempfile::tempdir().unwrap();
        for name in ["TuStat01.plt", "TuStat01.dat", "TuStat02.plt", "TuStat02.dat"] {
            fs::write(run.path().join(name), "").unwrap();
        }
        let collected = OutputFiles::predict(run.path(), "TuStat", 2)
            .collect(run.path())
            .unwrap();
        assert!(collected.iter().all(|output| output.report.is_none()));
        assert_eq!(collected[1].metadata, run.path().join("TuStat02.plt"));
    }

    #[cfg(unix)]
    #[test]
    fn shared_report_is_moved_once() {
        let run = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["TuPlot01.plt", "TuPlot01.dat", "TuPlot02.plt", "TuPlot02.dat"] {
            fs::write(run.path().join(name), "").unwrap();
        }
        fs::write(run.path().join("TuPlot.out"), "report").unwrap();

        let collected = OutputFiles::predict(run.path(), "TuPlot", 2)
            .collect(out.path())
            .unwrap();
        let report = Some(out.path().join("TuPlot.out"));
        assert_eq!(collected[0].report, report);
        assert_eq!(collected[1].report, report);
    }

    #[test]
    fn missing_output() {
        let run = tempfile::tempdir().unwrap();
        fs::write(run.path().join("TuPlot01.plt"), TUPLOT01_PLT).unwrap();
        let files = OutputFiles {
            outputs: vec![PlotOutput::new(
                run.path().join("TuPlot01.dat"),
                run.path().join("TuPlot01.plt"),
                None,
            )],
        };

        assert!(matches!(
            files.clone().collect(&run.path().join("nope")),
            Err(Error::MissingDirectory { .. })
        ));
        match files.collect(run.path()) {
            Err(Error::MissingFile { path }) => assert_eq!(path, run.path().join("TuPlot01.dat")),
            other => panic!("expected a missing file, got {other:?}"),
        }
    }
}
