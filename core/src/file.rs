use std::path::{Path, PathBuf};

use derive_more::Constructor;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::formats::{
    da::{self, DirectAccessFile, Timestamps},
    pli::{self, CompanionKind, Pli},
};

#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] pli::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Record(#[from] da::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor, Serialize, Deserialize)]
pub struct RunPath {
    /// The directory containing the run files
    pub directory: PathBuf,
    /// File name of the `.pli` manifest
    pub manifest: String,
}

impl RunPath {
    pub fn from_manifest(path: &Path) -> Self {
        Self::new(
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(&self.manifest)
    }

    pub fn open(self) -> Result<Run, RunError> {
        Run::open(self)
    }
}

/// A TRANSURANUS run as described by its `.pli` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Where the run files are
    pub path: RunPath,
    /// The run metadata from the .pli file
    pub pli: Pli,
}

impl Run {
    #[instrument(skip_all, fields(manifest = %path.manifest_path().display()))]
    pub fn open(path: RunPath) -> Result<Self, RunError> {
        let pli = Pli::from_path(&path.manifest_path())?;
        Ok(Self { path, pli })
    }

    pub fn from_manifest(path: &Path) -> Result<Self, RunError> {
        Self::open(RunPath::from_manifest(path))
    }

    pub fn companion_path(&self, kind: CompanionKind) -> Option<PathBuf> {
        self.pli.companion_path(&self.path.directory, kind)
    }

    /// Checks that all declared companion files exist.
    pub fn check_companions(&self) -> Result<(), RunError> {
        Ok(self.pli.check_companions(&self.path.directory)?)
    }

    pub fn micro_file(&self) -> DirectAccessFile {
        DirectAccessFile::micro(
            self.path.directory.join(&self.pli.mic.file_name),
            self.pli.mic.record_length,
        )
    }

    /// The macro step file holds one record per slice and step.
    pub fn macro_file(&self) -> DirectAccessFile {
        DirectAccessFile::macro_steps(
            self.path.directory.join(&self.pli.mac.file_name),
            self.pli.mac.record_length,
            self.pli.axial_steps,
        )
    }

    /// The statistics file with the float width given by `IBYTE`.
    pub fn statistics_file(&self) -> Result<DirectAccessFile, RunError> {
        let width = self.pli.byte_width()?;
        self.statistics_file_with_width(width)
    }

    pub fn statistics_file_with_width(&self, byte_width: usize) -> Result<DirectAccessFile, RunError> {
        let sta = self
            .pli
            .sta
            .as_ref()
            .ok_or(pli::Error::MissingCompanion { extension: "sta" })?;
        Ok(DirectAccessFile::statistics(
            self.path.directory.join(&sta.file.file_name),
            sta.file.record_length,
            byte_width,
            self.pli.axial_steps.saturating_sub(1),
            sta.dataset_length,
        )?)
    }

    pub fn micro_times(&self) -> Result<Timestamps, RunError> {
        Ok(self.micro_file().extract_timestamps()?)
    }

    pub fn macro_times(&self) -> Result<Timestamps, RunError> {
        Ok(self.macro_file().extract_timestamps()?)
    }

    pub fn statistics_times(&self) -> Result<Timestamps, RunError> {
        Ok(self.statistics_file()?.extract_timestamps()?)
    }

    pub fn slice_labels(&self) -> Vec<String> {
        self.pli.slice_labels()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use byteorder::{ByteOrder, LittleEndian};

    use super::*;

    const PLI: &str = include_str!("../../demo-rod/rodcd.pli");

    fn write_floats(path: &Path, values: &[f32]) {
        let mut bytes = vec![0; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        fs::write(path, bytes).unwrap();
    }

    /// rodcd with `steps` micro steps, `steps` macro steps over all 11 slices and
    /// 5 statistical bins.
    fn demo_run(dir: &Path, steps: usize) {
        fs::write(dir.join("rodcd.pli"), PLI).unwrap();

        let mut mic = Vec::new();
        for step in 0..steps {
            let mut record = vec![0.0; 27];
            record[1] = step as f32 * 30.0;
            mic.extend(record);
        }
        write_floats(&dir.join("rodcd.mic"), &mic);

        let mut mac = Vec::new();
        for step in 0..steps {
            for slice in 0..11 {
                let mut record = vec![0.0; 120];
                record[0] = step as f32;
                record[3] = slice as f32;
                mac.extend(record);
            }
        }
        write_floats(&dir.join("rodcd.mac"), &mac);

        // 55 entries = 5 bins x 11 axial positions, 40 values each
        let mut sta = Vec::new();
        for bin in 0..5 {
            for _ in 0..11 {
                let mut record = vec![0.0; 40];
                record[0] = (bin / 2) as f32;
                sta.extend(record);
            }
        }
        write_floats(&dir.join("rodcd.sta"), &sta);
    }

    #[test]
    fn time_axes() {
        let dir = tempfile::tempdir().unwrap();
        demo_run(dir.path(), 4);

        let run = Run::from_manifest(&dir.path().join("rodcd.pli")).unwrap();
        assert_eq!(run.path.manifest, "rodcd.pli");
        run.check_companions().unwrap();

        let micro = run.micro_times().unwrap();
        assert_eq!(micro.seconds, vec![0, 30, 60, 90]);

        let macro_times = run.macro_times().unwrap();
        assert_eq!(macro_times.hours, vec![0, 1, 2, 3]);

        // Bins 0-1, 2-3 and 4 share their timestamps.
        let stats = run.statistics_times().unwrap();
        assert_eq!(stats.hours, vec![0, 1, 2]);
        assert_eq!(stats.labels()[1], "1 0 0.0");

        assert_eq!(run.slice_labels().len(), 11);
    }

    #[test]
    fn statistics_width() {
        let dir = tempfile::tempdir().unwrap();
        demo_run(dir.path(), 1);
        let run = Run::from_manifest(&dir.path().join("rodcd.pli")).unwrap();

        assert!(matches!(
            run.statistics_file_with_width(3),
            Err(RunError::Record(da::Error::Decode { .. }))
        ));
        // The file holds 4-byte floats, read as 8-byte floats the geometry is off.
        assert!(matches!(
            run.statistics_file_with_width(8).unwrap().decode_raw(),
            Err(da::Error::Decode { .. })
        ));
    }

    #[test]
    fn missing_companion() {
        let dir = tempfile::tempdir().unwrap();
        demo_run(dir.path(), 1);
        fs::remove_file(dir.path().join("rodcd.mic")).unwrap();
        let run = Run::from_manifest(&dir.path().join("rodcd.pli")).unwrap();

        assert!(matches!(
            run.check_companions(),
            Err(RunError::Manifest(pli::Error::MissingFile { .. }))
        ));
        assert!(matches!(
            run.micro_times(),
            Err(RunError::Record(da::Error::MissingFile { .. }))
        ));
    }

    #[test]
    fn missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Run::from_manifest(&dir.path().join("rodcd.pli")),
            Err(RunError::Manifest(pli::Error::MissingFile { .. }))
        ));
    }
}
