//! Direct-access result files (`.mic`, `.mac`, `.sta`).
//!
//! The files are headerless streams of little-endian floats. Micro and macro step files
//! hold one record per time step and slice, statistics files hold blocks of
//! `axial_steps + 1` records per statistical bin. The first three values of every record
//! are the hour, second and millisecond of the step.

use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian};
use chrono::Duration;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

mod err;
pub use err::{Error, RecordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn from_bytes(bytes: usize) -> Result<Self, RecordError> {
        match bytes {
            4 => Ok(Self::F32),
            8 => Ok(Self::F64),
            n => Err(RecordError::UnsupportedWidth(n)),
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordLayout {
    /// One 4-byte record per micro time step.
    Micro,
    /// One 4-byte record per macro time step and slice, timestamps are taken from every
    /// `axial_slices`-th record.
    Macro { axial_slices: usize },
    /// Blocks of `axial_steps + 1` records per statistical bin.
    Statistics {
        width: FloatWidth,
        axial_steps: usize,
        dataset_length: usize,
    },
}

/// Decoded contents of a direct-access file.
#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    /// `(records, record_length)`
    Rows(Array2<f32>),
    /// `(bins, axial_steps + 1, record_length)`
    Bins(Array3<f64>),
}

impl Records {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Rows(rows) => rows.shape(),
            Self::Bins(bins) => bins.shape(),
        }
    }

    pub fn as_rows(&self) -> Option<&Array2<f32>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Bins(_) => None,
        }
    }

    pub fn as_bins(&self) -> Option<&Array3<f64>> {
        match self {
            Self::Rows(_) => None,
            Self::Bins(bins) => Some(bins),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectAccessFile {
    path: PathBuf,
    record_length: usize,
    layout: RecordLayout,
}

impl DirectAccessFile {
    pub fn micro(path: impl Into<PathBuf>, record_length: usize) -> Self {
        Self {
            path: path.into(),
            record_length,
            layout: RecordLayout::Micro,
        }
    }

    pub fn macro_steps(path: impl Into<PathBuf>, record_length: usize, axial_slices: usize) -> Self {
        Self {
            path: path.into(),
            record_length,
            layout: RecordLayout::Macro { axial_slices },
        }
    }

    /// Fails with [`RecordError::UnsupportedWidth`] unless `byte_width` is 4 or 8.
    /// The file itself is not touched.
    pub fn statistics(
        path: impl Into<PathBuf>,
        record_length: usize,
        byte_width: usize,
        axial_steps: usize,
        dataset_length: usize,
    ) -> Result<Self, Error> {
        let path = path.into();
        let width = FloatWidth::from_bytes(byte_width).map_err(|source| Error::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            record_length,
            layout: RecordLayout::Statistics {
                width,
                axial_steps,
                dataset_length,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_length(&self) -> usize {
        self.record_length
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn decode_raw(&self) -> Result<Records, Error> {
        let bytes = self.read()?;
        self.decode(&bytes).map_err(|e| self.wrap(e))
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn extract_timestamps(&self) -> Result<Timestamps, Error> {
        Ok(self.decode_with_timestamps()?.1)
    }

    /// Decodes the file once and returns both the records and their timestamps.
    pub fn decode_with_timestamps(&self) -> Result<(Records, Timestamps), Error> {
        let bytes = self.read()?;
        let records = self.decode(&bytes).map_err(|e| self.wrap(e))?;
        let times = self.timestamps(&records).map_err(|e| self.wrap(e))?;
        debug!(records = ?records.shape(), times = times.len(), "Decoded");
        Ok((records, times))
    }

    fn read(&self) -> Result<Vec<u8>, Error> {
        if !self.path.is_file() {
            return Err(Error::MissingFile {
                path: self.path.clone(),
            });
        }
        let bytes = fs::read(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(Error::EmptyFile {
                path: self.path.clone(),
            });
        }
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Records, RecordError> {
        match self.layout {
            RecordLayout::Micro => decode_rows(bytes, self.record_length).map(Records::Rows),
            RecordLayout::Macro { axial_slices } => {
                if axial_slices == 0 {
                    return Err(RecordError::CorruptRecord {
                        what: "axial slice count",
                        len: 0,
                        geometry: "a down-sampling step".to_string(),
                    });
                }
                decode_rows(bytes, self.record_length).map(Records::Rows)
            }
            RecordLayout::Statistics {
                width,
                axial_steps,
                dataset_length,
            } => decode_bins(bytes, width, self.record_length, axial_steps, dataset_length)
                .map(Records::Bins),
        }
    }

    fn timestamps(&self, records: &Records) -> Result<Timestamps, RecordError> {
        match records {
            Records::Rows(rows) => {
                let times = row_timestamps(rows.view())?;
                match self.layout {
                    RecordLayout::Macro { axial_slices } => Ok(times.every_nth(axial_slices)),
                    _ => Ok(times),
                }
            }
            Records::Bins(bins) => bin_timestamps(bins),
        }
    }

    fn wrap(&self, source: RecordError) -> Error {
        Error::Decode {
            path: self.path.clone(),
            source,
        }
    }
}

/// Reshapes a stream of 4-byte floats into `(len / record_length, record_length)`.
pub fn decode_rows(bytes: &[u8], record_length: usize) -> Result<Array2<f32>, RecordError> {
    let values = read_f32s(bytes)?;
    check_record_length(record_length)?;
    if values.len() % record_length != 0 {
        return Err(RecordError::CorruptRecord {
            what: "value count",
            len: values.len(),
            geometry: format!("records of {record_length} values"),
        });
    }
    let shape = (values.len() / record_length, record_length);
    let len = values.len();
    Array2::from_shape_vec(shape, values).map_err(|_| RecordError::CorruptRecord {
        what: "value count",
        len,
        geometry: format!("shape {shape:?}"),
    })
}

/// Reshapes a statistics stream into `(dataset_length / (axial_steps + 1), axial_steps + 1, record_length)`.
pub fn decode_bins(
    bytes: &[u8],
    width: FloatWidth,
    record_length: usize,
    axial_steps: usize,
    dataset_length: usize,
) -> Result<Array3<f64>, RecordError> {
    let values: Vec<f64> = match width {
        FloatWidth::F32 => read_f32s(bytes)?.into_iter().map(f64::from).collect(),
        FloatWidth::F64 => read_f64s(bytes)?,
    };
    check_record_length(record_length)?;

    let slices = axial_steps
        .checked_add(1)
        .ok_or_else(|| RecordError::CorruptRecord {
            what: "axial step count",
            len: axial_steps,
            geometry: "an addressable block".to_string(),
        })?;
    if dataset_length % slices != 0 {
        return Err(RecordError::CorruptRecord {
            what: "dataset length",
            len: dataset_length,
            geometry: format!("blocks of {slices} axial positions"),
        });
    }
    let shape = (dataset_length / slices, slices, record_length);
    let len = values.len();
    let expected = dataset_length.checked_mul(record_length);
    if expected != Some(len) {
        return Err(RecordError::CorruptRecord {
            what: "value count",
            len,
            geometry: format!("shape {shape:?}"),
        });
    }
    Array3::from_shape_vec(shape, values).map_err(|_| RecordError::CorruptRecord {
        what: "value count",
        len,
        geometry: format!("shape {shape:?}"),
    })
}

fn check_record_length(record_length: usize) -> Result<(), RecordError> {
    if record_length == 0 {
        return Err(RecordError::CorruptRecord {
            what: "record length",
            len: 0,
            geometry: "a non-empty record".to_string(),
        });
    }
    Ok(())
}

fn check_byte_count(bytes: &[u8], width: FloatWidth) -> Result<usize, RecordError> {
    if bytes.len() % width.bytes() != 0 {
        return Err(RecordError::CorruptRecord {
            what: "byte count",
            len: bytes.len(),
            geometry: format!("{}-byte floats", width.bytes()),
        });
    }
    Ok(bytes.len() / width.bytes())
}

fn read_f32s(bytes: &[u8]) -> Result<Vec<f32>, RecordError> {
    let mut values = vec![0.0; check_byte_count(bytes, FloatWidth::F32)?];
    LittleEndian::read_f32_into(bytes, &mut values);
    Ok(values)
}

fn read_f64s(bytes: &[u8]) -> Result<Vec<f64>, RecordError> {
    let mut values = vec![0.0; check_byte_count(bytes, FloatWidth::F64)?];
    LittleEndian::read_f64_into(bytes, &mut values);
    Ok(values)
}

/// One timestamp per row, from the first three columns.
pub fn row_timestamps(rows: ArrayView2<'_, f32>) -> Result<Timestamps, RecordError> {
    if rows.ncols() < 3 {
        return Err(RecordError::ShortRecord { found: rows.ncols() });
    }
    Ok(rows
        .outer_iter()
        .map(|row| [f64::from(row[0]), f64::from(row[1]), f64::from(row[2])])
        .collect())
}

/// One timestamp per statistical bin, from the first record of each bin.
///
/// Bins sharing a timestamp are reported once, in order of first appearance.
pub fn bin_timestamps(bins: &Array3<f64>) -> Result<Timestamps, RecordError> {
    let record_length = bins.len_of(Axis(2));
    if record_length < 3 {
        return Err(RecordError::ShortRecord {
            found: record_length,
        });
    }
    let mut seen = HashSet::new();
    Ok(bins
        .outer_iter()
        .map(|bin| [bin[[0, 0]], bin[[0, 1]], bin[[0, 2]]])
        .filter(|triple| seen.insert((*triple).map(float_key)))
        .collect())
}

/// Bit pattern under which equal floats compare equal (`0.0 == -0.0`).
fn float_key(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    pub hours: i64,
    pub seconds: i64,
    pub millis: f64,
}

impl Timestamp {
    pub fn elapsed(&self) -> Duration {
        let micros = self
            .hours
            .saturating_mul(3_600_000_000)
            .saturating_add(self.seconds.saturating_mul(1_000_000))
            .saturating_add((self.millis * 1000.0).round() as i64);
        Duration::microseconds(micros)
    }
}

impl fmt::Display for Timestamp {
    /// `h s ms`, the form the TIME field of a plot configuration takes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Millis that came from a 4-byte file print with 4-byte precision.
        let narrow = self.millis as f32;
        if f64::from(narrow) == self.millis {
            write!(f, "{} {} {:?}", self.hours, self.seconds, narrow)
        } else {
            write!(f, "{} {} {:?}", self.hours, self.seconds, self.millis)
        }
    }
}

/// Parallel hour, second and millisecond columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub hours: Vec<i64>,
    pub seconds: Vec<i64>,
    pub millis: Vec<f64>,
}

impl Timestamps {
    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Timestamp> {
        Some(Timestamp {
            hours: *self.hours.get(index)?,
            seconds: *self.seconds.get(index)?,
            millis: *self.millis.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Timestamp> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Keeps entries `0, n, 2n, ...`.
    pub fn every_nth(&self, n: usize) -> Self {
        self.iter()
            .step_by(n.max(1))
            .map(|t| [t.hours as f64, t.seconds as f64, t.millis])
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|t| t.to_string()).collect()
    }
}

impl FromIterator<[f64; 3]> for Timestamps {
    fn from_iter<T: IntoIterator<Item = [f64; 3]>>(iter: T) -> Self {
        let mut times = Self::default();
        for [hours, seconds, millis] in iter {
            times.hours.push(hours as i64);
            times.seconds.push(seconds as i64);
            times.millis.push(millis);
        }
        times
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{ByteOrder, LittleEndian};
    use proptest::prelude::*;

    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        bytes
    }

    fn f64_bytes(values: &[f64]) -> Vec<u8> {
        let mut bytes = vec![0; values.len() * 8];
        LittleEndian::write_f64_into(values, &mut bytes);
        bytes
    }

    #[test]
    fn micro_rows() {
        let bytes = f32_bytes(&[
            0.0, 0.0, 0.0, 1.0, //
            0.0, 30.0, 500.0, 2.0, //
            1.0, 0.0, 12.5, 3.0,
        ]);
        let rows = decode_rows(&bytes, 4).unwrap();
        assert_eq!(rows.shape(), &[3, 4]);
        assert_eq!(rows[[2, 3]], 3.0);

        let times = row_timestamps(rows.view()).unwrap();
        assert_eq!(times.hours, vec![0, 0, 1]);
        assert_eq!(times.seconds, vec![0, 30, 0]);
        assert_eq!(times.millis, vec![0.0, 500.0, 12.5]);
        assert_eq!(times.labels(), vec!["0 0 0.0", "0 30 500.0", "1 0 12.5"]);
    }

    #[test]
    fn hours_and_seconds_truncate() {
        let bytes = f32_bytes(&[2.9, 59.99, 0.1]);
        let rows = decode_rows(&bytes, 3).unwrap();
        let times = row_timestamps(rows.view()).unwrap();
        assert_eq!(times.hours, vec![2]);
        assert_eq!(times.seconds, vec![59]);
        assert_eq!(times.labels(), vec!["2 59 0.1"]);
    }

    #[test]
    fn indivisible_streams() {
        assert!(matches!(
            decode_rows(&[0; 10], 1),
            Err(RecordError::CorruptRecord { what: "byte count", len: 10, .. })
        ));
        assert!(matches!(
            decode_rows(&f32_bytes(&[0.0; 7]), 3),
            Err(RecordError::CorruptRecord { what: "value count", len: 7, .. })
        ));
        assert!(matches!(
            decode_rows(&f32_bytes(&[0.0; 6]), 0),
            Err(RecordError::CorruptRecord { what: "record length", .. })
        ));
    }

    #[test]
    fn short_records_have_no_timestamps() {
        let rows = decode_rows(&f32_bytes(&[1.0, 2.0, 3.0, 4.0]), 2).unwrap();
        assert_eq!(
            row_timestamps(rows.view()),
            Err(RecordError::ShortRecord { found: 2 })
        );
    }

    #[test]
    fn every_nth() {
        let times: Timestamps = (0..7).map(|i| [0.0, f64::from(i), 0.0]).collect();
        assert_eq!(times.every_nth(3).seconds, vec![0, 3, 6]);
        assert_eq!(times.every_nth(1), times);
    }

    #[test]
    fn bins_shape_and_dedup() {
        // 4 bins, 2 axial positions, 3 values each. Bins 0 and 2 share a timestamp.
        let mut values = Vec::new();
        for (bin, second) in [10.0, 20.0, 10.0, 30.0].into_iter().enumerate() {
            values.extend([1.0, second, 0.0]);
            values.extend([-1.0, -1.0, bin as f64]);
        }
        let bins = decode_bins(&f64_bytes(&values), FloatWidth::F64, 3, 1, 8).unwrap();
        assert_eq!(bins.shape(), &[4, 2, 3]);
        assert_eq!(bins[[3, 1, 2]], 3.0);

        let times = bin_timestamps(&bins).unwrap();
        assert_eq!(times.seconds, vec![10, 20, 30]);
        assert_eq!(times.hours, vec![1, 1, 1]);
    }

    #[test]
    fn negative_zero_is_a_duplicate() {
        let values = [0.0, 1.0, 0.0, -0.0, 1.0, 0.0];
        let bins = decode_bins(&f32_bytes(&values.map(|v| v as f32)), FloatWidth::F32, 3, 0, 2)
            .unwrap();
        assert_eq!(bins.len_of(Axis(0)), 2);
        assert_eq!(bin_timestamps(&bins).unwrap().len(), 1);
    }

    #[test]
    fn bins_geometry_mismatch() {
        let bytes = f64_bytes(&[0.0; 12]);
        assert!(matches!(
            decode_bins(&bytes, FloatWidth::F64, 3, 1, 5),
            Err(RecordError::CorruptRecord { what: "dataset length", len: 5, .. })
        ));
        assert!(matches!(
            decode_bins(&bytes, FloatWidth::F64, 3, 1, 6),
            Err(RecordError::CorruptRecord { what: "value count", len: 12, .. })
        ));
        assert!(matches!(
            decode_bins(&bytes[..92], FloatWidth::F64, 3, 1, 4),
            Err(RecordError::CorruptRecord { what: "byte count", len: 92, .. })
        ));
    }

    #[test]
    fn oversized_geometry_is_corrupt() {
        let bytes = [0; 16];
        assert!(matches!(
            decode_bins(&bytes, FloatWidth::F32, 4, 0, usize::MAX / 2),
            Err(RecordError::CorruptRecord { what: "value count", len: 4, .. })
        ));
        assert!(matches!(
            decode_bins(&bytes, FloatWidth::F32, 4, usize::MAX, 4),
            Err(RecordError::CorruptRecord { what: "axial step count", .. })
        ));
    }

    #[test]
    fn float_widths() {
        assert_eq!(FloatWidth::from_bytes(4), Ok(FloatWidth::F32));
        assert_eq!(FloatWidth::from_bytes(8), Ok(FloatWidth::F64));
        assert_eq!(
            FloatWidth::from_bytes(2),
            Err(RecordError::UnsupportedWidth(2))
        );
    }

    #[test]
    fn unsupported_width_is_rejected_before_reading() {
        let err = DirectAccessFile::statistics("/does/not/exist.sta", 3, 16, 1, 4).unwrap_err();
        assert_eq!(err.record_error(), Some(&RecordError::UnsupportedWidth(16)));
    }

    #[test]
    fn file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("run.mic");
        assert!(matches!(
            DirectAccessFile::micro(&missing, 3).decode_raw(),
            Err(Error::MissingFile { path }) if path == missing
        ));

        let empty = dir.path().join("run.mac");
        std::fs::write(&empty, [0u8; 0]).unwrap();
        assert!(matches!(
            DirectAccessFile::macro_steps(&empty, 3, 2).decode_raw(),
            Err(Error::EmptyFile { path }) if path == empty
        ));

        let corrupt = dir.path().join("run.sta");
        std::fs::write(&corrupt, [0u8; 6]).unwrap();
        let err = DirectAccessFile::statistics(&corrupt, 3, 4, 0, 1)
            .unwrap()
            .decode_raw()
            .unwrap_err();
        assert!(matches!(err, Error::Decode { ref path, .. } if *path == corrupt));
    }

    #[test]
    fn macro_file_downsamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.mac");
        // 3 time steps x 2 slices, 4 values per record
        let mut values = Vec::new();
        for step in 0..3 {
            for slice in 0..2 {
                values.extend([0.0, step as f32 * 10.0, 0.0, slice as f32]);
            }
        }
        std::fs::write(&path, f32_bytes(&values)).unwrap();

        let file = DirectAccessFile::macro_steps(&path, 4, 2);
        let (records, times) = file.decode_with_timestamps().unwrap();
        assert_eq!(records.shape(), &[6, 4]);
        assert_eq!(times.seconds, vec![0, 10, 20]);
        assert_eq!(file.extract_timestamps().unwrap(), times);

        let zero = DirectAccessFile::macro_steps(&path, 4, 0);
        assert!(matches!(zero.decode_raw(), Err(Error::Decode { .. })));
    }

    #[test]
    fn elapsed() {
        let t = Timestamp {
            hours: 1,
            seconds: 30,
            millis: 250.0,
        };
        assert_eq!(t.elapsed(), Duration::milliseconds(3_630_250));
        assert_eq!(t.to_string(), "1 30 250.0");
    }

    proptest! {
        #[test]
        fn rows_preserve_bits(
            record_length in 1usize..16,
            records in 0usize..16,
            seed in proptest::collection::vec(any::<u32>(), 256),
        ) {
            let values: Vec<f32> = seed[..record_length * records]
                .iter()
                .map(|bits| f32::from_bits(*bits))
                .collect();
            let bytes = f32_bytes(&values);
            let rows = decode_rows(&bytes, record_length).unwrap();
            prop_assert_eq!(rows.shape(), &[records, record_length]);

            let flat: Vec<u32> = rows.iter().map(|v| v.to_bits()).collect();
            let original: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(flat, original);
        }

        #[test]
        fn indivisible_value_counts_fail(record_length in 2usize..32, extra in 1usize..32) {
            let extra = extra % record_length;
            prop_assume!(extra != 0);
            let bytes = f32_bytes(&vec![1.0; record_length * 3 + extra]);
            let is_corrupt = matches!(
                decode_rows(&bytes, record_length),
                Err(RecordError::CorruptRecord { .. })
            );
            prop_assert!(is_corrupt);
        }
    }
}
