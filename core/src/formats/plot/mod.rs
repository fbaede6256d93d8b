//! Curves from the `.plt`/`.dat` pair written by the TuPlot and TuStat executables.
//!
//! The `.plt` file carries the axis titles, the diagram title and the legends, each as
//! a quoted value followed by a tag. The `.dat` file carries the numbers in one of two
//! layouts:
//!
//! * one x column followed by one y column per curve, or
//! * starting with `/td`, one block of `x y` pairs per curve, each closed by `//nc` and
//!   optionally named by a `//lt` legend line.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::util::{fortran_f64, parse_full, quoted_before, LineCursor};

mod err;
mod export;
pub mod markup;

pub use err::Error;


const AXIS_TITLE: &str = "axis-title";
const X_AXIS_TITLE: &str = "x-axis-title";
const Y_AXIS_TITLE: &str = "y-axis-title";
const GRAPH_TITLE: &str = ";graph title";
const LEGEND_FOR: &str = ";legend for";
const DATA_FILE: &str = ";data file";

const INDEPENDENT_X: &str = "/td";
const END_OF_CURVE: &str = "//nc";
const LEGEND_LINE: &str = "//lt";
const LEGEND_TAG: &str = ";legend";
const DIRECTIVE: char = '/';

/// Labels read from a `.plt` file, with markup already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotMetadata {
    pub x_title: String,
    pub y_title: String,
    /// Graph titles, one per line.
    pub title: String,
    pub legends: Vec<String>,
    /// Name of the `.dat` file the metadata was written for.
    pub data_file: Option<String>,
}

impl PlotMetadata {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        read_text(path).map(|input| Self::parse(&input))
    }

    /// Lines without a recognized tag are ignored.
    pub fn parse(input: &str) -> Self {
        let mut meta = Self::default();
        for line in input.lines() {
            match quoted_before(line, AXIS_TITLE) {
                Some(title) if line.contains(X_AXIS_TITLE) => {
                    meta.x_title = markup::normalize(title);
                    continue;
                }
                Some(title) if line.contains(Y_AXIS_TITLE) => {
                    meta.y_title = markup::normalize(title);
                    continue;
                }
                _ => {}
            }
            if let Some(title) = quoted_before(line, GRAPH_TITLE) {
                if !meta.title.is_empty() {
                    meta.title.push('\n');
                }
                meta.title.push_str(&markup::normalize(title));
            } else if let Some(legend) = quoted_before(line, LEGEND_FOR) {
                meta.legends.push(markup::normalize(legend));
            } else if let Some(name) = quoted_before(line, DATA_FILE) {
                meta.data_file = Some(name.to_string());
            }
        }

        for legend in meta.legends.iter_mut().filter(|l| l.is_empty()) {
            legend.clone_from(&meta.y_title);
        }
        meta
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurveLabel {
    Text(String),
    /// Column index, used when the metadata names no legends.
    Index(usize),
}

impl fmt::Display for CurveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for CurveLabel {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub label: CurveLabel,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveLayout {
    /// All curves share the x values of the first column.
    SharedX,
    /// Every curve has its own `x y` block.
    IndependentX,
}

/// The curves of one diagram, in the order they were first defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    pub x_title: String,
    pub y_title: String,
    pub title: String,
    pub layout: CurveLayout,
    /// Content of the `.out` report, if one was written.
    pub report: Option<String>,
    curves: Vec<Curve>,
}

impl CurveSet {
    /// Reads a `.plt`/`.dat` pair and the optional `.out` report next to it.
    #[instrument(skip_all, fields(dat = %dat.display()))]
    pub fn from_files(plt: &Path, dat: &Path, out: Option<&Path>) -> Result<Self, Error> {
        let meta = PlotMetadata::from_path(plt)?;
        if let Some(declared) = &meta.data_file {
            let actual = dat
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if *declared != actual {
                return Err(Error::DataFileMismatch {
                    declared: declared.clone(),
                    actual,
                });
            }
        }

        let mut set = Self::parse(&meta, &read_text(dat)?)?;
        set.report = match out {
            Some(out) if out.is_file() => Some(read_text(out)?),
            Some(out) => {
                debug!(out = %out.display(), "No report written");
                None
            }
            None => None,
        };
        Ok(set)
    }

    pub fn parse(meta: &PlotMetadata, data: &str) -> Result<Self, Error> {
        let mut set = Self {
            x_title: meta.x_title.clone(),
            y_title: meta.y_title.clone(),
            title: meta.title.clone(),
            layout: CurveLayout::SharedX,
            report: None,
            curves: Vec::new(),
        };

        let mut lines = LineCursor::new(data);
        if lines.peek().map_or(false, |first| first.starts_with(INDEPENDENT_X)) {
            lines.advance();
            set.layout = CurveLayout::IndependentX;
            set.read_independent(lines)?;
        } else {
            set.read_shared(meta, lines)?;
        }
        debug!(curves = set.curves.len(), layout = ?set.layout, "Read curves");
        Ok(set)
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn get(&self, label: &CurveLabel) -> Option<&Curve> {
        self.curves.iter().find(|curve| curve.label == *label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &CurveLabel> {
        self.curves.iter().map(|curve| &curve.label)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Adds a curve, replacing the points of an existing curve with the same label in place.
    fn insert(&mut self, label: CurveLabel, points: Vec<(f64, f64)>) {
        match self.curves.iter_mut().find(|curve| curve.label == label) {
            Some(curve) => curve.points = points,
            None => self.curves.push(Curve { label, points }),
        }
    }

    fn read_independent(&mut self, mut lines: LineCursor<'_>) -> Result<(), Error> {
        let mut legend: Option<String> = None;
        let mut points = Vec::new();
        let mut closed_any = false;

        while let Some(line) = lines.advance() {
            let line = line.trim();
            if line.starts_with(END_OF_CURVE) {
                let label = legend.clone().unwrap_or_else(|| self.y_title.clone());
                self.insert(CurveLabel::Text(label), std::mem::take(&mut points));
                closed_any = true;
            } else if line.starts_with(LEGEND_LINE) {
                if let Some(text) = quoted_before(line, LEGEND_TAG) {
                    legend = Some(markup::normalize(text)).filter(|l| !l.is_empty());
                }
            } else if line.is_empty() || line.starts_with(DIRECTIVE) {
                continue;
            } else {
                points.push(parse_pair(line, lines.line_number())?);
            }
        }

        if !closed_any {
            // Statistical diagrams hold a single curve without an end marker.
            let label = legend.unwrap_or_else(|| self.y_title.clone());
            self.insert(CurveLabel::Text(label), points);
        } else if !points.is_empty() {
            return Err(Error::UnterminatedCurve {
                line: lines.line_number(),
            });
        }
        Ok(())
    }

    fn read_shared(&mut self, meta: &PlotMetadata, mut lines: LineCursor<'_>) -> Result<(), Error> {
        let mut xs = Vec::new();
        let mut rows: Vec<(usize, Vec<f64>)> = Vec::new();

        while let Some(line) = lines.advance() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(DIRECTIVE) {
                continue;
            }
            let line_number = lines.line_number();
            let mut values = line
                .split_whitespace()
                .map(|token| parse_value(token, line_number));
            let Some(x) = values.next() else { continue };
            xs.push(x?);
            rows.push((line_number, values.collect::<Result<Vec<f64>, _>>()?));
        }

        let labels: Vec<CurveLabel> = if meta.legends.is_empty() {
            let columns = rows.first().map_or(0, |(_, ys)| ys.len());
            (0..columns).map(CurveLabel::Index).collect()
        } else {
            column_labels(&meta.legends)
        };

        let mut columns = vec![Vec::with_capacity(xs.len()); labels.len()];
        for (x, (line, ys)) in xs.iter().zip(rows) {
            if ys.len() != labels.len() {
                return Err(Error::SchemaMismatch {
                    line,
                    expected: labels.len() + 1,
                    found: ys.len() + 1,
                });
            }
            for (column, y) in columns.iter_mut().zip(ys) {
                column.push((*x, y));
            }
        }
        // One curve per column
        self.curves = labels
            .into_iter()
            .zip(columns)
            .map(|(label, points)| Curve { label, points })
            .collect();
        Ok(())
    }
}

/// Legends as curve labels. A legend used by an earlier column gets the 1-based column
/// number appended, `Stress (2)`.
fn column_labels(legends: &[String]) -> Vec<CurveLabel> {
    let mut labels: Vec<CurveLabel> = Vec::with_capacity(legends.len());
    for (i, legend) in legends.iter().enumerate() {
        let mut label = CurveLabel::Text(legend.clone());
        if labels.contains(&label) {
            label = CurveLabel::Text(format!("{legend} ({})", i + 1));
        }
        labels.push(label);
    }
    labels
}

fn parse_value(token: &str, line: usize) -> Result<f64, Error> {
    parse_full(token, fortran_f64).ok_or_else(|| Error::InvalidNumber {
        line,
        found: token.to_string(),
    })
}

fn parse_pair(line: &str, line_number: usize) -> Result<(f64, f64), Error> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [x, y] => Ok((parse_value(x, line_number)?, parse_value(y, line_number)?)),
        _ => Err(Error::SchemaMismatch {
            line: line_number,
            expected: 2,
            found: tokens.len(),
        }),
    }
}

fn read_text(path: &Path) -> Result<String, Error> {
    if !path.is_file() {
        return Err(Error::MissingFile {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Output paths for [`CurveSet::export_csv`].
fn numbered_path(path: &Path, number: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{number}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{number}"),
    };
    path.with_file_name(name)
}
