//! Plot configuration files (`.inp`) read by the TuPlot and TuStat executables.

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, instrument, warn};

use super::{
    pli::Pli,
    util::{parse_full, u32, u8, LineCursor},
};

mod diagram;
mod err;

pub use diagram::{
    Diagram, DiagramGroup, DiagramKind, DiagramParams, Distribution, Iant, PlotType,
    StatisticalSelection, TimeResolvedSelection, TimeSelection, END_OF_FILE,
};
pub use err::Error;


const COMMENT: char = '+';
const DIAGRAM_START: &str = "IDEN";
const TERMINATOR_LETTERS: [char; 3] = ['D', 'I', 'E'];

/// Reads every diagram of a plot configuration.
///
/// A diagram whose terminator line is missing is dropped.
#[instrument(skip(input))]
pub fn parse_diagrams(input: &str) -> Result<Vec<Diagram>, Error> {
    let mut lines = LineCursor::new(input);
    let mut diagrams = Vec::new();
    let mut plot_index = 0;

    while let Some(line) = lines.advance() {
        let line = line.trim();
        if line.starts_with(COMMENT) || !line.contains(DIAGRAM_START) {
            continue;
        }
        plot_index += 1;
        match read_diagram(&mut lines, plot_index)? {
            Some(diagram) => diagrams.push(diagram),
            None => warn!(plot_index, "Diagram has no terminator line, skipping it"),
        }
    }

    debug!(diagrams = diagrams.len(), "Parsed plot configuration");
    Ok(diagrams)
}

fn read_diagram(lines: &mut LineCursor<'_>, plot_index: usize) -> Result<Option<Diagram>, Error> {
    let (Some(sequence), Some(manifest), Some(first)) =
        (lines.advance(), lines.advance(), lines.advance())
    else {
        return Ok(None);
    };
    let kind = diagram_kind(first, lines.line_number())?;

    let mut block = vec![first.to_string()];
    for line in lines.by_ref() {
        if is_terminator(line) {
            return Ok(Some(Diagram {
                plot_index,
                sequence: sequence.trim().to_string(),
                manifest: manifest.trim().to_string(),
                kind,
                block,
                terminator: line.trim().to_string(),
            }));
        }
        block.push(line.to_string());
    }
    Ok(None)
}

fn is_terminator(line: &str) -> bool {
    line.starts_with(COMMENT) || line.contains(&TERMINATOR_LETTERS[..])
}

/// One token is a TuStat diagram number, more are `IDNF IDGA NKN` of a TuPlot diagram.
fn diagram_kind(first: &str, line: usize) -> Result<DiagramKind, Error> {
    let mut tokens = first.split_whitespace();
    let number = tokens.next().ok_or_else(|| Error::SchemaMismatch {
        line,
        expected: "a diagram number",
        found: first.to_string(),
    })?;
    let number = parse_full(number, u32).ok_or_else(|| Error::InvalidNumber {
        line,
        found: number.to_string(),
    })?;

    let Some(plot_type) = tokens.next() else {
        return Ok(DiagramKind::Statistical { number });
    };
    let index = parse_full(plot_type, u8).ok_or_else(|| Error::InvalidNumber {
        line,
        found: plot_type.to_string(),
    })?;
    let plot_type =
        PlotType::from_index(index).ok_or(Error::UnknownPlotType { line, found: index })?;
    Ok(DiagramKind::TimeResolved { number, plot_type })
}

/// Writes diagrams in the layout [`parse_diagrams`] reads.
pub fn write_diagrams<W: Write>(diagrams: &[Diagram], mut writer: W) -> io::Result<()> {
    for diagram in diagrams {
        writeln!(writer, "{DIAGRAM_START}")?;
        writeln!(writer, "{}", diagram.sequence)?;
        writeln!(writer, "{}", diagram.manifest)?;
        for line in &diagram.block {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer, "{}", diagram.terminator)?;
    }
    writer.flush()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpFile {
    pub path: PathBuf,
    pub diagrams: Vec<Diagram>,
}

impl InpFile {
    pub fn new(path: impl Into<PathBuf>, diagrams: Vec<Diagram>) -> Self {
        Self {
            path: path.into(),
            diagrams,
        }
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let input = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &input)
    }

    pub fn parse(path: impl Into<PathBuf>, input: &str) -> Result<Self, Error> {
        Ok(Self::new(path, parse_diagrams(input)?))
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Kind of the first diagram.
    pub fn kind(&self) -> Option<&DiagramKind> {
        self.diagrams.first().map(|diagram| &diagram.kind)
    }

    pub fn save(&self) -> Result<(), Error> {
        self.save_as(&self.path)
    }

    pub fn save_as(&self, path: &Path) -> Result<(), Error> {
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = fs::File::create(path).map_err(io_err)?;
        write_diagrams(&self.diagrams, BufWriter::new(file)).map_err(io_err)
    }

    /// Resolves a manifest name relative to the directory of this file.
    pub fn manifest_path(&self, manifest: &str) -> PathBuf {
        self.directory().join(manifest)
    }

    /// Prepares a loaded file for re-running its plotting executable.
    ///
    /// Checks that the diagrams are of one kind and that the runs they refer to are
    /// complete, then moves the configuration to `TuPlot.inp` or `TuStat.inp` next to the
    /// loaded file, which is where the executables look for it. Returns that path.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save_loaded(&mut self) -> Result<PathBuf, Error> {
        let kind = *self.kind().ok_or_else(|| Error::NoDiagrams {
            path: self.path.clone(),
        })?;
        if self.diagrams.iter().any(|d| !d.kind.same_kind(&kind)) {
            return Err(Error::MixedKind {
                path: self.path.clone(),
            });
        }

        for diagram in &self.diagrams {
            let manifest = self.manifest_path(&diagram.manifest);
            let pli = Pli::from_path(&manifest)?;
            let run_dir = manifest.parent().unwrap_or_else(|| Path::new(""));
            pli.check_companions(run_dir)?;
        }

        let canonical = self.directory().join(kind.canonical_file_name());
        if self.path.file_name() != canonical.file_name() {
            debug!(to = %canonical.display(), "Saving under the canonical name");
            self.path = canonical.clone();
            self.save()?;
        }
        Ok(canonical)
    }
}
