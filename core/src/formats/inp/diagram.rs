use std::{fmt, mem};

use serde::{Deserialize, Serialize};

use super::Error;
use crate::formats::util::{parse_full, u32};

/// Terminator of the last diagram in a file.
pub const END_OF_FILE: &str = "E";

/// What varies between the curves of a time-resolved diagram (IDGA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlotType {
    DifferentCurves,
    DifferentTimes,
    DifferentSlices,
}

impl PlotType {
    pub fn index(self) -> u8 {
        match self {
            Self::DifferentCurves => 1,
            Self::DifferentTimes => 2,
            Self::DifferentSlices => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::DifferentCurves),
            2 => Some(Self::DifferentTimes),
            3 => Some(Self::DifferentSlices),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::DifferentCurves => "Different Curve Numbers",
            Self::DifferentTimes => "Different Times",
            Self::DifferentSlices => "Different Slices",
        }
    }
}

/// Family of a time-resolved diagram, given by its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagramGroup {
    /// 101 to 140, quantities over the radius.
    Radius,
    /// 201 to 251, quantities over time.
    Time,
    /// 252 to 270, time integrals.
    TimeIntegral,
    /// 301 to 340, quantities over the rod axis.
    Axial,
}

impl DiagramGroup {
    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            101..=140 => Some(Self::Radius),
            201..=251 => Some(Self::Time),
            252..=270 => Some(Self::TimeIntegral),
            301..=340 => Some(Self::Axial),
            _ => None,
        }
    }

    /// Whether diagrams of this group run over a time interval instead of a single time.
    pub fn spans_time(self) -> bool {
        matches!(self, Self::Time | Self::TimeIntegral)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagramKind {
    /// Produced by the TuPlot executable.
    TimeResolved { number: u32, plot_type: PlotType },
    /// Produced by the TuStat executable.
    Statistical { number: u32 },
}

impl DiagramKind {
    pub fn number(&self) -> u32 {
        match self {
            Self::TimeResolved { number, .. } | Self::Statistical { number } => *number,
        }
    }

    pub fn same_kind(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Stem of the plotting executable and of its output files.
    pub fn stem(&self) -> &'static str {
        match self {
            Self::TimeResolved { .. } => "TuPlot",
            Self::Statistical { .. } => "TuStat",
        }
    }

    pub fn canonical_file_name(&self) -> &'static str {
        match self {
            Self::TimeResolved { .. } => "TuPlot.inp",
            Self::Statistical { .. } => "TuStat.inp",
        }
    }
}

/// One diagram of a plot configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    /// 1-based position in the file.
    pub plot_index: usize,
    /// Plot sequence line (IPLOT).
    pub sequence: String,
    /// Name of the `.pli` manifest of the run to plot.
    pub manifest: String,
    pub kind: DiagramKind,
    /// Parameter lines, kept as written.
    pub block: Vec<String>,
    /// Continuation or end marker (IKON / CONTIN).
    pub terminator: String,
}

impl Diagram {
    /// Interprets the parameter block according to the diagram kind.
    pub fn params(&self) -> Result<DiagramParams, Error> {
        match self.kind {
            DiagramKind::TimeResolved { number, plot_type } => {
                TimeResolvedSelection::from_block(number, plot_type, &self.block, &self.terminator)
                    .map(DiagramParams::TimeResolved)
            }
            DiagramKind::Statistical { number } => {
                StatisticalSelection::from_block(number, &self.block, &self.terminator)
                    .map(DiagramParams::Statistical)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagramParams {
    TimeResolved(TimeResolvedSelection),
    Statistical(StatisticalSelection),
}

/// The IANT switches of a time-resolved diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iant {
    /// `Y`/`N`, consider the temperature distribution (diagram 113).
    pub temperature_distribution: char,
    /// `C`/`F`, stresses in the cladding or the fuel (diagrams 102 to 108).
    pub stresses: char,
    /// `Y`/`N`, print the input data and the X-Y table.
    pub print_tables: char,
}

impl Default for Iant {
    fn default() -> Self {
        Self {
            temperature_distribution: 'N',
            stresses: 'F',
            print_tables: 'N',
        }
    }
}

/// Times at which a diagram is evaluated, each as `h s ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSelection {
    Instant(String),
    Range { start: String, end: String },
    Instants(Vec<String>),
}

impl TimeSelection {
    fn from_lines(plot_type: PlotType, group: Option<DiagramGroup>, mut lines: Vec<String>) -> Self {
        let spans_time = group.map_or(false, DiagramGroup::spans_time);
        match (plot_type, lines.len()) {
            (PlotType::DifferentTimes, _) => Self::Instants(lines),
            (_, 2) if spans_time => {
                let end = lines.pop().unwrap_or_default();
                let start = lines.pop().unwrap_or_default();
                Self::Range { start, end }
            }
            (_, 1) => Self::Instant(lines.pop().unwrap_or_default()),
            _ => Self::Instants(lines),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Instant(time) => vec![time.clone()],
            Self::Range { start, end } => vec![start.clone(), end.clone()],
            Self::Instants(times) => times.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Instant(_) => 1,
            Self::Range { .. } => 2,
            Self::Instants(times) => times.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A TuPlot diagram as chosen in the plot settings.
///
/// Block layout:
///
/// ```text
/// IDNF IDGA NKN
/// IANT1 IANT2 IANT3
/// KN...
/// NLSUCH...
/// TIME (one or more lines)
/// NMAS
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeResolvedSelection {
    pub number: u32,
    pub plot_type: PlotType,
    pub iant: Iant,
    /// Curve numbers (KN).
    pub curves: Vec<u32>,
    /// Axial slices (NLSUCH).
    pub slices: Vec<u32>,
    pub time: TimeSelection,
    /// Custom scaling flag (NMAS), `0` for automatic extrema.
    pub scaling: String,
    pub terminator: String,
}

impl TimeResolvedSelection {
    pub fn new(number: u32, plot_type: PlotType) -> Self {
        Self {
            number,
            plot_type,
            iant: Iant::default(),
            curves: vec![1],
            slices: vec![1],
            time: TimeSelection::Instant("0 0 0".to_string()),
            scaling: "0".to_string(),
            terminator: END_OF_FILE.to_string(),
        }
    }

    pub fn group(&self) -> Option<DiagramGroup> {
        DiagramGroup::from_number(self.number)
    }

    /// Number of curves in the diagram (NKN), one per entry of whatever varies.
    pub fn curve_count(&self) -> usize {
        match self.plot_type {
            PlotType::DifferentCurves => self.curves.len(),
            PlotType::DifferentTimes => self.time.len(),
            PlotType::DifferentSlices => self.slices.len(),
        }
    }

    pub fn block(&self) -> Vec<String> {
        let mut block = vec![
            format!(
                "{} {} {}",
                self.number,
                self.plot_type.index(),
                self.curve_count()
            ),
            format!(
                "{} {} {}",
                self.iant.temperature_distribution, self.iant.stresses, self.iant.print_tables
            ),
            join(&self.curves),
            join(&self.slices),
        ];
        block.extend(self.time.lines());
        block.push(self.scaling.clone());
        block
    }

    pub fn into_diagram(self, manifest: impl Into<String>) -> Diagram {
        Diagram {
            plot_index: 1,
            sequence: "1".to_string(),
            manifest: manifest.into(),
            kind: DiagramKind::TimeResolved {
                number: self.number,
                plot_type: self.plot_type,
            },
            block: self.block(),
            terminator: self.terminator,
        }
    }

    fn from_block(
        number: u32,
        plot_type: PlotType,
        block: &[String],
        terminator: &str,
    ) -> Result<Self, Error> {
        if block.len() < 6 {
            return Err(Error::SchemaMismatch {
                line: block.len(),
                expected: "at least six parameter lines",
                found: format!("{} lines", block.len()),
            });
        }
        let times = block[4..block.len() - 1]
            .iter()
            .map(|line| line.trim().to_string())
            .collect();
        Ok(Self {
            number,
            plot_type,
            iant: parse_iant(&block[1], 2)?,
            curves: parse_list(&block[2], 3)?,
            slices: parse_list(&block[3], 4)?,
            time: TimeSelection::from_lines(plot_type, DiagramGroup::from_number(number), times),
            scaling: block[block.len() - 1].trim().to_string(),
            terminator: terminator.to_string(),
        })
    }
}

/// How TuStat normalizes a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    /// `f`
    FractionalFrequency,
    /// `d`
    ProbabilityDensity,
}

impl Distribution {
    pub fn code(self) -> char {
        match self {
            Self::FractionalFrequency => 'f',
            Self::ProbabilityDensity => 'd',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "f" => Some(Self::FractionalFrequency),
            "d" => Some(Self::ProbabilityDensity),
            _ => None,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FractionalFrequency => f.write_str("Fractional Frequency"),
            Self::ProbabilityDensity => f.write_str("Probability Density"),
        }
    }
}

/// A TuStat diagram. The block is `DIAGNR`, `NAXIAL`, `TIME`, `INTERV`, `DISTR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticalSelection {
    pub number: u32,
    /// Axial slice (NAXIAL).
    pub slice: u32,
    pub time: String,
    /// Number of intervals of the distribution (INTERV).
    pub intervals: u32,
    pub distribution: Distribution,
    pub terminator: String,
}

impl StatisticalSelection {
    pub fn new(number: u32, slice: u32, time: impl Into<String>, intervals: u32) -> Self {
        Self {
            number,
            slice,
            time: time.into(),
            intervals,
            distribution: Distribution::FractionalFrequency,
            terminator: END_OF_FILE.to_string(),
        }
    }

    pub fn block(&self) -> Vec<String> {
        vec![
            self.number.to_string(),
            self.slice.to_string(),
            self.time.clone(),
            self.intervals.to_string(),
            self.distribution.code().to_string(),
        ]
    }

    pub fn into_diagram(self, manifest: impl Into<String>) -> Diagram {
        Diagram {
            plot_index: 1,
            sequence: "1".to_string(),
            manifest: manifest.into(),
            kind: DiagramKind::Statistical {
                number: self.number,
            },
            block: self.block(),
            terminator: self.terminator,
        }
    }

    fn from_block(number: u32, block: &[String], terminator: &str) -> Result<Self, Error> {
        let [_, slice, time, intervals, distribution] = block else {
            return Err(Error::SchemaMismatch {
                line: block.len(),
                expected: "five parameter lines",
                found: format!("{} lines", block.len()),
            });
        };
        Ok(Self {
            number,
            slice: parse_number(slice, 2)?,
            time: time.trim().to_string(),
            intervals: parse_number(intervals, 4)?,
            distribution: Distribution::from_code(distribution.trim()).ok_or_else(|| {
                Error::SchemaMismatch {
                    line: 5,
                    expected: "distribution `f` or `d`",
                    found: distribution.clone(),
                }
            })?,
            terminator: terminator.to_string(),
        })
    }
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_number(token: &str, line: usize) -> Result<u32, Error> {
    parse_full(token, u32).ok_or_else(|| Error::InvalidNumber {
        line,
        found: token.trim().to_string(),
    })
}

fn parse_list(line_text: &str, line: usize) -> Result<Vec<u32>, Error> {
    line_text
        .split_whitespace()
        .map(|token| parse_number(token, line))
        .collect()
}

fn parse_iant(line_text: &str, line: usize) -> Result<Iant, Error> {
    let switches: Vec<char> = line_text
        .split_whitespace()
        .filter_map(|token| {
            let mut chars = token.chars();
            chars.next().filter(|_| chars.next().is_none())
        })
        .collect();
    match (switches.as_slice(), line_text.split_whitespace().count()) {
        ([temperature_distribution, stresses, print_tables], 3) => Ok(Iant {
            temperature_distribution: *temperature_distribution,
            stresses: *stresses,
            print_tables: *print_tables,
        }),
        _ => Err(Error::SchemaMismatch {
            line,
            expected: "three one-letter IANT switches",
            found: line_text.to_string(),
        }),
    }
}
