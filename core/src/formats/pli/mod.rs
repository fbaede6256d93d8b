use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::util::{parse_full, usize, LineCursor};

mod err;
pub use err::Error;


static COMPANION_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+\.(mic|mac|sta))(\s|$)").expect("companion pattern is valid")
});

/// The three direct-access files a manifest declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompanionKind {
    /// Micro time steps (`.mic`).
    Micro,
    /// Macro time steps (`.mac`).
    Macro,
    /// Statistical results (`.sta`).
    Statistics,
}

impl CompanionKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Micro => "mic",
            Self::Macro => "mac",
            Self::Statistics => "sta",
        }
    }

    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "mic" => Some(Self::Micro),
            "mac" => Some(Self::Macro),
            "sta" => Some(Self::Statistics),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    /// Path as written in the manifest, relative to the manifest's directory.
    pub file_name: String,
    /// Number of values per record.
    pub record_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsCompanion {
    #[serde(flatten)]
    pub file: Companion,
    pub micro_step_length: usize,
    pub macro_step_length: usize,
    /// Total number of entries in the statistical dataset.
    pub dataset_length: usize,
}

/// A parsed `.pli` run manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pli {
    pub options: BTreeMap<String, String>,
    pub mic: Companion,
    pub mac: Companion,
    pub sta: Option<StatisticsCompanion>,
    /// Number of axial positions (slices) the run writes per time step.
    pub axial_steps: usize,
}

impl Pli {
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let input = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&input)
    }

    #[instrument(skip(input))]
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut lines = LineCursor::new(input);
        let mut options = None;
        let mut mic = None;
        let mut mac = None;
        let mut sta = None;

        while let Some(line) = lines.advance() {
            if is_option_header(line) {
                options = Some(parse_options(line, &mut lines)?);
                continue;
            }

            let Some((file_name, kind)) = companion_declaration(line) else {
                continue;
            };
            debug!(file_name, ?kind, "Found companion declaration");
            let record_length = next_usize(&mut lines, "record length")?;
            let file = Companion {
                file_name: file_name.to_string(),
                record_length,
            };
            match kind {
                CompanionKind::Micro => mic = Some(file),
                CompanionKind::Macro => mac = Some(file),
                CompanionKind::Statistics => {
                    sta = Some(StatisticsCompanion {
                        file,
                        micro_step_length: next_usize(&mut lines, "micro step length")?,
                        macro_step_length: next_usize(&mut lines, "macro step length")?,
                        dataset_length: next_usize(&mut lines, "statistical dataset length")?,
                    })
                }
            }
        }

        let options: BTreeMap<String, String> = options.unwrap_or_default();
        let m3 = options
            .get("M3")
            .ok_or(Error::MissingOption { name: "M3" })?;
        let invalid_m3 = || Error::InvalidOption {
            name: "M3",
            value: m3.clone(),
        };
        let m3_value = parse_full(m3, usize).ok_or_else(invalid_m3)?;
        let axial_steps = if options.get("ISLICE").map(String::as_str) == Some("1") {
            m3_value
        } else {
            m3_value.checked_add(1).ok_or_else(invalid_m3)?
        };

        let mic = mic.ok_or(Error::MissingCompanion { extension: "mic" })?;
        let mac = mac.ok_or(Error::MissingCompanion { extension: "mac" })?;
        let pli = Self {
            options,
            mic,
            mac,
            sta,
            axial_steps,
        };
        if pli.statistics_enabled() && pli.sta.is_none() {
            return Err(Error::MissingCompanion { extension: "sta" });
        }
        Ok(pli)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Whether the run wrote statistical results (`ISTATI = 1`).
    pub fn statistics_enabled(&self) -> bool {
        self.option("ISTATI") == Some("1")
    }

    /// Byte width of the floats in the `.sta` file (`IBYTE`), 4 when not given.
    pub fn byte_width(&self) -> Result<usize, Error> {
        match self.option("IBYTE") {
            None => Ok(4),
            Some(value) => parse_full(value, usize).ok_or_else(|| Error::InvalidOption {
                name: "IBYTE",
                value: value.to_string(),
            }),
        }
    }

    /// Display names of the axial slices, `1 Slice` to `N Slice`.
    pub fn slice_labels(&self) -> Vec<String> {
        (1..=self.axial_steps).map(|i| format!("{i} Slice")).collect()
    }

    pub fn companion(&self, kind: CompanionKind) -> Option<&Companion> {
        match kind {
            CompanionKind::Micro => Some(&self.mic),
            CompanionKind::Macro => Some(&self.mac),
            CompanionKind::Statistics => self.sta.as_ref().map(|sta| &sta.file),
        }
    }

    /// Resolves a companion relative to `directory`, the directory of the manifest.
    pub fn companion_path(&self, directory: &Path, kind: CompanionKind) -> Option<PathBuf> {
        self.companion(kind)
            .map(|companion| directory.join(&companion.file_name))
    }

    /// Checks that every declared companion exists in `directory`.
    pub fn check_companions(&self, directory: &Path) -> Result<(), Error> {
        [
            CompanionKind::Micro,
            CompanionKind::Macro,
            CompanionKind::Statistics,
        ]
        .into_iter()
        .filter_map(|kind| self.companion_path(directory, kind))
        .try_for_each(|path| {
            if path.is_file() {
                Ok(())
            } else {
                Err(Error::MissingFile { path })
            }
        })
    }
}

fn is_option_header(line: &str) -> bool {
    let mut m3 = false;
    let mut istruk = false;
    for token in line.split_whitespace() {
        m3 |= token == "M3";
        istruk |= token == "ISTRUK";
    }
    m3 && istruk
}

fn parse_options(
    header: &str,
    lines: &mut LineCursor<'_>,
) -> Result<BTreeMap<String, String>, Error> {
    let names: Vec<&str> = header.split_whitespace().collect();
    let values: Vec<&str> = lines
        .advance()
        .ok_or(Error::UnexpectedEndOfInput {
            line: lines.line_number(),
            expected: "option values",
        })?
        .split_whitespace()
        .collect();
    if names.len() != values.len() {
        return Err(Error::SchemaMismatch {
            line: lines.line_number(),
            names: names.len(),
            values: values.len(),
        });
    }
    Ok(names
        .into_iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

fn companion_declaration(line: &str) -> Option<(&str, CompanionKind)> {
    let captures = COMPANION_DECLARATION.captures(line)?;
    let file_name = captures.get(1)?.as_str();
    let kind = CompanionKind::from_extension(captures.get(2)?.as_str())?;
    Some((file_name, kind))
}

fn next_usize(lines: &mut LineCursor<'_>, expected: &'static str) -> Result<usize, Error> {
    let line = lines.advance().ok_or(Error::UnexpectedEndOfInput {
        line: lines.line_number(),
        expected,
    })?;
    let token = line.split_whitespace().next().unwrap_or_default();
    parse_full(token, usize).ok_or_else(|| Error::InvalidNumber {
        line: lines.line_number(),
        expected,
        found: line.trim().to_string(),
    })
}
