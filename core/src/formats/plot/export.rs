use std::path::{Path, PathBuf};

use tracing::instrument;

use super::{numbered_path, CurveLayout, CurveSet, Error};

impl CurveSet {
    /// Writes the curves as CSV and returns the files written.
    ///
    /// Curves sharing their x values go into `path` as one table with an x column followed
    /// by one column per curve. Curves with independent x values go into one file each,
    /// named `<stem>_1.<ext>`, `<stem>_2.<ext>` and so on.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn export_csv(&self, path: &Path) -> Result<Vec<PathBuf>, Error> {
        match self.layout {
            CurveLayout::SharedX => {
                self.write_shared(path)?;
                Ok(vec![path.to_path_buf()])
            }
            CurveLayout::IndependentX => self
                .curves
                .iter()
                .enumerate()
                .map(|(i, curve)| {
                    let path = numbered_path(path, i + 1);
                    let header = [self.x_title.clone(), curve.label.to_string()];
                    let rows = curve.points.iter().map(|&(x, y)| vec![x, y]);
                    write_table(&path, &header, rows)?;
                    Ok::<_, Error>(path)
                })
                .collect(),
        }
    }

    fn write_shared(&self, path: &Path) -> Result<(), Error> {
        let header: Vec<String> = std::iter::once(self.x_title.clone())
            .chain(self.labels().map(ToString::to_string))
            .collect();
        let samples = self.curves.first().map_or(0, |curve| curve.points.len());
        let rows = (0..samples).map(|i| {
            let x = self.curves[0].points[i].0;
            std::iter::once(x)
                .chain(self.curves.iter().filter_map(|curve| curve.points.get(i).map(|p| p.1)))
                .collect::<Vec<_>>()
        });
        write_table(path, &header, rows)
    }
}

fn write_table(
    path: &Path,
    header: &[String],
    rows: impl Iterator<Item = Vec<f64>>,
) -> Result<(), Error> {
    let csv_err = |source| Error::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer
            .write_record(row.iter().map(ToString::to_string))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
