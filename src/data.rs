// NetCDF loaders for the three input files. Everything is read eagerly into
// plain vectors; the files are small and the renderer never touches the
// library again after loading.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

use crate::{nearest_index, LWP_THRESHOLD, TIME_TOLERANCE_SECS, VAR_GROUPS};

/// One scalar time-series variable with its display metadata.
pub struct SeriesVar {
    pub name: String,
    pub longname: String,
    pub units: String,
    pub values: Vec<f64>,
}

/// The `other/<name>.ts.nc` dataset: 1-D variables over a time coordinate in
/// seconds.
pub struct TimeSeries {
    pub time_secs: Vec<f64>,
    pub vars: Vec<SeriesVar>,
}

impl TimeSeries {
    /// Load the time coordinate plus every panel variable present in the
    /// file. Missing variables are skipped with a warning so partial runs
    /// still render.
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)
            .with_context(|| format!("opening time series `{}`", path.display()))?;
        let time_var = file
            .variable("time")
            .ok_or_else(|| anyhow!("`{}` has no time coordinate", path.display()))?;
        let time_secs: Vec<f64> = time_var.get_values(..)?;

        let mut vars = Vec::new();
        for &name in VAR_GROUPS.iter().flat_map(|g| g.iter()) {
            let Some(var) = file.variable(name) else {
                log::warn!("`{name}` not present in `{}`, skipping", path.display());
                continue;
            };
            let values: Vec<f64> = var.get_values(..)?;
            if values.len() != time_secs.len() {
                bail!(
                    "`{name}` in `{}` has {} samples but the time axis has {}",
                    path.display(),
                    values.len(),
                    time_secs.len()
                );
            }
            vars.push(SeriesVar {
                name: name.to_string(),
                longname: attr_str(&var, "longname").unwrap_or_else(|| name.to_string()),
                units: attr_str(&var, "units").unwrap_or_default(),
                values,
            });
        }
        Ok(Self { time_secs, vars })
    }

    pub fn var(&self, name: &str) -> Option<&SeriesVar> {
        self.vars.iter().find(|v| v.name == name)
    }
}

/// Time coordinate of the optional `raw_data/<name>.00000000.nc` file, or
/// `None` when the run produced no 3-D snapshots.
pub fn snapshot_times(path: &Path) -> Result<Option<Vec<f64>>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = netcdf::open(path)
        .with_context(|| format!("opening snapshot times `{}`", path.display()))?;
    let time_var = file
        .variable("time")
        .ok_or_else(|| anyhow!("`{}` has no time coordinate", path.display()))?;
    Ok(Some(time_var.get_values(..)?))
}

/// The liquid-water-path cross-section: one `time × y × x` field, held
/// time-major in a flat vector.
pub struct CrossSection {
    pub time_secs: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_units: Option<String>,
    pub y_units: Option<String>,
    pub values: Vec<f64>,
    pub nx: usize,
    pub ny: usize,
}

impl CrossSection {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "can't find `{}`, needed for the overview plot",
                path.display()
            );
        }
        let file = netcdf::open(path)
            .with_context(|| format!("opening cross section `{}`", path.display()))?;

        let time_var = file
            .variable("time")
            .ok_or_else(|| anyhow!("`{}` has no time coordinate", path.display()))?;
        let time_units = attr_str(&time_var, "units").unwrap_or_default();
        if !time_units.starts_with("seconds") {
            bail!(
                "`{}` has the incorrect time units (should be seconds), likely because \
                 cdo mangled it. Recreate the file making sure cdo is explicitly told \
                 to use a *relative* time axis. The current units are `{time_units}`.",
                path.display()
            );
        }
        let time_secs: Vec<f64> = time_var.get_values(..)?;

        let data_var = file
            .variables()
            .find(|v| v.dimensions().len() == 3)
            .ok_or_else(|| anyhow!("`{}` has no time×y×x field", path.display()))?;
        let dims = data_var.dimensions();
        let (nt, ny, nx) = (dims[0].len(), dims[1].len(), dims[2].len());
        let (y_name, x_name) = (dims[1].name(), dims[2].name());
        if time_secs.len() != nt {
            bail!(
                "`{}`: time axis has {} samples but the field has {nt}",
                path.display(),
                time_secs.len()
            );
        }

        let values: Vec<f64> = data_var.get_values(..)?;
        if values.len() != nt * ny * nx {
            bail!(
                "`{}`: field is {} values, expected {}",
                path.display(),
                values.len(),
                nt * ny * nx
            );
        }

        let (x, x_units) = coord_values(&file, &x_name, nx)?;
        let (y, y_units) = coord_values(&file, &y_name, ny)?;

        Ok(Self {
            time_secs,
            x,
            y,
            x_units,
            y_units,
            values,
            nx,
            ny,
        })
    }

    /// Binary cloud mask at the sample nearest to the given whole hour,
    /// row-major over `ny × nx`. Fails when no sample lies within the
    /// five-minute tolerance.
    pub fn mask_at_hour(&self, hour: i64) -> Result<Vec<bool>> {
        let target = hour as f64 * 60.0 * 60.0;
        let idx = nearest_index(&self.time_secs, target, TIME_TOLERANCE_SECS)
            .with_context(|| format!("selecting cross-section frame for t={hour} h"))?;
        let frame = &self.values[idx * self.ny * self.nx..][..self.ny * self.nx];
        Ok(frame.iter().map(|&v| v > LWP_THRESHOLD).collect())
    }
}

/// Coordinate variable plus its units attribute; synthesizes an index
/// coordinate when the variable is absent.
fn coord_values(file: &netcdf::File, name: &str, len: usize) -> Result<(Vec<f64>, Option<String>)> {
    match file.variable(name) {
        Some(var) => {
            let vals: Vec<f64> = var.get_values(..)?;
            Ok((vals, attr_str(&var, "units")))
        }
        None => Ok(((0..len).map(|i| i as f64).collect(), None)),
    }
}

fn attr_str(var: &netcdf::Variable, name: &str) -> Option<String> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        })
}
