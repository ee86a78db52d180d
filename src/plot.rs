// Figure assembly with plotters: one full-width panel per variable group,
// then a row of black/white snapshot panels, one per selected hour.

use anyhow::{bail, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::data::{snapshot_times, CrossSection, SeriesVar, TimeSeries};
use crate::{
    cross_section_path, hours_from_seconds, km_scale, snapshot_hours, snapshot_times_path,
    timeseries_path, ylim_for, VAR_GROUPS,
};

const FIGURE_SIZE: (u32, u32) = (1000, 900);

/// Everything the figure needs, loaded and validated up front so no output
/// file is created when an input is missing or malformed.
pub struct Overview {
    ts: TimeSeries,
    xs: CrossSection,
    snap_secs: Option<Vec<f64>>,
    t_hours: Vec<f64>,
    hours: Vec<i64>,
    masks: Vec<Vec<bool>>,
}

impl Overview {
    pub fn load(base: &Path, name: &str) -> Result<Self> {
        let ts_file = timeseries_path(base, name);
        let ts = TimeSeries::open(&ts_file)?;
        let xs = CrossSection::open(&cross_section_path(base, name))?;
        let snap_secs = snapshot_times(&snapshot_times_path(base, name))?;

        let t_hours = hours_from_seconds(&ts.time_secs);
        let hours = snapshot_hours(&t_hours);
        if hours.is_empty() {
            bail!(
                "`{}` spans less than one full hour, nothing to plot",
                ts_file.display()
            );
        }

        let masks: Vec<Vec<bool>> = hours
            .par_iter()
            .map(|&h| xs.mask_at_hour(h))
            .collect::<Result<_>>()?;

        Ok(Self {
            ts,
            xs,
            snap_secs,
            t_hours,
            hours,
            masks,
        })
    }

    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let n_rows = VAR_GROUPS.len() + 1;
        let rows = root.split_evenly((n_rows, 1));
        let x_max = self.t_hours.last().copied().unwrap_or(1.0).max(1.0);

        for (gi, group) in VAR_GROUPS.iter().enumerate() {
            // the snapshot markers land on whichever panel was drawn last
            let markers = if gi == VAR_GROUPS.len() - 1 {
                self.snap_secs.as_deref()
            } else {
                None
            };
            draw_series_panel(&rows[gi], &self.ts, group, &self.t_hours, x_max, markers)?;
        }

        let cells = rows[n_rows - 1].split_evenly((1, self.hours.len()));
        let (scale, dist_units) = km_scale(self.xs.x_units.as_deref(), self.xs.y_units.as_deref());
        for (i, (&hour, mask)) in self.hours.iter().zip(&self.masks).enumerate() {
            log::debug!("rendering snapshot panel for t={hour} h");
            draw_snapshot_panel(&cells[i], &self.xs, mask, hour, scale, dist_units, i == 0)?;
        }
        Ok(())
    }
}

/// Render the overview figure and save it as `<name>.evolution.<filetype>`
/// under `out_dir`.
pub fn render_evolution(base: &Path, name: &str, filetype: &str, out_dir: &Path) -> Result<PathBuf> {
    let overview = Overview::load(base, name)?;
    let out_path = out_dir.join(format!("{name}.evolution.{filetype}"));

    match filetype {
        "svg" => {
            let root = SVGBackend::new(&out_path, FIGURE_SIZE).into_drawing_area();
            overview.draw(&root)?;
            root.present()
                .with_context(|| format!("writing `{}`", out_path.display()))?;
        }
        "png" | "bmp" | "jpeg" | "jpg" => {
            let root = BitMapBackend::new(&out_path, FIGURE_SIZE).into_drawing_area();
            overview.draw(&root)?;
            root.present()
                .with_context(|| format!("writing `{}`", out_path.display()))?;
        }
        other => bail!("unsupported file type `{other}` (use svg or png)"),
    }
    Ok(out_path)
}

fn draw_series_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    ts: &TimeSeries,
    group: &[&str],
    t_hours: &[f64],
    x_max: f64,
    snapshot_secs: Option<&[f64]>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let present: Vec<&SeriesVar> = group.iter().filter_map(|&v| ts.var(v)).collect();
    let Some(&last) = present.last() else {
        log::warn!("none of {group:?} present, leaving panel empty");
        return Ok(());
    };

    // matplotlib applies the limit rule per variable in turn, so the last
    // variable of the group wins
    let (y_min, y_top) = ylim_for(&last.name, &last.values);
    let y_max = y_top.unwrap_or_else(|| {
        let max = present
            .iter()
            .flat_map(|v| v.values.iter())
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if max > 0.0 {
            1.05 * max
        } else {
            1.0
        }
    });
    let y_max = if y_max > y_min { y_max } else { y_min + 1.0 };

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(8)
        .x_label_area_size(28)
        .y_label_area_size(60);
    if present.len() == 1 {
        builder.caption(&last.longname, ("sans-serif", 16));
    }
    let mut chart = builder.build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("time [hours]")
        .y_desc(format!("{} [{}]", last.longname, last.units))
        .draw()?;

    for (i, var) in present.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(
                t_hours.iter().copied().zip(var.values.iter().copied()),
                color.stroke_width(1),
            ))?
            .label(var.longname.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    // red markers at y=0 for the times when 3-D snapshots were written,
    // each annotated with its snapshot index
    if let Some(times) = snapshot_secs {
        chart.draw_series(times.iter().enumerate().map(|(tn, &secs)| {
            let th = secs / 60.0 / 60.0;
            EmptyElement::at((th, 0.0))
                + Circle::new((0, 0), 3, RED.filled())
                + Text::new(
                    format!("{tn}"),
                    (0, -14),
                    ("sans-serif", 12).into_font().color(&RED),
                )
        }))?;
    }

    if present.len() > 1 {
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()?;
    }
    Ok(())
}

fn draw_snapshot_panel<DB: DrawingBackend>(
    cell: &DrawingArea<DB, Shift>,
    xs: &CrossSection,
    mask: &[bool],
    hour: i64,
    scale: f64,
    dist_units: Option<&str>,
    leftmost: bool,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    // square off the cell first so the panel keeps an equal aspect ratio
    let (w, h) = cell.dim_in_pixel();
    let side = w.min(h);
    let square = cell.clone().shrink(
        (((w - side) / 2) as i32, ((h - side) / 2) as i32),
        (side as i32, side as i32),
    );

    let x: Vec<f64> = xs.x.iter().map(|&v| v * scale).collect();
    let y: Vec<f64> = xs.y.iter().map(|&v| v * scale).collect();
    let dx = if x.len() > 1 { x[1] - x[0] } else { 1.0 };
    let dy = if y.len() > 1 { y[1] - y[0] } else { 1.0 };
    let x_range = (x[0] - 0.5 * dx)..(x[x.len() - 1] + 0.5 * dx);
    let y_range = (y[0] - 0.5 * dy)..(y[y.len() - 1] + 0.5 * dy);

    let mut builder = ChartBuilder::on(&square);
    builder
        .caption(format!("t={hour}hrs"), ("sans-serif", 14))
        .margin(4)
        .x_label_area_size(24)
        .y_label_area_size(if leftmost { 34 } else { 24 });
    let mut chart = builder.build_cartesian_2d(x_range, y_range)?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh();
    if let Some(units) = dist_units {
        mesh.x_desc(format!("horizontal dist. [{units}]"));
        if leftmost {
            mesh.y_desc(format!("horizontal dist. [{units}]"));
        }
    }
    mesh.draw()?;

    // binary greyscale: cloudy cells white on a black background
    chart.plotting_area().fill(&BLACK)?;
    chart.draw_series(
        mask.iter()
            .enumerate()
            .filter(|&(_, &cloudy)| cloudy)
            .map(|(k, _)| {
                let (cx, cy) = (x[k % xs.nx], y[k / xs.nx]);
                Rectangle::new(
                    [
                        (cx - 0.5 * dx, cy - 0.5 * dy),
                        (cx + 0.5 * dx, cy + 0.5 * dy),
                    ],
                    WHITE.filled(),
                )
            }),
    )?;
    Ok(())
}
