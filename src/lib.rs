// Overview plot for a single UCLALES run: stacked time-series panels over a
// row of thresholded liquid-water-path snapshots. This module holds the
// dataset naming conventions and the pure display rules; file loading lives
// in `data`, rendering in `plot`.

use anyhow::{anyhow, bail, Result};
use glob::glob;
use std::path::{Path, PathBuf};

pub mod data;
pub mod plot;

// ─────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────

/// Variable groups, one stacked panel each: boundary-layer heights,
/// liquid/rain water path, cloud fraction.
pub const VAR_GROUPS: &[&[&str]] = &[
    &["zbmn", "zcmn", "zb", "zc"],
    &["lwp_bar", "rwp_bar"],
    &["cfrac"],
];

/// Variables whose panels get a zero floor and an automatic upper bound.
pub const WATER_PATH_VARS: &[&str] = &["lwp_bar", "rwp_bar"];

/// Binary cloud-mask threshold applied to the liquid water path field.
pub const LWP_THRESHOLD: f64 = 1.0e-3;

/// Tolerance when matching a whole-hour snapshot to a cross-section time
/// sample, in seconds.
pub const TIME_TOLERANCE_SECS: f64 = 5.0 * 60.0;

// ─────────────────────────────────────────────────────────────────────
// Path conventions
// ─────────────────────────────────────────────────────────────────────

pub fn timeseries_path(base: &Path, name: &str) -> PathBuf {
    base.join("other").join(format!("{name}.ts.nc"))
}

pub fn snapshot_times_path(base: &Path, name: &str) -> PathBuf {
    base.join("raw_data").join(format!("{name}.00000000.nc"))
}

pub fn cross_section_path(base: &Path, name: &str) -> PathBuf {
    base.join("cross_sections")
        .join("runtime_slices")
        .join(format!("{name}.out.xy.lwp.nc"))
}

/// Pick the dataset name from the first `other/*.ts.nc` under `base`.
pub fn discover_dataset(base: &Path) -> Result<String> {
    let mut files: Vec<PathBuf> = glob(&format!("{}/other/*.ts.nc", base.display()))?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    let first = files.into_iter().next().ok_or_else(|| {
        anyhow!(
            "can't find any *.ts.nc under `{}/other`, needed for the overview plot",
            base.display()
        )
    })?;
    let fname = first
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("bad file name: {}", first.display()))?;
    Ok(fname.split('.').next().unwrap_or(fname).to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Display rules
// ─────────────────────────────────────────────────────────────────────

pub fn hours_from_seconds(secs: &[f64]) -> Vec<f64> {
    secs.iter().map(|s| s / 60.0 / 60.0).collect()
}

/// Representative whole hours for the snapshot row: unique truncated hours,
/// hour 0 dropped (spin-up, nothing interesting yet), then strided by
/// `max_hour / 5`. The stride is clamped to 1 so a run spanning fewer than
/// five hours still yields every hour.
pub fn snapshot_hours(t_hours: &[f64]) -> Vec<i64> {
    let mut uniq: Vec<i64> = t_hours.iter().map(|&h| h as i64).collect();
    uniq.sort_unstable();
    uniq.dedup();
    if uniq.first() == Some(&0) {
        uniq.remove(0);
    }
    let Some(&max) = uniq.last() else {
        return uniq;
    };
    let stride = ((max / 5) as usize).max(1);
    uniq.into_iter().step_by(stride).collect()
}

/// Panel y-limits for one variable: water-path variables get a zero floor
/// with the top left to the data, everything else `[0, 1.2 * max]`.
pub fn ylim_for(var: &str, values: &[f64]) -> (f64, Option<f64>) {
    if WATER_PATH_VARS.contains(&var) {
        (0.0, None)
    } else {
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (0.0, Some(1.2 * max))
    }
}

/// Coordinate scaling for the snapshot panels: when both horizontal axes are
/// in metres, plot in kilometres; without unit metadata plot raw values and
/// show no unit string.
pub fn km_scale(x_units: Option<&str>, y_units: Option<&str>) -> (f64, Option<&'static str>) {
    match (x_units, y_units) {
        (Some("m"), Some("m")) => (1.0e-3, Some("km")),
        _ => (1.0, None),
    }
}

/// Index of the time sample nearest to `target`, failing when the nearest
/// one is farther than `tolerance` seconds away.
pub fn nearest_index(times: &[f64], target: f64, tolerance: f64) -> Result<usize> {
    let (idx, dist) = times
        .iter()
        .enumerate()
        .map(|(i, &t)| (i, (t - target).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| anyhow!("empty time coordinate"))?;
    if dist > tolerance {
        bail!(
            "no time sample within {tolerance:.0} s of t={target:.0} s (nearest is {dist:.0} s away)"
        );
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_hours_six_hour_run() {
        // 0..6 hours at dt = 1 s: hour 0 dropped, stride int(6/5) = 1
        let secs: Vec<f64> = (0..=21_600).map(f64::from).collect();
        let hours = snapshot_hours(&hours_from_seconds(&secs));
        assert_eq!(hours, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn snapshot_hours_single_hour_does_not_panic() {
        let secs: Vec<f64> = (0..=7_200).step_by(60).map(|s| s as f64).collect();
        let hours = snapshot_hours(&hours_from_seconds(&secs));
        assert_eq!(hours, vec![1, 2]);
    }

    #[test]
    fn snapshot_hours_empty_after_dropping_zero() {
        let secs = vec![0.0, 600.0, 1_200.0];
        assert!(snapshot_hours(&hours_from_seconds(&secs)).is_empty());
    }

    #[test]
    fn water_path_ylim_has_open_top() {
        assert_eq!(ylim_for("lwp_bar", &[0.5, 3.0, 1.0]), (0.0, None));
        assert_eq!(ylim_for("rwp_bar", &[100.0]), (0.0, None));
    }

    #[test]
    fn other_ylim_is_exactly_1p2_max() {
        let (lo, hi) = ylim_for("cfrac", &[0.1, 0.4, 0.25]);
        assert_eq!(lo, 0.0);
        assert_eq!(hi, Some(1.2 * 0.4));
    }

    #[test]
    fn km_scale_needs_both_axes_in_metres() {
        assert_eq!(km_scale(Some("m"), Some("m")), (1.0e-3, Some("km")));
        assert_eq!(km_scale(None, None), (1.0, None));
        assert_eq!(km_scale(Some("m"), None), (1.0, None));
        assert_eq!(km_scale(Some("km"), Some("km")), (1.0, None));
    }

    #[test]
    fn nearest_index_within_tolerance() {
        let times = vec![0.0, 3_600.0, 7_200.0];
        assert_eq!(nearest_index(&times, 3_700.0, 300.0).unwrap(), 1);
    }

    #[test]
    fn nearest_index_rejects_distant_sample() {
        // query exactly between two samples, both > 5 min away
        let times = vec![0.0, 1_000.0];
        assert!(nearest_index(&times, 500.0, 300.0).is_err());
    }

    #[test]
    fn nearest_index_rejects_empty_axis() {
        assert!(nearest_index(&[], 0.0, 300.0).is_err());
    }
}
