//! Surface-brightness profile extraction.
//!
//! [`Profile::extract`] ties the pipeline together: edge generation, pixel
//! classification, count-driven bin merging, and per-bin statistics with
//! background correction and the final pixel→arcmin conversion.

use crate::binning::{Bin, distribute_pixels, merge_bins};
use crate::edges::{EdgeSpacing, make_edges};
use crate::error::ProfileError;
use crate::image::{ImageSet, Observation};
use crate::region::{Region, RegionShape};

use serde::{Deserialize, Serialize};

/// Binning configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    /// Minimum net counts per committed bin.
    pub min_counts: f64,
    /// Candidate edge spacing.
    pub spacing: EdgeSpacing,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            min_counts: 50.0,
            spacing: EdgeSpacing::Log,
        }
    }
}

/// One radial bin of the extracted profile.
///
/// Radii and widths are in arcmin, rates and their uncertainties in
/// counts s⁻¹ arcmin⁻²; `width` is the half-width of the bin. `t_raw` and
/// `t_bkg` are the equivalent exposures of the source and scaled background
/// in s arcmin², the factors turning rates back into counts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub radius: f64,
    pub width: f64,
    pub n_pixels: usize,
    pub raw_cts: f64,
    pub bkg_cts: f64,
    pub net_cts: f64,
    pub raw_rate: f64,
    pub bkg_rate: f64,
    pub net_rate: f64,
    pub err_raw_rate: f64,
    pub err_bkg_rate: f64,
    pub err_net_rate: f64,
    pub t_raw: f64,
    pub t_bkg: f64,
    /// Set when the bin accumulated no effective exposure; all rates are 0
    /// and the bin takes no part in fitting.
    pub degenerate: bool,
}

/// An extracted radial profile, bins ordered by increasing radius.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    entries: Vec<ProfileEntry>,
}

impl Profile {
    /// Extract the profile of `region` from `images`.
    ///
    /// Candidate bins come from the configured edge spacing; adjacent
    /// candidates merge until each carries at least `config.min_counts` net
    /// counts, with a sub-threshold tail absorbed into the last bin. Fails
    /// with [`crate::error::RegionError::InsufficientCounts`] when the whole
    /// region is fainter than one bin's worth.
    pub fn extract(
        region: &Region,
        images: &ImageSet,
        config: &BinConfig,
    ) -> Result<Self, ProfileError> {
        let edges = make_edges(region.max_radius(), config.spacing);
        let candidates = distribute_pixels(region, &edges);
        let net: Vec<f64> = candidates
            .iter()
            .map(|bin| accumulate(bin, images).net)
            .collect();
        let merged = merge_bins(candidates, &net, config.min_counts)?;

        let scale = images.pixel_scale_arcmin();
        let entries = merged
            .iter()
            .map(|bin| {
                let stats = accumulate(bin, images);
                let entry = build_entry(bin, &stats, scale);
                log::debug!(
                    "bin at {:.4} arcmin: {} pixels, {:.1} net counts",
                    entry.radius,
                    entry.n_pixels,
                    entry.net_cts,
                );
                entry
            })
            .collect();
        Ok(Self { entries })
    }

    /// Assemble a profile from pre-computed entries, e.g. by an external
    /// loader. Entries are expected in increasing-radius order.
    pub fn from_entries(entries: Vec<ProfileEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw accumulator over one bin's pixels, all observations, pixel units.
#[derive(Clone, Copy, Debug, Default)]
struct BinStats {
    raw: f64,
    bkg: f64,
    net: f64,
    exp_raw: f64,
    exp_bkg: f64,
}

/// Sum counts and effective exposures over the bin.
///
/// Pixels outside the image or with non-positive effective exposure are
/// skipped. Background counts enter `net` scaled by the observation's
/// background correction; the background effective exposure absorbs the
/// inverse of that correction so `bkg / exp_bkg` is already a source-frame
/// rate.
fn accumulate(bin: &Bin, images: &ImageSet) -> BinStats {
    let mut stats = BinStats::default();
    for obs in images.observations() {
        stats.accumulate_observation(bin, obs);
    }
    stats
}

impl BinStats {
    fn accumulate_observation(&mut self, bin: &Bin, obs: &Observation) {
        let (nrows, ncols) = obs.shape();
        let corr = obs.bkg_correction();
        let mut raw = 0.0;
        let mut bkg = 0.0;
        for &(row, col) in &bin.pixels {
            if row < 0 || col < 0 || row >= nrows as i64 || col >= ncols as i64 {
                continue;
            }
            let (row, col) = (row as usize, col as usize);
            let exposure = obs.exposure_at(row, col);
            if exposure <= 0.0 {
                continue;
            }
            raw += obs.counts_at(row, col);
            bkg += obs.background_at(row, col);
            self.exp_raw += exposure;
            self.exp_bkg += exposure / corr;
        }
        self.raw += raw;
        self.bkg += bkg;
        self.net += raw - bkg * corr;
    }
}

/// Convert accumulated pixel-frame statistics into an arcmin-frame entry.
fn build_entry(bin: &Bin, stats: &BinStats, pixel_scale_arcmin: f64) -> ProfileEntry {
    let area = pixel_scale_arcmin * pixel_scale_arcmin;
    let (raw_rate, bkg_rate, err_raw_rate, err_bkg_rate, degenerate) = if stats.exp_raw > 0.0 {
        let raw_rate = stats.raw / stats.exp_raw / area;
        let bkg_rate = stats.bkg / stats.exp_bkg / area;
        let err_raw_rate = stats.raw.sqrt() / stats.exp_raw / area;
        let err_bkg_rate = stats.bkg.sqrt() / stats.exp_bkg / area;
        (raw_rate, bkg_rate, err_raw_rate, err_bkg_rate, false)
    } else {
        (0.0, 0.0, 0.0, 0.0, true)
    };
    ProfileEntry {
        radius: bin.radius() * pixel_scale_arcmin,
        width: bin.half_width() * pixel_scale_arcmin,
        n_pixels: bin.pixels.len(),
        raw_cts: stats.raw,
        bkg_cts: stats.bkg,
        net_cts: stats.net,
        raw_rate,
        bkg_rate,
        net_rate: raw_rate - bkg_rate,
        err_raw_rate,
        err_bkg_rate,
        err_net_rate: err_raw_rate.hypot(err_bkg_rate),
        t_raw: stats.exp_raw * area,
        t_bkg: stats.exp_bkg * area,
        degenerate,
    }
}
