//! Classification of region pixels into radial bins and count-driven bin
//! merging.

use crate::error::RegionError;
use crate::region::{Region, RegionShape};

use crate::geom::Point;

/// A radial bin: its edge interval plus the `(row, col)` pixels assigned to
/// it.
#[derive(Clone, Debug, PartialEq)]
pub struct Bin {
    pub start_edge: f64,
    pub end_edge: f64,
    pub pixels: Vec<(i64, i64)>,
}

impl Bin {
    /// Extend this bin outward over `other`, taking its pixels.
    fn absorb(&mut self, other: Bin) {
        self.end_edge = other.end_edge;
        self.pixels.extend(other.pixels);
    }

    /// Bin midpoint radius, in pixels.
    pub fn radius(&self) -> f64 {
        (self.start_edge + self.end_edge) / 2.0
    }

    /// Bin half-width, in pixels.
    pub fn half_width(&self) -> f64 {
        (self.end_edge - self.start_edge) / 2.0
    }
}

/// Assign every pixel of the region to the radial bin its radius falls in.
///
/// Bins are half-open `[start, end)`; the outermost bin also takes radii
/// equal to the last edge. Pixels the region contains but whose radius lies
/// outside the edge range do not occur for the supported shapes and are
/// dropped if they ever do.
pub fn distribute_pixels(region: &Region, edges: &[f64]) -> Vec<Bin> {
    let mut bins: Vec<Bin> = edges
        .windows(2)
        .map(|pair| Bin {
            start_edge: pair[0],
            end_edge: pair[1],
            pixels: Vec::new(),
        })
        .collect();
    let bounds = region.bounds();
    for y in bounds.y_min..=bounds.y_max {
        for x in bounds.x_min..=bounds.x_max {
            let p = Point::new(x as f64, y as f64);
            if !region.contains(p) {
                continue;
            }
            let r = region.radius_of(p);
            let idx = match edges.partition_point(|&e| e <= r) {
                0 => continue,
                i if i > bins.len() => {
                    if r == *edges.last().unwrap() {
                        bins.len() - 1
                    } else {
                        continue;
                    }
                }
                i => i - 1,
            };
            bins[idx].pixels.push((y, x));
        }
    }
    bins
}

/// Merge adjacent bins outward until each merged bin carries at least
/// `min_counts` net counts.
///
/// `counts` holds the net counts of each candidate bin, summed over all
/// observations. Undersized bins carry forward into the next one; a
/// residual tail below the threshold is absorbed into the last complete
/// bin. Fails when the whole region holds fewer than `min_counts` counts.
pub fn merge_bins(
    bins: Vec<Bin>,
    counts: &[f64],
    min_counts: f64,
) -> Result<Vec<Bin>, RegionError> {
    assert_eq!(bins.len(), counts.len());
    let accumulated: f64 = counts.iter().sum();
    if accumulated < min_counts {
        return Err(RegionError::InsufficientCounts {
            accumulated,
            minimum: min_counts,
        });
    }
    let mut merged: Vec<Bin> = Vec::new();
    let mut pending: Option<Bin> = None;
    let mut pending_counts = 0.0;
    for (bin, &c) in bins.into_iter().zip(counts) {
        match pending.as_mut() {
            None => {
                pending = Some(bin);
                pending_counts = c;
            }
            Some(p) => {
                p.absorb(bin);
                pending_counts += c;
            }
        }
        if pending_counts >= min_counts {
            merged.push(pending.take().unwrap());
        }
    }
    if let Some(tail) = pending {
        // The total-counts guard above ensures at least one complete bin.
        merged.last_mut().unwrap().absorb(tail);
    }
    Ok(merged)
}
