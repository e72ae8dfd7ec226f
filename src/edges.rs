//! Radial bin edge generation.
//!
//! N bins are described by N+1 edges; the first edge is always 0 and the
//! last always equals the region's maximum radius.

use serde::{Deserialize, Serialize};

/// Number of log-spaced candidate bins before sub-pixel merging.
const LOG_CANDIDATE_BINS: usize = 100;

/// Floor radius of the log-spaced grid, avoiding `log(0)`.
const LOG_FLOOR_RADIUS: f64 = 1.0;

/// Minimum edge separation surviving the sub-pixel merge, in pixels.
const MIN_BIN_WIDTH: f64 = 1.0;

/// Spacing of the candidate bin edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeSpacing {
    /// One-pixel-wide equal bins from 0 to the maximum radius.
    Linear,
    /// Log-spaced candidates merged to a one-pixel minimum width.
    #[default]
    Log,
}

/// Generate the radial edge sequence for a region of the given maximum
/// radius.
///
/// Log spacing starts from a floor radius of one pixel; spacing the bins
/// logarithmically with a hard one-pixel minimum width directly would leave
/// unreasonably few bins, so a dense candidate grid is generated first and
/// [`merge_subpixel_bins`] collapses the sub-pixel ones afterwards. The
/// final edge always equals `max_radius` exactly so merge rounding never
/// truncates the region.
pub fn make_edges(max_radius: f64, spacing: EdgeSpacing) -> Vec<f64> {
    match spacing {
        EdgeSpacing::Linear => {
            let nbins = (max_radius.round() as usize).max(1);
            (0..=nbins)
                .map(|i| max_radius * i as f64 / nbins as f64)
                .collect()
        }
        EdgeSpacing::Log => {
            if max_radius <= LOG_FLOOR_RADIUS {
                return vec![0.0, max_radius];
            }
            let log_min = LOG_FLOOR_RADIUS.log10();
            let log_max = max_radius.log10();
            let mut edges = Vec::with_capacity(LOG_CANDIDATE_BINS + 2);
            edges.push(0.0);
            edges.extend((0..=LOG_CANDIDATE_BINS).map(|i| {
                let t = i as f64 / LOG_CANDIDATE_BINS as f64;
                10f64.powf(log_min + t * (log_max - log_min))
            }));
            merge_subpixel_bins(&edges)
        }
    }
}

/// Collapse adjacent edges closer than one pixel into a single coarser bin.
///
/// Walks the edges in order and keeps an edge only if it is at least one
/// pixel away from the last kept edge; the final kept edge is forced to the
/// input's last edge so the outermost bin reaches the region boundary. The
/// operation is idempotent; inputs with fewer than two edges describe no
/// bin and pass through unchanged.
pub fn merge_subpixel_bins(edges: &[f64]) -> Vec<f64> {
    if edges.len() < 2 {
        return edges.to_vec();
    }
    let mut merged = vec![edges[0]];
    let mut last_kept = edges[0];
    for &edge in &edges[1..] {
        if edge - last_kept >= MIN_BIN_WIDTH {
            merged.push(edge);
            last_kept = edge;
        }
    }
    let max_edge = edges[edges.len() - 1];
    if merged.len() == 1 {
        merged.push(max_edge);
    } else {
        *merged.last_mut().unwrap() = max_edge;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn linear_edges_are_unit_spaced() {
        let edges = make_edges(20.0, EdgeSpacing::Linear);
        assert_eq!(edges.len(), 21);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[20], 20.0);
        for pair in edges.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn log_edges_start_at_zero_and_end_at_max() {
        let edges = make_edges(250.0, EdgeSpacing::Log);
        assert_eq!(edges[0], 0.0);
        assert_eq!(*edges.last().unwrap(), 250.0);
        for pair in edges.windows(2) {
            assert!(pair[1] - pair[0] >= 1.0 - 1e-12, "sub-pixel bin survived");
        }
        // Long-range log behavior: outer bins grow.
        let n = edges.len();
        assert!(edges[n - 1] - edges[n - 2] > edges[2] - edges[1]);
    }

    #[test]
    fn merge_is_idempotent() {
        let edges = make_edges(73.0, EdgeSpacing::Log);
        assert_eq!(merge_subpixel_bins(&edges), edges);

        let raw = [0.0, 0.3, 0.9, 1.4, 1.6, 2.8, 3.05];
        let once = merge_subpixel_bins(&raw);
        assert_eq!(merge_subpixel_bins(&once), once);
        assert_eq!(*once.last().unwrap(), 3.05);
    }

    #[test]
    fn merge_passes_binless_inputs_through() {
        assert_eq!(merge_subpixel_bins(&[]), Vec::<f64>::new());
        assert_eq!(merge_subpixel_bins(&[2.5]), vec![2.5]);
    }

    #[test]
    fn tiny_region_degenerates_to_single_bin() {
        assert_eq!(make_edges(0.8, EdgeSpacing::Log), vec![0.0, 0.8]);
    }

    #[test]
    fn non_integer_max_radius_keeps_exact_last_edge() {
        let edges = make_edges(20.4, EdgeSpacing::Linear);
        assert_eq!(edges.len(), 21);
        assert_relative_eq!(*edges.last().unwrap(), 20.4);
    }
}
