//! Connected-component labeling and adjacency
//!
//! Labels are assigned breadth-first, in raster order of each component's
//! first pixel, starting at 1. Label 0 is background.

use std::collections::{BTreeSet, VecDeque};

use cortimap_core::math::{binary_dilation, mask_difference};
use cortimap_core::Connectivity;
use ndarray::{Array2, Zip};

/// Label image and component count
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledComponents {
    /// Per-pixel label, 0 = background
    pub labels: Array2<u32>,
    /// Number of components (labels run `1..=count`)
    pub count: u32,
}

impl LabeledComponents {
    /// Mask of one label
    #[must_use]
    pub fn mask(&self, label: u32) -> Array2<bool> {
        self.labels.mapv(|l| l == label && label != 0)
    }
}

/// Label the connected components of `foreground`
#[must_use]
pub fn label_components(foreground: &Array2<bool>, connectivity: Connectivity) -> LabeledComponents {
    let (rows, cols) = foreground.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut count = 0u32;
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            if !foreground[[r, c]] || labels[[r, c]] != 0 {
                continue;
            }

            count += 1;
            labels[[r, c]] = count;
            queue.push_back((r, c));

            while let Some((cr, cc)) = queue.pop_front() {
                for &(dr, dc) in connectivity.offsets() {
                    let (nr, nc) = (cr as isize + dr, cc as isize + dc);
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if foreground[[nr, nc]] && labels[[nr, nc]] == 0 {
                        labels[[nr, nc]] = count;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    LabeledComponents { labels, count }
}

/// Labels reachable one step beyond the one-pixel ring around `mask`
///
/// The ring is `dilate(mask) − mask`; its own dilation is searched for
/// labels other than 0 and `label`. Components separated by a one-pixel
/// boundary therefore count as adjacent.
#[must_use]
pub fn adjacent_labels(
    labels: &Array2<u32>,
    mask: &Array2<bool>,
    label: u32,
    connectivity: Connectivity,
) -> BTreeSet<u32> {
    let ring = mask_difference(&binary_dilation(mask, connectivity), mask);
    let reach = binary_dilation(&ring, connectivity);

    let mut found = BTreeSet::new();
    Zip::from(labels).and(&reach).for_each(|&l, &hit| {
        if hit && l != 0 && l != label {
            found.insert(l);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Array2<bool> {
        let cols = rows[0].len();
        Array2::from_shape_fn((rows.len(), cols), |(r, c)| rows[r].as_bytes()[c] == b'#')
    }

    #[test]
    fn test_raster_order_labels() {
        let fg = mask_from(&["##..#", "##..#", ".....", "..##."]);
        let components = label_components(&fg, Connectivity::Four);

        assert_eq!(components.count, 3);
        assert_eq!(components.labels[[0, 0]], 1);
        assert_eq!(components.labels[[0, 4]], 2);
        assert_eq!(components.labels[[3, 2]], 3);
        assert_eq!(components.labels[[2, 2]], 0);
    }

    #[test]
    fn test_diagonal_connectivity() {
        let fg = mask_from(&["#..", ".#.", "..#"]);

        assert_eq!(label_components(&fg, Connectivity::Four).count, 3);
        let eight = label_components(&fg, Connectivity::Eight);
        assert_eq!(eight.count, 1);
        assert_eq!(eight.mask(1).iter().filter(|&&m| m).count(), 3);
    }

    #[test]
    fn test_u_shape_single_component() {
        let fg = mask_from(&["#.#", "#.#", "###"]);
        let components = label_components(&fg, Connectivity::Four);
        assert_eq!(components.count, 1);
        assert_eq!(components.labels[[0, 2]], 1);
    }

    #[test]
    fn test_empty_foreground() {
        let components = label_components(&Array2::from_elem((3, 4), false), Connectivity::Four);
        assert_eq!(components.count, 0);
        assert!(components.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_adjacent_across_one_pixel_boundary() {
        let fg = mask_from(&["###.###", "###.###", "###.###"]);
        let components = label_components(&fg, Connectivity::Four);
        assert_eq!(components.count, 2);

        let left = adjacent_labels(&components.labels, &components.mask(1), 1, Connectivity::Four);
        let right = adjacent_labels(&components.labels, &components.mask(2), 2, Connectivity::Four);
        assert_eq!(left, BTreeSet::from([2]));
        assert_eq!(right, BTreeSet::from([1]));
    }

    #[test]
    fn test_not_adjacent_across_wide_gap() {
        let fg = mask_from(&["##...##", "##...##"]);
        let components = label_components(&fg, Connectivity::Four);

        let left = adjacent_labels(&components.labels, &components.mask(1), 1, Connectivity::Four);
        assert!(left.is_empty());
    }
}
