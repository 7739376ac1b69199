//! Removal of small ice patches before edge detection.

use ndarray::Array2;

/// Drop 4-connected clusters of ice with fewer than `min_size` cells.
///
/// Cells count as ice when their value is above zero; missing values are
/// water. Returns a 1/0 grid.
pub fn remove_small_clusters(ice: &Array2<f64>, min_size: usize) -> Array2<f64> {
    let (ny, nx) = ice.dim();
    let is_ice = |j: usize, i: usize| ice[[j, i]] > 0.0;
    let mut out = Array2::zeros((ny, nx));
    let mut seen = Array2::from_elem((ny, nx), false);
    let mut stack = Vec::new();
    let mut cluster = Vec::new();

    for j in 0..ny {
        for i in 0..nx {
            if seen[[j, i]] || !is_ice(j, i) {
                continue;
            }
            seen[[j, i]] = true;
            stack.push((j, i));
            cluster.clear();
            while let Some((cj, ci)) = stack.pop() {
                cluster.push((cj, ci));
                let neighbours = [
                    (cj.wrapping_sub(1), ci),
                    (cj + 1, ci),
                    (cj, ci.wrapping_sub(1)),
                    (cj, ci + 1),
                ];
                for (nj, ni) in neighbours {
                    if nj < ny && ni < nx && !seen[[nj, ni]] && is_ice(nj, ni) {
                        seen[[nj, ni]] = true;
                        stack.push((nj, ni));
                    }
                }
            }
            if cluster.len() >= min_size {
                for &cell in &cluster {
                    out[cell] = 1.0;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn small_patches_removed() {
        let ice = array![
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, f64::NAN, 0.0, 0.0],
        ];
        let out = remove_small_clusters(&ice, 2);
        assert_eq!(out.sum(), 4.0);
        assert_eq!(out[[1, 3]], 0.0);
        // diagonal contact does not join clusters
        assert_eq!(out[[2, 2]], 0.0);
    }

    #[test]
    fn size_one_keeps_everything() {
        let ice = array![[0.3, 0.0], [0.0, 0.9]];
        assert_eq!(remove_small_clusters(&ice, 1), array![[1.0, 0.0], [0.0, 1.0]]);
    }
}
