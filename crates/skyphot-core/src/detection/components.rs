use ndarray::Array2;

/// Connected-component labeling of a binary mask.
#[derive(Clone, Debug)]
pub struct Labeling {
    /// Per-pixel label; 0 = background, components numbered `1..=count`
    /// in raster order of their first pixel.
    pub labels: Array2<u32>,
    pub count: usize,
}

/// Two-pass labeling with union-find, 8-connectivity.
pub fn label_components(mask: &Array2<bool>) -> Labeling {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    if h == 0 || w == 0 {
        return Labeling { labels, count: 0 };
    }

    // Index 0 unused; provisional labels start at 1.
    let mut parent: Vec<u32> = vec![0];

    for row in 0..h {
        for col in 0..w {
            if !mask[[row, col]] {
                continue;
            }

            let mut neighbours = [0u32; 4];
            if col > 0 {
                neighbours[0] = labels[[row, col - 1]];
            }
            if row > 0 {
                neighbours[1] = labels[[row - 1, col]];
                if col > 0 {
                    neighbours[2] = labels[[row - 1, col - 1]];
                }
                if col + 1 < w {
                    neighbours[3] = labels[[row - 1, col + 1]];
                }
            }

            let smallest = neighbours.iter().copied().filter(|&l| l > 0).min();
            match smallest {
                None => {
                    let next = parent.len() as u32;
                    parent.push(next);
                    labels[[row, col]] = next;
                }
                Some(label) => {
                    labels[[row, col]] = label;
                    for &other in neighbours.iter().filter(|&&l| l > 0 && l != label) {
                        union(&mut parent, label, other);
                    }
                }
            }
        }
    }

    // Resolve roots and renumber densely in raster order.
    let mut dense = vec![0u32; parent.len()];
    let mut count = 0u32;
    for v in labels.iter_mut() {
        if *v == 0 {
            continue;
        }
        let root = find(&mut parent, *v) as usize;
        if dense[root] == 0 {
            count += 1;
            dense[root] = count;
        }
        *v = dense[root];
    }

    Labeling {
        labels,
        count: count as usize,
    }
}

fn find(parent: &mut [u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        parent[x as usize] = parent[parent[x as usize] as usize];
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Merge larger root into smaller root to keep labels consistent.
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}
