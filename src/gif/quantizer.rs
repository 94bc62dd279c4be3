//! Octree color quantization for GIF palettes.
//!
//! Colors are inserted into an 8-level octree keyed by the R/G/B bits
//! from most significant to least. Every node on the insert path
//! accumulates a pixel count and channel sums, so any subtree can be
//! collapsed into its root; reduction merges the lowest-population
//! node at the deepest populated level until at most the requested
//! number of leaves remain. Palette order follows the deterministic
//! depth-first octree walk.

use crate::error::{Error, Result};
use crate::image::Image;

/// Alpha values below this map to the reserved transparent index.
pub const TRANSPARENCY_THRESHOLD: u8 = 128;

const MAX_DEPTH: usize = 8;

const NO_CHILD: u32 = u32::MAX;

struct Node {
    children: [u32; 8],
    /// Pixels in this subtree.
    count: u64,
    r_sum: u64,
    g_sum: u64,
    b_sum: u64,
    leaf: bool,
    palette_index: u8,
}

impl Node {
    fn new(leaf: bool) -> Self {
        Node {
            children: [NO_CHILD; 8],
            count: 0,
            r_sum: 0,
            g_sum: 0,
            b_sum: 0,
            leaf,
            palette_index: 0,
        }
    }
}

/// Octree accumulator over the colors of one frame.
pub struct OctreeQuantizer {
    nodes: Vec<Node>,
    /// Non-leaf node indices per depth 0..8.
    levels: [Vec<u32>; MAX_DEPTH],
    leaf_count: usize,
}

impl Default for OctreeQuantizer {
    fn default() -> Self {
        Self::new()
    }
}

impl OctreeQuantizer {
    pub fn new() -> Self {
        // The root sits in the level lists too: once every deeper
        // candidate is spent, the whole tree can still collapse into a
        // single leaf.
        let mut levels: [Vec<u32>; MAX_DEPTH] = Default::default();
        levels[0].push(0);
        OctreeQuantizer {
            nodes: vec![Node::new(false)],
            levels,
            leaf_count: 0,
        }
    }

    /// Octant selector for `depth` (0 = most significant bits).
    #[inline]
    fn branch(r: u8, g: u8, b: u8, depth: usize) -> usize {
        let shift = 7 - depth;
        let rb = ((r >> shift) & 1) as usize;
        let gb = ((g >> shift) & 1) as usize;
        let bb = ((b >> shift) & 1) as usize;
        (rb << 2) | (gb << 1) | bb
    }

    /// Record one opaque pixel.
    pub fn add_color(&mut self, r: u8, g: u8, b: u8) {
        let mut node = 0usize;
        for depth in 0..=MAX_DEPTH {
            let n = &mut self.nodes[node];
            n.count += 1;
            n.r_sum += r as u64;
            n.g_sum += g as u64;
            n.b_sum += b as u64;
            if n.leaf || depth == MAX_DEPTH {
                return;
            }

            let octant = Self::branch(r, g, b, depth);
            let child = self.nodes[node].children[octant];
            node = if child == NO_CHILD {
                let is_leaf = depth + 1 == MAX_DEPTH;
                let idx = self.nodes.len() as u32;
                self.nodes.push(Node::new(is_leaf));
                self.nodes[node].children[octant] = idx;
                if is_leaf {
                    self.leaf_count += 1;
                } else {
                    self.levels[depth + 1].push(idx);
                }
                idx as usize
            } else {
                child as usize
            };
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Collapse subtrees until at most `max_leaves` remain.
    fn reduce(&mut self, max_leaves: usize) {
        while self.leaf_count > max_leaves {
            // Deepest level that still has candidates to merge. Entries
            // absorbed or converted by an earlier collapse are stale and
            // dropped here.
            let mut depth_found = None;
            for d in (0..MAX_DEPTH).rev() {
                let nodes = &self.nodes;
                self.levels[d].retain(|&n| {
                    let node = &nodes[n as usize];
                    !node.leaf && node.children.iter().any(|&c| c != NO_CHILD)
                });
                if !self.levels[d].is_empty() {
                    depth_found = Some(d);
                    break;
                }
            }
            let depth = match depth_found {
                Some(d) => d,
                None => break,
            };

            // Lowest-population candidate, arena order breaking ties.
            let slot = self.levels[depth]
                .iter()
                .enumerate()
                .min_by_key(|&(_, &n)| (self.nodes[n as usize].count, n))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let victim = self.levels[depth].swap_remove(slot) as usize;
            self.collapse(victim);
        }
    }

    /// Turn `node` into a leaf, absorbing its whole subtree.
    fn collapse(&mut self, node: usize) {
        if self.nodes[node].leaf {
            return;
        }
        let mut removed = 0usize;
        let children = self.nodes[node].children;
        for &c in children.iter() {
            if c != NO_CHILD {
                self.collapse_subtree(c as usize, &mut removed);
            }
        }
        self.nodes[node].children = [NO_CHILD; 8];
        self.nodes[node].leaf = true;
        self.leaf_count = self.leaf_count + 1 - removed;
    }

    fn collapse_subtree(&mut self, node: usize, removed: &mut usize) {
        if self.nodes[node].leaf {
            *removed += 1;
            self.nodes[node].leaf = false;
            return;
        }
        let children = self.nodes[node].children;
        for &c in children.iter() {
            if c != NO_CHILD {
                self.collapse_subtree(c as usize, removed);
            }
        }
        self.nodes[node].children = [NO_CHILD; 8];
    }

    /// Reduce to `max_colors` leaves and return the palette in
    /// depth-first octree order. Assigns each leaf its index.
    pub fn build_palette(&mut self, max_colors: usize) -> Vec<[u8; 3]> {
        self.reduce(max_colors);
        // Interior nodes swallowed by a deeper collapse leave stale
        // level entries behind; drop any that no longer have children.
        for level in self.levels.iter_mut() {
            level.retain(|&n| !self.nodes[n as usize].leaf);
        }

        let mut palette = Vec::with_capacity(self.leaf_count);
        let mut order = Vec::with_capacity(self.leaf_count);
        self.walk_leaves(0, &mut order);
        for &n in order.iter() {
            let node = &self.nodes[n];
            let count = node.count.max(1);
            let idx = palette.len() as u8;
            palette.push([
                (node.r_sum / count) as u8,
                (node.g_sum / count) as u8,
                (node.b_sum / count) as u8,
            ]);
            self.nodes[n].palette_index = idx;
        }
        palette
    }

    fn walk_leaves(&self, node: usize, order: &mut Vec<usize>) {
        let n = &self.nodes[node];
        if n.leaf {
            order.push(node);
            return;
        }
        for &c in n.children.iter() {
            if c != NO_CHILD {
                self.walk_leaves(c as usize, order);
            }
        }
    }

    /// Palette index for a color previously fed to [`add_color`].
    ///
    /// [`add_color`]: OctreeQuantizer::add_color
    pub fn index_of(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut node = 0usize;
        for depth in 0..MAX_DEPTH {
            if self.nodes[node].leaf {
                break;
            }
            let octant = Self::branch(r, g, b, depth);
            let child = self.nodes[node].children[octant];
            if child == NO_CHILD {
                break;
            }
            node = child as usize;
        }
        self.nodes[node].palette_index
    }
}

/// One frame reduced to indexed color.
pub struct QuantizedFrame {
    pub palette: Vec<[u8; 3]>,
    pub indices: Vec<u8>,
    pub transparent_index: Option<u8>,
}

/// Quantize an RGBA frame to at most `palette_size` colors, reserving
/// one slot for transparency when any pixel needs it.
pub fn quantize_frame(image: &Image, palette_size: u16) -> Result<QuantizedFrame> {
    if palette_size < 2 || palette_size > 256 {
        return Err(Error::InvalidPaletteSize(palette_size));
    }

    let pixels = image.pixels();
    let has_transparent = pixels
        .chunks_exact(4)
        .any(|p| p[3] < TRANSPARENCY_THRESHOLD);
    let color_budget = if has_transparent {
        palette_size as usize - 1
    } else {
        palette_size as usize
    };

    let mut quantizer = OctreeQuantizer::new();
    for p in pixels.chunks_exact(4) {
        if p[3] >= TRANSPARENCY_THRESHOLD {
            quantizer.add_color(p[0], p[1], p[2]);
        }
    }

    let mut palette = quantizer.build_palette(color_budget);
    let transparent_index = if has_transparent {
        palette.push([0, 0, 0]);
        Some((palette.len() - 1) as u8)
    } else {
        None
    };

    let mut indices = Vec::with_capacity(pixels.len() / 4);
    for p in pixels.chunks_exact(4) {
        if p[3] < TRANSPARENCY_THRESHOLD {
            // unwrap is fine: has_transparent guarantees the slot
            indices.push(transparent_index.unwrap_or(0));
        } else {
            indices.push(quantizer.index_of(p[0], p[1], p[2]));
        }
    }

    Ok(QuantizedFrame {
        palette,
        indices,
        transparent_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_from_colors(colors: &[(u8, u8, u8, u8)]) -> Image {
        let mut image = Image::new(colors.len() as u32, 1).unwrap();
        for (i, &c) in colors.iter().enumerate() {
            image.put_pixel(i as u32, 0, c);
        }
        image
    }

    #[test]
    fn test_few_colors_survive_exactly() {
        // Fewer distinct colors than the budget: each keeps its own
        // leaf and maps back to itself.
        let colors = [
            (255u8, 0u8, 0u8, 255u8),
            (0, 255, 0, 255),
            (0, 0, 255, 255),
            (255, 255, 255, 255),
        ];
        let image = image_from_colors(&colors);
        let q = quantize_frame(&image, 16).unwrap();

        assert!(q.palette.len() <= 16);
        assert!(q.transparent_index.is_none());
        for (i, &(r, g, b, _)) in colors.iter().enumerate() {
            let idx = q.indices[i] as usize;
            assert_eq!(q.palette[idx], [r, g, b]);
        }
    }

    #[test]
    fn test_same_color_same_index() {
        let image = image_from_colors(&[
            (10, 20, 30, 255),
            (200, 100, 50, 255),
            (10, 20, 30, 255),
        ]);
        let q = quantize_frame(&image, 8).unwrap();
        assert_eq!(q.indices[0], q.indices[2]);
        assert_ne!(q.indices[0], q.indices[1]);
    }

    #[test]
    fn test_reduction_respects_budget() {
        // 256 distinct grays cannot fit a 16-entry palette.
        let mut image = Image::new(256, 1).unwrap();
        for i in 0..256u32 {
            let v = i as u8;
            image.put_pixel(i, 0, (v, v, v, 255));
        }
        let q = quantize_frame(&image, 16).unwrap();
        assert!(q.palette.len() <= 16);
        assert_eq!(q.indices.len(), 256);
        // Mapped colors stay reasonably close to the originals.
        for i in 0..256usize {
            let [r, _, _] = q.palette[q.indices[i] as usize];
            assert!((r as i32 - i as i32).abs() <= 32);
        }
    }

    #[test]
    fn test_transparency_reserved_slot() {
        let image = image_from_colors(&[
            (255, 0, 0, 255),
            (0, 255, 0, 0),  // fully transparent
            (0, 0, 255, 40), // below threshold
            (9, 9, 9, 200),  // opaque enough
        ]);
        let q = quantize_frame(&image, 8).unwrap();

        let t = q.transparent_index.expect("transparent slot expected");
        assert_eq!(t as usize, q.palette.len() - 1);
        assert_eq!(q.indices[1], t);
        assert_eq!(q.indices[2], t);
        assert_ne!(q.indices[0], t);
        assert_ne!(q.indices[3], t);
    }

    #[test]
    fn test_opaque_image_has_no_transparent_index() {
        let image = image_from_colors(&[(1, 2, 3, 255), (4, 5, 6, 200)]);
        let q = quantize_frame(&image, 4).unwrap();
        assert!(q.transparent_index.is_none());
    }

    #[test]
    fn test_bad_palette_size() {
        let image = image_from_colors(&[(0, 0, 0, 255)]);
        assert!(matches!(
            quantize_frame(&image, 1),
            Err(Error::InvalidPaletteSize(1))
        ));
        assert!(matches!(
            quantize_frame(&image, 300),
            Err(Error::InvalidPaletteSize(300))
        ));
    }

    #[test]
    fn test_budget_below_top_octant_count() {
        // Four colors in four distinct top-level octants can only meet
        // a 2-entry budget by collapsing into the root.
        let image = image_from_colors(&[
            (255, 0, 0, 255),
            (0, 255, 0, 255),
            (0, 0, 255, 255),
            (255, 255, 255, 255),
        ]);
        let q = quantize_frame(&image, 2).unwrap();
        assert!(
            q.palette.len() <= 2,
            "requested 2 colors, got {}",
            q.palette.len()
        );
        for &idx in q.indices.iter() {
            assert!((idx as usize) < q.palette.len());
        }
    }

    #[test]
    fn test_merge_prefers_low_population() {
        // Two clusters plus one dominant color. After reduction to 2
        // leaves the dominant color must keep an accurate entry.
        let mut q = OctreeQuantizer::new();
        for _ in 0..1000 {
            q.add_color(250, 250, 250);
        }
        q.add_color(10, 0, 0);
        q.add_color(0, 10, 0);
        q.add_color(0, 0, 10);
        let palette = q.build_palette(2);
        assert!(palette.len() <= 2);
        assert!(palette.contains(&[250, 250, 250]));
    }
}
