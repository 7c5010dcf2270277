use core::cmp::Ordering;

use rgb::RGB8;

/// A box of histogram entries: (mean color, pixel count).
#[derive(Debug, Clone)]
struct ColorBox {
    entries: Vec<([f32; 3], f32)>,
}

impl ColorBox {
    fn new(entries: Vec<([f32; 3], f32)>) -> Self {
        Self { entries }
    }

    fn total_weight(&self) -> f32 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Extent along each of R, G, B.
    fn ranges(&self) -> [f32; 3] {
        let mut lo = [f32::MAX; 3];
        let mut hi = [f32::MIN; 3];
        for (c, _) in &self.entries {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(c[axis]);
                hi[axis] = hi[axis].max(c[axis]);
            }
        }
        [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]]
    }

    fn widest_axis(&self) -> (usize, f32) {
        let r = self.ranges();
        let mut axis = 0;
        for i in 1..3 {
            if r[i] > r[axis] {
                axis = i;
            }
        }
        (axis, r[axis])
    }

    /// Heavier boxes with a wider spread split first.
    fn priority(&self) -> f32 {
        self.total_weight() * self.widest_axis().1
    }

    fn mean(&self) -> RGB8 {
        let mut sum = [0.0f64; 3];
        let mut weight = 0.0f64;
        for (c, w) in &self.entries {
            for axis in 0..3 {
                sum[axis] += c[axis] as f64 * *w as f64;
            }
            weight += *w as f64;
        }
        if weight <= 0.0 {
            return RGB8::new(0, 0, 0);
        }
        let ch = |s: f64| (s / weight).round().clamp(0.0, 255.0) as u8;
        RGB8::new(ch(sum[0]), ch(sum[1]), ch(sum[2]))
    }

    /// Split at the weighted median of the widest axis.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (axis, _) = self.widest_axis();
        self.entries
            .sort_unstable_by(|a, b| a.0[axis].partial_cmp(&b.0[axis]).unwrap_or(Ordering::Equal));

        let half = self.total_weight() / 2.0;
        let mut running = 0.0f32;
        let mut at = self.entries.len() - 1;
        for (i, (_, w)) in self.entries.iter().enumerate() {
            running += w;
            if running >= half {
                at = i + 1;
                break;
            }
        }
        let at = at.clamp(1, self.entries.len() - 1);

        let upper = self.entries.split_off(at);
        (ColorBox::new(self.entries), ColorBox::new(upper))
    }
}

/// Reduce a weighted color histogram to at most `max_colors` colors by
/// repeatedly splitting the highest-priority box at its weighted median.
pub fn median_cut(histogram: Vec<([f32; 3], f32)>, max_colors: usize) -> Vec<RGB8> {
    if histogram.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let mut boxes = vec![ColorBox::new(histogram)];
    while boxes.len() < max_colors {
        let next = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.entries.len() >= 2)
            .max_by(|(_, a), (_, b)| {
                a.priority()
                    .partial_cmp(&b.priority())
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(i, _)| i);

        let Some(i) = next else {
            break;
        };
        let (lo, hi) = boxes.swap_remove(i).split();
        boxes.push(lo);
        boxes.push(hi);
    }

    boxes.iter().map(ColorBox::mean).collect()
}
