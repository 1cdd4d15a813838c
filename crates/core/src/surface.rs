//! Layout surface abstraction
//!
//! The core never touches a real display. It asks a [`Surface`] where each
//! resident entry sits relative to the viewport and tells it when entries
//! come and go. [`StackSurface`] is a vertical strip layout used headless
//! and in tests.

use std::collections::BTreeSet;
use std::fmt;
use strip_viewer_cache::CacheEvent;

/// Vertical extent of an entry relative to the viewport top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub top: f32,
    pub bottom: f32,
}

impl Bounds {
    /// Create bounds from a top edge and a height.
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top,
            bottom: top + height,
        }
    }

    /// Height in pixels.
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Whether `y` lies within these bounds, edges inclusive.
    pub fn contains_y(&self, y: f32) -> bool {
        self.top <= y && y <= self.bottom
    }
}

/// Display options that change entry geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayStyle {
    /// Scale entries to the viewport width.
    pub fit_to_width: bool,

    /// Draw a border around each entry.
    pub bordered: bool,
}

/// Where resident entries are laid out.
pub trait Surface {
    /// Viewport height in pixels.
    fn viewport_height(&self) -> f32;

    /// Bounds of a laid-out entry, or `None` if it is not on the surface.
    fn bounds(&self, index: usize) -> Option<Bounds>;

    /// Scroll so the entry's top edge meets the viewport top. Returns
    /// `false` if the entry is not on the surface.
    fn align_top(&mut self, index: usize) -> bool;

    /// Mirror a window cache change.
    fn apply(&mut self, event: CacheEvent);

    /// Change the viewport height.
    fn resize(&mut self, viewport_height: f32);

    /// Change display options.
    fn apply_style(&mut self, _style: DisplayStyle) {}
}

/// Vertical strip of entries with uniform spacing.
///
/// Entries are stacked in index order. Inserting or removing an entry
/// above the viewport adjusts the scroll offset so whatever is on screen
/// stays put.
pub struct StackSurface {
    viewport_height: f32,
    scroll_offset: f32,
    spacing: f32,
    border_px: f32,
    fit_scale: f32,
    style: DisplayStyle,
    item_height: Box<dyn Fn(usize) -> f32 + Send>,
    laid_out: BTreeSet<usize>,
}

impl fmt::Debug for StackSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackSurface")
            .field("viewport_height", &self.viewport_height)
            .field("scroll_offset", &self.scroll_offset)
            .field("style", &self.style)
            .field("laid_out", &self.laid_out.len())
            .finish()
    }
}

impl StackSurface {
    /// Create a surface where entry `i` is `item_height(i)` pixels tall.
    pub fn new<F>(viewport_height: f32, item_height: F) -> Self
    where
        F: Fn(usize) -> f32 + Send + 'static,
    {
        Self {
            viewport_height,
            scroll_offset: 0.0,
            spacing: 0.0,
            border_px: 4.0,
            fit_scale: 1.25,
            style: DisplayStyle::default(),
            item_height: Box::new(item_height),
            laid_out: BTreeSet::new(),
        }
    }

    /// Create a surface where every entry has the same height.
    pub fn uniform(viewport_height: f32, item_height: f32) -> Self {
        Self::new(viewport_height, move |_| item_height)
    }

    /// Set the gap between entries.
    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the height multiplier applied when fitting to width.
    pub fn with_fit_scale(mut self, scale: f32) -> Self {
        self.fit_scale = scale;
        self
    }

    /// Current scroll offset from the top of the strip.
    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Scroll to an absolute offset, clamped to the strip.
    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
    }

    /// Scroll by `dy` pixels, clamped to the strip.
    pub fn scroll_by(&mut self, dy: f32) {
        self.set_scroll_offset(self.scroll_offset + dy);
    }

    /// Total height of the strip.
    pub fn content_height(&self) -> f32 {
        self.laid_out
            .iter()
            .map(|&index| self.slot_height(index))
            .sum()
    }

    /// Number of entries on the surface.
    pub fn len(&self) -> usize {
        self.laid_out.len()
    }

    /// Whether the surface is empty.
    pub fn is_empty(&self) -> bool {
        self.laid_out.is_empty()
    }

    /// Whether an entry is on the surface.
    pub fn contains(&self, index: usize) -> bool {
        self.laid_out.contains(&index)
    }

    /// Current display options.
    pub fn style(&self) -> DisplayStyle {
        self.style
    }

    fn max_scroll(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    fn entry_height(&self, index: usize) -> f32 {
        let mut height = (self.item_height)(index);
        if self.style.fit_to_width {
            height *= self.fit_scale;
        }
        if self.style.bordered {
            height += 2.0 * self.border_px;
        }
        height
    }

    fn slot_height(&self, index: usize) -> f32 {
        self.entry_height(index) + self.spacing
    }

    /// Offset of an entry's top edge from the top of the strip.
    fn offset_of(&self, index: usize) -> f32 {
        self.laid_out
            .range(..index)
            .map(|&before| self.slot_height(before))
            .sum()
    }

    /// First entry whose bottom edge is below the viewport top.
    fn anchor(&self) -> Option<usize> {
        let mut offset = 0.0;
        for &index in &self.laid_out {
            offset += self.slot_height(index);
            if offset > self.scroll_offset {
                return Some(index);
            }
        }
        None
    }
}

impl Surface for StackSurface {
    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn bounds(&self, index: usize) -> Option<Bounds> {
        if !self.laid_out.contains(&index) {
            return None;
        }
        let top = self.offset_of(index) - self.scroll_offset;
        Some(Bounds::new(top, self.entry_height(index)))
    }

    fn align_top(&mut self, index: usize) -> bool {
        if !self.laid_out.contains(&index) {
            return false;
        }
        self.set_scroll_offset(self.offset_of(index));
        true
    }

    fn apply(&mut self, event: CacheEvent) {
        match event {
            CacheEvent::Inserted(index) => {
                let anchor = self.anchor();
                if !self.laid_out.insert(index) {
                    return;
                }
                if anchor.is_some_and(|anchor| index < anchor) {
                    self.scroll_offset += self.slot_height(index);
                }
            }
            CacheEvent::Evicted(index) => {
                let anchor = self.anchor();
                if !self.laid_out.remove(&index) {
                    return;
                }
                if anchor.is_some_and(|anchor| index < anchor) {
                    self.scroll_offset -= self.slot_height(index);
                }
                self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
            }
            CacheEvent::Cleared => {
                self.laid_out.clear();
                self.scroll_offset = 0.0;
            }
        }
    }

    fn resize(&mut self, viewport_height: f32) {
        self.viewport_height = viewport_height.max(0.0);
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
    }

    fn apply_style(&mut self, style: DisplayStyle) {
        self.style = style;
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_with(indices: impl IntoIterator<Item = usize>) -> StackSurface {
        let mut surface = StackSurface::uniform(800.0, 1000.0);
        for index in indices {
            surface.apply(CacheEvent::Inserted(index));
        }
        surface
    }

    #[test]
    fn test_bounds_follow_scroll() {
        let mut surface = surface_with(0..10);
        assert_eq!(surface.bounds(0), Some(Bounds::new(0.0, 1000.0)));
        assert_eq!(surface.bounds(3), Some(Bounds::new(3000.0, 1000.0)));

        surface.scroll_by(2500.0);
        assert_eq!(surface.bounds(3), Some(Bounds::new(500.0, 1000.0)));
        assert!(surface.bounds(10).is_none());
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut surface = surface_with(0..3);
        surface.scroll_by(-50.0);
        assert_eq!(surface.scroll_offset(), 0.0);

        surface.scroll_by(10_000.0);
        assert_eq!(surface.scroll_offset(), 2200.0);
    }

    #[test]
    fn test_align_top() {
        let mut surface = surface_with(0..10);
        assert!(surface.align_top(4));
        assert_eq!(surface.bounds(4).map(|b| b.top), Some(0.0));
        assert!(!surface.align_top(42));
    }

    #[test]
    fn test_insert_above_viewport_keeps_anchor() {
        let mut surface = surface_with(10..20);
        surface.align_top(12);
        let before = surface.bounds(12);

        for index in 0..10 {
            surface.apply(CacheEvent::Inserted(index));
        }
        assert_eq!(surface.bounds(12), before);

        // Inserting below the viewport changes nothing on screen
        surface.apply(CacheEvent::Inserted(25));
        assert_eq!(surface.bounds(12), before);
    }

    #[test]
    fn test_evict_above_viewport_keeps_anchor() {
        let mut surface = surface_with(0..30);
        surface.align_top(20);

        for index in 0..10 {
            surface.apply(CacheEvent::Evicted(index));
        }
        assert_eq!(surface.bounds(20).map(|b| b.top), Some(0.0));
        assert_eq!(surface.scroll_offset(), 10_000.0);
    }

    #[test]
    fn test_cleared_resets() {
        let mut surface = surface_with(0..10);
        surface.scroll_by(3000.0);
        surface.apply(CacheEvent::Cleared);
        assert!(surface.is_empty());
        assert_eq!(surface.scroll_offset(), 0.0);
    }

    #[test]
    fn test_style_changes_geometry() {
        let mut surface = surface_with(0..2).with_fit_scale(2.0);
        surface.apply_style(DisplayStyle {
            fit_to_width: true,
            bordered: true,
        });
        assert_eq!(surface.bounds(1), Some(Bounds::new(2008.0, 2008.0)));
    }

    #[test]
    fn test_spacing() {
        let surface = StackSurface::uniform(800.0, 100.0).with_spacing(10.0);
        let mut surface = surface;
        surface.apply(CacheEvent::Inserted(0));
        surface.apply(CacheEvent::Inserted(1));
        assert_eq!(surface.bounds(1).map(|b| b.top), Some(110.0));
        assert_eq!(surface.content_height(), 220.0);
    }
}
