use serde::{Deserialize, Serialize};

/// Source rectangle of one frame on a sprite sheet, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Grid layout of a sprite sheet.
///
/// Frames are read left to right, top to bottom, `per_row` frames per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub frame_width: u32,
    pub frame_height: u32,
    pub per_row: u32,
}

impl SheetLayout {
    pub fn new(frame_width: u32, frame_height: u32, per_row: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            per_row: per_row.max(1),
        }
    }

    /// Column and row of a frame index.
    pub fn cell(&self, index: u32) -> (u32, u32) {
        (index % self.per_row, index / self.per_row)
    }

    /// Saturates at `u32::MAX`; configs that would need it are rejected when
    /// options are resolved.
    pub fn frame_rect(&self, index: u32) -> FrameRect {
        let (col, row) = self.cell(index);
        FrameRect {
            x: col.saturating_mul(self.frame_width),
            y: row.saturating_mul(self.frame_height),
            width: self.frame_width,
            height: self.frame_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row_layout() {
        let layout = SheetLayout::new(480, 270, 20);
        assert_eq!(layout.cell(7), (7, 0));
        assert_eq!(
            layout.frame_rect(7),
            FrameRect {
                x: 7 * 480,
                y: 0,
                width: 480,
                height: 270
            }
        );
    }

    #[test]
    fn test_wraps_to_next_row() {
        let layout = SheetLayout::new(480, 270, 10);
        assert_eq!(layout.cell(10), (0, 1));
        assert_eq!(layout.cell(19), (9, 1));
        let rect = layout.frame_rect(13);
        assert_eq!((rect.x, rect.y), (3 * 480, 270));
    }

    #[test]
    fn test_huge_offsets_saturate() {
        let layout = SheetLayout::new(100_000, 10, 50_000);
        let rect = layout.frame_rect(49_999);
        assert_eq!((rect.x, rect.y), (u32::MAX, 0));
    }

    #[test]
    fn test_zero_per_row_is_treated_as_one() {
        let layout = SheetLayout::new(8, 8, 0);
        assert_eq!(layout.cell(3), (0, 3));
    }
}
