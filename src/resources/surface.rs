//! Drawable surface collaborator.
//!
//! The player blits through the [`Surface`] trait and never touches pixels
//! itself. `I` is the image handle type produced by the host's
//! [`AssetLoader`](crate::resources::loader::AssetLoader).
//!
//! [`RetainedCanvas`] is a surface that only remembers what was last presented.
//! Hosts with an immediate-mode renderer (raylib, wgpu, a terminal) read it back
//! every display frame and draw it themselves.

use crate::components::sprite::FrameRect;

pub trait Surface<I> {
    /// Set the surface size. Called once when the player is constructed.
    fn resize(&mut self, width: u32, height: u32);
    /// Clear `width × height` pixels at the origin.
    fn clear(&mut self, width: u32, height: u32);
    /// Blit `src` of a sheet image to the origin.
    fn draw_region(&mut self, image: &I, src: FrameRect);
    /// Swap the backing image to `image` and blit it whole at the origin.
    fn present(&mut self, image: &I);
}

/// What a [`RetainedCanvas`] currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasContent<I> {
    Blank,
    Region { image: I, src: FrameRect },
    Image(I),
}

/// Surface that keeps the last presented frame for the host to render.
#[derive(Debug, Clone)]
pub struct RetainedCanvas<I> {
    pub width: u32,
    pub height: u32,
    content: CanvasContent<I>,
}

impl<I> Default for RetainedCanvas<I> {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            content: CanvasContent::Blank,
        }
    }
}

impl<I> RetainedCanvas<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CanvasContent<I> {
        &self.content
    }
}

impl<I: Clone> Surface<I> for RetainedCanvas<I> {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self, _width: u32, _height: u32) {
        self.content = CanvasContent::Blank;
    }

    fn draw_region(&mut self, image: &I, src: FrameRect) {
        self.content = CanvasContent::Region {
            image: image.clone(),
            src,
        };
    }

    fn present(&mut self, image: &I) {
        self.content = CanvasContent::Image(image.clone());
    }
}
