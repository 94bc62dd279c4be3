//! Shared in-memory image representation.
//!
//! Both codecs read from and write to this buffer: the JPEG and GIF
//! decoders produce an [`Image`], the encoders consume one. Pixels are
//! packed RGBA, 8 bits per channel, row-major.

use crate::error::{Error, Result};

/// A packed RGBA image owned by the caller across codec calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// Create a blank (fully transparent) image.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        })
    }

    /// Create an image from an existing RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The packed RGBA pixel data, 4 bytes per pixel, row-major.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access for in-place pixel transforms.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Read one pixel as (R, G, B, A).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        (
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    /// Write one pixel.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: (u8, u8, u8, u8)) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i] = rgba.0;
        self.pixels[i + 1] = rgba.1;
        self.pixels[i + 2] = rgba.2;
        self.pixels[i + 3] = rgba.3;
    }

    /// Swap the backing buffer for one of different dimensions.
    ///
    /// Existing contents are discarded; the new buffer is zeroed.
    pub fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * 4];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_zeroed() {
        let img = Image::new(3, 2).unwrap();
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.pixels().len(), 24);
        assert!(img.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            Image::new(0, 5),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_buffer_size_checked() {
        assert!(matches!(
            Image::from_rgba(2, 2, vec![0; 15]),
            Err(Error::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_pixel_accessors() {
        let mut img = Image::new(2, 2).unwrap();
        img.put_pixel(1, 1, (10, 20, 30, 255));
        assert_eq!(img.get_pixel(1, 1), (10, 20, 30, 255));
        assert_eq!(img.get_pixel(0, 0), (0, 0, 0, 0));
    }

    #[test]
    fn test_recreate_swaps_buffer() {
        let mut img = Image::new(2, 2).unwrap();
        img.put_pixel(0, 0, (1, 2, 3, 4));
        img.recreate(4, 4).unwrap();
        assert_eq!(img.width(), 4);
        assert_eq!(img.pixels().len(), 64);
        assert_eq!(img.get_pixel(0, 0), (0, 0, 0, 0));
    }
}
