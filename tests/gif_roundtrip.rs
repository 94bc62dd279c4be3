//! End-to-end GIF encode/decode round-trips.

use rasterfmt::gif::{self, Frame};
use rasterfmt::Image;

fn banded(width: u32, height: u32, colors: &[(u8, u8, u8)]) -> Image {
    let mut image = Image::new(width, height).unwrap();
    for y in 0..height {
        let c = colors[(y as usize * colors.len()) / height as usize];
        for x in 0..width {
            image.put_pixel(x, y, (c.0, c.1, c.2, 255));
        }
    }
    image
}

#[test]
fn test_still_image_lossless_within_budget() {
    // Eight distinct colors fit any palette budget, so every pixel
    // survives exactly.
    let colors = [
        (255, 0, 0),
        (0, 255, 0),
        (0, 0, 255),
        (255, 255, 0),
        (0, 255, 255),
        (255, 0, 255),
        (255, 255, 255),
        (0, 0, 0),
    ];
    let image = banded(16, 16, &colors);

    let mut data = Vec::new();
    let written = gif::Encoder::new().encode(&image, &mut data).unwrap();
    assert_eq!(written, data.len());
    assert_eq!(&data[0..6], b"GIF89a");

    let anim = gif::decode_slice(&data).unwrap();
    assert_eq!(anim.width, 16);
    assert_eq!(anim.height, 16);
    assert_eq!(anim.frames.len(), 1);
    assert_eq!(anim.repeat, None);
    assert_eq!(anim.frames[0].image, image);
}

#[test]
fn test_tight_palette_budget_still_exact() {
    // Exactly four colors through a palette budget of four.
    let colors = [(10, 20, 30), (200, 10, 10), (10, 200, 10), (10, 10, 200)];
    let image = banded(8, 8, &colors);

    let mut data = Vec::new();
    gif::Encoder::new()
        .palette_size(4)
        .encode(&image, &mut data)
        .unwrap();

    let anim = gif::decode_slice(&data).unwrap();
    assert_eq!(anim.frames[0].image, image);
}

#[test]
fn test_animation_delays_and_repeat() {
    let frames = vec![
        Frame {
            image: banded(10, 6, &[(255, 0, 0), (0, 0, 255)]),
            delay_cs: 8,
        },
        Frame {
            image: banded(10, 6, &[(0, 255, 0), (255, 255, 0)]),
            delay_cs: 12,
        },
        Frame {
            image: banded(10, 6, &[(0, 0, 0), (255, 255, 255)]),
            delay_cs: 20,
        },
    ];

    let mut data = Vec::new();
    gif::Encoder::new()
        .repeat(Some(0))
        .encode_animation(&frames, &mut data)
        .unwrap();

    let anim = gif::decode_slice(&data).unwrap();
    assert_eq!(anim.repeat, Some(0));
    assert_eq!(anim.frames.len(), 3);
    for (got, want) in anim.frames.iter().zip(frames.iter()) {
        assert_eq!(got.delay_cs, want.delay_cs);
        assert_eq!(got.image, want.image);
    }
}

#[test]
fn test_transparency_composites_over_earlier_frame() {
    // Frame 2 punches a transparent hole; the decoder must show frame
    // 1's pixel through it.
    let base = banded(4, 4, &[(60, 60, 60)]);
    let mut overlay = banded(4, 4, &[(240, 120, 0)]);
    overlay.put_pixel(2, 2, (0, 0, 0, 0));

    let frames = vec![
        Frame {
            image: base,
            delay_cs: 5,
        },
        Frame {
            image: overlay,
            delay_cs: 5,
        },
    ];

    let mut data = Vec::new();
    gif::Encoder::new().encode_animation(&frames, &mut data).unwrap();

    let anim = gif::decode_slice(&data).unwrap();
    assert_eq!(anim.frames[1].image.get_pixel(0, 0), (240, 120, 0, 255));
    assert_eq!(anim.frames[1].image.get_pixel(2, 2), (60, 60, 60, 255));
}

#[test]
fn test_decode_from_reader() {
    let image = banded(6, 6, &[(1, 2, 3), (7, 8, 9)]);
    let mut data = Vec::new();
    gif::Encoder::new().encode(&image, &mut data).unwrap();

    let anim = gif::decode(std::io::Cursor::new(data)).unwrap();
    assert_eq!(anim.frames[0].image, image);
}
