//! Image decode helpers

use std::io::Cursor;

use image::DynamicImage;

use crate::error::ScanError;

/// Decode an image from bytes (JPEG, PNG, etc.) with EXIF orientation applied.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, ScanError> {
    let img = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, img))
}

/// Phones often store rotation in an EXIF tag instead of rotating pixels.
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|meta| {
            meta.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1);

    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
