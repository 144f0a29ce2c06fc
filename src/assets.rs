use crate::error::DocumentError;
use base64::Engine;
use image::GenericImageView;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    Flate,
    Dct,
}

// A raster decoded and re-encoded into the form a PDF image XObject needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub bits_per_component: u8,
    pub filter: ImageFilter,
    pub data: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl ImageAsset {
    // Width over height; used to size the image on the page.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

// Decoded images keyed by the resource id that `DrawImage` commands use.
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    images: BTreeMap<String, ImageAsset>,
}

impl AssetBundle {
    pub fn add_image(&mut self, resource_id: impl Into<String>, image: ImageAsset) {
        self.images.insert(resource_id.into(), image);
    }

    pub fn image(&self, resource_id: &str) -> Option<&ImageAsset> {
        self.images.get(resource_id)
    }

    pub fn images(&self) -> impl Iterator<Item = (&String, &ImageAsset)> {
        self.images.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

// Decodes a `data:` URI or raw PNG/JPEG bytes.
pub fn decode_image_source(source: &[u8]) -> Result<ImageAsset, DocumentError> {
    if source.starts_with(b"data:") {
        let uri = std::str::from_utf8(source)
            .map_err(|err| DocumentError::ResourceEmbed(format!("data uri is not utf-8: {err}")))?;
        let (mime, data) = parse_data_uri(uri)?;
        return decode_image_bytes(&data, Some(&mime));
    }
    decode_image_bytes(source, None)
}

pub fn decode_image_bytes(data: &[u8], mime: Option<&str>) -> Result<ImageAsset, DocumentError> {
    let format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        Some(mime) => {
            return Err(DocumentError::ResourceEmbed(format!(
                "unsupported image type {mime}"
            )));
        }
        None => image::guess_format(data).ok(),
    };

    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    }
    .map_err(|err| DocumentError::ResourceEmbed(err.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(DocumentError::ResourceEmbed("image has no pixels".to_string()));
    }

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Ok(ImageAsset {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: ImageFilter::Dct,
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(ImageAsset {
        width,
        height,
        color_space: "/DeviceRGB",
        bits_per_component: 8,
        filter: ImageFilter::Flate,
        data: flate_compress(&rgb)?,
        alpha: if has_alpha {
            Some(flate_compress(&alpha)?)
        } else {
            None
        },
    })
}

pub fn parse_data_uri(uri: &str) -> Result<(String, Vec<u8>), DocumentError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(DocumentError::ResourceEmbed("not a data uri".to_string()));
    };
    let Some((header, data_part)) = rest.split_once(',') else {
        return Err(DocumentError::ResourceEmbed(
            "data uri has no payload".to_string(),
        ));
    };
    let mime = header
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .map_err(|err| DocumentError::ResourceEmbed(format!("bad base64 payload: {err}")))?
    } else {
        data_part.as_bytes().to_vec()
    };
    Ok((mime, data))
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, DocumentError> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
