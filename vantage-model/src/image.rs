use bytes::Bytes;

/// One decoded RGBA8 image plane.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Bytes,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Bytes) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Decoded planes held by a cached asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePlanes {
    /// Nothing decoded; the payload is streamed (videos)
    Stream,
    Flat(DecodedImage),
    Stereo {
        left: DecodedImage,
        right: DecodedImage,
    },
}

impl ImagePlanes {
    pub fn is_stereo(&self) -> bool {
        matches!(self, ImagePlanes::Stereo { .. })
    }

    pub fn primary(&self) -> Option<&DecodedImage> {
        match self {
            ImagePlanes::Stream => None,
            ImagePlanes::Flat(image) => Some(image),
            ImagePlanes::Stereo { left, .. } => Some(left),
        }
    }
}
