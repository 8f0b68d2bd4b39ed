//! Frame layout of multi-picture JPEG containers (MPO).
//!
//! Stereo cameras store the left and right eye as two complete JPEG
//! streams concatenated in one file. Walking the marker structure tells us
//! where each stream ends without decoding anything.

use std::ops::Range;

const MAX_FRAMES: usize = 8;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD7)
}

/// End offset (exclusive) of the JPEG stream starting at `start`.
fn jpeg_stream_end(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start..start + 2)? != [0xFF, SOI] {
        return None;
    }
    let mut i = start + 2;
    loop {
        if *bytes.get(i)? != 0xFF {
            return None;
        }
        while *bytes.get(i + 1)? == 0xFF {
            i += 1;
        }
        let marker = bytes[i + 1];
        i += 2;

        if marker == EOI {
            return Some(i);
        }
        if is_standalone(marker) {
            continue;
        }

        let len_bytes = bytes.get(i..i + 2)?;
        let seg_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if seg_len < 2 {
            return None;
        }
        i += seg_len;

        if marker == SOS {
            // Entropy-coded data runs until the next real marker.
            loop {
                let b = *bytes.get(i)?;
                if b != 0xFF {
                    i += 1;
                    continue;
                }
                let next = *bytes.get(i + 1)?;
                if next == 0x00 || (0xD0..=0xD7).contains(&next) {
                    i += 2;
                } else if next == 0xFF {
                    i += 1;
                } else {
                    break;
                }
            }
        }
    }
}

fn find_next_soi(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(3)
        .position(|w| w == [0xFF, SOI, 0xFF])
        .map(|p| from + p)
}

/// Byte ranges of every complete JPEG stream in `bytes`.
///
/// Empty for non-JPEG input; a single entry for a plain JPEG.
pub fn jpeg_frames(bytes: &[u8]) -> Vec<Range<usize>> {
    let mut frames = Vec::new();
    let mut start = 0;
    while frames.len() < MAX_FRAMES {
        let Some(end) = jpeg_stream_end(bytes, start) else {
            break;
        };
        frames.push(start..end);
        match find_next_soi(bytes, end) {
            Some(next) => start = next,
            None => break,
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_jpeg() -> Vec<u8> {
        // SOI, APP0 (len 4, 2 payload bytes), SOS (len 2), data with a
        // stuffed 0xFF00 and a restart marker, EOI.
        vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB, 0xFF, 0xDA, 0x00,
            0x02, 0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD3, 0x56, 0xFF, 0xD9,
        ]
    }

    #[test]
    fn single_stream_is_one_frame() {
        let jpeg = tiny_jpeg();
        assert_eq!(jpeg_frames(&jpeg), vec![0..jpeg.len()]);
    }

    #[test]
    fn concatenated_streams_with_padding_are_split() {
        let first = tiny_jpeg();
        let mut mpo = first.clone();
        mpo.extend_from_slice(&[0x00, 0x00]);
        mpo.extend_from_slice(&first);

        let frames = jpeg_frames(&mpo);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], 0..first.len());
        assert_eq!(frames[1], first.len() + 2..mpo.len());
    }

    #[test]
    fn non_jpeg_and_truncated_input_yield_nothing() {
        assert!(jpeg_frames(b"\x89PNG\r\n\x1a\n").is_empty());
        let jpeg = tiny_jpeg();
        assert!(jpeg_frames(&jpeg[..jpeg.len() - 2]).is_empty());
    }
}
