//! DRGB frame layout.
//!
//! `[mode:1][timeout_secs:1][R,G,B per LED]` — mode 2 selects the direct RGB
//! realtime mode; the timeout tells the receiver how many seconds to keep
//! showing the last frame before falling back to its own effects.

/// Default WLED UDP realtime port.
pub const DEFAULT_PORT: u16 = 21324;

/// Direct RGB realtime mode.
pub const MODE_DRGB: u8 = 2;

/// Header bytes preceding the RGB payload.
pub const HEADER_LEN: usize = 2;

/// Total frame length for a strip of `led_count` LEDs.
pub fn frame_len(led_count: usize) -> usize {
    HEADER_LEN + led_count * 3
}

/// Write the two header bytes into an existing buffer.
pub fn write_header(buf: &mut [u8], timeout_secs: u8) {
    buf[0] = MODE_DRGB;
    buf[1] = timeout_secs;
}

/// Build a complete frame from packed RGB bytes.
pub fn encode_frame(timeout_secs: u8, rgb: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + rgb.len());
    frame.push(MODE_DRGB);
    frame.push(timeout_secs);
    frame.extend_from_slice(rgb);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_is_exact() {
        let rgb = [255, 0, 0, 0, 255, 0, 0, 0, 255];
        let frame = encode_frame(1, &rgb);
        assert_eq!(frame, vec![2, 1, 255, 0, 0, 0, 255, 0, 0, 0, 255]);
        assert_eq!(frame.len(), frame_len(3));
    }

    #[test]
    fn header_written_in_place() {
        let mut buf = vec![0u8; frame_len(2)];
        write_header(&mut buf, 7);
        assert_eq!(&buf[..2], &[MODE_DRGB, 7]);
    }
}
