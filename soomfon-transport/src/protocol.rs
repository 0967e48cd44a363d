//! Protocol constants and report framing for SOOMFON panels
//!
//! Every outbound report is exactly [`REPORT_SIZE`] bytes:
//!
//! ```text
//! [report_id=0x00] [cmd] [payload...] [zero padding]
//! ```
//!
//! Inbound vendor frames start with the 9-byte [`MAGIC_HEADER`] followed by an
//! input code and a state byte. Anything else is treated as a generic frame
//! (see `event_parser`).

/// Outbound/inbound report size in bytes
pub const REPORT_SIZE: usize = 64;

/// Report ID placed at byte 0 of every outbound report
pub const REPORT_ID: u8 = 0x00;

/// Bytes of a data report that are not pixel data:
/// report id, cmd, sequence (2), is-last flag
pub const IMAGE_DATA_OVERHEAD: usize = 5;

/// Pixel bytes carried by one image data report
pub const IMAGE_CHUNK_SIZE: usize = REPORT_SIZE - IMAGE_DATA_OVERHEAD;

/// Magic header of a self-describing vendor input frame: `"ACK" 00 00 "OK" 00 00`
pub const MAGIC_HEADER: [u8; 9] = [b'A', b'C', b'K', 0x00, 0x00, b'O', b'K', 0x00, 0x00];

/// Minimum length of a vendor input frame (header + code + state)
pub const VENDOR_FRAME_MIN_LEN: usize = MAGIC_HEADER.len() + 2;

/// Host → device command codes (byte 1 of every outbound report)
pub mod cmd {
    /// Wake the displays from sleep
    pub const WAKE_DISPLAY: u8 = 0x01;
    /// Clear one LCD button or all of them
    pub const CLEAR_SCREEN: u8 = 0x02;
    /// Set display brightness, payload = percent 0-100
    pub const SET_BRIGHTNESS: u8 = 0x03;
    /// Commit pending framebuffer changes
    pub const REFRESH_SYNC: u8 = 0x04;
    /// Start of an image transfer
    pub const IMAGE_HEADER: u8 = 0x05;
    /// One chunk of image data
    pub const IMAGE_DATA: u8 = 0x06;
    /// Keep the device in host-controlled mode
    pub const KEEP_ALIVE: u8 = 0x07;
    /// Release the device (last report of the shutdown sequence)
    pub const HALT: u8 = 0x08;

    /// Clear-screen target meaning "every LCD button"
    pub const CLEAR_ALL: u8 = 0xFF;

    /// Get human-readable name for command byte
    pub fn name(cmd: u8) -> &'static str {
        match cmd {
            WAKE_DISPLAY => "WAKE_DISPLAY",
            CLEAR_SCREEN => "CLEAR_SCREEN",
            SET_BRIGHTNESS => "SET_BRIGHTNESS",
            REFRESH_SYNC => "REFRESH_SYNC",
            IMAGE_HEADER => "IMAGE_HEADER",
            IMAGE_DATA => "IMAGE_DATA",
            KEEP_ALIVE => "KEEP_ALIVE",
            HALT => "HALT",
            _ => "UNKNOWN",
        }
    }
}

/// Physical layout of the panel
pub mod layout {
    /// Buttons with their own display (indices `0..LCD_COUNT`)
    pub const LCD_COUNT: u8 = 6;
    /// Buttons without a display (indices `LCD_COUNT..LCD_COUNT + NORMAL_COUNT`)
    pub const NORMAL_COUNT: u8 = 3;
    /// Rotary encoders
    pub const ENCODER_COUNT: u8 = 3;

    /// LCD button width in pixels
    pub const LCD_WIDTH: u16 = 72;
    /// LCD button height in pixels
    pub const LCD_HEIGHT: u16 = 72;
    /// Bytes of one packed RGB565 button image
    pub const LCD_IMAGE_SIZE: usize = LCD_WIDTH as usize * LCD_HEIGHT as usize * 2;
}

/// Input code table of vendor frames (byte 9)
///
/// Each sub-range is contiguous; encoder codes are offset by the 0-based
/// encoder index.
pub mod codes {
    use super::layout::{ENCODER_COUNT, LCD_COUNT, NORMAL_COUNT};

    /// First LCD button code (1-indexed on the wire)
    pub const LCD_FIRST: u8 = 1;
    /// First Normal button code
    pub const NORMAL_FIRST: u8 = LCD_FIRST + LCD_COUNT;
    /// First encoder press code
    pub const ENCODER_PRESS_FIRST: u8 = NORMAL_FIRST + NORMAL_COUNT;
    /// First encoder clockwise code
    pub const ENCODER_CW_FIRST: u8 = ENCODER_PRESS_FIRST + ENCODER_COUNT;
    /// First encoder counter-clockwise code
    pub const ENCODER_CCW_FIRST: u8 = ENCODER_CW_FIRST + ENCODER_COUNT;
    /// One past the last defined code
    pub const END: u8 = ENCODER_CCW_FIRST + ENCODER_COUNT;
}

/// Timing constants
pub mod timing {
    /// Read timeout of the report loop; bounds how often the shutdown flag
    /// is checked while idle
    pub const READ_TIMEOUT_MS: i32 = 5;
    /// Interval between background reconnect attempts
    pub const RECONNECT_INTERVAL_MS: u64 = 2000;
    /// Delay between non-final image data reports
    pub const IMAGE_CHUNK_DELAY_MS: u64 = 5;
    /// Interval between keep-alive reports
    pub const KEEP_ALIVE_INTERVAL_SECS: u64 = 10;
    /// Default debounce window for buttons (encoders use half)
    pub const DEBOUNCE_MS: u64 = 50;
    /// Default long-press threshold
    pub const LONG_PRESS_THRESHOLD_MS: u64 = 500;
}

/// Device identification constants
pub mod device {
    /// SOOMFON vendor ID
    pub const VENDOR_ID: u16 = 0x1500;
    /// SOOMFON stream controller product ID
    pub const PRODUCT_ID: u16 = 0x3001;
    /// Vendor usage page of the command-and-event interface
    pub const USAGE_PAGE: u16 = 0xFFA0;
}

/// A single outbound report
pub type Report = [u8; REPORT_SIZE];

/// Build an outbound report
///
/// Format: `[report_id=0] [cmd] [payload...]`, zero-padded. Payload bytes
/// beyond `REPORT_SIZE - 2` are truncated.
pub fn build_report(cmd: u8, payload: &[u8]) -> Report {
    let mut buf = [0u8; REPORT_SIZE];
    buf[0] = REPORT_ID;
    buf[1] = cmd;
    let len = std::cmp::min(payload.len(), REPORT_SIZE - 2);
    buf[2..2 + len].copy_from_slice(&payload[..len]);
    buf
}

/// Build the header report of an image transfer
///
/// Payload: `[button] [size u32 LE] [width u16 LE] [height u16 LE]`
pub fn build_image_header(button: u8, size: u32, width: u16, height: u16) -> Report {
    let mut payload = [0u8; 9];
    payload[0] = button;
    payload[1..5].copy_from_slice(&size.to_le_bytes());
    payload[5..7].copy_from_slice(&width.to_le_bytes());
    payload[7..9].copy_from_slice(&height.to_le_bytes());
    build_report(cmd::IMAGE_HEADER, &payload)
}

/// Build one data report of an image transfer
///
/// Payload: `[sequence u16 LE] [is_last] [chunk...]`. At most
/// [`IMAGE_CHUNK_SIZE`] bytes of `chunk` are used.
pub fn build_image_data(sequence: u16, chunk: &[u8], is_last: bool) -> Report {
    let mut buf = [0u8; REPORT_SIZE];
    buf[0] = REPORT_ID;
    buf[1] = cmd::IMAGE_DATA;
    buf[2..4].copy_from_slice(&sequence.to_le_bytes());
    buf[4] = u8::from(is_last);
    let len = std::cmp::min(chunk.len(), IMAGE_CHUNK_SIZE);
    buf[IMAGE_DATA_OVERHEAD..IMAGE_DATA_OVERHEAD + len].copy_from_slice(&chunk[..len]);
    buf
}

/// Number of data reports needed for a payload of `len` bytes
pub fn image_chunk_count(len: usize) -> usize {
    len.div_ceil(IMAGE_CHUNK_SIZE)
}

/// Whether a buffer carries the vendor magic header
pub fn is_vendor_frame(data: &[u8]) -> bool {
    data.len() >= VENDOR_FRAME_MIN_LEN && data[..MAGIC_HEADER.len()] == MAGIC_HEADER
}

/// Build a vendor input frame (mainly for tests and replay tooling)
pub fn build_vendor_frame(code: u8, state: u8) -> Report {
    let mut buf = [0u8; REPORT_SIZE];
    buf[..MAGIC_HEADER.len()].copy_from_slice(&MAGIC_HEADER);
    buf[MAGIC_HEADER.len()] = code;
    buf[MAGIC_HEADER.len() + 1] = state;
    buf
}
