//! Stateless parsing of raw input reports
//!
//! The panel sends two kinds of input report:
//!
//! - Vendor frames: `[MAGIC_HEADER(9)] [code] [state] ...` where `code` selects
//!   a button or encoder (see `protocol::codes`) and `state` is 0/1.
//! - Generic frames: byte 0 is a bitmask of buttons 0-7; when the report is at
//!   least 4 bytes long, bytes 1..=ENCODER_COUNT are signed per-encoder deltas.
//!
//! The generic layout was inferred from captures of older firmware and is
//! best-effort only.
//!
//! Debounce and long-press timing are not handled here; this module only
//! turns bytes into [`RawInput`] values.

use crate::protocol::{codes, is_vendor_frame, layout, MAGIC_HEADER};

/// Minimum generic frame length that carries encoder deltas
pub const GENERIC_DELTA_MIN_LEN: usize = 4;

/// Wire state byte for "pressed" / rising edge
pub const STATE_PRESSED: u8 = 0x01;
/// Wire state byte for "released"
pub const STATE_RELEASED: u8 = 0x00;

/// One decoded input from a vendor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// Button state report (index is 0-based across LCD and Normal buttons)
    Button { index: u8, pressed: bool },
    /// Encoder push-button state report
    EncoderButton { index: u8, pressed: bool },
    /// Encoder rotation tick
    EncoderTurn { index: u8, clockwise: bool },
}

/// A parsed input report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Vendor frame; `None` when the code/state pair means nothing
    Vendor(Option<RawInput>),
    /// Generic bitmask frame
    Generic {
        /// One bit per button index 0-7
        button_mask: u8,
        /// Signed per-encoder deltas (empty for short frames)
        encoder_deltas: Vec<i8>,
    },
    /// Empty report
    Empty,
}

/// Parse one raw input report
pub fn parse_frame(data: &[u8]) -> Frame {
    if data.is_empty() {
        return Frame::Empty;
    }

    if is_vendor_frame(data) {
        let code = data[MAGIC_HEADER.len()];
        let state = data[MAGIC_HEADER.len() + 1];
        return Frame::Vendor(parse_vendor_input(code, state));
    }

    let encoder_deltas = if data.len() >= GENERIC_DELTA_MIN_LEN {
        data.iter()
            .skip(1)
            .take(layout::ENCODER_COUNT as usize)
            .map(|&b| b as i8)
            .collect()
    } else {
        Vec::new()
    };

    Frame::Generic {
        button_mask: data[0],
        encoder_deltas,
    }
}

/// Map a vendor code/state pair to an input
///
/// Unknown codes, code 0 (plain acknowledgement), unexpected state values and
/// rotation reports with state 0 all yield `None`.
pub fn parse_vendor_input(code: u8, state: u8) -> Option<RawInput> {
    let pressed = match state {
        STATE_PRESSED => Some(true),
        STATE_RELEASED => Some(false),
        _ => None,
    };

    match code {
        c if (codes::LCD_FIRST..codes::NORMAL_FIRST).contains(&c) => Some(RawInput::Button {
            index: c - codes::LCD_FIRST,
            pressed: pressed?,
        }),
        c if (codes::NORMAL_FIRST..codes::ENCODER_PRESS_FIRST).contains(&c) => {
            Some(RawInput::Button {
                index: layout::LCD_COUNT + (c - codes::NORMAL_FIRST),
                pressed: pressed?,
            })
        }
        c if (codes::ENCODER_PRESS_FIRST..codes::ENCODER_CW_FIRST).contains(&c) => {
            Some(RawInput::EncoderButton {
                index: c - codes::ENCODER_PRESS_FIRST,
                pressed: pressed?,
            })
        }
        c if (codes::ENCODER_CW_FIRST..codes::ENCODER_CCW_FIRST).contains(&c)
            && state == STATE_PRESSED =>
        {
            Some(RawInput::EncoderTurn {
                index: c - codes::ENCODER_CW_FIRST,
                clockwise: true,
            })
        }
        c if (codes::ENCODER_CCW_FIRST..codes::END).contains(&c) && state == STATE_PRESSED => {
            Some(RawInput::EncoderTurn {
                index: c - codes::ENCODER_CCW_FIRST,
                clockwise: false,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_vendor_frame;

    #[test]
    fn test_parse_lcd_button() {
        let frame = parse_frame(&build_vendor_frame(0x01, 0x01));
        assert_eq!(
            frame,
            Frame::Vendor(Some(RawInput::Button {
                index: 0,
                pressed: true
            }))
        );

        let frame = parse_frame(&build_vendor_frame(0x06, 0x00));
        assert_eq!(
            frame,
            Frame::Vendor(Some(RawInput::Button {
                index: 5,
                pressed: false
            }))
        );
    }

    #[test]
    fn test_parse_normal_button() {
        // First normal button follows the six LCD buttons
        let frame = parse_frame(&build_vendor_frame(0x07, 0x01));
        assert_eq!(
            frame,
            Frame::Vendor(Some(RawInput::Button {
                index: 6,
                pressed: true
            }))
        );
    }

    #[test]
    fn test_parse_encoder_codes() {
        assert_eq!(
            parse_vendor_input(11, 1),
            Some(RawInput::EncoderButton {
                index: 1,
                pressed: true
            })
        );
        assert_eq!(
            parse_vendor_input(15, 1),
            Some(RawInput::EncoderTurn {
                index: 2,
                clockwise: true
            })
        );
        assert_eq!(
            parse_vendor_input(16, 1),
            Some(RawInput::EncoderTurn {
                index: 0,
                clockwise: false
            })
        );
    }

    #[test]
    fn test_rotation_requires_rising_edge() {
        assert_eq!(parse_vendor_input(13, 0), None);
        assert_eq!(parse_vendor_input(18, 0), None);
    }

    #[test]
    fn test_unknown_codes_ignored() {
        assert_eq!(parse_frame(&build_vendor_frame(0, 1)), Frame::Vendor(None));
        assert_eq!(
            parse_frame(&build_vendor_frame(codes::END, 1)),
            Frame::Vendor(None)
        );
        assert_eq!(parse_frame(&build_vendor_frame(0x51, 0)), Frame::Vendor(None));
        // Unexpected state byte on a button code
        assert_eq!(parse_vendor_input(1, 7), None);
    }

    #[test]
    fn test_truncated_vendor_frame_is_generic() {
        // Magic header without code/state bytes is too short for a vendor frame
        let frame = parse_frame(&MAGIC_HEADER);
        assert!(matches!(frame, Frame::Generic { .. }));
    }

    #[test]
    fn test_parse_generic_frame() {
        let frame = parse_frame(&[0b0000_0101, 0x02, 0xFE, 0x00]);
        assert_eq!(
            frame,
            Frame::Generic {
                button_mask: 0b0000_0101,
                encoder_deltas: vec![2, -2, 0],
            }
        );
    }

    #[test]
    fn test_short_generic_frame_has_no_deltas() {
        let frame = parse_frame(&[0x01, 0x05]);
        assert_eq!(
            frame,
            Frame::Generic {
                button_mask: 0x01,
                encoder_deltas: vec![],
            }
        );
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(parse_frame(&[]), Frame::Empty);
    }
}
