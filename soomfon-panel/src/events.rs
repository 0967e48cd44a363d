//! Typed input events produced by the report decoder

use serde::{Deserialize, Serialize};
use soomfon_transport::protocol::layout;

/// Physical button class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonType {
    /// Button with its own 72x72 display
    Lcd,
    /// Plain button without a display
    Normal,
}

impl ButtonType {
    /// Classify a 0-based button index
    ///
    /// LCD buttons occupy `0..LCD_COUNT`; every index past them is Normal.
    pub fn for_index(index: u8) -> Self {
        if index < layout::LCD_COUNT {
            ButtonType::Lcd
        } else {
            ButtonType::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonEventKind {
    Press,
    Release,
    LongPress,
}

/// Button press, release or long press
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    pub kind: ButtonEventKind,
    /// 0-based index across LCD and Normal buttons
    pub button_index: u8,
    pub button_type: ButtonType,
    /// Seconds since the decoder was created
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncoderEventKind {
    RotateCw,
    RotateCcw,
    Press,
    Release,
}

/// Encoder rotation or push-button event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderEvent {
    pub kind: EncoderEventKind,
    /// 0-based encoder index
    pub encoder_index: u8,
    /// Rotation magnitude in ticks; `None` for press/release
    pub delta: Option<u32>,
    /// Seconds since the decoder was created
    pub timestamp: f64,
}

/// Anything the decoder emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum PanelEvent {
    Button(ButtonEvent),
    Encoder(EncoderEvent),
}

impl PanelEvent {
    /// The button event, if this is one
    pub fn as_button(&self) -> Option<&ButtonEvent> {
        match self {
            PanelEvent::Button(e) => Some(e),
            PanelEvent::Encoder(_) => None,
        }
    }

    /// The encoder event, if this is one
    pub fn as_encoder(&self) -> Option<&EncoderEvent> {
        match self {
            PanelEvent::Encoder(e) => Some(e),
            PanelEvent::Button(_) => None,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            PanelEvent::Button(e) => e.timestamp,
            PanelEvent::Encoder(e) => e.timestamp,
        }
    }
}

impl std::fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelEvent::Button(e) => {
                let kind = match e.kind {
                    ButtonEventKind::Press => "press",
                    ButtonEventKind::Release => "release",
                    ButtonEventKind::LongPress => "long-press",
                };
                let class = match e.button_type {
                    ButtonType::Lcd => "LCD",
                    ButtonType::Normal => "normal",
                };
                write!(
                    f,
                    "[{:>9.3}] {} button {} {}",
                    e.timestamp, class, e.button_index, kind
                )
            }
            PanelEvent::Encoder(e) => {
                let kind = match e.kind {
                    EncoderEventKind::RotateCw => "cw",
                    EncoderEventKind::RotateCcw => "ccw",
                    EncoderEventKind::Press => "press",
                    EncoderEventKind::Release => "release",
                };
                write!(f, "[{:>9.3}] encoder {} {}", e.timestamp, e.encoder_index, kind)?;
                if let Some(delta) = e.delta {
                    write!(f, " x{}", delta)?;
                }
                Ok(())
            }
        }
    }
}
