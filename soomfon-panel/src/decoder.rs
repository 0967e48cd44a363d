//! Stateful report decoder: debounce and long-press detection
//!
//! Raw reports are parsed by `soomfon_transport::event_parser` and the
//! resulting transitions are filtered here:
//!
//! - Button transitions within `debounce` of the last accepted transition of
//!   the same button are dropped. Encoder press/release uses half that window.
//!   Rotation ticks are not debounced.
//! - A transition to the state a button is already in is a no-op.
//! - Every accepted press arms a long-press deadline. If the button is still
//!   held when it expires, exactly one `LongPress` is emitted.
//!
//! Emission is serialized by a reentrant lock held across the state update and
//! the listener calls, so a `LongPress` can never be delivered after the
//! `Release` that cancelled it. Listeners may call back into the decoder.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex};
use soomfon_transport::event_parser::{parse_frame, Frame, RawInput};
use soomfon_transport::protocol::timing;
use soomfon_transport::{ListenerHub, ListenerId};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::PanelError;
use crate::events::{
    ButtonEvent, ButtonEventKind, ButtonType, EncoderEvent, EncoderEventKind, PanelEvent,
};
use crate::timer::LongPressTimer;

/// Number of buttons addressed by a generic frame bitmask
const GENERIC_MASK_BUTTONS: u8 = 8;

/// Decoder timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub debounce: Duration,
    pub long_press: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(timing::DEBOUNCE_MS),
            long_press: Duration::from_millis(timing::LONG_PRESS_THRESHOLD_MS),
        }
    }
}

#[derive(Debug, Default)]
struct ButtonSlot {
    pressed: bool,
    last_accepted: Option<Instant>,
    /// Generation of the press that armed the pending deadline
    generation: u64,
    long_fired: bool,
}

#[derive(Debug, Default)]
struct EncoderSlot {
    pressed: bool,
    last_accepted: Option<Instant>,
}

struct DecoderState {
    config: DecoderConfig,
    buttons: HashMap<u8, ButtonSlot>,
    encoders: HashMap<u8, EncoderSlot>,
    /// Never reset, so deadlines armed before `reset()` stay stale
    next_generation: u64,
}

struct DecoderInner {
    epoch: Instant,
    emit_lock: ReentrantMutex<()>,
    state: Mutex<DecoderState>,
    events: ListenerHub<PanelEvent>,
    timer: LongPressTimer,
}

/// Turns raw input reports into [`PanelEvent`]s
pub struct ReportDecoder {
    inner: Arc<DecoderInner>,
}

impl ReportDecoder {
    /// Create a decoder and start its long-press timer thread
    pub fn new(config: DecoderConfig) -> Result<Self, PanelError> {
        let handle: Arc<OnceLock<Weak<DecoderInner>>> = Arc::new(OnceLock::new());

        let for_timer = Arc::clone(&handle);
        let timer = LongPressTimer::spawn(move |button, generation| {
            if let Some(inner) = for_timer.get().and_then(Weak::upgrade) {
                inner.fire_long_press(button, generation);
            }
        })?;

        let inner = Arc::new(DecoderInner {
            epoch: Instant::now(),
            emit_lock: ReentrantMutex::new(()),
            state: Mutex::new(DecoderState {
                config,
                buttons: HashMap::new(),
                encoders: HashMap::new(),
                next_generation: 0,
            }),
            events: ListenerHub::new("decoder"),
            timer,
        });
        let _ = handle.set(Arc::downgrade(&inner));

        Ok(Self { inner })
    }

    /// Decode one raw report received now
    pub fn process_report(&self, data: &[u8]) {
        self.process_report_at(data, Instant::now());
    }

    /// Decode one raw report received at `now`
    pub fn process_report_at(&self, data: &[u8], now: Instant) {
        self.inner.process(data, now);
    }

    /// Cancel pending long-press deadlines and forget all press state
    ///
    /// Emits nothing.
    pub fn reset(&self) {
        let _emit = self.inner.emit_lock.lock();
        let mut state = self.inner.state.lock();
        state.buttons.clear();
        state.encoders.clear();
        self.inner.timer.cancel_all();
        debug!("Decoder state reset");
    }

    /// Debounce window for subsequently processed reports
    pub fn set_debounce_interval(&self, interval: Duration) {
        self.inner.state.lock().config.debounce = interval;
    }

    /// Long-press threshold for subsequently accepted presses
    pub fn set_long_press_threshold(&self, threshold: Duration) {
        self.inner.state.lock().config.long_press = threshold;
    }

    pub fn config(&self) -> DecoderConfig {
        self.inner.state.lock().config
    }

    /// Whether a button is currently held (as far as the decoder knows)
    pub fn is_pressed(&self, button: u8) -> bool {
        self.inner
            .state
            .lock()
            .buttons
            .get(&button)
            .is_some_and(|slot| slot.pressed)
    }

    /// Register a callback for decoded events
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&PanelEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    /// Subscribe to decoded events via broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.inner.events.subscribe()
    }
}

impl DecoderInner {
    fn timestamp(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.epoch).as_secs_f64()
    }

    fn process(&self, data: &[u8], now: Instant) {
        let _emit = self.emit_lock.lock();

        let events = {
            let mut state = self.state.lock();
            let mut out = Vec::new();

            match parse_frame(data) {
                Frame::Empty => {}
                Frame::Vendor(None) => {
                    debug!("Ignoring vendor frame: {:02X?}", &data[..data.len().min(16)]);
                }
                Frame::Vendor(Some(input)) => {
                    out.extend(self.apply(&mut state, input, now));
                }
                Frame::Generic {
                    button_mask,
                    encoder_deltas,
                } => {
                    for bit in 0..GENERIC_MASK_BUTTONS {
                        let pressed = button_mask & (1 << bit) != 0;
                        out.extend(self.button_transition(&mut state, bit, pressed, now));
                    }
                    for (index, delta) in encoder_deltas.iter().enumerate() {
                        if let Some(e) = self.rotation(index as u8, *delta, now) {
                            out.push(e);
                        }
                    }
                }
            }
            out
        };

        for event in &events {
            debug!("Decoded {:?}", event);
            self.events.emit(event);
        }
    }

    fn apply(&self, state: &mut DecoderState, input: RawInput, now: Instant) -> Option<PanelEvent> {
        match input {
            RawInput::Button { index, pressed } => {
                self.button_transition(state, index, pressed, now)
            }
            RawInput::EncoderButton { index, pressed } => {
                self.encoder_transition(state, index, pressed, now)
            }
            RawInput::EncoderTurn { index, clockwise } => {
                self.rotation(index, if clockwise { 1 } else { -1 }, now)
            }
        }
    }

    fn button_transition(
        &self,
        state: &mut DecoderState,
        index: u8,
        pressed: bool,
        now: Instant,
    ) -> Option<PanelEvent> {
        let config = state.config;
        let generation = state.next_generation + 1;
        let slot = state.buttons.entry(index).or_default();

        if slot.pressed == pressed {
            return None;
        }
        if let Some(last) = slot.last_accepted {
            if now.saturating_duration_since(last) < config.debounce {
                debug!("Debounced button {} ({})", index, pressed);
                return None;
            }
        }

        slot.pressed = pressed;
        slot.last_accepted = Some(now);
        let kind = if pressed {
            slot.generation = generation;
            slot.long_fired = false;
            state.next_generation = generation;
            self.timer.arm(now + config.long_press, index, generation);
            ButtonEventKind::Press
        } else {
            self.timer.cancel(index);
            ButtonEventKind::Release
        };

        Some(PanelEvent::Button(ButtonEvent {
            kind,
            button_index: index,
            button_type: ButtonType::for_index(index),
            timestamp: self.timestamp(now),
        }))
    }

    fn encoder_transition(
        &self,
        state: &mut DecoderState,
        index: u8,
        pressed: bool,
        now: Instant,
    ) -> Option<PanelEvent> {
        let window = state.config.debounce / 2;
        let slot = state.encoders.entry(index).or_default();

        if slot.pressed == pressed {
            return None;
        }
        if let Some(last) = slot.last_accepted {
            if now.saturating_duration_since(last) < window {
                debug!("Debounced encoder {} ({})", index, pressed);
                return None;
            }
        }

        slot.pressed = pressed;
        slot.last_accepted = Some(now);

        Some(PanelEvent::Encoder(EncoderEvent {
            kind: if pressed {
                EncoderEventKind::Press
            } else {
                EncoderEventKind::Release
            },
            encoder_index: index,
            delta: None,
            timestamp: self.timestamp(now),
        }))
    }

    fn rotation(&self, index: u8, delta: i8, now: Instant) -> Option<PanelEvent> {
        let kind = match delta {
            0 => return None,
            d if d > 0 => EncoderEventKind::RotateCw,
            _ => EncoderEventKind::RotateCcw,
        };

        Some(PanelEvent::Encoder(EncoderEvent {
            kind,
            encoder_index: index,
            delta: Some(u32::from(delta.unsigned_abs())),
            timestamp: self.timestamp(now),
        }))
    }

    fn fire_long_press(&self, button: u8, generation: u64) {
        let _emit = self.emit_lock.lock();

        {
            let mut state = self.state.lock();
            let Some(slot) = state.buttons.get_mut(&button) else {
                return;
            };
            if !slot.pressed || slot.generation != generation || slot.long_fired {
                return;
            }
            slot.long_fired = true;
        }

        let event = PanelEvent::Button(ButtonEvent {
            kind: ButtonEventKind::LongPress,
            button_index: button,
            button_type: ButtonType::for_index(button),
            timestamp: self.timestamp(Instant::now()),
        });
        debug!("Decoded {:?}", event);
        self.events.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soomfon_transport::protocol::build_vendor_frame;

    fn recording(decoder: &ReportDecoder) -> Arc<Mutex<Vec<PanelEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        decoder.add_listener(move |e| sink.lock().push(e.clone()));
        events
    }

    fn slow_long_press() -> DecoderConfig {
        // Long enough that no LongPress interferes with the assertions
        DecoderConfig {
            long_press: Duration::from_secs(60),
            ..DecoderConfig::default()
        }
    }

    fn button_kinds(events: &[PanelEvent]) -> Vec<(ButtonEventKind, u8)> {
        events
            .iter()
            .filter_map(PanelEvent::as_button)
            .map(|e| (e.kind, e.button_index))
            .collect()
    }

    #[test]
    fn test_duplicate_press_within_window_emits_once() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        let press = build_vendor_frame(0x01, 0x01);
        decoder.process_report_at(&press, t0);
        decoder.process_report_at(&press, t0 + Duration::from_millis(10));

        assert_eq!(button_kinds(&events.lock()), vec![(ButtonEventKind::Press, 0)]);
    }

    #[test]
    fn test_duplicate_press_after_window_is_noop() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        let press = build_vendor_frame(0x02, 0x01);
        decoder.process_report_at(&press, t0);
        decoder.process_report_at(&press, t0 + Duration::from_millis(200));

        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_release_within_window_is_dropped() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&build_vendor_frame(0x01, 0x01), t0);
        decoder.process_report_at(&build_vendor_frame(0x01, 0x00), t0 + Duration::from_millis(20));
        assert!(decoder.is_pressed(0));

        decoder.process_report_at(&build_vendor_frame(0x01, 0x00), t0 + Duration::from_millis(80));
        assert!(!decoder.is_pressed(0));
        assert_eq!(
            button_kinds(&events.lock()),
            vec![(ButtonEventKind::Press, 0), (ButtonEventKind::Release, 0)]
        );
    }

    #[test]
    fn test_debounce_is_per_button() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&build_vendor_frame(0x01, 0x01), t0);
        decoder.process_report_at(&build_vendor_frame(0x07, 0x01), t0 + Duration::from_millis(5));

        let events = events.lock();
        let buttons: Vec<_> = events.iter().filter_map(PanelEvent::as_button).collect();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[1].button_index, 6);
        assert_eq!(buttons[1].button_type, ButtonType::Normal);
    }

    #[test]
    fn test_long_press_fires_once() {
        let decoder = ReportDecoder::new(DecoderConfig {
            debounce: Duration::from_millis(50),
            long_press: Duration::from_millis(40),
        })
        .unwrap();
        let events = recording(&decoder);

        decoder.process_report(&build_vendor_frame(0x03, 0x01));
        std::thread::sleep(Duration::from_millis(200));
        decoder.process_report(&build_vendor_frame(0x03, 0x00));

        assert_eq!(
            button_kinds(&events.lock()),
            vec![
                (ButtonEventKind::Press, 2),
                (ButtonEventKind::LongPress, 2),
                (ButtonEventKind::Release, 2),
            ]
        );
    }

    #[test]
    fn test_short_press_has_no_long_press() {
        let decoder = ReportDecoder::new(DecoderConfig {
            debounce: Duration::from_millis(10),
            long_press: Duration::from_millis(150),
        })
        .unwrap();
        let events = recording(&decoder);

        decoder.process_report(&build_vendor_frame(0x01, 0x01));
        std::thread::sleep(Duration::from_millis(30));
        decoder.process_report(&build_vendor_frame(0x01, 0x00));
        std::thread::sleep(Duration::from_millis(250));

        assert_eq!(
            button_kinds(&events.lock()),
            vec![(ButtonEventKind::Press, 0), (ButtonEventKind::Release, 0)]
        );
    }

    #[test]
    fn test_reset_cancels_pending_long_press() {
        let decoder = ReportDecoder::new(DecoderConfig {
            debounce: Duration::from_millis(10),
            long_press: Duration::from_millis(60),
        })
        .unwrap();
        let events = recording(&decoder);

        decoder.process_report(&build_vendor_frame(0x01, 0x01));
        decoder.reset();
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(events.lock().len(), 1);
        assert!(!decoder.is_pressed(0));

        // Fresh press after reset is accepted immediately
        decoder.process_report(&build_vendor_frame(0x01, 0x01));
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_rotation_ticks() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&build_vendor_frame(13, 1), t0);
        decoder.process_report_at(&build_vendor_frame(13, 1), t0);
        decoder.process_report_at(&build_vendor_frame(17, 1), t0);
        decoder.process_report_at(&build_vendor_frame(17, 0), t0);

        let events = events.lock();
        let kinds: Vec<_> = events
            .iter()
            .filter_map(PanelEvent::as_encoder)
            .map(|e| (e.kind, e.encoder_index, e.delta))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EncoderEventKind::RotateCw, 0, Some(1)),
                (EncoderEventKind::RotateCw, 0, Some(1)),
                (EncoderEventKind::RotateCcw, 1, Some(1)),
            ]
        );
    }

    #[test]
    fn test_encoder_press_uses_half_window() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&build_vendor_frame(10, 1), t0);
        // 30ms: inside the button window but past the 25ms encoder window
        decoder.process_report_at(&build_vendor_frame(10, 0), t0 + Duration::from_millis(30));

        let events = events.lock();
        let kinds: Vec<_> = events
            .iter()
            .filter_map(PanelEvent::as_encoder)
            .map(|e| (e.kind, e.delta))
            .collect();
        assert_eq!(
            kinds,
            vec![(EncoderEventKind::Press, None), (EncoderEventKind::Release, None)]
        );
    }

    #[test]
    fn test_unknown_codes_emit_nothing() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);

        decoder.process_report(&build_vendor_frame(19, 1));
        decoder.process_report(&build_vendor_frame(0, 1));
        decoder.process_report(&build_vendor_frame(1, 9));
        decoder.process_report(&[]);

        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_generic_frame_mask_and_deltas() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&[0b0100_0001, 0x03, 0x00, 0xFE], t0);
        decoder.process_report_at(&[0b0100_0000], t0 + Duration::from_millis(100));

        let events = events.lock();
        assert_eq!(
            button_kinds(&events),
            vec![
                (ButtonEventKind::Press, 0),
                (ButtonEventKind::Press, 6),
                (ButtonEventKind::Release, 0),
            ]
        );
        let rotations: Vec<_> = events
            .iter()
            .filter_map(PanelEvent::as_encoder)
            .map(|e| (e.kind, e.encoder_index, e.delta))
            .collect();
        assert_eq!(
            rotations,
            vec![
                (EncoderEventKind::RotateCw, 0, Some(3)),
                (EncoderEventKind::RotateCcw, 2, Some(2)),
            ]
        );
    }

    #[test]
    fn test_panicking_listener_does_not_block_decoding() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        decoder.add_listener(|_| panic!("listener bug"));
        let events = recording(&decoder);
        let t0 = Instant::now();

        decoder.process_report_at(&build_vendor_frame(0x01, 0x01), t0);
        decoder.process_report_at(&build_vendor_frame(0x02, 0x01), t0);
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_listener_may_reset_decoder() {
        let decoder = Arc::new(ReportDecoder::new(slow_long_press()).unwrap());
        let weak = Arc::downgrade(&decoder);
        decoder.add_listener(move |_| {
            if let Some(d) = weak.upgrade() {
                d.reset();
            }
        });

        decoder.process_report(&build_vendor_frame(0x01, 0x01));
        assert!(!decoder.is_pressed(0));
    }

    #[test]
    fn test_threshold_change_applies_to_later_presses() {
        let decoder = ReportDecoder::new(slow_long_press()).unwrap();
        decoder.set_long_press_threshold(Duration::from_millis(30));
        decoder.set_debounce_interval(Duration::from_millis(5));
        let events = recording(&decoder);

        decoder.process_report(&build_vendor_frame(0x05, 0x01));
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(
            button_kinds(&events.lock()),
            vec![(ButtonEventKind::Press, 4), (ButtonEventKind::LongPress, 4)]
        );
        assert_eq!(decoder.config().debounce, Duration::from_millis(5));
    }
}
