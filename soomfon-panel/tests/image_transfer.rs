//! Chunked image transfer against a write-recording spy

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use soomfon_panel::codec::{gradient, solid_color};
use soomfon_panel::{CommandEncoder, EncoderConfig, ImageOptions, PanelError};
use soomfon_transport::protocol::{cmd, layout, IMAGE_CHUNK_SIZE, REPORT_SIZE};
use soomfon_transport::{ReportWriter, TransportError};

/// Records every report; optionally fails once `fail_after` writes succeeded
#[derive(Default)]
struct SpyWriter {
    reports: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    fail_after: Option<usize>,
}

impl SpyWriter {
    fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    fn write_count(&self) -> usize {
        self.reports.lock().len()
    }
}

impl ReportWriter for SpyWriter {
    fn write_report(&self, report: &[u8]) -> Result<(), TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|n| attempt >= n) {
            return Err(TransportError::WriteFailed("pipe stalled".into()));
        }
        self.reports.lock().push(report.to_vec());
        Ok(())
    }
}

fn fast_encoder(spy: &Arc<SpyWriter>) -> CommandEncoder {
    CommandEncoder::new(
        spy.clone(),
        EncoderConfig {
            chunk_delay: Duration::ZERO,
        },
    )
}

struct DataReport {
    sequence: u16,
    is_last: bool,
    chunk: Vec<u8>,
}

fn parse_data(report: &[u8]) -> DataReport {
    assert_eq!(report[1], cmd::IMAGE_DATA);
    DataReport {
        sequence: u16::from_le_bytes([report[2], report[3]]),
        is_last: report[4] == 1,
        chunk: report[5..].to_vec(),
    }
}

#[test]
fn test_wrong_length_performs_no_writes() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);

    for len in [0, 1, layout::LCD_IMAGE_SIZE - 1, layout::LCD_IMAGE_SIZE + 2] {
        let result = encoder.set_button_image(0, &vec![0u8; len]);
        assert!(matches!(result, Err(PanelError::InvalidArgument(_))), "len {len}");
    }
    assert_eq!(spy.write_count(), 0);
}

#[test]
fn test_out_of_range_button_performs_no_writes() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);
    let payload = solid_color(Rgb([0, 0, 255]), 72, 72);

    assert!(encoder.set_button_image(layout::LCD_COUNT, &payload).is_err());
    assert_eq!(spy.write_count(), 0);
}

#[test]
fn test_transfer_sequence() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);
    let payload = gradient(72, 72);

    encoder.set_button_image(3, &payload).unwrap();

    let reports = spy.reports.lock();
    let expected_chunks = payload.len().div_ceil(REPORT_SIZE - 5);
    assert_eq!(expected_chunks, 176);
    assert_eq!(reports.len(), 1 + expected_chunks);
    assert!(reports.iter().all(|r| r.len() == REPORT_SIZE));

    // Header: button, size u32 LE, width/height u16 LE
    let header = &reports[0];
    assert_eq!(&header[..3], &[0x00, cmd::IMAGE_HEADER, 3]);
    assert_eq!(&header[3..7], &(payload.len() as u32).to_le_bytes());
    assert_eq!(&header[7..9], &72u16.to_le_bytes());
    assert_eq!(&header[9..11], &72u16.to_le_bytes());

    let data: Vec<DataReport> = reports[1..].iter().map(|r| parse_data(r)).collect();
    for (i, d) in data.iter().enumerate() {
        assert_eq!(d.sequence as usize, i);
    }

    let last_flags: Vec<usize> = data
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_last)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(last_flags, vec![expected_chunks - 1]);
}

#[test]
fn test_chunks_reassemble_to_payload() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);
    let payload = gradient(72, 72);

    encoder.set_button_image(0, &payload).unwrap();

    let reports = spy.reports.lock();
    let mut reassembled = Vec::new();
    let mut remaining = payload.len();
    for report in &reports[1..] {
        let d = parse_data(report);
        let take = remaining.min(IMAGE_CHUNK_SIZE);
        reassembled.extend_from_slice(&d.chunk[..take]);
        // Unused tail of the final chunk is zero
        assert!(d.chunk[take..].iter().all(|&b| b == 0));
        remaining -= take;
    }
    assert_eq!(reassembled, payload);
}

#[test]
fn test_chunk_delay_is_applied() {
    let spy = Arc::new(SpyWriter::default());
    let delay = Duration::from_millis(1);
    let encoder = CommandEncoder::new(spy.clone(), EncoderConfig { chunk_delay: delay });
    let payload = solid_color(Rgb([255, 255, 255]), 72, 72);

    let start = Instant::now();
    encoder.set_button_image(1, &payload).unwrap();

    // No pause after the final chunk: 175 gaps for 176 chunks
    assert!(start.elapsed() >= delay * 175);
    assert_eq!(spy.write_count(), 177);
}

#[test]
fn test_write_failure_mid_transfer_propagates() {
    let spy = Arc::new(SpyWriter::failing_after(10));
    let encoder = fast_encoder(&spy);
    let payload = gradient(72, 72);

    let err = encoder.set_button_image(2, &payload).unwrap_err();
    assert!(matches!(
        err,
        PanelError::Transport(TransportError::WriteFailed(_))
    ));
    // Stops at the first failure
    assert_eq!(spy.attempts.load(Ordering::SeqCst), 11);
    assert_eq!(spy.write_count(), 10);
}

#[test]
fn test_upload_processes_transfers_and_refreshes() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([255, 0, 0])))
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

    encoder
        .upload_button_image(5, &png, &ImageOptions::default())
        .unwrap();

    let reports = spy.reports.lock();
    assert_eq!(reports.len(), 1 + 176 + 1);
    assert_eq!(reports[0][1], cmd::IMAGE_HEADER);
    assert_eq!(reports[0][2], 5);
    assert_eq!(reports[reports.len() - 1][1], cmd::REFRESH_SYNC);
    assert!(parse_data(&reports[176]).is_last);
}

#[test]
fn test_upload_rejects_undecodable_source() {
    let spy = Arc::new(SpyWriter::default());
    let encoder = fast_encoder(&spy);

    let err = encoder
        .upload_button_image(0, b"GIF89a-not-really", &ImageOptions::default())
        .unwrap_err();
    assert!(matches!(err, PanelError::DecodeError(_)));
    assert_eq!(spy.write_count(), 0);
}
