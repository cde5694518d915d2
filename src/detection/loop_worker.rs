use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::DetectionConfig;
use crate::detection::camera::LeasedStream;
use crate::detection::classifier::{DetectorOptions, ExpressionClassifier};
use crate::error::{DetectionError, DetectionResult};
use crate::mood::{map, ExpressionVector, Mood, MoodReading, MoodSample, MoodStabilizer};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

/// What one detection session reports back to its owner.
#[derive(Debug, Clone)]
pub enum DetectionEvent {
    Status(String),
    Frame {
        face_detected: bool,
        expressions: ExpressionVector,
        reading: Option<MoodReading>,
    },
    Committed {
        mood: Mood,
        confidence: f32,
    },
    TickFailed(DetectionError),
}

/// Everything the loop owns for the lifetime of one activation.
pub struct DetectionSession {
    pub session_id: String,
    pub stream: LeasedStream,
    pub classifier: Arc<dyn ExpressionClassifier>,
    pub stabilizer: MoodStabilizer,
    pub config: DetectionConfig,
}

/// Runs one tick per `tick_interval` until cancelled.
///
/// The inference of a tick is awaited before the next tick is taken, and
/// ticks that elapse meanwhile are skipped rather than queued, so at most one
/// inference is in flight. The camera stream is dropped, and the device
/// released, whichever way the loop exits.
pub async fn detection_loop(
    mut session: DetectionSession,
    events: UnboundedSender<DetectionEvent>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(session.config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let options = DetectorOptions::from(&session.config);
    let inference_timeout = session.config.inference_timeout();

    let _ = events.send(DetectionEvent::Status("Ready for detection".into()));
    log_info!("detection loop started for session {}", session.session_id);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let started = Instant::now();

                let fut = perform_detection(&mut session, &options, &events);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => None,
                    result = tokio::time::timeout(inference_timeout, fut) => Some(result),
                };

                match outcome {
                    None => break,
                    Some(Ok(Ok(()))) => {
                        log_debug!("tick completed in {}ms", started.elapsed().as_millis());
                    }
                    Some(Ok(Err(err))) => {
                        if matches!(err, DetectionError::BridgeClosed) {
                            log_error!("classifier unreachable for session {}", session.session_id);
                        } else {
                            log_warn!("detection tick failed for session {}: {err}", session.session_id);
                        }
                        let _ = events.send(DetectionEvent::TickFailed(err));
                    }
                    Some(Err(_)) => {
                        log_warn!(
                            "detection tick timed out (> {}ms) for session {}",
                            inference_timeout.as_millis(),
                            session.session_id
                        );
                        let _ = events.send(DetectionEvent::TickFailed(DetectionError::Inference(
                            "classifier did not answer in time".into(),
                        )));
                    }
                }
            }
        }
    }

    log_info!("detection loop shutting down for session {}", session.session_id);
}

async fn perform_detection(
    session: &mut DetectionSession,
    options: &DetectorOptions,
    events: &UnboundedSender<DetectionEvent>,
) -> DetectionResult<()> {
    let Some(frame) = session.stream.current_frame() else {
        let _ = events.send(DetectionEvent::Status("Waiting for camera...".into()));
        return Ok(());
    };

    let Some(face) = session.classifier.detect(&frame, options).await? else {
        let _ = events.send(DetectionEvent::Frame {
            face_detected: false,
            expressions: ExpressionVector::default(),
            reading: None,
        });
        let _ = events.send(DetectionEvent::Status(
            "No face detected - please face the camera".into(),
        ));
        return Ok(());
    };

    let expressions = match ExpressionVector::from_map(&face.expressions) {
        Ok(vector) => vector,
        Err(err) => {
            log_warn!("discarding malformed expression vector: {err}");
            let _ = events.send(DetectionEvent::Frame {
                face_detected: true,
                expressions: ExpressionVector::default(),
                reading: None,
            });
            return Ok(());
        }
    };

    let reading = match map(&expressions) {
        Ok(reading) => reading,
        Err(err) => {
            log_debug!("face without expressions on frame {}: {err}", frame.sequence);
            let _ = events.send(DetectionEvent::Frame {
                face_detected: true,
                expressions,
                reading: None,
            });
            return Ok(());
        }
    };

    let min_confidence = session.stabilizer.config().min_confidence;
    let status = if reading.confidence > min_confidence {
        format!(
            "Detected: {} ({}%)",
            reading.mood,
            (reading.confidence * 100.0).round() as u32
        )
    } else {
        "Analyzing facial expressions...".to_string()
    };

    let _ = events.send(DetectionEvent::Frame {
        face_detected: true,
        expressions,
        reading: Some(reading.clone()),
    });
    let _ = events.send(DetectionEvent::Status(status));

    let sample = MoodSample::from_reading(&reading, frame.captured_at);
    if let Some(mood) = session.stabilizer.update(sample) {
        log_info!(
            "session {} committed {} at {:.2}",
            session.session_id,
            mood,
            reading.confidence
        );
        let _ = events.send(DetectionEvent::Committed {
            mood,
            confidence: reading.confidence,
        });
    }

    Ok(())
}
