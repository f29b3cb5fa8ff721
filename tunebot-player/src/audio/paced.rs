//! Timer-paced audio sink
//!
//! [`PacedSink`] stands in for a real voice transmitter: it holds the voice
//! session in the speaking state for the nominal duration of each resource,
//! honouring pause/resume, and then reports the resource as finished.
//! No audio is decoded.

use super::resource::{AudioResource, ResourceId};
use super::session::VoiceSession;
use super::sink::{AudioSink, SinkError, SinkEvent, SinkEventSender, SinkStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum Control {
    Pause,
    Resume,
    Stop,
}

struct Playback {
    id: ResourceId,
    status: SinkStatus,
    control: mpsc::UnboundedSender<Control>,
}

#[derive(Default)]
struct Shared {
    session: Option<Arc<dyn VoiceSession>>,
    current: Option<Playback>,
}

/// Sink that paces playback with tokio timers
pub struct PacedSink {
    shared: Arc<Mutex<Shared>>,
    events: SinkEventSender,
}

impl PacedSink {
    pub fn new(events: SinkEventSender) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    fn emit(&self, event: SinkEvent) {
        if self.events.send(event).is_err() {
            debug!("Sink event dropped: engine gone");
        }
    }

    /// Move the current playback between Playing and Paused
    fn toggle(&mut self, from: SinkStatus, to: SinkStatus, control: Control) -> bool {
        let mut shared = self.lock();
        let session = shared.session.clone();
        let Some(playback) = shared.current.as_mut().filter(|p| p.status == from) else {
            return false;
        };
        playback.status = to;
        let id = playback.id;
        let _ = playback.control.send(control);
        drop(shared);

        if let Some(session) = session {
            session.set_speaking(to == SinkStatus::Playing);
        }
        self.emit(SinkEvent::StateChanged {
            resource: Some(id),
            old: from,
            new: to,
        });
        true
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AudioSink for PacedSink {
    fn subscribe(&mut self, session: Arc<dyn VoiceSession>) {
        info!("Sink subscribed to session {}", session.id());
        self.lock().session = Some(session);
    }

    fn unsubscribe(&mut self) {
        if let Some(session) = self.lock().session.take() {
            info!("Sink unsubscribed from session {}", session.id());
        }
    }

    fn is_subscribed(&self) -> bool {
        self.lock().session.is_some()
    }

    fn play(&mut self, resource: AudioResource) -> Result<(), SinkError> {
        if !resource.path().is_file() {
            return Err(SinkError::MissingResource(resource.path().to_path_buf()));
        }

        let id = resource.id();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let mut shared = self.lock();
        let session = shared.session.clone().ok_or(SinkError::NotSubscribed)?;
        let old = match shared.current.take() {
            Some(previous) => {
                debug!("Replacing {} with {}", previous.id, id);
                let _ = previous.control.send(Control::Stop);
                previous.status
            }
            None => SinkStatus::Idle,
        };
        shared.current = Some(Playback {
            id,
            status: SinkStatus::Playing,
            control: control_tx,
        });
        drop(shared);

        session.set_speaking(true);
        self.emit(SinkEvent::StateChanged {
            resource: Some(id),
            old,
            new: SinkStatus::Playing,
        });
        info!(
            "Playing {} ({}) at gain {:.2}",
            resource.track(),
            id,
            resource.gain().get()
        );

        tokio::spawn(pace(
            id,
            resource.duration(),
            control_rx,
            Arc::clone(&self.shared),
            self.events.clone(),
        ));
        Ok(())
    }

    fn stop(&mut self) -> bool {
        let mut shared = self.lock();
        let Some(playback) = shared.current.take() else {
            return false;
        };
        let session = shared.session.clone();
        drop(shared);

        let _ = playback.control.send(Control::Stop);
        if let Some(session) = session {
            session.set_speaking(false);
        }
        debug!("Stopped {}", playback.id);
        self.emit(SinkEvent::StateChanged {
            resource: Some(playback.id),
            old: playback.status,
            new: SinkStatus::Idle,
        });
        self.emit(SinkEvent::Idle {
            resource: playback.id,
        });
        true
    }

    fn pause(&mut self) -> bool {
        self.toggle(SinkStatus::Playing, SinkStatus::Paused, Control::Pause)
    }

    fn unpause(&mut self) -> bool {
        self.toggle(SinkStatus::Paused, SinkStatus::Playing, Control::Resume)
    }

    fn status(&self) -> SinkStatus {
        self.lock()
            .current
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(SinkStatus::Idle)
    }
}

impl Drop for PacedSink {
    fn drop(&mut self) {
        if let Some(playback) = self.lock().current.take() {
            let _ = playback.control.send(Control::Stop);
        }
    }
}

/// Hold the resource for `duration` of unpaused time, then finish it
async fn pace(
    id: ResourceId,
    duration: Duration,
    mut control: mpsc::UnboundedReceiver<Control>,
    shared: Arc<Mutex<Shared>>,
    events: SinkEventSender,
) {
    let mut remaining = duration;
    let mut paused = false;

    loop {
        if paused {
            match control.recv().await {
                Some(Control::Resume) => paused = false,
                Some(Control::Pause) => {}
                Some(Control::Stop) | None => return,
            }
            continue;
        }

        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => break,
            cmd = control.recv() => {
                remaining = remaining.saturating_sub(started.elapsed());
                match cmd {
                    Some(Control::Pause) => paused = true,
                    Some(Control::Resume) => {}
                    Some(Control::Stop) | None => return,
                }
            }
        }
    }

    // Only the owner of the current slot reports completion; stop() may have won
    let mut guard = lock_shared(&shared);
    if guard.current.as_ref().map(|p| p.id) != Some(id) {
        return;
    }
    let Some(playback) = guard.current.take() else {
        return;
    };
    let session = guard.session.clone();
    drop(guard);

    if let Some(session) = session {
        session.set_speaking(false);
    }
    debug!("Finished {}", id);
    if events
        .send(SinkEvent::StateChanged {
            resource: Some(id),
            old: playback.status,
            new: SinkStatus::Idle,
        })
        .is_err()
        || events.send(SinkEvent::Idle { resource: id }).is_err()
    {
        warn!("Engine stopped before {} finished", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::LoggingSession;
    use crate::audio::sink::sink_channel;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tunebot_common::{Track, TrackInfo};

    fn resource(id: u64, secs: u64, file: &NamedTempFile) -> AudioResource {
        let track = Track::new(
            TrackInfo {
                id: format!("t{}", id),
                title: "Song".to_string(),
                artist: "Band".to_string(),
                duration_secs: secs,
                thumbnail: "thumb".to_string(),
            },
            "alice",
        )
        .unwrap();
        AudioResource::new(ResourceId::new(id), track, file.path().to_path_buf(), 0.5)
    }

    fn audio_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"opus").unwrap();
        file
    }

    #[tokio::test]
    async fn test_play_requires_subscription() {
        let (tx, _rx) = sink_channel();
        let mut sink = PacedSink::new(tx);
        let file = audio_file();

        let err = sink.play(resource(1, 3, &file)).unwrap_err();
        assert_eq!(err, SinkError::NotSubscribed);
        assert_eq!(sink.status(), SinkStatus::Idle);
    }

    #[tokio::test]
    async fn test_play_rejects_missing_file() {
        let (tx, _rx) = sink_channel();
        let mut sink = PacedSink::new(tx);
        sink.subscribe(Arc::new(LoggingSession::new("vc")));
        let file = audio_file();
        let res = resource(1, 3, &file);
        drop(file);

        assert!(matches!(sink.play(res), Err(SinkError::MissingResource(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_finish_emits_idle() {
        let (tx, mut rx) = sink_channel();
        let mut sink = PacedSink::new(tx);
        sink.subscribe(Arc::new(LoggingSession::new("vc")));
        let file = audio_file();

        sink.play(resource(4, 3, &file)).unwrap();
        assert_eq!(sink.status(), SinkStatus::Playing);

        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::StateChanged { new: SinkStatus::Playing, .. })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::StateChanged { new: SinkStatus::Idle, .. })
        ));
        assert_eq!(
            rx.recv().await,
            Some(SinkEvent::Idle { resource: ResourceId::new(4) })
        );
        assert_eq!(sink.status(), SinkStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_emits_single_idle() {
        let (tx, mut rx) = sink_channel();
        let mut sink = PacedSink::new(tx);
        sink.subscribe(Arc::new(LoggingSession::new("vc")));
        let file = audio_file();

        sink.play(resource(2, 1, &file)).unwrap();
        assert!(sink.stop());
        assert!(!sink.stop());

        let mut idles = 0;
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            if matches!(event, SinkEvent::Idle { .. }) {
                idles += 1;
            }
        }
        assert_eq!(idles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_resource() {
        let (tx, mut rx) = sink_channel();
        let mut sink = PacedSink::new(tx);
        let session = Arc::new(LoggingSession::new("vc"));
        sink.subscribe(session.clone());
        let file = audio_file();

        sink.play(resource(3, 2, &file)).unwrap();
        assert!(sink.pause());
        assert!(!sink.pause());
        assert_eq!(sink.status(), SinkStatus::Paused);
        assert!(!session.is_speaking());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.status(), SinkStatus::Paused);

        assert!(sink.unpause());
        let mut finished = false;
        while let Some(event) = rx.recv().await {
            if event == (SinkEvent::Idle { resource: ResourceId::new(3) }) {
                finished = true;
                break;
            }
        }
        assert!(finished);
    }
}
