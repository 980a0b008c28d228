//! Describe-scene controller: one captioned frame on demand.
//!
//! The camera is acquired through the broker (reusing gesture mode's stream
//! when it is running) and left open afterwards; it is a session-wide
//! resource released only by `stop_gesture` or `shutdown`.

use super::Session;

impl Session {
    pub async fn describe_scene(&self) {
        let stream = match self.inner.broker.acquire_camera().await {
            Ok(stream) => stream,
            Err(e) => {
                self.announce_camera_error(&e).await;
                return;
            }
        };

        // Let a freshly opened camera deliver its first frame.
        tokio::time::sleep(self.inner.config.warmup()).await;
        self.announce("Analyzing scene...").await;

        let frame = match self.inner.sampler.sample(stream.as_ref()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.announce("Camera not ready.").await;
                return;
            }
            Err(e) => {
                log::error!("describe: frame capture failed: {e}");
                self.announce("Camera not ready.").await;
                return;
            }
        };

        let text = match self.inner.backend.caption(&frame).await {
            Ok(reply) => {
                if let Some(caption) = reply.caption_text() {
                    caption.to_string()
                } else if reply.has_error() {
                    if let Some(err) = &reply.error {
                        log::error!("describe: captioning error: {err}");
                    }
                    "Vision system busy, try again.".to_string()
                } else {
                    "Could not understand the scene.".to_string()
                }
            }
            Err(e) => {
                log::error!("describe: captioning service unreachable: {e}");
                "Vision system not responding.".to_string()
            }
        };

        self.announce(text).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::harness::Harness;
    use crate::client::CaptionReply;
    use crate::device::broker::fakes::{FakeCamera, FakeMicrophone};

    fn caption(text: &str) -> Result<CaptionReply, String> {
        Ok(CaptionReply {
            caption: Some(text.to_string()),
            error: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn caption_is_announced() {
        let h = Harness::granted();
        h.backend.reply_caption(caption("a person holding a mug"));

        h.session.describe_scene().await;

        assert_eq!(
            h.announced(),
            vec!["Analyzing scene...", "a person holding a mug"]
        );
        assert_eq!(h.backend.caption_calls(), 1);
        // Camera stays open for the rest of the session.
        assert!(h.session.broker().has_camera().await);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_denied_makes_no_network_call() {
        let h = Harness::new(FakeCamera::denied(), FakeMicrophone::granted(), None);

        h.session.describe_scene().await;

        assert_eq!(h.announced(), vec!["Camera permission denied."]);
        assert_eq!(h.backend.caption_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cold_camera_is_not_ready() {
        let h = Harness::new(FakeCamera::cold(), FakeMicrophone::granted(), None);

        h.session.describe_scene().await;

        assert_eq!(h.announced(), vec!["Analyzing scene...", "Camera not ready."]);
        assert_eq!(h.backend.caption_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn service_error_is_busy() {
        let h = Harness::granted();
        h.backend.reply_caption(Ok(CaptionReply {
            caption: None,
            error: Some(serde_json::json!("model loading")),
        }));

        h.session.describe_scene().await;
        assert_eq!(h.session.status(), "Vision system busy, try again.");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_is_not_understood() {
        let h = Harness::granted();
        h.session.describe_scene().await;
        assert_eq!(h.session.status(), "Could not understand the scene.");
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_service() {
        let h = Harness::granted();
        h.backend.reply_caption(Err("connection refused".into()));

        h.session.describe_scene().await;
        assert_eq!(h.session.status(), "Vision system not responding.");
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_gesture_camera() {
        let h = Harness::granted();
        h.session.start_gesture().await;
        h.session.describe_scene().await;

        assert_eq!(h.camera.opens(), 1);
        h.session.stop_gesture().await;
    }
}
