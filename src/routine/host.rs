use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};

use super::fallback::FallbackOrb;
use super::{Dimensions, DrawRoutine, RoutineError};
use crate::analysis::features::FeatureBundle;
use crate::analysis::frame::FrequencyFrame;
use crate::render::canvas::{Canvas, TRANSPARENT};
use crate::render::{panic_message, Renderer};

struct Entry {
    name: String,
    routine: Box<dyn DrawRoutine>,
    failures: u64,
}

/// What ended up on the routine slot for a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drawn {
    Routine(String),
    Fallback,
}

/// Rotation of admitted routines for the routine slot.
pub struct RoutineHost {
    entries: Vec<Entry>,
    current: Option<usize>,
    /// None disables time-based rotation
    rotate_every_ms: Option<f64>,
    last_switch_ms: f64,
    fallback: FallbackOrb,
}

impl RoutineHost {
    pub fn new(rotate_every_secs: f32) -> Self {
        let rotate_every_ms = (rotate_every_secs.is_finite() && rotate_every_secs > 0.0)
            .then(|| rotate_every_secs as f64 * 1000.0);
        Self {
            entries: Vec::new(),
            current: None,
            rotate_every_ms,
            last_switch_ms: 0.0,
            fallback: FallbackOrb,
        }
    }

    /// Add an admitted routine. The first one becomes current.
    pub fn push(&mut self, name: impl Into<String>, routine: Box<dyn DrawRoutine>) {
        self.entries.push(Entry {
            name: name.into(),
            routine,
            failures: 0,
        });
        if self.current.is_none() {
            self.current = Some(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.map(|i| self.entries[i].name.as_str())
    }

    #[cfg(test)]
    pub fn failures(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.failures)
    }

    pub fn next(&mut self) {
        if let Some(i) = self.current {
            self.current = Some((i + 1) % self.entries.len());
        }
    }

    fn rotate(&mut self, elapsed_ms: f64) {
        let Some(period) = self.rotate_every_ms else {
            return;
        };
        // A reset session restarts its clock.
        if elapsed_ms < self.last_switch_ms {
            self.last_switch_ms = elapsed_ms;
        }
        if self.entries.len() > 1 && elapsed_ms - self.last_switch_ms >= period {
            self.next();
            self.last_switch_ms = elapsed_ms;
            if let Some(name) = self.current_name() {
                log::info!("Switching to routine: {}", name);
            }
        }
    }

    /// Draw the current routine if the frame is live, otherwise the fallback
    /// orb. A failing routine is logged and replaced by the orb for the tick.
    pub fn draw(&mut self, ctx: &mut Canvas, frame: &FrequencyFrame, live: bool, elapsed_ms: f64) -> Drawn {
        let dims = Dimensions::of(ctx);
        if let (true, Some(i)) = (live, self.current) {
            let entry = &mut self.entries[i];
            let routine = &mut entry.routine;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                routine.draw(&mut *ctx, frame, dims, elapsed_ms)
            }));
            let err = match outcome {
                Ok(Ok(())) => return Drawn::Routine(entry.name.clone()),
                Ok(Err(err)) => err,
                Err(payload) => RoutineError::Panicked(panic_message(payload.as_ref())),
            };
            entry.failures += 1;
            log::warn!("Routine '{}' failed: {}", entry.name, err);
            ctx.clear(TRANSPARENT);
        }
        self.fallback.paint(ctx, frame, dims, elapsed_ms);
        Drawn::Fallback
    }
}

impl Renderer for RoutineHost {
    fn name(&self) -> &str {
        "routine"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        self.rotate(bundle.elapsed_ms);
        self.draw(canvas, &bundle.frame, bundle.live, bundle.elapsed_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::emotion::Emotion;
    use crate::analysis::features::fixtures::bundle;

    struct Tag(u8);

    impl DrawRoutine for Tag {
        fn draw(&mut self, ctx: &mut Canvas, _: &FrequencyFrame, _: Dimensions, _: f64) -> Result<(), RoutineError> {
            ctx.clear([self.0, 0, 0, 255]);
            Ok(())
        }
    }

    struct Flaky {
        calls: u32,
    }

    impl DrawRoutine for Flaky {
        fn draw(&mut self, ctx: &mut Canvas, _: &FrequencyFrame, _: Dimensions, _: f64) -> Result<(), RoutineError> {
            self.calls += 1;
            ctx.clear([9, 9, 9, 255]);
            match self.calls % 3 {
                1 => Err(RoutineError::Draw("bad tick".into())),
                2 => panic!("worse tick"),
                _ => Ok(()),
            }
        }
    }

    fn host_with(names: &[u8]) -> RoutineHost {
        let mut host = RoutineHost::new(20.0);
        for &n in names {
            host.push(format!("r{}", n), Box::new(Tag(n)));
        }
        host
    }

    #[test]
    fn empty_host_draws_fallback() {
        let mut host = RoutineHost::new(20.0);
        let mut canvas = Canvas::new(50, 50);
        assert!(host.is_empty());
        assert_eq!(host.draw(&mut canvas, &FrequencyFrame::silent(84), true, 0.0), Drawn::Fallback);
        assert_eq!(host.current_name(), None);
        host.next();
        assert_eq!(host.current_name(), None);
    }

    #[test]
    fn placeholder_frames_draw_fallback() {
        let mut host = host_with(&[1]);
        let mut canvas = Canvas::new(50, 50);
        let frame = FrequencyFrame::silent(84);
        assert_eq!(host.draw(&mut canvas, &frame, false, 0.0), Drawn::Fallback);
        assert_eq!(host.draw(&mut canvas, &frame, true, 0.0), Drawn::Routine("r1".into()));
        assert_eq!(canvas.pixel(0, 0), Some([1, 0, 0, 255]));
    }

    #[test]
    fn next_wraps_around() {
        let mut host = host_with(&[1, 2, 3]);
        assert_eq!(host.current_name(), Some("r1"));
        host.next();
        host.next();
        assert_eq!(host.current_name(), Some("r3"));
        host.next();
        assert_eq!(host.current_name(), Some("r1"));
    }

    #[test]
    fn rotates_on_elapsed_time() {
        let mut host = host_with(&[1, 2]);
        let mut canvas = Canvas::new(20, 20);
        let mut b = bundle(vec![50; 84], true, Emotion::Calm);

        b.elapsed_ms = 19_999.0;
        host.render(&mut canvas, &b).unwrap();
        assert_eq!(host.current_name(), Some("r1"));

        b.elapsed_ms = 20_000.0;
        host.render(&mut canvas, &b).unwrap();
        assert_eq!(host.current_name(), Some("r2"));

        b.elapsed_ms = 39_000.0;
        host.render(&mut canvas, &b).unwrap();
        assert_eq!(host.current_name(), Some("r2"));

        b.elapsed_ms = 40_000.0;
        host.render(&mut canvas, &b).unwrap();
        assert_eq!(host.current_name(), Some("r1"));
    }

    #[test]
    fn rotation_can_be_disabled() {
        let mut host = RoutineHost::new(0.0);
        host.push("a", Box::new(Tag(1)));
        host.push("b", Box::new(Tag(2)));
        let mut canvas = Canvas::new(20, 20);
        let mut b = bundle(vec![50; 84], true, Emotion::Calm);
        b.elapsed_ms = 1e9;
        host.render(&mut canvas, &b).unwrap();
        assert_eq!(host.current_name(), Some("a"));
    }

    #[test]
    fn failing_routine_falls_back_each_time() {
        let mut host = RoutineHost::new(20.0);
        host.push("flaky", Box::new(Flaky { calls: 0 }));
        let mut canvas = Canvas::new(40, 40);
        let frame = FrequencyFrame::filled(84, 30);

        let drawn: Vec<Drawn> = (0..3)
            .map(|_| host.draw(&mut canvas, &frame, true, 0.0))
            .collect();
        assert_eq!(
            drawn,
            vec![Drawn::Fallback, Drawn::Fallback, Drawn::Routine("flaky".into())]
        );
        assert_eq!(host.failures("flaky"), Some(2));
    }
}
