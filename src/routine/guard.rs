use std::panic::{self, AssertUnwindSafe};

use super::layers::LayeredRoutine;
use super::manifest::RoutineManifest;
use super::{Dimensions, DrawRoutine, RoutineError};
use crate::analysis::frame::FrequencyFrame;
use crate::render::canvas::Canvas;
use crate::render::panic_message;

pub const DEFAULT_FORBIDDEN: [&str; 10] = [
    "eval(",
    "Function(",
    "setTimeout(",
    "setInterval(",
    "fetch(",
    "XMLHttpRequest",
    "localStorage",
    "sessionStorage",
    "document.",
    "window.",
];

const DRY_RUN_WIDTH: u32 = 300;
const DRY_RUN_HEIGHT: u32 = 150;
const DRY_RUN_BINS: usize = 128;
const DRY_RUN_LEVEL: u8 = 100;

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Admission control for routine text. Nothing reaches the routine slot
/// without passing the textual screen, parsing, bounds checks and a dry run.
#[derive(Debug, Clone)]
pub struct RoutineGuard {
    /// (as configured, normalized)
    patterns: Vec<(String, String)>,
}

impl Default for RoutineGuard {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN)
    }
}

impl RoutineGuard {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .map(|p| {
                let n = normalize(&p);
                (p, n)
            })
            .collect();
        Self { patterns }
    }

    /// Reject text containing any forbidden pattern, ignoring case and
    /// whitespace.
    pub fn screen(&self, text: &str) -> Result<(), RoutineError> {
        let haystack = normalize(text);
        match self.patterns.iter().find(|(_, n)| haystack.contains(n.as_str())) {
            Some((pattern, _)) => Err(RoutineError::Forbidden {
                pattern: pattern.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn admit(&self, text: &str) -> Result<LayeredRoutine, RoutineError> {
        self.screen(text)?;
        let manifest = parse(text)?;
        validate(&manifest)?;
        let mut routine = LayeredRoutine::new(manifest);
        dry_run(&mut routine)?;
        log::debug!("Routine '{}' admitted", routine.manifest().name);
        Ok(routine)
    }
}

pub fn parse(text: &str) -> Result<RoutineManifest, RoutineError> {
    let manifest: RoutineManifest = serde_json::from_str(text)?;
    if manifest.layers.is_empty() {
        return Err(RoutineError::NotAVisualization(format!(
            "'{}' has no layers",
            manifest.name
        )));
    }
    Ok(manifest)
}

pub fn validate(manifest: &RoutineManifest) -> Result<(), RoutineError> {
    for (i, layer) in manifest.layers.iter().enumerate() {
        layer
            .validate()
            .map_err(|e| RoutineError::Invalid(format!("layer {} ({}): {}", i, layer.kind(), e)))?;
    }
    Ok(())
}

/// Draw once on a throwaway canvas with a mid-level frame at time zero.
/// Errors and panics both reject the routine.
pub fn dry_run(routine: &mut dyn DrawRoutine) -> Result<(), RoutineError> {
    let mut canvas = Canvas::new(DRY_RUN_WIDTH, DRY_RUN_HEIGHT);
    let frame = FrequencyFrame::filled(DRY_RUN_BINS, DRY_RUN_LEVEL);
    let dims = Dimensions::of(&canvas);
    match panic::catch_unwind(AssertUnwindSafe(|| routine.draw(&mut canvas, &frame, dims, 0.0))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(RoutineError::DryRun(err.to_string())),
        Err(payload) => Err(RoutineError::Panicked(panic_message(payload.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALO: &str = r#"{
        "name": "halo",
        "display_name": "Halo",
        "description": "Ring of dots",
        "layers": [
            {"kind": "fade", "alpha": 0.3},
            {"kind": "ring", "count": 64, "radius": 0.4, "reach": 0.5, "paint": {"hue": 200, "speed": 30}}
        ]
    }"#;

    #[test]
    fn admits_a_well_formed_routine() {
        let routine = RoutineGuard::default().admit(HALO).unwrap();
        assert_eq!(routine.manifest().display_name, "Halo");
    }

    #[test]
    fn screen_ignores_case_and_whitespace() {
        let guard = RoutineGuard::default();
        for text in ["x = EVAL (1)", "window .open", "set Timeout(f)", "new function\t("] {
            match guard.screen(text) {
                Err(RoutineError::Forbidden { .. }) => {}
                other => panic!("{:?} was not rejected: {:?}", text, other),
            }
        }
        assert!(guard.screen("evaluate the windows").is_ok());
    }

    #[test]
    fn forbidden_text_is_rejected_before_parsing() {
        let text = HALO.replace("Ring of dots", "uses localStorage");
        match RoutineGuard::default().admit(&text) {
            Err(RoutineError::Forbidden { pattern }) => assert_eq!(pattern, "localStorage"),
            other => panic!("unexpected {:?}", other.map(|r| r.manifest().name.clone())),
        }
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let guard = RoutineGuard::new(["spin"]);
        assert!(guard.screen("eval(1)").is_ok());
        assert!(guard.admit(HALO).is_ok());
        assert!(guard.screen("\"SPIN\": 1").is_err());
    }

    #[test]
    fn rejects_non_visualizations() {
        let guard = RoutineGuard::default();
        assert!(matches!(guard.admit("not json"), Err(RoutineError::Parse(_))));
        let empty = r#"{"name": "x", "display_name": "X", "layers": []}"#;
        assert!(matches!(guard.admit(empty), Err(RoutineError::NotAVisualization(_))));
    }

    #[test]
    fn rejects_out_of_bounds_layers() {
        let text = HALO.replace("\"count\": 64", "\"count\": 100000");
        match RoutineGuard::default().admit(&text) {
            Err(RoutineError::Invalid(msg)) => assert!(msg.contains("layer 1 (ring)")),
            other => panic!("unexpected {:?}", other.map(|r| r.manifest().name.clone())),
        }
    }

    struct Exploding;

    impl DrawRoutine for Exploding {
        fn draw(&mut self, _: &mut Canvas, frame: &FrequencyFrame, _: Dimensions, _: f64) -> Result<(), RoutineError> {
            if frame.len() == DRY_RUN_BINS {
                panic!("boom");
            }
            Ok(())
        }
    }

    struct Refusing;

    impl DrawRoutine for Refusing {
        fn draw(&mut self, _: &mut Canvas, _: &FrequencyFrame, _: Dimensions, _: f64) -> Result<(), RoutineError> {
            Err(RoutineError::Draw("no".into()))
        }
    }

    #[test]
    fn bundled_routines_are_admitted() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("routines");
        let names = crate::routine::loader::list_routines(&dir).unwrap();
        assert!(!names.is_empty());
        let guard = RoutineGuard::default();
        for name in names {
            let text = crate::routine::loader::load_routine_text(&dir, &name).unwrap();
            if let Err(err) = guard.admit(&text) {
                panic!("{} rejected: {}", name, err);
            }
        }
    }

    #[test]
    fn dry_run_catches_errors_and_panics() {
        match dry_run(&mut Exploding) {
            Err(RoutineError::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(dry_run(&mut Refusing), Err(RoutineError::DryRun(_))));
    }
}
