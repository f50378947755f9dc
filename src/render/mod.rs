pub mod canvas;
pub mod dashboard;
pub mod panels;
pub mod text;

use anyhow::Result;

use crate::analysis::features::FeatureBundle;
use canvas::Canvas;

/// One visual panel. Gets the tick's features by shared reference and draws
/// into a canvas sized to its slot.
pub trait Renderer {
    fn name(&self) -> &str;
    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()>;
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
