use crate::math::Polygon2d;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records an outline, such as the footprint of a conflict.
#[allow(unused)]
pub fn debug_polygon(name: &str, polygon: &Polygon2d) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "polygon",
            "name": name,
            "points": polygon.points().iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
        }))
    })
}

/// Takes everything recorded on this thread since the last call.
#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
