/// Viewport-relative box, as reported by `getBoundingClientRect`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Page-absolute coordinates for the surface's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Placement {
    pub left: f64,
    pub top: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SurfaceMetrics {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

/// Anchors the surface under the trigger and pulls it back inside the
/// container's right and bottom edges.
pub(crate) fn place_preview(
    trigger: Rect,
    container: Rect,
    surface: SurfaceMetrics,
    scroll: (f64, f64),
) -> Placement {
    let (scroll_x, scroll_y) = scroll;

    let mut left = trigger.left;
    if trigger.left + surface.width > container.right {
        left = container.right - surface.width;
    }

    let mut top = trigger.bottom + surface.padding;
    if top + surface.height > container.bottom - surface.padding {
        top = container.bottom - surface.height - surface.padding;
    }

    Placement {
        left: left + scroll_x,
        top: top + scroll_y,
    }
}
