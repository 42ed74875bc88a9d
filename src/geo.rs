use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Pixel offset in world space. `y` grows downward, as on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub sw: LatLng,
    pub ne: LatLng,
}

impl LatLngBounds {
    pub fn new(sw: LatLng, ne: LatLng) -> Self {
        Self { sw, ne }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, position: LatLng) -> bool {
        position.lat >= self.sw.lat
            && position.lat <= self.ne.lat
            && position.lng >= self.sw.lng
            && position.lng <= self.ne.lng
    }
}

/// Axis-aligned rectangle in pixel space (`min` is top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub min: Point,
    pub max: Point,
}

impl PixelRect {
    pub fn around(center: Point, half: f64) -> Self {
        Self {
            min: center.offset(-half, -half),
            max: center.offset(half, half),
        }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Clamps `self` to `other`. Disjoint rectangles collapse onto the
    /// nearest edge rather than inverting.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let min_x = self.min.x.max(other.min.x);
        let min_y = self.min.y.max(other.min.y);
        let max_x = self.max.x.min(other.max.x).max(min_x);
        let max_y = self.max.y.min(other.max.y).max(min_y);
        PixelRect {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        }
    }
}
