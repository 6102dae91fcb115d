use serde::{Deserialize, Serialize};

/// Axis-aligned box in canvas units. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl Rect {
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> u32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> u32 {
    self.y + self.height
  }

  /// Whether `other` lies entirely inside this box (edges may touch).
  pub fn contains(&self, other: &Rect) -> bool {
    other.x >= self.x
      && other.y >= self.y
      && other.right() <= self.right()
      && other.bottom() <= self.bottom()
  }

  /// Whether the two boxes share interior area. Touching edges do not count.
  pub fn intersects(&self, other: &Rect) -> bool {
    self.x < other.right()
      && other.x < self.right()
      && self.y < other.bottom()
      && other.y < self.bottom()
  }

  /// Shift by an offset.
  pub fn translate(&self, dx: u32, dy: u32) -> Rect {
    Rect::new(self.x + dx, self.y + dy, self.width, self.height)
  }

  /// Smallest box covering all of `rects`, or `None` when empty.
  pub fn union_all<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    rects.into_iter().fold(None, |acc: Option<Rect>, r| {
      Some(match acc {
        None => *r,
        Some(a) => {
          let x = a.x.min(r.x);
          let y = a.y.min(r.y);
          Rect::new(x, y, a.right().max(r.right()) - x, a.bottom().max(r.bottom()) - y)
        }
      })
    })
  }
}
