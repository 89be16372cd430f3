/// Axis-aligned box in integer pixel coordinates, `(x1, y1)` top-left and
/// `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }
}

/// One detection after label resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// Score in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn class(&self) -> LabelClass {
        LabelClass::of(&self.label)
    }

    /// Text drawn next to the box, e.g. `person 0.87`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

/// Detection as emitted by a backend, before rounding and label lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
    pub class_index: usize,
    pub score: f32,
}

/// Three-way label classification.
///
/// `Person` drives the auto-record trigger; `Vehicle` and `Other` only affect
/// the overlay colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelClass {
    Person,
    Vehicle,
    Other,
}

const VEHICLE_LABELS: &[&str] = &["car", "truck", "bus"];

impl LabelClass {
    pub fn of(label: &str) -> Self {
        let label = label.to_lowercase();
        if label == "person" {
            LabelClass::Person
        } else if VEHICLE_LABELS.contains(&label.as_str()) {
            LabelClass::Vehicle
        } else {
            LabelClass::Other
        }
    }

    /// Overlay colour (RGB).
    pub fn color(self) -> [u8; 3] {
        match self {
            LabelClass::Person => [0xFF, 0x4D, 0x4D],
            LabelClass::Vehicle => [0x4D, 0xA6, 0xFF],
            LabelClass::Other => [0x55, 0x55, 0x55],
        }
    }
}

/// Outcome of one detector invocation.
///
/// Failure is a value, not an error: the loop decides what to do with it.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionOutcome {
    Detected(Vec<Detection>),
    Failed(String),
}

impl DetectionOutcome {
    /// Detections, or an empty list when the backend failed.
    pub fn into_detections(self) -> Vec<Detection> {
        match self {
            DetectionOutcome::Detected(detections) => detections,
            DetectionOutcome::Failed(reason) => {
                log::debug!("detector failed, continuing without detections: {}", reason);
                Vec::new()
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DetectionOutcome::Failed(_))
    }
}

/// True when any detection is a person.
pub fn contains_person(detections: &[Detection]) -> bool {
    detections
        .iter()
        .any(|d| d.class() == LabelClass::Person)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_three_way() {
        assert_eq!(LabelClass::of("person"), LabelClass::Person);
        assert_eq!(LabelClass::of("Person"), LabelClass::Person);
        assert_eq!(LabelClass::of("car"), LabelClass::Vehicle);
        assert_eq!(LabelClass::of("TRUCK"), LabelClass::Vehicle);
        assert_eq!(LabelClass::of("bus"), LabelClass::Vehicle);
        assert_eq!(LabelClass::of("motorcycle"), LabelClass::Other);
        assert_eq!(LabelClass::of("dog"), LabelClass::Other);
        assert_eq!(LabelClass::of("17"), LabelClass::Other);
    }

    #[test]
    fn colors_are_distinct_per_class() {
        let person = LabelClass::Person.color();
        let vehicle = LabelClass::Vehicle.color();
        let other = LabelClass::Other.color();
        assert_ne!(person, vehicle);
        assert_ne!(person, other);
        assert_ne!(vehicle, other);
    }

    #[test]
    fn failed_outcome_yields_no_detections() {
        let outcome = DetectionOutcome::Failed("model exploded".to_string());
        assert!(outcome.is_failure());
        assert!(outcome.into_detections().is_empty());
    }

    #[test]
    fn caption_formats_two_decimals() {
        let det = Detection {
            bbox: BoundingBox {
                x1: 0,
                y1: 0,
                x2: 10,
                y2: 10,
            },
            label: "car".to_string(),
            confidence: 0.876,
        };
        assert_eq!(det.caption(), "car 0.88");
    }
}
