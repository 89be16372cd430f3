/// Class-index table of the COCO-trained detectors (YOLOv8 export order).
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Resolve a class index to its label. Unknown indexes render as the number.
pub fn label_for(class_index: usize) -> String {
    COCO_CLASSES
        .get(class_index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| class_index.to_string())
}

/// Index of a label in the table, if present.
pub fn index_of(label: &str) -> Option<usize> {
    COCO_CLASSES.iter().position(|name| *name == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_indexes() {
        assert_eq!(label_for(0), "person");
        assert_eq!(label_for(2), "car");
        assert_eq!(label_for(5), "bus");
        assert_eq!(label_for(7), "truck");
        assert_eq!(label_for(79), "toothbrush");
        assert_eq!(label_for(80), "80");
    }

    #[test]
    fn index_lookup_matches_table() {
        assert_eq!(index_of("person"), Some(0));
        assert_eq!(index_of("truck"), Some(7));
        assert_eq!(index_of("unicorn"), None);
    }
}
