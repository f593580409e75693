//! Heuristic pose engine used when no trained model is attached. Reads the
//! upper-body landmarks of a 33-point pose and reports a gesture label.

use shared::domain::Landmark;

const NOSE: usize = 0;
const LEFT_SHOULDER: usize = 11;
const RIGHT_SHOULDER: usize = 12;
const LEFT_WRIST: usize = 15;
const RIGHT_WRIST: usize = 16;
const MIN_VISIBILITY: f32 = 0.5;

/// `sensitivity` is the reach, in normalized image units, a wrist must clear
/// past its shoulder (or above the nose) before it counts.
pub fn classify_pose(landmarks: &[Landmark], sensitivity: f32) -> String {
    let point = |index: usize| {
        landmarks
            .get(index)
            .filter(|landmark| landmark.visibility >= MIN_VISIBILITY)
    };

    let (Some(nose), Some(left_shoulder), Some(right_shoulder)) =
        (point(NOSE), point(LEFT_SHOULDER), point(RIGHT_SHOULDER))
    else {
        return "REST".into();
    };
    let left_wrist = point(LEFT_WRIST);
    let right_wrist = point(RIGHT_WRIST);

    let raised = |wrist: Option<&Landmark>| wrist.is_some_and(|w| w.y < nose.y - sensitivity);
    if raised(left_wrist) && raised(right_wrist) {
        return "SELECT".into();
    }
    // Image x grows to the subject's left.
    if right_wrist.is_some_and(|w| w.x < right_shoulder.x - sensitivity) {
        return "NEXT".into();
    }
    if left_wrist.is_some_and(|w| w.x > left_shoulder.x + sensitivity) {
        return "PREV".into();
    }
    "REST".into()
}
