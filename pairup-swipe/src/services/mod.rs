pub mod match_detector;
pub mod recommendation;
pub mod swipe_service;
pub mod throttle;
