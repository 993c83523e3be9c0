/// How many items to request from the upstream provider to end up with
/// `desired` after client-side safety filtering.
///
/// The provider has no server-side safety filter for this path, and
/// roughly half of a typical mixed result page gets filtered, so the
/// request count is doubled when safety is on. The 2x is a fixed
/// heuristic, not a measured ratio; it deliberately does not adapt to
/// observed filter rates per query.
pub fn page_size(safety_enabled: bool, desired: usize) -> usize {
    if safety_enabled {
        desired * 2
    } else {
        desired
    }
}
