/// Returns every entry of `required` that is absent from `actual`.
///
/// The result is sorted so error messages built from it are stable.
#[must_use]
pub fn find_missing(actual: &[String], required: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|mixin| !actual.contains(mixin))
        .cloned()
        .collect();

    missing.sort();
    missing.dedup();
    missing
}
