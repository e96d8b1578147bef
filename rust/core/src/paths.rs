// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model path canonicalisation

/// Compute the canonical form of a model path.
///
/// Case-folded, forward slashes, rooted under `models/` and ending in `.mdl`.
/// Level instances, descriptors and the build cache all refer to models by
/// this form so that `Models\Props\Crate.MDL` and `props/crate` compare equal.
pub fn canonical_model_path(path: &str) -> String {
    let mut path = path.to_lowercase().replace('\\', "/");
    if !path.starts_with("models/") {
        path.insert_str(0, "models/");
    }
    if !path.ends_with(".mdl") {
        path.push_str(".mdl");
    }
    path
}

/// Replace backslashes so paths from descriptors work on every platform
#[inline]
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_model_path() {
        assert_eq!(
            canonical_model_path("Models\\Props\\Crate01.MDL"),
            "models/props/crate01.mdl"
        );
        assert_eq!(canonical_model_path("props/crate01"), "models/props/crate01.mdl");
        assert_eq!(
            canonical_model_path("models/props/crate01.mdl"),
            "models/props/crate01.mdl"
        );
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("a\\b/c"), "a/b/c");
    }
}
