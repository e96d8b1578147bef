// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Physics contents flags
//!
//! Values match the engine's `bsp_flags.h`. Only the subset a static prop
//! descriptor's `$contents` directive accepts is named here.

use smallvec::SmallVec;

pub const CONTENTS_SOLID: u32 = 0x1;
pub const CONTENTS_GRATE: u32 = 0x8;
pub const CONTENTS_MONSTER: u32 = 0x200_0000;
pub const CONTENTS_LADDER: u32 = 0x2000_0000;

const NAMED: [(u32, &str); 4] = [
    (CONTENTS_SOLID, "solid"),
    (CONTENTS_GRATE, "grate"),
    (CONTENTS_MONSTER, "monster"),
    (CONTENTS_LADDER, "ladder"),
];

/// Decompose a contents mask into `$contents` names.
///
/// A mask with none of the named bits yields `notsolid`.
pub fn content_names(mask: u32) -> SmallVec<[&'static str; 4]> {
    let mut names: SmallVec<[&'static str; 4]> = NAMED
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|&(_, name)| name)
        .collect();
    if names.is_empty() {
        names.push("notsolid");
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_names() {
        assert_eq!(content_names(0).as_slice(), &["notsolid"]);
        assert_eq!(content_names(CONTENTS_SOLID).as_slice(), &["solid"]);
        assert_eq!(
            content_names(CONTENTS_SOLID | CONTENTS_LADDER | 0x4000).as_slice(),
            &["solid", "ladder"]
        );
    }
}
