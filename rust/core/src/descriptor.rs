// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build descriptor (QC) parsing
//!
//! Reads only the directives that matter for combining:
//!
//! - `$modelname "path.mdl"`
//! - `$scale <factor>`: applies to meshes declared after it
//! - `$body`/`$bodygroup`/`$model`: exactly one reference mesh, either inline
//!   (`$body name "ref.smd"`) or in a block (`$bodygroup name { studio "ref.smd" }`)
//! - `$collisionmodel "phys.smd"`
//!
//! Articulation and procedural features reject the model outright, merging
//! only handles one static mesh per model.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::{canonical_model_path, normalize_separators};
use crate::tokenizer::{Token, Tokenizer};

/// Directives that make a model ineligible for merging
pub const DYNAMIC_FEATURES: &[&str] = &[
    "$collisionjoints",
    "$ikchain",
    "$weightlist",
    "$poseparameter",
    "$proceduralbones",
    "$jigglebone",
    "$keyvalues",
];

/// Mesh interchange formats a descriptor may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshFormat {
    /// Studiomdl text format
    Smd,
    /// Datamodel exchange format
    Dmx,
}

impl MeshFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("smd") {
            Some(MeshFormat::Smd)
        } else if ext.eq_ignore_ascii_case("dmx") {
            Some(MeshFormat::Dmx)
        } else {
            None
        }
    }
}

/// Build metadata for one source model
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildDescriptor {
    /// Location of the descriptor file itself
    pub path: PathBuf,
    /// Canonical model path (`models/....mdl`)
    pub model_name: String,
    /// Visible geometry
    pub reference_mesh: PathBuf,
    /// Collision geometry, if declared
    pub collision_mesh: Option<PathBuf>,
    /// `$scale` in effect when the reference mesh was declared
    pub reference_scale: f64,
    /// `$scale` in effect when the collision mesh was declared
    pub collision_scale: f64,
}

impl BuildDescriptor {
    /// Parse descriptor text. Mesh paths resolve relative to the descriptor's
    /// directory.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let mut tok = Tokenizer::new(content);

        let mut model_name: Option<String> = None;
        let mut reference: Option<(PathBuf, f64)> = None;
        let mut collision: Option<(PathBuf, f64)> = None;
        let mut scale: f64 = 1.0;

        while let Some(token) = tok.next_token()? {
            let Token::String(word) = token else {
                continue;
            };
            let directive = word.to_lowercase();

            match directive.as_str() {
                "$scale" => {
                    let value = tok.expect_string()?;
                    scale = fast_float::parse::<f64, _>(value)
                        .map_err(|_| tok.error(format!("Invalid $scale value {:?}", value)))?;
                }
                "$modelname" => {
                    model_name = Some(tok.expect_string()?.to_string());
                }
                "$body" | "$bodygroup" | "$model" => {
                    tok.expect_string()?; // group name
                    match tok.next_token()? {
                        Some(Token::String(file)) => {
                            set_reference(&mut reference, base, file, scale)?;
                            continue;
                        }
                        Some(Token::Newline) => tok.expect(Token::BraceOpen)?,
                        Some(Token::BraceOpen) => {}
                        Some(other) => {
                            return Err(tok.error(format!("Unexpected {:?} after {}", other, word)))
                        }
                        None => return Err(tok.error(format!("Unexpected end of file after {}", word))),
                    }
                    parse_body_block(&mut tok, &mut reference, base, scale)?;
                }
                "$collisionmodel" => {
                    let file = tok.expect_string()?;
                    collision = Some((resolve(base, file), scale));
                }
                feature if DYNAMIC_FEATURES.contains(&feature) => {
                    return Err(Error::DynamicModel(feature.to_string()));
                }
                _ => {}
            }
        }

        let model_name = model_name.ok_or(Error::MissingModelName)?;
        let (reference_mesh, reference_scale) = reference.ok_or(Error::MissingReferenceMesh)?;

        if MeshFormat::from_path(&reference_mesh).is_none() {
            return Err(Error::UnsupportedMesh(reference_mesh.display().to_string()));
        }
        if let Some((coll, _)) = &collision {
            if MeshFormat::from_path(coll).is_none() {
                return Err(Error::UnsupportedMesh(coll.display().to_string()));
            }
        }

        let (collision_mesh, collision_scale) = match collision {
            Some((mesh, scale)) => (Some(mesh), scale),
            None => (None, 1.0),
        };

        Ok(Self {
            path: path.to_path_buf(),
            model_name: canonical_model_path(&model_name),
            reference_mesh,
            collision_mesh,
            reference_scale,
            collision_scale,
        })
    }
}

/// Body block contents: `studio "file"` entries, other words ignored
fn parse_body_block(
    tok: &mut Tokenizer<'_>,
    reference: &mut Option<(PathBuf, f64)>,
    base: &Path,
    scale: f64,
) -> Result<()> {
    loop {
        match tok.next_token()? {
            Some(Token::BraceClose) => return Ok(()),
            Some(Token::Newline) => {}
            Some(Token::String(word)) => {
                if word.eq_ignore_ascii_case("studio") {
                    let file = tok.expect_string()?;
                    set_reference(reference, base, file, scale)?;
                }
            }
            Some(Token::BraceOpen) => return Err(tok.error("Unexpected { in body block")),
            None => return Err(tok.error("Unterminated body block")),
        }
    }
}

fn set_reference(
    reference: &mut Option<(PathBuf, f64)>,
    base: &Path,
    file: &str,
    scale: f64,
) -> Result<()> {
    if reference.is_some() {
        return Err(Error::DynamicModel("multiple reference meshes".to_string()));
    }
    *reference = Some((resolve(base, file), scale));
    Ok(())
}

fn resolve(base: &Path, file: &str) -> PathBuf {
    base.join(normalize_separators(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<BuildDescriptor> {
        BuildDescriptor::parse(content, Path::new("content/props/crate.qc"))
    }

    #[test]
    fn test_simple_descriptor() {
        let desc = parse(
            r#"
$modelname "props/Crate01.mdl"
$scale 2.5
$body body "crate_ref.smd"
$collisionmodel "crate_phys.smd" {
    $mass 20
}
"#,
        )
        .unwrap();

        assert_eq!(desc.model_name, "models/props/crate01.mdl");
        assert_eq!(desc.reference_mesh, PathBuf::from("content/props/crate_ref.smd"));
        assert_eq!(
            desc.collision_mesh,
            Some(PathBuf::from("content/props/crate_phys.smd"))
        );
        assert_eq!(desc.reference_scale, 2.5);
        assert_eq!(desc.collision_scale, 2.5);
    }

    #[test]
    fn test_scale_applies_to_later_meshes_only() {
        let desc = parse(
            r#"
$modelname "props/crate01.mdl"
$body body "crate_ref.smd"
$scale 4
$collisionmodel "crate_phys.smd"
"#,
        )
        .unwrap();
        assert_eq!(desc.reference_scale, 1.0);
        assert_eq!(desc.collision_scale, 4.0);
    }

    #[test]
    fn test_bodygroup_block() {
        let desc = parse(
            "$modelname props/crate01.mdl\n$bodygroup main\n{\n    studio \"crate_ref.dmx\"\n    blank\n}\n",
        )
        .unwrap();
        assert_eq!(desc.reference_mesh, PathBuf::from("content/props/crate_ref.dmx"));
        assert!(desc.collision_mesh.is_none());
    }

    #[test]
    fn test_multiple_reference_meshes_rejected() {
        let err = parse(
            r#"
$modelname "props/crate01.mdl"
$body a "one.smd"
$body b "two.smd"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DynamicModel(_)));
    }

    #[test]
    fn test_jigglebone_rejected_even_after_all_meshes() {
        let err = parse(
            r#"
$modelname "props/antenna.mdl"
$body body "antenna_ref.smd"
$collisionmodel "antenna_phys.smd"
$jigglebone "tip" {
    is_flexible { }
}
"#,
        )
        .unwrap_err();
        assert_eq!(err, Error::DynamicModel("$jigglebone".to_string()));
    }

    #[test]
    fn test_unusual_whitespace_and_bom() {
        let desc = parse("\u{feff}$modelname\u{a0}props/a\n$body body a.smd\x0c$scale 3\n").unwrap();
        assert_eq!(desc.model_name, "models/props/a.mdl");
        assert_eq!(desc.reference_mesh, PathBuf::from("content/props/a.smd"));
    }

    #[test]
    fn test_missing_model_name() {
        let err = parse("$body body \"ref.smd\"").unwrap_err();
        assert_eq!(err, Error::MissingModelName);
    }

    #[test]
    fn test_missing_reference() {
        let err = parse("$modelname \"props/a.mdl\"").unwrap_err();
        assert_eq!(err, Error::MissingReferenceMesh);
    }

    #[test]
    fn test_unsupported_format() {
        let err = parse("$modelname \"props/a.mdl\"\n$body body \"a.fbx\"").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMesh(_)));

        let err = parse("$modelname \"props/a.mdl\"\n$body body \"a.smd\"\n$collisionmodel \"a.obj\"")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMesh(_)));
    }

    #[test]
    fn test_mesh_format_detection() {
        assert_eq!(MeshFormat::from_path(Path::new("a/b.SMD")), Some(MeshFormat::Smd));
        assert_eq!(MeshFormat::from_path(Path::new("b.dmx")), Some(MeshFormat::Dmx));
        assert_eq!(MeshFormat::from_path(Path::new("b.fbx")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
    }
}
