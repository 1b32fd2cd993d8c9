// modbreaker-parsers/src/rvmat.rs
//! RVMAT material reader
//!
//! Materials reference their textures from `StageN` classes
//! (`texture = "mod\data\jacket_nohq.paa";`). Text materials are scanned
//! with a pattern; rapified ones go through the config decoder and every
//! class is walked.

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::rap::{self, RapClass};
use crate::config::text::decode_text;
use crate::config::ConfigOptions;
use crate::traits::{ParseOptions, ParseResult, Parser};

static TEXTURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\btexture\s*=\s*["']([^"'\r\n]+)["']"#).expect("texture pattern"));

static PIXEL_SHADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bPixelShaderID\s*=\s*["']([^"'\r\n]+)["']"#).expect("shader pattern"));

/// Texture paths and shader of one material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// File textures in stage order; procedural `#(...)` sources are skipped
    pub textures: SmallVec<[String; 4]>,
    pub pixel_shader: Option<String>,
    pub rapified: bool,
}

/// Procedural textures such as `#(argb,8,8,3)color(1,1,1,1)` name no file
fn is_texture_file(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.starts_with('#')
}

fn push_texture(textures: &mut SmallVec<[String; 4]>, value: &str) {
    if is_texture_file(value) && !textures.iter().any(|t| t.eq_ignore_ascii_case(value.trim())) {
        textures.push(value.trim().to_string());
    }
}

fn collect(class: &RapClass, info: &mut MaterialInfo) {
    for (name, value) in class.properties.iter() {
        if name.eq_ignore_ascii_case("texture") {
            if let Some(path) = value.as_str() {
                push_texture(&mut info.textures, path);
            }
        } else if name.eq_ignore_ascii_case("PixelShaderID") && info.pixel_shader.is_none() {
            info.pixel_shader = value.as_str().map(str::to_string);
        }
    }
    for child in &class.children {
        collect(child, info);
    }
}

/// Read a material. Undecodable input yields an empty [`MaterialInfo`].
pub fn read_material(buffer: &[u8], options: &ConfigOptions) -> MaterialInfo {
    let mut info = MaterialInfo::default();

    if rap::is_rapified(buffer) {
        match rap::decode_with_budget(buffer, options.max_nesting_depth, options.max_entries) {
            Ok(root) => {
                info.rapified = true;
                collect(&root, &mut info);
                trace!(textures = info.textures.len(), "rapified material");
                return info;
            }
            Err(e) => debug!(error = %e, "rapified material failed; scanning as text"),
        }
    }

    let Some(decoded) = decode_text(buffer, options.max_replacement_ratio) else {
        return info;
    };

    for caps in TEXTURE_RE.captures_iter(&decoded.text) {
        push_texture(&mut info.textures, &caps[1]);
    }
    info.pixel_shader = PIXEL_SHADER_RE
        .captures(&decoded.text)
        .map(|caps| caps[1].to_string());

    trace!(textures = info.textures.len(), "text material");
    info
}

/// Parser for `.rvmat` files
#[derive(Debug, Clone, Copy, Default)]
pub struct RvmatParser;

impl RvmatParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for RvmatParser {
    type Output = MaterialInfo;

    fn extensions(&self) -> &[&str] {
        &["rvmat"]
    }

    fn name(&self) -> &str {
        "RVMAT Material"
    }

    fn parse_with_options(&self, data: Bytes, options: &ParseOptions) -> ParseResult<Self::Output> {
        Ok(read_material(&data, &options.config))
    }
}
