//! Per-detector sky and beam file names.
//!
//! An explicit `detector -> path` map wins. Otherwise the template is
//! filled in: `{detector}` and `{mc}` are replaced, `{{` and `}}` stand for
//! literal braces.

use std::collections::BTreeMap;

use pest::Parser;
use pest_derive::Parser;

use crate::{
    config::ConviqtConfig,
    error::{ConviqtError, Result},
};

#[derive(Parser)]
#[grammar = "filenames.pest"]
struct TemplateParser;

/// Inserted before the extension of a beam file name to get the I, Q and U
/// axis beams.
pub const AXIS_SUFFIXES: [&str; 3] = ["_I000", "_0I00", "_00I0"];

pub fn fill_template(template: &str, det: &str, mc: Option<u64>) -> Result<String> {
    let mut pairs = TemplateParser::parse(Rule::template, template)
        .map_err(|e| ConviqtError::Template(format!("{}: {}", template, e)))?;
    let mut out = String::with_capacity(template.len() + det.len());
    let pieces = match pairs.next() {
        Some(p) => p.into_inner(),
        None => return Ok(out),
    };
    for piece in pieces {
        match piece.as_rule() {
            Rule::literal => out.push_str(piece.as_str()),
            Rule::open_escape => out.push('{'),
            Rule::close_escape => out.push('}'),
            Rule::placeholder => {
                let name = piece.into_inner().next().map_or("", |n| n.as_str());
                match (name, mc) {
                    ("detector", _) => out.push_str(det),
                    ("mc", Some(mc)) => out.push_str(&mc.to_string()),
                    ("mc", None) => {
                        return Err(ConviqtError::Template(format!(
                            "{} uses {{mc}} but no Monte Carlo index is set",
                            template
                        )))
                    }
                    (other, _) => {
                        return Err(ConviqtError::Template(format!(
                            "{} has unknown placeholder {{{}}}",
                            template, other
                        )))
                    }
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn resolve(
    dict: &BTreeMap<String, String>,
    template: Option<&str>,
    det: &str,
    mc: Option<u64>,
) -> Result<Option<String>> {
    if let Some(path) = dict.get(det) {
        return Ok(Some(path.clone()));
    }
    template
        .map(|t| fill_template(t, det, mc))
        .transpose()
}

pub fn sky_file(config: &ConviqtConfig, det: &str) -> Result<String> {
    resolve(
        &config.sky_file_dict,
        config.sky_file.as_deref(),
        det,
        config.mc_index(),
    )?
    .ok_or_else(|| ConviqtError::MissingSkyFile(det.to_string()))
}

pub fn beam_file(config: &ConviqtConfig, det: &str) -> Result<String> {
    resolve(
        &config.beam_file_dict,
        config.beam_file.as_deref(),
        det,
        config.mc_index(),
    )?
    .ok_or_else(|| ConviqtError::MissingBeamFile(det.to_string()))
}

/// I, Q and U axis beam names derived from one beam file name, e.g.
/// `beam.yaml` gives `beam_I000.yaml`, `beam_0I00.yaml`, `beam_00I0.yaml`.
pub fn axis_beam_files(base: &str) -> Result<[String; 3]> {
    let name_start = base.rfind('/').map_or(0, |i| i + 1);
    let dot = base[name_start..]
        .rfind('.')
        .filter(|&i| i > 0)
        .map(|i| name_start + i)
        .ok_or_else(|| ConviqtError::BeamFileName(base.to_string()))?;
    let (stem, ext) = base.split_at(dot);
    Ok(AXIS_SUFFIXES.map(|s| format!("{}{}{}", stem, s, ext)))
}
