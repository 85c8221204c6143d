//! Camera calibration dump parser.
//!
//! Pulls every `rotation=[[..][..][..]] translation=[..]` block and every
//! `parameters=cx=.., cy=.., fx=.., fy=.., k1=.. .. k6=..` block out of the
//! SDK's textual calibration string. Blocks are returned in the order they
//! appear; text between them is ignored.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extrinsics {
    /// Row-major 3x3 rotation.
    pub rotation: [[f64; 3]; 3],
    /// Translation in millimetres.
    pub translation: [f64; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Intrinsics {
    pub cx: f64,
    pub cy: f64,
    pub fx: f64,
    pub fy: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Calibration {
    pub extrinsics: Vec<Extrinsics>,
    pub intrinsics: Vec<Intrinsics>,
}

fn extrinsics_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rotation=\[\[([0-9eE.,\s\[\]+-]+?)\]\]\s*translation=\[([0-9eE.,\s+-]+)\]")
            .expect("extrinsics regex")
    })
}

fn intrinsics_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let num = r"([0-9eE.+-]+)";
        let fields = ["cx", "cy", "fx", "fy", "k1", "k2", "k3", "k4", "k5", "k6"]
            .iter()
            .map(|name| format!(r"{}={}", name, num))
            .collect::<Vec<_>>()
            .join(r",\s*");
        Regex::new(&format!(r"parameters=\s*{}", fields)).expect("intrinsics regex")
    })
}

pub fn parse_calibration(raw: &str) -> Result<Calibration> {
    let mut calibration = Calibration::default();

    for caps in extrinsics_re().captures_iter(raw) {
        let rows = caps[1]
            .split("][")
            .map(|row| parse_triple(row, "rotation row"))
            .collect::<Result<Vec<_>>>()?;
        let rotation: [[f64; 3]; 3] = rows.try_into().map_err(|rows: Vec<[f64; 3]>| {
            Error::Calibration(format!("rotation has {} rows, expected 3", rows.len()))
        })?;
        calibration.extrinsics.push(Extrinsics {
            rotation,
            translation: parse_triple(&caps[2], "translation")?,
        });
    }

    for caps in intrinsics_re().captures_iter(raw) {
        let mut values = [0.0f64; 10];
        for (slot, value) in values.iter_mut().zip(caps.iter().skip(1)) {
            let text = value.map(|m| m.as_str()).unwrap_or_default();
            *slot = parse_number(text, "intrinsic parameter")?;
        }
        let [cx, cy, fx, fy, k1, k2, k3, k4, k5, k6] = values;
        calibration.intrinsics.push(Intrinsics {
            cx,
            cy,
            fx,
            fy,
            k1,
            k2,
            k3,
            k4,
            k5,
            k6,
        });
    }

    log::info!(
        "calibration parsed: {} extrinsics, {} intrinsics",
        calibration.extrinsics.len(),
        calibration.intrinsics.len()
    );
    Ok(calibration)
}

fn parse_number(text: &str, what: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| Error::Calibration(format!("bad {} value '{}'", what, text.trim())))
}

fn parse_triple(text: &str, what: &str) -> Result<[f64; 3]> {
    let values = text
        .split(',')
        .map(|v| parse_number(v, what))
        .collect::<Result<Vec<_>>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| Error::Calibration(format!("{} has {} values, expected 3", what, v.len())))
}
