//! Marker-coordinate parsing.
//!
//! Accepts either structured JSON (`[[x,y,z], ...]`, `[{"x":..,"y":..,"z":..}, ...]`,
//! or `{"points": [...]}` / `{"coords": [...]}`) or line-oriented text (CSV or
//! whitespace separated, with or without an `x,y,z` header). Rows that do not
//! yield three finite numbers are dropped; parsing never fails as a whole.

use glam::Vec3;
use serde_json::Value;

/// Parsed marker list plus the number of rows/elements that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCoords {
    pub points: Vec<Vec3>,
    pub skipped: usize,
}

/// Ordered list of finite points found in `text`.
pub fn parse_coords(text: &str) -> Vec<Vec3> {
    parse_coords_counted(text).points
}

pub fn parse_coords_counted(text: &str) -> ParsedCoords {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_structured(&value),
        Err(_) => parse_lines(text),
    }
}

fn parse_structured(value: &Value) -> ParsedCoords {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("points")
            .and_then(Value::as_array)
            .or_else(|| map.get("coords").and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    let mut out = ParsedCoords::default();
    for item in items {
        match structured_point(item) {
            Some(p) => out.points.push(p),
            None => out.skipped += 1,
        }
    }
    out
}

fn structured_point(item: &Value) -> Option<Vec3> {
    match item {
        Value::Array(v) if v.len() >= 3 => Some(Vec3::new(
            json_number(&v[0])?,
            json_number(&v[1])?,
            json_number(&v[2])?,
        )),
        Value::Object(map) => Some(Vec3::new(
            json_number(map.get("x")?)?,
            json_number(map.get("y")?)?,
            json_number(map.get("z")?)?,
        )),
        _ => None,
    }
}

fn json_number(v: &Value) -> Option<f32> {
    match v {
        Value::Number(n) => finite(n.as_f64()? as f32),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

#[inline]
fn finite(v: f32) -> Option<f32> {
    v.is_finite().then_some(v)
}

/// Empty fields are not numbers.
#[inline]
fn parse_number(field: &str) -> Option<f32> {
    finite(field.trim().parse::<f32>().ok()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Comma,
    Whitespace,
}

impl Delimiter {
    fn detect(line: &str) -> Self {
        if line.contains(',') {
            Self::Comma
        } else {
            Self::Whitespace
        }
    }

    fn split(self, line: &str) -> Vec<&str> {
        match self {
            Self::Comma => line.split(',').map(str::trim).collect(),
            Self::Whitespace => line.split_whitespace().collect(),
        }
    }
}

fn parse_lines(text: &str) -> ParsedCoords {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let Some((first, rest)) = lines.split_first() else {
        return ParsedCoords::default();
    };

    let lowered = first.to_lowercase();
    if lowered.contains('x') && lowered.contains('y') {
        parse_with_header(&lowered, rest)
    } else {
        parse_headerless(&lines)
    }
}

fn parse_with_header(header: &str, rows: &[&str]) -> ParsedCoords {
    let delimiter = Delimiter::detect(header);
    let columns = delimiter.split(header);
    let column = |name: &str| columns.iter().position(|c| *c == name);

    let mut out = ParsedCoords::default();

    let (Some(ix), Some(iy), Some(iz)) = (column("x"), column("y"), column("z")) else {
        log::debug!("coordinate header '{}' lacks an x/y/z column", header);
        out.skipped = rows.len();
        return out;
    };

    for row in rows {
        let fields = delimiter.split(row);
        let field = |i: usize| fields.get(i).copied().and_then(parse_number);

        match (field(ix), field(iy), field(iz)) {
            (Some(x), Some(y), Some(z)) => out.points.push(Vec3::new(x, y, z)),
            _ => out.skipped += 1,
        }
    }
    out
}

fn parse_headerless(lines: &[&str]) -> ParsedCoords {
    let mut out = ParsedCoords::default();

    for line in lines {
        let fields = Delimiter::detect(line).split(line);
        let point = match fields.as_slice() {
            [x, y, z, ..] => parse_number(x)
                .zip(parse_number(y))
                .zip(parse_number(z))
                .map(|((x, y), z)| Vec3::new(x, y, z)),
            _ => None,
        };

        match point {
            Some(p) => out.points.push(p),
            None => out.skipped += 1,
        }
    }
    out
}
