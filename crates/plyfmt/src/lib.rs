//! PLY: dependency-free reader/writer for scanned point clouds.
//!
//! - Reads `ascii 1.0`, `binary_little_endian 1.0` and `binary_big_endian 1.0`.
//! - Extracts vertex positions (`x`,`y`,`z`), optional colors
//!   (`red`/`green`/`blue` or `diffuse_*`) and optional normals (`nx`,`ny`,`nz`).
//! - Optional `face` element: polygon lists are fan-triangulated.
//! - Any other element is parsed and skipped.
//! - Writes binary little-endian files (positions, optional normals, optional
//!   u8 colors, optional triangle faces).
//!
//! Header layout:
//!   ply
//!   format <ascii|binary_little_endian|binary_big_endian> 1.0
//!   comment ... | obj_info ...
//!   element <name> <count>
//!   property <type> <name>
//!   property list <count type> <item type> <name>
//!   ...
//!   end_header
//!
//! Scalar types: char/int8, uchar/uint8, short/int16, ushort/uint16,
//! int/int32, uint/uint32, float/float32, double/float64.

use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

pub const PLY_MAGIC: &str = "ply";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }

    /// Encoded size in bytes for the binary encodings.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Divisor that maps an integer color channel onto [0, 1]. Floats are
    /// already normalized.
    #[inline]
    pub fn color_divisor(self) -> f64 {
        match self {
            Self::I8 => i8::MAX as f64,
            Self::U8 => u8::MAX as f64,
            Self::I16 => i16::MAX as f64,
            Self::U16 => u16::MAX as f64,
            Self::I32 => i32::MAX as f64,
            Self::U32 => u32::MAX as f64,
            Self::F32 | Self::F64 => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone)]
pub struct ElementDef {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDef>,
}

impl ElementDef {
    fn index_of(&self, names: &[&str]) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| names.contains(&p.name.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct PlyHeader {
    pub encoding: PlyEncoding,
    pub elements: Vec<ElementDef>,
    pub comments: Vec<String>,
}

impl PlyHeader {
    pub fn element(&self, name: &str) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Decoded point cloud. `colors` and `normals`, when present, are parallel to
/// `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlyCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Option<Vec<[f32; 3]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// Triangulated faces (indices into `positions`).
    pub faces: Vec<[u32; 3]>,
}

impl PlyCloud {
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[inline(always)]
fn need(buf: &[u8], want: usize) -> io::Result<()> {
    if buf.len() < want {
        Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated PLY body"))
    } else {
        Ok(())
    }
}

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    need(buf, n)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

#[inline]
fn decode_scalar(ty: ScalarType, b: &[u8], big_endian: bool) -> f64 {
    macro_rules! num {
        ($t:ty, $n:expr) => {{
            let mut raw = [0u8; $n];
            raw.copy_from_slice(b);
            if big_endian {
                <$t>::from_be_bytes(raw) as f64
            } else {
                <$t>::from_le_bytes(raw) as f64
            }
        }};
    }

    match ty {
        ScalarType::I8 => b[0] as i8 as f64,
        ScalarType::U8 => b[0] as f64,
        ScalarType::I16 => num!(i16, 2),
        ScalarType::U16 => num!(u16, 2),
        ScalarType::I32 => num!(i32, 4),
        ScalarType::U32 => num!(u32, 4),
        ScalarType::F32 => num!(f32, 4),
        ScalarType::F64 => num!(f64, 8),
    }
}

/// Value source over the body, shared by all three encodings.
enum ValueReader<'a> {
    Ascii {
        tokens: std::str::SplitAsciiWhitespace<'a>,
        body_len: usize,
    },
    Binary { buf: &'a [u8], big_endian: bool },
}

impl<'a> ValueReader<'a> {
    fn new(encoding: PlyEncoding, body: &'a [u8]) -> io::Result<Self> {
        Ok(match encoding {
            PlyEncoding::Ascii => {
                let text = std::str::from_utf8(body).map_err(|_| bad("ascii PLY body is not UTF-8"))?;
                Self::Ascii {
                    tokens: text.split_ascii_whitespace(),
                    body_len: body.len(),
                }
            }
            PlyEncoding::BinaryLittleEndian => Self::Binary { buf: body, big_endian: false },
            PlyEncoding::BinaryBigEndian => Self::Binary { buf: body, big_endian: true },
        })
    }

    fn read(&mut self, ty: ScalarType) -> io::Result<f64> {
        match self {
            Self::Ascii { tokens, .. } => {
                let token = tokens
                    .next()
                    .ok_or_else(|| io::Error::new(ErrorKind::UnexpectedEof, "truncated PLY body"))?;
                token
                    .parse::<f64>()
                    .map_err(|_| bad(&format!("invalid ascii value '{}'", token)))
            }
            Self::Binary { buf, big_endian } => {
                let b = take(buf, ty.size())?;
                Ok(decode_scalar(ty, b, *big_endian))
            }
        }
    }

    /// Upper bound on how many records of `element` the body can still hold.
    /// Header counts are untrusted, so preallocation goes through this.
    fn capacity_for(&self, element: &ElementDef) -> usize {
        let (available, per_record) = match self {
            // Every ascii value is at least one digit plus a separator.
            Self::Ascii { body_len, .. } => (*body_len, 2 * element.properties.len()),
            Self::Binary { buf, .. } => (
                buf.len(),
                element
                    .properties
                    .iter()
                    .map(|p| match p.kind {
                        PropertyKind::Scalar(ty) => ty.size(),
                        PropertyKind::List { count, .. } => count.size(),
                    })
                    .sum(),
            ),
        };
        element.count.min(available / per_record.max(1))
    }

    fn read_count(&mut self, ty: ScalarType) -> io::Result<usize> {
        let v = self.read(ty)?;
        if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
            return Err(bad("invalid list length"));
        }
        Ok(v as usize)
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &line[..end]
}

/// Splits `buf` at the `end_header` line. Returns the header text and the body.
fn split_header(buf: &[u8]) -> io::Result<(&str, &[u8])> {
    let mut start = 0usize;

    while start < buf.len() {
        let newline = buf[start..].iter().position(|&b| b == b'\n').map(|i| start + i);
        let line_end = newline.unwrap_or(buf.len());

        if trim_line(&buf[start..line_end]) == b"end_header" {
            let header = std::str::from_utf8(&buf[..start]).map_err(|_| bad("PLY header is not ASCII"))?;
            let body_start = newline.map_or(buf.len(), |i| i + 1);
            return Ok((header, &buf[body_start..]));
        }

        match newline {
            Some(i) => start = i + 1,
            None => break,
        }
    }

    Err(bad("missing end_header"))
}

fn scalar(name: &str) -> io::Result<ScalarType> {
    ScalarType::from_name(name).ok_or_else(|| bad(&format!("unknown PLY scalar type '{}'", name)))
}

/// Parse the header portion of a PLY buffer. Returns the header and the body slice.
pub fn parse_header(buf: &[u8]) -> io::Result<(PlyHeader, &[u8])> {
    let (text, body) = split_header(buf)?;
    let mut lines = text.lines().map(str::trim);

    if lines.next() != Some(PLY_MAGIC) {
        return Err(bad("bad PLY magic"));
    }

    let mut encoding = None;
    let mut elements: Vec<ElementDef> = Vec::new();
    let mut comments = Vec::new();

    for line in lines {
        let mut words = line.split_ascii_whitespace();
        let Some(keyword) = words.next() else {
            continue;
        };

        match keyword {
            "format" => {
                encoding = Some(match words.next() {
                    Some("ascii") => PlyEncoding::Ascii,
                    Some("binary_little_endian") => PlyEncoding::BinaryLittleEndian,
                    Some("binary_big_endian") => PlyEncoding::BinaryBigEndian,
                    other => return Err(bad(&format!("unsupported PLY format {:?}", other))),
                });
            }
            "comment" | "obj_info" => {
                comments.push(line[keyword.len()..].trim().to_string());
            }
            "element" => {
                let name = words.next().ok_or_else(|| bad("element without name"))?;
                let count = words
                    .next()
                    .and_then(|c| c.parse::<usize>().ok())
                    .ok_or_else(|| bad("element without valid count"))?;
                elements.push(ElementDef {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| bad("property declared before any element"))?;
                let ty = words.next().ok_or_else(|| bad("property without type"))?;
                let kind = if ty == "list" {
                    let count = scalar(words.next().ok_or_else(|| bad("list without count type"))?)?;
                    let item = scalar(words.next().ok_or_else(|| bad("list without item type"))?)?;
                    PropertyKind::List { count, item }
                } else {
                    PropertyKind::Scalar(scalar(ty)?)
                };
                let name = words.next().ok_or_else(|| bad("property without name"))?;
                element.properties.push(PropertyDef {
                    name: name.to_string(),
                    kind,
                });
            }
            other => return Err(bad(&format!("unknown PLY header keyword '{}'", other))),
        }
    }

    let encoding = encoding.ok_or_else(|| bad("missing PLY format line"))?;

    Ok((
        PlyHeader {
            encoding,
            elements,
            comments,
        },
        body,
    ))
}

/// Reads one element record into `row`. Scalars occupy one slot each; list
/// properties are stored in `lists` keyed by their position in the record.
fn read_record(
    reader: &mut ValueReader<'_>,
    element: &ElementDef,
    row: &mut Vec<f64>,
    lists: &mut Vec<Vec<f64>>,
) -> io::Result<()> {
    row.clear();
    for (slot, property) in element.properties.iter().enumerate() {
        match property.kind {
            PropertyKind::Scalar(ty) => row.push(reader.read(ty)?),
            PropertyKind::List { count, item } => {
                let n = reader.read_count(count)?;
                let list = &mut lists[slot];
                list.clear();
                for _ in 0..n {
                    list.push(reader.read(item)?);
                }
                row.push(f64::NAN);
            }
        }
    }
    Ok(())
}

fn read_vertices(reader: &mut ValueReader<'_>, element: &ElementDef, cloud: &mut PlyCloud) -> io::Result<()> {
    let xyz = match (
        element.index_of(&["x"]),
        element.index_of(&["y"]),
        element.index_of(&["z"]),
    ) {
        (Some(x), Some(y), Some(z)) => [x, y, z],
        _ => return Err(bad("vertex element lacks x/y/z")),
    };

    let rgb = match (
        element.index_of(&["red", "diffuse_red", "r"]),
        element.index_of(&["green", "diffuse_green", "g"]),
        element.index_of(&["blue", "diffuse_blue", "b"]),
    ) {
        (Some(r), Some(g), Some(b)) => Some([r, g, b]),
        _ => None,
    };
    let rgb_divisor = rgb.map(|idx| {
        idx.map(|i| match element.properties[i].kind {
            PropertyKind::Scalar(ty) => ty.color_divisor(),
            PropertyKind::List { .. } => 1.0,
        })
    });

    let nrm = match (
        element.index_of(&["nx"]),
        element.index_of(&["ny"]),
        element.index_of(&["nz"]),
    ) {
        (Some(x), Some(y), Some(z)) => Some([x, y, z]),
        _ => None,
    };

    let capacity = reader.capacity_for(element);
    let mut positions = Vec::with_capacity(capacity);
    let mut colors = rgb.map(|_| Vec::with_capacity(capacity));
    let mut normals = nrm.map(|_| Vec::with_capacity(capacity));

    let mut row = Vec::with_capacity(element.properties.len());
    let mut lists = vec![Vec::new(); element.properties.len()];

    for _ in 0..element.count {
        read_record(reader, element, &mut row, &mut lists)?;

        positions.push(xyz.map(|i| row[i] as f32));

        if let (Some(idx), Some(div), Some(out)) = (rgb, rgb_divisor, colors.as_mut()) {
            out.push([
                (row[idx[0]] / div[0]) as f32,
                (row[idx[1]] / div[1]) as f32,
                (row[idx[2]] / div[2]) as f32,
            ]);
        }

        if let (Some(idx), Some(out)) = (nrm, normals.as_mut()) {
            out.push(idx.map(|i| row[i] as f32));
        }
    }

    cloud.positions = positions;
    cloud.colors = colors;
    cloud.normals = normals;
    Ok(())
}

fn read_faces(
    reader: &mut ValueReader<'_>,
    element: &ElementDef,
    vertex_count: usize,
    faces: &mut Vec<[u32; 3]>,
) -> io::Result<()> {
    let list_slot = element
        .properties
        .iter()
        .position(|p| {
            matches!(p.kind, PropertyKind::List { .. })
                && (p.name == "vertex_indices" || p.name == "vertex_index")
        })
        .ok_or_else(|| bad("face element lacks vertex_indices"))?;

    let mut row = Vec::with_capacity(element.properties.len());
    let mut lists = vec![Vec::new(); element.properties.len()];

    for _ in 0..element.count {
        read_record(reader, element, &mut row, &mut lists)?;

        let polygon = &lists[list_slot];
        let mut indices = Vec::with_capacity(polygon.len());
        for &v in polygon {
            if !(0.0..vertex_count as f64).contains(&v) {
                return Err(bad("face index out of range"));
            }
            if v.fract() != 0.0 {
                return Err(bad("fractional face index"));
            }
            indices.push(v as u32);
        }

        // Fan triangulation; degenerate polygons (< 3 corners) are ignored.
        for k in 1..indices.len().saturating_sub(1) {
            faces.push([indices[0], indices[k], indices[k + 1]]);
        }
    }

    Ok(())
}

fn skip_element(reader: &mut ValueReader<'_>, element: &ElementDef) -> io::Result<()> {
    // Property-less records occupy no bytes, whatever the count says.
    if element.properties.is_empty() {
        return Ok(());
    }
    let mut row = Vec::with_capacity(element.properties.len());
    let mut lists = vec![Vec::new(); element.properties.len()];
    for _ in 0..element.count {
        read_record(reader, element, &mut row, &mut lists)?;
    }
    Ok(())
}

/// Parse PLY from a contiguous byte slice. This is the single source of truth for parsing.
pub fn parse_ply_bytes(buf: &[u8]) -> io::Result<PlyCloud> {
    let (header, body) = parse_header(buf)?;

    if header.element("vertex").is_none() {
        return Err(bad("PLY has no vertex element"));
    }
    let vertex_count = header.element("vertex").map_or(0, |e| e.count);

    let mut reader = ValueReader::new(header.encoding, body)?;
    let mut cloud = PlyCloud::default();

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => read_vertices(&mut reader, element, &mut cloud)?,
            "face" => read_faces(&mut reader, element, vertex_count, &mut cloud.faces)?,
            _ => skip_element(&mut reader, element)?,
        }
    }

    Ok(cloud)
}

/// Fast path: prefer mmap; fall back to a single read.
#[cfg(feature = "mmap")]
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<PlyCloud> {
    let file = File::open(path)?;
    let map = unsafe { memmap2::MmapOptions::new().map(&file)? };
    parse_ply_bytes(&map)
}

#[cfg(not(feature = "mmap"))]
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<PlyCloud> {
    let bytes = std::fs::read(path)?;
    parse_ply_bytes(&bytes)
}

/// Serialize `cloud` as `binary_little_endian 1.0`.
pub fn write_binary<W: Write>(w: &mut W, cloud: &PlyCloud) -> io::Result<()> {
    let count = cloud.positions.len();

    if cloud.colors.as_ref().is_some_and(|c| c.len() != count) {
        return Err(bad("colors length != positions length"));
    }

    if cloud.normals.as_ref().is_some_and(|n| n.len() != count) {
        return Err(bad("normals length != positions length"));
    }

    writeln!(w, "{}", PLY_MAGIC)?;
    writeln!(w, "format binary_little_endian 1.0")?;
    writeln!(w, "comment written by plyfmt")?;
    writeln!(w, "element vertex {}", count)?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;

    if cloud.normals.is_some() {
        writeln!(w, "property float nx")?;
        writeln!(w, "property float ny")?;
        writeln!(w, "property float nz")?;
    }

    if cloud.colors.is_some() {
        writeln!(w, "property uchar red")?;
        writeln!(w, "property uchar green")?;
        writeln!(w, "property uchar blue")?;
    }

    if !cloud.faces.is_empty() {
        writeln!(w, "element face {}", cloud.faces.len())?;
        writeln!(w, "property list uchar int vertex_indices")?;
    }

    writeln!(w, "end_header")?;

    for (index, position) in cloud.positions.iter().enumerate() {
        write_f32x3(w, position)?;

        if let Some(normals) = cloud.normals.as_ref() {
            write_f32x3(w, &normals[index])?;
        }

        if let Some(colors) = cloud.colors.as_ref() {
            let c = colors[index];
            w.write_all(&[quantize_channel(c[0]), quantize_channel(c[1]), quantize_channel(c[2])])?;
        }
    }

    for face in &cloud.faces {
        w.write_all(&[3u8])?;
        for &i in face {
            w.write_all(&(i as i32).to_le_bytes())?;
        }
    }

    Ok(())
}

pub fn write_file<P: AsRef<Path>>(path: P, cloud: &PlyCloud) -> io::Result<()> {
    let mut file = io::BufWriter::new(File::create(path)?);
    write_binary(&mut file, cloud)?;
    file.flush()?;
    Ok(())
}

#[inline]
pub fn quantize_channel(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn write_f32x3<W: Write>(w: &mut W, v: &[f32; 3]) -> io::Result<()> {
    w.write_all(&v[0].to_le_bytes())?;
    w.write_all(&v[1].to_le_bytes())?;
    w.write_all(&v[2].to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_COLORED: &str = "ply\n\
        format ascii 1.0\n\
        comment captured on site\n\
        element vertex 3\n\
        property float x\n\
        property float y\n\
        property float z\n\
        property uchar red\n\
        property uchar green\n\
        property uchar blue\n\
        end_header\n\
        0 0 0 255 0 0\n\
        1 2 3 0 255 0\n\
        -1.5 0.25 4 0 0 255\n";

    #[test]
    fn parses_ascii_with_colors() {
        let cloud = parse_ply_bytes(ASCII_COLORED.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.positions[2], [-1.5, 0.25, 4.0]);

        let colors = cloud.colors.unwrap();
        assert_eq!(colors[0], [1.0, 0.0, 0.0]);
        assert_eq!(colors[1], [0.0, 1.0, 0.0]);
        assert!(cloud.normals.is_none());
        assert!(cloud.faces.is_empty());
    }

    #[test]
    fn header_keeps_comments_and_encoding() {
        let (header, body) = parse_header(ASCII_COLORED.as_bytes()).unwrap();
        assert_eq!(header.encoding, PlyEncoding::Ascii);
        assert_eq!(header.comments, vec!["captured on site".to_string()]);
        assert_eq!(header.element("vertex").unwrap().properties.len(), 6);
        assert!(body.starts_with(b"0 0 0"));
    }

    #[test]
    fn crlf_header_is_accepted() {
        let text = "ply\r\nformat ascii 1.0\r\nelement vertex 1\r\nproperty float x\r\nproperty float y\r\nproperty float z\r\nend_header\r\n1 2 3\r\n";
        let cloud = parse_ply_bytes(text.as_bytes()).unwrap();
        assert_eq!(cloud.positions, vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn binary_written_file_reads_back() {
        let cloud = PlyCloud {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            colors: Some(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            faces: vec![[0, 1, 2]],
        };

        let mut bytes = Vec::new();
        write_binary(&mut bytes, &cloud).unwrap();

        assert_eq!(parse_ply_bytes(&bytes).unwrap(), cloud);
    }

    #[test]
    fn parses_big_endian_doubles_and_skips_unknown_elements() {
        let mut buf = b"ply\nformat binary_big_endian 1.0\n\
            element vertex 2\n\
            property double x\nproperty double y\nproperty double z\n\
            element edge 1\n\
            property int vertex1\nproperty int vertex2\n\
            end_header\n"
            .to_vec();
        for v in [1.0f64, 2.0, 3.0, -4.0, 5.5, 6.0] {
            buf.extend_from_slice(&v.to_be_bytes());
        }
        buf.extend_from_slice(&0i32.to_be_bytes());
        buf.extend_from_slice(&1i32.to_be_bytes());

        let cloud = parse_ply_bytes(&buf).unwrap();
        assert_eq!(cloud.positions, vec![[1.0, 2.0, 3.0], [-4.0, 5.5, 6.0]]);
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 4\nproperty float x\nproperty float y\nproperty float z\n\
            element face 1\nproperty list uchar int vertex_indices\n\
            end_header\n\
            0 0 0\n1 0 0\n1 1 0\n0 1 0\n\
            4 0 1 2 3\n";
        let cloud = parse_ply_bytes(text.as_bytes()).unwrap();
        assert_eq!(cloud.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_ply_bytes(b"").is_err());
        assert!(parse_ply_bytes(b"obj\nformat ascii 1.0\nend_header\n").is_err());
        assert!(parse_ply_bytes(b"ply\nformat ascii 1.0\nelement vertex 1\n").is_err());
        assert!(parse_ply_bytes(b"ply\nformat xml 1.0\nend_header\n").is_err());
        assert!(parse_ply_bytes(b"ply\nformat ascii 1.0\nproperty float x\nend_header\n").is_err());

        let no_xyz = b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1\n";
        assert!(parse_ply_bytes(no_xyz).is_err());
    }

    #[test]
    fn truncated_binary_body_is_an_error() {
        let mut buf = b"ply\nformat binary_little_endian 1.0\nelement vertex 2\n\
            property float x\nproperty float y\nproperty float z\nend_header\n"
            .to_vec();
        buf.extend_from_slice(&[0u8; 12]);

        let err = parse_ply_bytes(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn out_of_range_face_index_is_an_error() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 1\nproperty float x\nproperty float y\nproperty float z\n\
            element face 1\nproperty list uchar int vertex_indices\n\
            end_header\n0 0 0\n3 0 1 2\n";
        assert!(parse_ply_bytes(text.as_bytes()).is_err());
    }

    #[test]
    fn oversized_vertex_count_is_rejected_not_allocated() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 18446744073709551615\n\
            property float x\nproperty float y\nproperty float z\n\
            end_header\n1 2 3\n";
        let err = parse_ply_bytes(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);

        let mut buf = b"ply\nformat binary_little_endian 1.0\nelement vertex 8589934592\n\
            property float x\nproperty float y\nproperty float z\n\
            property uchar red\nproperty uchar green\nproperty uchar blue\n\
            property float nx\nproperty float ny\nproperty float nz\nend_header\n"
            .to_vec();
        buf.extend_from_slice(&[0u8; 27]);
        let err = parse_ply_bytes(&buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn empty_element_with_huge_count_is_skipped() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 1\nproperty float x\nproperty float y\nproperty float z\n\
            element marker 18446744073709551615\n\
            end_header\n1 2 3\n";
        let cloud = parse_ply_bytes(text.as_bytes()).unwrap();
        assert_eq!(cloud.positions, vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn fractional_face_index_is_an_error() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 3\nproperty float x\nproperty float y\nproperty float z\n\
            element face 1\nproperty list uchar int vertex_indices\n\
            end_header\n0 0 0\n1 0 0\n0 1 0\n3 0 1.5 2\n";
        let err = parse_ply_bytes(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn write_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.ply");
        let cloud = PlyCloud {
            positions: vec![[0.5, -0.5, 2.0]],
            ..Default::default()
        };

        write_file(&path, &cloud).unwrap();
        assert_eq!(read_file(&path).unwrap(), cloud);
    }
}
