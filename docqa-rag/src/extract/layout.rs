//! Positioned text layout and table detection over PDF content streams.
//!
//! Text-showing operators are interpreted against the text matrix and the
//! current transformation matrix to give each run of text a page position.
//! Strings are decoded through the encoding of the font selected by `Tf`.
//! Fragments sharing a baseline form a row; a run of two or more
//! consecutive rows that each hold at least two fragments is treated as a
//! table, with columns anchored on clustered x positions.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::debug;

/// Fragments whose baselines differ by at most this many points share a row.
const ROW_TOLERANCE: f32 = 3.0;

/// Fragments whose x positions differ by at most this many points share a column.
const COLUMN_TOLERANCE: f32 = 5.0;

/// `TJ` adjustments at or below this value (thousandths of text space) read as a word gap.
const WORD_GAP: f32 = -250.0;

/// A run of text placed at a page position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Horizontal position in default user space.
    pub x: f32,
    /// Baseline position in default user space; larger is higher on the page.
    pub y: f32,
    /// The decoded text.
    pub text: String,
}

/// Text encodings of the fonts a page uses, keyed by resource name.
///
/// Strings shown in a font without a known encoding, or that the encoding
/// cannot decode, fall back to UTF-16BE (with a byte-order mark) or Latin-1.
#[derive(Debug, Default)]
pub struct PageFonts<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
}

impl<'a> PageFonts<'a> {
    /// Load the encodings of every font in the page's resources.
    ///
    /// Fonts whose encoding `lopdf` cannot build are left out.
    pub fn load(doc: &'a Document, page_id: ObjectId) -> Self {
        let mut encodings = BTreeMap::new();
        let fonts = match doc.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                debug!(error = %e, "failed to read page fonts");
                return Self { encodings };
            }
        };

        for (name, font) in fonts {
            if !font.type_is(b"Font") {
                continue;
            }
            match font.get_font_encoding(doc) {
                Ok(encoding) => {
                    encodings.insert(name, encoding);
                }
                Err(e) => {
                    let font = String::from_utf8_lossy(&name);
                    debug!(%font, error = %e, "unsupported font encoding");
                }
            }
        }
        Self { encodings }
    }

    /// Register the encoding for a font resource name.
    pub fn insert(&mut self, name: impl Into<Vec<u8>>, encoding: Encoding<'a>) {
        self.encodings.insert(name.into(), encoding);
    }

    fn decode(&self, font: Option<&[u8]>, bytes: &[u8]) -> String {
        font.and_then(|name| self.encodings.get(name))
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| decode_bytes(bytes))
    }
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied after `n`, in PDF row-vector order (`m × n`).
fn concat(m: Matrix, n: Matrix) -> Matrix {
    let [a, b, c, d, e, f] = m;
    let [na, nb, nc, nd, ne, nf] = n;
    [
        a * na + b * nc,
        a * nb + b * nd,
        c * na + d * nc,
        c * nb + d * nd,
        e * na + f * nc + ne,
        e * nb + f * nd + nf,
    ]
}

/// The parts of the graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self { ctm: IDENTITY, font: None, leading: 0.0 }
    }
}

#[derive(Debug)]
struct Interpreter<'f, 'a> {
    fonts: &'f PageFonts<'a>,
    graphics: GraphicsState,
    saved: Vec<GraphicsState>,
    matrix: Matrix,
    line_matrix: Matrix,
    /// Set when the position moved since the last shown string.
    moved: bool,
    fragments: Vec<TextFragment>,
}

impl<'f, 'a> Interpreter<'f, 'a> {
    fn new(fonts: &'f PageFonts<'a>) -> Self {
        Self {
            fonts,
            graphics: GraphicsState::default(),
            saved: Vec::new(),
            matrix: IDENTITY,
            line_matrix: IDENTITY,
            moved: true,
            fragments: Vec::new(),
        }
    }

    fn begin_text(&mut self) {
        self.matrix = IDENTITY;
        self.line_matrix = IDENTITY;
        self.moved = true;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_matrix = concat([1.0, 0.0, 0.0, 1.0, tx, ty], self.line_matrix);
        self.matrix = self.line_matrix;
        self.moved = true;
    }

    fn next_line(&mut self) {
        let leading = self.graphics.leading;
        self.translate(0.0, -leading);
    }

    fn set_matrix(&mut self, m: Matrix) {
        self.matrix = m;
        self.line_matrix = m;
        self.moved = true;
    }

    fn decode(&self, obj: &Object) -> Option<String> {
        match obj {
            Object::String(bytes, _) => Some(self.fonts.decode(self.graphics.font.as_deref(), bytes)),
            _ => None,
        }
    }

    fn decode_array(&self, items: &[Object]) -> String {
        let mut text = String::new();
        for item in items {
            match self.decode(item) {
                Some(decoded) => text.push_str(&decoded),
                None => {
                    if number(item).is_some_and(|n| n <= WORD_GAP) && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
        text
    }

    fn show(&mut self, text: Option<String>) {
        let Some(text) = text else { return };
        match self.fragments.last_mut() {
            Some(last) if !self.moved => last.text.push_str(&text),
            _ => {
                let [_, _, _, _, e, f] = concat(self.matrix, self.graphics.ctm);
                self.fragments.push(TextFragment { x: e, y: f, text });
                self.moved = false;
            }
        }
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.saved.push(self.graphics.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.graphics = state;
                    self.moved = true;
                }
            }
            "cm" => {
                if let [a, b, c, d, e, f] = numbers(operands)[..] {
                    self.graphics.ctm = concat([a, b, c, d, e, f], self.graphics.ctm);
                    self.moved = true;
                }
            }
            "BT" => self.begin_text(),
            "Tf" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.graphics.font = Some(name.to_vec());
                }
            }
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.translate(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.graphics.leading = -ty;
                    self.translate(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = numbers(operands)[..] {
                    self.set_matrix([a, b, c, d, e, f]);
                }
            }
            "TL" => {
                if let [leading] = numbers(operands)[..] {
                    self.graphics.leading = leading;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                let text = operands.first().and_then(|o| self.decode(o));
                self.show(text);
            }
            "'" => {
                self.next_line();
                let text = operands.first().and_then(|o| self.decode(o));
                self.show(text);
            }
            "\"" => {
                self.next_line();
                let text = operands.get(2).and_then(|o| self.decode(o));
                self.show(text);
            }
            "TJ" => {
                let text = match operands.first() {
                    Some(Object::Array(items)) => Some(self.decode_array(items)),
                    _ => None,
                };
                self.show(text);
            }
            _ => {}
        }
    }
}

/// Interpret content stream operations into positioned text fragments.
///
/// Positions are in default user space: the text matrix composed with the
/// current transformation matrix. Strings shown without an intervening move
/// are appended to the previous fragment.
pub fn collect_fragments(operations: &[Operation], fonts: &PageFonts<'_>) -> Vec<TextFragment> {
    let mut interpreter = Interpreter::new(fonts);
    for op in operations {
        interpreter.apply(op);
    }

    let mut fragments = interpreter.fragments;
    fragments.retain(|f| !f.text.trim().is_empty());
    fragments
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF string: UTF-16BE with a byte-order mark, otherwise Latin-1.
fn decode_bytes(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let units: Vec<u16> =
            rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Whether decoded text holds control characters other than line breaks and
/// tabs, the signature of strings decoded with the wrong encoding.
pub(crate) fn has_stray_controls(text: &str) -> bool {
    text.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

/// Drop control characters other than line breaks and tabs.
pub(crate) fn strip_stray_controls(text: &str) -> String {
    text.chars().filter(|&c| !c.is_control() || matches!(c, '\n' | '\r' | '\t')).collect()
}

/// Group fragments into rows, top of the page first, each sorted left to right.
pub(crate) fn group_rows(fragments: &[TextFragment]) -> Vec<Vec<&TextFragment>> {
    let mut sorted: Vec<&TextFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<&TextFragment>> = Vec::new();
    for fragment in sorted {
        match rows.last_mut() {
            Some(row) if (row[0].y - fragment.y).abs() <= ROW_TOLERANCE => row.push(fragment),
            _ => rows.push(vec![fragment]),
        }
    }
    for row in &mut rows {
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Render fragments as plain text: one line per row, fragments separated by spaces.
pub fn layout_text(fragments: &[TextFragment]) -> String {
    group_rows(fragments)
        .iter()
        .map(|row| row.iter().map(|f| f.text.trim()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Detect tables among positioned fragments.
///
/// A table is a maximal run of at least two consecutive rows that each
/// contain two or more fragments. Cells are aligned to column anchors
/// shared by the whole run; a row without a fragment under an anchor gets
/// a `None` cell.
pub fn detect_tables(fragments: &[TextFragment]) -> Vec<super::Table> {
    let rows = group_rows(fragments);
    let mut tables = Vec::new();
    let mut start = 0;

    while start < rows.len() {
        if rows[start].len() < 2 {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < rows.len() && rows[end].len() >= 2 {
            end += 1;
        }
        if end - start >= 2 {
            tables.push(build_table(&rows[start..end]));
        }
        start = end;
    }

    tables
}

fn build_table(rows: &[Vec<&TextFragment>]) -> super::Table {
    let anchors = column_anchors(rows);

    rows.iter()
        .map(|row| {
            let mut cells: Vec<Option<String>> = vec![None; anchors.len()];
            for fragment in row {
                let column = nearest(&anchors, fragment.x);
                let text = fragment.text.trim();
                match &mut cells[column] {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(text);
                    }
                    slot => *slot = Some(text.to_string()),
                }
            }
            cells
        })
        .collect()
}

fn column_anchors(rows: &[Vec<&TextFragment>]) -> Vec<f32> {
    let mut xs: Vec<f32> = rows.iter().flatten().map(|f| f.x).collect();
    xs.sort_by(f32::total_cmp);

    let mut anchors: Vec<f32> = Vec::new();
    let mut last = f32::NEG_INFINITY;
    for x in xs {
        if x - last > COLUMN_TOLERANCE {
            anchors.push(x);
        }
        last = x;
    }
    anchors
}

fn nearest(anchors: &[f32], x: f32) -> usize {
    anchors
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
