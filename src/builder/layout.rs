//! Root layout grammar.
//!
//! A growth layout names, per tissue border, where artery and vein roots
//! enter the lattice. Two spellings are accepted:
//!
//! - a layout code (`S`, `A`, `R` or `L`) plus one setup string per border,
//!   e.g. code `S` with left setup `"50A"`;
//! - free text with border and kind keywords, e.g.
//!   `"LEFT single 50A RIGHT single 50V"`.
//!
//! Parsing only produces [`RootClause`]s. Turning clauses into lattice
//! positions draws random numbers and happens in [`place_roots`].

use rand::Rng;

use crate::geometry::{Border, EdgeDirection, RootSite, SiteGeometry};
use crate::graph::{EdgeLevel, EdgeType};

/// How roots are spread along a border
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// One root at a given position and type
    Single,
    /// Evenly spaced roots alternating artery and vein
    Alternate,
    /// Roots at random positions with random types
    Random,
    /// One root followed by a random offset line into the tissue
    Line,
}

impl RootKind {
    /// Parses a one-letter layout code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(RootKind::Single),
            "A" => Some(RootKind::Alternate),
            "R" => Some(RootKind::Random),
            "L" => Some(RootKind::Line),
            _ => None,
        }
    }

    /// Parses the keyword used in free-text layouts
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "single" => Some(RootKind::Single),
            "alternate" => Some(RootKind::Alternate),
            "random" => Some(RootKind::Random),
            "line" => Some(RootKind::Line),
            _ => None,
        }
    }
}

fn border_from_keyword(word: &str) -> Option<Border> {
    match word.to_ascii_uppercase().as_str() {
        "LEFT" => Some(Border::Left),
        "TOP" => Some(Border::Top),
        "RIGHT" => Some(Border::Right),
        "BOTTOM" => Some(Border::Bottom),
        _ => None,
    }
}

/// One parsed root request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RootClause {
    Single { percent: u32, edge_type: EdgeType },
    Alternate { count: u32 },
    Random { count: u32 },
    Line { percent: u32, edge_type: EdgeType, fraction: u32 },
}

/// Root request tied to the border it grows from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderClause {
    pub border: Border,
    pub clause: RootClause,
}

/// A root ready to be added to the graph
#[derive(Debug, Clone)]
pub struct RootPlan {
    pub site: RootSite,
    /// Offset path for line roots; `None` grows a tripod instead
    pub offsets: Option<Vec<EdgeDirection>>,
}

// ----------------------------------------------------------------------
// Scanning
// ----------------------------------------------------------------------

/// Number of consecutive ASCII digits at `start`, at most `max`
fn digit_run(bytes: &[u8], start: usize, max: usize) -> usize {
    bytes[start.min(bytes.len())..]
        .iter()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count()
}

fn number(bytes: &[u8], start: usize, len: usize) -> Option<u32> {
    std::str::from_utf8(&bytes[start..start + len]).ok()?.parse().ok()
}

fn type_code(byte: u8) -> Option<EdgeType> {
    match byte {
        b'A' | b'a' => Some(EdgeType::Artery),
        b'V' | b'v' => Some(EdgeType::Vein),
        _ => None,
    }
}

/// Matches `digits{1,3} type` at `start`, backtracking over the digit count
fn match_typed(bytes: &[u8], start: usize) -> Option<(u32, EdgeType, usize)> {
    let run = digit_run(bytes, start, 3);
    (1..=run).rev().find_map(|len| {
        let edge_type = type_code(*bytes.get(start + len)?)?;
        Some((number(bytes, start, len)?, edge_type, start + len + 1))
    })
}

/// Tries to match one clause of the given kind at `start`
fn match_at(bytes: &[u8], start: usize, kind: RootKind) -> Option<(RootClause, usize)> {
    match kind {
        RootKind::Single => {
            let (percent, edge_type, end) = match_typed(bytes, start)?;
            Some((RootClause::Single { percent, edge_type }, end))
        }
        RootKind::Alternate | RootKind::Random => {
            let len = digit_run(bytes, start, usize::MAX);
            if len == 0 {
                return None;
            }
            let count = number(bytes, start, len)?;
            let clause = if kind == RootKind::Alternate {
                RootClause::Alternate { count }
            } else {
                RootClause::Random { count }
            };
            Some((clause, start + len))
        }
        RootKind::Line => {
            let (percent, edge_type, end) = match_typed(bytes, start)?;
            let len = digit_run(bytes, end, 3);
            if len == 0 {
                return None;
            }
            let fraction = number(bytes, end, len)?;
            Some((RootClause::Line { percent, edge_type, fraction }, end + len))
        }
    }
}

/// Every clause of one kind found in a border setup string, left to right
pub fn parse_clauses(kind: RootKind, setup: &str) -> Vec<RootClause> {
    let bytes = setup.as_bytes();
    let mut clauses = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match match_at(bytes, i, kind) {
            Some((clause, end)) => {
                clauses.push(clause);
                i = end;
            }
            None => i += 1,
        }
    }

    clauses
}

/// Parses the code form: one kind for all borders, setups given in border
/// order left, top, right, bottom. An unknown code yields no clauses.
pub fn parse_code(code: &str, setups: [&str; 4]) -> Vec<BorderClause> {
    let Some(kind) = RootKind::from_code(code) else {
        log::warn!("Unknown root layout code {:?}, no roots placed", code);
        return Vec::new();
    };

    let mut clauses = Vec::new();
    for (border, setup) in Border::ALL.into_iter().zip(setups) {
        let found = parse_clauses(kind, setup);
        if found.is_empty() && !setup.trim().is_empty() {
            log::warn!("Root setup {:?} for {:?} matches no {:?} clause", setup, border, kind);
        }
        clauses.extend(found.into_iter().map(|clause| BorderClause { border, clause }));
    }
    clauses
}

/// Parses the free-text form, e.g. `"LEFT single 50A RIGHT alternate 3"`.
///
/// Clauses are returned grouped by border in the order left, top, right,
/// bottom; within a border they keep their written order. Tokens that do
/// not fit the grammar are skipped with a warning.
pub fn parse_layout(text: &str) -> Vec<BorderClause> {
    let mut found: Vec<BorderClause> = Vec::new();
    let mut border: Option<Border> = None;
    let mut kind: Option<RootKind> = None;

    for token in text.split_whitespace() {
        if let Some(b) = border_from_keyword(token) {
            border = Some(b);
            kind = None;
            continue;
        }
        if let Some(k) = RootKind::from_keyword(token) {
            kind = Some(k);
            continue;
        }

        let (Some(b), Some(k)) = (border, kind) else {
            log::warn!("Layout token {:?} has no border and kind before it", token);
            continue;
        };

        let clauses = parse_clauses(k, token);
        if clauses.is_empty() {
            log::warn!("Layout token {:?} matches no {:?} clause for {:?}", token, k, b);
        }
        found.extend(clauses.into_iter().map(|clause| BorderClause { border: b, clause }));
    }

    Border::ALL
        .iter()
        .flat_map(|&b| found.iter().filter(move |c| c.border == b).copied())
        .collect()
}

// ----------------------------------------------------------------------
// Placement
// ----------------------------------------------------------------------

/// Resolves clauses into root placements at the coarse growth scale.
///
/// Random and line clauses draw from `rng`, in clause order.
pub fn place_roots(clauses: &[BorderClause], geometry: &dyn SiteGeometry, rng: &mut impl Rng) -> Vec<RootPlan> {
    let scale = EdgeLevel::Level1.scale();
    let mut plans = Vec::new();

    for &BorderClause { border, clause } in clauses {
        match clause {
            RootClause::Single { percent, edge_type } => {
                let site = geometry.root_site(border, percent as f64 / 100.0, edge_type, scale);
                plans.push(RootPlan { site, offsets: None });
            }
            RootClause::Alternate { count } => {
                let inc = 100.0 / count as f64;
                for i in 0..count {
                    let percent = i as f64 * inc + inc / 2.0;
                    let edge_type = if i % 2 == 0 { EdgeType::Artery } else { EdgeType::Vein };
                    let site = geometry.root_site(border, percent / 100.0, edge_type, scale);
                    plans.push(RootPlan { site, offsets: None });
                }
            }
            RootClause::Random { count } => {
                for _ in 0..count {
                    let percent = rng.gen_range(0..100) as f64;
                    let edge_type = if rng.gen::<f64>() < 0.5 { EdgeType::Artery } else { EdgeType::Vein };
                    let site = geometry.root_site(border, percent / 100.0, edge_type, scale);
                    plans.push(RootPlan { site, offsets: None });
                }
            }
            RootClause::Line { percent, edge_type, fraction } => {
                let site = geometry.root_site(border, percent as f64 / 100.0, edge_type, scale);
                let offsets = geometry.line_offsets(border, fraction as f64 / 100.0, scale, rng);
                plans.push(RootPlan { site, offsets: Some(offsets) });
            }
        }
    }

    plans
}
