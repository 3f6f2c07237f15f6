//! Anchor substitution for the narrative template.
//!
//! Word splits a visible phrase across runs whenever formatting, spell
//! checking or revision tracking touches it, so an anchor is matched against
//! the concatenated text of a paragraph and the replacement is written into
//! the run where the anchor starts.

use formulia_config::DocumentLayout;
use formulia_engine::QuestionnaireSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub anchor: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(anchor: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            replacement: replacement.into(),
        }
    }
}

/// How placeholders in the template are found and filled.
pub trait SubstitutionStrategy {
    fn substitutions(&self) -> &[Substitution];

    /// Rewrite the text runs of one paragraph in place. Returns the number of
    /// hits per entry of [`substitutions`](Self::substitutions).
    fn apply(&self, runs: &mut [String]) -> Vec<usize>;
}

/// Literal phrases replaced verbatim, longest anchor first so an anchor that
/// contains another is never clobbered by the shorter one.
#[derive(Debug, Clone)]
pub struct LiteralAnchors {
    substitutions: Vec<Substitution>,
}

impl LiteralAnchors {
    pub fn new(mut substitutions: Vec<Substitution>) -> Self {
        substitutions.retain(|s| !s.anchor.is_empty());
        substitutions.sort_by(|a, b| b.anchor.len().cmp(&a.anchor.len()));
        Self { substitutions }
    }

    /// The anchors of the layout filled from the questionnaire.
    pub fn plan(layout: &DocumentLayout, snapshot: &QuestionnaireSnapshot) -> Self {
        let a = &layout.anchors;
        let names = snapshot.site_names();
        Self::new(vec![
            Substitution::new(&a.organization, &snapshot.organization),
            Substitution::new(&a.municipality, &snapshot.municipality),
            Substitution::new(&a.site_count, site_count_phrase(names.len())),
            Substitution::new(&a.site_names, site_list(&names)),
        ])
    }
}

impl SubstitutionStrategy for LiteralAnchors {
    fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    fn apply(&self, runs: &mut [String]) -> Vec<usize> {
        self.substitutions
            .iter()
            .map(|s| replace_across_runs(runs, &s.anchor, &s.replacement))
            .collect()
    }
}

fn replace_across_runs(runs: &mut [String], anchor: &str, replacement: &str) -> usize {
    let mut hits = 0;
    let mut from = 0;
    loop {
        let text = runs.concat();
        let Some(found) = text.get(from..).and_then(|rest| rest.find(anchor)) else {
            return hits;
        };
        let start = from + found;
        let end = start + anchor.len();

        let (first, first_off) = locate(runs, start, false);
        let (last, last_off) = locate(runs, end, true);
        if first == last {
            runs[first].replace_range(first_off..last_off, replacement);
        } else {
            let tail = runs[last][last_off..].to_string();
            runs[first].truncate(first_off);
            runs[first].push_str(replacement);
            for run in &mut runs[first + 1..last] {
                run.clear();
            }
            runs[last] = tail;
        }
        hits += 1;
        from = start + replacement.len();
    }
}

/// Run index and byte offset of `pos` in the concatenated text. A position
/// on a run boundary belongs to the following run for a start and to the
/// preceding run for an end.
fn locate(runs: &[String], pos: usize, is_end: bool) -> (usize, usize) {
    let mut base = 0;
    for (i, run) in runs.iter().enumerate() {
        let next = base + run.len();
        let inside = if is_end { pos > base && pos <= next } else { pos < next };
        if inside {
            return (i, pos - base);
        }
        base = next;
    }
    (runs.len().saturating_sub(1), runs.last().map_or(0, String::len))
}

pub fn site_count_phrase(count: usize) -> String {
    match count {
        0 => "ninguna sede educativa".to_string(),
        1 => "una sede educativa".to_string(),
        n => format!("{n} sedes educativas"),
    }
}

/// "A", "A y B", "A, B y C". The conjunction becomes "e" before an /i/
/// sound ("Soacha e Ibagué").
pub fn site_list(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => {
            let conj = if starts_with_i_sound(last) { "e" } else { "y" };
            format!("{} {conj} {last}", init.join(", "))
        }
    }
}

fn starts_with_i_sound(word: &str) -> bool {
    let lower = word.trim_start().to_lowercase();
    let rest = lower.strip_prefix('h').unwrap_or(&lower);
    let mut chars = rest.chars();
    match chars.next() {
        Some('i') | Some('í') => {
            // "hie", "hia": the i is a glide, y stays
            !(lower.starts_with('h') && matches!(chars.next(), Some('e') | Some('a')))
        }
        _ => false,
    }
}
