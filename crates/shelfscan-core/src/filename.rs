//! Best-effort metadata from a bare file name.
//!
//! Nothing here is authoritative. `"Frank Herbert - Dune"` and
//! `"Dune - Frank Herbert"` are indistinguishable without outside knowledge,
//! so the author/title order is delegated to an [`OrderingStrategy`] that can
//! be swapped or combined with others.

use crate::models::{MetadataRecord, non_empty};

/// Separator between the two halves of a structured file name.
pub const SEPARATOR: &str = " - ";

/// Leading words that mark the first half as a title.
pub const DEFAULT_DETERMINERS: &[&str] = &["The ", "A ", "An "];

/// Surnames common enough to identify the second half as an author.
pub const DEFAULT_SURNAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Wilson", "Anderson",
    "Taylor", "Thomas", "Moore", "Martin", "Jackson", "Thompson", "Clark", "Lewis", "Walker",
    "Hall", "Young", "King", "Wright", "Scott", "Green", "Baker", "Adams", "Nelson", "Hill",
];

/// Which half of `"part1 - part2"` holds the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOrder {
    AuthorTitle,
    TitleAuthor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderingGuess {
    pub order: NameOrder,
    /// 0.0 ..= 1.0
    pub confidence: f32,
}

/// Decides the author/title order of a split file name.
pub trait OrderingStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn guess(&self, part1: &str, part2: &str) -> OrderingGuess;
}

/// List-driven heuristic: any indicator flips the default "author - title".
#[derive(Debug, Clone)]
pub struct IndicatorOrdering {
    pub surnames: Vec<String>,
    pub determiners: Vec<String>,
    pub max_author_words: usize,
}

impl Default for IndicatorOrdering {
    fn default() -> Self {
        Self {
            surnames: DEFAULT_SURNAMES.iter().map(|s| s.to_string()).collect(),
            determiners: DEFAULT_DETERMINERS.iter().map(|s| s.to_string()).collect(),
            max_author_words: 3,
        }
    }
}

impl IndicatorOrdering {
    fn indicators(&self, part1: &str, part2: &str) -> usize {
        let has_surname = part2
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|token| self.surnames.iter().any(|s| s == token));
        let short_and_titled =
            part2.split_whitespace().count() <= self.max_author_words && is_title_case(part2);
        let starts_with_determiner = self.determiners.iter().any(|d| part1.starts_with(d.as_str()));

        [has_surname, short_and_titled, starts_with_determiner]
            .into_iter()
            .filter(|hit| *hit)
            .count()
    }
}

impl OrderingStrategy for IndicatorOrdering {
    fn name(&self) -> &str {
        "indicators"
    }

    fn guess(&self, part1: &str, part2: &str) -> OrderingGuess {
        match self.indicators(part1, part2) {
            0 => OrderingGuess {
                order: NameOrder::AuthorTitle,
                confidence: 0.5,
            },
            hits => OrderingGuess {
                order: NameOrder::TitleAuthor,
                confidence: (0.5 + 0.15 * hits as f32).min(0.95),
            },
        }
    }
}

/// Always answers the same order with low confidence.
#[derive(Debug, Clone, Copy)]
pub struct FixedOrdering(pub NameOrder);

impl OrderingStrategy for FixedOrdering {
    fn name(&self) -> &str {
        "fixed"
    }

    fn guess(&self, _part1: &str, _part2: &str) -> OrderingGuess {
        OrderingGuess {
            order: self.0,
            confidence: 0.1,
        }
    }
}

/// Asks every strategy and keeps the most confident answer; ties go to the
/// earliest strategy.
pub struct CombinedOrdering {
    strategies: Vec<Box<dyn OrderingStrategy>>,
}

impl CombinedOrdering {
    pub fn new(strategies: Vec<Box<dyn OrderingStrategy>>) -> Self {
        Self { strategies }
    }
}

impl OrderingStrategy for CombinedOrdering {
    fn name(&self) -> &str {
        "combined"
    }

    fn guess(&self, part1: &str, part2: &str) -> OrderingGuess {
        let mut best: Option<OrderingGuess> = None;
        for strategy in &self.strategies {
            let guess = strategy.guess(part1, part2);
            if best.is_none_or(|current| guess.confidence > current.confidence) {
                best = Some(guess);
            }
        }
        best.unwrap_or(OrderingGuess {
            order: NameOrder::AuthorTitle,
            confidence: 0.0,
        })
    }
}

/// Filename parser parameterised by an ordering strategy.
pub struct FilenameParser {
    ordering: Box<dyn OrderingStrategy>,
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self::new(Box::new(IndicatorOrdering::default()))
    }
}

impl FilenameParser {
    pub fn new(ordering: Box<dyn OrderingStrategy>) -> Self {
        Self { ordering }
    }

    pub fn ordering(&self) -> &dyn OrderingStrategy {
        self.ordering.as_ref()
    }

    /// Derive a partial record from a file name without its extension.
    pub fn parse(&self, base_name: &str, is_comic: bool) -> MetadataRecord {
        let name = base_name.trim();

        let mut record = if is_comic && name.matches(SEPARATOR).count() == 1 {
            parse_comic(name)
        } else if let Some((part1, part2)) = name.split_once(SEPARATOR) {
            self.parse_pair(part1.trim(), part2.trim())
        } else {
            MetadataRecord {
                title: non_empty(name),
                ..Default::default()
            }
        };

        if record.title.is_none() {
            record.title = non_empty(name);
        }
        record
    }

    fn parse_pair(&self, part1: &str, part2: &str) -> MetadataRecord {
        if part1.is_empty() || part2.is_empty() {
            return MetadataRecord {
                title: non_empty(part1).or_else(|| non_empty(part2)),
                ..Default::default()
            };
        }

        let (author, title) = match self.ordering.guess(part1, part2).order {
            NameOrder::AuthorTitle => (part1, part2),
            NameOrder::TitleAuthor => (part2, part1),
        };
        MetadataRecord {
            title: non_empty(title),
            author: non_empty(author),
            ..Default::default()
        }
    }
}

/// Parse with the default indicator heuristic.
pub fn parse_filename(base_name: &str, is_comic: bool) -> MetadataRecord {
    FilenameParser::default().parse(base_name, is_comic)
}

// `"Series - Title 001"`: trailing digits are the issue number.
fn parse_comic(name: &str) -> MetadataRecord {
    let Some((left, right)) = name.split_once(SEPARATOR) else {
        return MetadataRecord::default();
    };
    let series = non_empty(left);
    let right = right.trim();

    match split_trailing_number(right) {
        Some((prefix, issue)) => {
            let title = non_empty(prefix).or_else(|| series.clone());
            let author = series.as_ref().map(|s| format!("{s} #{issue:03}"));
            MetadataRecord {
                title,
                author,
                series,
                issue_number: Some(issue),
                ..Default::default()
            }
        }
        None => MetadataRecord {
            title: non_empty(right),
            author: series.clone(),
            series,
            ..Default::default()
        },
    }
}

fn split_trailing_number(value: &str) -> Option<(&str, u32)> {
    let start = value
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    let issue = value[start..].parse::<u32>().ok()?;
    Some((value[..start].trim(), issue))
}

/// Title case in the `str.istitle` sense: uppercase letters only follow
/// uncased characters, lowercase letters only follow cased ones, and at
/// least one cased letter is present.
pub fn is_title_case(value: &str) -> bool {
    let mut any_cased = false;
    let mut previous_cased = false;
    for c in value.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else {
            previous_cased = false;
        }
    }
    any_cased
}
