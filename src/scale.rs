use serde::Serialize;

use crate::error::GradeError;
use crate::models::{GradeScaleEntry, LetterGrade};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Whether an entry ending at `lower_max` joins the next entry starting at
/// `upper_min`: either they share the boundary ("[70,80)" then "[80,90)") or
/// both are whole numbers one apart ("80-89" then "90-100").
fn is_contiguous(lower_max: f64, upper_min: f64) -> bool {
    let distance = upper_min - lower_max;
    distance == 0.0 || (distance == 1.0 && lower_max.fract() == 0.0 && upper_min.fract() == 0.0)
}

pub fn check_score(score: f64) -> Result<(), GradeError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(GradeError::Validation(format!(
            "score must be between 0 and 100, got {score}"
        )))
    }
}

/// Map a score onto `scale`, which must be sorted descending by `min_score`.
///
/// The first entry whose `min_score` the score reaches wins. A score that
/// lands in a gap of a malformed scale is a configuration error rather than
/// a silent fall-through to the next lower grade.
pub fn letter_and_point(score: f64, scale: &[GradeScaleEntry]) -> Result<LetterGrade, GradeError> {
    check_score(score)?;

    for (index, entry) in scale.iter().enumerate() {
        if score < entry.min_score {
            continue;
        }

        let covered = score <= entry.max_score
            || index
                .checked_sub(1)
                .map(|upper| is_contiguous(entry.max_score, scale[upper].min_score))
                .unwrap_or(false);

        if !covered {
            return Err(GradeError::Configuration(format!(
                "score {score} is not covered by the grade scale (falls above '{}' which ends at {})",
                entry.label, entry.max_score
            )));
        }

        return Ok(LetterGrade {
            label: entry.label.clone(),
            grade_point: entry.grade_point,
        });
    }

    Err(GradeError::Configuration(format!(
        "score {score} is below every entry of the grade scale"
    )))
}

/// Check that `entries` partition [0, 100]. Returns every problem found,
/// not just the first.
pub fn validate_scale(entries: &[GradeScaleEntry]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if entries.is_empty() {
        errors.push("scale: must contain at least one entry".to_string());
        return Err(errors);
    }

    for (i, entry) in entries.iter().enumerate() {
        if entry.label.trim().is_empty() {
            errors.push(format!("scale[{i}].label: must not be blank"));
        }
        if entry.min_score > entry.max_score {
            errors.push(format!(
                "scale[{i}] '{}': min_score {} is above max_score {}",
                entry.label, entry.min_score, entry.max_score
            ));
        }
        if entry.min_score < MIN_SCORE || entry.max_score > MAX_SCORE {
            errors.push(format!(
                "scale[{i}] '{}': range {}-{} is outside 0-100",
                entry.label, entry.min_score, entry.max_score
            ));
        }
        if entry.grade_point < 0.0 || !entry.grade_point.is_finite() {
            errors.push(format!(
                "scale[{i}] '{}': grade_point must be a non-negative number",
                entry.label
            ));
        }
    }

    for (i, entry) in entries.iter().enumerate() {
        let label = entry.label.trim();
        if label.is_empty() {
            continue;
        }
        if let Some(first) = entries[..i]
            .iter()
            .position(|earlier| earlier.label.trim().eq_ignore_ascii_case(label))
        {
            errors.push(format!(
                "scale[{i}] '{}': duplicates the label of scale[{first}]",
                entry.label
            ));
        }
    }

    for (i, pair) in entries.windows(2).enumerate() {
        let (upper, lower) = (&pair[0], &pair[1]);
        if lower.min_score >= upper.min_score {
            errors.push(format!(
                "scale[{}] '{}': entries must be sorted descending by min_score ({} follows {})",
                i + 1,
                lower.label,
                lower.min_score,
                upper.min_score
            ));
            continue;
        }

        let distance = upper.min_score - lower.max_score;
        if distance < 0.0 {
            errors.push(format!(
                "scale: '{}' ({}-{}) overlaps '{}' ({}-{})",
                lower.label,
                lower.min_score,
                lower.max_score,
                upper.label,
                upper.min_score,
                upper.max_score
            ));
        } else if !is_contiguous(lower.max_score, upper.min_score) {
            errors.push(format!(
                "scale: gap between {} ('{}') and {} ('{}')",
                lower.max_score, lower.label, upper.min_score, upper.label
            ));
        }
    }

    if let Some(highest) = entries.first() {
        if highest.max_score < MAX_SCORE {
            errors.push(format!(
                "scale: highest entry '{}' ends at {} instead of 100",
                highest.label, highest.max_score
            ));
        }
    }
    if let Some(lowest) = entries.last() {
        if lowest.min_score > MIN_SCORE {
            errors.push(format!(
                "scale: lowest entry '{}' starts at {} instead of 0",
                lowest.label, lowest.min_score
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A grade scale that has passed [`validate_scale`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GradeScale(Vec<GradeScaleEntry>);

impl GradeScale {
    pub fn new(entries: Vec<GradeScaleEntry>) -> Result<Self, GradeError> {
        validate_scale(&entries).map_err(|errors| GradeError::Configuration(errors.join("; ")))?;
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[GradeScaleEntry] {
        &self.0
    }

    pub fn letter_and_point(&self, score: f64) -> Result<LetterGrade, GradeError> {
        letter_and_point(score, &self.0)
    }

    pub fn find(&self, label: &str) -> Option<&GradeScaleEntry> {
        self.0.iter().find(|entry| entry.label.eq_ignore_ascii_case(label))
    }

    /// Whether `grade_point` reaches the grade point of `passing_label`.
    /// An unknown passing label passes nothing.
    pub fn is_passing(&self, grade_point: f64, passing_label: &str) -> bool {
        self.find(passing_label)
            .map(|passing| grade_point >= passing.grade_point)
            .unwrap_or(false)
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self(vec![
            GradeScaleEntry::new("A", 80.0, 100.0, 4.0),
            GradeScaleEntry::new("B+", 70.0, 79.0, 3.5),
            GradeScaleEntry::new("B", 60.0, 69.0, 3.0),
            GradeScaleEntry::new("C+", 55.0, 59.0, 2.5),
            GradeScaleEntry::new("C", 47.0, 54.0, 2.0),
            GradeScaleEntry::new("D", 40.0, 46.0, 1.0),
            GradeScaleEntry::new("F", 0.0, 39.0, 0.0),
        ])
    }
}

/// Drop a trailing `+`/`-` from a letter label ("B+" -> "B").
pub fn strip_plus_minus(label: &str) -> &str {
    let stripped = label.trim_end_matches(['+', '-']);
    if stripped.is_empty() {
        label
    } else {
        stripped
    }
}

/// Parse the compact `label:min-max[=points]` notation, entries separated by
/// `;`. Without `=points`, grade points count down from 4 by rank.
///
/// The result is sorted descending by `min_score` but not validated.
pub fn parse_scale_spec(spec: &str) -> Result<Vec<GradeScaleEntry>, GradeError> {
    let mut entries = Vec::new();

    for part in spec.split(';').map(str::trim).filter(|part| !part.is_empty()) {
        let malformed = || GradeError::Configuration(format!("malformed scale entry '{part}'"));

        let (label, rest) = part.split_once(':').ok_or_else(malformed)?;
        let (range, points) = match rest.split_once('=') {
            Some((range, points)) => (range, Some(points)),
            None => (rest, None),
        };
        let (min, max) = range.split_once('-').ok_or_else(malformed)?;
        let min_score: f64 = min.trim().parse().map_err(|_| malformed())?;
        let max_score: f64 = max.trim().parse().map_err(|_| malformed())?;
        let grade_point = match points {
            Some(points) => Some(points.trim().parse::<f64>().map_err(|_| malformed())?),
            None => None,
        };

        entries.push((label.trim().to_string(), min_score, max_score, grade_point));
    }

    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(rank, (label, min_score, max_score, grade_point))| GradeScaleEntry {
            label,
            min_score,
            max_score,
            grade_point: grade_point.unwrap_or_else(|| (4.0 - rank as f64).max(0.0)),
        })
        .collect())
}
