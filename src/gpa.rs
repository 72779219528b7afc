use std::collections::HashMap;

use uuid::Uuid;

use crate::error::GradeError;
use crate::models::{
    Assignment, AssignmentType, CourseGradeSummary, CourseView, Enrollment, EnrollmentStatus,
    GpaResult, GpaView, GradeScaleEntry,
};
use crate::scale::{self, GradeScale};

#[derive(Debug, Clone, PartialEq)]
pub struct GpaOptions {
    pub weight_by_credits: bool,
    pub include_transfer: bool,
    pub include_plus_minus: bool,
    pub semester_filter: Option<String>,
}

impl Default for GpaOptions {
    fn default() -> Self {
        Self {
            weight_by_credits: true,
            include_transfer: false,
            include_plus_minus: true,
            semester_filter: None,
        }
    }
}

/// Aggregate one student's enrollments into a GPA with a per-course breakdown.
///
/// Breakdown order follows `enrollments`. Courses without any assignment are
/// listed with no average and do not count toward the GPA. With no graded
/// course at all the GPA is 0.
pub fn compute_gpa(
    student_id: Uuid,
    enrollments: &[Enrollment],
    assignments_by_enrollment: &HashMap<Uuid, Vec<Assignment>>,
    scale: &[GradeScaleEntry],
    options: &GpaOptions,
) -> Result<GpaResult, GradeError> {
    let mut breakdown = Vec::new();

    for enrollment in enrollments {
        if !is_counted(enrollment, options) {
            continue;
        }

        let summary = match &enrollment.transfer {
            Some(transfer) => CourseGradeSummary {
                enrollment_id: enrollment.id,
                course_id: enrollment.course_id,
                course_code: enrollment.course_code.clone(),
                semester: enrollment.semester.clone(),
                average: None,
                letter_grade: Some(display_label(&transfer.label, options)),
                grade_point: Some(transfer.grade_point),
                credits: enrollment.credits,
                transfer: true,
            },
            None => {
                let scores = assignments_by_enrollment
                    .get(&enrollment.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let average = mean(scores.iter().map(|a| a.score));
                let letter = match average {
                    Some(average) => Some(scale::letter_and_point(average, scale)?),
                    None => None,
                };

                CourseGradeSummary {
                    enrollment_id: enrollment.id,
                    course_id: enrollment.course_id,
                    course_code: enrollment.course_code.clone(),
                    semester: enrollment.semester.clone(),
                    average,
                    letter_grade: letter.as_ref().map(|l| display_label(&l.label, options)),
                    grade_point: letter.map(|l| l.grade_point),
                    credits: enrollment.credits,
                    transfer: false,
                }
            }
        };

        breakdown.push(summary);
    }

    let gpa = if options.weight_by_credits {
        weighted_gpa(&breakdown)
    } else {
        unweighted_gpa(&breakdown)
    };

    Ok(GpaResult {
        student_id,
        gpa,
        breakdown,
    })
}

fn is_counted(enrollment: &Enrollment, options: &GpaOptions) -> bool {
    if let Some(semester) = options.semester_filter.as_deref() {
        if enrollment.semester != semester {
            return false;
        }
    }

    if enrollment.transfer.is_some() {
        if !options.include_transfer {
            tracing::debug!(course = %enrollment.course_code, "skipping transfer credit");
        }
        return options.include_transfer;
    }

    if enrollment.status == EnrollmentStatus::Dropped {
        tracing::debug!(course = %enrollment.course_code, "skipping dropped enrollment");
        return false;
    }

    true
}

fn display_label(label: &str, options: &GpaOptions) -> String {
    if options.include_plus_minus {
        label.to_string()
    } else {
        scale::strip_plus_minus(label).to_string()
    }
}

fn weighted_gpa(breakdown: &[CourseGradeSummary]) -> f64 {
    let (points, credits) = breakdown
        .iter()
        .filter_map(|course| course.grade_point.map(|gp| (gp, course.credits as f64)))
        .fold((0.0, 0.0), |(points, credits), (gp, c)| (points + gp * c, credits + c));

    if credits > 0.0 {
        points / credits
    } else {
        0.0
    }
}

fn unweighted_gpa(breakdown: &[CourseGradeSummary]) -> f64 {
    mean(breakdown.iter().filter_map(|course| course.grade_point)).unwrap_or(0.0)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (total, count) = values.fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean score per assignment type, in the order types first appear.
pub fn average_by_type(assignments: &[Assignment]) -> Vec<(AssignmentType, f64)> {
    let mut order: Vec<AssignmentType> = Vec::new();
    let mut totals: HashMap<AssignmentType, (f64, usize)> = HashMap::new();

    for assignment in assignments {
        let entry = totals.entry(assignment.kind).or_insert_with(|| {
            order.push(assignment.kind);
            (0.0, 0)
        });
        entry.0 += assignment.score;
        entry.1 += 1;
    }

    order
        .into_iter()
        .filter_map(|kind| {
            totals
                .get(&kind)
                .map(|(total, count)| (kind, total / *count as f64))
        })
        .collect()
}

impl GpaResult {
    pub fn view(&self) -> GpaView {
        GpaView {
            gpa: round2(self.gpa),
            breakdown: self
                .breakdown
                .iter()
                .map(|course| CourseView {
                    course: course.course_code.clone(),
                    credits: course.credits,
                    average: course.average.map(round2),
                    letter_grade: course.letter_grade.clone(),
                })
                .collect(),
        }
    }

    /// Credits of courses that count toward the GPA.
    pub fn graded_credits(&self) -> u32 {
        self.breakdown
            .iter()
            .filter(|course| course.grade_point.is_some())
            .map(|course| course.credits)
            .sum()
    }

    /// Credits of graded courses at or above `passing_grade`.
    pub fn earned_credits(&self, scale: &GradeScale, passing_grade: &str) -> u32 {
        self.breakdown
            .iter()
            .filter(|course| {
                course
                    .grade_point
                    .map(|gp| scale.is_passing(gp, passing_grade))
                    .unwrap_or(false)
            })
            .map(|course| course.credits)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransferCredit;
    use chrono::NaiveDate;

    fn scale() -> Vec<GradeScaleEntry> {
        vec![
            GradeScaleEntry::new("A", 90.0, 100.0, 4.0),
            GradeScaleEntry::new("B+", 80.0, 90.0, 3.0),
            GradeScaleEntry::new("C", 70.0, 80.0, 2.0),
            GradeScaleEntry::new("D", 60.0, 70.0, 1.0),
            GradeScaleEntry::new("F", 0.0, 60.0, 0.0),
        ]
    }

    fn enrollment(code: &str, credits: u32, semester: &str) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            course_id: Uuid::new_v4(),
            course_code: code.to_string(),
            semester: semester.to_string(),
            credits,
            status: EnrollmentStatus::Active,
            transfer: None,
        }
    }

    fn graded(enrollment: &Enrollment, kind: AssignmentType, score: f64) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            enrollment_id: enrollment.id,
            kind,
            name: format!("{kind} work"),
            score,
            comments: None,
            graded_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        }
    }

    fn snapshot(entries: &[(&Enrollment, Vec<f64>)]) -> HashMap<Uuid, Vec<Assignment>> {
        entries
            .iter()
            .map(|(e, scores)| {
                let assignments = scores
                    .iter()
                    .map(|s| graded(e, AssignmentType::Exam, *s))
                    .collect();
                (e.id, assignments)
            })
            .collect()
    }

    fn options(weight_by_credits: bool) -> GpaOptions {
        GpaOptions {
            weight_by_credits,
            ..GpaOptions::default()
        }
    }

    #[test]
    fn unweighted_gpa_is_mean_of_grade_points() {
        let first = enrollment("MATH101", 3, "2026S");
        let second = enrollment("HIST210", 4, "2026S");
        let grades = snapshot(&[(&first, vec![95.0, 85.0]), (&second, vec![70.0])]);

        let result = compute_gpa(
            Uuid::nil(),
            &[first, second],
            &grades,
            &scale(),
            &options(false),
        )
        .unwrap();

        assert!((result.gpa - 3.0).abs() < 1e-9);
        assert_eq!(result.breakdown[0].average, Some(90.0));
        assert_eq!(result.breakdown[0].letter_grade.as_deref(), Some("A"));
        assert_eq!(result.breakdown[1].letter_grade.as_deref(), Some("C"));
    }

    #[test]
    fn weighted_gpa_uses_credits() {
        let first = enrollment("MATH101", 3, "2026S");
        let second = enrollment("HIST210", 4, "2026S");
        let grades = snapshot(&[(&first, vec![90.0]), (&second, vec![70.0])]);

        let result = compute_gpa(Uuid::nil(), &[first, second], &grades, &scale(), &options(true))
            .unwrap();

        assert!((result.gpa - 20.0 / 7.0).abs() < 1e-12);
        assert_eq!(result.view().gpa, 2.86);
    }

    #[test]
    fn ungraded_course_is_listed_but_not_counted() {
        let graded_course = enrollment("MATH101", 3, "2026S");
        let empty = enrollment("ART100", 2, "2026S");
        let grades = snapshot(&[(&graded_course, vec![92.0])]);

        let result = compute_gpa(
            Uuid::nil(),
            &[graded_course, empty],
            &grades,
            &scale(),
            &options(true),
        )
        .unwrap();

        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[1].average, None);
        assert_eq!(result.breakdown[1].letter_grade, None);
        assert_eq!(result.gpa, 4.0);
        assert_eq!(result.graded_credits(), 3);
    }

    #[test]
    fn empty_input_yields_zero() {
        let result =
            compute_gpa(Uuid::nil(), &[], &HashMap::new(), &scale(), &options(true)).unwrap();
        assert_eq!(result.gpa, 0.0);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn semester_filter_matching_nothing_yields_zero() {
        let course = enrollment("MATH101", 3, "2026S");
        let grades = snapshot(&[(&course, vec![88.0])]);
        let filter = GpaOptions {
            semester_filter: Some("2025F".to_string()),
            ..GpaOptions::default()
        };

        let result = compute_gpa(Uuid::nil(), &[course], &grades, &scale(), &filter).unwrap();
        assert_eq!(result.gpa, 0.0);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn semester_filter_keeps_matching_courses_in_order() {
        let fall = enrollment("CS101", 3, "2025F");
        let spring = enrollment("CS102", 3, "2026S");
        let also_fall = enrollment("CS103", 3, "2025F");
        let grades = snapshot(&[
            (&fall, vec![75.0]),
            (&spring, vec![95.0]),
            (&also_fall, vec![85.0]),
        ]);
        let filter = GpaOptions {
            semester_filter: Some("2025F".to_string()),
            ..GpaOptions::default()
        };

        let result =
            compute_gpa(Uuid::nil(), &[fall, spring, also_fall], &grades, &scale(), &filter)
                .unwrap();

        let codes: Vec<&str> = result.breakdown.iter().map(|c| c.course_code.as_str()).collect();
        assert_eq!(codes, vec!["CS101", "CS103"]);
        assert!((result.gpa - 2.5).abs() < 1e-9);
    }

    #[test]
    fn dropped_enrollment_is_excluded() {
        let kept = enrollment("MATH101", 3, "2026S");
        let mut dropped = enrollment("CHEM110", 4, "2026S");
        dropped.status = EnrollmentStatus::Dropped;
        let grades = snapshot(&[(&kept, vec![91.0]), (&dropped, vec![40.0])]);

        let result = compute_gpa(
            Uuid::nil(),
            &[kept, dropped.clone()],
            &grades,
            &scale(),
            &GpaOptions {
                include_transfer: true,
                ..GpaOptions::default()
            },
        )
        .unwrap();

        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.gpa, 4.0);
    }

    #[test]
    fn transfer_credit_counts_only_when_included() {
        let local = enrollment("MATH101", 3, "2026S");
        let mut transfer = enrollment("ENG200", 3, "2025F");
        transfer.status = EnrollmentStatus::Dropped;
        transfer.transfer = Some(TransferCredit {
            label: "C".to_string(),
            grade_point: 2.0,
        });
        let grades = snapshot(&[(&local, vec![95.0])]);
        let enrollments = vec![local, transfer];

        let without =
            compute_gpa(Uuid::nil(), &enrollments, &grades, &scale(), &options(true)).unwrap();
        assert_eq!(without.breakdown.len(), 1);
        assert_eq!(without.gpa, 4.0);

        let with = compute_gpa(
            Uuid::nil(),
            &enrollments,
            &grades,
            &scale(),
            &GpaOptions {
                include_transfer: true,
                ..GpaOptions::default()
            },
        )
        .unwrap();
        assert_eq!(with.breakdown.len(), 2);
        assert!(with.breakdown[1].transfer);
        assert_eq!(with.breakdown[1].average, None);
        assert_eq!(with.breakdown[1].letter_grade.as_deref(), Some("C"));
        assert!((with.gpa - 3.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_scale_fails_aggregation() {
        let course = enrollment("MATH101", 3, "2026S");
        let grades = snapshot(&[(&course, vec![80.0])]);
        let broken = vec![
            GradeScaleEntry::new("A", 81.0, 100.0, 4.0),
            GradeScaleEntry::new("B", 0.0, 79.0, 3.0),
        ];

        let err = compute_gpa(Uuid::nil(), &[course], &grades, &broken, &options(true))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn recomputation_is_bit_for_bit_identical() {
        let first = enrollment("MATH101", 3, "2026S");
        let second = enrollment("HIST210", 4, "2026S");
        let third = enrollment("BIO150", 1, "2026S");
        let grades = snapshot(&[
            (&first, vec![91.3, 77.7, 88.1]),
            (&second, vec![64.2]),
            (&third, vec![59.9, 81.4]),
        ]);
        let enrollments = vec![first, second, third];

        let a = compute_gpa(Uuid::nil(), &enrollments, &grades, &scale(), &options(true)).unwrap();
        let b = compute_gpa(Uuid::nil(), &enrollments, &grades, &scale(), &options(true)).unwrap();
        assert_eq!(a.gpa.to_bits(), b.gpa.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn plus_minus_can_be_hidden() {
        let course = enrollment("MATH101", 3, "2026S");
        let grades = snapshot(&[(&course, vec![85.0])]);
        let hidden = GpaOptions {
            include_plus_minus: false,
            ..GpaOptions::default()
        };

        let result = compute_gpa(Uuid::nil(), &[course], &grades, &scale(), &hidden).unwrap();
        assert_eq!(result.breakdown[0].letter_grade.as_deref(), Some("B"));
        assert_eq!(result.gpa, 3.0);
    }

    #[test]
    fn view_rounds_for_display() {
        let course = enrollment("MATH101", 3, "2026S");
        let grades = snapshot(&[(&course, vec![90.0, 85.0, 86.0])]);

        let result = compute_gpa(Uuid::nil(), &[course], &grades, &scale(), &options(true)).unwrap();
        let view = result.view();
        assert_eq!(view.breakdown[0].average, Some(87.0));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["breakdown"][0]["course"], "MATH101");
        assert_eq!(json["breakdown"][0]["letterGrade"], "B+");
        assert_eq!(json["gpa"], 3.0);
    }

    #[test]
    fn earned_credits_use_passing_grade() {
        let strong = enrollment("MATH101", 3, "2026S");
        let weak = enrollment("HIST210", 4, "2026S");
        let grades = snapshot(&[(&strong, vec![92.0]), (&weak, vec![55.0])]);
        let result =
            compute_gpa(Uuid::nil(), &[strong, weak], &grades, &scale(), &options(true)).unwrap();

        let scale = GradeScale::new(scale()).unwrap();
        assert_eq!(result.graded_credits(), 7);
        assert_eq!(result.earned_credits(&scale, "D"), 3);
    }

    #[test]
    fn averages_by_type_in_first_seen_order() {
        let course = enrollment("MATH101", 3, "2026S");
        let assignments = vec![
            graded(&course, AssignmentType::Quiz, 80.0),
            graded(&course, AssignmentType::Exam, 70.0),
            graded(&course, AssignmentType::Quiz, 90.0),
        ];

        let averages = average_by_type(&assignments);
        assert_eq!(
            averages,
            vec![(AssignmentType::Quiz, 85.0), (AssignmentType::Exam, 70.0)]
        );
    }

    #[test]
    fn rounds_half_up_to_two_places() {
        assert_eq!(round2(2.857142857), 2.86);
        assert_eq!(round2(3.0), 3.0);
        assert_eq!(round2(0.0), 0.0);
    }
}
